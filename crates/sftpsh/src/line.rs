//! Input line tokenization
//!
//! Splits a typed line the way a POSIX shell would for plain words: single
//! quotes group literally, double quotes group with backslash escapes, a
//! backslash outside quotes escapes the next character.

use crate::{Error, Result};

/// A parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// First token
    pub name: String,
    /// Remaining tokens
    pub args: Vec<String>,
}

impl Command {
    /// Parse one input line; `Ok(None)` for a blank line
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut tokens = tokenize(line)?.into_iter();
        Ok(tokens.next().map(|name| Self {
            name,
            args: tokens.collect(),
        }))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Split `line` into shell words
pub fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote = Quote::None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Quote::None, c) if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (Quote::None, '\'') => {
                quote = Quote::Single;
                in_token = true;
            }
            (Quote::None, '"') => {
                quote = Quote::Double;
                in_token = true;
            }
            (Quote::None, '\\') => {
                in_token = true;
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            (Quote::Single, '\'') | (Quote::Double, '"') => quote = Quote::None,
            (Quote::Double, '\\') => match chars.next() {
                Some(next @ ('"' | '\\' | '$' | '`')) => current.push(next),
                Some(next) => {
                    current.push('\\');
                    current.push(next);
                }
                None => current.push('\\'),
            },
            (_, c) => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if quote != Quote::None {
        return Err(Error::usage(
            "input",
            "<command> [args...]",
            "unterminated quote",
        ));
    }
    if in_token {
        tokens.push(current);
    }

    Ok(tokens)
}

/// Quote `word` for a POSIX shell, leaving plain words untouched
pub fn quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./,:@%+=".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_words() {
        assert_eq!(tokenize("ls  -t  dir").unwrap(), vec!["ls", "-t", "dir"]);
    }

    #[test]
    fn test_quoted_substrings_stay_together() {
        assert_eq!(
            tokenize(r#"put "my file.txt" 'other file'"#).unwrap(),
            vec!["put", "my file.txt", "other file"]
        );
    }

    #[test]
    fn test_escapes() {
        assert_eq!(tokenize(r"get a\ b").unwrap(), vec!["get", "a b"]);
        assert_eq!(tokenize(r#"x "a\"b""#).unwrap(), vec!["x", "a\"b"]);
        assert_eq!(tokenize(r"x 'a\b'").unwrap(), vec!["x", r"a\b"]);
    }

    #[test]
    fn test_empty_quotes_make_empty_token() {
        assert_eq!(tokenize("x ''").unwrap(), vec!["x", ""]);
    }

    #[test]
    fn test_unterminated_quote() {
        assert!(tokenize("put 'oops").unwrap_err().is_usage());
    }

    #[test]
    fn test_command_parse() {
        let cmd = Command::parse("  chmod d 755 ").unwrap().unwrap();
        assert_eq!(cmd.name, "chmod");
        assert_eq!(cmd.args, vec!["d", "755"]);
        assert!(Command::parse("   ").unwrap().is_none());
    }

    #[test]
    fn test_quote_roundtrips_through_tokenize() {
        for word in ["plain.txt", "with space", "it's", ""] {
            let line = format!("cmd {}", quote(word));
            assert_eq!(tokenize(&line).unwrap(), vec!["cmd".to_string(), word.to_string()]);
        }
    }
}
