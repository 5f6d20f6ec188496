//! Built-in commands
//!
//! Every handler is a unit struct implementing [`CommandHandler`]. Commands
//! that change or read remote state are wrapped with [`recorded`] here, when
//! the registry is built, so the history log never depends on a handler
//! remembering to append itself.

pub mod fs;
pub mod meta;
pub mod transfer;
pub mod tree;

use crate::dispatch::{Dispatcher, recorded};

/// Register every built-in command on `dispatcher`
pub fn register_all(dispatcher: &mut Dispatcher) {
    dispatcher.register(recorded(fs::Ls));
    dispatcher.register(recorded(fs::Chmod));
    dispatcher.register(recorded(fs::Mkdir));
    dispatcher.register(recorded(fs::Rm));
    dispatcher.register(recorded(fs::Rename));
    dispatcher.register(recorded(tree::Rmdir));
    dispatcher.register(recorded(tree::Cp));
    dispatcher.register(recorded(tree::CpR));
    dispatcher.register(recorded(transfer::Get));
    dispatcher.register(recorded(transfer::Put));

    dispatcher.register(fs::Lsl);
    dispatcher.register(meta::Ping);
    dispatcher.register(meta::History);
    dispatcher.register(meta::Connect);
}

/// Names of the commands whose successful runs land in the history log
pub const RECORDED: &[&str] = &[
    "ls", "chmod", "mkdir", "rm", "rename", "rmdir", "cp", "cp_r", "get", "put",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::CommandHandler;

    #[test]
    fn test_registry_names() {
        let dispatcher = Dispatcher::standard();
        let mut expected: Vec<&str> = RECORDED.to_vec();
        expected.extend(["lsl", "ping", "history", "connect"]);
        expected.sort_unstable();
        assert_eq!(dispatcher.names(), expected);
    }

    #[test]
    fn test_usage_lines_start_with_name() {
        let handlers: Vec<Box<dyn CommandHandler>> = vec![
            Box::new(fs::Ls),
            Box::new(fs::Lsl),
            Box::new(fs::Chmod),
            Box::new(fs::Mkdir),
            Box::new(fs::Rm),
            Box::new(fs::Rename),
            Box::new(tree::Rmdir),
            Box::new(tree::Cp),
            Box::new(tree::CpR),
            Box::new(transfer::Get),
            Box::new(transfer::Put),
            Box::new(meta::Ping),
            Box::new(meta::History),
            Box::new(meta::Connect),
        ];
        for handler in handlers {
            assert!(handler.usage().starts_with(handler.name()), "{}", handler.name());
        }
    }
}
