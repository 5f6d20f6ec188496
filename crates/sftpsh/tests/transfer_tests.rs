//! File transfer tests
//!
//! NIST 800-53: SI-11 (Error Handling)
//! Implementation: Tests for get, put and local listing against an
//! in-memory remote tree and a temporary local directory

mod common;

use common::{connected, lines, run, text};
use sftpsh::{Dispatcher, Error, MemoryChannel};
use std::fs;

#[tokio::test]
async fn test_put_with_target_creates_directory() {
    let channel = MemoryChannel::new();
    let (mut session, temp) = connected(&channel).await;
    let dispatcher = Dispatcher::standard();
    fs::write(temp.path().join("local/file.txt"), "payload").unwrap();

    run(&dispatcher, &mut session, "put -t folder file.txt").await.unwrap();

    assert_eq!(
        lines(run(&dispatcher, &mut session, "ls folder").await.unwrap()),
        vec!["file.txt"]
    );
    assert_eq!(channel.read("folder/file.txt").unwrap(), b"payload");
    assert_eq!(channel.journal(), vec!["mkdir folder", "put folder/file.txt"]);
}

#[tokio::test]
async fn test_put_without_target_uses_file_name() {
    let channel = MemoryChannel::new();
    let (mut session, temp) = connected(&channel).await;
    let dispatcher = Dispatcher::standard();
    fs::create_dir_all(temp.path().join("local/sub")).unwrap();
    fs::write(temp.path().join("local/sub/notes.txt"), "n").unwrap();

    let reply = text(run(&dispatcher, &mut session, "put sub/notes.txt").await.unwrap());
    assert!(reply.ends_with("-> notes.txt (1 bytes)"), "{reply}");
    assert_eq!(channel.read("notes.txt").unwrap(), b"n");
}

#[tokio::test]
async fn test_put_rejects_directories_and_missing_files() {
    let channel = MemoryChannel::new();
    let (mut session, temp) = connected(&channel).await;
    let dispatcher = Dispatcher::standard();
    fs::create_dir_all(temp.path().join("local/photos")).unwrap();

    let err = run(&dispatcher, &mut session, "put photos").await.unwrap_err();
    assert!(matches!(err, Error::IsADirectory(_)));

    let err = run(&dispatcher, &mut session, "put -t dst missing.txt").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    // Nothing was created for either failure
    assert!(channel.journal().is_empty());
}

#[tokio::test]
async fn test_put_target_that_is_a_file() {
    let channel = MemoryChannel::new();
    channel.add_file("taken", "x");
    let (mut session, temp) = connected(&channel).await;
    let dispatcher = Dispatcher::standard();
    fs::write(temp.path().join("local/file.txt"), "payload").unwrap();

    let err = run(&dispatcher, &mut session, "put -t taken file.txt").await.unwrap_err();
    assert!(matches!(err, Error::NotADirectory(_)));
}

#[tokio::test]
async fn test_get_defaults_to_download_directory() {
    let channel = MemoryChannel::new();
    channel.add_file("docs/report.txt", "quarterly");
    let (mut session, temp) = connected(&channel).await;
    let dispatcher = Dispatcher::standard();

    run(&dispatcher, &mut session, "get docs/report.txt").await.unwrap();

    let saved = temp.path().join("downloads/report.txt");
    assert_eq!(fs::read_to_string(saved).unwrap(), "quarterly");
}

#[tokio::test]
async fn test_get_into_existing_local_directory_keeps_name() {
    let channel = MemoryChannel::new();
    channel.add_file("docs/report.txt", "quarterly");
    let (mut session, temp) = connected(&channel).await;
    let dispatcher = Dispatcher::standard();
    fs::create_dir_all(temp.path().join("local/inbox")).unwrap();

    run(&dispatcher, &mut session, "get docs/report.txt inbox").await.unwrap();
    assert!(temp.path().join("local/inbox/report.txt").is_file());

    run(&dispatcher, &mut session, "get docs/report.txt renamed.txt").await.unwrap();
    assert_eq!(
        fs::read_to_string(temp.path().join("local/renamed.txt")).unwrap(),
        "quarterly"
    );
}

#[tokio::test]
async fn test_get_rejects_directories_and_missing_files() {
    let channel = MemoryChannel::new();
    channel.add_dir("docs");
    let (mut session, temp) = connected(&channel).await;
    let dispatcher = Dispatcher::standard();

    let err = run(&dispatcher, &mut session, "get docs").await.unwrap_err();
    assert!(matches!(err, Error::NotAFile(_)));

    let err = run(&dispatcher, &mut session, "get docs/missing").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(!temp.path().join("downloads").exists());
}

#[tokio::test]
async fn test_get_without_read_permission() {
    let channel = MemoryChannel::new();
    channel.add_file("secret.txt", "s");
    let (mut session, _temp) = connected(&channel).await;
    let dispatcher = Dispatcher::standard();

    run(&dispatcher, &mut session, "chmod secret.txt 200").await.unwrap();
    let err = run(&dispatcher, &mut session, "get secret.txt").await.unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));
}

#[tokio::test]
async fn test_lsl_lists_local_directory() {
    let channel = MemoryChannel::new();
    let (mut session, temp) = connected(&channel).await;
    let dispatcher = Dispatcher::standard();
    fs::write(temp.path().join("local/b.txt"), "").unwrap();
    fs::write(temp.path().join("local/a.txt"), "").unwrap();
    fs::create_dir_all(temp.path().join("local/sub")).unwrap();

    assert_eq!(
        lines(run(&dispatcher, &mut session, "lsl").await.unwrap()),
        vec!["a.txt", "b.txt", "sub"]
    );
    assert!(lines(run(&dispatcher, &mut session, "lsl sub").await.unwrap()).is_empty());

    let err = run(&dispatcher, &mut session, "lsl a.txt").await.unwrap_err();
    assert!(matches!(err, Error::NotADirectory(_)));
    let err = run(&dispatcher, &mut session, "lsl nope").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
