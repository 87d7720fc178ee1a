//! ffmpeg transport driven by stand-in shell scripts
//!
//! Every script is written before any test spawns a process, so no child
//! inherits a script's write handle while another test executes it.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use teloxide::types::ChatId;
use vcplayer::call::{RtmpBackend, StreamBackend, StreamStatus};
use vcplayer::config::StreamConfig;
use vcplayer::media::{MediaStream, StreamKind};
use vcplayer::VcError;

const CHAT: ChatId = ChatId(-100555);

struct Scripts {
    refused: PathBuf,
    late_failure: PathBuf,
    clean_exit: PathBuf,
    long_running: PathBuf,
}

fn scripts() -> &'static Scripts {
    static SCRIPTS: OnceLock<Scripts> = OnceLock::new();
    SCRIPTS.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap().keep();
        let write = |name: &str, body: &str| {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        };
        Scripts {
            refused: write("refused", "sleep 0.1\necho 'Connection refused' >&2\nexit 1"),
            late_failure: write("late", "sleep 0.3\necho 'Broken pipe' >&2\nexit 1"),
            clean_exit: write("clean", "sleep 0.1\nexit 0"),
            long_running: write("long", "exec sleep 30"),
        }
    })
}

fn backend(ffmpeg: &Path, grace_ms: u64) -> RtmpBackend {
    let mut config = StreamConfig {
        ffmpeg: ffmpeg.to_string_lossy().into_owned(),
        start_grace_ms: grace_ms,
        ..StreamConfig::default()
    };
    config
        .endpoints
        .insert(CHAT.0.to_string(), "rtmp://127.0.0.1:1/live/key".to_string());
    RtmpBackend::new(config)
}

fn wait_for_exit(backend: &RtmpBackend) -> StreamStatus {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match backend.status(CHAT) {
            StreamStatus::Running if Instant::now() < deadline => {
                thread::sleep(Duration::from_millis(20))
            }
            status => return status,
        }
    }
}

/// An ingest that refuses the connection fails the start itself
#[test]
fn test_refused_connection_fails_start() {
    let file = NamedTempFile::new().unwrap();
    let stream = MediaStream::new(file.path(), StreamKind::Audio).unwrap();
    let backend = backend(&scripts().refused, 1500);

    let err = backend.start(CHAT, &stream, 0).unwrap_err();
    match &err {
        VcError::TelegramServer(reason) => assert!(reason.contains("Connection refused")),
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(
        err.user_message(),
        "⚠️ Telegram server error! Please try again shortly."
    );
    // Nothing is left behind to be mistaken for a finished track
    assert!(matches!(backend.status(CHAT), StreamStatus::Running));
}

/// A failure after the grace period surfaces as `Failed`, not as an end
#[test]
fn test_late_failure_is_not_an_end() {
    let file = NamedTempFile::new().unwrap();
    let stream = MediaStream::new(file.path(), StreamKind::Audio).unwrap();
    let backend = backend(&scripts().late_failure, 50);

    backend.start(CHAT, &stream, 0).unwrap();
    match wait_for_exit(&backend) {
        StreamStatus::Failed(VcError::TelegramServer(reason)) => {
            assert!(reason.contains("Broken pipe"))
        }
        other => panic!("unexpected status {:?}", other),
    }
    // Reported once
    assert!(matches!(backend.status(CHAT), StreamStatus::Running));
}

/// A zero exit is the end of the track, even inside the grace period
#[test]
fn test_clean_exit_is_an_end() {
    let file = NamedTempFile::new().unwrap();
    let stream = MediaStream::new(file.path(), StreamKind::Audio).unwrap();
    let backend = backend(&scripts().clean_exit, 1500);

    backend.start(CHAT, &stream, 0).unwrap();
    assert!(matches!(wait_for_exit(&backend), StreamStatus::Ended));
}

/// A healthy stream keeps running until stopped
#[test]
fn test_running_stream_stops() {
    let file = NamedTempFile::new().unwrap();
    let stream = MediaStream::new(file.path(), StreamKind::Audio).unwrap();
    let backend = backend(&scripts().long_running, 100);

    backend.start(CHAT, &stream, 0).unwrap();
    assert!(matches!(backend.status(CHAT), StreamStatus::Running));

    // A restart replaces the running child
    backend.start(CHAT, &stream, 30).unwrap();
    backend.stop(CHAT).unwrap();
    assert!(matches!(backend.status(CHAT), StreamStatus::Running));
}

/// A missing binary is a launch failure
#[test]
fn test_missing_binary() {
    let file = NamedTempFile::new().unwrap();
    let stream = MediaStream::new(file.path(), StreamKind::Audio).unwrap();
    let backend = backend(Path::new("/no/such/ffmpeg"), 100);

    assert!(matches!(
        backend.start(CHAT, &stream, 0),
        Err(VcError::Stream(_))
    ));
}
