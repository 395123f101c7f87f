// Tests for error module
// Display text, io::Error mapping, and classification helpers

use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};

use c4id::c4::{BatchState, C4Error};

#[test]
fn test_file_not_found_error_display() {
    let error = C4Error::FileNotFound {
        path: PathBuf::from("/path/to/file.txt"),
    };
    let message = error.to_string();
    assert!(message.contains("File not found"));
    assert!(message.contains("/path/to/file.txt"));
    assert!(message.contains("Suggestion"));
}

#[test]
fn test_permission_denied_error_display() {
    let error = C4Error::PermissionDenied {
        path: PathBuf::from("/protected/file.txt"),
        operation: "opening".to_string(),
    };
    let message = error.to_string();
    assert!(message.contains("Permission denied"));
    assert!(message.contains("opening"));
    assert!(message.contains("/protected/file.txt"));
}

#[test]
fn test_from_io_error_maps_kinds() {
    let path = Path::new("/data/plate.exr");

    let not_found = io::Error::new(io::ErrorKind::NotFound, "gone");
    assert!(matches!(
        C4Error::from_io_error(not_found, "opening", Some(path)),
        C4Error::FileNotFound { .. }
    ));

    let denied = io::Error::new(io::ErrorKind::PermissionDenied, "no");
    assert!(matches!(
        C4Error::from_io_error(denied, "opening", Some(path)),
        C4Error::PermissionDenied { .. }
    ));

    let other = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
    let error = C4Error::from_io_error(other, "reading", Some(path));
    assert!(matches!(error, C4Error::Io { .. }));
    assert!(error.source().is_some());
    assert_eq!(error.path(), Some(path));
    assert!(error.to_string().contains("reading for /data/plate.exr"));
}

#[test]
fn test_from_io_error_without_path() {
    let error: C4Error = io::Error::new(io::ErrorKind::NotFound, "gone").into();
    // without a path there is nothing to report as missing
    assert!(matches!(error, C4Error::Io { path: None, .. }));
    assert!(error.is_io());
    assert_eq!(error.path(), None);
}

#[test]
fn test_incomplete_is_not_an_io_error() {
    let error = C4Error::Incomplete {
        path: Some(PathBuf::from("big.mov")),
    };
    assert!(error.is_incomplete());
    assert!(!error.is_io());
    assert!(error.to_string().contains("cancelled"));
    assert!(error.to_string().contains("big.mov"));
}

#[test]
fn test_invalid_state_display() {
    let error = C4Error::InvalidState {
        operation: "start",
        state: BatchState::Draining,
    };
    let message = error.to_string();
    assert!(message.contains("Cannot start while the batch is draining"));
    assert!(message.contains("reset()"));
}

#[test]
fn test_invalid_configuration_display() {
    let error = C4Error::invalid_config("chunk size must be at least 1 byte");
    assert_eq!(
        error.to_string(),
        "Invalid configuration: chunk size must be at least 1 byte"
    );
}
