//! Shared types for the client crate.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::AsyncRead;

// ─── Directory Listing ───────────────────────────────────────────────

/// Type of a remote filesystem entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EntryKind {
    File,
    Directory,
    Link,
}

/// One row from a remote directory listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    pub name: String,
    pub full_path: String,
    pub size: u64,
    /// Modification time as reported by the server. `None` when the raw
    /// timestamp was missing, zero or could not be parsed.
    pub modified: Option<DateTime<Utc>>,
    pub kind: EntryKind,
}

impl RemoteEntry {
    pub fn file(full_path: impl Into<String>, size: u64, modified: Option<DateTime<Utc>>) -> Self {
        let full_path = full_path.into();
        Self {
            name: file_name(&full_path).to_string(),
            full_path,
            size,
            modified,
            kind: EntryKind::File,
        }
    }

    pub fn directory(full_path: impl Into<String>, modified: Option<DateTime<Utc>>) -> Self {
        let full_path = full_path.into();
        Self {
            name: file_name(&full_path).to_string(),
            full_path,
            size: 0,
            modified,
            kind: EntryKind::Directory,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Options for listing a directory.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    /// Descend into sub-directories. Some servers do not support this.
    #[serde(default)]
    pub recursive: bool,
}

impl ListOptions {
    pub fn recursive() -> Self {
        Self { recursive: true }
    }
}

// ─── Transfer ────────────────────────────────────────────────────────

/// An open, not yet consumed, read handle on a remote file. Dropping it
/// closes the handle.
pub type RemoteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Payload handed to [`crate::RemoteClient::upload`].
pub enum UploadSource {
    Bytes(Bytes),
    Stream(RemoteStream),
}

impl fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Outcome reported by the backend for an upload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum UploadStatus {
    Success,
    /// The server skipped the upload (e.g. file already exists).
    Skipped,
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "Success",
            Self::Skipped => "Skipped",
        };
        f.write_str(s)
    }
}

// ─── Path helpers ────────────────────────────────────────────────────

/// Last path segment of a `/`-separated remote path.
pub fn file_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

/// Join a remote folder and a child name with exactly one `/`.
pub fn join_remote(folder: Option<&str>, name: &str) -> String {
    match folder {
        None | Some("") => format!("/{}", name.trim_start_matches('/')),
        Some(dir) => format!(
            "{}/{}",
            dir.trim_end_matches('/'),
            name.trim_start_matches('/')
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_takes_last_segment() {
        assert_eq!(file_name("/in/reports/a.csv"), "a.csv");
        assert_eq!(file_name("a.csv"), "a.csv");
        assert_eq!(file_name("/in/reports/"), "reports");
    }

    #[test]
    fn join_remote_normalises_slashes() {
        assert_eq!(join_remote(Some("/in/"), "/a.csv"), "/in/a.csv");
        assert_eq!(join_remote(Some("in"), "a.csv"), "in/a.csv");
        assert_eq!(join_remote(None, "a.csv"), "/a.csv");
        assert_eq!(join_remote(Some(""), "a.csv"), "/a.csv");
    }
}
