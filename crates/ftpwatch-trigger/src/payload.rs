//! Items handed to the executor.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use ftpwatch_client::{RemoteEntry, RemoteStream};
use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Items ───────────────────────────────────────────────────────────

/// A new file, optionally with its downloaded content.
#[derive(Debug, Clone, PartialEq)]
pub struct FileItem {
    pub name: String,
    pub full_path: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub content: Option<Bytes>,
}

impl FileItem {
    /// Metadata only.
    pub fn from_entry(entry: &RemoteEntry) -> Self {
        Self {
            name: entry.name.clone(),
            full_path: entry.full_path.clone(),
            size: entry.size,
            modified: entry.modified,
            content: None,
        }
    }

    pub fn with_content(mut self, content: Bytes) -> Self {
        self.content = Some(content);
        self
    }
}

/// A new file, optionally with an open read handle. Dropping the item
/// closes the handle.
pub struct StreamItem {
    pub name: String,
    pub full_path: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub stream: Option<RemoteStream>,
}

impl StreamItem {
    pub fn from_entry(entry: &RemoteEntry) -> Self {
        Self {
            name: entry.name.clone(),
            full_path: entry.full_path.clone(),
            size: entry.size,
            modified: entry.modified,
            stream: None,
        }
    }

    pub fn with_stream(mut self, stream: RemoteStream) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Take ownership of the read handle, leaving metadata behind.
    pub fn take_stream(&mut self) -> Option<RemoteStream> {
        self.stream.take()
    }
}

impl fmt::Debug for StreamItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamItem")
            .field("name", &self.name)
            .field("full_path", &self.full_path)
            .field("size", &self.size)
            .field("modified", &self.modified)
            .field("stream", &self.stream.as_ref().map(|_| ".."))
            .finish()
    }
}

// ─── Payload ─────────────────────────────────────────────────────────

/// What one dispatch delivers.
#[derive(Debug)]
pub enum TriggerPayload {
    File(FileItem),
    Stream(StreamItem),
    Files(Vec<FileItem>),
    Streams(Vec<StreamItem>),
}

impl TriggerPayload {
    /// Short description for logs: the path for single items,
    /// `FileItem[n]` / `StreamItem[n]` for batches.
    pub fn describe(&self) -> String {
        match self {
            Self::File(item) => item.full_path.clone(),
            Self::Stream(item) => item.full_path.clone(),
            Self::Files(items) => format!("FileItem[{}]", items.len()),
            Self::Streams(items) => format!("StreamItem[{}]", items.len()),
        }
    }

    /// Number of files carried.
    pub fn len(&self) -> usize {
        match self {
            Self::File(_) | Self::Stream(_) => 1,
            Self::Files(items) => items.len(),
            Self::Streams(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Paths of the carried files, in delivery order.
    pub fn paths(&self) -> Vec<&str> {
        match self {
            Self::File(item) => vec![item.full_path.as_str()],
            Self::Stream(item) => vec![item.full_path.as_str()],
            Self::Files(items) => items.iter().map(|i| i.full_path.as_str()).collect(),
            Self::Streams(items) => items.iter().map(|i| i.full_path.as_str()).collect(),
        }
    }
}

// ─── Shape ───────────────────────────────────────────────────────────

/// Payload shape a listener delivers, fixed when it is built.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PayloadShape {
    #[default]
    SingleFile,
    SingleStream,
    BatchFile,
    BatchStream,
}

impl PayloadShape {
    pub fn is_batch(&self) -> bool {
        matches!(self, Self::BatchFile | Self::BatchStream)
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Self::SingleStream | Self::BatchStream)
    }
}

impl fmt::Display for PayloadShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SingleFile => "FileItem",
            Self::SingleStream => "StreamItem",
            Self::BatchFile => "FileItem[]",
            Self::BatchStream => "StreamItem[]",
        };
        f.write_str(s)
    }
}
