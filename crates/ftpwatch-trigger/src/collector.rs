//! Upload-side binding: pushes items to `folder/name` on the bound client.

use crate::error::{TriggerError, TriggerResult};
use crate::payload::FileItem;
use bytes::Bytes;
use ftpwatch_client::{join_remote, RemoteStream, SharedClient, UploadSource, UploadStatus};
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Something to upload.
pub enum UploadItem {
    /// Uploads `content`, which must be present.
    File(FileItem),
    Stream { name: String, stream: RemoteStream },
}

impl UploadItem {
    pub fn file(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let name = name.into();
        Self::File(FileItem {
            full_path: name.clone(),
            name,
            size: 0,
            modified: None,
            content: Some(content.into()),
        })
    }

    pub fn stream(name: impl Into<String>, stream: RemoteStream) -> Self {
        Self::Stream {
            name: name.into(),
            stream,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::File(item) => &item.name,
            Self::Stream { name, .. } => name,
        }
    }
}

impl fmt::Debug for UploadItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(item) => f.debug_tuple("File").field(item).finish(),
            Self::Stream { name, .. } => f.debug_struct("Stream").field("name", name).finish_non_exhaustive(),
        }
    }
}

pub struct UploadCollector {
    client: SharedClient,
    folder: Option<String>,
}

impl UploadCollector {
    pub fn new(client: SharedClient, folder: Option<String>) -> Self {
        Self { client, folder }
    }

    pub fn folder(&self) -> Option<&str> {
        self.folder.as_deref()
    }

    /// Upload one item, connecting first when needed. A non-success status
    /// from the server is logged and returned, not treated as an error.
    pub async fn add(&self, item: UploadItem, token: &CancellationToken) -> TriggerResult<UploadStatus> {
        let name = item.name().trim().to_string();
        if name.is_empty() {
            return Err(TriggerError::InvalidArgument("Upload item has no name".into()));
        }

        let (source, kind) = match item {
            UploadItem::File(file) => {
                let content = file.content.ok_or_else(|| {
                    TriggerError::InvalidArgument(format!("File item '{}' has no content", name))
                })?;
                (UploadSource::Bytes(content), "FileItem")
            }
            UploadItem::Stream { stream, .. } => (UploadSource::Stream(stream), "StreamItem"),
        };

        if !self.client.is_connected() {
            self.client
                .connect(token)
                .await
                .map_err(TriggerError::Connection)?;
        }

        let remote_path = join_remote(self.folder.as_deref(), &name);
        let status = self
            .client
            .upload(source, &remote_path, token)
            .await
            .map_err(TriggerError::Remote)?;

        if status != UploadStatus::Success {
            tracing::warn!(
                path = %remote_path,
                item = kind,
                %status,
                "Upload of {} '{}' returned {}",
                kind,
                remote_path,
                status
            );
        }
        Ok(status)
    }
}
