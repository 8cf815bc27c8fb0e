//! Turns listing entries into payload items.
//!
//! The `materialize_*` functions never fail: a fetch error is logged and the
//! item is dropped so the rest of the cycle can go on.

use crate::payload::{FileItem, StreamItem};
use ftpwatch_client::{FtpError, FtpResult, RemoteClient, RemoteEntry};
use tokio_util::sync::CancellationToken;

/// Download the entry into a [`FileItem`].
pub async fn fetch_file(
    entry: &RemoteEntry,
    client: &dyn RemoteClient,
    token: &CancellationToken,
) -> FtpResult<FileItem> {
    let content = client.download(&entry.full_path, token).await?;
    Ok(FileItem::from_entry(entry).with_content(content))
}

/// Open a read handle on the entry into a [`StreamItem`].
pub async fn open_stream(
    entry: &RemoteEntry,
    client: &dyn RemoteClient,
    token: &CancellationToken,
) -> FtpResult<StreamItem> {
    let stream = client.open_read(&entry.full_path, token).await?;
    Ok(StreamItem::from_entry(entry).with_stream(stream))
}

pub async fn materialize_file(
    entry: &RemoteEntry,
    client: &dyn RemoteClient,
    include_content: bool,
    token: &CancellationToken,
) -> Option<FileItem> {
    if !include_content {
        return Some(FileItem::from_entry(entry));
    }
    fetch_file(entry, client, token)
        .await
        .map_err(|e| report(entry, "FileItem", &e))
        .ok()
}

pub async fn materialize_stream(
    entry: &RemoteEntry,
    client: &dyn RemoteClient,
    include_content: bool,
    token: &CancellationToken,
) -> Option<StreamItem> {
    if !include_content {
        return Some(StreamItem::from_entry(entry));
    }
    open_stream(entry, client, token)
        .await
        .map_err(|e| report(entry, "StreamItem", &e))
        .ok()
}

fn report(entry: &RemoteEntry, target: &str, err: &FtpError) {
    if err.is_cancelled() {
        tracing::debug!(path = %entry.full_path, item = target, "Fetch cancelled");
        return;
    }
    tracing::error!(
        path = %entry.full_path,
        item = target,
        error = %err,
        "Unable to fetch '{}'; this {} is left out of the trigger",
        entry.full_path,
        target
    );
}
