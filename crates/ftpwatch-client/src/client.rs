//! The remote client capability.
//!
//! Every backend (the suppaftp adapter, the in-memory client, test doubles)
//! implements [`RemoteClient`]. Methods take `&self` so one instance can be
//! shared through an `Arc` by the client cache; implementations serialise
//! access to their control connection internally.

use crate::error::FtpResult;
use crate::options::ConnectionOptions;
use crate::types::{ListOptions, RemoteEntry, RemoteStream, UploadSource, UploadStatus};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A client instance shared through the cache.
pub type SharedClient = Arc<dyn RemoteClient>;

/// Abstract interface over the remote file-transfer protocol.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Open the control connection and log in.
    async fn connect(&self, token: &CancellationToken) -> FtpResult<()>;

    /// Close the control connection. Disconnecting an idle client is a no-op.
    async fn disconnect(&self) -> FtpResult<()>;

    /// Blocking best-effort variant of [`RemoteClient::disconnect`] for
    /// synchronous shutdown paths.
    fn disconnect_blocking(&self) -> FtpResult<()>;

    fn is_connected(&self) -> bool;

    /// List `folder` (the server root when `None`).
    async fn list(
        &self,
        folder: Option<&str>,
        options: ListOptions,
        token: &CancellationToken,
    ) -> FtpResult<Vec<RemoteEntry>>;

    /// Download a whole file into memory.
    async fn download(&self, path: &str, token: &CancellationToken) -> FtpResult<Bytes>;

    /// Open a read handle on a remote file. The caller owns the handle.
    async fn open_read(&self, path: &str, token: &CancellationToken) -> FtpResult<RemoteStream>;

    async fn upload(
        &self,
        source: UploadSource,
        remote_path: &str,
        token: &CancellationToken,
    ) -> FtpResult<UploadStatus>;

    async fn delete(&self, path: &str, token: &CancellationToken) -> FtpResult<()>;
}

#[cfg(test)]
impl std::fmt::Debug for dyn RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RemoteClient")
    }
}

/// Constructs unconnected clients from resolved options.
#[cfg_attr(test, mockall::automock)]
pub trait ClientBuilder: Send + Sync {
    fn build(&self, options: &ConnectionOptions) -> FtpResult<SharedClient>;
}
