//! In-memory remote client.
//!
//! Keeps a directory tree in memory and implements [`RemoteClient`] over it.
//! Several clients can be forked from one instance; forks share the tree and
//! the failure switches but track their own connection state and call
//! counters. Used by the tests and the demo host.

use crate::client::{ClientBuilder, RemoteClient, SharedClient};
use crate::error::{FtpError, FtpResult};
use crate::options::ConnectionOptions;
use crate::types::*;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
enum Node {
    File { content: Bytes, modified: Option<DateTime<Utc>> },
    Directory { modified: Option<DateTime<Utc>> },
    Link { modified: Option<DateTime<Utc>> },
}

#[derive(Debug, Default)]
struct Store {
    /// Insertion order is the listing order.
    nodes: Vec<(String, Node)>,
    failing_paths: HashSet<String>,
    failing_dirs: HashSet<String>,
    fail_listing: bool,
    fail_connect: bool,
    fail_disconnect: bool,
    upload_status: Option<UploadStatus>,
}

impl Store {
    fn upsert(&mut self, path: String, node: Node) {
        match self.nodes.iter_mut().find(|(p, _)| *p == path) {
            Some(slot) => slot.1 = node,
            None => self.nodes.push((path, node)),
        }
    }

    fn file(&self, path: &str) -> Option<Bytes> {
        self.nodes.iter().find_map(|(p, n)| match n {
            Node::File { content, .. } if p == path => Some(content.clone()),
            _ => None,
        })
    }
}

/// Snapshot of the remote calls a client has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub connect: usize,
    pub disconnect: usize,
    pub list: usize,
    pub download: usize,
    pub open_read: usize,
    pub upload: usize,
    pub delete: usize,
}

#[derive(Default)]
struct Counters {
    connect: AtomicUsize,
    disconnect: AtomicUsize,
    list: AtomicUsize,
    download: AtomicUsize,
    open_read: AtomicUsize,
    upload: AtomicUsize,
    delete: AtomicUsize,
}

/// A remote client backed by an in-memory directory tree.
pub struct InMemoryClient {
    store: Arc<Mutex<Store>>,
    connected: AtomicBool,
    counters: Counters,
}

impl Default for InMemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::default())),
            connected: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    /// A new, disconnected client over the same tree.
    pub fn fork(&self) -> Self {
        Self {
            store: self.store.clone(),
            connected: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─── Tree setup ──────────────────────────────────────────────

    pub fn add_file(
        &self,
        path: &str,
        content: impl Into<Bytes>,
        modified: Option<DateTime<Utc>>,
    ) -> &Self {
        let node = Node::File {
            content: content.into(),
            modified,
        };
        self.store().upsert(normalise(path), node);
        self
    }

    pub fn add_directory(&self, path: &str, modified: Option<DateTime<Utc>>) -> &Self {
        self.store().upsert(normalise(path), Node::Directory { modified });
        self
    }

    pub fn add_link(&self, path: &str, modified: Option<DateTime<Utc>>) -> &Self {
        self.store().upsert(normalise(path), Node::Link { modified });
        self
    }

    /// Content of a file currently in the tree.
    pub fn file(&self, path: &str) -> Option<Bytes> {
        self.store().file(&normalise(path))
    }

    // ─── Failure injection ───────────────────────────────────────

    /// Make download / open-read of `path` fail.
    pub fn fail_path(&self, path: &str) -> &Self {
        self.store().failing_paths.insert(normalise(path));
        self
    }

    /// Make listing `dir` fail. Listing it directly is an error; a recursive
    /// listing from above skips it and everything below it.
    pub fn fail_listing_of(&self, dir: &str) -> &Self {
        self.store().failing_dirs.insert(normalise(dir));
        self
    }

    pub fn set_fail_listing(&self, fail: bool) -> &Self {
        self.store().fail_listing = fail;
        self
    }

    pub fn set_fail_connect(&self, fail: bool) -> &Self {
        self.store().fail_connect = fail;
        self
    }

    pub fn set_fail_disconnect(&self, fail: bool) -> &Self {
        self.store().fail_disconnect = fail;
        self
    }

    /// Status reported by subsequent uploads (`Success` by default).
    pub fn set_upload_status(&self, status: UploadStatus) -> &Self {
        self.store().upload_status = Some(status);
        self
    }

    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            connect: c.connect.load(Ordering::SeqCst),
            disconnect: c.disconnect.load(Ordering::SeqCst),
            list: c.list.load(Ordering::SeqCst),
            download: c.download.load(Ordering::SeqCst),
            open_read: c.open_read.load(Ordering::SeqCst),
            upload: c.upload.load(Ordering::SeqCst),
            delete: c.delete.load(Ordering::SeqCst),
        }
    }

    fn ensure_ready(&self, token: &CancellationToken) -> FtpResult<()> {
        if token.is_cancelled() {
            return Err(FtpError::cancelled());
        }
        if !self.is_connected() {
            return Err(FtpError::not_connected());
        }
        Ok(())
    }

    fn fetch(&self, path: &str) -> FtpResult<Bytes> {
        let path = normalise(path);
        let store = self.store();
        if store.failing_paths.contains(&path) {
            return Err(FtpError::transfer_failed("Injected transfer failure").with_path(path));
        }
        store.file(&path).ok_or_else(|| FtpError::not_found(&path))
    }

    fn do_disconnect(&self) -> FtpResult<()> {
        self.counters.disconnect.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        if self.store().fail_disconnect {
            return Err(FtpError::connection_failed("Injected disconnect failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteClient for InMemoryClient {
    async fn connect(&self, token: &CancellationToken) -> FtpResult<()> {
        if token.is_cancelled() {
            return Err(FtpError::cancelled());
        }
        self.counters.connect.fetch_add(1, Ordering::SeqCst);
        if self.store().fail_connect {
            return Err(FtpError::connection_failed("Injected connect failure"));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> FtpResult<()> {
        self.do_disconnect()
    }

    fn disconnect_blocking(&self) -> FtpResult<()> {
        self.do_disconnect()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn list(
        &self,
        folder: Option<&str>,
        options: ListOptions,
        token: &CancellationToken,
    ) -> FtpResult<Vec<RemoteEntry>> {
        self.ensure_ready(token)?;
        self.counters.list.fetch_add(1, Ordering::SeqCst);

        let root = normalise(folder.unwrap_or("/"));
        let store = self.store();
        if store.fail_listing || store.failing_dirs.contains(&root) {
            return Err(FtpError::transfer_failed("Injected listing failure").with_path(root));
        }
        let unlistable: Vec<&String> = if options.recursive {
            store.failing_dirs.iter().filter(|d| is_below(d, &root)).collect()
        } else {
            Vec::new()
        };
        for dir in &unlistable {
            tracing::warn!(path = %dir, "Unable to list sub-directory, skipping it");
        }

        let entries = store
            .nodes
            .iter()
            .filter(|(path, _)| {
                if options.recursive {
                    is_below(path, &root) && !unlistable.iter().any(|d| is_below(path, d))
                } else {
                    parent_of(path) == root
                }
            })
            .map(|(path, node)| {
                let name = file_name(path).to_string();
                let full_path = path.clone();
                match node {
                    Node::File { content, modified } => RemoteEntry {
                        name,
                        full_path,
                        size: content.len() as u64,
                        modified: *modified,
                        kind: EntryKind::File,
                    },
                    Node::Directory { modified } => RemoteEntry {
                        name,
                        full_path,
                        size: 0,
                        modified: *modified,
                        kind: EntryKind::Directory,
                    },
                    Node::Link { modified } => RemoteEntry {
                        name,
                        full_path,
                        size: 0,
                        modified: *modified,
                        kind: EntryKind::Link,
                    },
                }
            })
            .collect();
        Ok(entries)
    }

    async fn download(&self, path: &str, token: &CancellationToken) -> FtpResult<Bytes> {
        self.ensure_ready(token)?;
        self.counters.download.fetch_add(1, Ordering::SeqCst);
        self.fetch(path)
    }

    async fn open_read(&self, path: &str, token: &CancellationToken) -> FtpResult<RemoteStream> {
        self.ensure_ready(token)?;
        self.counters.open_read.fetch_add(1, Ordering::SeqCst);
        let content = self.fetch(path)?;
        Ok(Box::new(Cursor::new(content)))
    }

    async fn upload(
        &self,
        source: UploadSource,
        remote_path: &str,
        token: &CancellationToken,
    ) -> FtpResult<UploadStatus> {
        self.ensure_ready(token)?;
        self.counters.upload.fetch_add(1, Ordering::SeqCst);

        let content = match source {
            UploadSource::Bytes(b) => b,
            UploadSource::Stream(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Bytes::from(buf)
            }
        };

        let status = self.store().upload_status.unwrap_or(UploadStatus::Success);
        if status == UploadStatus::Success {
            self.add_file(remote_path, content, Some(Utc::now()));
        }
        Ok(status)
    }

    async fn delete(&self, path: &str, token: &CancellationToken) -> FtpResult<()> {
        self.ensure_ready(token)?;
        self.counters.delete.fetch_add(1, Ordering::SeqCst);
        let path = normalise(path);
        let mut store = self.store();
        let before = store.nodes.len();
        store.nodes.retain(|(p, _)| *p != path);
        if store.nodes.len() == before {
            return Err(FtpError::not_found(&path));
        }
        Ok(())
    }
}

/// Builds forks of a template client, so every built client sees the same tree.
pub struct InMemoryClientBuilder {
    template: InMemoryClient,
}

impl InMemoryClientBuilder {
    pub fn new(template: InMemoryClient) -> Self {
        Self { template }
    }
}

impl ClientBuilder for InMemoryClientBuilder {
    fn build(&self, options: &ConnectionOptions) -> FtpResult<SharedClient> {
        options.validate()?;
        Ok(Arc::new(self.template.fork()))
    }
}

// ─── Path helpers ────────────────────────────────────────────────────

fn normalise(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

fn is_below(path: &str, root: &str) -> bool {
    if root == "/" {
        path != "/"
    } else {
        path.len() > root.len() && path.starts_with(root) && path.as_bytes()[root.len()] == b'/'
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FtpErrorKind;
    use chrono::TimeZone;

    fn at(secs: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(secs, 0).single()
    }

    #[tokio::test]
    async fn lists_direct_children_in_insertion_order() {
        let client = InMemoryClient::new();
        client
            .add_file("/in/b.txt", "bb", at(20))
            .add_directory("/in/sub", at(5))
            .add_file("/in/sub/c.txt", "c", at(30))
            .add_file("/in/a.txt", "a", at(10))
            .add_file("/other/x.txt", "x", at(1));

        let token = CancellationToken::new();
        client.connect(&token).await.unwrap();

        let flat = client.list(Some("/in"), ListOptions::default(), &token).await.unwrap();
        let names: Vec<_> = flat.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["b.txt", "sub", "a.txt"]);
        assert_eq!(flat[0].size, 2);
        assert_eq!(flat[1].kind, EntryKind::Directory);

        let deep = client.list(Some("/in/"), ListOptions::recursive(), &token).await.unwrap();
        assert_eq!(deep.len(), 4);
        assert!(deep.iter().any(|e| e.full_path == "/in/sub/c.txt"));
    }

    #[tokio::test]
    async fn operations_require_connection() {
        let client = InMemoryClient::new();
        client.add_file("/a.txt", "a", None);
        let token = CancellationToken::new();

        let err = client.download("/a.txt", &token).await.unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::NotConnected);

        client.connect(&token).await.unwrap();
        assert_eq!(client.download("/a.txt", &token).await.unwrap(), Bytes::from("a"));
    }

    #[tokio::test]
    async fn injected_failures_surface_as_errors() {
        let client = InMemoryClient::new();
        client.add_file("/a.txt", "a", None).fail_path("/a.txt");
        let token = CancellationToken::new();
        client.connect(&token).await.unwrap();

        let err = client.download("a.txt", &token).await.unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::TransferFailed);
        assert_eq!(err.path.as_deref(), Some("/a.txt"));
        assert!(client.open_read("/a.txt", &token).await.is_err());

        client.set_fail_listing(true);
        assert!(client.list(None, ListOptions::default(), &token).await.is_err());
    }

    #[tokio::test]
    async fn unlistable_sub_directory_is_skipped_not_fatal() {
        let client = InMemoryClient::new();
        client
            .add_file("/in/a.txt", "a", at(10))
            .add_directory("/in/locked", at(5))
            .add_file("/in/locked/x.txt", "x", at(20))
            .add_file("/in/open/b.txt", "b", at(30))
            .fail_listing_of("/in/locked");
        let token = CancellationToken::new();
        client.connect(&token).await.unwrap();

        let deep = client.list(Some("/in"), ListOptions::recursive(), &token).await.unwrap();
        let paths: Vec<_> = deep.iter().map(|e| e.full_path.as_str()).collect();
        assert_eq!(paths, ["/in/a.txt", "/in/locked", "/in/open/b.txt"]);

        let err = client
            .list(Some("/in/locked"), ListOptions::default(), &token)
            .await
            .unwrap_err();
        assert_eq!(err.path.as_deref(), Some("/in/locked"));
    }

    #[tokio::test]
    async fn upload_and_delete_round_trip() {
        let client = InMemoryClient::new();
        let token = CancellationToken::new();
        client.connect(&token).await.unwrap();

        let reader: RemoteStream = Box::new(Cursor::new(Bytes::from_static(b"hello")));
        let status = client
            .upload(UploadSource::Stream(reader), "/out/h.txt", &token)
            .await
            .unwrap();
        assert_eq!(status, UploadStatus::Success);
        assert_eq!(client.file("/out/h.txt"), Some(Bytes::from_static(b"hello")));

        client.delete("/out/h.txt", &token).await.unwrap();
        assert!(client.delete("/out/h.txt", &token).await.is_err());
        assert_eq!(client.calls().upload, 1);
        assert_eq!(client.calls().delete, 2);
    }

    #[tokio::test]
    async fn forks_share_the_tree_but_not_the_connection() {
        let client = InMemoryClient::new();
        let fork = client.fork();
        let token = CancellationToken::new();
        client.connect(&token).await.unwrap();

        assert!(!fork.is_connected());
        fork.add_file("/late.txt", "x", None);
        assert!(client.file("/late.txt").is_some());
    }

    #[test]
    fn cancelled_token_short_circuits() {
        let client = InMemoryClient::new();
        let token = CancellationToken::new();
        token.cancel();
        let err = tokio_test::block_on(client.connect(&token)).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(client.calls().connect, 0);
    }
}
