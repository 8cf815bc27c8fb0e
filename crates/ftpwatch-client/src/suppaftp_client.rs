//! `RemoteClient` adapter over the blocking `suppaftp` stream.
//!
//! The control connection lives behind a std mutex and every remote call
//! runs on the blocking pool, one at a time.

use crate::client::{ClientBuilder, RemoteClient, SharedClient};
use crate::error::{FtpError, FtpResult};
use crate::options::{ConnectionOptions, Scheme};
use crate::types::*;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::io::Cursor;
use std::str::FromStr;
use std::sync::{Arc, Mutex as StdMutex, PoisonError, TryLockError};
use std::time::UNIX_EPOCH;
use suppaftp::FtpStream;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

type Slot = Arc<StdMutex<Option<FtpStream>>>;

/// Plain-FTP client backed by `suppaftp`.
pub struct SuppaFtpClient {
    options: ConnectionOptions,
    stream: Slot,
}

impl SuppaFtpClient {
    pub fn new(options: ConnectionOptions) -> FtpResult<Self> {
        options.validate()?;
        if options.scheme == Scheme::Secure {
            return Err(FtpError::unsupported(format!(
                "Secure connections are not available in this build ({})",
                options
            )));
        }
        Ok(Self {
            options,
            stream: Arc::new(StdMutex::new(None)),
        })
    }

    /// Run `op` against the connected stream on the blocking pool.
    async fn with_stream<T, F>(&self, token: &CancellationToken, op: F) -> FtpResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut FtpStream) -> FtpResult<T> + Send + 'static,
    {
        if token.is_cancelled() {
            return Err(FtpError::cancelled());
        }
        let slot = self.stream.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            let stream = guard.as_mut().ok_or_else(FtpError::not_connected)?;
            op(stream)
        })
        .await
        .map_err(|e| FtpError::io_error(format!("FTP worker failed: {}", e)))?
    }

    fn quit(taken: Option<FtpStream>) -> FtpResult<()> {
        match taken {
            Some(mut stream) => stream.quit().map_err(map_err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteClient for SuppaFtpClient {
    async fn connect(&self, token: &CancellationToken) -> FtpResult<()> {
        if token.is_cancelled() {
            return Err(FtpError::cancelled());
        }
        if self.is_connected() {
            return Ok(());
        }

        let address = self.options.address();
        let (user, pass) = self.options.login();
        let (user, pass) = (user.to_string(), pass.to_string());
        tracing::debug!(server = %self.options, "Connecting");

        let stream = tokio::task::spawn_blocking(move || -> FtpResult<FtpStream> {
            let mut stream = FtpStream::connect(address.as_str()).map_err(map_err)?;
            stream.login(&user, &pass).map_err(|e| match e {
                suppaftp::FtpError::UnexpectedResponse(_) => {
                    FtpError::auth_failed(format!("Login rejected for '{}'", user))
                }
                other => map_err(other),
            })?;
            Ok(stream)
        })
        .await
        .map_err(|e| FtpError::io_error(format!("FTP worker failed: {}", e)))??;

        *self.stream.lock().unwrap_or_else(PoisonError::into_inner) = Some(stream);
        Ok(())
    }

    async fn disconnect(&self) -> FtpResult<()> {
        let slot = self.stream.clone();
        tokio::task::spawn_blocking(move || {
            Self::quit(slot.lock().unwrap_or_else(PoisonError::into_inner).take())
        })
        .await
        .map_err(|e| FtpError::io_error(format!("FTP worker failed: {}", e)))?
    }

    /// Never waits for a transfer in flight; a busy stream is left to the
    /// async `disconnect`.
    fn disconnect_blocking(&self) -> FtpResult<()> {
        let taken = match self.stream.try_lock() {
            Ok(mut guard) => guard.take(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().take(),
            Err(TryLockError::WouldBlock) => {
                tracing::debug!(server = %self.options, "Stream busy, skipping blocking disconnect");
                return Ok(());
            }
        };
        Self::quit(taken)
    }

    fn is_connected(&self) -> bool {
        self.stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    async fn list(
        &self,
        folder: Option<&str>,
        options: ListOptions,
        token: &CancellationToken,
    ) -> FtpResult<Vec<RemoteEntry>> {
        let root = listing_root(folder);
        let walk_token = token.clone();
        self.with_stream(token, move |s| {
            walk_listing(&root, options.recursive, &walk_token, |dir| {
                s.list(Some(dir)).map_err(map_err)
            })
        })
        .await
    }

    async fn download(&self, path: &str, token: &CancellationToken) -> FtpResult<Bytes> {
        let remote = path.to_string();
        self.with_stream(token, move |s| {
            s.retr_as_buffer(&remote)
                .map(|cursor| Bytes::from(cursor.into_inner()))
                .map_err(|e| map_err(e).with_path(remote.clone()))
        })
        .await
    }

    async fn open_read(&self, path: &str, token: &CancellationToken) -> FtpResult<RemoteStream> {
        // The blocking stream cannot hand out a live data channel, so the
        // content is buffered and exposed as a reader.
        let content = self.download(path, token).await?;
        Ok(Box::new(Cursor::new(content)))
    }

    async fn upload(
        &self,
        source: UploadSource,
        remote_path: &str,
        token: &CancellationToken,
    ) -> FtpResult<UploadStatus> {
        let content = match source {
            UploadSource::Bytes(b) => b,
            UploadSource::Stream(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Bytes::from(buf)
            }
        };
        let remote = remote_path.to_string();
        self.with_stream(token, move |s| {
            let mut reader = Cursor::new(content);
            s.put_file(&remote, &mut reader)
                .map_err(|e| map_err(e).with_path(remote.clone()))?;
            Ok(UploadStatus::Success)
        })
        .await
    }

    async fn delete(&self, path: &str, token: &CancellationToken) -> FtpResult<()> {
        let remote = path.to_string();
        self.with_stream(token, move |s| {
            s.rm(&remote).map_err(|e| map_err(e).with_path(remote.clone()))
        })
        .await
    }
}

/// Default builder: one `SuppaFtpClient` per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuppaFtpBuilder;

impl ClientBuilder for SuppaFtpBuilder {
    fn build(&self, options: &ConnectionOptions) -> FtpResult<SharedClient> {
        Ok(Arc::new(SuppaFtpClient::new(options.clone())?))
    }
}

fn map_err(e: suppaftp::FtpError) -> FtpError {
    match e {
        suppaftp::FtpError::ConnectionError(io) => FtpError::from(io),
        suppaftp::FtpError::UnexpectedResponse(reply) => FtpError::from_reply(
            reply.status.code() as u16,
            String::from_utf8_lossy(&reply.body).trim(),
        ),
        other => FtpError::protocol_error(other.to_string()),
    }
}

/// Folder to list; the server root when none is given, never the login
/// directory, so that every `full_path` is absolute.
fn listing_root(folder: Option<&str>) -> String {
    match folder.map(str::trim) {
        Some(dir) if !dir.is_empty() => dir.to_string(),
        _ => "/".to_string(),
    }
}

/// List `root` and, when `recursive`, every directory below it, depth first.
///
/// Only a failure on `root` is an error. A sub-directory that cannot be
/// listed is logged and skipped; everything collected so far is kept.
fn walk_listing<F>(
    root: &str,
    recursive: bool,
    token: &CancellationToken,
    mut list_dir: F,
) -> FtpResult<Vec<RemoteEntry>>
where
    F: FnMut(&str) -> FtpResult<Vec<String>>,
{
    let mut pending = vec![root.to_string()];
    let mut entries = Vec::new();

    while let Some(dir) = pending.pop() {
        if token.is_cancelled() {
            return Err(FtpError::cancelled());
        }
        let lines = match list_dir(&dir) {
            Ok(lines) => lines,
            Err(e) if dir == root => return Err(e.with_path(dir)),
            Err(e) => {
                tracing::warn!(path = %dir, error = %e, "Unable to list sub-directory, skipping it");
                continue;
            }
        };

        for line in lines {
            let Some(entry) = parse_line(&line, Some(dir.as_str())) else {
                tracing::trace!(line = %line, "Skipping unparsable listing line");
                continue;
            };
            if recursive && entry.kind == EntryKind::Directory {
                pending.push(entry.full_path.clone());
            }
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Parse one `LIST` line into an entry under `dir`.
fn parse_line(line: &str, dir: Option<&str>) -> Option<RemoteEntry> {
    let file = suppaftp::list::File::from_str(line).ok()?;
    let name = file.name();
    if name == "." || name == ".." {
        return None;
    }

    let kind = if file.is_directory() {
        EntryKind::Directory
    } else if file.is_symlink() {
        EntryKind::Link
    } else {
        EntryKind::File
    };

    let modified = file
        .modified()
        .duration_since(UNIX_EPOCH)
        .ok()
        .filter(|d| !d.is_zero())
        .and_then(|d| DateTime::<Utc>::from_timestamp(d.as_secs() as i64, d.subsec_nanos()));

    Some(RemoteEntry {
        name: name.to_string(),
        full_path: join_remote(dir, name),
        size: file.size() as u64,
        modified,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FtpErrorKind;
    use tracing_test::traced_test;

    #[test]
    fn parses_unix_listing_lines() {
        let file = parse_line(
            "-rw-r--r-- 1 owner group 1234 Nov 05 2020 report.csv",
            Some("/in"),
        )
        .unwrap();
        assert_eq!(file.name, "report.csv");
        assert_eq!(file.full_path, "/in/report.csv");
        assert_eq!(file.size, 1234);
        assert_eq!(file.kind, EntryKind::File);
        assert!(file.modified.is_some());

        let dir = parse_line("drwxr-xr-x 2 owner group 4096 Nov 05 2020 archive", None).unwrap();
        assert_eq!(dir.kind, EntryKind::Directory);
        assert_eq!(dir.full_path, "/archive");

        assert!(parse_line("drwxr-xr-x 2 owner group 4096 Nov 05 2020 .", None).is_none());
        assert!(parse_line("total 12", None).is_none());
    }

    fn listing(lines: &[&str]) -> FtpResult<Vec<String>> {
        Ok(lines.iter().map(|l| l.to_string()).collect())
    }

    #[test]
    fn absent_folder_lists_the_server_root() {
        assert_eq!(listing_root(None), "/");
        assert_eq!(listing_root(Some("  ")), "/");
        assert_eq!(listing_root(Some("/in")), "/in");

        let mut asked = Vec::new();
        let entries = walk_listing(&listing_root(None), false, &CancellationToken::new(), |dir| {
            asked.push(dir.to_string());
            listing(&["-rw-r--r-- 1 owner group 3 Nov 05 2020 a.csv"])
        })
        .unwrap();
        assert_eq!(asked, ["/"]);
        assert_eq!(entries[0].full_path, "/a.csv");
    }

    #[test]
    #[traced_test]
    fn unlistable_sub_directory_keeps_the_rest() {
        let entries = walk_listing("/in", true, &CancellationToken::new(), |dir| match dir {
            "/in" => listing(&[
                "-rw-r--r-- 1 owner group 3 Nov 05 2020 a.csv",
                "drwxr-xr-x 2 owner group 4096 Nov 05 2020 locked",
                "drwxr-xr-x 2 owner group 4096 Nov 05 2020 open",
            ]),
            "/in/open" => listing(&["-rw-r--r-- 1 owner group 5 Nov 05 2020 b.csv"]),
            _ => Err(FtpError::from_reply(550, "Permission denied")),
        })
        .unwrap();

        let paths: Vec<_> = entries.iter().map(|e| e.full_path.as_str()).collect();
        assert!(paths.contains(&"/in/a.csv"));
        assert!(paths.contains(&"/in/open/b.csv"));
        assert_eq!(paths.len(), 4);
        assert!(logs_contain("Unable to list sub-directory"));
    }

    #[test]
    fn unlistable_root_is_an_error() {
        let err = walk_listing("/in", true, &CancellationToken::new(), |_| {
            Err(FtpError::from_reply(550, "No such file or directory"))
        })
        .unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::NotFound);
        assert_eq!(err.path.as_deref(), Some("/in"));
    }

    #[test]
    fn cancelled_walk_stops_before_listing() {
        let token = CancellationToken::new();
        token.cancel();
        let err = walk_listing("/", true, &token, |_| listing(&[])).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn blocking_disconnect_skips_a_busy_stream() {
        let client = SuppaFtpClient::new(ConnectionOptions::new("localhost")).unwrap();
        let _busy = client.stream.lock().unwrap();
        assert!(client.disconnect_blocking().is_ok());
    }

    #[test]
    fn secure_scheme_is_rejected() {
        let options = ConnectionOptions::parse("ftps://host").unwrap();
        let err = SuppaFtpBuilder.build(&options).err().unwrap();
        assert_eq!(err.kind, FtpErrorKind::Unsupported);
    }

    #[tokio::test]
    async fn calls_before_connect_fail_without_network() {
        let client = SuppaFtpClient::new(ConnectionOptions::new("localhost")).unwrap();
        let token = CancellationToken::new();
        assert!(!client.is_connected());
        let err = client.download("/a", &token).await.unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::NotConnected);
        assert!(client.disconnect().await.is_ok());
        assert!(client.disconnect_blocking().is_ok());
    }
}
