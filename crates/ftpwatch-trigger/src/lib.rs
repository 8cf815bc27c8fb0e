//! # ftpwatch-trigger: polling FTP trigger
//!
//! Watches a remote folder and hands new files to a [`TriggerExecutor`].
//!
//! Architecture:
//! - `settings`: trigger/output settings and the validated `PollConfig`
//! - `interval`: `{integer}{s|m|h|d}` polling interval parser
//! - `watermark`: last-completed-cycle timestamp
//! - `differ`: selects new files from a listing
//! - `batch`: lazy fixed-size grouping
//! - `payload`: items, payloads and the payload shape
//! - `materialize`: entry → item, with per-item failure isolation
//! - `executor`: the dispatch boundary
//! - `listener`: poll loop and listener lifecycle
//! - `collector`: upload-side binding
//! - `binding`: builds listeners, collectors and bound clients from settings

pub mod error;
pub mod settings;
pub mod interval;
pub mod watermark;
pub mod differ;
pub mod batch;
pub mod payload;
pub mod materialize;
pub mod executor;
pub mod listener;
pub mod collector;
pub mod binding;

pub use batch::{batches, Batches};
pub use binding::{resolve_connection, resolve_connection_with, FtpBindingProvider};
pub use collector::{UploadCollector, UploadItem};
pub use differ::diff;
pub use error::{ExecutionError, TriggerError, TriggerResult};
pub use executor::{ChannelExecutor, FnExecutor, TriggerExecutor};
pub use interval::{parse_interval, DEFAULT_POLLING_INTERVAL};
pub use listener::{CycleReport, FtpListener, ListenerState, ListenerStatus, Poller};
pub use materialize::{fetch_file, materialize_file, materialize_stream, open_stream};
pub use payload::{FileItem, PayloadShape, StreamItem, TriggerPayload};
pub use settings::{
    validate_batch_size, OutputSettings, PollConfig, TriggerMode, TriggerSettings,
    DEFAULT_BATCH_SIZE,
};
pub use watermark::Watermark;
