//! # ftpwatch
//!
//! Polls a folder on an FTP server and hands new files to a handler.
//!
//! - [`client`]: connection options, the remote client capability, client cache
//! - [`trigger`]: listener, differ, batcher, materializer and bindings
//! - [`host`]: config file and logging executor used by the `ftpwatch` binary

pub mod host;

pub use ftpwatch_client as client;
pub use ftpwatch_trigger as trigger;

pub use ftpwatch_client::{ClientFactory, ConnectionOptions, RemoteClient, SharedClient};
pub use ftpwatch_trigger::{
    FtpBindingProvider, FtpListener, PayloadShape, TriggerExecutor, TriggerPayload, TriggerSettings,
};
