//! Host wiring for the `ftpwatch` binary: config file, named connections and
//! an executor that logs what arrives.

use async_trait::async_trait;
use ftpwatch_client::{ClientFactory, FtpError};
use ftpwatch_trigger::{
    ExecutionError, FtpBindingProvider, FtpListener, PayloadShape, TriggerError, TriggerExecutor,
    TriggerPayload, TriggerSettings,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Environment variable naming the config file when no path is given.
pub const CONFIG_ENV: &str = "FTPWATCH_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("No config file given; pass a path or set FTPWATCH_CONFIG")]
    MissingConfig,

    #[error("Unable to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Client(#[from] FtpError),

    #[error(transparent)]
    Trigger(#[from] TriggerError),
}

/// Contents of the host config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    pub trigger: TriggerSettings,
    #[serde(default)]
    pub shape: PayloadShape,
    /// Named connections, registered before the trigger is bound.
    #[serde(default)]
    pub connections: BTreeMap<String, String>,
}

impl HostConfig {
    pub fn from_json(text: &str) -> Result<Self, HostError> {
        let config: Self = serde_json::from_str(text)?;
        config.trigger.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, HostError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Register the named connections on `factory` and build the listener.
    pub async fn build_listener(
        &self,
        factory: Arc<ClientFactory>,
        executor: Arc<dyn TriggerExecutor>,
    ) -> Result<FtpListener, HostError> {
        for (name, descriptor) in &self.connections {
            factory.register_descriptor(name, descriptor)?;
        }
        let provider = FtpBindingProvider::new(factory);
        Ok(provider
            .create_listener(&self.trigger, self.shape, executor)
            .await?)
    }
}

/// Logs every payload it receives.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingExecutor;

#[async_trait]
impl TriggerExecutor for LoggingExecutor {
    async fn execute(
        &self,
        payload: TriggerPayload,
        _token: &CancellationToken,
    ) -> Result<(), ExecutionError> {
        tracing::info!(payload = %payload.describe(), files = payload.len(), "Trigger fired");
        match &payload {
            TriggerPayload::File(item) => log_item(&item.full_path, item.size, item.content.is_some()),
            TriggerPayload::Stream(item) => log_item(&item.full_path, item.size, item.stream.is_some()),
            TriggerPayload::Files(items) => items
                .iter()
                .for_each(|i| log_item(&i.full_path, i.size, i.content.is_some())),
            TriggerPayload::Streams(items) => items
                .iter()
                .for_each(|i| log_item(&i.full_path, i.size, i.stream.is_some())),
        }
        Ok(())
    }
}

fn log_item(path: &str, size: u64, has_content: bool) {
    tracing::info!(path, size, has_content, "New file");
}
