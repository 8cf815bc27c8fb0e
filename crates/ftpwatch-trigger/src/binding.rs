//! Binding provider: turns settings into listeners, collectors and clients.

use crate::collector::UploadCollector;
use crate::error::{TriggerError, TriggerResult};
use crate::executor::TriggerExecutor;
use crate::listener::FtpListener;
use crate::payload::PayloadShape;
use crate::settings::{OutputSettings, TriggerSettings};
use ftpwatch_client::{ClientFactory, ConnectionOptions, FtpError, FtpErrorKind, SharedClient};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Resolve a connection setting: the value of the environment variable it
/// names, or the setting itself when no such variable is set.
pub fn resolve_connection(setting: &str) -> String {
    resolve_connection_with(setting, |name| std::env::var(name).ok())
}

pub fn resolve_connection_with<F>(setting: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let setting = setting.trim();
    lookup(setting)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| setting.to_string())
}

/// Creates bindings over a shared [`ClientFactory`].
#[derive(Clone)]
pub struct FtpBindingProvider {
    factory: Arc<ClientFactory>,
}

impl FtpBindingProvider {
    pub fn new(factory: Arc<ClientFactory>) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &ClientFactory {
        &self.factory
    }

    /// Cache key and options for a connection setting. Registered names win
    /// over environment variables and raw descriptors.
    pub fn connection(&self, setting: &str) -> TriggerResult<(String, ConnectionOptions)> {
        let setting = setting.trim();
        if let Some(options) = self.factory.registered(setting) {
            return Ok((setting.to_string(), options));
        }
        let descriptor = resolve_connection(setting);
        let options = ConnectionOptions::parse(&descriptor).map_err(TriggerError::Descriptor)?;
        Ok((descriptor, options))
    }

    /// Client for direct use: shared per connection when `cache_client` is
    /// set, otherwise a fresh one owned by the caller.
    pub async fn bind_client(
        &self,
        settings: &OutputSettings,
        token: &CancellationToken,
    ) -> TriggerResult<SharedClient> {
        settings.validate()?;
        let (key, options) = self.connection(&settings.connection)?;
        let result = if settings.cache_client {
            self.factory
                .get_or_create(&key, &options, settings.auto_connect, token)
                .await
        } else {
            self.factory
                .create_exclusive(&options, settings.auto_connect, token)
                .await
        };
        result.map_err(client_error)
    }

    pub async fn create_collector(
        &self,
        settings: &OutputSettings,
        token: &CancellationToken,
    ) -> TriggerResult<UploadCollector> {
        let client = self.bind_client(settings, token).await?;
        Ok(UploadCollector::new(client, settings.folder().map(str::to_string)))
    }

    /// Validate the settings and build an unstarted listener with its own
    /// exclusive client.
    pub async fn create_listener(
        &self,
        settings: &TriggerSettings,
        shape: PayloadShape,
        executor: Arc<dyn TriggerExecutor>,
    ) -> TriggerResult<FtpListener> {
        let config = settings.validate()?;
        let (_, options) = self.connection(&settings.connection)?;
        let client = self
            .factory
            .create_exclusive(&options, false, &CancellationToken::new())
            .await
            .map_err(client_error)?;

        tracing::info!(
            server = %options,
            folder = config.folder.as_deref().unwrap_or("/"),
            %shape,
            "Created FTP trigger listener"
        );
        Ok(FtpListener::new(config, shape, client, executor))
    }
}

fn client_error(e: FtpError) -> TriggerError {
    match e.kind {
        FtpErrorKind::InvalidFormat | FtpErrorKind::InvalidConfig | FtpErrorKind::Unsupported => {
            TriggerError::Descriptor(e)
        }
        _ => TriggerError::Connection(e),
    }
}
