//! Trigger and output settings as supplied by configuration, and the
//! validated poll configuration the listener runs with.

use crate::error::{TriggerError, TriggerResult};
use crate::interval::{parse_optional_interval, DEFAULT_POLLING_INTERVAL};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 32;

// ─── Trigger Mode ────────────────────────────────────────────────────

/// How the listener decides which files are new.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TriggerMode {
    /// Files modified after the last completed cycle.
    #[default]
    ModifyDate,
    /// Every file, every cycle.
    Always,
}

// ─── Trigger Settings ────────────────────────────────────────────────

/// Raw trigger settings. Call [`TriggerSettings::validate`] to obtain a
/// [`PollConfig`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TriggerSettings {
    /// Connection descriptor, the name of an environment variable holding
    /// one, or a registered connection name.
    pub connection: String,
    #[serde(default)]
    pub folder: Option<String>,
    /// `{integer}{s|m|h|d}`; one minute when absent.
    #[serde(default)]
    pub polling_interval: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
    #[serde(default = "default_true")]
    pub include_content: bool,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
    #[serde(default)]
    pub trigger_mode: TriggerMode,
}

fn default_batch_size() -> i64 {
    DEFAULT_BATCH_SIZE as i64
}

fn default_true() -> bool {
    true
}

impl TriggerSettings {
    pub fn new(connection: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            folder: None,
            polling_interval: None,
            batch_size: default_batch_size(),
            include_content: true,
            recursive: false,
            run_on_startup: true,
            trigger_mode: TriggerMode::ModifyDate,
        }
    }

    pub fn validate(&self) -> TriggerResult<PollConfig> {
        if self.connection.trim().is_empty() {
            return Err(TriggerError::config("Connection must not be empty"));
        }
        Ok(PollConfig {
            folder: normalise_folder(self.folder.as_deref()),
            polling_interval: parse_optional_interval(self.polling_interval.as_deref())?,
            batch_size: validate_batch_size(self.batch_size)?,
            include_content: self.include_content,
            recursive: self.recursive,
            run_on_startup: self.run_on_startup,
            trigger_mode: self.trigger_mode,
        })
    }
}

/// Reject non-positive batch sizes.
pub fn validate_batch_size(size: i64) -> TriggerResult<NonZeroUsize> {
    usize::try_from(size)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| TriggerError::config(format!("Batch size must be greater than zero, got {}", size)))
}

fn normalise_folder(folder: Option<&str>) -> Option<String> {
    folder
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
}

// ─── Poll Config ─────────────────────────────────────────────────────

/// Validated listener configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Folder to watch; the server root when `None`.
    pub folder: Option<String>,
    pub polling_interval: Duration,
    pub batch_size: NonZeroUsize,
    pub include_content: bool,
    pub recursive: bool,
    pub run_on_startup: bool,
    pub trigger_mode: TriggerMode,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            folder: None,
            polling_interval: DEFAULT_POLLING_INTERVAL,
            batch_size: NonZeroUsize::new(DEFAULT_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN),
            include_content: true,
            recursive: false,
            run_on_startup: true,
            trigger_mode: TriggerMode::ModifyDate,
        }
    }
}

// ─── Output Settings ─────────────────────────────────────────────────

/// Settings for the upload-side binding and for bound clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutputSettings {
    pub connection: String,
    #[serde(default)]
    pub folder: Option<String>,
    /// Connect before handing the client out.
    #[serde(default)]
    pub auto_connect: bool,
    /// Share one client per connection instead of creating one per binding.
    #[serde(default = "default_true")]
    pub cache_client: bool,
}

impl OutputSettings {
    pub fn new(connection: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            folder: None,
            auto_connect: false,
            cache_client: true,
        }
    }

    pub fn validate(&self) -> TriggerResult<()> {
        if self.connection.trim().is_empty() {
            return Err(TriggerError::config("Connection must not be empty"));
        }
        Ok(())
    }

    pub fn folder(&self) -> Option<&str> {
        self.folder.as_deref().map(str::trim).filter(|f| !f.is_empty())
    }
}
