//! The polling listener.
//!
//! A [`FtpListener`] owns one exclusive client and a background task that
//! runs the [`Poller`] loop: list, diff against the watermark, materialize,
//! dispatch, then sleep. Lifecycle:
//!
//! ```text
//! Created ──start──▶ Connecting ──ok──▶ Running ──stop──▶ Stopping ──▶ Stopped
//!                        └────────────── connect failed ─────────────────▲
//! ```

use crate::batch::batches;
use crate::error::{TriggerError, TriggerResult};
use crate::executor::TriggerExecutor;
use crate::interval::format_interval;
use crate::materialize::{materialize_file, materialize_stream};
use crate::payload::{FileItem, PayloadShape, StreamItem, TriggerPayload};
use crate::settings::PollConfig;
use crate::watermark::Watermark;
use chrono::Utc;
use ftpwatch_client::{ListOptions, RemoteEntry, SharedClient};
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ListenerState {
    Created,
    Connecting,
    Running,
    Stopping,
    Stopped,
}

impl ListenerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Connecting => "Connecting",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
        }
    }
}

/// Counters for one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    /// Entries returned by the listing.
    pub listed: usize,
    /// Files that passed the diff.
    pub matched: usize,
    pub materialized: usize,
    /// Files dropped because their content could not be fetched.
    pub skipped: usize,
    /// Executor calls made.
    pub dispatched: usize,
    /// Executor calls that returned an error.
    pub dispatch_failures: usize,
    pub listing_failed: bool,
    /// False when the cycle was cut short by cancellation.
    pub completed: bool,
}

/// Snapshot published on every state change and after every cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerStatus {
    pub id: String,
    pub state: ListenerState,
    pub watermark: Watermark,
    pub cycles_completed: u64,
    pub last_cycle: Option<CycleReport>,
}

type StatusTx = Arc<watch::Sender<ListenerStatus>>;

// ─── Poller ──────────────────────────────────────────────────────────

enum Materialized {
    File(FileItem),
    Stream(StreamItem),
}

/// The poll loop body. The only writer of its watermark and the only user
/// of its client.
pub struct Poller {
    id: String,
    config: PollConfig,
    shape: PayloadShape,
    client: SharedClient,
    executor: Arc<dyn TriggerExecutor>,
    watermark: Watermark,
    status: StatusTx,
}

impl Poller {
    /// A poller with its own status channel, for driving cycles directly.
    /// The client must already be connected.
    pub fn new(
        config: PollConfig,
        shape: PayloadShape,
        client: SharedClient,
        executor: Arc<dyn TriggerExecutor>,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        let status = Arc::new(initial_status(&id, &config));
        Self::with_status(id, config, shape, client, executor, status)
    }

    fn with_status(
        id: String,
        config: PollConfig,
        shape: PayloadShape,
        client: SharedClient,
        executor: Arc<dyn TriggerExecutor>,
        status: StatusTx,
    ) -> Self {
        let watermark = status.borrow().watermark;
        Self {
            id,
            config,
            shape,
            client,
            executor,
            watermark,
            status,
        }
    }

    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    pub fn subscribe(&self) -> watch::Receiver<ListenerStatus> {
        self.status.subscribe()
    }

    /// Run the loop until `token` is cancelled.
    pub async fn run(mut self, token: CancellationToken) {
        let interval = self.config.polling_interval;
        tracing::info!(
            listener = %self.id,
            folder = self.config.folder.as_deref().unwrap_or("/"),
            interval = %format_interval(interval),
            shape = %self.shape,
            "Polling started"
        );

        if !self.config.run_on_startup && !sleep_or_cancel(interval, &token).await {
            tracing::info!(listener = %self.id, "Polling stopped before the first cycle");
            return;
        }

        loop {
            let report = self.run_cycle(&token).await;
            if !report.completed || !sleep_or_cancel(interval, &token).await {
                break;
            }
        }
        tracing::info!(listener = %self.id, "Polling stopped");
    }

    /// One list → diff → materialize → dispatch pass. The watermark only
    /// advances when the cycle runs to the end.
    pub async fn run_cycle(&mut self, token: &CancellationToken) -> CycleReport {
        let mut report = CycleReport::default();
        if token.is_cancelled() {
            return report;
        }

        // Taken before listing so files landing mid-cycle are seen next time.
        let cycle_start = Utc::now();
        let options = ListOptions {
            recursive: self.config.recursive,
        };
        let entries = match self
            .client
            .list(self.config.folder.as_deref(), options, token)
            .await
        {
            Ok(entries) => entries,
            Err(e) if e.is_cancelled() => return report,
            Err(e) => {
                tracing::warn!(
                    listener = %self.id,
                    error = %e,
                    "Listing failed, treating this cycle as empty"
                );
                report.listing_failed = true;
                Vec::new()
            }
        };
        report.listed = entries.len();

        let matched = crate::differ::diff(entries, &self.watermark, self.config.trigger_mode);
        report.matched = matched.len();

        let group_size = if self.shape.is_batch() {
            self.config.batch_size
        } else {
            NonZeroUsize::MIN
        };

        for group in batches(matched, group_size) {
            let mut items = Vec::with_capacity(group.len());
            for entry in &group {
                if token.is_cancelled() {
                    self.publish(&report);
                    return report;
                }
                match self.materialize(entry, token).await {
                    Some(item) => items.push(item),
                    None => report.skipped += 1,
                }
            }
            report.materialized += items.len();

            if let Some(payload) = self.payload(items) {
                self.dispatch(payload, token, &mut report).await;
            }
        }

        self.watermark.advance(cycle_start);
        report.completed = true;
        tracing::debug!(
            listener = %self.id,
            listed = report.listed,
            matched = report.matched,
            skipped = report.skipped,
            dispatched = report.dispatched,
            watermark = %self.watermark,
            "Cycle complete"
        );
        self.publish(&report);
        report
    }

    async fn materialize(&self, entry: &RemoteEntry, token: &CancellationToken) -> Option<Materialized> {
        let client = self.client.as_ref();
        let include = self.config.include_content;
        if self.shape.is_stream() {
            materialize_stream(entry, client, include, token)
                .await
                .map(Materialized::Stream)
        } else {
            materialize_file(entry, client, include, token)
                .await
                .map(Materialized::File)
        }
    }

    /// Shape the surviving items. Empty groups produce nothing.
    fn payload(&self, mut items: Vec<Materialized>) -> Option<TriggerPayload> {
        if items.is_empty() {
            return None;
        }
        let payload = match self.shape {
            PayloadShape::SingleFile | PayloadShape::SingleStream => match items.pop()? {
                Materialized::File(item) => TriggerPayload::File(item),
                Materialized::Stream(item) => TriggerPayload::Stream(item),
            },
            PayloadShape::BatchFile => TriggerPayload::Files(
                items
                    .into_iter()
                    .filter_map(|i| match i {
                        Materialized::File(item) => Some(item),
                        Materialized::Stream(_) => None,
                    })
                    .collect(),
            ),
            PayloadShape::BatchStream => TriggerPayload::Streams(
                items
                    .into_iter()
                    .filter_map(|i| match i {
                        Materialized::Stream(item) => Some(item),
                        Materialized::File(_) => None,
                    })
                    .collect(),
            ),
        };
        Some(payload)
    }

    async fn dispatch(&self, payload: TriggerPayload, token: &CancellationToken, report: &mut CycleReport) {
        let description = payload.describe();
        report.dispatched += 1;
        if let Err(e) = self.executor.execute(payload, token).await {
            report.dispatch_failures += 1;
            tracing::warn!(
                listener = %self.id,
                payload = %description,
                error = %e,
                "Trigger execution failed"
            );
        }
    }

    fn publish(&self, report: &CycleReport) {
        self.status.send_modify(|s| {
            s.watermark = self.watermark;
            if report.completed {
                s.cycles_completed += 1;
            }
            s.last_cycle = Some(report.clone());
        });
    }
}

/// Sleep for `duration`; false when cancelled first.
async fn sleep_or_cancel(duration: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

fn initial_status(id: &str, config: &PollConfig) -> watch::Sender<ListenerStatus> {
    let (tx, _rx) = watch::channel(ListenerStatus {
        id: id.to_string(),
        state: ListenerState::Created,
        watermark: Watermark::initial(config.run_on_startup, Utc::now()),
        cycles_completed: 0,
        last_cycle: None,
    });
    tx
}

// ─── Listener ────────────────────────────────────────────────────────

/// Owns an exclusive client and the background poll task.
pub struct FtpListener {
    id: String,
    config: PollConfig,
    shape: PayloadShape,
    client: SharedClient,
    executor: Arc<dyn TriggerExecutor>,
    status: StatusTx,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl FtpListener {
    /// `client` must not be shared with anything else.
    pub fn new(
        config: PollConfig,
        shape: PayloadShape,
        client: SharedClient,
        executor: Arc<dyn TriggerExecutor>,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        let status = Arc::new(initial_status(&id, &config));
        Self {
            id,
            config,
            shape,
            client,
            executor,
            status,
            token: CancellationToken::new(),
            task: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn shape(&self) -> PayloadShape {
        self.shape
    }

    pub fn state(&self) -> ListenerState {
        self.status.borrow().state
    }

    pub fn status(&self) -> ListenerStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListenerStatus> {
        self.status.subscribe()
    }

    fn set_state(&self, state: ListenerState) {
        self.status.send_modify(|s| s.state = state);
    }

    /// Connect the client and spawn the poll task.
    pub async fn start(&mut self) -> TriggerResult<()> {
        let state = self.state();
        if state != ListenerState::Created {
            return Err(TriggerError::InvalidState {
                expected: ListenerState::Created.as_str(),
                actual: state.as_str(),
            });
        }

        self.set_state(ListenerState::Connecting);
        tracing::info!(listener = %self.id, "Connecting listener client");
        if let Err(e) = self.client.connect(&self.token).await {
            tracing::error!(listener = %self.id, error = %e, "Listener failed to connect");
            self.set_state(ListenerState::Stopped);
            return Err(TriggerError::Connection(e));
        }

        if !self.config.run_on_startup {
            let watermark = Watermark::initial(false, Utc::now());
            self.status.send_modify(|s| s.watermark = watermark);
        }

        let poller = Poller::with_status(
            self.id.clone(),
            self.config.clone(),
            self.shape,
            self.client.clone(),
            self.executor.clone(),
            self.status.clone(),
        );
        self.task = Some(tokio::spawn(poller.run(self.token.clone())));
        self.set_state(ListenerState::Running);
        Ok(())
    }

    /// Cancel the loop, disconnect and wait for the task to finish.
    /// Disconnect failures are logged, never returned.
    pub async fn stop(&mut self) {
        match self.state() {
            ListenerState::Stopped => return,
            ListenerState::Created => {
                self.set_state(ListenerState::Stopped);
                return;
            }
            _ => {}
        }

        self.set_state(ListenerState::Stopping);
        self.token.cancel();

        if let Err(e) = self.client.disconnect().await {
            tracing::warn!(listener = %self.id, error = %e, "Error disconnecting listener client");
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(listener = %self.id, error = %e, "Poll task ended abnormally");
            }
        }

        self.set_state(ListenerState::Stopped);
        tracing::info!(listener = %self.id, "Listener stopped");
    }

    /// Synchronous best-effort shutdown: cancel and disconnect without
    /// waiting for the task.
    pub fn cancel(&mut self) {
        self.token.cancel();
        if matches!(self.state(), ListenerState::Stopped | ListenerState::Created) {
            self.set_state(ListenerState::Stopped);
            return;
        }
        self.set_state(ListenerState::Stopping);
        if let Err(e) = self.client.disconnect_blocking() {
            tracing::warn!(listener = %self.id, error = %e, "Error disconnecting listener client");
        }
    }

    /// Tear down unconditionally and release the client.
    pub fn dispose(mut self) {
        self.cancel();
    }
}

impl Drop for FtpListener {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.set_state(ListenerState::Stopped);
    }
}
