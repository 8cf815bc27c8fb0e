//! The dispatch boundary: whatever runs user handling for a payload.

use crate::error::ExecutionError;
use crate::payload::TriggerPayload;
use async_trait::async_trait;
use std::future::Future;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Runs the handler for one payload. The listener awaits each call before
/// moving on, so a slow executor slows polling down.
#[async_trait]
pub trait TriggerExecutor: Send + Sync {
    async fn execute(
        &self,
        payload: TriggerPayload,
        token: &CancellationToken,
    ) -> Result<(), ExecutionError>;
}

/// Executor backed by an async closure.
pub struct FnExecutor<F> {
    handler: F,
}

impl<F, Fut> FnExecutor<F>
where
    F: Fn(TriggerPayload) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ExecutionError>> + Send + 'static,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F, Fut> TriggerExecutor for FnExecutor<F>
where
    F: Fn(TriggerPayload) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ExecutionError>> + Send + 'static,
{
    async fn execute(
        &self,
        payload: TriggerPayload,
        token: &CancellationToken,
    ) -> Result<(), ExecutionError> {
        if token.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }
        (self.handler)(payload).await
    }
}

/// Executor that forwards payloads to a channel for another task to handle.
/// A full channel blocks dispatch until the receiver catches up.
#[derive(Clone)]
pub struct ChannelExecutor {
    tx: mpsc::Sender<TriggerPayload>,
}

impl ChannelExecutor {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TriggerPayload>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl TriggerExecutor for ChannelExecutor {
    async fn execute(
        &self,
        payload: TriggerPayload,
        token: &CancellationToken,
    ) -> Result<(), ExecutionError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(ExecutionError::Cancelled),
            sent = self.tx.send(payload) => sent.map_err(|_| ExecutionError::Closed),
        }
    }
}
