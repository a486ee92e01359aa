// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Capabilities supplied by the caller: delivering a batch, and being told
//! about batches that could not be delivered.
//!
//! The core never sees transport-specific errors. A [`Transport`] maps
//! timeouts, HTTP statuses and the like to a [`SendOutcome`] and reports it
//! exactly once per call by returning it.
//!
//! Collaborators written in a callback style can use [`CallbackTransport`]:
//! the closure receives a [`Completion`] that is consumed when the outcome
//! is reported, so it cannot report twice. Dropping it unreported counts as
//! a failed attempt.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::warn;

use crate::log_entry::LogEntry;

/// Result of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Success,
    Failure,
}

impl SendOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<bool> for SendOutcome {
    fn from(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

impl<E> From<Result<(), E>> for SendOutcome {
    fn from(result: Result<(), E>) -> Self {
        result.is_ok().into()
    }
}

/// Delivers one batch of entries.
///
/// Each attempt runs on its own task, so calls for different batches can
/// overlap and may reach the transport in a different order than the
/// batches were created, most visibly on a multi-thread runtime. Entries
/// within one call are always in submission order. Implementations that
/// need ordered delivery must serialize internally.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Attempts delivery of `entries`, in order.
    async fn send(&self, entries: Arc<[LogEntry]>) -> SendOutcome;
}

/// Receives the entries of a batch that exhausted its retries.
///
/// Called at most once per batch, from the coordinator task, so it should
/// hand the entries off rather than block.
pub trait FailureHandler: Send + Sync + 'static {
    fn on_permanent_failure(&self, entries: Arc<[LogEntry]>);
}

impl<F> FailureHandler for F
where
    F: Fn(Arc<[LogEntry]>) + Send + Sync + 'static,
{
    fn on_permanent_failure(&self, entries: Arc<[LogEntry]>) {
        self(entries);
    }
}

/// Failure handler that only logs the loss.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropFailedLogs;

impl FailureHandler for DropFailedLogs {
    fn on_permanent_failure(&self, entries: Arc<[LogEntry]>) {
        warn!(
            "BATCH | Dropping {} log entries after exhausting retries",
            entries.len()
        );
    }
}

/// Adapts an async closure into a [`Transport`].
pub struct FnTransport<F, Fut> {
    send_fn: F,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnTransport<F, Fut>
where
    F: Fn(Arc<[LogEntry]>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SendOutcome> + Send + 'static,
{
    pub fn new(send_fn: F) -> Self {
        Self {
            send_fn,
            _marker: PhantomData,
        }
    }
}

impl<F, Fut> fmt::Debug for FnTransport<F, Fut> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FnTransport")
    }
}

#[async_trait]
impl<F, Fut> Transport for FnTransport<F, Fut>
where
    F: Fn(Arc<[LogEntry]>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SendOutcome> + Send + 'static,
{
    async fn send(&self, entries: Arc<[LogEntry]>) -> SendOutcome {
        (self.send_fn)(entries).await
    }
}

/// Single-use token a callback-style transport resolves with the outcome.
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<SendOutcome>,
}

impl Completion {
    pub fn succeed(self) {
        self.complete(SendOutcome::Success);
    }

    pub fn fail(self) {
        self.complete(SendOutcome::Failure);
    }

    pub fn complete(self, outcome: impl Into<SendOutcome>) {
        // The receiver is gone only if the coordinator has stopped.
        let _ = self.tx.send(outcome.into());
    }
}

/// Adapts a callback-style `send(entries, completion)` into a [`Transport`].
pub struct CallbackTransport<F> {
    send_fn: F,
}

impl<F> CallbackTransport<F>
where
    F: Fn(Arc<[LogEntry]>, Completion) + Send + Sync + 'static,
{
    pub fn new(send_fn: F) -> Self {
        Self { send_fn }
    }
}

impl<F> fmt::Debug for CallbackTransport<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallbackTransport")
    }
}

#[async_trait]
impl<F> Transport for CallbackTransport<F>
where
    F: Fn(Arc<[LogEntry]>, Completion) + Send + Sync + 'static,
{
    async fn send(&self, entries: Arc<[LogEntry]>) -> SendOutcome {
        let (tx, rx) = oneshot::channel();
        (self.send_fn)(entries, Completion { tx });
        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("BATCH | Transport dropped its completion without reporting, treating as failure");
                SendOutcome::Failure
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    fn entries(messages: &[&str]) -> Arc<[LogEntry]> {
        messages.iter().map(|m| LogEntry::new(*m)).collect()
    }

    #[test]
    fn test_send_outcome_conversions() {
        assert_eq!(SendOutcome::from(true), SendOutcome::Success);
        assert_eq!(SendOutcome::from(false), SendOutcome::Failure);
        assert_eq!(SendOutcome::from(Ok::<(), String>(())), SendOutcome::Success);
        assert_eq!(
            SendOutcome::from(Err::<(), _>("timeout")),
            SendOutcome::Failure
        );
        assert!(SendOutcome::Success.is_success());
        assert!(!SendOutcome::Failure.is_success());
    }

    #[tokio::test]
    async fn test_fn_transport_forwards_entries() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let transport = FnTransport::new(move |entries: Arc<[LogEntry]>| {
            let seen = Arc::clone(&seen_clone);
            async move {
                seen.lock()
                    .unwrap()
                    .extend(entries.iter().map(|e| e.message().to_string()));
                SendOutcome::Success
            }
        });

        let outcome = transport.send(entries(&["a", "b"])).await;

        assert_eq!(outcome, SendOutcome::Success);
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_callback_transport_success() {
        let transport = CallbackTransport::new(|_entries, completion: Completion| {
            completion.succeed();
        });
        assert_eq!(transport.send(entries(&["x"])).await, SendOutcome::Success);
    }

    #[tokio::test]
    async fn test_callback_transport_async_completion() {
        let transport = CallbackTransport::new(|entries: Arc<[LogEntry]>, completion: Completion| {
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                completion.complete(entries.len() == 2);
            });
        });
        assert_eq!(
            transport.send(entries(&["x", "y"])).await,
            SendOutcome::Success
        );
        assert_eq!(transport.send(entries(&["x"])).await, SendOutcome::Failure);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_callback_transport_dropped_completion_is_failure() {
        let transport = CallbackTransport::new(|_entries, completion: Completion| {
            drop(completion);
        });
        assert_eq!(transport.send(entries(&["x"])).await, SendOutcome::Failure);
        assert!(logs_contain("dropped its completion"));
    }

    #[test]
    fn test_closure_failure_handler() {
        let received = Arc::new(Mutex::new(0usize));
        let received_clone = Arc::clone(&received);
        let handler = move |entries: Arc<[LogEntry]>| {
            *received_clone.lock().unwrap() += entries.len();
        };
        handler.on_permanent_failure(entries(&["a", "b", "c"]));
        assert_eq!(*received.lock().unwrap(), 3);
    }

    #[test]
    #[traced_test]
    fn test_drop_failed_logs_warns() {
        DropFailedLogs.on_permanent_failure(entries(&["a"]));
        assert!(logs_contain("Dropping 1 log entries"));
    }
}
