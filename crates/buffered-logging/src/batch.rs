// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! A flushed group of entries and its retry state.
//!
//! # Lifecycle
//!
//! ```text
//!   Pending ──> InFlight ──success──> Delivered
//!                 ^   │
//!       backoff   │   └──failure──> retries left? ──no──> Exhausted
//!       elapsed   │                      │ yes
//!                 └──── Retrying <───────┘
//! ```
//!
//! A batch is attempted at most `max_retries + 1` times: the first send
//! plus up to `max_retries` retries.

use std::sync::Arc;
use std::time::Duration;

use derive_more::Display;

use crate::backoff::Backoff;
use crate::log_entry::LogEntry;

/// Identity of a batch, unique within one coordinator.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("batch-{_0}")]
pub struct BatchId(u64);

impl BatchId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Hands out increasing batch ids.
#[derive(Debug, Default)]
pub(crate) struct BatchIdGenerator {
    next: u64,
}

impl BatchIdGenerator {
    pub(crate) fn next_id(&mut self) -> BatchId {
        let id = BatchId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Created, not yet sent.
    Pending,
    /// Handed to the transport, awaiting its outcome.
    InFlight,
    /// Last attempt failed, waiting out the backoff delay.
    Retrying,
    Delivered,
    Exhausted,
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Send again after `delay`. `retry` counts retries so far, starting at 1.
    Retry { retry: u32, delay: Duration },
    /// No retries left.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct Batch {
    id: BatchId,
    entries: Arc<[LogEntry]>,
    state: BatchState,
    retry_count: u32,
    next_delay: Duration,
    attempts: u32,
}

impl Batch {
    pub(crate) fn new(id: BatchId, entries: Vec<LogEntry>) -> Self {
        Self {
            id,
            entries: entries.into(),
            state: BatchState::Pending,
            retry_count: 0,
            next_delay: Duration::ZERO,
            attempts: 0,
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn entries(&self) -> &Arc<[LogEntry]> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Delay scheduled before the pending retry; zero until the first failure.
    pub fn next_delay(&self) -> Duration {
        self.next_delay
    }

    /// Number of sends started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Marks the batch in flight and returns the entries to send.
    pub(crate) fn begin_attempt(&mut self) -> Arc<[LogEntry]> {
        self.state = BatchState::InFlight;
        self.attempts += 1;
        Arc::clone(&self.entries)
    }

    pub(crate) fn mark_delivered(&mut self) {
        self.state = BatchState::Delivered;
    }

    /// Records a failed attempt and decides whether another one follows.
    ///
    /// Call exactly once per failed attempt.
    pub(crate) fn retry(&mut self, max_retries: u32, backoff: &Backoff) -> RetryDecision {
        if self.retry_count >= max_retries {
            self.state = BatchState::Exhausted;
            return RetryDecision::Exhausted;
        }

        self.retry_count += 1;
        self.next_delay = backoff.delay_for(self.retry_count);
        self.state = BatchState::Retrying;

        RetryDecision::Retry {
            retry: self.retry_count,
            delay: self.next_delay,
        }
    }
}
