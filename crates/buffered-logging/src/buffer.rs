// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Accumulates log entries and decides when they form a batch.
//!
//! [`LogBuffer`] is a plain state machine with no clock of its own. The
//! coordinator calls [`LogBuffer::add_log`] for each submitted entry and
//! [`LogBuffer::on_tick`] each time the save timer fires, and reads
//! [`LogBuffer::timer_active`] afterwards to arm or disarm that timer.
//!
//! # Flush Rules
//!
//! ```text
//!   add_log ──> pending >= max ? ──yes──> flush (MaxSize)
//!                    │ no
//!                    v
//!              timer armed (first entry since empty)
//!                    │
//!   on_tick ──> pending >= min ? ──yes──> flush (Timer)
//!                    │ no
//!                    v
//!              stay armed, check again next tick
//! ```
//!
//! Every flush empties `pending` and disarms the timer. A flush that would
//! produce an empty batch is suppressed.

use std::mem;

use tracing::debug;

use crate::config::BufferConfig;
use crate::log_entry::LogEntry;

/// Why a flush happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// `pending` reached `max_buffer_size`.
    MaxSize,
    /// The save timer fired with at least `min_buffer_size` entries pending.
    Timer,
    /// Requested explicitly, thresholds ignored.
    Manual,
}

/// Entries removed from the buffer by one flush, in submission order.
#[derive(Debug, Clone, PartialEq)]
pub struct Flush {
    pub entries: Vec<LogEntry>,
    pub reason: FlushReason,
}

#[derive(Debug, Clone)]
pub struct LogBuffer {
    pending: Vec<LogEntry>,
    timer_active: bool,
    min_buffer_size: usize,
    max_buffer_size: usize,
}

impl LogBuffer {
    pub fn new(config: &BufferConfig) -> Self {
        Self {
            pending: Vec::new(),
            timer_active: false,
            min_buffer_size: config.min_buffer_size(),
            max_buffer_size: config.max_buffer_size(),
        }
    }

    /// Appends `entry`, flushing synchronously once `max_buffer_size` is reached.
    pub fn add_log(&mut self, entry: LogEntry) -> Option<Flush> {
        self.pending.push(entry);
        self.timer_active = true;

        if self.pending.len() >= self.max_buffer_size {
            return self.take(FlushReason::MaxSize);
        }
        None
    }

    /// Timer callback. Flushes once `min_buffer_size` is met, otherwise the
    /// timer stays armed and the check repeats on the next tick.
    pub fn on_tick(&mut self) -> Option<Flush> {
        if self.pending.is_empty() {
            self.timer_active = false;
            return None;
        }

        if self.pending.len() >= self.min_buffer_size {
            return self.take(FlushReason::Timer);
        }

        debug!(
            "BUFFER | {} entries pending, waiting for {} before flushing",
            self.pending.len(),
            self.min_buffer_size
        );
        None
    }

    /// Flushes whatever is pending, regardless of thresholds.
    pub fn flush_now(&mut self) -> Option<Flush> {
        self.take(FlushReason::Manual)
    }

    /// Removes all pending entries without producing a flush.
    pub fn drain(&mut self) -> Vec<LogEntry> {
        self.timer_active = false;
        mem::take(&mut self.pending)
    }

    pub fn timer_active(&self) -> bool {
        self.timer_active
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn take(&mut self, reason: FlushReason) -> Option<Flush> {
        self.timer_active = false;
        if self.pending.is_empty() {
            return None;
        }

        let entries = mem::take(&mut self.pending);
        debug!("BUFFER | Flushing {} entries ({:?})", entries.len(), reason);
        Some(Flush { entries, reason })
    }
}
