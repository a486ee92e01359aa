// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delay between successive retries of the same batch.

use std::time::Duration;

/// Quadratic backoff: retry `n` waits `base * n²`, capped at `max`.
///
/// The delay never decreases as `n` grows and is never zero, so a failed
/// batch is never re-sent immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    /// Callers guarantee `base > 0` and `max >= base`; [`BufferConfig`]
    /// validates both before building one.
    ///
    /// [`BufferConfig`]: crate::config::BufferConfig
    pub(crate) fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// `retry == 0` is treated as the first retry.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let n = retry.max(1);
        let factor = n.saturating_mul(n);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |delay| delay.min(self.max))
    }
}
