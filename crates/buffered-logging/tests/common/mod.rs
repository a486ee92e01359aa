// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

pub mod mocks;

use std::time::Duration;

use buffered_logging::{BufferConfig, CoordinatorHandle, DeliveryStats};
use tokio::time::{sleep, timeout};

pub fn config(save_time: Duration, min: usize, max: usize, max_retries: u32) -> BufferConfig {
    BufferConfig::new(save_time, min, max, max_retries).expect("valid test config")
}

/// Polls until nothing is buffered or awaiting delivery.
pub async fn wait_until_idle(handle: &CoordinatorHandle, limit: Duration) -> DeliveryStats {
    timeout(limit, async {
        loop {
            let stats = handle.stats().await.expect("coordinator running");
            if stats.in_flight == 0 && stats.buffered == 0 {
                return stats;
            }
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("coordinator did not go idle in time")
}
