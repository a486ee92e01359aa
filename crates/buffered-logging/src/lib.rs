// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client-side log buffering and delivery.
//!
//! Entries are accumulated in memory and flushed as batches when the buffer
//! reaches its maximum size, or when the save timer fires with at least the
//! minimum size pending. Each batch is handed to a caller-supplied
//! [`Transport`]; failed batches are retried with growing delays, and once
//! their retries are exhausted the entries are passed to a
//! [`FailureHandler`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use buffered_logging::{
//!     BufferConfig, DeliveryCoordinator, DropFailedLogs, FnTransport, LogEntry, LogLevel,
//!     SendOutcome,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = FnTransport::new(|entries: Arc<[LogEntry]>| async move {
//!     println!("shipping {} entries", entries.len());
//!     SendOutcome::Success
//! });
//! let (handle, task) = DeliveryCoordinator::spawn(
//!     BufferConfig::from_env()?,
//!     Arc::new(transport),
//!     Arc::new(DropFailedLogs),
//! );
//!
//! handle.submit(LogEntry::new("user signed in").with_level(LogLevel::Info), false)?;
//! handle.flush().await?;
//! handle.shutdown()?;
//! task.await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod backoff;
pub mod batch;
pub mod buffer;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod log_entry;
pub mod registry;
pub mod transport;

pub use backoff::Backoff;
pub use batch::{Batch, BatchId, BatchState, RetryDecision};
pub use buffer::{Flush, FlushReason, LogBuffer};
pub use config::BufferConfig;
pub use coordinator::{CoordinatorHandle, DeliveryCoordinator, DeliveryStats};
pub use error::{ConfigError, QueryError, SubmitError};
pub use log_entry::{LogEntry, LogLevel, ParseLevelError};
pub use registry::InFlightRegistry;
pub use transport::{
    CallbackTransport, Completion, DropFailedLogs, FailureHandler, FnTransport, SendOutcome,
    Transport,
};
