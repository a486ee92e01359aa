// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Reads log lines from stdin and writes them to stdout in batches, one JSON
//! array per line. Lines that parse as a JSON log entry are used as is;
//! anything else becomes the message of a new entry.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use buffered_logging::{
    BufferConfig, CoordinatorHandle, DeliveryCoordinator, DropFailedLogs, LogEntry, LogLevel,
    SendOutcome, Transport,
};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Writes each batch as a single line of JSON.
struct StdoutTransport {
    stdout: Mutex<Stdout>,
}

#[async_trait]
impl Transport for StdoutTransport {
    async fn send(&self, entries: Arc<[LogEntry]>) -> SendOutcome {
        let mut line = match serde_json::to_vec(&*entries) {
            Ok(line) => line,
            Err(e) => {
                error!("PIPE | Failed to serialize batch: {e}");
                return SendOutcome::Failure;
            }
        };
        line.push(b'\n');

        let mut stdout = self.stdout.lock().await;
        let written = async {
            stdout.write_all(&line).await?;
            stdout.flush().await
        }
        .await;
        if let Err(e) = &written {
            warn!("PIPE | Failed to write batch of {} entries: {e}", entries.len());
        }
        written.into()
    }
}

fn parse_line(line: &str, default_level: LogLevel) -> LogEntry {
    if line.trim_start().starts_with('{') {
        match serde_json::from_str::<LogEntry>(line) {
            Ok(entry) => return entry,
            Err(e) => debug!("PIPE | Treating line as plain text: {e}"),
        }
    }
    LogEntry::new(line).with_level(default_level)
}

async fn drain(handle: &CoordinatorHandle) {
    if let Err(e) = handle.flush().await {
        error!("PIPE | Final flush failed: {e}");
        return;
    }

    let waited = timeout(DRAIN_TIMEOUT, async {
        loop {
            match handle.stats().await {
                Ok(stats) if stats.in_flight == 0 => return Some(stats),
                Ok(_) => sleep(DRAIN_POLL_INTERVAL).await,
                Err(e) => {
                    error!("PIPE | Could not read delivery stats: {e}");
                    return None;
                }
            }
        }
    })
    .await;

    match waited {
        Ok(Some(stats)) => info!(
            "PIPE | Delivered {} batches ({} entries submitted, {} batches dropped)",
            stats.delivered, stats.submitted, stats.exhausted
        ),
        Ok(None) => {}
        Err(_) => warn!("PIPE | Gave up waiting for in-flight batches after {DRAIN_TIMEOUT:?}"),
    }
}

#[tokio::main]
pub async fn main() -> ExitCode {
    let log_level = env::var("BUFFERED_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(log_level).expect("could not parse log level in configuration"),
        )
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(false)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match BufferConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("PIPE | Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    let default_level = match env::var("BUFFERED_LOG_PIPE_LEVEL") {
        Ok(raw) => match raw.parse::<LogLevel>() {
            Ok(level) => level,
            Err(e) => {
                error!("PIPE | {e}");
                return ExitCode::FAILURE;
            }
        },
        Err(_) => LogLevel::default(),
    };

    let transport = Arc::new(StdoutTransport {
        stdout: Mutex::new(io::stdout()),
    });
    let (handle, task) = DeliveryCoordinator::spawn(config, transport, Arc::new(DropFailedLogs));

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => {
                    if let Err(e) = handle.submit(parse_line(&line, default_level), false) {
                        error!("PIPE | {e}");
                        break;
                    }
                }
                Ok(None) => {
                    debug!("PIPE | End of input");
                    break;
                }
                Err(e) => {
                    error!("PIPE | Failed to read stdin: {e}");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("PIPE | Interrupted, draining");
                break;
            }
        }
    }

    drain(&handle).await;
    if let Err(e) = handle.shutdown() {
        debug!("PIPE | {e}");
    }
    if let Err(e) = task.await {
        error!("PIPE | Coordinator task failed: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_uses_default_level() {
        let entry = parse_line("disk almost full", LogLevel::Warn);
        assert_eq!(entry.message(), "disk almost full");
        assert_eq!(entry.level(), LogLevel::Warn);
    }

    #[test]
    fn test_json_line_is_parsed() {
        let entry = parse_line(
            r#"{"message":"paid","level":"ERROR","metadata":{"amount":12}}"#,
            LogLevel::Debug,
        );
        assert_eq!(entry.message(), "paid");
        assert_eq!(entry.level(), LogLevel::Error);
        assert_eq!(
            entry.metadata().get("amount"),
            Some(&serde_json::Value::from(12))
        );
    }

    #[test]
    fn test_malformed_json_falls_back_to_text() {
        let entry = parse_line("{not json", LogLevel::Info);
        assert_eq!(entry.message(), "{not json");
        assert_eq!(entry.level(), LogLevel::Info);
    }
}
