// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types surfaced to callers of the buffered logging pipeline.
//!
//! Failed deliveries are not errors here: a transport reporting failure
//! drives the retry loop, and a batch that runs out of retries is handed to
//! the [`FailureHandler`](crate::transport::FailureHandler). Neither ever
//! comes back to the caller of `submit`.

use std::time::Duration;

/// Invalid buffer configuration, detected when the configuration is built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("saveTime must be greater than 0")]
    ZeroSaveTime,

    #[error("saveTime ({save_time:?}) must not exceed {max:?}")]
    SaveTimeTooLarge { save_time: Duration, max: Duration },

    #[error("minBufferSize ({min}) must not exceed maxBufferSize ({max})")]
    MinExceedsMax { min: usize, max: usize },

    #[error("retry base delay must be greater than 0")]
    ZeroRetryDelay,

    #[error("max retry delay ({max:?}) must not be lower than the retry base delay ({base:?})")]
    RetryCapBelowBase { base: Duration, max: Duration },

    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Returned by submission when the coordinator is no longer running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("delivery coordinator is closed")]
    Closed,
}

/// Returned by request/response commands (flush, stats) when no answer arrives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("failed to send {0} command: coordinator is closed")]
    Send(&'static str),

    #[error("failed to receive {0} response: coordinator stopped")]
    Receive(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::MinExceedsMax { min: 5, max: 2 };
        assert_eq!(
            error.to_string(),
            "minBufferSize (5) must not exceed maxBufferSize (2)"
        );
        assert_eq!(
            ConfigError::ZeroSaveTime.to_string(),
            "saveTime must be greater than 0"
        );
    }

    #[test]
    fn test_invalid_env_display() {
        let error = ConfigError::InvalidEnv {
            var: "BUFFERED_LOG_MAX_RETRIES",
            value: "many".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "invalid value \"many\" for BUFFERED_LOG_MAX_RETRIES"
        );
    }

    #[test]
    fn test_query_error_display() {
        assert_eq!(
            QueryError::Send("flush").to_string(),
            "failed to send flush command: coordinator is closed"
        );
        assert_eq!(
            QueryError::Receive("stats").to_string(),
            "failed to receive stats response: coordinator stopped"
        );
    }

    #[test]
    fn test_submit_error_debug() {
        let debug_str = format!("{:?}", SubmitError::Closed);
        assert!(debug_str.contains("Closed"));
    }
}
