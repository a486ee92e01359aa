// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Validated flush and retry configuration.
//!
//! A [`BufferConfig`] can only be obtained through a validating constructor,
//! so every buffer and batch built from one can rely on
//! `min_buffer_size <= max_buffer_size` and `0 < save_time <= MAX_SAVE_TIME`.
//!
//! # Environment Variables
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `BUFFERED_LOG_SAVE_TIME` | Seconds between buffer checks (fractional allowed, at most one day) | `5` |
//! | `BUFFERED_LOG_MIN_BUFFER_SIZE` | Entries required before a timed flush | `0` |
//! | `BUFFERED_LOG_MAX_BUFFER_SIZE` | Entries that force an immediate flush | `10` |
//! | `BUFFERED_LOG_MAX_RETRIES` | Retries after the first failed attempt | `3` |
//! | `BUFFERED_LOG_RETRY_BASE_DELAY_MS` | Backoff seed in milliseconds | `100` |
//! | `BUFFERED_LOG_MAX_RETRY_DELAY_MS` | Backoff ceiling in milliseconds | `30000` |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::backoff::Backoff;
use crate::error::ConfigError;

pub const DEFAULT_SAVE_TIME: Duration = Duration::from_secs(5);
/// Longest accepted `save_time`; the save timer's deadlines must stay representable.
pub const MAX_SAVE_TIME: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_MIN_BUFFER_SIZE: usize = 0;
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

const ENV_SAVE_TIME: &str = "BUFFERED_LOG_SAVE_TIME";
const ENV_MIN_BUFFER_SIZE: &str = "BUFFERED_LOG_MIN_BUFFER_SIZE";
const ENV_MAX_BUFFER_SIZE: &str = "BUFFERED_LOG_MAX_BUFFER_SIZE";
const ENV_MAX_RETRIES: &str = "BUFFERED_LOG_MAX_RETRIES";
const ENV_RETRY_BASE_DELAY_MS: &str = "BUFFERED_LOG_RETRY_BASE_DELAY_MS";
const ENV_MAX_RETRY_DELAY_MS: &str = "BUFFERED_LOG_MAX_RETRY_DELAY_MS";

/// Flush thresholds, timer period and retry budget for one coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferConfig {
    save_time: Duration,
    min_buffer_size: usize,
    max_buffer_size: usize,
    max_retries: u32,
    backoff: Backoff,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            save_time: DEFAULT_SAVE_TIME,
            min_buffer_size: DEFAULT_MIN_BUFFER_SIZE,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Backoff::new(DEFAULT_RETRY_BASE_DELAY, DEFAULT_MAX_RETRY_DELAY),
        }
    }
}

impl BufferConfig {
    /// Builds a configuration with the default backoff.
    pub fn new(
        save_time: Duration,
        min_buffer_size: usize,
        max_buffer_size: usize,
        max_retries: u32,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            save_time,
            min_buffer_size,
            max_buffer_size,
            max_retries,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads the configuration from `BUFFERED_LOG_*` environment variables.
    ///
    /// Unset variables keep their defaults; a set but unparsable variable
    /// is an error rather than being silently replaced.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let defaults = Self::default();

        let save_time = match lookup(ENV_SAVE_TIME) {
            Some(raw) => parse_seconds(ENV_SAVE_TIME, &raw)?,
            None => defaults.save_time,
        };
        let min_buffer_size =
            parse_var(&lookup, ENV_MIN_BUFFER_SIZE)?.unwrap_or(defaults.min_buffer_size);
        let max_buffer_size =
            parse_var(&lookup, ENV_MAX_BUFFER_SIZE)?.unwrap_or(defaults.max_buffer_size);
        let max_retries = parse_var(&lookup, ENV_MAX_RETRIES)?.unwrap_or(defaults.max_retries);
        let base = parse_var(&lookup, ENV_RETRY_BASE_DELAY_MS)?
            .map_or(defaults.backoff.base(), Duration::from_millis);
        let max = parse_var(&lookup, ENV_MAX_RETRY_DELAY_MS)?
            .map_or(defaults.backoff.max(), Duration::from_millis);

        let config = Self {
            save_time,
            min_buffer_size,
            max_buffer_size,
            max_retries,
            backoff: Backoff::new(base, max),
        };
        config.validate()?;
        Ok(config)
    }

    /// Replaces the retry backoff seed and ceiling.
    pub fn with_backoff(self, base: Duration, max: Duration) -> Result<Self, ConfigError> {
        let config = Self {
            backoff: Backoff::new(base, max),
            ..self
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_save_time(self, save_time: Duration) -> Result<Self, ConfigError> {
        let config = Self { save_time, ..self };
        config.validate()?;
        Ok(config)
    }

    pub fn with_buffer_sizes(self, min: usize, max: usize) -> Result<Self, ConfigError> {
        let config = Self {
            min_buffer_size: min,
            max_buffer_size: max,
            ..self
        };
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_max_retries(self, max_retries: u32) -> Self {
        Self {
            max_retries,
            ..self
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.save_time.is_zero() {
            return Err(ConfigError::ZeroSaveTime);
        }
        if self.save_time > MAX_SAVE_TIME {
            return Err(ConfigError::SaveTimeTooLarge {
                save_time: self.save_time,
                max: MAX_SAVE_TIME,
            });
        }
        if self.min_buffer_size > self.max_buffer_size {
            return Err(ConfigError::MinExceedsMax {
                min: self.min_buffer_size,
                max: self.max_buffer_size,
            });
        }
        if self.backoff.base().is_zero() {
            return Err(ConfigError::ZeroRetryDelay);
        }
        if self.backoff.max() < self.backoff.base() {
            return Err(ConfigError::RetryCapBelowBase {
                base: self.backoff.base(),
                max: self.backoff.max(),
            });
        }
        Ok(())
    }

    pub fn save_time(&self) -> Duration {
        self.save_time
    }

    pub fn min_buffer_size(&self) -> usize {
        self.min_buffer_size
    }

    pub fn max_buffer_size(&self) -> usize {
        self.max_buffer_size
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&'static str) -> Option<String>,
{
    lookup(var)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidEnv { var, value: raw })
        })
        .transpose()
}

fn parse_seconds(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidEnv {
        var,
        value: raw.to_string(),
    };
    let seconds = raw.trim().parse::<f64>().map_err(|_| invalid())?;
    Duration::try_from_secs_f64(seconds).map_err(|_| invalid())
}
