// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The log record handed to the buffer.
//!
//! A [`LogEntry`] is built once by the caller and never mutated afterwards.
//! Once buffered it is owned by whichever batch currently carries it and is
//! dropped with that batch.

use std::collections::BTreeMap;
use std::str::FromStr;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a log entry.
///
/// Serialized as the upper-case level name (`"DEBUG"`, `"INFO"`, ...).
#[derive(
    Debug, Display, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    #[default]
    #[display("DEBUG")]
    Debug,
    #[display("INFO")]
    Info,
    #[display("WARN")]
    Warn,
    #[display("ERROR")]
    Error,
    #[display("FATAL")]
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level {0:?}")]
pub struct ParseLevelError(String);

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// One immutable log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    message: String,
    #[serde(default)]
    level: LogLevel,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
}

impl LogEntry {
    /// Creates a `debug` entry with no metadata and no tags.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: LogLevel::default(),
            metadata: BTreeMap::new(),
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Adds one metadata field. A repeated key replaces the earlier value.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_metadata_map(mut self, metadata: BTreeMap<String, Value>) -> Self {
        self.metadata.extend(metadata);
        self
    }

    #[must_use]
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

impl From<&str> for LogEntry {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for LogEntry {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_entry_defaults() {
        let entry = LogEntry::new("hello");
        assert_eq!(entry.message(), "hello");
        assert_eq!(entry.level(), LogLevel::Debug);
        assert!(entry.metadata().is_empty());
        assert!(entry.tags().is_empty());
    }

    #[test]
    fn test_builder_methods() {
        let entry = LogEntry::new("payment failed")
            .with_level(LogLevel::Error)
            .with_metadata("order_id", 42)
            .with_metadata("retryable", false)
            .with_metadata("customer", json!({"tier": "gold", "region": "eu"}))
            .with_tags(["billing", "checkout"]);

        assert_eq!(entry.level(), LogLevel::Error);
        assert_eq!(entry.metadata().get("order_id"), Some(&json!(42)));
        assert_eq!(entry.metadata().get("retryable"), Some(&json!(false)));
        assert_eq!(
            entry.metadata().get("customer"),
            Some(&json!({"tier": "gold", "region": "eu"}))
        );
        assert_eq!(entry.tags(), ["billing", "checkout"]);
    }

    #[test]
    fn test_metadata_keys_are_unique() {
        let entry = LogEntry::new("m")
            .with_metadata("k", "first")
            .with_metadata("k", "second");
        assert_eq!(entry.metadata().len(), 1);
        assert_eq!(entry.metadata().get("k"), Some(&json!("second")));
    }

    #[test]
    fn test_with_metadata_map_merges() {
        let mut extra = BTreeMap::new();
        extra.insert("b".to_string(), json!(2));
        let entry = LogEntry::new("m").with_metadata("a", 1).with_metadata_map(extra);
        assert_eq!(entry.metadata().len(), 2);
    }

    #[test]
    fn test_level_display_and_parse() {
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
        assert_eq!(LogLevel::Fatal.to_string(), "FATAL");
        assert_eq!("info".parse::<LogLevel>(), Ok(LogLevel::Info));
        assert_eq!(" ERROR ".parse::<LogLevel>(), Ok(LogLevel::Error));
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Error < LogLevel::Fatal);
    }

    #[test]
    fn test_serialize_entry() {
        let entry = LogEntry::new("disk almost full")
            .with_level(LogLevel::Warn)
            .with_metadata("used_pct", 97);
        let value = serde_json::to_value(&entry).expect("serialize entry");
        assert_eq!(
            value,
            json!({"message": "disk almost full", "level": "WARN", "metadata": {"used_pct": 97}})
        );
    }

    #[test]
    fn test_deserialize_entry_without_optional_fields() {
        let entry: LogEntry =
            serde_json::from_str(r#"{"message":"boot","level":"INFO"}"#).expect("parse entry");
        assert_eq!(entry, LogEntry::new("boot").with_level(LogLevel::Info));
    }

    #[test]
    fn test_from_str_conversions() {
        let a: LogEntry = "a".into();
        let b: LogEntry = String::from("b").into();
        assert_eq!(a.message(), "a");
        assert_eq!(b.message(), "b");
    }
}
