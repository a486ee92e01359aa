// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use buffered_logging::{FailureHandler, LogEntry, SendOutcome, Transport};

/// Transport that records every batch it is given and answers from a
/// script of outcomes, falling back to a fixed outcome once it runs out.
pub struct RecordingTransport {
    script: Mutex<VecDeque<SendOutcome>>,
    fallback: SendOutcome,
    batches: Mutex<Vec<Vec<String>>>,
}

impl RecordingTransport {
    pub fn succeeding() -> Arc<Self> {
        Self::scripted(&[], SendOutcome::Success)
    }

    pub fn failing() -> Arc<Self> {
        Self::scripted(&[], SendOutcome::Failure)
    }

    pub fn scripted(script: &[SendOutcome], fallback: SendOutcome) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.iter().copied().collect()),
            fallback,
            batches: Mutex::new(Vec::new()),
        })
    }

    /// Messages of each batch, in the order the transport was called.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, entries: Arc<[LogEntry]>) -> SendOutcome {
        self.batches
            .lock()
            .unwrap()
            .push(entries.iter().map(|e| e.message().to_string()).collect());
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or(self.fallback)
    }
}

/// Failure handler that keeps every batch it is given.
#[derive(Default)]
pub struct RecordingFailures {
    batches: Mutex<Vec<Vec<String>>>,
}

impl RecordingFailures {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }
}

impl FailureHandler for RecordingFailures {
    fn on_permanent_failure(&self, entries: Arc<[LogEntry]>) {
        self.batches
            .lock()
            .unwrap()
            .push(entries.iter().map(|e| e.message().to_string()).collect());
    }
}
