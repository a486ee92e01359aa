// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batches awaiting a transport outcome or a retry timer.
//!
//! Each coordinator owns exactly one registry; nothing is shared between
//! coordinators. Insertion and removal are keyed by [`BatchId`] and are
//! idempotent: inserting a batch that is already present, or removing one
//! that is absent, changes nothing.

use std::collections::HashMap;

use crate::batch::{Batch, BatchId};

#[derive(Debug, Default)]
pub struct InFlightRegistry {
    batches: HashMap<BatchId, Batch>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `batch`. Returns `false`, leaving the registered batch
    /// untouched, if its id is already present.
    pub fn insert(&mut self, batch: Batch) -> bool {
        if self.batches.contains_key(&batch.id()) {
            return false;
        }
        self.batches.insert(batch.id(), batch);
        true
    }

    pub fn remove(&mut self, id: BatchId) -> Option<Batch> {
        self.batches.remove(&id)
    }

    pub fn get(&self, id: BatchId) -> Option<&Batch> {
        self.batches.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: BatchId) -> Option<&mut Batch> {
        self.batches.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Registered ids in creation order.
    pub fn ids(&self) -> Vec<BatchId> {
        let mut ids: Vec<BatchId> = self.batches.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Total entries held by registered batches.
    pub fn entry_count(&self) -> usize {
        self.batches.values().map(Batch::len).sum()
    }

    /// Empties the registry, returning its batches in creation order.
    pub fn drain(&mut self) -> Vec<Batch> {
        let mut batches: Vec<Batch> = self.batches.drain().map(|(_, batch)| batch).collect();
        batches.sort_unstable_by_key(Batch::id);
        batches
    }
}
