use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::domain::DecisionRecord;

use super::error::StoreError;

/// Append-only log of past decisions keyed by decision id.
#[derive(Debug, Default)]
pub struct DecisionLog {
    records: RwLock<BTreeMap<String, DecisionRecord>>,
}

impl DecisionLog {
    pub fn new() -> Self {
        DecisionLog::default()
    }

    /// Record a single decision. Duplicate ids are rejected, never overwritten.
    pub fn create(&self, record: DecisionRecord) -> Result<(), StoreError> {
        let mut records = self.records.write();

        if records.contains_key(&record.decision_id) {
            return Err(StoreError::DuplicateDecisionId(record.decision_id));
        }

        debug!(decision_id = %record.decision_id, "Decision recorded");
        records.insert(record.decision_id.clone(), record);
        Ok(())
    }

    /// Record a batch of decisions atomically.
    ///
    /// If any id already exists, or appears twice in the batch, nothing is stored.
    pub fn create_multiple(&self, batch: Vec<DecisionRecord>) -> Result<usize, StoreError> {
        let mut records = self.records.write();

        let mut seen = HashSet::with_capacity(batch.len());
        for record in &batch {
            if records.contains_key(&record.decision_id) || !seen.insert(&record.decision_id) {
                return Err(StoreError::DuplicateDecisionId(record.decision_id.clone()));
            }
        }

        let count = batch.len();
        for record in batch {
            records.insert(record.decision_id.clone(), record);
        }

        debug!(count, "Decision batch recorded");
        Ok(count)
    }

    pub fn read(&self, decision_id: &str) -> Result<DecisionRecord, StoreError> {
        self.records
            .read()
            .get(decision_id)
            .cloned()
            .ok_or_else(|| StoreError::DecisionNotFound(decision_id.to_string()))
    }

    /// All records, ordered by decision id.
    pub fn read_all(&self) -> Vec<DecisionRecord> {
        self.records.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
