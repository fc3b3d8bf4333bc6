use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::domain::{Revision, Rule, RuleAttributes, RuleId, RuleSetDocument};

use super::error::StoreError;

#[derive(Debug)]
struct Entry {
    /// Insertion sequence, used for stable ordering
    seq: u64,
    rule: Rule,
}

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    rules: AHashMap<RuleId, Entry>,
}

impl Inner {
    fn sorted(&self) -> Vec<Rule> {
        let mut entries: Vec<&Entry> = self.rules.values().collect();
        entries.sort_unstable_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.rule.clone()).collect()
    }
}

/// Concurrent in-memory rule repository.
///
/// Mutations take the write lock; reads share the read lock, so a reader
/// never observes a half-applied change. Callers only ever receive clones.
#[derive(Debug, Default)]
pub struct RuleStore {
    inner: RwLock<Inner>,
}

impl RuleStore {
    pub fn new() -> Self {
        RuleStore::default()
    }

    /// Validate and insert a new rule, returning its fresh id.
    ///
    /// Nothing is stored, and the insertion sequence does not advance, when
    /// validation fails.
    pub fn add(&self, attrs: RuleAttributes) -> Result<RuleId, StoreError> {
        let id = RuleId::new();
        let rule = Rule::new(id, attrs);

        if let Some(field) = rule.missing_field() {
            return Err(StoreError::InvalidRule(field));
        }

        let mut inner = self.inner.write();

        if inner.rules.contains_key(&id) {
            return Err(StoreError::DuplicateRuleId(id));
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.rules.insert(id, Entry { seq, rule });

        debug!(rule_id = %id, "Rule added");
        Ok(id)
    }

    pub fn get(&self, id: RuleId) -> Result<Rule, StoreError> {
        self.inner
            .read()
            .rules
            .get(&id)
            .map(|e| e.rule.clone())
            .ok_or(StoreError::RuleNotFound(id))
    }

    /// All rules in insertion order.
    pub fn get_all(&self) -> Vec<Rule> {
        self.inner.read().sorted()
    }

    /// Canonical JSON of all rules plus its revision, taken from one snapshot.
    pub fn get_all_serialized(&self) -> Result<(Vec<u8>, Revision), StoreError> {
        let document = RuleSetDocument {
            rules: self.get_all(),
        };

        let data = serde_json::to_vec(&document)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let revision = Revision::of(&data);

        Ok((data, revision))
    }

    /// Merge the non-empty fields of `attrs` into an existing rule.
    pub fn set(&self, id: RuleId, attrs: RuleAttributes) -> Result<(), StoreError> {
        let mut inner = self.inner.write();

        let entry = inner
            .rules
            .get_mut(&id)
            .ok_or(StoreError::RuleNotFound(id))?;
        entry.rule.merge(attrs);

        debug!(rule_id = %id, "Rule updated");
        Ok(())
    }

    pub fn delete(&self, id: RuleId) -> Result<(), StoreError> {
        let mut inner = self.inner.write();

        if inner.rules.remove(&id).is_none() {
            return Err(StoreError::RuleNotFound(id));
        }

        debug!(rule_id = %id, "Rule deleted");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.read().rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
