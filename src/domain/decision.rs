use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A previously made authorization decision, as uploaded by the evaluator's
/// decision logger.
///
/// Records are immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Caller-supplied unique id
    pub decision_id: String,

    /// The original evaluation input (opaque to this service)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,

    /// Query path that was evaluated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Result the evaluator returned at decision time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Bundle revisions active at decision time, by bundle name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bundles: BTreeMap<String, serde_json::Value>,

    /// Evaluator labels (instance id, version, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Evaluator timing metrics
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl DecisionRecord {
    /// Create a record with just an id and input.
    pub fn new(decision_id: impl Into<String>, input: serde_json::Value) -> Self {
        DecisionRecord {
            decision_id: decision_id.into(),
            input: Some(input),
            path: None,
            result: None,
            bundles: BTreeMap::new(),
            labels: BTreeMap::new(),
            metrics: BTreeMap::new(),
            timestamp: None,
        }
    }
}
