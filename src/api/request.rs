use axum::extract::{FromRequest, FromRequestParts};
use serde::Deserialize;

use crate::domain::{DecisionRecord, RuleAttributes};

use super::error::ApiError;

/// JSON body extractor whose rejections render as an `ErrorResponse`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// Path extractor whose rejections render as an `ErrorResponse`.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathParam<T>(pub T);

/// Body of a create/update rule request.
///
/// An `id` field, if present, is ignored: ids are always assigned by the store.
pub type RuleRequest = RuleAttributes;

/// Body of an override replay: either a bare array of rules or a rule document.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OverrideRulesRequest {
    List(Vec<RuleRequest>),
    Document { rules: Vec<RuleRequest> },
}

impl OverrideRulesRequest {
    pub fn into_rules(self) -> Vec<RuleRequest> {
        match self {
            OverrideRulesRequest::List(rules) => rules,
            OverrideRulesRequest::Document { rules } => rules,
        }
    }
}

/// Body of a decision log upload: a batch of events or a single event.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum LogsRequest {
    Batch(Vec<DecisionRecord>),
    Single(Box<DecisionRecord>),
}

impl LogsRequest {
    pub fn into_records(self) -> Vec<DecisionRecord> {
        match self {
            LogsRequest::Batch(records) => records,
            LogsRequest::Single(record) => vec![*record],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Action;

    #[test]
    fn test_rule_request_ignores_id() {
        let json = r#"{
            "id": "5a1c3f8e-2d7b-4c8e-9f21-6b4e3a7d9c10",
            "country": "Sweden",
            "city": "Oslo",
            "action": "deny"
        }"#;

        let req: RuleRequest = serde_json::from_str(json).unwrap();

        assert_eq!(req.city, "Oslo");
        assert_eq!(req.building, "");
        assert_eq!(req.action, Action::Deny);
    }

    #[test]
    fn test_override_rules_forms() {
        let list: OverrideRulesRequest =
            serde_json::from_str(r#"[{"role": "guest", "action": "allow"}]"#).unwrap();
        assert_eq!(list.into_rules().len(), 1);

        let doc: OverrideRulesRequest =
            serde_json::from_str(r#"{"rules": [{"role": "guest"}, {"role": "admin"}]}"#).unwrap();
        assert_eq!(doc.into_rules().len(), 2);
    }

    #[test]
    fn test_logs_request_forms() {
        let batch: LogsRequest = serde_json::from_str(
            r#"[{"decision_id": "d1", "input": {}}, {"decision_id": "d2", "input": {}}]"#,
        )
        .unwrap();
        assert_eq!(batch.into_records().len(), 2);

        let single: LogsRequest =
            serde_json::from_str(r#"{"decision_id": "d3", "input": {"role": "guest"}}"#).unwrap();
        let records = single.into_records();
        assert_eq!(records[0].decision_id, "d3");
    }
}
