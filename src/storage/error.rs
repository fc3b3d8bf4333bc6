use thiserror::Error;

use crate::domain::RuleId;

/// Errors returned by the rule store and decision log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("rule not valid: {0} must be set")]
    InvalidRule(&'static str),

    #[error("rule {0} not found")]
    RuleNotFound(RuleId),

    #[error("rule id {0} already exists")]
    DuplicateRuleId(RuleId),

    #[error("decision {0} not found")]
    DecisionNotFound(String),

    #[error("decision {0} already exists")]
    DuplicateDecisionId(String),

    #[error("unable to serialize rules: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::RuleNotFound(_) | StoreError::DecisionNotFound(_)
        )
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            StoreError::DuplicateRuleId(_) | StoreError::DuplicateDecisionId(_)
        )
    }
}
