use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Action, Revision, RuleId};

use super::compiler::Artifact;

/// Errors produced while evaluating an input against an artifact.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("input must be a JSON object")]
    InvalidInput,
}

/// Outcome of evaluating one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalResult {
    /// Whether the request is allowed
    pub allow: bool,

    /// The action that decided the outcome (`undefined` if no rule matched)
    pub action: Action,

    /// Rules that matched the input
    #[serde(default)]
    pub matched_rules: Vec<RuleId>,

    /// Revision of the artifact that produced this result
    pub revision: Revision,
}

/// Evaluates a request input against a compiled artifact.
pub trait Evaluator: Send + Sync {
    fn eval(&self, artifact: &Artifact, input: &serde_json::Value)
        -> Result<EvalResult, EvalError>;
}
