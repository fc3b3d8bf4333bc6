use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::{Revision, Rule};

use super::sources::PolicySources;

/// Errors produced while compiling or serializing a bundle.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("rule data is not a valid rule document: {0}")]
    InvalidData(#[source] serde_json::Error),

    #[error("rule {id} in data is not valid: {field} must be set")]
    InvalidRule { id: String, field: &'static str },

    #[error("no static policy modules to compile")]
    NoModules,

    #[error("unable to serialize artifact: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Evaluator-ready policy bundle built from rule data and static sources.
///
/// Artifacts are derived and disposable; the same inputs always compile to
/// an equivalent artifact.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    /// Revision of the rule data this artifact was built from
    pub revision: Revision,

    /// Static policy modules by name
    pub modules: BTreeMap<String, String>,

    /// Rule data document as staged for the evaluator
    pub data: serde_json::Value,

    /// Parsed rules, in data order
    pub rules: Vec<Rule>,
}

/// Builds evaluator-ready artifacts and their portable archive form.
///
/// Implementations must be deterministic for identical inputs and must not
/// hold state that a failed compile could corrupt.
pub trait PolicyCompiler: Send + Sync {
    /// Compile static sources plus serialized rule data into an artifact tagged
    /// with `revision`.
    fn compile(
        &self,
        sources: &PolicySources,
        data: &[u8],
        revision: &Revision,
    ) -> Result<Artifact, CompileError>;

    /// Produce the portable archive form of an artifact.
    fn serialize(&self, artifact: &Artifact) -> Result<Vec<u8>, CompileError>;
}
