use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::{Action, Revision, RuleSetDocument};

use super::compiler::{Artifact, CompileError, PolicyCompiler};
use super::evaluator::{EvalError, EvalResult, Evaluator};
use super::sources::PolicySources;

/// Data roots owned by bundles this service produces.
const BUNDLE_ROOTS: [&str; 2] = ["rule", "rules"];

#[derive(Serialize)]
struct Manifest<'a> {
    revision: &'a Revision,
    roots: [&'static str; 2],
}

#[derive(Serialize)]
struct Bundle<'a> {
    manifest: Manifest<'a>,
    modules: &'a BTreeMap<String, String>,
    data: &'a serde_json::Value,
}

/// Compiler that stages rule data next to the static modules and pre-parses
/// the rules for native matching.
///
/// The archive is a JSON bundle document: manifest, modules and data.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleMatchCompiler;

impl RuleMatchCompiler {
    pub fn new() -> Self {
        RuleMatchCompiler
    }
}

impl PolicyCompiler for RuleMatchCompiler {
    fn compile(
        &self,
        sources: &PolicySources,
        data: &[u8],
        revision: &Revision,
    ) -> Result<Artifact, CompileError> {
        if sources.is_empty() {
            return Err(CompileError::NoModules);
        }

        let value: serde_json::Value =
            serde_json::from_slice(data).map_err(CompileError::InvalidData)?;
        let document: RuleSetDocument =
            serde_json::from_value(value.clone()).map_err(CompileError::InvalidData)?;

        for rule in &document.rules {
            if let Some(field) = rule.missing_field() {
                return Err(CompileError::InvalidRule {
                    id: rule.id.to_string(),
                    field,
                });
            }
        }

        Ok(Artifact {
            revision: revision.clone(),
            modules: sources.modules().clone(),
            data: value,
            rules: document.rules,
        })
    }

    fn serialize(&self, artifact: &Artifact) -> Result<Vec<u8>, CompileError> {
        let bundle = Bundle {
            manifest: Manifest {
                revision: &artifact.revision,
                roots: BUNDLE_ROOTS,
            },
            modules: &artifact.modules,
            data: &artifact.data,
        };

        serde_json::to_vec(&bundle).map_err(CompileError::Serialize)
    }
}

/// Native evaluator with the same semantics as the embedded module:
/// a matching deny rule wins, otherwise any matching allow rule allows,
/// otherwise the request is not allowed. Attributes absent from the input
/// are matched only by the wildcard.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleMatchEvaluator;

impl RuleMatchEvaluator {
    pub fn new() -> Self {
        RuleMatchEvaluator
    }
}

impl Evaluator for RuleMatchEvaluator {
    fn eval(
        &self,
        artifact: &Artifact,
        input: &serde_json::Value,
    ) -> Result<EvalResult, EvalError> {
        let input = input.as_object().ok_or(EvalError::InvalidInput)?;

        let matched: Vec<_> = artifact.rules.iter().filter(|r| r.matches(input)).collect();

        let action = if matched.iter().any(|r| r.action == Action::Deny) {
            Action::Deny
        } else if matched.iter().any(|r| r.action == Action::Allow) {
            Action::Allow
        } else {
            Action::Undefined
        };

        Ok(EvalResult {
            allow: action == Action::Allow,
            action,
            matched_rules: matched.iter().map(|r| r.id).collect(),
            revision: artifact.revision.clone(),
        })
    }
}
