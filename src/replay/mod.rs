//! Deterministic replay of recorded decisions.
//!
//! A replay takes the input stored with a decision and evaluates it against
//! either the live rule set or a transient override set. Replays never
//! mutate stored rules or decisions.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::bundle::{BundleCache, BundleError};
use crate::domain::RuleAttributes;
use crate::policy::{EvalError, EvalResult, Evaluator};
use crate::storage::{DecisionLog, RuleStore, StoreError};

/// Errors that can occur during a replay.
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("decision {0} has no recorded input")]
    MissingInput(String),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Coordinates decision lookup, rule snapshot, artifact retrieval and evaluation.
pub struct ReplayCoordinator {
    rules: Arc<RuleStore>,
    decisions: Arc<DecisionLog>,
    cache: Arc<BundleCache>,
    evaluator: Arc<dyn Evaluator>,
}

impl ReplayCoordinator {
    pub fn new(
        rules: Arc<RuleStore>,
        decisions: Arc<DecisionLog>,
        cache: Arc<BundleCache>,
        evaluator: Arc<dyn Evaluator>,
    ) -> Self {
        ReplayCoordinator {
            rules,
            decisions,
            cache,
            evaluator,
        }
    }

    /// Replay a decision against the rules currently in the store.
    pub fn replay_with_current_rules(&self, decision_id: &str) -> Result<EvalResult, ReplayError> {
        let input = self.recorded_input(decision_id)?;
        let result = replay(&self.rules, &self.cache, self.evaluator.as_ref(), &input)?;

        info!(
            decision_id,
            revision = %result.revision,
            allow = result.allow,
            "Replayed decision with current rules"
        );
        Ok(result)
    }

    /// Replay a decision against a transient rule set.
    ///
    /// The override rules go into a throwaway store and cache; neither the
    /// live store nor the live cache is touched. Any invalid override rule
    /// fails the replay.
    pub fn replay_with_override_rules(
        &self,
        decision_id: &str,
        overrides: Vec<RuleAttributes>,
    ) -> Result<EvalResult, ReplayError> {
        let input = self.recorded_input(decision_id)?;

        let scratch_rules = RuleStore::new();
        for attrs in overrides {
            scratch_rules.add(attrs)?;
        }
        let scratch_cache = self.cache.detached();

        let result = replay(
            &scratch_rules,
            &scratch_cache,
            self.evaluator.as_ref(),
            &input,
        )?;

        info!(
            decision_id,
            override_rules = scratch_rules.len(),
            revision = %result.revision,
            allow = result.allow,
            "Replayed decision with override rules"
        );
        Ok(result)
    }

    fn recorded_input(&self, decision_id: &str) -> Result<serde_json::Value, ReplayError> {
        self.decisions
            .read(decision_id)?
            .input
            .ok_or_else(|| ReplayError::MissingInput(decision_id.to_string()))
    }
}

fn replay(
    rules: &RuleStore,
    cache: &BundleCache,
    evaluator: &dyn Evaluator,
    input: &serde_json::Value,
) -> Result<EvalResult, ReplayError> {
    let (data, revision) = rules.get_all_serialized()?;
    debug!(revision = %revision, "Resolving artifact for replay");

    let artifact = cache.get_artifact(&data, &revision)?;
    Ok(evaluator.eval(&artifact, input)?)
}
