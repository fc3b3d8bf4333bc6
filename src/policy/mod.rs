pub mod builtin;
pub mod compiler;
pub mod evaluator;
pub mod loader;
pub mod sources;

pub use builtin::{RuleMatchCompiler, RuleMatchEvaluator};
pub use compiler::{Artifact, CompileError, PolicyCompiler};
pub use evaluator::{EvalError, EvalResult, Evaluator};
pub use loader::{PolicyError, PolicyLoader};
pub use sources::PolicySources;
