pub mod api;
pub mod bundle;
pub mod config;
pub mod domain;
pub mod observability;
pub mod policy;
pub mod replay;
pub mod storage;

pub use bundle::BundleCache;
pub use config::Config;
pub use domain::{DecisionRecord, Revision, Rule, RuleAttributes, RuleId};
pub use replay::ReplayCoordinator;
pub use storage::{DecisionLog, RuleStore};
