pub mod decisions;
pub mod error;
pub mod rules;

pub use decisions::DecisionLog;
pub use error::StoreError;
pub use rules::RuleStore;
