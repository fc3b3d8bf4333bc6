pub mod decision;
pub mod revision;
pub mod rule;

pub use decision::DecisionRecord;
pub use revision::Revision;
pub use rule::{Action, Rule, RuleAttributes, RuleId, RuleSetDocument, WILDCARD};
