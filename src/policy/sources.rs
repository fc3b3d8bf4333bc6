use std::collections::BTreeMap;

/// Policy module shipped with the binary.
const EMBEDDED_RULE_MODULE: &str = include_str!("../../static/rule.rego");

/// Static policy modules bundled next to the rule data.
///
/// Modules are kept ordered by name so the same sources always stage the
/// same way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySources {
    modules: BTreeMap<String, String>,
}

impl PolicySources {
    pub fn new() -> Self {
        PolicySources::default()
    }

    /// The modules embedded at build time.
    pub fn embedded() -> Self {
        PolicySources::new().with_module("rule.rego", EMBEDDED_RULE_MODULE)
    }

    pub fn with_module(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.modules.insert(name.into(), source.into());
    }

    pub fn modules(&self) -> &BTreeMap<String, String> {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_sources() {
        let sources = PolicySources::embedded();

        assert_eq!(sources.len(), 1);
        assert!(sources.modules()["rule.rego"].contains("package rule"));
    }

    #[test]
    fn test_embedded_module_imports_and_partial_input() {
        let sources = PolicySources::embedded();
        let module = &sources.modules()["rule.rego"];

        // `every` and `in` are both future keywords on pre-1.0 engines.
        assert!(module.contains("import future.keywords.every"));
        assert!(module.contains("import future.keywords.in"));

        // Absent input attributes resolve to null so the wildcard still matches them.
        assert!(module.contains("object.get(input, attr, null)"));
        assert!(!module.contains("input[attr]"));
    }
}
