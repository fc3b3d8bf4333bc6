use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Attribute value that matches any request value for that dimension.
pub const WILDCARD: &str = "ANY";

/// Unique rule identifier.
///
/// Ids are random and never reused, so a deleted rule's id can't be
/// handed out again to a different rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub Uuid);

impl RuleId {
    pub fn new() -> Self {
        RuleId(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(RuleId)
    }
}

impl Default for RuleId {
    fn default() -> Self {
        RuleId::new()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome a rule assigns to a matching request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Action {
    #[default]
    Undefined,
    Allow,
    Deny,
}

impl Action {
    /// Parse from string representation. Unknown values map to `Undefined`.
    pub fn parse(s: &str) -> Self {
        match s {
            "allow" => Action::Allow,
            "deny" => Action::Deny,
            _ => Action::Undefined,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Undefined => "undefined",
            Action::Allow => "allow",
            Action::Deny => "deny",
        }
    }

    #[inline]
    pub fn is_defined(&self) -> bool {
        *self != Action::Undefined
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        Action::parse(&s)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Match attributes and action supplied by a caller.
///
/// For creation every field is required. For updates an empty field
/// (or an undefined action) means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAttributes {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub building: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub device_type: String,
    #[serde(default)]
    pub action: Action,
}

/// A stored access rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub country: String,
    pub city: String,
    pub building: String,
    pub role: String,
    pub device_type: String,
    pub action: Action,
}

impl Rule {
    pub fn new(id: RuleId, attrs: RuleAttributes) -> Self {
        Rule {
            id,
            country: attrs.country,
            city: attrs.city,
            building: attrs.building,
            role: attrs.role,
            device_type: attrs.device_type,
            action: attrs.action,
        }
    }

    /// Returns the name of the first missing field, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        self.fields()
            .into_iter()
            .find(|(_, value)| value.is_empty())
            .map(|(name, _)| name)
            .or_else(|| (!self.action.is_defined()).then_some("action"))
    }

    /// Merge the non-empty fields of `attrs` into this rule.
    pub fn merge(&mut self, attrs: RuleAttributes) {
        let RuleAttributes {
            country,
            city,
            building,
            role,
            device_type,
            action,
        } = attrs;

        for (slot, value) in [
            (&mut self.country, country),
            (&mut self.city, city),
            (&mut self.building, building),
            (&mut self.role, role),
            (&mut self.device_type, device_type),
        ] {
            if !value.is_empty() {
                *slot = value;
            }
        }

        if action.is_defined() {
            self.action = action;
        }
    }

    /// Check whether every attribute equals the input value or is the wildcard.
    ///
    /// Missing or non-string input values only match the wildcard.
    pub fn matches(&self, input: &serde_json::Map<String, serde_json::Value>) -> bool {
        self.fields().into_iter().all(|(name, expected)| {
            expected == WILDCARD
                || input.get(name).and_then(|v| v.as_str()) == Some(expected)
        })
    }

    fn fields(&self) -> [(&'static str, &str); 5] {
        [
            ("country", self.country.as_str()),
            ("city", self.city.as_str()),
            ("building", self.building.as_str()),
            ("role", self.role.as_str()),
            ("device_type", self.device_type.as_str()),
        ]
    }
}

/// Canonical document form of a rule set: `{"rules": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSetDocument {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs() -> RuleAttributes {
        RuleAttributes {
            country: "Sweden".to_string(),
            city: "Gothenburg".to_string(),
            building: "HQ".to_string(),
            role: "admin".to_string(),
            device_type: "laptop".to_string(),
            action: Action::Allow,
        }
    }

    #[test]
    fn test_action_serialization() {
        assert_eq!(serde_json::to_string(&Action::Deny).unwrap(), "\"deny\"");

        let parsed: Action = serde_json::from_str("\"allow\"").unwrap();
        assert_eq!(parsed, Action::Allow);

        let unknown: Action = serde_json::from_str("\"maybe\"").unwrap();
        assert_eq!(unknown, Action::Undefined);
    }

    #[test]
    fn test_validation_reports_first_missing_field() {
        let mut rule = Rule::new(RuleId::new(), attrs());
        assert_eq!(rule.missing_field(), None);

        rule.building.clear();
        assert_eq!(rule.missing_field(), Some("building"));

        let mut rule = Rule::new(RuleId::new(), attrs());
        rule.action = Action::Undefined;
        assert_eq!(rule.missing_field(), Some("action"));
    }

    #[test]
    fn test_merge_only_touches_supplied_fields() {
        let mut rule = Rule::new(RuleId::new(), attrs());
        rule.merge(RuleAttributes {
            role: "guest".to_string(),
            ..Default::default()
        });

        assert_eq!(rule.role, "guest");
        assert_eq!(rule.country, "Sweden");
        assert_eq!(rule.action, Action::Allow);
    }

    #[test]
    fn test_wildcard_matching() {
        let rule = Rule::new(
            RuleId::new(),
            RuleAttributes {
                country: WILDCARD.to_string(),
                city: WILDCARD.to_string(),
                building: WILDCARD.to_string(),
                role: "guest".to_string(),
                device_type: WILDCARD.to_string(),
                action: Action::Deny,
            },
        );

        let input = json!({"role": "guest", "country": "Norway"});
        assert!(rule.matches(input.as_object().unwrap()));

        let input = json!({"role": "admin", "country": "Norway"});
        assert!(!rule.matches(input.as_object().unwrap()));
    }

    #[test]
    fn test_rule_json_shape() {
        let rule = Rule::new(RuleId::new(), attrs());
        let value = serde_json::to_value(&rule).unwrap();

        assert_eq!(value["device_type"], "laptop");
        assert_eq!(value["action"], "allow");
        assert_eq!(value["id"], rule.id.to_string());
    }
}
