// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Rule Templates and Rule Queries
//!
//! Typed request records built from the free-form attribute maps of
//! `set-rules` (`add-ingress`, `add-egress`) and explicit removal entries.
//! Each recognized attribute has a typed setter; unrecognized attributes are
//! rejected when the record is built, never forwarded to the store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::rule::{Direction, RuleAction, SecurityGroupRule};
use crate::domain::validation::{expect_i64, expect_str, reject_unknown_keys, ValidationError};

/// Attributes accepted on a rule creation template.
pub const TEMPLATE_FIELDS: [&str; 9] = [
    "description",
    "ethertype",
    "protocol",
    "multiport",
    "remote_ip_prefix",
    "remote_group_id",
    "remote_address_group_id",
    "action",
    "priority",
];

/// Attributes accepted on a rule list query.
pub const QUERY_FIELDS: [&str; 9] = [
    "id",
    "protocol",
    "description",
    "remote_group_id",
    "action",
    "remote_ip_prefix",
    "priority",
    "ethertype",
    "remote_address_group_id",
];

/// One rule to be created by a batch-create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTemplate {
    pub direction: Direction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethertype: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiport: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_ip_prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_group_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_address_group_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RuleAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

impl RuleTemplate {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            description: None,
            ethertype: None,
            protocol: None,
            multiport: None,
            remote_ip_prefix: None,
            remote_group_id: None,
            remote_address_group_id: None,
            action: None,
            priority: None,
        }
    }

    /// Builds a template from an attribute map, rejecting unknown attributes.
    pub fn from_attributes(
        direction: Direction,
        attributes: &Map<String, Value>,
    ) -> Result<Self, ValidationError> {
        let context = format!("add-{} rule", direction);
        reject_unknown_keys(attributes, &TEMPLATE_FIELDS, &context)?;
        if attributes.is_empty() {
            return Err(ValidationError::InvalidValue {
                key: format!("add-{}", direction),
                reason: "rule templates need at least one attribute".to_string(),
            });
        }

        let mut template = RuleTemplate::new(direction);
        for (key, value) in attributes {
            template.set(key, value)?;
        }
        Ok(template)
    }

    fn set(&mut self, key: &str, value: &Value) -> Result<(), ValidationError> {
        match key {
            "description" => self.description = Some(string(key, value)?),
            "ethertype" => self.ethertype = Some(string(key, value)?),
            "protocol" => self.protocol = Some(string(key, value)?),
            "multiport" => self.multiport = Some(port_string(key, value)?),
            "remote_ip_prefix" => self.remote_ip_prefix = Some(string(key, value)?),
            "remote_group_id" => self.remote_group_id = Some(string(key, value)?),
            "remote_address_group_id" => self.remote_address_group_id = Some(string(key, value)?),
            "action" => self.action = Some(expect_str(value, key)?.parse()?),
            "priority" => self.priority = Some(expect_i64(value, key)?),
            other => {
                return Err(ValidationError::UnknownKeys {
                    keys: vec![other.to_string()],
                    context: format!("add-{} rule", self.direction),
                })
            }
        }
        Ok(())
    }
}

/// Parameters of a rule list call.
///
/// Unset attributes do not constrain the result; an empty
/// `security_group_ids` means every group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleQuery {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_group_ids: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_group_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RuleAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_ip_prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethertype: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_address_group_id: Option<String>,
}

impl RuleQuery {
    /// Every rule of `direction` in the given groups.
    pub fn for_groups(security_group_ids: Vec<String>, direction: Direction) -> Self {
        Self {
            security_group_ids,
            direction: Some(direction),
            ..Self::default()
        }
    }

    /// Builds the attribute part of a query from an explicit removal entry.
    pub fn from_attributes(
        direction: Direction,
        attributes: &Map<String, Value>,
    ) -> Result<Self, ValidationError> {
        reject_unknown_keys(attributes, &QUERY_FIELDS, &format!("remove-{} entry", direction))?;

        let mut query = RuleQuery {
            direction: Some(direction),
            ..Self::default()
        };
        for (key, value) in attributes {
            match key.as_str() {
                "id" => query.id = Some(string(key, value)?),
                "protocol" => query.protocol = Some(string(key, value)?),
                "description" => query.description = Some(string(key, value)?),
                "remote_group_id" => query.remote_group_id = Some(string(key, value)?),
                "action" => query.action = Some(expect_str(value, key)?.parse()?),
                "remote_ip_prefix" => query.remote_ip_prefix = Some(string(key, value)?),
                "priority" => query.priority = Some(expect_i64(value, key)?),
                "ethertype" => query.ethertype = Some(string(key, value)?),
                "remote_address_group_id" => {
                    query.remote_address_group_id = Some(string(key, value)?)
                }
                _ => {}
            }
        }
        Ok(query)
    }

    pub fn with_security_groups(mut self, security_group_ids: Vec<String>) -> Self {
        self.security_group_ids = security_group_ids;
        self
    }

    /// Store-side selection semantics: every set attribute must be equal.
    pub fn matches(&self, rule: &SecurityGroupRule) -> bool {
        (self.security_group_ids.is_empty()
            || self.security_group_ids.contains(&rule.security_group_id))
            && self.direction.is_none_or(|d| d == rule.direction)
            && field_matches(&self.id, Some(&rule.id))
            && field_matches(&self.protocol, rule.protocol.as_ref())
            && field_matches(&self.description, rule.description.as_ref())
            && field_matches(&self.remote_group_id, rule.remote_group_id.as_ref())
            && field_matches(&self.action, rule.action.as_ref())
            && field_matches(&self.remote_ip_prefix, rule.remote_ip_prefix.as_ref())
            && field_matches(&self.priority, rule.priority.as_ref())
            && field_matches(&self.ethertype, rule.ethertype.as_ref())
            && field_matches(&self.remote_address_group_id, rule.remote_address_group_id.as_ref())
    }
}

fn field_matches<T: PartialEq>(wanted: &Option<T>, actual: Option<&T>) -> bool {
    wanted.as_ref().is_none_or(|w| actual == Some(w))
}

fn string(key: &str, value: &Value) -> Result<String, ValidationError> {
    expect_str(value, key).map(str::to_string)
}

/// `multiport: 22` is as common in policies as `multiport: '22'`.
fn port_string(key: &str, value: &Value) -> Result<String, ValidationError> {
    match value {
        Value::Number(n) if n.is_i64() => Ok(n.to_string()),
        other => string(key, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_template_from_attributes() {
        let template = RuleTemplate::from_attributes(
            Direction::Ingress,
            &attrs(json!({
                "ethertype": "ipv4",
                "protocol": "tcp",
                "multiport": 3389,
                "remote_ip_prefix": "10.0.0.0/8",
                "action": "allow",
                "priority": "1",
            })),
        )
        .unwrap();

        assert_eq!(template.direction, Direction::Ingress);
        assert_eq!(template.multiport.as_deref(), Some("3389"));
        assert_eq!(template.action, Some(RuleAction::Allow));
        assert_eq!(template.priority, Some(1));
    }

    #[test]
    fn test_template_rejects_unknown_field() {
        let err = RuleTemplate::from_attributes(
            Direction::Ingress,
            &attrs(json!({"protocol": "tcp", "priotity": 1})),
        )
        .unwrap_err();

        assert_eq!(
            err,
            ValidationError::UnknownKeys {
                keys: vec!["priotity".to_string()],
                context: "add-ingress rule".to_string(),
            }
        );
    }

    #[test]
    fn test_template_rejects_direction_override() {
        let result = RuleTemplate::from_attributes(
            Direction::Egress,
            &attrs(json!({"direction": "ingress", "protocol": "tcp"})),
        );
        assert!(result.is_err());
        assert!(RuleTemplate::from_attributes(Direction::Egress, &Map::new()).is_err());
    }

    #[test]
    fn test_query_matching() {
        let query = RuleQuery::from_attributes(
            Direction::Egress,
            &attrs(json!({"action": "allow", "remote_ip_prefix": "0.0.0.0/0"})),
        )
        .unwrap()
        .with_security_groups(vec!["sg-1".to_string()]);

        let mut rule = SecurityGroupRule::new("r1", "sg-1", Direction::Egress);
        rule.action = Some(RuleAction::Allow);
        rule.remote_ip_prefix = Some("0.0.0.0/0".to_string());
        assert!(query.matches(&rule));

        let mut ipv6 = rule.clone();
        ipv6.remote_ip_prefix = Some("::/0".to_string());
        assert!(!query.matches(&ipv6));

        let mut other_group = rule.clone();
        other_group.security_group_id = "sg-2".to_string();
        assert!(!query.matches(&other_group));

        let mut ingress = rule;
        ingress.direction = Direction::Ingress;
        assert!(!query.matches(&ingress));
    }

    #[test]
    fn test_default_query_matches_everything() {
        let rule = SecurityGroupRule::new("r1", "sg-9", Direction::Ingress);
        assert!(RuleQuery::default().matches(&rule));
    }
}
