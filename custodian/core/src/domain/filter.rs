// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Security Group Rule Filter Specification
//!
//! The declarative predicate behind the `ingress` / `egress` policy filters.
//!
//! ```yaml
//! - type: ingress
//!   RemoteIpPrefix: 0.0.0.0/0
//!   Protocols: [tcp]
//!   InPorts: [22, 3389]
//!   match-operator: and
//! ```
//!
//! ## Recognized Keys
//!
//! | Key | Rule field | Values |
//! |-----|------------|--------|
//! | `RemoteIpPrefix` | `remote_ip_prefix` | CIDR string or `-1` |
//! | `Protocols` | `protocol` | `-1`, `tcp`, `udp`, `icmp`, `icmpv6`, integers |
//! | `InPorts` / `NotInPorts` | `multiport` | port numbers |
//! | `SelfReference` | `remote_group_id` | boolean |
//! | `SGRuleIds` | `id` | strings |
//! | `SecurityGroupIds` | `security_group_id` | strings |
//! | `Descriptions` | `description` | strings |
//! | `Ethertypes` | `ethertype` | `IPv4`, `IPv6`, `ipv4`, `ipv6` |
//! | `Priorities` | `priority` | integers |
//! | `Action` | `action` | `allow`, `deny` |
//! | `SGReferenceIds` | `remote_group_id` | strings |
//! | `AGReferenceIds` | `remote_address_group_id` | strings |
//!
//! List-valued keys also accept a single scalar, which behaves as a
//! one-element list. Any other key is rejected by [`FilterSpec::validate`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::rule::{Direction, RuleAction, ANY};
use crate::domain::validation::{expect_str, reject_unknown_keys, ValidationError};

pub const REMOTE_IP_PREFIX: &str = "RemoteIpPrefix";
pub const PROTOCOLS: &str = "Protocols";
pub const IN_PORTS: &str = "InPorts";
pub const NOT_IN_PORTS: &str = "NotInPorts";
pub const SELF_REFERENCE: &str = "SelfReference";
pub const SG_RULE_IDS: &str = "SGRuleIds";
pub const SECURITY_GROUP_IDS: &str = "SecurityGroupIds";
pub const DESCRIPTIONS: &str = "Descriptions";
pub const ETHERTYPES: &str = "Ethertypes";
pub const PRIORITIES: &str = "Priorities";
pub const ACTION: &str = "Action";
pub const SG_REFERENCE_IDS: &str = "SGReferenceIds";
pub const AG_REFERENCE_IDS: &str = "AGReferenceIds";
pub const MATCH_OPERATOR: &str = "match-operator";
pub const TYPE: &str = "type";

/// Every key a rule filter block may carry.
pub const RECOGNIZED_KEYS: [&str; 15] = [
    TYPE,
    MATCH_OPERATOR,
    REMOTE_IP_PREFIX,
    PROTOCOLS,
    IN_PORTS,
    NOT_IN_PORTS,
    SELF_REFERENCE,
    SG_RULE_IDS,
    SECURITY_GROUP_IDS,
    DESCRIPTIONS,
    ETHERTYPES,
    PRIORITIES,
    ACTION,
    SG_REFERENCE_IDS,
    AG_REFERENCE_IDS,
];

const PROTOCOL_NAMES: [&str; 5] = [ANY, "tcp", "udp", "icmp", "icmpv6"];
const ETHERTYPE_NAMES: [&str; 4] = ["IPv4", "IPv6", "ipv4", "ipv6"];

/// How applicable sub-predicate results are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOperator {
    #[default]
    And,
    Or,
}

/// `RemoteIpPrefix` filter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemotePrefix {
    /// The `-1` sentinel: matches rules without a prefix.
    Any,
    Cidr(String),
}

/// A validated `ingress` / `egress` filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub direction: Direction,
    pub match_operator: MatchOperator,
    pub remote_ip_prefix: Option<RemotePrefix>,
    /// Normalised protocol names; integers are stored as decimal strings.
    pub protocols: Option<Vec<String>>,
    pub in_ports: Vec<u16>,
    pub not_in_ports: Vec<u16>,
    pub self_reference: Option<bool>,
    pub sg_rule_ids: Option<Vec<String>>,
    pub security_group_ids: Option<Vec<String>>,
    pub descriptions: Option<Vec<String>>,
    pub ethertypes: Option<Vec<String>>,
    pub priorities: Option<Vec<i64>>,
    pub action: Option<Vec<RuleAction>>,
    pub sg_reference_ids: Option<Vec<String>>,
    pub ag_reference_ids: Option<Vec<String>>,
}

impl FilterSpec {
    /// Empty filter for `direction`; only the direction predicate applies.
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            match_operator: MatchOperator::And,
            remote_ip_prefix: None,
            protocols: None,
            in_ports: Vec::new(),
            not_in_ports: Vec::new(),
            self_reference: None,
            sg_rule_ids: None,
            security_group_ids: None,
            descriptions: None,
            ethertypes: None,
            priorities: None,
            action: None,
            sg_reference_ids: None,
            ag_reference_ids: None,
        }
    }

    /// Rejects every key outside [`RECOGNIZED_KEYS`] in a single error.
    pub fn validate(block: &Map<String, Value>) -> Result<(), ValidationError> {
        let context = match block.get(TYPE).and_then(Value::as_str) {
            Some(kind) => format!("{} filter", kind),
            None => "security group rule filter".to_string(),
        };
        reject_unknown_keys(block, &RECOGNIZED_KEYS, &context)
    }

    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let block = value.as_object().ok_or_else(|| ValidationError::InvalidValue {
            key: TYPE.to_string(),
            reason: format!("expected a filter mapping, got {}", value),
        })?;
        Self::from_block(block)
    }

    /// Validates `block` and converts it into a typed filter.
    pub fn from_block(block: &Map<String, Value>) -> Result<Self, ValidationError> {
        Self::validate(block)?;

        let kind = block.get(TYPE).ok_or_else(|| ValidationError::MissingKey {
            key: TYPE.to_string(),
            context: "security group rule filter".to_string(),
        })?;
        let direction: Direction = expect_str(kind, TYPE)?.parse()?;
        let mut spec = FilterSpec::new(direction);

        for (key, value) in block {
            match key.as_str() {
                TYPE => {}
                MATCH_OPERATOR => spec.match_operator = parse_match_operator(value)?,
                REMOTE_IP_PREFIX => spec.remote_ip_prefix = Some(parse_remote_prefix(value)?),
                PROTOCOLS => spec.protocols = Some(parse_protocols(value)?),
                IN_PORTS => spec.in_ports = parse_ports(IN_PORTS, value)?,
                NOT_IN_PORTS => spec.not_in_ports = parse_ports(NOT_IN_PORTS, value)?,
                SELF_REFERENCE => {
                    spec.self_reference = Some(value.as_bool().ok_or_else(|| {
                        ValidationError::InvalidValue {
                            key: SELF_REFERENCE.to_string(),
                            reason: format!("expected a boolean, got {}", value),
                        }
                    })?)
                }
                SG_RULE_IDS => spec.sg_rule_ids = Some(string_list(key, value)?),
                SECURITY_GROUP_IDS => spec.security_group_ids = Some(string_list(key, value)?),
                DESCRIPTIONS => spec.descriptions = Some(string_list(key, value)?),
                ETHERTYPES => spec.ethertypes = Some(parse_ethertypes(value)?),
                PRIORITIES => spec.priorities = Some(int_list(key, value)?),
                ACTION => {
                    spec.action = Some(
                        string_list(key, value)?
                            .iter()
                            .map(|a| a.parse::<RuleAction>())
                            .collect::<Result<_, _>>()?,
                    )
                }
                SG_REFERENCE_IDS => spec.sg_reference_ids = Some(string_list(key, value)?),
                AG_REFERENCE_IDS => spec.ag_reference_ids = Some(string_list(key, value)?),
                // validate() has already rejected anything else
                _ => {}
            }
        }

        Ok(spec)
    }

    pub fn has_port_criteria(&self) -> bool {
        !self.in_ports.is_empty() || !self.not_in_ports.is_empty()
    }
}

fn invalid(key: &str, reason: String) -> ValidationError {
    ValidationError::InvalidValue {
        key: key.to_string(),
        reason,
    }
}

fn scalar_or_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn string_list(key: &str, value: &Value) -> Result<Vec<String>, ValidationError> {
    scalar_or_list(value)
        .into_iter()
        .map(|v| expect_str(v, key).map(str::to_string))
        .collect()
}

fn int_list(key: &str, value: &Value) -> Result<Vec<i64>, ValidationError> {
    scalar_or_list(value)
        .into_iter()
        .map(|v| {
            v.as_i64()
                .ok_or_else(|| invalid(key, format!("expected an integer, got {}", v)))
        })
        .collect()
}

fn parse_match_operator(value: &Value) -> Result<MatchOperator, ValidationError> {
    match expect_str(value, MATCH_OPERATOR)? {
        "and" => Ok(MatchOperator::And),
        "or" => Ok(MatchOperator::Or),
        other => Err(invalid(
            MATCH_OPERATOR,
            format!("expected 'and' or 'or', got '{}'", other),
        )),
    }
}

fn parse_remote_prefix(value: &Value) -> Result<RemotePrefix, ValidationError> {
    match value {
        Value::Number(n) if n.as_i64() == Some(-1) => Ok(RemotePrefix::Any),
        Value::String(s) if s == ANY => Ok(RemotePrefix::Any),
        Value::String(s) => Ok(RemotePrefix::Cidr(s.clone())),
        other => Err(invalid(
            REMOTE_IP_PREFIX,
            format!("expected a CIDR string or -1, got {}", other),
        )),
    }
}

fn parse_protocols(value: &Value) -> Result<Vec<String>, ValidationError> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid(PROTOCOLS, format!("expected a list, got {}", value)))?;

    items
        .iter()
        .map(|item| match item {
            // -1 becomes "-1" so it compares equal to the rule-side sentinel
            Value::Number(n) => n
                .as_i64()
                .map(|p| p.to_string())
                .ok_or_else(|| invalid(PROTOCOLS, format!("expected an integer, got {}", n))),
            Value::String(s) if PROTOCOL_NAMES.contains(&s.as_str()) => Ok(s.clone()),
            other => Err(invalid(
                PROTOCOLS,
                format!("expected one of {:?} or an integer, got {}", PROTOCOL_NAMES, other),
            )),
        })
        .collect()
}

fn parse_ports(key: &str, value: &Value) -> Result<Vec<u16>, ValidationError> {
    scalar_or_list(value)
        .into_iter()
        .map(|v| {
            v.as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| invalid(key, format!("expected a port between 0 and 65535, got {}", v)))
        })
        .collect()
}

fn parse_ethertypes(value: &Value) -> Result<Vec<String>, ValidationError> {
    let ethertypes = string_list(ETHERTYPES, value)?;
    if let Some(bad) = ethertypes
        .iter()
        .find(|e| !ETHERTYPE_NAMES.contains(&e.as_str()))
    {
        return Err(invalid(
            ETHERTYPES,
            format!("expected one of {:?}, got '{}'", ETHERTYPE_NAMES, bad),
        ));
    }
    Ok(ethertypes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_block() {
        let spec = FilterSpec::from_value(&json!({
            "type": "egress",
            "match-operator": "or",
            "RemoteIpPrefix": "0.0.0.0/0",
            "Protocols": ["tcp", -1, 6],
            "InPorts": [22, 443],
            "NotInPorts": 3389,
            "SelfReference": false,
            "SecurityGroupIds": "sg-1",
            "Ethertypes": ["IPv4"],
            "Priorities": [1, 100],
            "Action": "deny",
        }))
        .unwrap();

        assert_eq!(spec.direction, Direction::Egress);
        assert_eq!(spec.match_operator, MatchOperator::Or);
        assert_eq!(spec.remote_ip_prefix, Some(RemotePrefix::Cidr("0.0.0.0/0".to_string())));
        assert_eq!(
            spec.protocols,
            Some(vec!["tcp".to_string(), "-1".to_string(), "6".to_string()])
        );
        assert_eq!(spec.in_ports, vec![22, 443]);
        assert_eq!(spec.not_in_ports, vec![3389]);
        assert_eq!(spec.self_reference, Some(false));
        assert_eq!(spec.security_group_ids, Some(vec!["sg-1".to_string()]));
        assert_eq!(spec.priorities, Some(vec![1, 100]));
        assert_eq!(spec.action, Some(vec![RuleAction::Deny]));
    }

    #[test]
    fn test_remote_prefix_sentinels() {
        for sentinel in [json!(-1), json!("-1")] {
            let spec = FilterSpec::from_value(&json!({"type": "ingress", "RemoteIpPrefix": sentinel}))
                .unwrap();
            assert_eq!(spec.remote_ip_prefix, Some(RemotePrefix::Any));
        }
    }

    #[test]
    fn test_validate_lists_every_unknown_key() {
        let block = json!({"type": "ingress", "FromPort": 22, "IpProtocol": "tcp", "InPorts": [22]});
        let err = FilterSpec::validate(block.as_object().unwrap()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownKeys {
                keys: vec!["FromPort".to_string(), "IpProtocol".to_string()],
                context: "ingress filter".to_string(),
            }
        );
    }

    #[test]
    fn test_only_unknown_keys_fail() {
        let block = json!({"Cidr": "10.0.0.0/8"});
        assert!(FilterSpec::validate(block.as_object().unwrap()).is_err());
        assert!(FilterSpec::from_value(&block).is_err());
    }

    #[test]
    fn test_missing_type_is_rejected() {
        let err = FilterSpec::from_value(&json!({"InPorts": [22]})).unwrap_err();
        assert!(matches!(err, ValidationError::MissingKey { .. }));
    }

    #[test]
    fn test_invalid_values_name_the_key() {
        let cases = [
            json!({"type": "ingress", "InPorts": [70000]}),
            json!({"type": "ingress", "Protocols": ["gre"]}),
            json!({"type": "ingress", "Ethertypes": ["ipx"]}),
            json!({"type": "ingress", "Action": "drop"}),
            json!({"type": "ingress", "SelfReference": "yes"}),
            json!({"type": "ingress", "match-operator": "xor"}),
            json!({"type": "sideways"}),
        ];
        for case in cases {
            assert!(
                matches!(FilterSpec::from_value(&case), Err(ValidationError::InvalidValue { .. })),
                "expected InvalidValue for {}",
                case
            );
        }
    }
}
