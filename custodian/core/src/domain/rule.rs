// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Security Group Rule Records
//!
//! Immutable snapshots of directional security-group rules as returned by the
//! rule store. Optional vendor fields are `Option`s: a field the store did not
//! return is `None`, and predicates that require the field treat `None` as
//! "rule does not carry it".

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::validation::ValidationError;

/// Sentinel used by the vendor API for "any protocol" / "any port" / "any prefix".
pub const ANY: &str = "-1";

/// Traffic direction of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ingress,
    Egress,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Ingress, Direction::Egress];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ingress => "ingress",
            Direction::Egress => "egress",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ingress" => Ok(Direction::Ingress),
            "egress" => Ok(Direction::Egress),
            other => Err(ValidationError::InvalidValue {
                key: "direction".to_string(),
                reason: format!("expected 'ingress' or 'egress', got '{}'", other),
            }),
        }
    }
}

/// Whether a rule permits or blocks the traffic it describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Deny,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Allow => "allow",
            RuleAction::Deny => "deny",
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(RuleAction::Allow),
            "deny" => Ok(RuleAction::Deny),
            other => Err(ValidationError::InvalidValue {
                key: "action".to_string(),
                reason: format!("expected 'allow' or 'deny', got '{}'", other),
            }),
        }
    }
}

/// A single security-group rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    pub id: String,

    pub security_group_id: String,

    pub direction: Direction,

    /// `None` or `"-1"` means any protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethertype: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_ip_prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_group_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_address_group_id: Option<String>,

    /// Compact port encoding, see [`crate::domain::multiport`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiport: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RuleAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SecurityGroupRule {
    /// Minimal rule with every optional attribute unset.
    pub fn new(
        id: impl Into<String>,
        security_group_id: impl Into<String>,
        direction: Direction,
    ) -> Self {
        Self {
            id: id.into(),
            security_group_id: security_group_id.into(),
            direction,
            protocol: None,
            ethertype: None,
            remote_ip_prefix: None,
            remote_group_id: None,
            remote_address_group_id: None,
            multiport: None,
            priority: None,
            action: None,
            description: None,
        }
    }

    /// Protocol with the vendor's "any" sentinel substituted for an absent value.
    pub fn effective_protocol(&self) -> &str {
        self.protocol.as_deref().unwrap_or(ANY)
    }

    pub fn is_self_reference(&self) -> bool {
        self.remote_group_id.as_deref() == Some(self.security_group_id.as_str())
    }
}
