// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Policy Domain Model
//!
//! A policy names a resource kind, a list of filters narrowing the listed
//! resources, and a list of actions applied to what remains.
//!
//! # Architectural Context
//!
//! - **Aggregate Root:** Policy
//! - **Parsed by:** `crate::infrastructure::policy_parser`
//! - **Executed by:** `crate::application::policy_runner`
//!
//! Filters and actions are closed enums. Each variant declares which resource
//! kinds it applies to and a policy pairing a variant with any other kind is
//! rejected while the document is loaded.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::domain::filter::FilterSpec;
use crate::domain::network::FlowLogTemplate;
use crate::domain::reconcile::{RemovalPlan, RemovalSpec, RuleTemplates};
use crate::domain::rule::Direction;
use crate::domain::validation::{expect_object, expect_str, reject_unknown_keys, ValidationError};

/// Provider prefix accepted in front of resource names.
pub const PROVIDER_PREFIX: &str = "huaweicloud.";

// ============================================================================
// Resource Kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "vpc-security-group-rule")]
    SecurityGroupRule,
    #[serde(rename = "vpc-security-group")]
    SecurityGroup,
    #[serde(rename = "vpc-flow-log")]
    FlowLog,
    #[serde(rename = "vpc-port")]
    Port,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::SecurityGroupRule => "vpc-security-group-rule",
            ResourceKind::SecurityGroup => "vpc-security-group",
            ResourceKind::FlowLog => "vpc-flow-log",
            ResourceKind::Port => "vpc-port",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(PROVIDER_PREFIX).unwrap_or(s) {
            "vpc-security-group-rule" => Ok(ResourceKind::SecurityGroupRule),
            "vpc-security-group" => Ok(ResourceKind::SecurityGroup),
            "vpc-flow-log" => Ok(ResourceKind::FlowLog),
            "vpc-port" => Ok(ResourceKind::Port),
            other => Err(ValidationError::InvalidValue {
                key: "resource".to_string(),
                reason: format!("unsupported resource '{}'", other),
            }),
        }
    }
}

// ============================================================================
// Filters
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKind {
    Ingress(FilterSpec),
    Egress(FilterSpec),
    Unattached,
    Value(ValueFilter),
    Or(Vec<FilterKind>),
    And(Vec<FilterKind>),
}

impl FilterKind {
    /// Parses a filter entry; a bare string is shorthand for `{type: <string>}`.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let block = match value {
            Value::String(kind) => {
                let mut block = Map::new();
                block.insert("type".to_string(), Value::String(kind.clone()));
                block
            }
            other => expect_object(other, "filters")?.clone(),
        };

        if block.len() == 1 {
            if let Some(children) = block.get("or") {
                return Ok(FilterKind::Or(Self::parse_children("or", children)?));
            }
            if let Some(children) = block.get("and") {
                return Ok(FilterKind::And(Self::parse_children("and", children)?));
            }
        }

        let kind = block.get("type").ok_or_else(|| ValidationError::MissingKey {
            key: "type".to_string(),
            context: "filter".to_string(),
        })?;

        match expect_str(kind, "type")? {
            "ingress" => Ok(FilterKind::Ingress(FilterSpec::from_block(&block)?)),
            "egress" => Ok(FilterKind::Egress(FilterSpec::from_block(&block)?)),
            "unattached" => {
                reject_unknown_keys(&block, &["type"], "unattached filter")?;
                Ok(FilterKind::Unattached)
            }
            "value" => Ok(FilterKind::Value(ValueFilter::from_block(&block)?)),
            other => Err(ValidationError::InvalidValue {
                key: "type".to_string(),
                reason: format!("unknown filter '{}'", other),
            }),
        }
    }

    fn parse_children(op: &str, value: &Value) -> Result<Vec<FilterKind>, ValidationError> {
        let children = value.as_array().ok_or_else(|| ValidationError::InvalidValue {
            key: op.to_string(),
            reason: format!("expected a list of filters, got {}", value),
        })?;
        children.iter().map(FilterKind::from_value).collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::Ingress(_) => "ingress",
            FilterKind::Egress(_) => "egress",
            FilterKind::Unattached => "unattached",
            FilterKind::Value(_) => "value",
            FilterKind::Or(_) => "or",
            FilterKind::And(_) => "and",
        }
    }

    pub fn supports(&self, resource: ResourceKind) -> bool {
        match self {
            FilterKind::Ingress(_) | FilterKind::Egress(_) => {
                resource == ResourceKind::SecurityGroupRule
            }
            FilterKind::Unattached => resource == ResourceKind::SecurityGroup,
            FilterKind::Value(_) => true,
            FilterKind::Or(children) | FilterKind::And(children) => {
                children.iter().all(|c| c.supports(resource))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueOp {
    Eq,
    Ne,
    In,
    NotIn,
}

/// Generic attribute comparison on a resource's JSON form.
///
/// `key` is a dotted path. The special values `absent` and `present` test
/// whether the key resolves to a non-null value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueFilter {
    pub key: String,
    pub op: ValueOp,
    pub value: Value,
}

impl ValueFilter {
    pub fn from_block(block: &Map<String, Value>) -> Result<Self, ValidationError> {
        reject_unknown_keys(block, &["type", "key", "value", "op"], "value filter")?;

        let key = block
            .get("key")
            .ok_or_else(|| ValidationError::MissingKey {
                key: "key".to_string(),
                context: "value filter".to_string(),
            })
            .and_then(|k| expect_str(k, "key"))?
            .to_string();
        let value = block.get("value").cloned().unwrap_or(Value::Null);

        let op = match block.get("op").map(|op| expect_str(op, "op")).transpose()? {
            None | Some("eq") | Some("equal") => ValueOp::Eq,
            Some("ne") | Some("not-equal") => ValueOp::Ne,
            Some("in") => ValueOp::In,
            Some("not-in") | Some("ni") => ValueOp::NotIn,
            Some(other) => {
                return Err(ValidationError::InvalidValue {
                    key: "op".to_string(),
                    reason: format!("unsupported operator '{}'", other),
                })
            }
        };
        if matches!(op, ValueOp::In | ValueOp::NotIn) && !value.is_array() {
            return Err(ValidationError::InvalidValue {
                key: "value".to_string(),
                reason: "'in' and 'not-in' need a list".to_string(),
            });
        }

        Ok(Self { key, op, value })
    }

    pub fn matches(&self, resource: &Value) -> bool {
        let pointer = format!("/{}", self.key.replace('.', "/"));
        let actual = resource.pointer(&pointer).filter(|v| !v.is_null());

        match (&self.value, self.op) {
            (Value::String(s), ValueOp::Eq) if s == "absent" => actual.is_none(),
            (Value::String(s), ValueOp::Eq) if s == "present" => actual.is_some(),
            (expected, ValueOp::Eq) => actual == Some(expected),
            (expected, ValueOp::Ne) => actual != Some(expected),
            (Value::Array(items), ValueOp::In) => actual.is_some_and(|a| items.contains(a)),
            (Value::Array(items), ValueOp::NotIn) => !actual.is_some_and(|a| items.contains(a)),
            _ => false,
        }
    }
}

// ============================================================================
// Actions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowLogAction {
    Enable,
    Disable,
    Delete,
    Create(Vec<FlowLogTemplate>),
}

impl FlowLogAction {
    pub fn name(&self) -> &'static str {
        match self {
            FlowLogAction::Enable => "enable",
            FlowLogAction::Disable => "disable",
            FlowLogAction::Delete => "delete",
            FlowLogAction::Create(_) => "create",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Delete,
    RemoveRules(RemovalPlan),
    SetRules { add: RuleTemplates, remove: RemovalPlan },
    SetFlowLog(FlowLogAction),
}

impl ActionKind {
    /// Parses an action entry; a bare string is shorthand for `{type: <string>}`.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let block = match value {
            Value::String(kind) => {
                let mut block = Map::new();
                block.insert("type".to_string(), Value::String(kind.clone()));
                block
            }
            other => expect_object(other, "actions")?.clone(),
        };

        let kind = block.get("type").ok_or_else(|| ValidationError::MissingKey {
            key: "type".to_string(),
            context: "action".to_string(),
        })?;

        match expect_str(kind, "type")? {
            "delete" => {
                reject_unknown_keys(&block, &["type"], "delete action")?;
                Ok(ActionKind::Delete)
            }
            "remove-rules" => Self::parse_remove_rules(&block),
            "set-rules" => Self::parse_set_rules(&block),
            "set-flow-log" => Self::parse_set_flow_log(&block),
            other => Err(ValidationError::InvalidValue {
                key: "type".to_string(),
                reason: format!("unknown action '{}'", other),
            }),
        }
    }

    fn parse_remove_rules(block: &Map<String, Value>) -> Result<Self, ValidationError> {
        reject_unknown_keys(block, &["type", "ingress", "egress"], "remove-rules action")?;

        let mut plan = RemovalPlan::matched();
        if let Some(value) = block.get("ingress") {
            plan.ingress = Some(RemovalSpec::from_value(Direction::Ingress, value)?);
        }
        if let Some(value) = block.get("egress") {
            plan.egress = Some(RemovalSpec::from_value(Direction::Egress, value)?);
        }
        Ok(ActionKind::RemoveRules(plan))
    }

    fn parse_set_rules(block: &Map<String, Value>) -> Result<Self, ValidationError> {
        reject_unknown_keys(
            block,
            &["type", "add-ingress", "add-egress", "remove-ingress", "remove-egress"],
            "set-rules action",
        )?;

        let mut add = RuleTemplates::default();
        let mut remove = RemovalPlan::default();
        for direction in Direction::ALL {
            if let Some(value) = block.get(&format!("add-{}", direction)) {
                let templates = RuleTemplates::parse_direction(direction, value)?;
                match direction {
                    Direction::Ingress => add.ingress = templates,
                    Direction::Egress => add.egress = templates,
                }
            }
            if let Some(value) = block.get(&format!("remove-{}", direction)) {
                let spec = Some(RemovalSpec::from_value(direction, value)?);
                match direction {
                    Direction::Ingress => remove.ingress = spec,
                    Direction::Egress => remove.egress = spec,
                }
            }
        }
        Ok(ActionKind::SetRules { add, remove })
    }

    fn parse_set_flow_log(block: &Map<String, Value>) -> Result<Self, ValidationError> {
        reject_unknown_keys(block, &["type", "action", "create-attrs"], "set-flow-log action")?;

        let action = block.get("action").ok_or_else(|| ValidationError::MissingKey {
            key: "action".to_string(),
            context: "set-flow-log action".to_string(),
        })?;

        match expect_str(action, "action")? {
            "enable" => Ok(ActionKind::SetFlowLog(FlowLogAction::Enable)),
            "disable" => Ok(ActionKind::SetFlowLog(FlowLogAction::Disable)),
            "delete" => Ok(ActionKind::SetFlowLog(FlowLogAction::Delete)),
            "create" => {
                let templates = match block.get("create-attrs") {
                    None => Vec::new(),
                    Some(Value::Array(entries)) => entries
                        .iter()
                        .map(|e| FlowLogTemplate::from_attributes(expect_object(e, "create-attrs")?))
                        .collect::<Result<Vec<_>, _>>()?,
                    Some(other) => {
                        return Err(ValidationError::InvalidValue {
                            key: "create-attrs".to_string(),
                            reason: format!("expected a list, got {}", other),
                        })
                    }
                };
                Ok(ActionKind::SetFlowLog(FlowLogAction::Create(templates)))
            }
            other => Err(ValidationError::InvalidValue {
                key: "action".to_string(),
                reason: format!(
                    "expected 'enable', 'disable', 'create' or 'delete', got '{}'",
                    other
                ),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Delete => "delete",
            ActionKind::RemoveRules(_) => "remove-rules",
            ActionKind::SetRules { .. } => "set-rules",
            ActionKind::SetFlowLog(_) => "set-flow-log",
        }
    }

    pub fn supports(&self, resource: ResourceKind) -> bool {
        match self {
            ActionKind::Delete => matches!(
                resource,
                ResourceKind::SecurityGroupRule | ResourceKind::SecurityGroup
            ),
            ActionKind::RemoveRules(_) | ActionKind::SetRules { .. } => {
                resource == ResourceKind::SecurityGroupRule
            }
            ActionKind::SetFlowLog(_) => resource == ResourceKind::FlowLog,
        }
    }
}

// ============================================================================
// Aggregate Root: Policy
// ============================================================================

/// Policy as written in the document, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDefinition {
    pub name: String,

    pub resource: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub filters: Vec<Value>,

    #[serde(default)]
    pub actions: Vec<Value>,
}

/// Top-level policy document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDocument {
    pub policies: Vec<PolicyDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub name: String,
    pub description: Option<String>,
    pub resource: ResourceKind,
    pub filters: Vec<FilterKind>,
    pub actions: Vec<ActionKind>,
}

impl Policy {
    pub fn from_definition(definition: &PolicyDefinition) -> Result<Self, ValidationError> {
        let name = definition.name.trim();
        if name.is_empty() {
            return Err(ValidationError::InvalidPolicy {
                policy: definition.name.clone(),
                reason: "name cannot be empty".to_string(),
            });
        }
        let in_policy = |err: ValidationError| ValidationError::InvalidPolicy {
            policy: name.to_string(),
            reason: err.to_string(),
        };

        let resource: ResourceKind = definition.resource.parse().map_err(in_policy)?;

        let filters = definition
            .filters
            .iter()
            .map(FilterKind::from_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(in_policy)?;
        if let Some(filter) = filters.iter().find(|f| !f.supports(resource)) {
            return Err(ValidationError::InvalidPolicy {
                policy: name.to_string(),
                reason: format!("filter '{}' is not available on {}", filter.name(), resource),
            });
        }

        let actions = definition
            .actions
            .iter()
            .map(ActionKind::from_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(in_policy)?;
        if let Some(action) = actions.iter().find(|a| !a.supports(resource)) {
            return Err(ValidationError::InvalidPolicy {
                policy: name.to_string(),
                reason: format!("action '{}' is not available on {}", action.name(), resource),
            });
        }

        Ok(Self {
            name: name.to_string(),
            description: definition.description.clone(),
            resource,
            filters,
            actions,
        })
    }
}

/// Validated policies of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySet {
    pub policies: Vec<Policy>,
}

impl PolicySet {
    pub fn from_document(document: &PolicyDocument) -> Result<Self, ValidationError> {
        let mut seen = HashSet::new();
        let mut policies = Vec::with_capacity(document.policies.len());

        for definition in &document.policies {
            let policy = Policy::from_definition(definition)?;
            if !seen.insert(policy.name.clone()) {
                return Err(ValidationError::InvalidPolicy {
                    policy: policy.name,
                    reason: "duplicate policy name".to_string(),
                });
            }
            policies.push(policy);
        }

        Ok(Self { policies })
    }

    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.name == name)
    }
}
