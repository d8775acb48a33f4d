// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Rule-Set Reconciliation Model
//!
//! Removal specs, addition templates and the result records produced by the
//! reconciler and the other batch actions.
//!
//! ## Removal Specs
//!
//! ```yaml
//! remove-ingress: matched      # rules handed to the action
//! remove-egress: all           # every rule of the direction on the affected groups
//! remove-egress:               # one store query per entry
//!   - action: allow
//!     remote_ip_prefix: '0.0.0.0/0'
//! ```
//!
//! Explicit entries need at least two attributes so a single loose key cannot
//! select a whole rule set.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::rule::{Direction, SecurityGroupRule};
use crate::domain::store::{StoreOperation, TransportError};
use crate::domain::template::{RuleQuery, RuleTemplate};
use crate::domain::validation::{expect_object, ValidationError};

/// Minimum attributes on an explicit removal entry.
pub const MIN_REMOVAL_ATTRIBUTES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalSpec {
    /// The input rules of the direction, already selected by a filter.
    Matched,
    /// Every rule of the direction on the affected groups.
    All,
    /// One store query per entry.
    Explicit(Vec<RuleQuery>),
}

impl RemovalSpec {
    pub fn from_value(direction: Direction, value: &Value) -> Result<Self, ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidRemovalSpec {
            direction: direction.to_string(),
            reason,
        };

        match value {
            Value::String(s) if s == "matched" => Ok(RemovalSpec::Matched),
            Value::String(s) if s == "all" => Ok(RemovalSpec::All),
            Value::Array(entries) => entries
                .iter()
                .map(|entry| {
                    let attributes = expect_object(entry, direction.as_str())?;
                    if attributes.len() < MIN_REMOVAL_ATTRIBUTES {
                        return Err(invalid(format!(
                            "each entry needs at least {} attributes, got {}",
                            MIN_REMOVAL_ATTRIBUTES,
                            attributes.len()
                        )));
                    }
                    RuleQuery::from_attributes(direction, attributes)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(RemovalSpec::Explicit),
            other => Err(invalid(format!(
                "expected 'matched', 'all' or a list of rule attributes, got {}",
                other
            ))),
        }
    }
}

/// Removal spec per direction. `None` leaves the direction untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalPlan {
    pub ingress: Option<RemovalSpec>,
    pub egress: Option<RemovalSpec>,
}

impl RemovalPlan {
    /// Both directions `matched`, the `remove-rules` default.
    pub fn matched() -> Self {
        Self {
            ingress: Some(RemovalSpec::Matched),
            egress: Some(RemovalSpec::Matched),
        }
    }

    pub fn get(&self, direction: Direction) -> Option<&RemovalSpec> {
        match direction {
            Direction::Ingress => self.ingress.as_ref(),
            Direction::Egress => self.egress.as_ref(),
        }
    }
}

/// Rules to create per direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTemplates {
    pub ingress: Vec<RuleTemplate>,
    pub egress: Vec<RuleTemplate>,
}

impl RuleTemplates {
    pub fn get(&self, direction: Direction) -> &[RuleTemplate] {
        match direction {
            Direction::Ingress => &self.ingress,
            Direction::Egress => &self.egress,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ingress.is_empty() && self.egress.is_empty()
    }

    /// Ingress templates followed by egress templates.
    pub fn combined(&self) -> Vec<RuleTemplate> {
        self.ingress.iter().chain(self.egress.iter()).cloned().collect()
    }

    /// Parses an `add-<direction>` list.
    pub fn parse_direction(direction: Direction, value: &Value) -> Result<Vec<RuleTemplate>, ValidationError> {
        let key = format!("add-{}", direction);
        let entries = value.as_array().ok_or_else(|| ValidationError::InvalidValue {
            key: key.clone(),
            reason: format!("expected a list of rule attributes, got {}", value),
        })?;
        entries
            .iter()
            .map(|entry| RuleTemplate::from_attributes(direction, expect_object(entry, &key)?))
            .collect()
    }
}

/// A single failed store call, attributed to the resource it targeted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Rule, security group or flow log id; for failed list queries the direction.
    pub resource_id: String,
    pub operation: StoreOperation,
    pub status_code: u16,
    pub request_id: String,
    pub reason: String,
}

impl FailureRecord {
    pub fn new(resource_id: impl Into<String>, operation: StoreOperation, error: &TransportError) -> Self {
        Self {
            resource_id: resource_id.into(),
            operation,
            status_code: error.status_code,
            request_id: error.request_id.clone(),
            reason: error.message.clone(),
        }
    }
}

/// Successes and failures of one batch action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<FailureRecord>,
}

impl<T> Default for ActionResult<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> ActionResult<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, item: T) {
        self.succeeded.push(item);
    }

    pub fn record_failure(&mut self, failure: FailureRecord) {
        self.failed.push(failure);
    }

    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty()
    }
}

/// Result of rule removal or addition.
pub type ReconcileResult = ActionResult<SecurityGroupRule>;

/// `remove-rules` report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveRulesReport {
    pub remove_succeeded_rules: Vec<SecurityGroupRule>,
    pub remove_failed_rules: Vec<FailureRecord>,
}

impl From<ReconcileResult> for RemoveRulesReport {
    fn from(result: ReconcileResult) -> Self {
        Self {
            remove_succeeded_rules: result.succeeded,
            remove_failed_rules: result.failed,
        }
    }
}

/// `set-rules` report combining addition and removal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetRulesReport {
    pub add_succeeded_rules: Vec<SecurityGroupRule>,
    pub add_failed_rules: Vec<FailureRecord>,
    pub remove_succeeded_rules: Vec<SecurityGroupRule>,
    pub remove_failed_rules: Vec<FailureRecord>,
}

impl SetRulesReport {
    pub fn new(added: ReconcileResult, removed: ReconcileResult) -> Self {
        Self {
            add_succeeded_rules: added.succeeded,
            add_failed_rules: added.failed,
            remove_succeeded_rules: removed.succeeded,
            remove_failed_rules: removed.failed,
        }
    }
}
