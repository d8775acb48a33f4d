// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Rule Matcher
//!
//! Pure evaluation of a [`FilterSpec`] against security-group rules. No store
//! calls are made here.
//!
//! ## Evaluation
//!
//! Each rule is run through independent sub-predicates. A predicate returns
//! `None` when its keys are absent from the filter and `Some(bool)` otherwise:
//!
//! 1. `direction` (always applicable)
//! 2. `ips`, `protocols`
//! 3. list membership (`SGRuleIds`, `SecurityGroupIds`, `Descriptions`,
//!    `Ethertypes`, `Priorities`, `SGReferenceIds`, `AGReferenceIds`, `Action`)
//! 4. `ports` (`InPorts` / `NotInPorts` against the rule's `multiport`)
//! 5. `self_reference`
//!
//! The applicable results are folded with `all` (`and`) or `any` (`or`). An
//! empty result set never matches, whatever the operator.
//!
//! Matches are recorded in [`MatchAnnotations`] under the owning group's
//! `MatchedIngress` / `MatchedEgress` list, once per rule id.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::trace;

use crate::domain::filter::{FilterSpec, MatchOperator, RemotePrefix};
use crate::domain::multiport::PortCoverage;
use crate::domain::rule::{Direction, SecurityGroupRule, ANY};
use crate::domain::validation::ValidationError;

/// Sub-predicates evaluated for every rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    Direction,
    Ips,
    SgRuleIds,
    SecurityGroupIds,
    Descriptions,
    Ethertypes,
    Priorities,
    SgReferenceIds,
    AgReferenceIds,
    Protocols,
    Ports,
    SelfReference,
    Action,
}

/// Per-predicate outcome for one rule; `None` marks a predicate the filter does not use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEvaluation {
    pub results: Vec<(Predicate, Option<bool>)>,
}

impl RuleEvaluation {
    pub fn applicable(&self) -> Vec<bool> {
        self.results.iter().filter_map(|(_, r)| *r).collect()
    }

    pub fn get(&self, predicate: Predicate) -> Option<bool> {
        self.results
            .iter()
            .find(|(p, _)| *p == predicate)
            .and_then(|(_, r)| *r)
    }
}

/// Folds applicable predicate results. An empty slice is `false` for both
/// operators so a filter without usable keys cannot match everything.
pub fn combine(operator: MatchOperator, results: &[bool]) -> bool {
    if results.is_empty() {
        return false;
    }
    match operator {
        MatchOperator::And => results.iter().all(|r| *r),
        MatchOperator::Or => results.iter().any(|r| *r),
    }
}

/// Evaluates one filter block against rules.
#[derive(Debug, Clone)]
pub struct RuleMatcher {
    spec: FilterSpec,
}

impl RuleMatcher {
    pub fn new(spec: FilterSpec) -> Self {
        Self { spec }
    }

    /// Validates a raw filter block and builds a matcher for it.
    pub fn from_value(block: &Value) -> Result<Self, ValidationError> {
        Ok(Self::new(FilterSpec::from_value(block)?))
    }

    pub fn direction(&self) -> Direction {
        self.spec.direction
    }

    pub fn evaluate(&self, rule: &SecurityGroupRule) -> RuleEvaluation {
        let spec = &self.spec;
        RuleEvaluation {
            results: vec![
                (Predicate::Direction, Some(rule.direction == spec.direction)),
                (Predicate::Ips, self.process_ips(rule)),
                (Predicate::SgRuleIds, membership(&spec.sg_rule_ids, Some(&rule.id))),
                (
                    Predicate::SecurityGroupIds,
                    membership(&spec.security_group_ids, Some(&rule.security_group_id)),
                ),
                (
                    Predicate::Descriptions,
                    membership(&spec.descriptions, rule.description.as_ref()),
                ),
                (Predicate::Ethertypes, membership(&spec.ethertypes, rule.ethertype.as_ref())),
                (Predicate::Priorities, membership(&spec.priorities, rule.priority.as_ref())),
                (
                    Predicate::SgReferenceIds,
                    membership(&spec.sg_reference_ids, rule.remote_group_id.as_ref()),
                ),
                (
                    Predicate::AgReferenceIds,
                    membership(&spec.ag_reference_ids, rule.remote_address_group_id.as_ref()),
                ),
                (Predicate::Protocols, self.process_protocols(rule)),
                (Predicate::Ports, self.process_ports(rule)),
                (Predicate::SelfReference, self.process_self_reference(rule)),
                (Predicate::Action, membership(&spec.action, rule.action.as_ref())),
            ],
        }
    }

    pub fn matches(&self, rule: &SecurityGroupRule) -> bool {
        let evaluation = self.evaluate(rule);
        let matched = combine(self.spec.match_operator, &evaluation.applicable());
        trace!(
            rule_id = %rule.id,
            direction = %self.spec.direction,
            matched,
            "Evaluated security group rule"
        );
        matched
    }

    /// Returns the matching rules in input order and annotates each on its group.
    pub fn match_all(
        &self,
        rules: &[SecurityGroupRule],
        annotations: &mut MatchAnnotations,
    ) -> Vec<SecurityGroupRule> {
        rules
            .iter()
            .filter(|rule| self.matches(rule))
            .inspect(|rule| {
                annotations.record(rule, self.spec.direction);
            })
            .cloned()
            .collect()
    }

    fn process_ips(&self, rule: &SecurityGroupRule) -> Option<bool> {
        let prefix = rule.remote_ip_prefix.as_deref();
        self.spec.remote_ip_prefix.as_ref().map(|wanted| match wanted {
            RemotePrefix::Any => matches!(prefix, None | Some(ANY)),
            RemotePrefix::Cidr(cidr) => prefix == Some(cidr.as_str()),
        })
    }

    fn process_protocols(&self, rule: &SecurityGroupRule) -> Option<bool> {
        let protocol = rule.effective_protocol();
        self.spec
            .protocols
            .as_ref()
            .map(|protocols| protocols.iter().any(|p| p == protocol))
    }

    fn process_ports(&self, rule: &SecurityGroupRule) -> Option<bool> {
        if !self.spec.has_port_criteria() {
            return None;
        }
        let in_ports = &self.spec.in_ports;
        let not_in_ports = &self.spec.not_in_ports;

        let coverage = PortCoverage::parse(rule.multiport.as_deref());
        let found = if coverage.is_all() {
            // an all-ports rule satisfies any InPorts but can never pass a NotInPorts check
            !in_ports.is_empty() && not_in_ports.is_empty()
        } else {
            in_ports.iter().all(|port| coverage.covers(*port))
                && not_in_ports.iter().all(|port| !coverage.covers(*port))
        };
        Some(found)
    }

    fn process_self_reference(&self, rule: &SecurityGroupRule) -> Option<bool> {
        self.spec.self_reference.map(|wanted| {
            if wanted {
                rule.is_self_reference()
            } else {
                !rule.is_self_reference()
            }
        })
    }
}

fn membership<T: PartialEq>(filter: &Option<Vec<T>>, value: Option<&T>) -> Option<bool> {
    filter
        .as_ref()
        .map(|items| value.is_some_and(|v| items.contains(v)))
}

/// Matched rules of one security group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMatches {
    #[serde(rename = "MatchedIngress", default, skip_serializing_if = "Vec::is_empty")]
    pub ingress: Vec<SecurityGroupRule>,

    #[serde(rename = "MatchedEgress", default, skip_serializing_if = "Vec::is_empty")]
    pub egress: Vec<SecurityGroupRule>,
}

impl GroupMatches {
    pub fn get(&self, direction: Direction) -> &[SecurityGroupRule] {
        match direction {
            Direction::Ingress => &self.ingress,
            Direction::Egress => &self.egress,
        }
    }

    fn get_mut(&mut self, direction: Direction) -> &mut Vec<SecurityGroupRule> {
        match direction {
            Direction::Ingress => &mut self.ingress,
            Direction::Egress => &mut self.egress,
        }
    }
}

/// Match annotations keyed by security group id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchAnnotations {
    groups: BTreeMap<String, GroupMatches>,
}

impl MatchAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `rule` under its group's `Matched<direction>` list.
    /// Returns `false` when the rule was already recorded there.
    pub fn record(&mut self, rule: &SecurityGroupRule, direction: Direction) -> bool {
        let matched = self
            .groups
            .entry(rule.security_group_id.clone())
            .or_default()
            .get_mut(direction);

        if matched.iter().any(|r| r.id == rule.id) {
            return false;
        }
        matched.push(rule.clone());
        true
    }

    pub fn group(&self, security_group_id: &str) -> Option<&GroupMatches> {
        self.groups.get(security_group_id)
    }

    pub fn matched(&self, security_group_id: &str, direction: Direction) -> &[SecurityGroupRule] {
        self.groups
            .get(security_group_id)
            .map(|g| g.get(direction))
            .unwrap_or(&[])
    }

    pub fn groups(&self) -> impl Iterator<Item = (&String, &GroupMatches)> {
        self.groups.iter()
    }

    /// Total number of recorded matches across groups and directions.
    pub fn len(&self) -> usize {
        self.groups
            .values()
            .map(|g| g.ingress.len() + g.egress.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(id: &str, direction: Direction) -> SecurityGroupRule {
        SecurityGroupRule::new(id, "sg-1", direction)
    }

    fn matcher(block: Value) -> RuleMatcher {
        RuleMatcher::from_value(&block).unwrap()
    }

    #[test]
    fn test_combine_empty_never_matches() {
        assert!(!combine(MatchOperator::And, &[]));
        assert!(!combine(MatchOperator::Or, &[]));
        assert!(combine(MatchOperator::And, &[true, true]));
        assert!(!combine(MatchOperator::And, &[true, false]));
        assert!(combine(MatchOperator::Or, &[false, true]));
    }

    #[test]
    fn test_direction_only_filter() {
        let m = matcher(json!({"type": "ingress"}));
        assert!(m.matches(&rule("r1", Direction::Ingress)));
        assert!(!m.matches(&rule("r2", Direction::Egress)));
    }

    #[test]
    fn test_unused_predicates_are_not_applicable() {
        let m = matcher(json!({"type": "ingress", "Protocols": ["tcp"]}));
        let evaluation = m.evaluate(&rule("r1", Direction::Ingress));
        assert_eq!(evaluation.get(Predicate::Ports), None);
        assert_eq!(evaluation.get(Predicate::Ips), None);
        assert_eq!(evaluation.get(Predicate::Protocols), Some(false));
        assert_eq!(evaluation.applicable(), vec![true, false]);
    }

    #[test]
    fn test_ports_range_cases() {
        let mut r = rule("r1", Direction::Ingress);
        r.multiport = Some("20-30".to_string());

        assert!(matcher(json!({"type": "ingress", "InPorts": [25]})).matches(&r));
        assert!(!matcher(json!({"type": "ingress", "InPorts": [35]})).matches(&r));
        assert!(!matcher(json!({"type": "ingress", "NotInPorts": [25]})).matches(&r));
        assert!(matcher(json!({"type": "ingress", "NotInPorts": [35]})).matches(&r));
    }

    #[test]
    fn test_every_in_port_must_be_covered() {
        let mut r = rule("r1", Direction::Ingress);
        r.multiport = Some("22,80-90".to_string());

        assert!(matcher(json!({"type": "ingress", "InPorts": [22, 85]})).matches(&r));
        assert!(!matcher(json!({"type": "ingress", "InPorts": [22, 443]})).matches(&r));
        assert!(!matcher(json!({"type": "ingress", "NotInPorts": [443, 22]})).matches(&r));
        assert!(!matcher(json!({"type": "ingress", "InPorts": [22], "NotInPorts": [85]})).matches(&r));
    }

    #[test]
    fn test_all_ports_rule() {
        let r = rule("r1", Direction::Ingress);

        assert!(matcher(json!({"type": "ingress", "InPorts": [80]})).matches(&r));
        assert!(!matcher(json!({"type": "ingress", "NotInPorts": [80]})).matches(&r));
        assert!(!matcher(json!({"type": "ingress", "InPorts": [80], "NotInPorts": [22]})).matches(&r));

        let mut sentinel = rule("r2", Direction::Ingress);
        sentinel.multiport = Some("-1".to_string());
        assert!(matcher(json!({"type": "ingress", "InPorts": [443]})).matches(&sentinel));
    }

    #[test]
    fn test_any_protocol_sentinel() {
        let m = matcher(json!({"type": "ingress", "Protocols": [-1]}));

        let absent = rule("r1", Direction::Ingress);
        let mut explicit = rule("r2", Direction::Ingress);
        explicit.protocol = Some("-1".to_string());
        let mut tcp = rule("r3", Direction::Ingress);
        tcp.protocol = Some("tcp".to_string());

        assert!(m.matches(&absent));
        assert!(m.matches(&explicit));
        assert!(!m.matches(&tcp));
    }

    #[test]
    fn test_remote_ip_prefix() {
        let mut open = rule("r1", Direction::Ingress);
        open.remote_ip_prefix = Some("0.0.0.0/0".to_string());
        let unset = rule("r2", Direction::Ingress);

        let cidr = matcher(json!({"type": "ingress", "RemoteIpPrefix": "0.0.0.0/0"}));
        assert!(cidr.matches(&open));
        assert!(!cidr.matches(&unset));

        let any = matcher(json!({"type": "ingress", "RemoteIpPrefix": -1}));
        assert!(!any.matches(&open));
        assert!(any.matches(&unset));
    }

    #[test]
    fn test_self_reference() {
        let mut own = rule("r1", Direction::Ingress);
        own.remote_group_id = Some("sg-1".to_string());
        let mut other = rule("r2", Direction::Ingress);
        other.remote_group_id = Some("sg-2".to_string());
        let none = rule("r3", Direction::Ingress);

        let yes = matcher(json!({"type": "ingress", "SelfReference": true}));
        assert!(yes.matches(&own));
        assert!(!yes.matches(&other));
        assert!(!yes.matches(&none));

        let no = matcher(json!({"type": "ingress", "SelfReference": false}));
        assert!(!no.matches(&own));
        assert!(no.matches(&other));
        assert!(no.matches(&none));
    }

    #[test]
    fn test_membership_requires_field() {
        let m = matcher(json!({"type": "ingress", "Descriptions": ["ssh"], "Action": "allow"}));

        let mut full = rule("r1", Direction::Ingress);
        full.description = Some("ssh".to_string());
        full.action = Some(crate::domain::rule::RuleAction::Allow);
        assert!(m.matches(&full));

        let mut missing_action = full.clone();
        missing_action.action = None;
        assert!(!m.matches(&missing_action));
    }

    #[test]
    fn test_or_operator_includes_direction_result() {
        let m = matcher(json!({"type": "ingress", "match-operator": "or", "Priorities": [1]}));

        let mut egress = rule("r1", Direction::Egress);
        egress.priority = Some(1);
        let mut ingress = rule("r2", Direction::Ingress);
        ingress.priority = Some(50);

        assert!(m.matches(&egress));
        assert!(m.matches(&ingress));
        assert!(!m.matches(&rule("r3", Direction::Egress)));
    }

    #[test]
    fn test_match_all_annotates_once() {
        let m = matcher(json!({"type": "ingress"}));
        let rules = vec![
            rule("r1", Direction::Ingress),
            rule("r2", Direction::Egress),
            SecurityGroupRule::new("r3", "sg-2", Direction::Ingress),
        ];
        let mut annotations = MatchAnnotations::new();

        let matched = m.match_all(&rules, &mut annotations);
        assert_eq!(matched.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["r1", "r3"]);

        m.match_all(&rules, &mut annotations);
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations.matched("sg-1", Direction::Ingress).len(), 1);
        assert_eq!(annotations.matched("sg-2", Direction::Ingress)[0].id, "r3");
        assert!(annotations.matched("sg-1", Direction::Egress).is_empty());

        let json = serde_json::to_value(&annotations).unwrap();
        assert_eq!(json["sg-1"]["MatchedIngress"][0]["id"], "r1");
    }
}
