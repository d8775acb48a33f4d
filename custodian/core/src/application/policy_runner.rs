// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Policy Runner
//!
//! Application service executing validated policies against the network
//! stores.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** List, filter and act on one resource kind per policy
//! - **Collaborators:**
//!   - Domain: `Policy`, `RuleMatcher`, `MatchAnnotations`
//!   - Application: `RuleSetReconciler`, `SecurityGroupService`, `FlowLogService`
//!   - Infrastructure: `RuleStore`, `SecurityGroupStore`, `FlowLogStore`
//!
//! # Flow
//!
//! 1. List every resource of the policy's kind
//! 2. Apply the top-level filters in order, each narrowing the set
//! 3. Run the actions in order against what is left (skipped in dry-run mode)
//! 4. Return a `PolicyRunReport`
//!
//! # Error Handling
//!
//! Listing failures and an `unattached` port lookup failure abort the policy.
//! Failures inside actions are recorded in the action report.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use crate::application::flow_log::FlowLogService;
use crate::application::reconciler::RuleSetReconciler;
use crate::application::security_group::SecurityGroupService;
use crate::domain::matcher::{MatchAnnotations, RuleMatcher};
use crate::domain::network::{FlowLog, Port, SecurityGroup};
use crate::domain::policy::{ActionKind, FilterKind, Policy, PolicySet, ResourceKind};
use crate::domain::reconcile::{ActionResult, ReconcileResult, RemoveRulesReport, SetRulesReport};
use crate::domain::rule::{Direction, SecurityGroupRule};
use crate::domain::store::{FlowLogStore, RuleStore, SecurityGroupStore};
use crate::domain::template::RuleQuery;

/// Resources of one kind, in store order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResourceSet {
    Rules(Vec<SecurityGroupRule>),
    Groups(Vec<SecurityGroup>),
    FlowLogs(Vec<FlowLog>),
    Ports(Vec<Port>),
}

impl ResourceSet {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSet::Rules(_) => ResourceKind::SecurityGroupRule,
            ResourceSet::Groups(_) => ResourceKind::SecurityGroup,
            ResourceSet::FlowLogs(_) => ResourceKind::FlowLog,
            ResourceSet::Ports(_) => ResourceKind::Port,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ResourceSet::Rules(r) => r.len(),
            ResourceSet::Groups(g) => g.len(),
            ResourceSet::FlowLogs(f) => f.len(),
            ResourceSet::Ports(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// JSON form of each resource, as seen by `value` filters.
    pub fn to_values(&self) -> Result<Vec<Value>> {
        let values: Result<Vec<Value>, serde_json::Error> = match self {
            ResourceSet::Rules(r) => r.iter().map(serde_json::to_value).collect(),
            ResourceSet::Groups(g) => g.iter().map(serde_json::to_value).collect(),
            ResourceSet::FlowLogs(f) => f.iter().map(serde_json::to_value).collect(),
            ResourceSet::Ports(p) => p.iter().map(serde_json::to_value).collect(),
        };
        values.context("Failed to serialize resources")
    }

    fn retain_mask(&mut self, mask: &[bool]) {
        fn retain<T>(items: &mut Vec<T>, mask: &[bool]) {
            let mut keep = mask.iter();
            items.retain(|_| keep.next().copied().unwrap_or(false));
        }
        match self {
            ResourceSet::Rules(r) => retain(r, mask),
            ResourceSet::Groups(g) => retain(g, mask),
            ResourceSet::FlowLogs(f) => retain(f, mask),
            ResourceSet::Ports(p) => retain(p, mask),
        }
    }
}

/// `set-flow-log` outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowLogReport {
    pub action: String,
    #[serde(flatten)]
    pub result: ActionResult<FlowLog>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ActionReport {
    DeleteRules(ReconcileResult),
    DeleteGroups(ActionResult<SecurityGroup>),
    RemoveRules(RemoveRulesReport),
    SetRules(SetRulesReport),
    SetFlowLog(FlowLogReport),
}

impl ActionReport {
    pub fn failure_count(&self) -> usize {
        match self {
            ActionReport::DeleteRules(r) => r.failed.len(),
            ActionReport::DeleteGroups(r) => r.failed.len(),
            ActionReport::RemoveRules(r) => r.remove_failed_rules.len(),
            ActionReport::SetRules(r) => r.add_failed_rules.len() + r.remove_failed_rules.len(),
            ActionReport::SetFlowLog(r) => r.result.failed.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyRunReport {
    pub policy: String,
    pub resource: ResourceKind,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub scanned: usize,
    pub matched: usize,
    pub resources: ResourceSet,
    #[serde(skip_serializing_if = "MatchAnnotations::is_empty")]
    pub annotations: MatchAnnotations,
    pub actions: Vec<ActionReport>,
}

impl PolicyRunReport {
    pub fn failure_count(&self) -> usize {
        self.actions.iter().map(ActionReport::failure_count).sum()
    }
}

pub struct PolicyRunner {
    rule_store: Arc<dyn RuleStore>,
    group_store: Arc<dyn SecurityGroupStore>,
    flow_log_store: Arc<dyn FlowLogStore>,
    reconciler: RuleSetReconciler,
    groups: SecurityGroupService,
    flow_logs: FlowLogService,
    dry_run: bool,
}

impl PolicyRunner {
    pub fn new(
        rule_store: Arc<dyn RuleStore>,
        group_store: Arc<dyn SecurityGroupStore>,
        flow_log_store: Arc<dyn FlowLogStore>,
    ) -> Self {
        Self {
            reconciler: RuleSetReconciler::new(rule_store.clone()),
            groups: SecurityGroupService::new(group_store.clone()),
            flow_logs: FlowLogService::new(flow_log_store.clone()),
            rule_store,
            group_store,
            flow_log_store,
            dry_run: false,
        }
    }

    /// Runner over a single store serving every resource kind.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: RuleStore + SecurityGroupStore + FlowLogStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store)
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run_all(&self, policies: &PolicySet) -> Result<Vec<PolicyRunReport>> {
        let mut reports = Vec::with_capacity(policies.policies.len());
        for policy in &policies.policies {
            reports.push(
                self.run(policy)
                    .await
                    .with_context(|| format!("Policy '{}' failed", policy.name))?,
            );
        }
        Ok(reports)
    }

    pub async fn run(&self, policy: &Policy) -> Result<PolicyRunReport> {
        let started_at = Utc::now();
        let mut resources = self.list(policy.resource).await?;
        let scanned = resources.len();

        let mut annotations = MatchAnnotations::new();
        for filter in &policy.filters {
            let mask = self.filter_mask(filter, &resources, &mut annotations).await?;
            resources.retain_mask(&mask);
        }
        if let ResourceSet::Rules(rules) = &resources {
            annotations = retain_annotations(&annotations, rules);
        }

        info!(
            policy = %policy.name,
            resource = %policy.resource,
            scanned,
            matched = resources.len(),
            "Filtered resources"
        );

        let mut actions = Vec::new();
        if self.dry_run {
            info!(policy = %policy.name, "Dry run, skipping {} action(s)", policy.actions.len());
        } else {
            for action in &policy.actions {
                actions.push(self.execute(action, &resources).await?);
            }
        }

        Ok(PolicyRunReport {
            policy: policy.name.clone(),
            resource: policy.resource,
            dry_run: self.dry_run,
            started_at,
            scanned,
            matched: resources.len(),
            resources,
            annotations,
            actions,
        })
    }

    async fn list(&self, resource: ResourceKind) -> Result<ResourceSet> {
        let resources = match resource {
            ResourceKind::SecurityGroupRule => ResourceSet::Rules(
                self.rule_store
                    .list_rules(&RuleQuery::default())
                    .await
                    .context("Failed to list security group rules")?,
            ),
            ResourceKind::SecurityGroup => ResourceSet::Groups(
                self.group_store
                    .list_security_groups()
                    .await
                    .context("Failed to list security groups")?,
            ),
            ResourceKind::FlowLog => ResourceSet::FlowLogs(
                self.flow_log_store
                    .list_flow_logs()
                    .await
                    .context("Failed to list flow logs")?,
            ),
            ResourceKind::Port => ResourceSet::Ports(
                self.group_store
                    .list_all_ports()
                    .await
                    .context("Failed to list ports")?,
            ),
        };
        Ok(resources)
    }

    /// Per-resource verdict of `filter`. Matching rules are annotated.
    fn filter_mask<'a>(
        &'a self,
        filter: &'a FilterKind,
        resources: &'a ResourceSet,
        annotations: &'a mut MatchAnnotations,
    ) -> BoxFuture<'a, Result<Vec<bool>>> {
        async move {
            match filter {
                FilterKind::Ingress(spec) | FilterKind::Egress(spec) => {
                    let ResourceSet::Rules(rules) = resources else {
                        anyhow::bail!("Filter '{}' needs security group rules", filter.name());
                    };
                    let matcher = RuleMatcher::new(spec.clone());
                    Ok(rules
                        .iter()
                        .map(|rule| {
                            let matched = matcher.matches(rule);
                            if matched {
                                annotations.record(rule, matcher.direction());
                            }
                            matched
                        })
                        .collect())
                }
                FilterKind::Unattached => {
                    let ResourceSet::Groups(groups) = resources else {
                        anyhow::bail!("Filter 'unattached' needs security groups");
                    };
                    let unattached = self
                        .groups
                        .filter_unattached(groups.clone())
                        .await
                        .context("Failed to list ports for unattached filter")?;
                    let ids: HashSet<&str> = unattached.iter().map(|g| g.id.as_str()).collect();
                    Ok(groups.iter().map(|g| ids.contains(g.id.as_str())).collect())
                }
                FilterKind::Value(value_filter) => Ok(resources
                    .to_values()?
                    .iter()
                    .map(|v| value_filter.matches(v))
                    .collect()),
                FilterKind::Or(children) => {
                    let mut mask = vec![false; resources.len()];
                    for child in children {
                        let child_mask = self.filter_mask(child, resources, &mut *annotations).await?;
                        for (kept, hit) in mask.iter_mut().zip(child_mask) {
                            *kept |= hit;
                        }
                    }
                    Ok(mask)
                }
                FilterKind::And(children) => {
                    let mut mask = vec![true; resources.len()];
                    for child in children {
                        let child_mask = self.filter_mask(child, resources, &mut *annotations).await?;
                        for (kept, hit) in mask.iter_mut().zip(child_mask) {
                            *kept &= hit;
                        }
                    }
                    Ok(mask)
                }
            }
        }
        .boxed()
    }

    async fn execute(&self, action: &ActionKind, resources: &ResourceSet) -> Result<ActionReport> {
        let report = match (action, resources) {
            (ActionKind::Delete, ResourceSet::Rules(rules)) => {
                ActionReport::DeleteRules(self.reconciler.delete_rules(rules).await)
            }
            (ActionKind::Delete, ResourceSet::Groups(groups)) => {
                ActionReport::DeleteGroups(self.groups.delete_groups(groups).await)
            }
            (ActionKind::RemoveRules(plan), ResourceSet::Rules(rules)) => {
                ActionReport::RemoveRules(self.reconciler.remove_rules(rules, plan).await.into())
            }
            (ActionKind::SetRules { add, remove }, ResourceSet::Rules(rules)) => {
                ActionReport::SetRules(self.reconciler.set_rules(rules, add, remove).await)
            }
            (ActionKind::SetFlowLog(flow_log_action), ResourceSet::FlowLogs(flow_logs)) => {
                ActionReport::SetFlowLog(FlowLogReport {
                    action: flow_log_action.name().to_string(),
                    result: self.flow_logs.apply(flow_logs, flow_log_action).await,
                })
            }
            (action, resources) => anyhow::bail!(
                "Action '{}' is not available on {}",
                action.name(),
                resources.kind()
            ),
        };
        Ok(report)
    }
}

/// Annotations of the rules that survived every filter.
fn retain_annotations(annotations: &MatchAnnotations, kept: &[SecurityGroupRule]) -> MatchAnnotations {
    let ids: HashSet<&str> = kept.iter().map(|r| r.id.as_str()).collect();
    let mut retained = MatchAnnotations::new();
    for (_, group) in annotations.groups() {
        for direction in Direction::ALL {
            for rule in group.get(direction) {
                if ids.contains(rule.id.as_str()) {
                    retained.record(rule, direction);
                }
            }
        }
    }
    retained
}
