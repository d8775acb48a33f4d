// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Rule-Set Reconciler
//!
//! Application service behind the `delete`, `remove-rules` and `set-rules`
//! actions on security-group rules.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Turn removal specs and rule templates into store calls
//! - **Collaborators:**
//!   - Domain: `RemovalPlan`, `RuleTemplates`, `ReconcileResult`
//!   - Infrastructure: any `RuleStore`
//!
//! # Flow
//!
//! Removal runs ingress then egress. Per direction:
//!
//! 1. `matched` takes the input rules of that direction
//! 2. `all` lists every rule of the direction on the affected groups
//! 3. explicit entries issue one list query each
//! 4. every selected rule is deleted on its own
//!
//! Addition issues one batch create per affected group with the ingress
//! templates followed by the egress templates.
//!
//! # Error Handling
//!
//! Store failures never abort the batch. Each one is logged with its request
//! id and recorded as a `FailureRecord` against the rule, the group (batch
//! create) or the direction (list query).

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::reconcile::{
    FailureRecord, ReconcileResult, RemovalPlan, RemovalSpec, RuleTemplates, SetRulesReport,
};
use crate::domain::rule::{Direction, SecurityGroupRule};
use crate::domain::store::{RuleStore, StoreOperation};
use crate::domain::template::RuleQuery;

/// Accumulators of one reconciler call.
#[derive(Debug, Default)]
pub struct ReconcileContext {
    /// Distinct security group ids of the input rules, sorted.
    pub affected_groups: Vec<String>,
    pub result: ReconcileResult,
}

impl ReconcileContext {
    pub fn new(affected_groups: Vec<String>) -> Self {
        Self {
            affected_groups,
            result: ReconcileResult::new(),
        }
    }

    pub fn for_rules(rules: &[SecurityGroupRule]) -> Self {
        Self::new(affected_groups(rules))
    }

    pub fn into_result(self) -> ReconcileResult {
        self.result
    }
}

/// Distinct `security_group_id`s of `rules`, sorted.
pub fn affected_groups(rules: &[SecurityGroupRule]) -> Vec<String> {
    rules
        .iter()
        .map(|r| r.security_group_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub struct RuleSetReconciler {
    store: Arc<dyn RuleStore>,
}

impl RuleSetReconciler {
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self { store }
    }

    /// Deletes the rules selected by `plan` for each direction.
    pub async fn remove_rules(&self, rules: &[SecurityGroupRule], plan: &RemovalPlan) -> ReconcileResult {
        let mut ctx = ReconcileContext::for_rules(rules);

        for direction in Direction::ALL {
            if let Some(spec) = plan.get(direction) {
                self.remove_direction(&mut ctx, rules, direction, spec).await;
            }
        }

        let result = ctx.into_result();
        info!(
            removed = result.succeeded.len(),
            failed = result.failed.len(),
            "Removed security group rules"
        );
        result
    }

    /// Creates `templates` on every group in `security_group_ids`.
    ///
    /// The created rules are the result's `succeeded` list.
    pub async fn add_rules(&self, security_group_ids: &[String], templates: &RuleTemplates) -> ReconcileResult {
        let mut ctx = ReconcileContext::new(security_group_ids.to_vec());
        let combined = templates.combined();

        if combined.is_empty() {
            debug!("No rule templates to add");
            return ctx.into_result();
        }

        let mut seen = HashSet::new();
        for security_group_id in security_group_ids {
            if !seen.insert(security_group_id.as_str()) {
                continue;
            }
            match self.store.batch_create_rules(security_group_id, &combined).await {
                Ok(created) => {
                    debug!(
                        security_group_id = %security_group_id,
                        count = created.len(),
                        "Added security group rules"
                    );
                    for rule in created {
                        ctx.result.record_success(rule);
                    }
                }
                Err(e) => {
                    warn!(
                        security_group_id = %security_group_id,
                        request_id = %e.request_id,
                        "Failed to add security group rules: {}",
                        e.message
                    );
                    ctx.result.record_failure(FailureRecord::new(
                        security_group_id.as_str(),
                        StoreOperation::BatchCreateRules,
                        &e,
                    ));
                }
            }
        }

        ctx.into_result()
    }

    /// Adds then removes on the groups owning `rules`.
    pub async fn set_rules(
        &self,
        rules: &[SecurityGroupRule],
        add: &RuleTemplates,
        remove: &RemovalPlan,
    ) -> SetRulesReport {
        let groups = affected_groups(rules);
        let added = self.add_rules(&groups, add).await;
        let removed = self.remove_rules(rules, remove).await;
        SetRulesReport::new(added, removed)
    }

    /// Deletes every input rule.
    pub async fn delete_rules(&self, rules: &[SecurityGroupRule]) -> ReconcileResult {
        let mut ctx = ReconcileContext::for_rules(rules);
        for rule in rules {
            self.delete_rule(&mut ctx, rule.clone()).await;
        }
        ctx.into_result()
    }

    async fn remove_direction(
        &self,
        ctx: &mut ReconcileContext,
        rules: &[SecurityGroupRule],
        direction: Direction,
        spec: &RemovalSpec,
    ) {
        let targets = match spec {
            RemovalSpec::Matched => rules
                .iter()
                .filter(|r| r.direction == direction)
                .cloned()
                .collect(),
            RemovalSpec::All => {
                if ctx.affected_groups.is_empty() {
                    return;
                }
                let query = RuleQuery::for_groups(ctx.affected_groups.clone(), direction);
                self.list(ctx, direction, &query).await
            }
            RemovalSpec::Explicit(queries) => {
                if ctx.affected_groups.is_empty() {
                    return;
                }
                let mut seen = HashSet::new();
                let mut targets = Vec::new();
                for query in queries {
                    let query = query
                        .clone()
                        .with_security_groups(ctx.affected_groups.clone());
                    for rule in self.list(ctx, direction, &query).await {
                        // overlapping entries select the same rule once
                        if seen.insert(rule.id.clone()) {
                            targets.push(rule);
                        }
                    }
                }
                targets
            }
        };

        for rule in targets {
            self.delete_rule(ctx, rule).await;
        }
    }

    async fn list(
        &self,
        ctx: &mut ReconcileContext,
        direction: Direction,
        query: &RuleQuery,
    ) -> Vec<SecurityGroupRule> {
        match self.store.list_rules(query).await {
            Ok(rules) => rules,
            Err(e) => {
                warn!(
                    direction = %direction,
                    request_id = %e.request_id,
                    "Failed to list security group rules: {}",
                    e.message
                );
                ctx.result.record_failure(FailureRecord::new(
                    direction.as_str(),
                    StoreOperation::ListRules,
                    &e,
                ));
                Vec::new()
            }
        }
    }

    async fn delete_rule(&self, ctx: &mut ReconcileContext, rule: SecurityGroupRule) {
        match self.store.delete_rule(&rule.id).await {
            Ok(()) => {
                debug!(rule_id = %rule.id, "Removed security group rule");
                ctx.result.record_success(rule);
            }
            Err(e) => {
                warn!(
                    rule_id = %rule.id,
                    request_id = %e.request_id,
                    "Failed to remove security group rule: {}",
                    e.message
                );
                ctx.result
                    .record_failure(FailureRecord::new(rule.id.as_str(), StoreOperation::DeleteRule, &e));
            }
        }
    }
}
