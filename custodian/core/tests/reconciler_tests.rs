// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Rule-set reconciler against the in-memory network store.
//!
//! Removal (`matched`, `all`, explicit entries), addition, `set-rules`, the
//! add/remove round trip and per-item failure isolation.

use serde_json::json;
use std::sync::Arc;
use vpc_custodian_core::application::reconciler::RuleSetReconciler;
use vpc_custodian_core::domain::reconcile::{RemovalPlan, RemovalSpec, RuleTemplates};
use vpc_custodian_core::domain::rule::{Direction, RuleAction, SecurityGroupRule};
use vpc_custodian_core::domain::store::StoreOperation;
use vpc_custodian_core::domain::template::RuleTemplate;
use vpc_custodian_core::infrastructure::in_memory_store::InMemoryNetworkStore;

fn rule(id: &str, sg: &str, direction: Direction, prefix: &str) -> SecurityGroupRule {
    let mut rule = SecurityGroupRule::new(id, sg, direction);
    rule.action = Some(RuleAction::Allow);
    rule.remote_ip_prefix = Some(prefix.to_string());
    rule
}

async fn seeded(rules: &[SecurityGroupRule]) -> InMemoryNetworkStore {
    let store = InMemoryNetworkStore::new();
    for r in rules {
        store.insert_rule(r.clone()).await;
    }
    store
}

fn reconciler(store: &InMemoryNetworkStore) -> RuleSetReconciler {
    RuleSetReconciler::new(Arc::new(store.clone()))
}

#[tokio::test]
async fn test_matched_on_empty_input_is_noop() {
    let store = seeded(&[rule("r1", "sg-1", Direction::Ingress, "0.0.0.0/0")]).await;

    let result = reconciler(&store).remove_rules(&[], &RemovalPlan::matched()).await;

    assert!(result.succeeded.is_empty());
    assert!(result.failed.is_empty());
    assert_eq!(store.rules().await.len(), 1);
}

#[tokio::test]
async fn test_one_failed_delete_does_not_stop_the_batch() {
    let rules = vec![
        rule("r1", "sg-1", Direction::Ingress, "0.0.0.0/0"),
        rule("r2", "sg-1", Direction::Ingress, "10.0.0.0/8"),
        rule("r3", "sg-1", Direction::Ingress, "::/0"),
    ];
    let store = seeded(&rules).await;
    store
        .inject_fault(StoreOperation::DeleteRule, "r2", 500, "Internal server error")
        .await;

    let result = reconciler(&store).remove_rules(&rules, &RemovalPlan::matched()).await;

    let removed: Vec<&str> = result.succeeded.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(removed, vec!["r1", "r3"]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].resource_id, "r2");
    assert_eq!(result.failed[0].operation, StoreOperation::DeleteRule);
    assert_eq!(result.failed[0].status_code, 500);
    assert!(!result.failed[0].request_id.is_empty());

    let remaining = store.rules().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "r2");
}

#[tokio::test]
async fn test_all_removes_every_rule_of_the_direction_on_affected_groups() {
    let store = seeded(&[
        rule("r1", "sg-1", Direction::Egress, "0.0.0.0/0"),
        rule("r2", "sg-1", Direction::Egress, "::/0"),
        rule("r3", "sg-1", Direction::Ingress, "0.0.0.0/0"),
        rule("r4", "sg-2", Direction::Egress, "0.0.0.0/0"),
    ])
    .await;

    // only r1 was matched upstream, but `all` widens to the whole group
    let input = vec![rule("r1", "sg-1", Direction::Egress, "0.0.0.0/0")];
    let plan = RemovalPlan {
        ingress: None,
        egress: Some(RemovalSpec::All),
    };
    let result = reconciler(&store).remove_rules(&input, &plan).await;

    assert_eq!(result.succeeded.len(), 2);
    let remaining: Vec<String> = store.rules().await.into_iter().map(|r| r.id).collect();
    assert_eq!(remaining, vec!["r3".to_string(), "r4".to_string()]);
}

#[tokio::test]
async fn test_explicit_entries_query_the_store() {
    let store = seeded(&[
        rule("r1", "sg-1", Direction::Egress, "0.0.0.0/0"),
        rule("r2", "sg-1", Direction::Egress, "::/0"),
        rule("r3", "sg-1", Direction::Egress, "10.0.0.0/8"),
    ])
    .await;

    let spec = RemovalSpec::from_value(
        Direction::Egress,
        &json!([
            {"action": "allow", "remote_ip_prefix": "0.0.0.0/0"},
            {"action": "allow", "remote_ip_prefix": "::/0"},
        ]),
    )
    .unwrap();
    let plan = RemovalPlan {
        ingress: None,
        egress: Some(spec),
    };
    let input = vec![rule("r3", "sg-1", Direction::Egress, "10.0.0.0/8")];
    let result = reconciler(&store).remove_rules(&input, &plan).await;

    let removed: Vec<&str> = result.succeeded.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(removed, vec!["r1", "r2"]);
    assert_eq!(store.rules().await.len(), 1);
}

#[tokio::test]
async fn test_failed_list_query_is_recorded_against_the_direction() {
    let store = seeded(&[rule("r1", "sg-1", Direction::Ingress, "0.0.0.0/0")]).await;
    store
        .inject_fault(StoreOperation::ListRules, "ingress", 503, "Service unavailable")
        .await;

    let input = store.rules().await;
    let plan = RemovalPlan {
        ingress: Some(RemovalSpec::All),
        egress: Some(RemovalSpec::All),
    };
    let result = reconciler(&store).remove_rules(&input, &plan).await;

    assert!(result.succeeded.is_empty());
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].resource_id, "ingress");
    assert_eq!(result.failed[0].operation, StoreOperation::ListRules);
}

#[tokio::test]
async fn test_add_then_remove_matched_round_trip() {
    let store = InMemoryNetworkStore::new();
    let reconciler = reconciler(&store);

    let mut ssh = RuleTemplate::new(Direction::Ingress);
    ssh.protocol = Some("tcp".to_string());
    ssh.multiport = Some("22".to_string());
    let mut https = RuleTemplate::new(Direction::Egress);
    https.protocol = Some("tcp".to_string());
    https.multiport = Some("443".to_string());
    let templates = RuleTemplates {
        ingress: vec![ssh],
        egress: vec![https],
    };

    let added = reconciler.add_rules(&["sg-1".to_string()], &templates).await;
    assert_eq!(added.succeeded.len(), 2);
    assert_eq!(added.succeeded[0].direction, Direction::Ingress);
    assert_eq!(added.succeeded[1].direction, Direction::Egress);
    assert_eq!(store.rules().await.len(), 2);

    let removed = reconciler
        .remove_rules(&added.succeeded, &RemovalPlan::matched())
        .await;
    assert_eq!(removed.succeeded.len(), 2);
    assert!(removed.failed.is_empty());
    assert!(store.rules().await.is_empty());
}

#[tokio::test]
async fn test_failed_batch_only_skips_its_group() {
    let store = InMemoryNetworkStore::new();
    store
        .inject_fault(StoreOperation::BatchCreateRules, "sg-2", 400, "Quota exceeded")
        .await;

    let mut template = RuleTemplate::new(Direction::Ingress);
    template.protocol = Some("icmp".to_string());
    let templates = RuleTemplates {
        ingress: vec![template],
        egress: vec![],
    };

    let groups = vec!["sg-1".to_string(), "sg-2".to_string(), "sg-3".to_string()];
    let result = reconciler(&store).add_rules(&groups, &templates).await;

    assert_eq!(result.succeeded.len(), 2);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].resource_id, "sg-2");
    assert_eq!(result.failed[0].operation, StoreOperation::BatchCreateRules);
}

#[tokio::test]
async fn test_set_rules_adds_then_removes() {
    let existing = rule("r1", "sg-1", Direction::Ingress, "0.0.0.0/0");
    let store = seeded(&[existing.clone()]).await;

    let mut narrowed = RuleTemplate::new(Direction::Ingress);
    narrowed.remote_ip_prefix = Some("10.0.0.0/8".to_string());
    let add = RuleTemplates {
        ingress: vec![narrowed],
        egress: vec![],
    };
    let remove = RemovalPlan {
        ingress: Some(RemovalSpec::Matched),
        egress: None,
    };

    let report = reconciler(&store).set_rules(&[existing], &add, &remove).await;

    assert_eq!(report.add_succeeded_rules.len(), 1);
    assert_eq!(report.remove_succeeded_rules.len(), 1);
    assert!(report.add_failed_rules.is_empty());
    assert!(report.remove_failed_rules.is_empty());

    let remaining = store.rules().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].remote_ip_prefix.as_deref(), Some("10.0.0.0/8"));
    assert_eq!(remaining[0].security_group_id, "sg-1");
}
