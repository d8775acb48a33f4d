// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-Memory Network Store
//!
//! Implements [`RuleStore`], [`SecurityGroupStore`] and [`FlowLogStore`] over
//! a single shared state, seeded from an [`Inventory`] snapshot.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Local execution of policies and test double for the network API
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Fault Injection
//!
//! [`InMemoryNetworkStore::inject_fault`] makes a store operation fail for a
//! given key until the fault is cleared. The key an operation is checked
//! against:
//!
//! | Operation | Key |
//! |-----------|-----|
//! | `list_rules` | query direction (`ingress` / `egress`), `*` without one |
//! | `delete_rule` | rule id |
//! | `batch_create_rules` | security group id |
//! | `list_security_groups`, `list_ports`, `list_all_ports`, `list_flow_logs` | `*` |
//! | `delete_security_group` | security group id |
//! | `update_flow_log`, `delete_flow_log` | flow log id |
//! | `create_flow_log` | target resource id |
//!
//! A fault registered under `*` matches every key of its operation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::network::{FlowLog, FlowLogTemplate, Port, SecurityGroup};
use crate::domain::rule::{RuleAction, SecurityGroupRule};
use crate::domain::store::{
    FlowLogStore, RuleStore, SecurityGroupStore, StoreOperation, TransportError,
};
use crate::domain::template::{RuleQuery, RuleTemplate};
use crate::infrastructure::inventory::Inventory;

/// Key matching every resource of an operation.
pub const ANY_KEY: &str = "*";

const DEFAULT_PRIORITY: i64 = 1;
const DEFAULT_ETHERTYPE: &str = "IPv4";

#[derive(Debug, Clone)]
struct Fault {
    status_code: u16,
    message: String,
}

#[derive(Debug, Default)]
struct NetworkState {
    security_groups: Vec<SecurityGroup>,
    rules: Vec<SecurityGroupRule>,
    ports: Vec<Port>,
    flow_logs: Vec<FlowLog>,
    faults: HashMap<(StoreOperation, String), Fault>,
}

impl NetworkState {
    fn check(&self, operation: StoreOperation, key: &str) -> Result<(), TransportError> {
        let fault = self
            .faults
            .get(&(operation, key.to_string()))
            .or_else(|| self.faults.get(&(operation, ANY_KEY.to_string())));

        match fault {
            Some(fault) => Err(TransportError::new(
                fault.status_code,
                Uuid::new_v4().to_string(),
                fault.message.clone(),
            )),
            None => Ok(()),
        }
    }
}

fn not_found(kind: &str, id: &str) -> TransportError {
    TransportError::new(
        404,
        Uuid::new_v4().to_string(),
        format!("{} {} could not be found", kind, id),
    )
}

#[derive(Clone, Default)]
pub struct InMemoryNetworkStore {
    state: Arc<RwLock<NetworkState>>,
}

impl InMemoryNetworkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_inventory(inventory: Inventory) -> Self {
        let state = NetworkState {
            security_groups: inventory.security_groups,
            rules: inventory.security_group_rules,
            ports: inventory.ports,
            flow_logs: inventory.flow_logs,
            faults: HashMap::new(),
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Current contents as an inventory snapshot.
    pub async fn snapshot(&self) -> Inventory {
        let state = self.state.read().await;
        Inventory {
            security_groups: state.security_groups.clone(),
            security_group_rules: state.rules.clone(),
            ports: state.ports.clone(),
            flow_logs: state.flow_logs.clone(),
        }
    }

    pub async fn insert_security_group(&self, group: SecurityGroup) {
        self.state.write().await.security_groups.push(group);
    }

    pub async fn insert_rule(&self, rule: SecurityGroupRule) {
        self.state.write().await.rules.push(rule);
    }

    pub async fn insert_port(&self, port: Port) {
        self.state.write().await.ports.push(port);
    }

    pub async fn insert_flow_log(&self, flow_log: FlowLog) {
        self.state.write().await.flow_logs.push(flow_log);
    }

    pub async fn rules(&self) -> Vec<SecurityGroupRule> {
        self.state.read().await.rules.clone()
    }

    pub async fn security_groups(&self) -> Vec<SecurityGroup> {
        self.state.read().await.security_groups.clone()
    }

    pub async fn flow_logs(&self) -> Vec<FlowLog> {
        self.state.read().await.flow_logs.clone()
    }

    /// Fails `operation` for `key` (or every key, with [`ANY_KEY`]) until cleared.
    pub async fn inject_fault(
        &self,
        operation: StoreOperation,
        key: impl Into<String>,
        status_code: u16,
        message: impl Into<String>,
    ) {
        let fault = Fault {
            status_code,
            message: message.into(),
        };
        self.state
            .write()
            .await
            .faults
            .insert((operation, key.into()), fault);
    }

    pub async fn clear_faults(&self) {
        self.state.write().await.faults.clear();
    }
}

#[async_trait]
impl RuleStore for InMemoryNetworkStore {
    async fn list_rules(&self, query: &RuleQuery) -> Result<Vec<SecurityGroupRule>, TransportError> {
        let state = self.state.read().await;
        let key = query.direction.map(|d| d.as_str()).unwrap_or(ANY_KEY);
        state.check(StoreOperation::ListRules, key)?;

        Ok(state
            .rules
            .iter()
            .filter(|rule| query.matches(rule))
            .cloned()
            .collect())
    }

    async fn delete_rule(&self, rule_id: &str) -> Result<(), TransportError> {
        let mut state = self.state.write().await;
        state.check(StoreOperation::DeleteRule, rule_id)?;

        let position = state
            .rules
            .iter()
            .position(|r| r.id == rule_id)
            .ok_or_else(|| not_found("Security group rule", rule_id))?;
        state.rules.remove(position);
        debug!(rule_id, "Deleted security group rule");
        Ok(())
    }

    async fn batch_create_rules(
        &self,
        security_group_id: &str,
        templates: &[RuleTemplate],
    ) -> Result<Vec<SecurityGroupRule>, TransportError> {
        let mut state = self.state.write().await;
        state.check(StoreOperation::BatchCreateRules, security_group_id)?;

        let created: Vec<SecurityGroupRule> = templates
            .iter()
            .map(|template| SecurityGroupRule {
                id: Uuid::new_v4().to_string(),
                security_group_id: security_group_id.to_string(),
                direction: template.direction,
                protocol: template.protocol.clone(),
                ethertype: Some(
                    template
                        .ethertype
                        .clone()
                        .unwrap_or_else(|| DEFAULT_ETHERTYPE.to_string()),
                ),
                remote_ip_prefix: template.remote_ip_prefix.clone(),
                remote_group_id: template.remote_group_id.clone(),
                remote_address_group_id: template.remote_address_group_id.clone(),
                multiport: template.multiport.clone(),
                priority: Some(template.priority.unwrap_or(DEFAULT_PRIORITY)),
                action: Some(template.action.unwrap_or(RuleAction::Allow)),
                description: template.description.clone(),
            })
            .collect();

        state.rules.extend(created.iter().cloned());
        debug!(
            security_group_id,
            count = created.len(),
            "Created security group rules"
        );
        Ok(created)
    }
}

#[async_trait]
impl SecurityGroupStore for InMemoryNetworkStore {
    async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>, TransportError> {
        let state = self.state.read().await;
        state.check(StoreOperation::ListSecurityGroups, ANY_KEY)?;
        Ok(state.security_groups.clone())
    }

    async fn delete_security_group(&self, security_group_id: &str) -> Result<(), TransportError> {
        let mut state = self.state.write().await;
        state.check(StoreOperation::DeleteSecurityGroup, security_group_id)?;

        let position = state
            .security_groups
            .iter()
            .position(|g| g.id == security_group_id)
            .ok_or_else(|| not_found("Security group", security_group_id))?;
        state.security_groups.remove(position);
        state.rules.retain(|r| r.security_group_id != security_group_id);
        Ok(())
    }

    async fn list_ports(&self, security_group_ids: &[String]) -> Result<Vec<Port>, TransportError> {
        let state = self.state.read().await;
        state.check(StoreOperation::ListPorts, ANY_KEY)?;

        Ok(state
            .ports
            .iter()
            .filter(|port| {
                port.security_groups
                    .iter()
                    .any(|sg| security_group_ids.contains(sg))
            })
            .cloned()
            .collect())
    }

    async fn list_all_ports(&self) -> Result<Vec<Port>, TransportError> {
        let state = self.state.read().await;
        state.check(StoreOperation::ListPorts, ANY_KEY)?;
        Ok(state.ports.clone())
    }
}

#[async_trait]
impl FlowLogStore for InMemoryNetworkStore {
    async fn list_flow_logs(&self) -> Result<Vec<FlowLog>, TransportError> {
        let state = self.state.read().await;
        state.check(StoreOperation::ListFlowLogs, ANY_KEY)?;
        Ok(state.flow_logs.clone())
    }

    async fn update_flow_log(&self, flow_log_id: &str, admin_state: bool) -> Result<FlowLog, TransportError> {
        let mut state = self.state.write().await;
        state.check(StoreOperation::UpdateFlowLog, flow_log_id)?;

        let flow_log = state
            .flow_logs
            .iter_mut()
            .find(|f| f.id == flow_log_id)
            .ok_or_else(|| not_found("Flow log", flow_log_id))?;
        flow_log.admin_state = admin_state;
        Ok(flow_log.clone())
    }

    async fn delete_flow_log(&self, flow_log_id: &str) -> Result<(), TransportError> {
        let mut state = self.state.write().await;
        state.check(StoreOperation::DeleteFlowLog, flow_log_id)?;

        let position = state
            .flow_logs
            .iter()
            .position(|f| f.id == flow_log_id)
            .ok_or_else(|| not_found("Flow log", flow_log_id))?;
        state.flow_logs.remove(position);
        Ok(())
    }

    async fn create_flow_log(
        &self,
        resource_type: &str,
        resource_id: &str,
        template: &FlowLogTemplate,
    ) -> Result<FlowLog, TransportError> {
        let mut state = self.state.write().await;
        state.check(StoreOperation::CreateFlowLog, resource_id)?;

        let id = Uuid::new_v4().to_string();
        let flow_log = FlowLog {
            name: template
                .name
                .clone()
                .unwrap_or_else(|| format!("flowlog-{}", &id[..8])),
            id,
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            traffic_type: template
                .traffic_type
                .clone()
                .unwrap_or_else(|| "all".to_string()),
            admin_state: true,
            status: Some("ACTIVE".to_string()),
            log_group_id: template.log_group_id.clone(),
            log_topic_id: template.log_topic_id.clone(),
            description: template.description.clone(),
        };
        state.flow_logs.push(flow_log.clone());
        Ok(flow_log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rule::Direction;

    #[tokio::test]
    async fn test_batch_create_fills_defaults() {
        let store = InMemoryNetworkStore::new();
        let mut template = RuleTemplate::new(Direction::Ingress);
        template.protocol = Some("tcp".to_string());

        let created = store.batch_create_rules("sg-1", &[template]).await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].priority, Some(1));
        assert_eq!(created[0].action, Some(RuleAction::Allow));
        assert_eq!(created[0].ethertype.as_deref(), Some("IPv4"));
        assert_eq!(store.rules().await, created);
    }

    #[tokio::test]
    async fn test_delete_missing_rule_is_not_found() {
        let store = InMemoryNetworkStore::new();
        let err = store.delete_rule("nope").await.unwrap_err();
        assert_eq!(err.status_code, 404);
        assert!(!err.request_id.is_empty());
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = InMemoryNetworkStore::new();
        store
            .insert_rule(SecurityGroupRule::new("r1", "sg-1", Direction::Egress))
            .await;
        store
            .inject_fault(StoreOperation::DeleteRule, "r1", 500, "internal error")
            .await;

        let err = store.delete_rule("r1").await.unwrap_err();
        assert_eq!(err.status_code, 500);
        assert_eq!(err.message, "internal error");
        assert_eq!(store.rules().await.len(), 1);

        store.clear_faults().await;
        store.delete_rule("r1").await.unwrap();
        assert!(store.rules().await.is_empty());
    }

    #[test]
    fn test_delete_security_group_drops_its_rules() {
        let store = InMemoryNetworkStore::new();
        tokio_test::block_on(async {
            store.insert_security_group(SecurityGroup::new("sg-1", "web")).await;
            store
                .insert_rule(SecurityGroupRule::new("r1", "sg-1", Direction::Ingress))
                .await;
            store
                .insert_rule(SecurityGroupRule::new("r2", "sg-2", Direction::Ingress))
                .await;
        });

        tokio_test::block_on(store.delete_security_group("sg-1")).unwrap();

        let remaining = tokio_test::block_on(store.rules());
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "r2");
        assert!(tokio_test::block_on(store.list_security_groups()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wildcard_fault() {
        let store = InMemoryNetworkStore::new();
        store
            .inject_fault(StoreOperation::ListPorts, ANY_KEY, 503, "unavailable")
            .await;
        assert!(store.list_ports(&["sg-1".to_string()]).await.is_err());
        assert!(store.list_all_ports().await.is_err());
    }
}
