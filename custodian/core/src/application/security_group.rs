// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Security Group Service
//!
//! The `unattached` filter and the `delete` action on security groups.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::network::{SecurityGroup, DEFAULT_SECURITY_GROUP};
use crate::domain::reconcile::{ActionResult, FailureRecord};
use crate::domain::store::{SecurityGroupStore, StoreOperation, TransportError};

pub struct SecurityGroupService {
    store: Arc<dyn SecurityGroupStore>,
}

impl SecurityGroupService {
    pub fn new(store: Arc<dyn SecurityGroupStore>) -> Self {
        Self { store }
    }

    /// Keeps groups no port is bound to. Groups named `default` are never kept.
    ///
    /// Issues a single port listing for all input groups; its failure aborts
    /// the filter.
    pub async fn filter_unattached(
        &self,
        groups: Vec<SecurityGroup>,
    ) -> Result<Vec<SecurityGroup>, TransportError> {
        if groups.is_empty() {
            return Ok(groups);
        }

        let ids: Vec<String> = groups
            .iter()
            .map(|g| g.id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let ports = self.store.list_ports(&ids).await?;

        let attached: HashSet<&str> = ports
            .iter()
            .flat_map(|p| p.security_groups.iter().map(String::as_str))
            .collect();

        let unattached: Vec<SecurityGroup> = groups
            .into_iter()
            .filter(|g| !attached.contains(g.id.as_str()) && g.name != DEFAULT_SECURITY_GROUP)
            .collect();
        debug!(count = unattached.len(), "Found unattached security groups");
        Ok(unattached)
    }

    pub async fn delete_groups(&self, groups: &[SecurityGroup]) -> ActionResult<SecurityGroup> {
        let mut result = ActionResult::new();

        for group in groups {
            match self.store.delete_security_group(&group.id).await {
                Ok(()) => result.record_success(group.clone()),
                Err(e) => {
                    warn!(
                        security_group_id = %group.id,
                        request_id = %e.request_id,
                        "Failed to delete security group: {}",
                        e.message
                    );
                    result.record_failure(FailureRecord::new(
                        group.id.as_str(),
                        StoreOperation::DeleteSecurityGroup,
                        &e,
                    ));
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::network::Port;
    use crate::infrastructure::in_memory_store::InMemoryNetworkStore;

    #[tokio::test]
    async fn test_unattached_drops_bound_and_default_groups() {
        let store = InMemoryNetworkStore::new();
        let groups = vec![
            SecurityGroup::new("sg-bound", "web"),
            SecurityGroup::new("sg-free", "legacy"),
            SecurityGroup::new("sg-default", "default"),
        ];
        store
            .insert_port(Port {
                id: "port-1".to_string(),
                name: None,
                device_owner: Some("compute:nova".to_string()),
                security_groups: vec!["sg-bound".to_string()],
            })
            .await;

        let service = SecurityGroupService::new(Arc::new(store));
        let unattached = service.filter_unattached(groups).await.unwrap();

        assert_eq!(unattached.len(), 1);
        assert_eq!(unattached[0].id, "sg-free");
    }

    #[tokio::test]
    async fn test_delete_records_missing_group() {
        let store = InMemoryNetworkStore::new();
        store.insert_security_group(SecurityGroup::new("sg-1", "a")).await;

        let service = SecurityGroupService::new(Arc::new(store.clone()));
        let result = service
            .delete_groups(&[SecurityGroup::new("sg-1", "a"), SecurityGroup::new("sg-2", "b")])
            .await;

        assert_eq!(result.succeeded.len(), 1);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].resource_id, "sg-2");
        assert_eq!(result.failed[0].status_code, 404);
        assert!(store.security_groups().await.is_empty());
    }
}
