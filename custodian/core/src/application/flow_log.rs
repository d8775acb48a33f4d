// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Flow Log Service
//!
//! Executes `set-flow-log`. `enable` and `disable` report the updated flow
//! logs, `delete` the deleted ones and `create` the new ones. Every failed
//! call is recorded and the loop moves on.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::network::{FlowLog, FlowLogTemplate};
use crate::domain::policy::FlowLogAction;
use crate::domain::reconcile::{ActionResult, FailureRecord};
use crate::domain::store::{FlowLogStore, StoreOperation, TransportError};

pub struct FlowLogService {
    store: Arc<dyn FlowLogStore>,
}

impl FlowLogService {
    pub fn new(store: Arc<dyn FlowLogStore>) -> Self {
        Self { store }
    }

    pub async fn apply(&self, flow_logs: &[FlowLog], action: &FlowLogAction) -> ActionResult<FlowLog> {
        let result = match action {
            FlowLogAction::Enable => self.set_admin_state(flow_logs, true).await,
            FlowLogAction::Disable => self.set_admin_state(flow_logs, false).await,
            FlowLogAction::Delete => self.delete(flow_logs).await,
            FlowLogAction::Create(templates) => self.create(flow_logs, templates).await,
        };
        info!(
            action = action.name(),
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            "Applied set-flow-log"
        );
        result
    }

    async fn set_admin_state(&self, flow_logs: &[FlowLog], admin_state: bool) -> ActionResult<FlowLog> {
        let mut result = ActionResult::new();
        for flow_log in flow_logs {
            match self.store.update_flow_log(&flow_log.id, admin_state).await {
                Ok(updated) => result.record_success(updated),
                Err(e) => record(&mut result, &flow_log.id, StoreOperation::UpdateFlowLog, &e),
            }
        }
        result
    }

    async fn delete(&self, flow_logs: &[FlowLog]) -> ActionResult<FlowLog> {
        let mut result = ActionResult::new();
        for flow_log in flow_logs {
            match self.store.delete_flow_log(&flow_log.id).await {
                Ok(()) => result.record_success(flow_log.clone()),
                Err(e) => record(&mut result, &flow_log.id, StoreOperation::DeleteFlowLog, &e),
            }
        }
        result
    }

    /// One flow log per distinct target resource and template.
    async fn create(&self, flow_logs: &[FlowLog], templates: &[FlowLogTemplate]) -> ActionResult<FlowLog> {
        let mut result = ActionResult::new();

        let mut seen = HashSet::new();
        let targets: Vec<(&str, &str)> = flow_logs
            .iter()
            .filter(|f| seen.insert(f.resource_id.as_str()))
            .map(|f| (f.resource_type.as_str(), f.resource_id.as_str()))
            .collect();

        for (resource_type, resource_id) in targets {
            for template in templates {
                match self.store.create_flow_log(resource_type, resource_id, template).await {
                    Ok(created) => result.record_success(created),
                    Err(e) => record(&mut result, resource_id, StoreOperation::CreateFlowLog, &e),
                }
            }
        }
        result
    }
}

fn record(result: &mut ActionResult<FlowLog>, id: &str, operation: StoreOperation, error: &TransportError) {
    warn!(
        resource_id = id,
        operation = %operation,
        request_id = %error.request_id,
        "Failed to update flow log: {}",
        error.message
    );
    result.record_failure(FailureRecord::new(id, operation, error));
}
