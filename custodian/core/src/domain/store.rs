// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Network Store Interfaces
//!
//! Contracts for the cloud network API, defined in the domain layer and
//! implemented in `crate::infrastructure`.
//!
//! | Trait | Resources | Implementations |
//! |-------|-----------|----------------|
//! | `RuleStore` | security-group rules | `InMemoryNetworkStore` |
//! | `SecurityGroupStore` | security groups, ports | `InMemoryNetworkStore` |
//! | `FlowLogStore` | flow logs | `InMemoryNetworkStore` |
//!
//! Every call either succeeds or fails with a [`TransportError`] carrying the
//! request id assigned by the API. Callers never retry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::network::{FlowLog, FlowLogTemplate, Port, SecurityGroup};
use crate::domain::rule::SecurityGroupRule;
use crate::domain::template::{RuleQuery, RuleTemplate};

/// A failed store call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("[{status_code}] {message} (RequestId: {request_id})")]
pub struct TransportError {
    pub status_code: u16,
    pub request_id: String,
    pub message: String,
}

impl TransportError {
    pub fn new(status_code: u16, request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status_code,
            request_id: request_id.into(),
            message: message.into(),
        }
    }
}

/// Store calls, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOperation {
    ListRules,
    DeleteRule,
    BatchCreateRules,
    ListSecurityGroups,
    DeleteSecurityGroup,
    ListPorts,
    ListFlowLogs,
    UpdateFlowLog,
    DeleteFlowLog,
    CreateFlowLog,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreOperation::ListRules => "list_rules",
            StoreOperation::DeleteRule => "delete_rule",
            StoreOperation::BatchCreateRules => "batch_create_rules",
            StoreOperation::ListSecurityGroups => "list_security_groups",
            StoreOperation::DeleteSecurityGroup => "delete_security_group",
            StoreOperation::ListPorts => "list_ports",
            StoreOperation::ListFlowLogs => "list_flow_logs",
            StoreOperation::UpdateFlowLog => "update_flow_log",
            StoreOperation::DeleteFlowLog => "delete_flow_log",
            StoreOperation::CreateFlowLog => "create_flow_log",
        };
        f.write_str(name)
    }
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Rules selected by `query`.
    async fn list_rules(&self, query: &RuleQuery) -> Result<Vec<SecurityGroupRule>, TransportError>;

    async fn delete_rule(&self, rule_id: &str) -> Result<(), TransportError>;

    /// Creates every template in one call and returns the created rules.
    async fn batch_create_rules(
        &self,
        security_group_id: &str,
        templates: &[RuleTemplate],
    ) -> Result<Vec<SecurityGroupRule>, TransportError>;
}

#[async_trait]
pub trait SecurityGroupStore: Send + Sync {
    async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>, TransportError>;

    async fn delete_security_group(&self, security_group_id: &str) -> Result<(), TransportError>;

    /// Ports bound to any of `security_group_ids`.
    async fn list_ports(&self, security_group_ids: &[String]) -> Result<Vec<Port>, TransportError>;

    async fn list_all_ports(&self) -> Result<Vec<Port>, TransportError>;
}

#[async_trait]
pub trait FlowLogStore: Send + Sync {
    async fn list_flow_logs(&self) -> Result<Vec<FlowLog>, TransportError>;

    async fn update_flow_log(&self, flow_log_id: &str, admin_state: bool) -> Result<FlowLog, TransportError>;

    async fn delete_flow_log(&self, flow_log_id: &str) -> Result<(), TransportError>;

    async fn create_flow_log(
        &self,
        resource_type: &str,
        resource_id: &str,
        template: &FlowLogTemplate,
    ) -> Result<FlowLog, TransportError>;
}
