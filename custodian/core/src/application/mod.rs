// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod flow_log;
pub mod policy_runner;
pub mod reconciler;
pub mod security_group;

// Re-export use cases for convenience
pub use flow_log::FlowLogService;
pub use policy_runner::{ActionReport, FlowLogReport, PolicyRunReport, PolicyRunner, ResourceSet};
pub use reconciler::{ReconcileContext, RuleSetReconciler};
pub use security_group::SecurityGroupService;
