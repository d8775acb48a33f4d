// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! VPC Custodian Core
//!
//! Security-group rule matching, rule-set reconciliation and the policy
//! runner behind the `vpcc` CLI.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, use cases and the in-memory network store

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
