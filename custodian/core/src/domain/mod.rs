// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Rules, filters, templates, policies and the store contracts.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and matching logic, no I/O

pub mod config;
pub mod filter;
pub mod matcher;
pub mod multiport;
pub mod network;
pub mod policy;
pub mod reconcile;
pub mod rule;
pub mod store;
pub mod template;
pub mod validation;
