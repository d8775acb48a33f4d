// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod in_memory_store;
pub mod inventory;
pub mod policy_parser;

pub use in_memory_store::InMemoryNetworkStore;
pub use inventory::Inventory;
pub use policy_parser::PolicyParser;
