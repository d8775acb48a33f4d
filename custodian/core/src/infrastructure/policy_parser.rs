// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Policy Document YAML Parser
//!
//! Parses policy documents into validated domain policies.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Parse external YAML → Domain objects
//! - **Anti-Corruption:** Translates the policy schema to the closed filter and action enums
//!
//! # Document Format
//!
//! ```yaml
//! policies:
//!   - name: sg-rule-remove-ssh
//!     resource: huaweicloud.vpc-security-group-rule
//!     filters:
//!       - type: ingress
//!         RemoteIpPrefix: 0.0.0.0/0
//!         InPorts: [22]
//!     actions:
//!       - type: remove-rules
//!         ingress: matched
//! ```

use crate::domain::policy::{PolicyDocument, PolicySet};
use anyhow::{anyhow, Context, Result};
use std::path::Path;

// ============================================================================
// Parser API
// ============================================================================

pub struct PolicyParser;

impl PolicyParser {
    /// Parse and validate a policy document from a YAML string
    pub fn parse_yaml(yaml: &str) -> Result<PolicySet> {
        let document = Self::parse_document(yaml)?;

        PolicySet::from_document(&document)
            .map_err(|e| anyhow!("Policy validation failed: {}", e))
    }

    /// Parse the raw document without validating filters and actions
    pub fn parse_document(yaml: &str) -> Result<PolicyDocument> {
        serde_yaml::from_str(yaml).context("Failed to parse YAML policy document")
    }

    /// Parse and validate a policy document from a YAML file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<PolicySet> {
        let yaml = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read policy file: {:?}", path.as_ref()))?;

        Self::parse_yaml(&yaml)
    }

    /// Serialize a raw policy document to a YAML string
    pub fn to_yaml(document: &PolicyDocument) -> Result<String> {
        serde_yaml::to_string(document).context("Failed to serialize policy document to YAML")
    }
}

// ============================================================================
// Tests
// ============================================================================
