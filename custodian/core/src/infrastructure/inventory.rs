// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Inventory Snapshots
//!
//! A point-in-time dump of a project's network resources. `vpcc policy run`
//! seeds the in-memory store from one and can write the post-run state back.
//!
//! ```yaml
//! security_groups:
//!   - id: sg-web
//!     name: web
//! security_group_rules:
//!   - id: rule-ssh
//!     security_group_id: sg-web
//!     direction: ingress
//!     protocol: tcp
//!     multiport: "22"
//!     remote_ip_prefix: 0.0.0.0/0
//! ports:
//!   - id: port-1
//!     security_groups: [sg-web]
//! flow_logs: []
//! ```
//!
//! Files ending in `.json` are read as JSON, everything else as YAML.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::network::{FlowLog, Port, SecurityGroup};
use crate::domain::rule::SecurityGroupRule;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Inventory {
    #[serde(default)]
    pub security_groups: Vec<SecurityGroup>,

    #[serde(default)]
    pub security_group_rules: Vec<SecurityGroupRule>,

    #[serde(default)]
    pub ports: Vec<Port>,

    #[serde(default)]
    pub flow_logs: Vec<FlowLog>,
}

impl Inventory {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read inventory file: {:?}", path))?;

        if is_json(path) {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
        .with_context(|| format!("Failed to parse inventory file: {:?}", path))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            serde_yaml::to_string(self)?
        };
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write inventory file: {:?}", path))?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.security_groups.is_empty()
            && self.security_group_rules.is_empty()
            && self.ports.is_empty()
            && self.flow_logs.is_empty()
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}
