// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Security groups, ports and flow logs as returned by the network store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::validation::{expect_str, reject_unknown_keys, ValidationError};

/// Name of the group every project gets; never reported as unattached.
pub const DEFAULT_SECURITY_GROUP: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enterprise_project_id: Option<String>,
}

impl SecurityGroup {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            project_id: None,
            enterprise_project_id: None,
        }
    }
}

/// A network port and the security groups bound to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_owner: Option<String>,

    #[serde(default)]
    pub security_groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowLog {
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// `port`, `network` or `vpc`.
    pub resource_type: String,

    pub resource_id: String,

    /// `all`, `accept` or `reject`.
    #[serde(default = "default_traffic_type")]
    pub traffic_type: String,

    #[serde(default)]
    pub admin_state: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_group_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_topic_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_traffic_type() -> String {
    "all".to_string()
}

/// Attributes accepted in `set-flow-log` `create-attrs` entries.
pub const FLOW_LOG_TEMPLATE_FIELDS: [&str; 6] = [
    "name",
    "description",
    "traffic_type",
    "log_group_id",
    "log_topic_id",
    "log_store_type",
];

/// Creation attributes for a flow log. `resource_type` and `resource_id` are
/// supplied per target resource by the action, never by the template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowLogTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_group_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_topic_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_store_type: Option<String>,
}

impl FlowLogTemplate {
    pub fn from_attributes(attributes: &Map<String, Value>) -> Result<Self, ValidationError> {
        reject_unknown_keys(attributes, &FLOW_LOG_TEMPLATE_FIELDS, "set-flow-log create-attrs")?;

        let mut template = FlowLogTemplate::default();
        for (key, value) in attributes {
            let value = Some(expect_str(value, key)?.to_string());
            match key.as_str() {
                "name" => template.name = value,
                "description" => template.description = value,
                "traffic_type" => {
                    if !matches!(value.as_deref(), Some("all" | "accept" | "reject")) {
                        return Err(ValidationError::InvalidValue {
                            key: key.clone(),
                            reason: "expected 'all', 'accept' or 'reject'".to_string(),
                        });
                    }
                    template.traffic_type = value
                }
                "log_group_id" => template.log_group_id = value,
                "log_topic_id" => template.log_topic_id = value,
                "log_store_type" => template.log_store_type = value,
                _ => {}
            }
        }
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flow_log_template_fields() {
        let template = FlowLogTemplate::from_attributes(
            json!({"traffic_type": "all", "log_group_id": "lg-1", "log_topic_id": "lt-1"})
                .as_object()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(template.traffic_type.as_deref(), Some("all"));
        assert_eq!(template.log_group_id.as_deref(), Some("lg-1"));

        let unknown = json!({"resource_id": "vpc-1"});
        assert!(FlowLogTemplate::from_attributes(unknown.as_object().unwrap()).is_err());

        let bad = json!({"traffic_type": "some"});
        assert!(FlowLogTemplate::from_attributes(bad.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_port_without_groups() {
        let port: Port = serde_json::from_str(r#"{"id": "p1"}"#).unwrap();
        assert!(port.security_groups.is_empty());
    }
}
