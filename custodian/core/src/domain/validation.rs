// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Policy Validation Errors
//!
//! Every malformed filter block, removal spec, rule template or policy document
//! is rejected with a [`ValidationError`] before any rule is evaluated or any
//! store call is made.
//!
//! | Variant | Raised by |
//! |---------|-----------|
//! | `UnknownKeys` | filter blocks, templates, queries, actions |
//! | `InvalidValue` | wrongly typed or out-of-range values |
//! | `MissingKey` | required keys such as `type` or `action` |
//! | `InvalidRemovalSpec` | `remove-rules` / `set-rules` removal entries |
//! | `InvalidPolicy` | policy-level structure (names, resource kinds) |

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Unknown keys {} on {context}", .keys.join(", "))]
    UnknownKeys { keys: Vec<String>, context: String },

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Missing required key '{key}' on {context}")]
    MissingKey { key: String, context: String },

    #[error("Invalid removal spec for {direction}: {reason}")]
    InvalidRemovalSpec { direction: String, reason: String },

    #[error("Invalid policy '{policy}': {reason}")]
    InvalidPolicy { policy: String, reason: String },
}

/// Collects every key of `block` outside `allowed`, sorted.
pub fn unknown_keys(block: &Map<String, Value>, allowed: &[&str]) -> Vec<String> {
    let mut keys: Vec<String> = block
        .keys()
        .filter(|k| !allowed.contains(&k.as_str()))
        .cloned()
        .collect();
    keys.sort();
    keys
}

/// Fails with `UnknownKeys` listing every key of `block` outside `allowed`.
pub fn reject_unknown_keys(
    block: &Map<String, Value>,
    allowed: &[&str],
    context: &str,
) -> Result<(), ValidationError> {
    let keys = unknown_keys(block, allowed);
    if keys.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::UnknownKeys {
            keys,
            context: context.to_string(),
        })
    }
}

pub(crate) fn expect_object<'a>(
    value: &'a Value,
    key: &str,
) -> Result<&'a Map<String, Value>, ValidationError> {
    value.as_object().ok_or_else(|| ValidationError::InvalidValue {
        key: key.to_string(),
        reason: format!("expected a mapping, got {}", value),
    })
}

pub(crate) fn expect_str<'a>(value: &'a Value, key: &str) -> Result<&'a str, ValidationError> {
    value.as_str().ok_or_else(|| ValidationError::InvalidValue {
        key: key.to_string(),
        reason: format!("expected a string, got {}", value),
    })
}

/// Accepts an integer or a numeric string.
pub(crate) fn expect_i64(value: &Value, key: &str) -> Result<i64, ValidationError> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| ValidationError::InvalidValue {
        key: key.to_string(),
        reason: format!("expected an integer, got {}", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_keys_are_sorted_and_complete() {
        let block = json!({"zeta": 1, "alpha": 2, "type": "ingress"});
        let keys = unknown_keys(block.as_object().unwrap(), &["type"]);
        assert_eq!(keys, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn test_error_message_lists_keys() {
        let block = json!({"Foo": 1, "Bar": 2});
        let err = reject_unknown_keys(block.as_object().unwrap(), &[], "ingress filter").unwrap_err();
        assert_eq!(err.to_string(), "Unknown keys Bar, Foo on ingress filter");
    }

    #[test]
    fn test_expect_i64_accepts_numeric_strings() {
        assert_eq!(expect_i64(&json!(7), "priority").unwrap(), 7);
        assert_eq!(expect_i64(&json!("12"), "priority").unwrap(), 12);
        assert!(expect_i64(&json!("high"), "priority").is_err());
    }
}
