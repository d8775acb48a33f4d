// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Logging setup for the `vpcc` binary.

use anyhow::{Context, Result};
use std::path::PathBuf;

use vpc_custodian_core::domain::config::CustodianConfig;

/// Picks the log level: `--log-level` (or `VPCC_LOG_LEVEL`) first, then the
/// `log_level` of the loaded configuration.
///
/// A configuration that fails to load yields the default level here; the
/// command itself reports the load error.
pub fn resolve_log_level(flag: Option<String>, config_path: Option<PathBuf>) -> String {
    if let Some(level) = flag {
        return level;
    }
    CustodianConfig::load_or_default(config_path)
        .unwrap_or_default()
        .log_level
}

/// Initialize tracing subscriber for logging
pub fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    // stdout carries the report
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_log_level_applies_without_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vpcc-config.yaml");
        std::fs::write(&path, "log_level: debug\n").unwrap();

        assert_eq!(resolve_log_level(None, Some(path.clone())), "debug");
        assert_eq!(resolve_log_level(Some("warn".to_string()), Some(path)), "warn");
    }

    #[test]
    fn test_unreadable_config_falls_back_to_info() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");

        assert_eq!(resolve_log_level(None, Some(missing)), "info");
    }
}
