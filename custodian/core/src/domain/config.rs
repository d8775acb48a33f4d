// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Custodian Configuration
//
// Defines the settings shared by every `vpcc` invocation:
// - dry-run mode (filters only, no actions)
// - report output format
// - default inventory snapshot the in-memory store is seeded from
// - log level

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Report rendering format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => anyhow::bail!("Invalid output format '{}'. Expected json or yaml", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodianConfig {
    /// Evaluate filters but skip every action
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub output: OutputFormat,

    /// Inventory snapshot used when `policy run` gets no `--inventory`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<PathBuf>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CustodianConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            output: OutputFormat::default(),
            inventory: None,
            log_level: default_log_level(),
        }
    }
}

impl CustodianConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. VPCC_CONFIG_PATH environment variable
    /// 2. ./vpcc-config.yaml (working directory)
    /// 3. ~/.vpcc/config.yaml (user home)
    /// 4. /etc/vpcc/config.yaml (system, Unix) or C:\ProgramData\Vpcc\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("VPCC_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./vpcc-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".vpcc").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/vpcc/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Vpcc\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path fails if missing or invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("VPCC_DRY_RUN") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => {
                    tracing::info!("Environment override: VPCC_DRY_RUN=true");
                    self.dry_run = true;
                }
                "false" | "0" | "no" | "off" => {
                    tracing::info!("Environment override: VPCC_DRY_RUN=false");
                    self.dry_run = false;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for VPCC_DRY_RUN: '{}'. Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("VPCC_OUTPUT") {
            match val.parse::<OutputFormat>() {
                Ok(output) => {
                    tracing::info!("Environment override: VPCC_OUTPUT={}", output);
                    self.output = output;
                }
                Err(e) => tracing::warn!("{}. Ignoring VPCC_OUTPUT.", e),
            }
        }
    }

    /// Apply `policy run` flags. A given inventory replaces the configured
    /// one, so only the snapshot actually used has to exist.
    pub fn apply_cli_overrides(
        &mut self,
        inventory: Option<PathBuf>,
        dry_run: bool,
        output: Option<OutputFormat>,
    ) {
        if let Some(path) = inventory {
            self.inventory = Some(path);
        }
        self.dry_run |= dry_run;
        if let Some(output) = output {
            self.output = output;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(inventory) = &self.inventory {
            if !inventory.exists() {
                anyhow::bail!("Inventory file not found: {:?}", inventory);
            }
        }

        if !matches!(
            self.log_level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            anyhow::bail!(
                "Invalid log_level: '{}'. Must be one of trace, debug, info, warn, error",
                self.log_level
            );
        }

        Ok(())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config = CustodianConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, CustodianConfig::default());
        assert_eq!(config.output, OutputFormat::Json);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_yaml_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vpcc-config.yaml");

        let config = CustodianConfig {
            dry_run: true,
            output: OutputFormat::Yaml,
            inventory: None,
            log_level: "debug".to_string(),
        };
        config.to_yaml_file(&path).unwrap();

        assert_eq!(CustodianConfig::from_yaml_file(&path).unwrap(), config);
    }

    #[test]
    fn test_validation() {
        let mut config = CustodianConfig::default();
        assert!(config.validate().is_ok());

        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());
        config.log_level = "warn".to_string();

        config.inventory = Some(PathBuf::from("/nonexistent/inventory.json"));
        assert!(config.validate().is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{}}").unwrap();
        config.inventory = Some(file.path().to_path_buf());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_inventory_replaces_missing_configured_one() {
        let mut config = CustodianConfig::from_yaml_str(
            "inventory: /nonexistent/gone.yaml\ndry_run: true\n",
        )
        .unwrap();
        assert!(config.validate().is_err());

        let file = tempfile::NamedTempFile::new().unwrap();
        config.apply_cli_overrides(Some(file.path().to_path_buf()), false, Some(OutputFormat::Yaml));

        assert!(config.validate().is_ok());
        assert_eq!(config.inventory.as_deref(), Some(file.path()));
        assert!(config.dry_run);
        assert_eq!(config.output, OutputFormat::Yaml);
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("YAML".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
