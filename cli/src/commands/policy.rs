// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Policy commands
//!
//! Commands: validate, run

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use vpc_custodian_core::application::policy_runner::{PolicyRunReport, PolicyRunner};
use vpc_custodian_core::domain::config::{CustodianConfig, OutputFormat};
use vpc_custodian_core::domain::policy::PolicySet;
use vpc_custodian_core::infrastructure::in_memory_store::InMemoryNetworkStore;
use vpc_custodian_core::infrastructure::inventory::Inventory;
use vpc_custodian_core::infrastructure::policy_parser::PolicyParser;

#[derive(Subcommand)]
pub enum PolicyCommand {
    /// Validate a policy document
    Validate {
        /// Path to policy YAML file
        #[arg(value_name = "POLICY")]
        file: PathBuf,
    },

    /// Run policies against an inventory snapshot
    Run(RunArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Path to policy YAML file
    #[arg(value_name = "POLICY")]
    pub file: PathBuf,

    /// Inventory snapshot (default: `inventory` from the configuration)
    #[arg(short, long, value_name = "FILE")]
    pub inventory: Option<PathBuf>,

    /// Only run the policy with this name
    #[arg(short, long, value_name = "NAME")]
    pub policy: Option<String>,

    /// Evaluate filters without running actions
    #[arg(long)]
    pub dry_run: bool,

    /// Report format (json, yaml)
    #[arg(short, long, value_name = "FORMAT")]
    pub output: Option<String>,

    /// Write the inventory after the run to this file
    #[arg(long, value_name = "FILE")]
    pub save_inventory: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum PolicyCommandError {
    #[error("No inventory given. Pass --inventory or set `inventory` in the configuration")]
    MissingInventory,

    #[error("Policy '{0}' not found in document")]
    UnknownPolicy(String),

    #[error("{0} action failure(s) recorded")]
    ActionFailures(usize),
}

/// Resolved `policy run` arguments.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub file: PathBuf,
    pub inventory: PathBuf,
    pub policy: Option<String>,
    pub dry_run: bool,
    pub save_inventory: Option<PathBuf>,
}

pub async fn handle_command(command: PolicyCommand, config_path: Option<PathBuf>) -> Result<()> {
    match command {
        PolicyCommand::Validate { file } => validate(&file),
        PolicyCommand::Run(args) => {
            let config = CustodianConfig::load_or_default(config_path)
                .context("Failed to load configuration")?;
            let (options, output) = args.resolve(config)?;

            let reports = run(&options).await?;
            println!("{}", render_reports(&reports, output)?);
            print_summary(&reports);

            let failures: usize = reports.iter().map(PolicyRunReport::failure_count).sum();
            if failures > 0 {
                return Err(PolicyCommandError::ActionFailures(failures).into());
            }
            Ok(())
        }
    }
}

impl RunArgs {
    /// Layers the flags over `config`, validates the result and returns the
    /// run options with the report format.
    pub fn resolve(self, mut config: CustodianConfig) -> Result<(RunOptions, OutputFormat)> {
        let output = self
            .output
            .map(|format| format.parse::<OutputFormat>())
            .transpose()?;
        config.apply_cli_overrides(self.inventory, self.dry_run, output);
        config
            .validate()
            .context("Configuration validation failed")?;

        let options = RunOptions {
            file: self.file,
            inventory: config
                .inventory
                .ok_or(PolicyCommandError::MissingInventory)?,
            policy: self.policy,
            dry_run: config.dry_run,
            save_inventory: self.save_inventory,
        };
        Ok((options, config.output))
    }
}

fn validate(file: &Path) -> Result<()> {
    println!("Validating policies...");

    let policies = PolicyParser::parse_file(file)?;
    for policy in &policies.policies {
        println!(
            "  {} {} ({} filter(s), {} action(s))",
            policy.name.bold(),
            policy.resource.to_string().dimmed(),
            policy.filters.len(),
            policy.actions.len()
        );
    }

    println!(
        "{}",
        format!("✓ {} policy(ies) valid", policies.policies.len()).green()
    );
    Ok(())
}

/// Loads the policies and the inventory, runs them and saves the inventory if asked.
pub async fn run(options: &RunOptions) -> Result<Vec<PolicyRunReport>> {
    let policies = select(PolicyParser::parse_file(&options.file)?, options.policy.as_deref())?;
    let inventory = Inventory::from_file(&options.inventory)?;
    info!(
        policies = policies.policies.len(),
        inventory = %options.inventory.display(),
        dry_run = options.dry_run,
        "Running policies"
    );

    let store = Arc::new(InMemoryNetworkStore::from_inventory(inventory));
    let reports = PolicyRunner::from_store(store.clone())
        .with_dry_run(options.dry_run)
        .run_all(&policies)
        .await?;

    if let Some(path) = &options.save_inventory {
        store
            .snapshot()
            .await
            .to_file(path)
            .context("Failed to save inventory")?;
        info!(path = %path.display(), "Saved inventory");
    }

    Ok(reports)
}

fn select(mut policies: PolicySet, name: Option<&str>) -> Result<PolicySet> {
    if let Some(name) = name {
        policies.policies.retain(|p| p.name == name);
        if policies.policies.is_empty() {
            return Err(PolicyCommandError::UnknownPolicy(name.to_string()).into());
        }
    }
    Ok(policies)
}

pub fn render_reports(reports: &[PolicyRunReport], output: OutputFormat) -> Result<String> {
    match output {
        OutputFormat::Json => {
            serde_json::to_string_pretty(reports).context("Failed to render report as JSON")
        }
        OutputFormat::Yaml => serde_yaml::to_string(reports).context("Failed to render report as YAML"),
    }
}

fn print_summary(reports: &[PolicyRunReport]) {
    for report in reports {
        let failures = report.failure_count();
        let status = if report.dry_run {
            "dry-run".yellow()
        } else if failures > 0 {
            format!("{} failure(s)", failures).red()
        } else {
            "ok".green()
        };
        eprintln!(
            "{} {}: {}/{} matched [{}]",
            "•".dimmed(),
            report.policy.bold(),
            report.matched,
            report.scanned,
            status
        );
    }
}
