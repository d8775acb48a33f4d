// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `vpcc config` subcommands
//!
//! Show the effective settings and where they came from, check a file, or
//! write a starter `vpcc-config.yaml`.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use vpc_custodian_core::domain::config::CustodianConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show {
        /// Also list every location that is searched
        #[arg(long)]
        paths: bool,
    },

    /// Check a configuration file
    Validate {
        /// File to check (default: the discovered one)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Write a starter configuration file
    Generate {
        #[arg(short, long, default_value = "./vpcc-config.yaml")]
        output: PathBuf,

        /// Annotated version with every setting explained
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, examples } => generate(output, examples),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let source = config_override
        .clone()
        .or_else(CustodianConfig::discover_config);
    let config = CustodianConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        let env_path = std::env::var("VPCC_CONFIG_PATH").ok();
        let candidates = [
            ("--config", config_override.map(|p| p.display().to_string())),
            ("VPCC_CONFIG_PATH", env_path),
            ("working directory", Some("./vpcc-config.yaml".to_string())),
            ("user", Some("~/.vpcc/config.yaml".to_string())),
            ("system", Some("/etc/vpcc/config.yaml".to_string())),
        ];

        println!("{}", "Lookup order:".bold());
        for (i, (label, path)) in candidates.iter().enumerate() {
            match path {
                Some(path) => println!("  {}. {:<18} {}", i + 1, label, path),
                None => println!("  {}. {:<18} {}", i + 1, label, "-".dimmed()),
            }
        }
        println!();
    }

    match &source {
        Some(path) => println!("{} {}", "Loaded from".bold(), path.display()),
        None => println!("{}", "No configuration file found, using defaults".yellow()),
    }
    let rendered = serde_yaml::to_string(&config).context("Failed to render configuration")?;
    print!("{}", rendered);

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    let config = CustodianConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    let inventory = match &config.inventory {
        Some(path) => format!("inventory {}", path.display()),
        None => "no default inventory".to_string(),
    };
    println!(
        "{} ({}, {} output, {})",
        "✓ Configuration OK".green(),
        inventory,
        config.output,
        if config.dry_run { "dry run" } else { "actions enabled" }
    );

    Ok(())
}

fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let template = match with_examples {
        true => include_str!("../../templates/config-with-examples.yaml"),
        false => include_str!("../../templates/config-minimal.yaml"),
    };
    if output.exists() {
        anyhow::bail!("{} already exists, not overwriting", output.display());
    }

    std::fs::write(&output, template)
        .with_context(|| format!("Could not write {}", output.display()))?;
    println!("{} {}", "✓ Wrote".green(), output.display());

    Ok(())
}
