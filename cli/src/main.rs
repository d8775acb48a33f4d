// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # VPC Custodian CLI
//!
//! The `vpcc` binary validates and runs security-group and flow-log policies.
//!
//! ## Commands
//!
//! - `vpcc policy validate|run` - Policy documents
//! - `vpcc config show|validate|generate` - Configuration management
//!
//! Policies run against an inventory snapshot loaded into the in-memory
//! network store; `--save-inventory` writes the state after the run.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use vpc_custodian::commands::{self, ConfigCommand, PolicyCommand};
use vpc_custodian::logging;

/// VPC Custodian - Security group rule and flow log policies
#[derive(Parser)]
#[command(name = "vpcc")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error; default: `log_level` from the configuration)
    #[arg(long, global = true, env = "VPCC_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and run policy documents
    #[command(name = "policy")]
    Policy {
        #[command(subcommand)]
        command: PolicyCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = logging::resolve_log_level(cli.log_level, cli.config.clone());
    logging::init_logging(&level)?;

    match cli.command {
        Some(Commands::Policy { command }) => {
            commands::policy::handle_command(command, cli.config).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}
