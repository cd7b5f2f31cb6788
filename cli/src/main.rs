// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Predictive Cortex CLI
//!
//! The `pcortex` binary runs one-shot judgements through an
//! inter-layer judgement link and manages its configuration.
//!
//! ## Commands
//!
//! - `pcortex judge --expected 1,2,3 --actual 1,2,4` - Judge one pattern pair
//! - `pcortex config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use predictive_cortex_cli::commands::{self, ConfigCommand, JudgeArgs};

/// Predictive Cortex - inter-layer relative judgement
#[derive(Parser)]
#[command(name = "pcortex")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "PCORTEX_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "PCORTEX_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Judge an expected/actual pattern pair
    #[command(name = "judge")]
    Judge {
        #[command(flatten)]
        args: JudgeArgs,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Judge { args }) => commands::judge::execute(args, cli.config),
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config)
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    // Logs go to stderr so `--format json` output stays machine-readable
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
