// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use predictive_cortex::JudgementConfig;

const CONFIG_WITH_EXAMPLES: &str = include_str!("../../templates/config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./pcortex-config.yaml)
        #[arg(short, long, default_value = "./pcortex-config.yaml")]
        output: PathBuf,

        /// Include comments describing every field
        #[arg(long)]
        examples: bool,
    },
}

pub fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, examples } => generate(&output, examples),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = JudgementConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. PCORTEX_CONFIG_PATH: {}",
            std::env::var("PCORTEX_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./pcortex-config.yaml");
        println!("  4. ~/.pcortex/config.yaml");
        println!("  5. /etc/pcortex/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Judgement Link:".bold());
    println!("  Metric: {}", config.metric);
    println!("  History capacity: {}", config.history_capacity);
    println!("  Activity window: {}s", config.activity_window_seconds);
    println!();

    println!("{}", "Skip Policy:".bold());
    println!(
        "  full_skip <= {} < partial_update < {} <= focused_calculation",
        config.skip.low_threshold, config.skip.high_threshold
    );
    println!();

    println!("{}", "Learning Rate Policy:".bold());
    println!("  Base rate: {}", config.learning_rate.base_rate);
    println!("  Scaling factor: {}", config.learning_rate.scaling_factor);
    println!(
        "  Bounds: [{}, {}]",
        config.learning_rate.min_rate, config.learning_rate.max_rate
    );
    println!();

    println!("{}", "Update Scope Policy:".bold());
    println!(
        "  Thresholds: {} / {}",
        config.update_scope.low_threshold, config.update_scope.high_threshold
    );
    print_parameter_set("Focused", &config.update_scope.focused_parameters);
    print_parameter_set("Default", &config.update_scope.default_parameters);
    print_parameter_set("Full", &config.update_scope.full_parameters);
    println!();

    Ok(())
}

fn print_parameter_set<'a>(label: &str, parameters: impl IntoIterator<Item = &'a String>) {
    let joined: Vec<&str> = parameters.into_iter().map(String::as_str).collect();
    println!("  {}: {}", label, joined.join(", "));
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = JudgementConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

pub fn generate(output: &Path, with_examples: bool) -> Result<()> {
    if with_examples {
        std::fs::write(output, CONFIG_WITH_EXAMPLES)
            .with_context(|| format!("Failed to write config to {:?}", output))?;
    } else {
        JudgementConfig::default()
            .to_yaml_file(output)
            .with_context(|| format!("Failed to write config to {:?}", output))?;
    }

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_configs_load_and_validate() {
        let dir = tempfile::tempdir().unwrap();

        for examples in [false, true] {
            let path = dir.path().join(format!("config-{}.yaml", examples));
            generate(&path, examples).unwrap();

            let config = JudgementConfig::from_yaml_file(&path).unwrap();
            config.validate().unwrap();
            assert_eq!(config, JudgementConfig::default());
        }
    }
}
