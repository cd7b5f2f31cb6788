// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! One-shot judgement of an expected/actual pattern pair

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

use predictive_cortex::{
    ComprehensiveJudgementResult, InterLayerRelativeJudgementLink, JudgementConfig,
    LearningSignal, MetricType, Pattern, SkipDecision,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Args)]
pub struct JudgeArgs {
    /// Vector predicted by the upper layer (comma-separated)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub expected: Vec<f64>,

    /// Vector observed by the lower layer (comma-separated)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub actual: Vec<f64>,

    /// Distance metric (overrides configuration)
    #[arg(short, long)]
    pub metric: Option<String>,

    /// Upper layer identifier
    #[arg(long, default_value = "upper")]
    pub upper_layer: String,

    /// Lower layer identifier
    #[arg(long, default_value = "lower")]
    pub lower_layer: String,

    /// Seconds until the emitted learning signal expires
    #[arg(long, default_value_t = 30)]
    pub expiration_secs: u64,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Judgement outcome plus the learning signal it produced, if any.
#[derive(Debug)]
pub struct JudgementReport {
    pub link_id: String,
    pub metric: MetricType,
    pub result: ComprehensiveJudgementResult,
    pub signal: Option<LearningSignal>,
}

impl JudgementReport {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "link_id": self.link_id,
            "metric": self.metric,
            "judgement": self.result.to_json(),
            "signal": self.signal.as_ref().map(LearningSignal::to_json),
        })
    }
}

pub fn execute(args: JudgeArgs, config_override: Option<PathBuf>) -> Result<()> {
    let config = JudgementConfig::load_or_default(config_override)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    let report = judge(&config, &args)?;

    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report.to_json())?);
        }
        OutputFormat::Text => print_report(&report),
    }

    Ok(())
}

/// Build a link from `config` and run one judgement with the given vectors.
pub fn judge(config: &JudgementConfig, args: &JudgeArgs) -> Result<JudgementReport> {
    let mut config = config.clone();
    if let Some(name) = &args.metric {
        config.metric = name
            .parse::<MetricType>()
            .with_context(|| format!("Unknown metric '{}'", name))?;
    }

    let link_id = format!("{}->{}", args.upper_layer, args.lower_layer);
    let link = InterLayerRelativeJudgementLink::from_config(
        link_id.clone(),
        args.upper_layer.clone(),
        args.lower_layer.clone(),
        &config,
    )
    .context("Failed to build judgement link")?;

    let expected = Pattern::new(args.upper_layer.clone(), args.expected.clone());
    let actual = Pattern::new(args.lower_layer.clone(), args.actual.clone());
    debug!(
        link_id = %link_id,
        metric = %config.metric,
        dimension = args.expected.len(),
        "Judging pattern pair"
    );

    let result = link
        .perform_comprehensive_judgement(&expected, &actual)
        .context("Judgement failed")?;

    let signal = if result.should_process {
        let expiration = i64::try_from(args.expiration_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .context("Signal expiration is out of range")?;
        Some(
            LearningSignal::from_judgement(&result, expiration)
                .context("Failed to build learning signal")?,
        )
    } else {
        None
    };

    Ok(JudgementReport {
        link_id,
        metric: config.metric,
        result,
        signal,
    })
}

fn print_report(report: &JudgementReport) {
    let result = &report.result;
    let decision = match result.skip_judgement {
        SkipDecision::FullSkip => result.skip_judgement.as_str().dimmed(),
        SkipDecision::PartialUpdate => result.skip_judgement.as_str().yellow(),
        SkipDecision::FocusedCalculation => result.skip_judgement.as_str().red().bold(),
    };

    println!("{}", format!("Judgement ({})", report.link_id).bold());
    println!("  Metric: {}", report.metric);
    println!("  Magnitude: {:.6}", result.reference_difference.magnitude());
    println!("  Decision: {}", decision);
    println!("  Learning rate: {:.6}", result.learning_rate.value());
    println!("  Update scope: {}", result.update_scope);
    println!();

    match &report.signal {
        Some(signal) => {
            println!("{}", "Learning Signal:".bold());
            println!("  ID: {}", signal.signal_id);
            println!("  Priority: {:.4}", signal.priority);
            println!("  Urgency: {:.4}", signal.urgency_score());
            println!("  Impact: {:.6}", signal.impact_score());
            println!("  Expires in: {}s", signal.expiration.num_seconds());
        }
        None => println!("{}", "No learning signal: difference below skip threshold".dimmed()),
    }
}
