// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Adaptive Learning Rate
//!
//! A strictly positive learning rate together with its provenance and a
//! bounded adjustment history. Every adjustment is a pure transformation:
//! the receiver is never mutated, the returned instance carries the
//! receiver's history plus one entry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

use super::error::{JudgementError, JudgementResult};

/// Rate used when a judgement short-circuits on `FullSkip`.
pub const MIN_LEARNING_RATE: f64 = 1e-6;

/// Oldest history entries are dropped beyond this length.
pub const MAX_RATE_HISTORY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateOrigin {
    Initial,
    Adaptive,
    Manual,
    Experimental,
    Optimized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateHistoryEntry {
    pub value: f64,
    pub origin: RateOrigin,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAdaptiveLearningRate")]
pub struct AdaptiveLearningRate {
    value: f64,
    origin: RateOrigin,
    metadata: HashMap<String, Value>,
    history: Vec<RateHistoryEntry>,
}

impl AdaptiveLearningRate {
    pub fn new(value: f64, origin: RateOrigin) -> JudgementResult<Self> {
        Self::with_metadata(value, origin, HashMap::new())
    }

    pub fn with_metadata(
        value: f64,
        origin: RateOrigin,
        metadata: HashMap<String, Value>,
    ) -> JudgementResult<Self> {
        validate_rate(value)?;
        Ok(Self {
            value,
            origin,
            metadata,
            history: vec![RateHistoryEntry {
                value,
                origin,
                timestamp: Utc::now(),
            }],
        })
    }

    pub fn minimal() -> Self {
        Self {
            value: MIN_LEARNING_RATE,
            origin: RateOrigin::Initial,
            metadata: HashMap::from([("short_circuit".to_string(), Value::Bool(true))]),
            history: vec![RateHistoryEntry {
                value: MIN_LEARNING_RATE,
                origin: RateOrigin::Initial,
                timestamp: Utc::now(),
            }],
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn origin(&self) -> RateOrigin {
        self.origin
    }

    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    pub fn history(&self) -> &[RateHistoryEntry] {
        &self.history
    }

    pub fn adjust(&self, new_value: f64, origin: RateOrigin) -> JudgementResult<Self> {
        validate_rate(new_value)?;

        let mut history = self.history.clone();
        history.push(RateHistoryEntry {
            value: new_value,
            origin,
            timestamp: Utc::now(),
        });
        if history.len() > MAX_RATE_HISTORY {
            let overflow = history.len() - MAX_RATE_HISTORY;
            history.drain(..overflow);
        }

        Ok(Self {
            value: new_value,
            origin,
            metadata: self.metadata.clone(),
            history,
        })
    }

    pub fn scale(&self, factor: f64) -> JudgementResult<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(JudgementError::OutOfBoundsParameter(format!(
                "scale factor must be positive and finite, got {}",
                factor
            )));
        }
        self.adjust(self.value * factor, RateOrigin::Manual)
    }

    /// `value * factor`, with `factor` in `(0, 1)`.
    pub fn exponential_decay(&self, factor: f64) -> JudgementResult<Self> {
        if !(factor > 0.0 && factor < 1.0) {
            return Err(JudgementError::OutOfBoundsParameter(format!(
                "exponential decay factor must be in (0, 1), got {}",
                factor
            )));
        }
        self.adjust(self.value * factor, RateOrigin::Optimized)
    }

    /// `value * gamma^step`, with `gamma` in `(0, 1]`.
    pub fn step_decay(&self, step: u32, gamma: f64) -> JudgementResult<Self> {
        if !(gamma > 0.0 && gamma <= 1.0) {
            return Err(JudgementError::OutOfBoundsParameter(format!(
                "step decay gamma must be in (0, 1], got {}",
                gamma
            )));
        }
        let exponent = i32::try_from(step).map_err(|_| {
            JudgementError::OutOfBoundsParameter(format!("decay step {} is too large", step))
        })?;
        self.adjust(self.value * gamma.powi(exponent), RateOrigin::Optimized)
    }

    /// Whether the largest relative change between consecutive entries in the
    /// last `window` history entries stays below `threshold`.
    pub fn is_stable(&self, window: usize, threshold: f64) -> bool {
        let start = self.history.len().saturating_sub(window);
        let recent = &self.history[start..];
        if recent.len() < 2 {
            return true;
        }
        let max_change = recent
            .windows(2)
            .map(|pair| ((pair[1].value - pair[0].value) / pair[0].value).abs())
            .fold(0.0_f64, f64::max);
        max_change < threshold
    }

    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "value": self.value,
            "origin": self.origin,
            "metadata": self.metadata,
            "history_length": self.history.len(),
        })
    }
}

#[derive(Deserialize)]
struct RawAdaptiveLearningRate {
    value: f64,
    origin: RateOrigin,
    #[serde(default)]
    metadata: HashMap<String, Value>,
    #[serde(default)]
    history: Vec<RateHistoryEntry>,
}

impl TryFrom<RawAdaptiveLearningRate> for AdaptiveLearningRate {
    type Error = JudgementError;

    fn try_from(raw: RawAdaptiveLearningRate) -> JudgementResult<Self> {
        validate_rate(raw.value)?;
        for entry in &raw.history {
            validate_rate(entry.value)?;
        }
        if raw.history.len() > MAX_RATE_HISTORY {
            return Err(JudgementError::OutOfBoundsParameter(format!(
                "rate history holds at most {} entries, got {}",
                MAX_RATE_HISTORY,
                raw.history.len()
            )));
        }
        Ok(Self {
            value: raw.value,
            origin: raw.origin,
            metadata: raw.metadata,
            history: raw.history,
        })
    }
}

fn validate_rate(value: f64) -> JudgementResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(JudgementError::InvalidArgument(format!(
            "learning rate must be positive and finite, got {}",
            value
        )));
    }
    Ok(())
}

impl fmt::Display for AdaptiveLearningRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AdaptiveLearningRate(value={:.6}, origin={:?}, history={})",
            self.value,
            self.origin,
            self.history.len()
        )
    }
}
