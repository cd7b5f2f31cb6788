// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Relative Difference
//!
//! Scalar-plus-context result of comparing an expected pattern with an
//! actual one. Immutable: derived operations return new instances.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

use super::error::{JudgementError, JudgementResult};
use super::pattern::ContextInfo;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRelativeDifference")]
pub struct RelativeDifference {
    magnitude: f64,
    context: ContextInfo,
    metadata: HashMap<String, Value>,
    computed_at: DateTime<Utc>,
}

impl RelativeDifference {
    /// Fails when `magnitude` is negative, NaN or infinite.
    pub fn new(
        magnitude: f64,
        context: ContextInfo,
        metadata: HashMap<String, Value>,
    ) -> JudgementResult<Self> {
        validate_magnitude(magnitude)?;
        Ok(Self {
            magnitude,
            context,
            metadata,
            computed_at: Utc::now(),
        })
    }

    pub fn from_magnitude(magnitude: f64) -> JudgementResult<Self> {
        Self::new(magnitude, ContextInfo::default(), HashMap::new())
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    pub fn context(&self) -> &ContextInfo {
        &self.context
    }

    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }

    /// Scale the magnitude into `[0, 1]` against `max_magnitude`.
    pub fn normalize(&self, max_magnitude: f64) -> JudgementResult<Self> {
        if !max_magnitude.is_finite() || max_magnitude <= 0.0 {
            return Err(JudgementError::InvalidArgument(format!(
                "normalization bound must be positive and finite, got {}",
                max_magnitude
            )));
        }
        let mut metadata = self.metadata.clone();
        metadata.insert("normalized_by".to_string(), Value::from(max_magnitude));
        self.derive((self.magnitude / max_magnitude).clamp(0.0, 1.0), metadata)
    }

    pub fn apply_weight(&self, weight: f64) -> JudgementResult<Self> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(JudgementError::InvalidArgument(format!(
                "weight must be non-negative and finite, got {}",
                weight
            )));
        }
        let mut metadata = self.metadata.clone();
        metadata.insert("applied_weight".to_string(), Value::from(weight));
        self.derive(self.magnitude * weight, metadata)
    }

    pub fn is_significant(&self, threshold: f64) -> bool {
        self.magnitude > threshold
    }

    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "magnitude": self.magnitude,
            "context": self.context,
            "metadata": self.metadata,
            "computed_at": self.computed_at.to_rfc3339(),
        })
    }

    fn derive(&self, magnitude: f64, metadata: HashMap<String, Value>) -> JudgementResult<Self> {
        validate_magnitude(magnitude)?;
        Ok(Self {
            magnitude,
            context: self.context.clone(),
            metadata,
            computed_at: Utc::now(),
        })
    }
}

/// Wire form; converted through the same magnitude check as [`RelativeDifference::new`].
#[derive(Deserialize)]
struct RawRelativeDifference {
    magnitude: f64,
    #[serde(default)]
    context: ContextInfo,
    #[serde(default)]
    metadata: HashMap<String, Value>,
    computed_at: DateTime<Utc>,
}

impl TryFrom<RawRelativeDifference> for RelativeDifference {
    type Error = JudgementError;

    fn try_from(raw: RawRelativeDifference) -> JudgementResult<Self> {
        validate_magnitude(raw.magnitude)?;
        Ok(Self {
            magnitude: raw.magnitude,
            context: raw.context,
            metadata: raw.metadata,
            computed_at: raw.computed_at,
        })
    }
}

fn validate_magnitude(magnitude: f64) -> JudgementResult<()> {
    if !magnitude.is_finite() || magnitude < 0.0 {
        return Err(JudgementError::InvalidArgument(format!(
            "difference magnitude must be non-negative and finite, got {}",
            magnitude
        )));
    }
    Ok(())
}

impl fmt::Display for RelativeDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RelativeDifference(magnitude={:.6}, tags={}, statistics={})",
            self.magnitude,
            self.context.tags.len(),
            self.context.statistics.len()
        )
    }
}
