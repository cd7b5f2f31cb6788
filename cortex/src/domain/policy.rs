// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Judgement Policies
//!
//! The three decisions a judgement link delegates, each behind its own trait
//! so strategies can be swapped on a live link:
//!
//! | Trait | Decides | Reference implementation |
//! |-------|---------|--------------------------|
//! | [`SkipPolicy`] | how much follow-up work a difference warrants | [`ThresholdSkipPolicy`] |
//! | [`LearningRatePolicy`] | how strongly to learn | [`AdaptiveLearningRatePolicy`] |
//! | [`UpdateScopePolicy`] | which parameters to touch | [`ThresholdUpdateScopePolicy`] |
//!
//! Skip and scope thresholds are configured independently: scope breadth and
//! computation intensity are related but distinct decisions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

use super::difference::RelativeDifference;
use super::error::{JudgementError, JudgementResult};
use super::learning_rate::{AdaptiveLearningRate, RateOrigin};
use super::skip::SkipDecision;
use super::update_scope::UpdateScope;

/// Identity of the link on whose behalf a policy is consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgementContext {
    pub link_id: String,
    pub upper_layer_id: String,
    pub lower_layer_id: String,
    /// Zero-based sequence number of the judgement on this link.
    pub sequence: u64,
}

pub trait SkipPolicy: Send + Sync {
    fn judge_skip(&self, difference: &RelativeDifference) -> SkipDecision;

    fn name(&self) -> &'static str;
}

pub trait LearningRatePolicy: Send + Sync {
    fn learning_rate(
        &self,
        difference: &RelativeDifference,
        context: &JudgementContext,
    ) -> JudgementResult<AdaptiveLearningRate>;

    fn name(&self) -> &'static str;
}

pub trait UpdateScopePolicy: Send + Sync {
    fn scope(
        &self,
        difference: &RelativeDifference,
        context: &JudgementContext,
    ) -> JudgementResult<UpdateScope>;

    fn name(&self) -> &'static str;
}

fn validate_thresholds(low: f64, high: f64) -> JudgementResult<()> {
    if !low.is_finite() || !high.is_finite() {
        return Err(JudgementError::OutOfBoundsParameter(format!(
            "thresholds must be finite, got low={} high={}",
            low, high
        )));
    }
    if low < 0.0 || high < 0.0 {
        return Err(JudgementError::OutOfBoundsParameter(format!(
            "thresholds must be non-negative, got low={} high={}",
            low, high
        )));
    }
    if low >= high {
        return Err(JudgementError::OutOfBoundsParameter(format!(
            "low threshold {} must be strictly below high threshold {}",
            low, high
        )));
    }
    Ok(())
}

/// `m <= low` skips, `m >= high` focuses, anything between is a partial update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSkipPolicy {
    low_threshold: f64,
    high_threshold: f64,
}

impl ThresholdSkipPolicy {
    pub fn new(low_threshold: f64, high_threshold: f64) -> JudgementResult<Self> {
        validate_thresholds(low_threshold, high_threshold)?;
        Ok(Self {
            low_threshold,
            high_threshold,
        })
    }

    pub fn low_threshold(&self) -> f64 {
        self.low_threshold
    }

    pub fn high_threshold(&self) -> f64 {
        self.high_threshold
    }
}

impl Default for ThresholdSkipPolicy {
    fn default() -> Self {
        Self {
            low_threshold: 0.01,
            high_threshold: 0.5,
        }
    }
}

impl SkipPolicy for ThresholdSkipPolicy {
    fn judge_skip(&self, difference: &RelativeDifference) -> SkipDecision {
        let m = difference.magnitude();
        if m <= self.low_threshold {
            SkipDecision::FullSkip
        } else if m >= self.high_threshold {
            SkipDecision::FocusedCalculation
        } else {
            SkipDecision::PartialUpdate
        }
    }

    fn name(&self) -> &'static str {
        "threshold_skip"
    }
}

/// `clamp(base_rate * scaling_factor * sqrt(|m|), min_rate, max_rate)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveLearningRatePolicy {
    base_rate: f64,
    scaling_factor: f64,
    min_rate: f64,
    max_rate: f64,
}

impl AdaptiveLearningRatePolicy {
    pub fn new(
        base_rate: f64,
        scaling_factor: f64,
        min_rate: f64,
        max_rate: f64,
    ) -> JudgementResult<Self> {
        if !(base_rate > 0.0 && base_rate <= 1.0) {
            return Err(JudgementError::OutOfBoundsParameter(format!(
                "base_rate must be in (0, 1], got {}",
                base_rate
            )));
        }
        if !(scaling_factor.is_finite() && scaling_factor > 0.0) {
            return Err(JudgementError::OutOfBoundsParameter(format!(
                "scaling_factor must be positive, got {}",
                scaling_factor
            )));
        }
        if !(min_rate.is_finite() && max_rate.is_finite() && min_rate > 0.0) {
            return Err(JudgementError::OutOfBoundsParameter(format!(
                "rate bounds must be positive and finite, got min={} max={}",
                min_rate, max_rate
            )));
        }
        if min_rate >= max_rate {
            return Err(JudgementError::OutOfBoundsParameter(format!(
                "min_rate {} must be below max_rate {}",
                min_rate, max_rate
            )));
        }
        Ok(Self {
            base_rate,
            scaling_factor,
            min_rate,
            max_rate,
        })
    }

    pub fn base_rate(&self) -> f64 {
        self.base_rate
    }

    pub fn min_rate(&self) -> f64 {
        self.min_rate
    }

    pub fn max_rate(&self) -> f64 {
        self.max_rate
    }
}

impl Default for AdaptiveLearningRatePolicy {
    fn default() -> Self {
        Self {
            base_rate: 0.01,
            scaling_factor: 1.0,
            min_rate: 1e-4,
            max_rate: 0.1,
        }
    }
}

impl LearningRatePolicy for AdaptiveLearningRatePolicy {
    fn learning_rate(
        &self,
        difference: &RelativeDifference,
        context: &JudgementContext,
    ) -> JudgementResult<AdaptiveLearningRate> {
        let magnitude = difference.magnitude();
        let raw = self.base_rate * self.scaling_factor * magnitude.abs().sqrt();
        let rate = raw.clamp(self.min_rate, self.max_rate);

        let metadata = HashMap::from([
            ("policy".to_string(), Value::from(self.name())),
            ("magnitude".to_string(), Value::from(magnitude)),
            ("unclamped_rate".to_string(), Value::from(raw)),
            ("link_id".to_string(), Value::from(context.link_id.clone())),
        ]);
        AdaptiveLearningRate::with_metadata(rate, RateOrigin::Adaptive, metadata)
    }

    fn name(&self) -> &'static str {
        "adaptive_sqrt"
    }
}

/// Buckets a difference into the focused, default or full parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdUpdateScopePolicy {
    low_threshold: f64,
    high_threshold: f64,
    focused_parameters: BTreeSet<String>,
    default_parameters: BTreeSet<String>,
    full_parameters: BTreeSet<String>,
}

impl ThresholdUpdateScopePolicy {
    pub fn new(
        low_threshold: f64,
        high_threshold: f64,
        focused_parameters: BTreeSet<String>,
        default_parameters: BTreeSet<String>,
        full_parameters: BTreeSet<String>,
    ) -> JudgementResult<Self> {
        validate_thresholds(low_threshold, high_threshold)?;
        for (tier, set) in [
            ("focused", &focused_parameters),
            ("default", &default_parameters),
            ("full", &full_parameters),
        ] {
            if set.is_empty() {
                return Err(JudgementError::InvalidArgument(format!(
                    "{} parameter set must not be empty",
                    tier
                )));
            }
        }
        Ok(Self {
            low_threshold,
            high_threshold,
            focused_parameters,
            default_parameters,
            full_parameters,
        })
    }

    pub fn with_thresholds(low_threshold: f64, high_threshold: f64) -> JudgementResult<Self> {
        let defaults = Self::default();
        Self::new(
            low_threshold,
            high_threshold,
            defaults.focused_parameters,
            defaults.default_parameters,
            defaults.full_parameters,
        )
    }

    fn parameters_for(&self, magnitude: f64) -> &BTreeSet<String> {
        if magnitude < self.low_threshold {
            &self.focused_parameters
        } else if magnitude >= self.high_threshold {
            &self.full_parameters
        } else {
            &self.default_parameters
        }
    }
}

pub(crate) fn string_set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ThresholdUpdateScopePolicy {
    fn default() -> Self {
        Self {
            low_threshold: 0.1,
            high_threshold: 0.7,
            focused_parameters: string_set(&["output_bias"]),
            default_parameters: string_set(&["output_weights", "output_bias"]),
            full_parameters: string_set(&[
                "input_weights",
                "hidden_weights",
                "output_weights",
                "output_bias",
            ]),
        }
    }
}

impl UpdateScopePolicy for ThresholdUpdateScopePolicy {
    fn scope(
        &self,
        difference: &RelativeDifference,
        _context: &JudgementContext,
    ) -> JudgementResult<UpdateScope> {
        UpdateScope::from_parameters(self.parameters_for(difference.magnitude()).iter().cloned())
    }

    fn name(&self) -> &'static str {
        "threshold_scope"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff(m: f64) -> RelativeDifference {
        RelativeDifference::from_magnitude(m).unwrap()
    }

    fn ctx() -> JudgementContext {
        JudgementContext {
            link_id: "link-1".to_string(),
            upper_layer_id: "concept".to_string(),
            lower_layer_id: "pattern".to_string(),
            sequence: 0,
        }
    }

    // ── ThresholdSkipPolicy ───────────────────────────────────────────────────

    #[test]
    fn test_skip_thresholds_and_boundaries() {
        let policy = ThresholdSkipPolicy::new(0.01, 0.5).unwrap();

        assert_eq!(policy.judge_skip(&diff(0.0)), SkipDecision::FullSkip);
        assert_eq!(policy.judge_skip(&diff(0.01)), SkipDecision::FullSkip);
        assert_eq!(policy.judge_skip(&diff(0.0100001)), SkipDecision::PartialUpdate);
        assert_eq!(policy.judge_skip(&diff(0.3)), SkipDecision::PartialUpdate);
        assert_eq!(policy.judge_skip(&diff(0.4999999)), SkipDecision::PartialUpdate);
        assert_eq!(policy.judge_skip(&diff(0.5)), SkipDecision::FocusedCalculation);
        assert_eq!(policy.judge_skip(&diff(7.0)), SkipDecision::FocusedCalculation);
    }

    #[test]
    fn test_skip_policy_rejects_bad_thresholds() {
        assert!(ThresholdSkipPolicy::new(0.5, 0.5).is_err());
        assert!(ThresholdSkipPolicy::new(0.6, 0.5).is_err());
        assert!(ThresholdSkipPolicy::new(-0.1, 0.5).is_err());
        assert!(ThresholdSkipPolicy::new(0.1, f64::NAN).is_err());
    }

    // ── AdaptiveLearningRatePolicy ────────────────────────────────────────────

    #[test]
    fn test_rate_formula_and_clamping() {
        let policy = AdaptiveLearningRatePolicy::new(0.1, 2.0, 0.001, 0.5).unwrap();

        let rate = policy.learning_rate(&diff(0.25), &ctx()).unwrap();
        assert!((rate.value() - 0.1).abs() < 1e-12);
        assert_eq!(rate.origin(), RateOrigin::Adaptive);
        assert_eq!(rate.metadata()["link_id"], "link-1");

        assert_eq!(policy.learning_rate(&diff(0.0), &ctx()).unwrap().value(), 0.001);
        assert_eq!(policy.learning_rate(&diff(100.0), &ctx()).unwrap().value(), 0.5);
    }

    #[test]
    fn test_rate_policy_construction() {
        assert!(AdaptiveLearningRatePolicy::new(0.0, 1.0, 0.001, 0.1).is_err());
        assert!(AdaptiveLearningRatePolicy::new(1.5, 1.0, 0.001, 0.1).is_err());
        assert!(AdaptiveLearningRatePolicy::new(1.0, 1.0, 0.001, 0.1).is_ok());
        assert!(AdaptiveLearningRatePolicy::new(0.1, 0.0, 0.001, 0.1).is_err());
        assert!(AdaptiveLearningRatePolicy::new(0.1, 1.0, 0.1, 0.1).is_err());
        assert!(AdaptiveLearningRatePolicy::new(0.1, 1.0, 0.2, 0.1).is_err());
    }

    // ── ThresholdUpdateScopePolicy ────────────────────────────────────────────

    #[test]
    fn test_scope_buckets() {
        let policy = ThresholdUpdateScopePolicy::default();

        let focused = policy.scope(&diff(0.05), &ctx()).unwrap();
        assert_eq!(focused.parameter_ids().len(), 1);
        assert!(focused.includes_parameter("output_bias"));

        let default = policy.scope(&diff(0.1), &ctx()).unwrap();
        assert_eq!(default.parameter_ids().len(), 2);

        let full = policy.scope(&diff(0.7), &ctx()).unwrap();
        assert_eq!(full.parameter_ids().len(), 4);
        assert!(full.includes_parameter("input_weights"));
    }

    #[test]
    fn test_scope_policy_construction() {
        assert!(ThresholdUpdateScopePolicy::with_thresholds(0.7, 0.1).is_err());
        assert!(ThresholdUpdateScopePolicy::new(
            0.1,
            0.7,
            BTreeSet::new(),
            string_set(&["a"]),
            string_set(&["a"]),
        )
        .is_err());
    }
}
