// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Distance Metrics
//!
//! Interchangeable distance functions between an expected and an actual
//! vector, resolved through [`MetricFactory`] by [`MetricType`].
//!
//! | Metric | Range | Symmetric |
//! |--------|-------|-----------|
//! | [`L2Distance`] | `[0, ∞)` | yes |
//! | [`CosineDistance`] | `[0, 2]` | yes |
//! | [`KlDivergence`] | `[0, ∞)` | no |
//! | [`EarthMoversDistance`] | `[0, n-1]` | yes |
//!
//! All metrics reject empty vectors, mismatched dimensions and non-finite
//! values. The distribution metrics additionally require non-negative
//! entries with a positive sum.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::error::{JudgementError, JudgementResult};

/// Probability assigned to exact zeros before renormalizing.
const SMOOTHING_EPSILON: f64 = 1e-10;

/// Magnitudes below this are treated as the zero vector.
const ZERO_NORM_TOLERANCE: f64 = 1e-12;

pub trait DistanceMetric: Send + Sync {
    fn distance(&self, expected: &[f64], actual: &[f64]) -> JudgementResult<f64>;

    fn name(&self) -> &'static str;

    fn metric_type(&self) -> MetricType;

    fn is_valid_distance(&self, distance: f64) -> bool {
        distance.is_finite() && distance >= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    L2,
    Cosine,
    KlDivergence,
    EarthMovers,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::L2 => "l2",
            MetricType::Cosine => "cosine",
            MetricType::KlDivergence => "kl_divergence",
            MetricType::EarthMovers => "earth_movers",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = JudgementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "l2" | "euclidean" => Ok(MetricType::L2),
            "cosine" => Ok(MetricType::Cosine),
            "kl_divergence" | "kl" => Ok(MetricType::KlDivergence),
            "earth_movers" | "emd" | "wasserstein" => Ok(MetricType::EarthMovers),
            other => Err(JudgementError::UnsupportedMetricType(other.to_string())),
        }
    }
}

fn validate_operands(expected: &[f64], actual: &[f64]) -> JudgementResult<()> {
    if expected.is_empty() || actual.is_empty() {
        return Err(JudgementError::EmptyVector);
    }
    if expected.len() != actual.len() {
        return Err(JudgementError::DimensionMismatch {
            expected: expected.len(),
            actual: actual.len(),
        });
    }
    for (label, v) in [("expected", expected), ("actual", actual)] {
        if let Some(pos) = v.iter().position(|x| !x.is_finite()) {
            return Err(JudgementError::InvalidVectorValues(format!(
                "{} vector has {} at index {}",
                label, v[pos], pos
            )));
        }
    }
    Ok(())
}

/// Largest absolute entry, used to rescale operands before summing squares
/// so that large finite inputs cannot overflow.
fn max_abs(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |m, x| m.max(x.abs()))
}

fn rescaled(v: &[f64], scale: f64) -> Vec<f64> {
    if scale == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / scale).collect()
}

/// Normalize a non-negative vector into a distribution.
fn to_distribution(label: &str, v: &[f64]) -> JudgementResult<Vec<f64>> {
    if let Some(pos) = v.iter().position(|&x| x < 0.0) {
        return Err(JudgementError::InvalidProbabilityDistribution(format!(
            "{} has negative entry {} at index {}",
            label, v[pos], pos
        )));
    }
    let scale = max_abs(v);
    if scale == 0.0 {
        return Err(JudgementError::InvalidProbabilityDistribution(format!(
            "{} sums to zero",
            label
        )));
    }
    let scaled = rescaled(v, scale);
    let sum: f64 = scaled.iter().sum();
    Ok(scaled.into_iter().map(|x| x / sum).collect())
}

fn smooth(p: &[f64]) -> Vec<f64> {
    let smoothed: Vec<f64> = p
        .iter()
        .map(|&x| if x == 0.0 { SMOOTHING_EPSILON } else { x })
        .collect();
    let sum: f64 = smoothed.iter().sum();
    smoothed.into_iter().map(|x| x / sum).collect()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct L2Distance;

impl DistanceMetric for L2Distance {
    fn distance(&self, expected: &[f64], actual: &[f64]) -> JudgementResult<f64> {
        validate_operands(expected, actual)?;

        let scale = max_abs(expected).max(max_abs(actual));
        if scale == 0.0 {
            return Ok(0.0);
        }
        let distance = expected
            .iter()
            .zip(actual)
            .map(|(e, a)| (e / scale - a / scale).powi(2))
            .sum::<f64>()
            .sqrt()
            * scale;
        if !distance.is_finite() {
            return Err(JudgementError::InvalidVectorValues(format!(
                "l2 distance exceeds the f64 range (scale {})",
                scale
            )));
        }
        Ok(distance)
    }

    fn name(&self) -> &'static str {
        "l2"
    }

    fn metric_type(&self) -> MetricType {
        MetricType::L2
    }
}

/// `1 - cosine_similarity`.
///
/// A zero vector compared with a non-zero vector is at distance 1; two zero
/// vectors are at distance 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct CosineDistance;

impl DistanceMetric for CosineDistance {
    fn distance(&self, expected: &[f64], actual: &[f64]) -> JudgementResult<f64> {
        validate_operands(expected, actual)?;

        // Each side is rescaled independently; the angle is unaffected.
        let (scale_e, scale_a) = (max_abs(expected), max_abs(actual));
        let e = rescaled(expected, scale_e);
        let a = rescaled(actual, scale_a);
        let unit_norm_e = e.iter().map(|x| x * x).sum::<f64>().sqrt();
        let unit_norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();

        let zero_e = scale_e * unit_norm_e < ZERO_NORM_TOLERANCE;
        let zero_a = scale_a * unit_norm_a < ZERO_NORM_TOLERANCE;
        if zero_e && zero_a {
            return Ok(0.0);
        }
        if zero_e || zero_a {
            return Ok(1.0);
        }

        let dot: f64 = e.iter().zip(&a).map(|(x, y)| x * y).sum();
        let similarity = (dot / (unit_norm_e * unit_norm_a)).clamp(-1.0, 1.0);
        Ok((1.0 - similarity).clamp(0.0, 2.0))
    }

    fn name(&self) -> &'static str {
        "cosine"
    }

    fn metric_type(&self) -> MetricType {
        MetricType::Cosine
    }

    fn is_valid_distance(&self, distance: f64) -> bool {
        (0.0..=2.0).contains(&distance)
    }
}

/// `KL(expected || actual)` over the normalized inputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct KlDivergence;

impl DistanceMetric for KlDivergence {
    fn distance(&self, expected: &[f64], actual: &[f64]) -> JudgementResult<f64> {
        validate_operands(expected, actual)?;
        let p = smooth(&to_distribution("expected", expected)?);
        let q = smooth(&to_distribution("actual", actual)?);

        let kl: f64 = p.iter().zip(&q).map(|(pi, qi)| pi * (pi / qi).ln()).sum();
        // Rounding can push identical distributions a hair below zero.
        Ok(kl.max(0.0))
    }

    fn name(&self) -> &'static str {
        "kl_divergence"
    }

    fn metric_type(&self) -> MetricType {
        MetricType::KlDivergence
    }
}

/// One-dimensional Wasserstein-1 distance with unit spacing between bins.
#[derive(Debug, Default, Clone, Copy)]
pub struct EarthMoversDistance;

impl DistanceMetric for EarthMoversDistance {
    fn distance(&self, expected: &[f64], actual: &[f64]) -> JudgementResult<f64> {
        validate_operands(expected, actual)?;
        let p = to_distribution("expected", expected)?;
        let q = to_distribution("actual", actual)?;

        let mut carried = 0.0;
        let mut work = 0.0;
        for (pi, qi) in p.iter().zip(&q) {
            carried += pi - qi;
            work += carried.abs();
        }
        Ok(work)
    }

    fn name(&self) -> &'static str {
        "earth_movers"
    }

    fn metric_type(&self) -> MetricType {
        MetricType::EarthMovers
    }
}

static METRICS: Lazy<HashMap<MetricType, Arc<dyn DistanceMetric>>> = Lazy::new(|| {
    let mut metrics: HashMap<MetricType, Arc<dyn DistanceMetric>> = HashMap::new();
    metrics.insert(MetricType::L2, Arc::new(L2Distance));
    metrics.insert(MetricType::Cosine, Arc::new(CosineDistance));
    metrics.insert(MetricType::KlDivergence, Arc::new(KlDivergence));
    metrics.insert(MetricType::EarthMovers, Arc::new(EarthMoversDistance));
    metrics
});

/// Resolves metric tags to shared metric instances.
pub struct MetricFactory;

impl MetricFactory {
    pub fn create(metric_type: MetricType) -> JudgementResult<Arc<dyn DistanceMetric>> {
        METRICS
            .get(&metric_type)
            .cloned()
            .ok_or_else(|| JudgementError::UnsupportedMetricType(metric_type.to_string()))
    }

    pub fn from_name(name: &str) -> JudgementResult<Arc<dyn DistanceMetric>> {
        Self::create(name.parse()?)
    }

    pub fn supported_types() -> Vec<MetricType> {
        vec![
            MetricType::L2,
            MetricType::Cosine,
            MetricType::KlDivergence,
            MetricType::EarthMovers,
        ]
    }
}
