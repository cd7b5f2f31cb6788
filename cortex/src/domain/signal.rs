// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Learning Signal
//!
//! The bundle a layer hands to its model-update routine: how strongly to
//! learn, from what difference, over which parameters. A signal goes stale
//! once its age reaches its expiration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use super::difference::RelativeDifference;
use super::error::{JudgementError, JudgementResult};
use super::judgement::ComprehensiveJudgementResult;
use super::learning_rate::AdaptiveLearningRate;
use super::update_scope::UpdateScope;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLearningSignal")]
pub struct LearningSignal {
    pub signal_id: Uuid,
    pub learning_rate: AdaptiveLearningRate,
    pub difference: RelativeDifference,
    pub update_scope: UpdateScope,
    /// In `[0, 1]`.
    pub priority: f64,
    #[serde(with = "expiration_millis")]
    pub expiration: Duration,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl LearningSignal {
    pub fn new(
        learning_rate: AdaptiveLearningRate,
        difference: RelativeDifference,
        update_scope: UpdateScope,
        priority: f64,
        expiration: Duration,
    ) -> JudgementResult<Self> {
        validate_signal(priority, expiration)?;
        Ok(Self {
            signal_id: Uuid::new_v4(),
            learning_rate,
            difference,
            update_scope,
            priority,
            expiration,
            created_at: Utc::now(),
            metadata: HashMap::new(),
        })
    }

    /// Priority blends the decision's urgency weight with the squashed
    /// magnitude `m / (1 + m)`, half each.
    pub fn from_judgement(
        result: &ComprehensiveJudgementResult,
        expiration: Duration,
    ) -> JudgementResult<Self> {
        let m = result.reference_difference.magnitude();
        let priority = 0.5 * result.skip_judgement.urgency_weight() + 0.5 * (m / (1.0 + m));

        let mut signal = Self::new(
            result.learning_rate.clone(),
            result.reference_difference.clone(),
            result.update_scope.clone(),
            priority,
            expiration,
        )?;
        signal
            .metadata
            .insert("skip_judgement".to_string(), Value::from(result.skip_judgement.as_str()));
        signal
            .metadata
            .insert("judged_at".to_string(), Value::from(result.judged_at.to_rfc3339()));
        Ok(signal)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Priority scaled by how far the difference is from zero, in `[0, 1)`.
    pub fn urgency_score(&self) -> f64 {
        self.priority * (1.0 - (-self.difference.magnitude()).exp())
    }

    /// Expected size of the update: rate × magnitude × affected parameters.
    pub fn impact_score(&self) -> f64 {
        self.learning_rate.value()
            * self.difference.magnitude()
            * self.update_scope.affected_parameter_count() as f64
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    pub fn age(&self) -> Duration {
        self.age_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.age_at(now) >= self.expiration
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Higher priority first, then higher urgency, then the newer signal.
    pub fn compare_priority(&self, other: &LearningSignal) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| self.urgency_score().total_cmp(&other.urgency_score()))
            .then_with(|| self.created_at.cmp(&other.created_at))
    }

    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "signal_id": self.signal_id,
            "priority": self.priority,
            "urgency_score": self.urgency_score(),
            "impact_score": self.impact_score(),
            "expiration_ms": self.expiration.num_milliseconds(),
            "learning_rate": self.learning_rate.to_json(),
            "difference": self.difference.to_json(),
            "update_scope": self.update_scope.to_json(),
            "metadata": self.metadata,
        })
    }
}

fn validate_signal(priority: f64, expiration: Duration) -> JudgementResult<()> {
    if !(0.0..=1.0).contains(&priority) {
        return Err(JudgementError::OutOfBoundsParameter(format!(
            "signal priority must be in [0, 1], got {}",
            priority
        )));
    }
    if expiration <= Duration::zero() {
        return Err(JudgementError::OutOfBoundsParameter(format!(
            "signal expiration must be positive, got {}",
            expiration
        )));
    }
    Ok(())
}

#[derive(Deserialize)]
struct RawLearningSignal {
    signal_id: Uuid,
    learning_rate: AdaptiveLearningRate,
    difference: RelativeDifference,
    update_scope: UpdateScope,
    priority: f64,
    #[serde(with = "expiration_millis")]
    expiration: Duration,
    created_at: DateTime<Utc>,
    #[serde(default)]
    metadata: HashMap<String, Value>,
}

impl TryFrom<RawLearningSignal> for LearningSignal {
    type Error = JudgementError;

    fn try_from(raw: RawLearningSignal) -> JudgementResult<Self> {
        validate_signal(raw.priority, raw.expiration)?;
        Ok(Self {
            signal_id: raw.signal_id,
            learning_rate: raw.learning_rate,
            difference: raw.difference,
            update_scope: raw.update_scope,
            priority: raw.priority,
            expiration: raw.expiration,
            created_at: raw.created_at,
            metadata: raw.metadata,
        })
    }
}

mod expiration_millis {
    use chrono::Duration;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_milliseconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = i64::deserialize(deserializer)?;
        Duration::try_milliseconds(millis)
            .ok_or_else(|| D::Error::custom(format!("expiration of {}ms is out of range", millis)))
    }
}

impl fmt::Display for LearningSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LearningSignal(priority={:.3}, urgency={:.3}, impact={:.6}, rate={:.6}, expires_in={}ms)",
            self.priority,
            self.urgency_score(),
            self.impact_score(),
            self.learning_rate.value(),
            self.expiration.num_milliseconds()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RateOrigin, SkipDecision};

    fn judgement(magnitude: f64, decision: SkipDecision) -> ComprehensiveJudgementResult {
        ComprehensiveJudgementResult::new(
            RelativeDifference::from_magnitude(magnitude).unwrap(),
            AdaptiveLearningRate::new(0.02, RateOrigin::Adaptive).unwrap(),
            UpdateScope::from_parameters(["w1", "w2"]).unwrap(),
            decision,
        )
    }

    #[test]
    fn test_from_judgement_priority() {
        let signal =
            LearningSignal::from_judgement(&judgement(1.0, SkipDecision::FocusedCalculation), Duration::seconds(5))
                .unwrap();
        assert!((signal.priority - 0.75).abs() < 1e-12);
        assert_eq!(signal.metadata["skip_judgement"], "focused_calculation");
        assert!((signal.impact_score() - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_construction_validation() {
        let j = judgement(0.3, SkipDecision::PartialUpdate);
        let make = |priority, expiration| {
            LearningSignal::new(
                j.learning_rate.clone(),
                j.reference_difference.clone(),
                j.update_scope.clone(),
                priority,
                expiration,
            )
        };
        assert!(make(0.5, Duration::seconds(1)).is_ok());
        assert!(make(1.5, Duration::seconds(1)).is_err());
        assert!(make(f64::NAN, Duration::seconds(1)).is_err());
        assert!(make(0.5, Duration::zero()).is_err());
    }

    #[test]
    fn test_expiration() {
        let signal =
            LearningSignal::from_judgement(&judgement(0.3, SkipDecision::PartialUpdate), Duration::seconds(10))
                .unwrap();
        assert!(!signal.is_expired_at(signal.created_at + Duration::seconds(9)));
        assert!(signal.is_expired_at(signal.created_at + Duration::seconds(10)));
        assert!(!signal.is_expired());
    }

    #[test]
    fn test_priority_ordering() {
        let low =
            LearningSignal::from_judgement(&judgement(0.3, SkipDecision::PartialUpdate), Duration::seconds(10))
                .unwrap();
        let high = LearningSignal::from_judgement(
            &judgement(0.9, SkipDecision::FocusedCalculation),
            Duration::seconds(10),
        )
        .unwrap();

        let mut signals = vec![low.clone(), high.clone()];
        signals.sort_by(|a, b| b.compare_priority(a));
        assert_eq!(signals[0].signal_id, high.signal_id);
        assert_eq!(low.compare_priority(&high), Ordering::Less);
    }

    #[test]
    fn test_signal_serialization() {
        let signal =
            LearningSignal::from_judgement(&judgement(0.3, SkipDecision::PartialUpdate), Duration::seconds(2))
                .unwrap();
        let json = serde_json::to_string(&signal).unwrap();
        let deserialized: LearningSignal = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.expiration, Duration::seconds(2));
        assert_eq!(deserialized.signal_id, signal.signal_id);
    }

    #[test]
    fn test_deserialize_rejects_invalid_signals() {
        let signal =
            LearningSignal::from_judgement(&judgement(0.3, SkipDecision::PartialUpdate), Duration::seconds(2))
                .unwrap();
        let json = serde_json::to_value(&signal).unwrap();

        for (field, bad) in [
            ("expiration", serde_json::json!(i64::MIN)),
            ("expiration", serde_json::json!(0)),
            ("priority", serde_json::json!(1.5)),
        ] {
            let mut payload = json.clone();
            payload[field] = bad;
            assert!(
                serde_json::from_value::<LearningSignal>(payload).is_err(),
                "{} should be rejected",
                field
            );
        }

        let mut payload = json;
        payload["difference"]["magnitude"] = serde_json::json!(-1.0);
        assert!(serde_json::from_value::<LearningSignal>(payload).is_err());
    }
}
