// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Judgement Results & Statistics
//!
//! [`ComprehensiveJudgementResult`] is produced once per link invocation and
//! stored by value in the link's bounded history. [`JudgementStatistics`]
//! folds each result in O(1) and is handed out as a snapshot.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::fmt;

use super::difference::RelativeDifference;
use super::learning_rate::AdaptiveLearningRate;
use super::skip::SkipDecision;
use super::update_scope::UpdateScope;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveJudgementResult {
    pub reference_difference: RelativeDifference,
    pub learning_rate: AdaptiveLearningRate,
    pub update_scope: UpdateScope,
    pub skip_judgement: SkipDecision,
    pub should_process: bool,
    pub judged_at: DateTime<Utc>,
}

impl ComprehensiveJudgementResult {
    pub fn new(
        reference_difference: RelativeDifference,
        learning_rate: AdaptiveLearningRate,
        update_scope: UpdateScope,
        skip_judgement: SkipDecision,
    ) -> Self {
        Self {
            reference_difference,
            learning_rate,
            update_scope,
            skip_judgement,
            should_process: skip_judgement.requires_computation(),
            judged_at: Utc::now(),
        }
    }

    /// Result for a `FullSkip`: minimal rate, empty scope.
    pub fn skipped(reference_difference: RelativeDifference) -> Self {
        Self::new(
            reference_difference,
            AdaptiveLearningRate::minimal(),
            UpdateScope::empty(),
            SkipDecision::FullSkip,
        )
    }

    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "skip_judgement": self.skip_judgement,
            "should_process": self.should_process,
            "difference": self.reference_difference.to_json(),
            "learning_rate": self.learning_rate.to_json(),
            "update_scope": self.update_scope.to_json(),
            "judged_at": self.judged_at.to_rfc3339(),
        })
    }
}

impl fmt::Display for ComprehensiveJudgementResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Judgement(decision={}, process={}, magnitude={:.6}, rate={:.6}, affected={})",
            self.skip_judgement,
            self.should_process,
            self.reference_difference.magnitude(),
            self.learning_rate.value(),
            self.update_scope.affected_parameter_count()
        )
    }
}

/// Running statistics over every judgement a link has made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgementStatistics {
    pub total_judgements: u64,
    pub decision_counts: BTreeMap<SkipDecision, u64>,
    pub average_magnitude: f64,
    pub average_learning_rate: f64,
    pub last_judgement_at: Option<DateTime<Utc>>,
    pub recent_activity: bool,
}

impl Default for JudgementStatistics {
    fn default() -> Self {
        Self {
            total_judgements: 0,
            decision_counts: SkipDecision::ALL.iter().map(|d| (*d, 0)).collect(),
            average_magnitude: 0.0,
            average_learning_rate: 0.0,
            last_judgement_at: None,
            recent_activity: false,
        }
    }
}

impl JudgementStatistics {
    /// Fold one result into the running averages.
    pub fn record(&mut self, result: &ComprehensiveJudgementResult) {
        self.total_judgements += 1;
        *self.decision_counts.entry(result.skip_judgement).or_insert(0) += 1;

        let n = self.total_judgements as f64;
        self.average_magnitude +=
            (result.reference_difference.magnitude() - self.average_magnitude) / n;
        self.average_learning_rate +=
            (result.learning_rate.value() - self.average_learning_rate) / n;
        self.last_judgement_at = Some(result.judged_at);
    }

    pub fn count(&self, decision: SkipDecision) -> u64 {
        self.decision_counts.get(&decision).copied().unwrap_or(0)
    }

    /// Fraction of judgements that required no computation.
    pub fn skip_ratio(&self) -> f64 {
        if self.total_judgements == 0 {
            return 0.0;
        }
        self.count(SkipDecision::FullSkip) as f64 / self.total_judgements as f64
    }

    /// Copy with `recent_activity` evaluated against `window` at `now`.
    pub fn snapshot_at(&self, now: DateTime<Utc>, window: Duration) -> Self {
        let mut snapshot = self.clone();
        snapshot.recent_activity = self
            .last_judgement_at
            .map(|at| now - at <= window)
            .unwrap_or(false);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(magnitude: f64, rate: f64, decision: SkipDecision) -> ComprehensiveJudgementResult {
        ComprehensiveJudgementResult::new(
            RelativeDifference::from_magnitude(magnitude).unwrap(),
            AdaptiveLearningRate::new(rate, crate::domain::RateOrigin::Adaptive).unwrap(),
            UpdateScope::empty(),
            decision,
        )
    }

    #[test]
    fn test_should_process_follows_decision() {
        assert!(!result_with(0.0, 0.1, SkipDecision::FullSkip).should_process);
        assert!(result_with(0.3, 0.1, SkipDecision::PartialUpdate).should_process);

        let skipped =
            ComprehensiveJudgementResult::skipped(RelativeDifference::from_magnitude(0.001).unwrap());
        assert!(!skipped.should_process);
        assert!(skipped.update_scope.is_empty());
    }

    #[test]
    fn test_running_averages() {
        let mut stats = JudgementStatistics::default();
        stats.record(&result_with(0.2, 0.01, SkipDecision::PartialUpdate));
        stats.record(&result_with(0.4, 0.03, SkipDecision::PartialUpdate));
        stats.record(&result_with(0.9, 0.05, SkipDecision::FocusedCalculation));

        assert_eq!(stats.total_judgements, 3);
        assert_eq!(stats.count(SkipDecision::PartialUpdate), 2);
        assert_eq!(stats.count(SkipDecision::FocusedCalculation), 1);
        assert_eq!(stats.count(SkipDecision::FullSkip), 0);
        assert!((stats.average_magnitude - 0.5).abs() < 1e-12);
        assert!((stats.average_learning_rate - 0.03).abs() < 1e-12);
        assert_eq!(stats.skip_ratio(), 0.0);
    }

    #[test]
    fn test_recent_activity_window() {
        let mut stats = JudgementStatistics::default();
        let now = Utc::now();
        assert!(!stats.snapshot_at(now, Duration::seconds(60)).recent_activity);

        stats.record(&result_with(0.2, 0.01, SkipDecision::PartialUpdate));
        assert!(stats.snapshot_at(Utc::now(), Duration::seconds(60)).recent_activity);
        assert!(!stats
            .snapshot_at(Utc::now() + Duration::seconds(120), Duration::seconds(60))
            .recent_activity);
    }

    #[test]
    fn test_result_json_projection() {
        let json = result_with(0.3, 0.02, SkipDecision::PartialUpdate).to_json();
        assert_eq!(json["skip_judgement"], "partial_update");
        assert_eq!(json["should_process"], true);
    }
}
