// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # InterLayerRelativeJudgementLink: Per-Comparison Judgement Pipeline
//!
//! Sits between an upper and a lower layer and decides how much learning
//! effort each mismatch between an expected and an actual pattern deserves.
//!
//! ## Pipeline
//!
//! 1. The installed [`DistanceMetric`] turns the two pattern vectors into a
//!    scalar, wrapped as a [`RelativeDifference`] with merged context.
//! 2. The [`SkipPolicy`] maps the difference to a [`SkipDecision`].
//! 3. On `FullSkip` the link short-circuits: minimal learning rate, empty
//!    scope, and neither the scope nor the rate policy is invoked.
//! 4. Otherwise the [`UpdateScopePolicy`] and then the
//!    [`LearningRatePolicy`] are consulted.
//! 5. The result is appended to a bounded history and folded into running
//!    statistics in O(1).
//!
//! ## Concurrency
//!
//! Policy slots are `RwLock`-guarded and may be replaced on a live link. A
//! judgement snapshots every slot when it starts, so a replacement never
//! lands halfway through a comparison. History and statistics live behind a
//! single `Mutex`.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use chrono::{Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::{
    ComprehensiveJudgementResult, ContextInfo, DistanceMetric, JudgementConfig, JudgementContext,
    JudgementError, JudgementEvent, JudgementEventPublisher, JudgementResult, JudgementStatistics,
    LearningRatePolicy, MetricFactory, MetricType, Pattern, PolicySlot, RelativeDifference,
    SkipDecision, SkipPolicy, StatValue, UpdateScopePolicy,
};

/// Bounded judgement history plus running statistics.
struct JudgementLedger {
    history: VecDeque<ComprehensiveJudgementResult>,
    capacity: usize,
    statistics: JudgementStatistics,
    evictions: u64,
}

impl JudgementLedger {
    fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            statistics: JudgementStatistics::default(),
            evictions: 0,
        }
    }

    /// Append a result, returning the evicted entry when at capacity.
    fn record(&mut self, result: ComprehensiveJudgementResult) -> Option<ComprehensiveJudgementResult> {
        let evicted = if self.history.len() == self.capacity {
            self.evictions += 1;
            self.history.pop_front()
        } else {
            None
        };
        self.statistics.record(&result);
        self.history.push_back(result);
        evicted
    }
}

/// The four policies a judgement runs with.
struct PolicySnapshot {
    metric: Arc<dyn DistanceMetric>,
    skip: Arc<dyn SkipPolicy>,
    learning_rate: Arc<dyn LearningRatePolicy>,
    update_scope: Arc<dyn UpdateScopePolicy>,
}

pub struct InterLayerRelativeJudgementLink {
    link_id: String,
    upper_layer_id: String,
    lower_layer_id: String,
    distance_metric: RwLock<Arc<dyn DistanceMetric>>,
    skip_policy: RwLock<Arc<dyn SkipPolicy>>,
    learning_rate_policy: RwLock<Arc<dyn LearningRatePolicy>>,
    update_scope_policy: RwLock<Arc<dyn UpdateScopePolicy>>,
    ledger: Mutex<JudgementLedger>,
    activity_window: Duration,
    event_publisher: Option<Arc<dyn JudgementEventPublisher>>,
}

impl InterLayerRelativeJudgementLink {
    /// Create a link with the default configuration.
    pub fn new(
        link_id: impl Into<String>,
        upper_layer_id: impl Into<String>,
        lower_layer_id: impl Into<String>,
    ) -> JudgementResult<Self> {
        Self::from_config(link_id, upper_layer_id, lower_layer_id, &JudgementConfig::default())
    }

    pub fn from_config(
        link_id: impl Into<String>,
        upper_layer_id: impl Into<String>,
        lower_layer_id: impl Into<String>,
        config: &JudgementConfig,
    ) -> JudgementResult<Self> {
        let link_id = require_id("link_id", link_id.into())?;
        let upper_layer_id = require_id("upper_layer_id", upper_layer_id.into())?;
        let lower_layer_id = require_id("lower_layer_id", lower_layer_id.into())?;
        if upper_layer_id == lower_layer_id {
            return Err(JudgementError::InvalidArgument(format!(
                "upper and lower layer must differ, both are '{}'",
                upper_layer_id
            )));
        }
        if config.history_capacity == 0 {
            return Err(JudgementError::OutOfBoundsParameter(
                "history capacity must be greater than zero".to_string(),
            ));
        }
        let activity_window = i64::try_from(config.activity_window_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                JudgementError::OutOfBoundsParameter(format!(
                    "activity window of {}s is out of range",
                    config.activity_window_seconds
                ))
            })?;

        let distance_metric = MetricFactory::create(config.metric)?;
        let skip_policy: Arc<dyn SkipPolicy> = Arc::new(config.skip_policy()?);
        let learning_rate_policy: Arc<dyn LearningRatePolicy> =
            Arc::new(config.learning_rate_policy()?);
        let update_scope_policy: Arc<dyn UpdateScopePolicy> =
            Arc::new(config.update_scope_policy()?);

        Ok(Self {
            link_id,
            upper_layer_id,
            lower_layer_id,
            distance_metric: RwLock::new(distance_metric),
            skip_policy: RwLock::new(skip_policy),
            learning_rate_policy: RwLock::new(learning_rate_policy),
            update_scope_policy: RwLock::new(update_scope_policy),
            ledger: Mutex::new(JudgementLedger::new(config.history_capacity)),
            activity_window,
            event_publisher: None,
        })
    }

    pub fn with_event_publisher(mut self, publisher: Arc<dyn JudgementEventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    pub fn link_id(&self) -> &str {
        &self.link_id
    }

    pub fn upper_layer_id(&self) -> &str {
        &self.upper_layer_id
    }

    pub fn lower_layer_id(&self) -> &str {
        &self.lower_layer_id
    }

    pub fn metric_type(&self) -> MetricType {
        self.distance_metric.read().metric_type()
    }

    // ── Policy slots ─────────────────────────────────────────────────────────

    pub fn set_distance_metric(&self, metric: Arc<dyn DistanceMetric>) {
        let name = metric.name();
        *self.distance_metric.write() = metric;
        self.policy_replaced(PolicySlot::DistanceMetric, name);
    }

    pub fn set_metric_type(&self, metric_type: MetricType) -> JudgementResult<()> {
        self.set_distance_metric(MetricFactory::create(metric_type)?);
        Ok(())
    }

    pub fn set_skip_policy(&self, policy: Arc<dyn SkipPolicy>) {
        let name = policy.name();
        *self.skip_policy.write() = policy;
        self.policy_replaced(PolicySlot::SkipPolicy, name);
    }

    pub fn set_learning_rate_policy(&self, policy: Arc<dyn LearningRatePolicy>) {
        let name = policy.name();
        *self.learning_rate_policy.write() = policy;
        self.policy_replaced(PolicySlot::LearningRatePolicy, name);
    }

    pub fn set_update_scope_policy(&self, policy: Arc<dyn UpdateScopePolicy>) {
        let name = policy.name();
        *self.update_scope_policy.write() = policy;
        self.policy_replaced(PolicySlot::UpdateScopePolicy, name);
    }

    fn policy_replaced(&self, slot: PolicySlot, policy_name: &str) {
        info!(
            link_id = %self.link_id,
            slot = slot.as_str(),
            policy = policy_name,
            "Replaced judgement policy"
        );
        metrics::counter!("cortex_policy_replacements_total", "slot" => slot.as_str()).increment(1);
        self.publish(JudgementEvent::PolicyReplaced {
            link_id: self.link_id.clone(),
            slot,
            policy_name: policy_name.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn snapshot_policies(&self) -> PolicySnapshot {
        PolicySnapshot {
            metric: self.distance_metric.read().clone(),
            skip: self.skip_policy.read().clone(),
            learning_rate: self.learning_rate_policy.read().clone(),
            update_scope: self.update_scope_policy.read().clone(),
        }
    }

    // ── Judgement ────────────────────────────────────────────────────────────

    /// Compare two patterns with the installed distance metric.
    pub fn calculate_relative_difference(
        &self,
        expected: &Pattern,
        actual: &Pattern,
    ) -> JudgementResult<RelativeDifference> {
        let metric = self.distance_metric.read().clone();
        self.difference_with(metric.as_ref(), expected, actual)
    }

    fn difference_with(
        &self,
        metric: &dyn DistanceMetric,
        expected: &Pattern,
        actual: &Pattern,
    ) -> JudgementResult<RelativeDifference> {
        let expected_vector = expected.vector().ok_or_else(|| {
            JudgementError::InvalidArgument(format!(
                "expected pattern {} from layer '{}' has no body",
                expected.id.0, expected.layer_id
            ))
        })?;
        let actual_vector = actual.vector().ok_or_else(|| {
            JudgementError::InvalidArgument(format!(
                "actual pattern {} from layer '{}' has no body",
                actual.id.0, actual.layer_id
            ))
        })?;

        let distance = metric.distance(expected_vector, actual_vector)?;
        if !metric.is_valid_distance(distance) {
            return Err(JudgementError::InvalidVectorValues(format!(
                "metric {} produced out-of-range distance {}",
                metric.name(),
                distance
            )));
        }

        let mut context = ContextInfo::merge(&expected.context, &actual.context);
        context.stamp(
            "pattern_comparison_timestamp",
            StatValue::Number(Utc::now().timestamp_millis() as f64),
        );

        let metadata = HashMap::from([
            ("metric_type".to_string(), Value::from(metric.name())),
            ("upper_layer".to_string(), Value::from(self.upper_layer_id.clone())),
            ("lower_layer".to_string(), Value::from(self.lower_layer_id.clone())),
            ("link_id".to_string(), Value::from(self.link_id.clone())),
        ]);

        RelativeDifference::new(distance, context, metadata)
    }

    /// Run the full pipeline for one expected/actual pair.
    pub fn perform_comprehensive_judgement(
        &self,
        expected: &Pattern,
        actual: &Pattern,
    ) -> JudgementResult<ComprehensiveJudgementResult> {
        let policies = self.snapshot_policies();

        let difference = self.difference_with(policies.metric.as_ref(), expected, actual)?;
        let decision = policies.skip.judge_skip(&difference);

        let result = if decision.requires_computation() {
            let context = self.context();
            let update_scope = policies.update_scope.scope(&difference, &context)?;
            let learning_rate = policies.learning_rate.learning_rate(&difference, &context)?;
            ComprehensiveJudgementResult::new(difference, learning_rate, update_scope, decision)
        } else {
            ComprehensiveJudgementResult::skipped(difference)
        };

        self.record(&result, policies.metric.metric_type());
        Ok(result)
    }

    /// Identity handed to policies, numbered by the next judgement.
    pub fn context(&self) -> JudgementContext {
        JudgementContext {
            link_id: self.link_id.clone(),
            upper_layer_id: self.upper_layer_id.clone(),
            lower_layer_id: self.lower_layer_id.clone(),
            sequence: self.ledger.lock().statistics.total_judgements,
        }
    }

    fn record(&self, result: &ComprehensiveJudgementResult, metric_type: MetricType) {
        let magnitude = result.reference_difference.magnitude();
        let decision = result.skip_judgement;

        let (evicted, first_eviction) = {
            let mut ledger = self.ledger.lock();
            let evicted = ledger.record(result.clone());
            (evicted, ledger.evictions == 1)
        };

        debug!(
            link_id = %self.link_id,
            decision = decision.as_str(),
            magnitude,
            learning_rate = result.learning_rate.value(),
            "Judgement completed"
        );
        metrics::counter!("cortex_judgements_total", "decision" => decision.as_str()).increment(1);
        metrics::histogram!("cortex_difference_magnitude").record(magnitude);

        if let Some(evicted) = evicted {
            if first_eviction {
                warn!(
                    link_id = %self.link_id,
                    "Judgement history is full, evicting oldest entries"
                );
            }
            self.publish(JudgementEvent::HistoryEvicted {
                link_id: self.link_id.clone(),
                evicted_judged_at: evicted.judged_at,
                timestamp: Utc::now(),
            });
        }

        self.publish(JudgementEvent::JudgementCompleted {
            link_id: self.link_id.clone(),
            metric_type,
            decision,
            magnitude,
            learning_rate: result.learning_rate.value(),
            affected_parameters: result.update_scope.affected_parameter_count(),
            timestamp: result.judged_at,
        });
    }

    fn publish(&self, event: JudgementEvent) {
        if let Some(publisher) = &self.event_publisher {
            publisher.publish(event);
        }
    }

    // ── History & statistics ─────────────────────────────────────────────────

    /// All retained judgements, oldest first.
    pub fn history(&self) -> Vec<ComprehensiveJudgementResult> {
        self.ledger.lock().history.iter().cloned().collect()
    }

    /// The `n` most recent judgements, oldest first.
    pub fn recent_judgements(&self, n: usize) -> Vec<ComprehensiveJudgementResult> {
        let ledger = self.ledger.lock();
        let skip = ledger.history.len().saturating_sub(n);
        ledger.history.iter().skip(skip).cloned().collect()
    }

    pub fn last_judgement(&self) -> Option<ComprehensiveJudgementResult> {
        self.ledger.lock().history.back().cloned()
    }

    pub fn history_len(&self) -> usize {
        self.ledger.lock().history.len()
    }

    pub fn history_capacity(&self) -> usize {
        self.ledger.lock().capacity
    }

    pub fn statistics(&self) -> JudgementStatistics {
        self.ledger
            .lock()
            .statistics
            .snapshot_at(Utc::now(), self.activity_window)
    }

    /// Drop history and reset statistics.
    pub fn clear_history(&self) {
        let discarded = {
            let mut ledger = self.ledger.lock();
            let discarded = ledger.history.len();
            *ledger = JudgementLedger::new(ledger.capacity);
            discarded
        };
        info!(link_id = %self.link_id, discarded, "Cleared judgement history");
        self.publish(JudgementEvent::HistoryCleared {
            link_id: self.link_id.clone(),
            discarded,
            timestamp: Utc::now(),
        });
    }

    pub fn to_json(&self) -> Value {
        let policies = self.snapshot_policies();
        let statistics = self.statistics();
        serde_json::json!({
            "link_id": self.link_id,
            "upper_layer_id": self.upper_layer_id,
            "lower_layer_id": self.lower_layer_id,
            "policies": {
                "distance_metric": policies.metric.name(),
                "skip_policy": policies.skip.name(),
                "learning_rate_policy": policies.learning_rate.name(),
                "update_scope_policy": policies.update_scope.name(),
            },
            "history_len": self.history_len(),
            "history_capacity": self.history_capacity(),
            "statistics": statistics,
        })
    }
}

fn require_id(field: &str, value: String) -> JudgementResult<String> {
    if value.trim().is_empty() {
        return Err(JudgementError::InvalidArgument(format!("{} must not be empty", field)));
    }
    Ok(value)
}

impl fmt::Display for InterLayerRelativeJudgementLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let statistics = self.statistics();
        write!(
            f,
            "InterLayerRelativeJudgementLink({}: {} -> {}, metric={}, judgements={}, skipped={}, avg_magnitude={:.4})",
            self.link_id,
            self.upper_layer_id,
            self.lower_layer_id,
            self.metric_type(),
            statistics.total_judgements,
            statistics.count(SkipDecision::FullSkip),
            statistics.average_magnitude
        )
    }
}
