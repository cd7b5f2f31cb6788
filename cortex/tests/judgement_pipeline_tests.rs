// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the inter-layer judgement pipeline.
//!
//! Drives a link end to end with a stub metric whose output is fixed, so the
//! skip thresholds, policy invocation counts, history bounds and emitted
//! events can be asserted exactly.

use predictive_cortex::{
    AdaptiveLearningRate, AdaptiveLearningRatePolicy, ContextInfo, ContextTag, DistanceMetric,
    EventBus, InterLayerRelativeJudgementLink, JudgementConfig, JudgementContext, JudgementEvent,
    JudgementResult, LearningRatePolicy, LearningSignal, MetricFactory, MetricType, Pattern,
    RateOrigin, RelativeDifference, SkipConfig, SkipDecision, StatValue, TagType,
    ThresholdUpdateScopePolicy, UpdateScope, UpdateScopePolicy,
};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Metric that ignores its operands and reports a preset distance.
struct FixedDistance {
    bits: AtomicU64,
}

impl FixedDistance {
    fn new(distance: f64) -> Arc<Self> {
        Arc::new(Self {
            bits: AtomicU64::new(distance.to_bits()),
        })
    }

    fn set(&self, distance: f64) {
        self.bits.store(distance.to_bits(), Ordering::SeqCst);
    }
}

impl DistanceMetric for FixedDistance {
    fn distance(&self, _expected: &[f64], _actual: &[f64]) -> JudgementResult<f64> {
        Ok(f64::from_bits(self.bits.load(Ordering::SeqCst)))
    }

    fn name(&self) -> &'static str {
        "fixed"
    }

    fn metric_type(&self) -> MetricType {
        MetricType::L2
    }
}

#[derive(Default)]
struct CountingRatePolicy {
    inner: AdaptiveLearningRatePolicy,
    calls: AtomicUsize,
}

impl LearningRatePolicy for CountingRatePolicy {
    fn learning_rate(
        &self,
        difference: &RelativeDifference,
        context: &JudgementContext,
    ) -> JudgementResult<AdaptiveLearningRate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.learning_rate(difference, context)
    }

    fn name(&self) -> &'static str {
        "counting_rate"
    }
}

#[derive(Default)]
struct CountingScopePolicy {
    inner: ThresholdUpdateScopePolicy,
    calls: AtomicUsize,
}

impl UpdateScopePolicy for CountingScopePolicy {
    fn scope(
        &self,
        difference: &RelativeDifference,
        context: &JudgementContext,
    ) -> JudgementResult<UpdateScope> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.scope(difference, context)
    }

    fn name(&self) -> &'static str {
        "counting_scope"
    }
}

struct Harness {
    link: InterLayerRelativeJudgementLink,
    metric: Arc<FixedDistance>,
    rate: Arc<CountingRatePolicy>,
    scope: Arc<CountingScopePolicy>,
}

fn harness(config: &JudgementConfig) -> Harness {
    let link =
        InterLayerRelativeJudgementLink::from_config("concept->pattern", "concept", "pattern", config)
            .unwrap();
    let metric = FixedDistance::new(0.0);
    let rate = Arc::new(CountingRatePolicy::default());
    let scope = Arc::new(CountingScopePolicy::default());
    link.set_distance_metric(metric.clone());
    link.set_learning_rate_policy(rate.clone());
    link.set_update_scope_policy(scope.clone());
    Harness {
        link,
        metric,
        rate,
        scope,
    }
}

fn patterns() -> (Pattern, Pattern) {
    (
        Pattern::new("concept", vec![1.0, 0.0, 0.0]),
        Pattern::new("pattern", vec![0.0, 1.0, 0.0]),
    )
}

#[test]
fn test_three_band_pipeline() {
    // Low threshold raised to 0.1 so the 0.05 mismatch lands in the skip band
    let config = JudgementConfig {
        skip: SkipConfig {
            low_threshold: 0.1,
            high_threshold: 0.5,
        },
        ..JudgementConfig::default()
    };
    let h = harness(&config);
    let (expected, actual) = patterns();

    h.metric.set(0.05);
    let small = h.link.perform_comprehensive_judgement(&expected, &actual).unwrap();
    assert_eq!(small.skip_judgement, SkipDecision::FullSkip);
    assert!(!small.should_process);
    assert!(small.update_scope.is_empty());
    assert_eq!(small.learning_rate.value(), AdaptiveLearningRate::minimal().value());
    assert_eq!(h.rate.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.scope.calls.load(Ordering::SeqCst), 0);

    h.metric.set(0.3);
    let medium = h.link.perform_comprehensive_judgement(&expected, &actual).unwrap();
    assert_eq!(medium.skip_judgement, SkipDecision::PartialUpdate);
    assert!(medium.should_process);
    assert_eq!(h.rate.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.scope.calls.load(Ordering::SeqCst), 1);
    assert!(medium.update_scope.includes_parameter("output_weights"));
    assert_eq!(medium.update_scope.affected_parameter_count(), 2);

    h.metric.set(0.9);
    let large = h.link.perform_comprehensive_judgement(&expected, &actual).unwrap();
    assert_eq!(large.skip_judgement, SkipDecision::FocusedCalculation);
    assert!(large.should_process);
    assert_eq!(large.update_scope.affected_parameter_count(), 4);
    assert!(large.learning_rate.value() > medium.learning_rate.value());
    assert_eq!(h.rate.calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.scope.calls.load(Ordering::SeqCst), 2);

    let stats = h.link.statistics();
    assert_eq!(stats.total_judgements, 3);
    assert_eq!(stats.count(SkipDecision::FullSkip), 1);
    assert_eq!(stats.count(SkipDecision::PartialUpdate), 1);
    assert_eq!(stats.count(SkipDecision::FocusedCalculation), 1);
    assert!((stats.skip_ratio() - 1.0 / 3.0).abs() < 1e-12);
    assert!(stats.recent_activity);
}

#[test]
fn test_default_thresholds_bands() {
    let h = harness(&JudgementConfig::default());
    let (expected, actual) = patterns();

    for (distance, decision) in [
        (0.0, SkipDecision::FullSkip),
        (0.01, SkipDecision::FullSkip),
        (0.05, SkipDecision::PartialUpdate),
        (0.5, SkipDecision::FocusedCalculation),
    ] {
        h.metric.set(distance);
        let result = h.link.perform_comprehensive_judgement(&expected, &actual).unwrap();
        assert_eq!(result.skip_judgement, decision, "distance {}", distance);
    }
    assert_eq!(h.rate.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_history_keeps_most_recent_default_capacity() {
    let h = harness(&JudgementConfig::default());
    let (expected, actual) = patterns();

    for i in 0..130 {
        h.metric.set(i as f64);
        h.link.perform_comprehensive_judgement(&expected, &actual).unwrap();
    }

    let history = h.link.history();
    assert_eq!(history.len(), 100);
    assert_eq!(history.first().unwrap().reference_difference.magnitude(), 30.0);
    assert_eq!(history.last().unwrap().reference_difference.magnitude(), 129.0);
    assert_eq!(h.link.statistics().total_judgements, 130);
}

#[test]
fn test_events_flow_through_bus() {
    let bus = Arc::new(EventBus::new(64));
    let config = JudgementConfig {
        history_capacity: 2,
        ..JudgementConfig::default()
    };
    let link = InterLayerRelativeJudgementLink::from_config("l1->l0", "l1", "l0", &config)
        .unwrap()
        .with_event_publisher(bus.clone());
    let mut receiver = bus.subscribe_link("l1->l0");
    let mut other = bus.subscribe_link("l2->l1");

    link.set_metric_type(MetricType::L2).unwrap();
    let (expected, actual) = patterns();
    for _ in 0..3 {
        link.perform_comprehensive_judgement(&expected, &actual).unwrap();
    }
    link.clear_history();

    let kinds: Vec<&'static str> = receiver.drain().iter().map(|e| e.event_type()).collect();
    assert_eq!(
        kinds,
        vec![
            "policy_replaced",
            "judgement_completed",
            "judgement_completed",
            "history_evicted",
            "judgement_completed",
            "history_cleared",
        ]
    );
    assert!(other.drain().is_empty());
}

#[test]
fn test_judgement_completed_event_carries_outcome() {
    let bus = Arc::new(EventBus::default());
    let link = InterLayerRelativeJudgementLink::new("a->b", "a", "b")
        .unwrap()
        .with_event_publisher(bus.clone());
    let mut receiver = bus.subscribe();

    let (expected, actual) = patterns();
    let result = link.perform_comprehensive_judgement(&expected, &actual).unwrap();

    match receiver.try_recv().unwrap() {
        JudgementEvent::JudgementCompleted {
            metric_type,
            decision,
            magnitude,
            affected_parameters,
            ..
        } => {
            assert_eq!(metric_type, MetricType::Cosine);
            assert_eq!(decision, result.skip_judgement);
            assert_eq!(magnitude, result.reference_difference.magnitude());
            assert_eq!(affected_parameters, result.update_scope.affected_parameter_count());
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_difference_merges_context_and_stamps_comparison() {
    let link = InterLayerRelativeJudgementLink::new("a->b", "a", "b").unwrap();
    let layer = ContextTag::new(TagType::Layer, "a");
    let modality = ContextTag::new(TagType::Modality, "vision");
    let expected = Pattern::new("a", vec![1.0, 2.0, 3.0]).with_context(
        ContextInfo::new()
            .with_tag(layer.clone())
            .with_statistic("confidence", StatValue::Number(0.9)),
    );
    let actual = Pattern::new("b", vec![1.0, 2.0, 3.0]).with_context(
        ContextInfo::new()
            .with_tag(modality.clone())
            .with_statistic("confidence", StatValue::Number(0.4)),
    );

    let difference = link.calculate_relative_difference(&expected, &actual).unwrap();

    assert!(difference.magnitude().abs() < 1e-12);
    assert!(difference.context().has_tag(&layer));
    assert!(difference.context().has_tag(&modality));
    assert_eq!(
        difference.context().statistic("expected.confidence"),
        Some(StatValue::Number(0.9))
    );
    assert_eq!(
        difference.context().statistic("actual.confidence"),
        Some(StatValue::Number(0.4))
    );
    assert!(difference
        .context()
        .statistic("pattern_comparison_timestamp")
        .is_some());
}

#[test]
fn test_metric_failures_leave_history_untouched() {
    let link = InterLayerRelativeJudgementLink::new("a->b", "a", "b").unwrap();
    link.set_metric_type(MetricType::KlDivergence).unwrap();

    let expected = Pattern::new("a", vec![0.5, -0.5]);
    let actual = Pattern::new("b", vec![0.5, 0.5]);
    assert!(link.perform_comprehensive_judgement(&expected, &actual).is_err());

    let short = Pattern::new("b", vec![0.5]);
    assert!(link
        .perform_comprehensive_judgement(&Pattern::new("a", vec![0.5, 0.5]), &short)
        .is_err());

    assert_eq!(link.history_len(), 0);
    assert_eq!(link.statistics().total_judgements, 0);
}

#[test]
fn test_signal_from_focused_judgement() {
    let link = InterLayerRelativeJudgementLink::new("a->b", "a", "b").unwrap();
    let (expected, actual) = patterns();
    let result = link.perform_comprehensive_judgement(&expected, &actual).unwrap();
    assert_eq!(result.skip_judgement, SkipDecision::FocusedCalculation);

    let signal = LearningSignal::from_judgement(&result, chrono::Duration::seconds(30)).unwrap();

    // Orthogonal vectors have cosine distance 1: 0.5 * 1.0 + 0.5 * 0.5
    assert!((signal.priority - 0.75).abs() < 1e-12);
    assert!(!signal.is_expired());
    assert!(signal.urgency_score() > 0.0 && signal.urgency_score() < signal.priority);
    assert!(signal.impact_score() > 0.0);
}

#[test]
fn test_metric_properties_through_factory() {
    let cosine = MetricFactory::create(MetricType::Cosine).unwrap();
    let a = [3.0, 4.0, 0.0];
    let scaled = [6.0, 8.0, 0.0];
    assert!(cosine.distance(&a, &scaled).unwrap().abs() < 1e-12);
    assert!((cosine.distance(&a, &[-3.0, -4.0, 0.0]).unwrap() - 2.0).abs() < 1e-12);

    let l2 = MetricFactory::from_name("euclidean").unwrap();
    let b = [0.0, 0.0, 12.0];
    let ab = l2.distance(&a, &b).unwrap();
    assert!((ab - l2.distance(&b, &a).unwrap()).abs() < 1e-12);
    assert!((ab - 13.0).abs() < 1e-12);

    let emd = MetricFactory::create(MetricType::EarthMovers).unwrap();
    assert!((emd.distance(&[1.0, 0.0, 0.0], &[0.0, 0.0, 1.0]).unwrap() - 2.0).abs() < 1e-12);
}

#[test]
fn test_learning_rate_adjust_is_non_destructive() {
    let original = AdaptiveLearningRate::new(0.01, RateOrigin::Initial).unwrap();
    let adjusted = original.adjust(0.02, RateOrigin::Manual).unwrap();

    assert_eq!(original.value(), 0.01);
    assert_eq!(original.history().len(), 1);
    assert_eq!(adjusted.value(), 0.02);
    assert_eq!(adjusted.history().len(), 2);
    assert!(original.adjust(0.0, RateOrigin::Manual).is_err());
}

#[test]
fn test_scope_union_covers_both_operands() {
    let left = UpdateScope::from_ranges(&[(0, 4), (10, 12)]).unwrap();
    let right = UpdateScope::from_parameters(["output_bias"]).unwrap();
    let union = left.union(&right);

    for index in [0, 3, 10, 11] {
        assert!(union.includes_index(index));
    }
    assert!(!union.includes_index(5));
    assert!(union.includes_parameter("output_bias"));
}

#[test]
fn test_link_built_from_yaml_config() {
    let yaml = r#"
metric: l2
history_capacity: 3
skip:
  low_threshold: 0.1
  high_threshold: 2.0
"#;
    let config = JudgementConfig::from_yaml_str(yaml).unwrap();
    config.validate().unwrap();
    let link = InterLayerRelativeJudgementLink::from_config("a->b", "a", "b", &config).unwrap();

    assert_eq!(link.metric_type(), MetricType::L2);
    assert_eq!(link.history_capacity(), 3);

    // L2 distance of 1.0 sits between the custom thresholds
    let expected = Pattern::new("a", vec![0.0, 0.0]);
    let actual = Pattern::new("b", vec![0.0, 1.0]);
    let result = link.perform_comprehensive_judgement(&expected, &actual).unwrap();
    assert_eq!(result.skip_judgement, SkipDecision::PartialUpdate);
}
