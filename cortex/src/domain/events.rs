// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the judgement bounded context
//! Published per judgement and per policy replacement for observability

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metric::MetricType;
use super::skip::SkipDecision;

/// Judgement domain events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JudgementEvent {
    /// A comparison between an expected and an actual pattern was judged
    JudgementCompleted {
        link_id: String,
        metric_type: MetricType,
        decision: SkipDecision,
        magnitude: f64,
        learning_rate: f64,
        affected_parameters: usize,
        timestamp: DateTime<Utc>,
    },

    /// A policy slot on a live link was replaced
    PolicyReplaced {
        link_id: String,
        slot: PolicySlot,
        policy_name: String,
        timestamp: DateTime<Utc>,
    },

    /// History reached capacity and the oldest judgement was dropped
    HistoryEvicted {
        link_id: String,
        evicted_judged_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// History and statistics were reset
    HistoryCleared {
        link_id: String,
        discarded: usize,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicySlot {
    DistanceMetric,
    SkipPolicy,
    LearningRatePolicy,
    UpdateScopePolicy,
}

impl PolicySlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicySlot::DistanceMetric => "distance_metric",
            PolicySlot::SkipPolicy => "skip_policy",
            PolicySlot::LearningRatePolicy => "learning_rate_policy",
            PolicySlot::UpdateScopePolicy => "update_scope_policy",
        }
    }
}

impl JudgementEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            JudgementEvent::JudgementCompleted { timestamp, .. } => *timestamp,
            JudgementEvent::PolicyReplaced { timestamp, .. } => *timestamp,
            JudgementEvent::HistoryEvicted { timestamp, .. } => *timestamp,
            JudgementEvent::HistoryCleared { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            JudgementEvent::JudgementCompleted { .. } => "judgement_completed",
            JudgementEvent::PolicyReplaced { .. } => "policy_replaced",
            JudgementEvent::HistoryEvicted { .. } => "history_evicted",
            JudgementEvent::HistoryCleared { .. } => "history_cleared",
        }
    }

    pub fn link_id(&self) -> &str {
        match self {
            JudgementEvent::JudgementCompleted { link_id, .. }
            | JudgementEvent::PolicyReplaced { link_id, .. }
            | JudgementEvent::HistoryEvicted { link_id, .. }
            | JudgementEvent::HistoryCleared { link_id, .. } => link_id,
        }
    }
}

/// Sink for judgement events. Publishing never fails the judgement.
pub trait JudgementEventPublisher: Send + Sync {
    fn publish(&self, event: JudgementEvent);
}
