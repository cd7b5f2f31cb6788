// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Judgement Domain Layer
//!
//! Pure value types, metrics and policies. No I/O apart from configuration
//! file loading.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`pattern`] | `Pattern`, `ContextInfo`, `ContextTag` |
//! | [`metric`] | `DistanceMetric`, `MetricType`, `MetricFactory` |
//! | [`difference`] | `RelativeDifference` |
//! | [`learning_rate`] | `AdaptiveLearningRate`, `RateOrigin` |
//! | [`update_scope`] | `UpdateScope`, `IndexRange` |
//! | [`skip`] | `SkipDecision` |
//! | [`policy`] | `SkipPolicy`, `LearningRatePolicy`, `UpdateScopePolicy` |
//! | [`judgement`] | `ComprehensiveJudgementResult`, `JudgementStatistics` |
//! | [`signal`] | `LearningSignal` |
//! | [`events`] | `JudgementEvent`, `JudgementEventPublisher` |
//! | [`config`] | `JudgementConfig` |

pub mod error;
pub mod pattern;
pub mod metric;
pub mod difference;
pub mod learning_rate;
pub mod update_scope;
pub mod skip;
pub mod policy;
pub mod judgement;
pub mod signal;
pub mod events;
pub mod config;

pub use error::*;
pub use pattern::*;
pub use metric::*;
pub use difference::*;
pub use learning_rate::*;
pub use update_scope::*;
pub use skip::*;
pub use policy::*;
pub use judgement::*;
pub use signal::*;
pub use events::*;
pub use config::*;
