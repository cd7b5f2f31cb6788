// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict on how much follow-up computation a difference warrants.
///
/// Variants are ordered by urgency: `FullSkip < PartialUpdate < FocusedCalculation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipDecision {
    /// Difference is negligible; no learning work is done.
    FullSkip,
    /// Moderate difference; a partial update is enough.
    PartialUpdate,
    /// Large difference; exhaustive recalculation.
    FocusedCalculation,
}

impl SkipDecision {
    pub const ALL: [SkipDecision; 3] = [
        SkipDecision::FullSkip,
        SkipDecision::PartialUpdate,
        SkipDecision::FocusedCalculation,
    ];

    pub fn requires_computation(&self) -> bool {
        !matches!(self, SkipDecision::FullSkip)
    }

    pub fn urgency_weight(&self) -> f64 {
        match self {
            SkipDecision::FullSkip => 0.0,
            SkipDecision::PartialUpdate => 0.5,
            SkipDecision::FocusedCalculation => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SkipDecision::FullSkip => "full_skip",
            SkipDecision::PartialUpdate => "partial_update",
            SkipDecision::FocusedCalculation => "focused_calculation",
        }
    }
}

impl fmt::Display for SkipDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
