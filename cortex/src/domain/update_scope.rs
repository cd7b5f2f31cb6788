// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Update Scope
//!
//! Which model parameters a learning signal is permitted to touch. A scope is
//! expressed three ways at once: named parameter ids, a positional boolean
//! mask, and half-open index ranges. An index is included when either the
//! mask or any range covers it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use std::collections::BTreeSet;
use std::fmt;

use super::error::{JudgementError, JudgementResult};

/// Half-open index range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawIndexRange")]
pub struct IndexRange {
    start: usize,
    end: usize,
}

impl IndexRange {
    pub fn new(start: usize, end: usize) -> JudgementResult<Self> {
        if end <= start {
            return Err(JudgementError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn width(&self) -> usize {
        self.end - self.start
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }

    pub fn overlap(&self, other: &IndexRange) -> Option<IndexRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (end > start).then_some(IndexRange { start, end })
    }
}

#[derive(Deserialize)]
struct RawIndexRange {
    start: usize,
    end: usize,
}

impl TryFrom<RawIndexRange> for IndexRange {
    type Error = JudgementError;

    fn try_from(raw: RawIndexRange) -> JudgementResult<Self> {
        IndexRange::new(raw.start, raw.end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawUpdateScope")]
pub struct UpdateScope {
    parameter_ids: BTreeSet<String>,
    mask: Vec<bool>,
    ranges: Vec<IndexRange>,
    scope_id: String,
}

#[derive(Deserialize)]
struct RawUpdateScope {
    #[serde(default)]
    parameter_ids: BTreeSet<String>,
    #[serde(default)]
    mask: Vec<bool>,
    #[serde(default)]
    ranges: Vec<IndexRange>,
    scope_id: Option<String>,
}

impl TryFrom<RawUpdateScope> for UpdateScope {
    type Error = JudgementError;

    fn try_from(raw: RawUpdateScope) -> JudgementResult<Self> {
        UpdateScope::new(raw.parameter_ids, raw.mask, raw.ranges, raw.scope_id)
    }
}

impl UpdateScope {
    pub fn new(
        parameter_ids: BTreeSet<String>,
        mask: Vec<bool>,
        ranges: Vec<IndexRange>,
        scope_id: Option<String>,
    ) -> JudgementResult<Self> {
        if parameter_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(JudgementError::InvalidArgument(
                "parameter ids must not be empty".to_string(),
            ));
        }
        let scope_id = match scope_id {
            Some(id) if id.trim().is_empty() => {
                return Err(JudgementError::InvalidArgument(
                    "scope id must not be empty when provided".to_string(),
                ))
            }
            Some(id) => id,
            None => generate_scope_id(),
        };
        Ok(Self {
            parameter_ids,
            mask,
            ranges,
            scope_id,
        })
    }

    pub fn empty() -> Self {
        Self {
            parameter_ids: BTreeSet::new(),
            mask: Vec::new(),
            ranges: Vec::new(),
            scope_id: generate_scope_id(),
        }
    }

    pub fn from_parameters<I, S>(ids: I) -> JudgementResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ids.into_iter().map(Into::into).collect(), Vec::new(), Vec::new(), None)
    }

    pub fn from_mask(mask: Vec<bool>) -> Self {
        Self {
            parameter_ids: BTreeSet::new(),
            mask,
            ranges: Vec::new(),
            scope_id: generate_scope_id(),
        }
    }

    /// Each `(start, end)` pair must satisfy `end > start`.
    pub fn from_ranges(ranges: &[(usize, usize)]) -> JudgementResult<Self> {
        let ranges = ranges
            .iter()
            .map(|&(start, end)| IndexRange::new(start, end))
            .collect::<JudgementResult<Vec<_>>>()?;
        Self::new(BTreeSet::new(), Vec::new(), ranges, None)
    }

    pub fn parameter_ids(&self) -> &BTreeSet<String> {
        &self.parameter_ids
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    pub fn ranges(&self) -> &[IndexRange] {
        &self.ranges
    }

    pub fn scope_id(&self) -> &str {
        &self.scope_id
    }

    pub fn includes_index(&self, index: usize) -> bool {
        self.mask.get(index).copied().unwrap_or(false)
            || self.ranges.iter().any(|r| r.contains(index))
    }

    pub fn includes_parameter(&self, parameter_id: &str) -> bool {
        self.parameter_ids.contains(parameter_id)
    }

    pub fn is_empty(&self) -> bool {
        self.parameter_ids.is_empty() && !self.mask.iter().any(|&b| b) && self.ranges.is_empty()
    }

    pub fn union(&self, other: &UpdateScope) -> UpdateScope {
        let len = self.mask.len().max(other.mask.len());
        let mask = (0..len)
            .map(|i| mask_at(&self.mask, i) || mask_at(&other.mask, i))
            .collect();

        let mut ranges: Vec<IndexRange> =
            self.ranges.iter().chain(other.ranges.iter()).copied().collect();
        ranges.sort();
        let ranges = coalesce(ranges);

        UpdateScope {
            parameter_ids: self.parameter_ids.union(&other.parameter_ids).cloned().collect(),
            mask,
            ranges,
            scope_id: generate_scope_id(),
        }
    }

    /// Parameter ids intersect set-wise. An index is kept when both scopes
    /// include it, whichever representation covers it on each side: overlaps
    /// of two ranges stay ranges, every other shared index lands in the mask.
    pub fn intersection(&self, other: &UpdateScope) -> UpdateScope {
        let mut ranges: Vec<IndexRange> = self
            .ranges
            .iter()
            .flat_map(|a| other.ranges.iter().filter_map(move |b| a.overlap(b)))
            .collect();
        ranges.sort();
        let ranges = coalesce(ranges);

        let len = self.mask.len().max(other.mask.len());
        let mut mask: Vec<bool> = (0..len)
            .map(|i| {
                self.includes_index(i)
                    && other.includes_index(i)
                    && !ranges.iter().any(|r| r.contains(i))
            })
            .collect();
        while mask.last() == Some(&false) {
            mask.pop();
        }

        UpdateScope {
            parameter_ids: self
                .parameter_ids
                .intersection(&other.parameter_ids)
                .cloned()
                .collect(),
            mask,
            ranges,
            scope_id: generate_scope_id(),
        }
    }

    /// Sum of explicit ids, set mask positions and total range width.
    ///
    /// The three representations are counted independently, so an index that
    /// is covered by both the mask and a range is counted twice.
    pub fn affected_parameter_count(&self) -> usize {
        self.parameter_ids.len()
            + self.mask.iter().filter(|&&b| b).count()
            + self.ranges.iter().map(IndexRange::width).sum::<usize>()
    }

    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "scope_id": self.scope_id,
            "parameter_ids": self.parameter_ids,
            "mask_length": self.mask.len(),
            "ranges": self.ranges.iter().map(|r| [r.start, r.end]).collect::<Vec<_>>(),
            "affected_parameter_count": self.affected_parameter_count(),
        })
    }
}

fn generate_scope_id() -> String {
    format!("scope-{}", Uuid::new_v4())
}

fn mask_at(mask: &[bool], index: usize) -> bool {
    mask.get(index).copied().unwrap_or(false)
}

/// Merge sorted ranges that overlap or touch.
fn coalesce(sorted: Vec<IndexRange>) -> Vec<IndexRange> {
    let mut merged: Vec<IndexRange> = Vec::with_capacity(sorted.len());
    for range in sorted {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

impl fmt::Display for UpdateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UpdateScope({}, parameters={}, mask={}, ranges={}, affected={})",
            self.scope_id,
            self.parameter_ids.len(),
            self.mask.len(),
            self.ranges.len(),
            self.affected_parameter_count()
        )
    }
}
