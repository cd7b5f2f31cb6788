// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Patterns & Context
//!
//! A [`Pattern`] is a tagged, vector-representable snapshot of a layer's
//! predicted (expected) or observed (actual) state. Layers produce them; the
//! judgement link compares them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use super::error::{JudgementError, JudgementResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternId(pub Uuid);

impl PatternId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PatternId {
    fn default() -> Self {
        Self::new()
    }
}

/// Category of a context tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagType {
    Layer,
    Modality,
    Temporal,
    Source,
    Custom,
}

impl TagType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagType::Layer => "layer",
            TagType::Modality => "modality",
            TagType::Temporal => "temporal",
            TagType::Source => "source",
            TagType::Custom => "custom",
        }
    }
}

impl FromStr for TagType {
    type Err = JudgementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "layer" => Ok(TagType::Layer),
            "modality" => Ok(TagType::Modality),
            "temporal" => Ok(TagType::Temporal),
            "source" => Ok(TagType::Source),
            "custom" => Ok(TagType::Custom),
            other => Err(JudgementError::UnsupportedTagType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContextTag {
    pub tag_type: TagType,
    pub value: String,
}

impl ContextTag {
    pub fn new(tag_type: TagType, value: impl Into<String>) -> Self {
        Self {
            tag_type,
            value: value.into(),
        }
    }

    /// Parse a `type:value` tag, e.g. `modality:visual`.
    pub fn parse(raw: &str) -> JudgementResult<Self> {
        let (kind, value) = raw.split_once(':').ok_or_else(|| {
            JudgementError::InvalidArgument(format!("tag '{}' is not in type:value form", raw))
        })?;
        if value.is_empty() {
            return Err(JudgementError::InvalidArgument(format!(
                "tag '{}' has an empty value",
                raw
            )));
        }
        Ok(Self::new(kind.parse()?, value))
    }
}

impl fmt::Display for ContextTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tag_type.as_str(), self.value)
    }
}

/// Numeric or boolean statistic attached to a context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Number(f64),
    Flag(bool),
}

impl StatValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StatValue::Number(v) => Some(*v),
            StatValue::Flag(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StatValue::Flag(b) => Some(*b),
            StatValue::Number(_) => None,
        }
    }
}

/// Tags plus keyed statistics describing where a pattern (or a difference
/// between two patterns) came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextInfo {
    #[serde(default)]
    pub tags: BTreeSet<ContextTag>,
    #[serde(default)]
    pub statistics: BTreeMap<String, StatValue>,
}

impl ContextInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, tag: ContextTag) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn with_statistic(mut self, key: impl Into<String>, value: StatValue) -> Self {
        self.statistics.insert(key.into(), value);
        self
    }

    pub fn has_tag(&self, tag: &ContextTag) -> bool {
        self.tags.contains(tag)
    }

    pub fn statistic(&self, key: &str) -> Option<StatValue> {
        self.statistics.get(key).copied()
    }

    /// Combine the contexts of an expected and an actual pattern.
    ///
    /// Tags are unioned. Statistics are unioned key-wise: a key present on
    /// one side only is copied, a key present on both sides with equal values
    /// is kept once, and a key whose values conflict is retained from both
    /// sides as `expected.<key>` and `actual.<key>`. If such a namespaced key
    /// is already taken by a different value it gets a `#2`, `#3`, ... suffix,
    /// so no input value is ever dropped.
    pub fn merge(expected: &ContextInfo, actual: &ContextInfo) -> ContextInfo {
        let tags = expected.tags.union(&actual.tags).cloned().collect();

        let mut statistics = BTreeMap::new();
        let mut conflicts = Vec::new();
        for (key, value) in &expected.statistics {
            match actual.statistics.get(key) {
                Some(other) if other != value => conflicts.push((key, *value, *other)),
                _ => {
                    statistics.insert(key.clone(), *value);
                }
            }
        }
        for (key, value) in &actual.statistics {
            if !expected.statistics.contains_key(key) {
                statistics.insert(key.clone(), *value);
            }
        }
        for (key, expected_value, actual_value) in conflicts {
            insert_distinct(&mut statistics, format!("expected.{}", key), expected_value);
            insert_distinct(&mut statistics, format!("actual.{}", key), actual_value);
        }

        ContextInfo { tags, statistics }
    }

    /// Set `key` to `value`. A different value already stored under `key`
    /// is moved to `source.<key>` rather than overwritten.
    pub fn stamp(&mut self, key: &str, value: StatValue) {
        if let Some(previous) = self.statistics.insert(key.to_string(), value) {
            if previous != value {
                insert_distinct(&mut self.statistics, format!("source.{}", key), previous);
            }
        }
    }
}

/// Insert under `key`, or under the first free `key#n` when `key` already
/// holds a different value. Returns the key actually used.
fn insert_distinct(
    statistics: &mut BTreeMap<String, StatValue>,
    key: String,
    value: StatValue,
) -> String {
    let mut candidate = key.clone();
    let mut n = 2;
    loop {
        match statistics.get(&candidate) {
            Some(existing) if *existing != value => {
                candidate = format!("{}#{}", key, n);
                n += 1;
            }
            _ => {
                statistics.insert(candidate.clone(), value);
                return candidate;
            }
        }
    }
}

/// Vector representation carried by a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternBody {
    pub vector: Vec<f64>,
}

impl PatternBody {
    pub fn new(vector: Vec<f64>) -> Self {
        Self { vector }
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: PatternId,
    pub layer_id: String,
    pub context: ContextInfo,
    /// `None` when the producing layer had nothing to represent yet.
    pub body: Option<PatternBody>,
    pub created_at: DateTime<Utc>,
}

impl Pattern {
    pub fn new(layer_id: impl Into<String>, vector: Vec<f64>) -> Self {
        Self {
            id: PatternId::new(),
            layer_id: layer_id.into(),
            context: ContextInfo::default(),
            body: Some(PatternBody::new(vector)),
            created_at: Utc::now(),
        }
    }

    /// A pattern whose body has not been produced.
    pub fn without_body(layer_id: impl Into<String>) -> Self {
        Self {
            id: PatternId::new(),
            layer_id: layer_id.into(),
            context: ContextInfo::default(),
            body: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_context(mut self, context: ContextInfo) -> Self {
        self.context = context;
        self
    }

    pub fn vector(&self) -> Option<&[f64]> {
        self.body.as_ref().map(|b| b.vector.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_parsing() {
        let tag = ContextTag::parse("modality:visual").unwrap();
        assert_eq!(tag.tag_type, TagType::Modality);
        assert_eq!(tag.value, "visual");
        assert_eq!(tag.to_string(), "modality:visual");

        assert!(matches!(
            ContextTag::parse("colour:red"),
            Err(JudgementError::UnsupportedTagType(_))
        ));
        assert!(matches!(
            ContextTag::parse("novalue"),
            Err(JudgementError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_merge_unions_tags_and_disjoint_statistics() {
        let expected = ContextInfo::new()
            .with_tag(ContextTag::new(TagType::Layer, "concept"))
            .with_statistic("confidence", StatValue::Number(0.8));
        let actual = ContextInfo::new()
            .with_tag(ContextTag::new(TagType::Layer, "pattern"))
            .with_statistic("observed", StatValue::Flag(true));

        let merged = ContextInfo::merge(&expected, &actual);
        assert_eq!(merged.tags.len(), 2);
        assert_eq!(merged.statistic("confidence"), Some(StatValue::Number(0.8)));
        assert_eq!(merged.statistic("observed"), Some(StatValue::Flag(true)));
    }

    #[test]
    fn test_merge_keeps_both_sides_of_conflicting_statistics() {
        let expected = ContextInfo::new()
            .with_statistic("energy", StatValue::Number(1.0))
            .with_statistic("shared", StatValue::Number(2.0));
        let actual = ContextInfo::new()
            .with_statistic("energy", StatValue::Number(3.0))
            .with_statistic("shared", StatValue::Number(2.0));

        let merged = ContextInfo::merge(&expected, &actual);
        assert_eq!(merged.statistic("energy"), None);
        assert_eq!(merged.statistic("expected.energy"), Some(StatValue::Number(1.0)));
        assert_eq!(merged.statistic("actual.energy"), Some(StatValue::Number(3.0)));
        assert_eq!(merged.statistic("shared"), Some(StatValue::Number(2.0)));
    }

    #[test]
    fn test_merge_never_overwrites_namespaced_keys() {
        let expected = ContextInfo::new().with_statistic("confidence", StatValue::Number(1.0));
        let actual = ContextInfo::new()
            .with_statistic("confidence", StatValue::Number(2.0))
            .with_statistic("expected.confidence", StatValue::Number(5.0));

        let merged = ContextInfo::merge(&expected, &actual);
        assert_eq!(merged.statistic("expected.confidence"), Some(StatValue::Number(5.0)));
        assert_eq!(merged.statistic("expected.confidence#2"), Some(StatValue::Number(1.0)));
        assert_eq!(merged.statistic("actual.confidence"), Some(StatValue::Number(2.0)));
        assert_eq!(merged.statistics.len(), 3);
    }

    #[test]
    fn test_stamp_relocates_existing_value() {
        let mut context = ContextInfo::new().with_statistic("at", StatValue::Number(1.0));
        context.stamp("at", StatValue::Number(9.0));
        assert_eq!(context.statistic("at"), Some(StatValue::Number(9.0)));
        assert_eq!(context.statistic("source.at"), Some(StatValue::Number(1.0)));

        context.stamp("fresh", StatValue::Flag(true));
        assert_eq!(context.statistics.len(), 3);
    }

    #[test]
    fn test_pattern_without_body() {
        let pattern = Pattern::without_body("sensory");
        assert!(pattern.vector().is_none());

        let pattern = Pattern::new("sensory", vec![1.0, 2.0]);
        assert_eq!(pattern.vector(), Some(&[1.0, 2.0][..]));
    }
}
