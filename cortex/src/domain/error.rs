// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Judgement Errors
//!
//! Every fault in the judgement pipeline is a local, synchronous
//! programming/configuration error raised at the point of violation.
//! Nothing here is retried and nothing is swallowed.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum JudgementError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Dimension mismatch: expected has {expected} elements, actual has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector must not be empty")]
    EmptyVector,

    #[error("Vector contains non-finite values: {0}")]
    InvalidVectorValues(String),

    #[error("Invalid probability distribution: {0}")]
    InvalidProbabilityDistribution(String),

    #[error("Unsupported metric type: {0}")]
    UnsupportedMetricType(String),

    #[error("Unsupported tag type: {0}")]
    UnsupportedTagType(String),

    #[error("Invalid range [{start}, {end}): end must be greater than start")]
    InvalidRange { start: usize, end: usize },

    #[error("Parameter out of bounds: {0}")]
    OutOfBoundsParameter(String),
}

pub type JudgementResult<T> = Result<T, JudgementError>;
