// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application Layer
//!
//! Orchestrates domain policies into the per-comparison judgement pipeline.

pub mod judgement_link;

pub use judgement_link::*;
