// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure Layer
//!
//! In-process adapters for the judgement domain.

pub mod event_bus;

pub use event_bus::*;
