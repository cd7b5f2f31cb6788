// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Predictive Cortex CLI

pub mod config;
pub mod judge;

pub use self::config::ConfigCommand;
pub use self::judge::JudgeArgs;
