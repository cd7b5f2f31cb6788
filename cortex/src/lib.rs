// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `predictive-cortex`: Inter-Layer Relative Judgement
//!
//! In a layered predictive-coding architecture, each layer predicts the
//! pattern the layer below will observe. This crate decides how much
//! learning effort every expected-vs-actual mismatch deserves.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | Metrics, value types, policies, config, events |
//! | [`application`] | Application | `InterLayerRelativeJudgementLink` |
//! | [`infrastructure`] | Infrastructure | Broadcast `EventBus` |
//!
//! ## Example
//!
//! ```
//! use predictive_cortex::{InterLayerRelativeJudgementLink, LearningSignal, Pattern};
//!
//! let link = InterLayerRelativeJudgementLink::new("concept->pattern", "concept", "pattern")?;
//! let expected = Pattern::new("concept", vec![1.0, 0.0, 0.0]);
//! let actual = Pattern::new("pattern", vec![0.0, 1.0, 0.0]);
//!
//! let result = link.perform_comprehensive_judgement(&expected, &actual)?;
//! if result.should_process {
//!     let signal = LearningSignal::from_judgement(&result, chrono::Duration::seconds(30))?;
//!     assert!(signal.priority > 0.5);
//! }
//! # Ok::<(), predictive_cortex::JudgementError>(())
//! ```

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
pub use application::*;
pub use infrastructure::*;
