//! # altrion
//!
//! Core of the Altrion gate-flow visualizer: a small continuous-time model of
//! non-compliance, error and engagement, a pool of work-item tokens flowing
//! through four gates, a rule engine that turns periodic synthetic cases into
//! auditable decision records, and a renderer that emits canvas draw commands.
//!
//! The crate is host-agnostic. A browser host replays the [`render::Scene`] on
//! a 2D context; tests and the headless CLI inspect it directly.
//!
//! ## Quick Start
//!
//! ```
//! use altrion::prelude::*;
//! use chrono::Utc;
//!
//! let mut widget = Controller::new(AltrionConfig::default(), 42, Utc::now()).unwrap();
//! widget.resize(960.0, 420.0, false);
//! widget.apply_preset(Preset::Strained);
//!
//! for i in 0..120 {
//!     let scene = widget.frame(i as f64 * 16.7, &MonospaceMeasure);
//!     assert!(!scene.commands.is_empty());
//! }
//!
//! let case = widget.request_case();
//! assert_eq!(case.id, "case-0001");
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): config from JSON and the decision-log export
//! - `cli` (default): the `altrion-cli` headless driver
//!
//! ## Modules
//!
//! - [`model`]: logistic targets and easing
//! - [`particles`]: token pool
//! - [`gates`]: G1..G4 pipeline and case log
//! - [`render`]: layout, text fitting and draw commands
//! - [`controller`]: frame loop and input port

#[path = "core/config.rs"]
pub mod config;

#[path = "core/controller.rs"]
pub mod controller;

#[cfg(feature = "serde")]
#[path = "core/export.rs"]
pub mod export;

#[path = "core/fmt.rs"]
pub mod fmt;

#[path = "core/gates.rs"]
pub mod gates;

#[path = "core/model.rs"]
pub mod model;

#[path = "core/particles.rs"]
pub mod particles;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/render.rs"]
pub mod render;

/// Prelude module for convenient imports.
///
/// ```
/// use altrion::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{AltrionConfig, ConfigError, EaseRates, ParticleBudget};
    pub use crate::controller::{Controller, InputField, Preset, SimulationState, Viewport};
    #[cfg(feature = "serde")]
    pub use crate::export::{export_document, export_filename, ExportDocument, ExportError};
    pub use crate::gates::{CaseLog, CaseRecord, Decision};
    pub use crate::model::{Metrics, ModelInputs, Regime};
    pub use crate::prng::{Prng, RandomSource};
    pub use crate::render::{DrawCommand, MonospaceMeasure, Scene, TextMeasure};
}
