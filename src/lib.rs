//! # pbcorr
//!
//! Sequential corrections for laser-ablation lead isotope data.
//!
//! ## Modules
//!
//! - [`data`] — cycle tables, run tables, outlier filtering and tabular I/O
//! - [`correction`] — internal (blank + Hg interference) and mass-bias corrections
//! - [`pipeline`] — per-run orchestration of both stages
//! - [`config`] — processing settings and reference-standard constants

pub mod config;
pub mod correction;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod stats;

pub use config::{Config, OutlierMethod, ReferenceStandard, Settings};
pub use error::{CorrectionError, Result};
