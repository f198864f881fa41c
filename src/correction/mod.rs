//! Correction stages, in pipeline order:
//!
//! - [`internal`] — blank subtraction and 204Hg interference, per sample
//! - [`ratios`] — reduce a corrected signal block to one run-table row
//! - [`mass_bias`] — sample-standard bracketing over a whole run

pub mod internal;
pub mod mass_bias;
pub mod ratios;

pub use internal::InternalCorrector;
pub use mass_bias::{MassBiasCorrector, MassBiasOutput, TrailingDataWarning};
