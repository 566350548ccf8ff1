//! Backend model generators for rxd
//!
//! Each generator is a pure function from an immutable reaction network plus
//! resolved rates, initial conditions, and optional drain terms to the
//! backend's native textual model. Generators never touch the file system
//! and never emit partial output: they render into an owned `String` and
//! return an error instead of a half-written model.
//!
//! Three target grammars are supported:
//! - [`spim`]: stochastic pi-calculus source for the SPiM interpreter
//! - [`stochkit`]: the StochKit2 XML model format
//! - [`psc`]: the line-oriented PSC format consumed by StochPy-style engines

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod psc;
pub mod rates;
pub mod spim;
pub mod stochkit;

pub use error::{GenerationError, Result};
pub use rates::{RateMap, RateTable, RateValue};

/// Default fixed decimal precision for rendered numeric literals
pub const DEFAULT_FLOAT_PRECISION: usize = 18;

/// Render a float at a fixed decimal precision.
pub(crate) fn fmt_float(value: f64, precision: usize) -> String {
    format!("{:.*}", precision, value)
}

/// Check that an initial amount is a whole population count.
pub(crate) fn as_population(symbol: &str, value: f64) -> Result<u64> {
    if value < 0.0 || value.fract() != 0.0 || !value.is_finite() {
        return Err(GenerationError::invalid_initial_value(symbol, value));
    }
    Ok(value as u64)
}
