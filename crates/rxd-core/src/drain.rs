//! Drain terms: exogenous boundary conditions on single species
//!
//! A drain term couples one species to the outside world: a constant
//! influx (amount per time unit) and/or a proportional efflux (first-order
//! decay out of the system). Backends that work from textual models render
//! drains as synthetic reactions; the ODE right-hand side adds them
//! directly.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Boundary condition for one species
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DrainTerm {
    /// Constant influx rate (zero-order source)
    pub influx: f64,
    /// Proportional efflux rate (first-order sink)
    pub efflux: f64,
}

impl DrainTerm {
    /// A pure influx term
    pub fn influx(rate: f64) -> Self {
        Self {
            influx: rate,
            efflux: 0.0,
        }
    }

    /// A pure efflux term
    pub fn efflux(rate: f64) -> Self {
        Self {
            influx: 0.0,
            efflux: rate,
        }
    }

    /// Whether this term contributes nothing
    pub fn is_zero(&self) -> bool {
        self.influx == 0.0 && self.efflux == 0.0
    }
}

/// Drain terms for a network, keyed by species symbol
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DrainTable {
    terms: BTreeMap<String, DrainTerm>,
}

impl DrainTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the drain term for a species symbol
    pub fn set(&mut self, symbol: impl Into<String>, term: DrainTerm) -> &mut Self {
        self.terms.insert(symbol.into(), term);
        self
    }

    /// Drain term for a symbol, if configured
    pub fn get(&self, symbol: &str) -> Option<DrainTerm> {
        self.terms.get(symbol).copied()
    }

    /// Iterate configured terms in symbol order
    pub fn iter(&self) -> impl Iterator<Item = (&str, DrainTerm)> {
        self.terms.iter().map(|(sym, term)| (sym.as_str(), *term))
    }

    /// Whether no species has a drain configured
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
