//! Reaction system description files
//!
//! A system file is a TOML document bundling everything one run needs:
//! the reaction lines, rate parameters, initial amounts, and optional
//! drains and unchanging species.
//!
//! ```toml
//! reactions = ["R -> 2 R", "R + F -> 2 F", "F -> D"]
//! unchanging = ["D"]
//!
//! [rates]
//! k1 = 0.7
//! k2 = 0.005
//! k3 = 0.4
//!
//! [initial]
//! R = 120.0
//! F = 40.0
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use rxd_core::{DrainTable, DrainTerm, ReactionNetwork};
use rxd_codegen::RateMap;
use rxd_runtime::InitialAmounts;

use crate::error::{CliError, CliResult};

/// Parsed system description
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemFile {
    /// Reaction lines in declaration order
    pub reactions: Vec<String>,
    /// Species whose amounts are held constant
    #[serde(default)]
    pub unchanging: Vec<String>,
    /// Rate parameters keyed by symbol or reaction text
    #[serde(default)]
    pub rates: BTreeMap<String, f64>,
    /// Forward/backward rate pairs for reversible reactions
    #[serde(default)]
    pub rate_pairs: BTreeMap<String, [f64; 2]>,
    /// Initial amounts keyed by species symbol
    #[serde(default)]
    pub initial: BTreeMap<String, f64>,
    /// Drain terms keyed by species symbol
    #[serde(default)]
    pub drains: BTreeMap<String, DrainSpec>,
}

/// Drain entry in a system file
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct DrainSpec {
    /// Constant influx rate
    #[serde(default)]
    pub influx: f64,
    /// Proportional efflux rate
    #[serde(default)]
    pub efflux: f64,
}

impl SystemFile {
    /// Load and parse a system file
    pub fn load(path: &Path) -> CliResult<Self> {
        debug!("loading system description from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        let system: SystemFile = toml::from_str(&text)?;
        if system.reactions.is_empty() {
            return Err(CliError::InvalidArgs(format!(
                "{} declares no reactions",
                path.display()
            )));
        }
        Ok(system)
    }

    /// Build the reaction network this file describes
    pub fn network(&self) -> CliResult<Arc<ReactionNetwork>> {
        let lines: Vec<&str> = self.reactions.iter().map(String::as_str).collect();
        let mut network = ReactionNetwork::from_reactions(&lines)?;
        if !self.unchanging.is_empty() {
            let symbols: Vec<&str> = self.unchanging.iter().map(String::as_str).collect();
            network = network.unchanging_species(&symbols)?;
        }
        Ok(Arc::new(network))
    }

    /// Rate map combining plain rates and reversible pairs
    pub fn rate_map(&self) -> RateMap {
        let mut rates = RateMap::new();
        for (key, &value) in &self.rates {
            rates.set(key.clone(), value);
        }
        for (key, &[forward, backward]) in &self.rate_pairs {
            rates.set_pair(key.clone(), forward, backward);
        }
        rates
    }

    /// Initial amounts keyed by species symbol
    pub fn initial_amounts(&self) -> InitialAmounts {
        InitialAmounts::named(self.initial.iter().map(|(k, &v)| (k.clone(), v)))
    }

    /// Drain table for open systems
    pub fn drain_table(&self) -> DrainTable {
        let mut table = DrainTable::new();
        for (symbol, spec) in &self.drains {
            table.set(
                symbol.clone(),
                DrainTerm {
                    influx: spec.influx,
                    efflux: spec.efflux,
                },
            );
        }
        table
    }
}
