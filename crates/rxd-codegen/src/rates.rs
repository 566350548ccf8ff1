//! Rate resolution: from user-supplied symbolic maps to a per-edge table
//!
//! Users key rates either by the reaction text they wrote (`"R + F -> 2 F"`)
//! or by the network's ordered rate symbols (`"k2"`); positional lists in
//! edge declaration order are also accepted. A reversible reaction key must
//! carry a forward/backward pair, since it stands for two channels.

use std::collections::BTreeMap;

use rxd_core::parse::parse_reaction;
use rxd_core::{EdgeId, ReactionNetwork};

use crate::error::{GenerationError, Result};

/// A user-supplied rate value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateValue {
    /// Rate for a one-way reaction
    One(f64),
    /// Forward and backward rates for a reversible reaction
    Pair(f64, f64),
}

/// User-supplied symbolic rate parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateMap {
    entries: BTreeMap<String, RateValue>,
}

impl RateMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a one-way reaction (or rate symbol) to a rate
    pub fn set(&mut self, key: impl Into<String>, rate: f64) -> &mut Self {
        self.entries.insert(key.into(), RateValue::One(rate));
        self
    }

    /// Bind a reversible reaction to a forward/backward rate pair
    pub fn set_pair(&mut self, key: impl Into<String>, forward: f64, backward: f64) -> &mut Self {
        self.entries
            .insert(key.into(), RateValue::Pair(forward, backward));
        self
    }

    /// Build a map from rates listed in edge declaration order
    pub fn positional(rates: impl IntoIterator<Item = f64>) -> Self {
        let mut map = Self::new();
        for (index, rate) in rates.into_iter().enumerate() {
            map.set(format!("k{}", index + 1), rate);
        }
        map
    }

    /// Number of rate parameters supplied (a pair counts as two)
    pub fn parameter_count(&self) -> usize {
        self.entries
            .values()
            .map(|v| match v {
                RateValue::One(_) => 1,
                RateValue::Pair(_, _) => 2,
            })
            .sum()
    }

    /// Iterate raw entries
    pub fn iter(&self) -> impl Iterator<Item = (&str, RateValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Normalize reaction-text keys so lookups match the network's
    /// canonical reaction text regardless of the user's spacing.
    fn normalized(&self) -> BTreeMap<String, RateValue> {
        let mut out = BTreeMap::new();
        for (key, value) in &self.entries {
            match parse_reaction(key) {
                Ok(parsed) => out.insert(parsed.text, *value),
                Err(_) => out.insert(key.clone(), *value),
            };
        }
        out
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for RateMap {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        let mut map = RateMap::new();
        for (key, rate) in iter {
            map.set(key, rate);
        }
        map
    }
}

/// Numeric rates resolved per edge, in edge declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    rates: Vec<f64>,
}

impl RateTable {
    /// Resolve every edge's rate or fail on the first unresolved edge.
    pub fn resolve(network: &ReactionNetwork, rates: &RateMap) -> Result<Self> {
        let lookup = rates.normalized();
        let mut resolved = Vec::with_capacity(network.edge_count());
        for edge in network.edges() {
            let value = Self::edge_rate(&lookup, edge)?.ok_or_else(|| {
                GenerationError::missing_rate(&edge.text, &edge.rate_symbol)
            })?;
            resolved.push(value);
        }
        Ok(Self { rates: resolved })
    }

    /// Resolve every edge's rate, defaulting unresolved edges to zero.
    ///
    /// This is the tolerance the rule-based backend extends to partially
    /// specified networks; the other backends use [`RateTable::resolve`].
    pub fn resolve_lenient(network: &ReactionNetwork, rates: &RateMap) -> Result<Self> {
        let lookup = rates.normalized();
        let mut resolved = Vec::with_capacity(network.edge_count());
        for edge in network.edges() {
            match Self::edge_rate(&lookup, edge)? {
                Some(value) => resolved.push(value),
                None => {
                    log::debug!(
                        "no rate for {} ({}); defaulting to 0",
                        edge.text,
                        edge.rate_symbol
                    );
                    resolved.push(0.0);
                }
            }
        }
        Ok(Self { rates: resolved })
    }

    fn edge_rate(
        lookup: &BTreeMap<String, RateValue>,
        edge: &rxd_core::ReactionEdge,
    ) -> Result<Option<f64>> {
        // Rate-symbol keys take precedence over reaction-text keys
        if let Some(value) = lookup.get(&edge.rate_symbol) {
            return match value {
                RateValue::One(rate) => Ok(Some(*rate)),
                RateValue::Pair(_, _) => Err(GenerationError::ReversibleNeedsPair {
                    edge: edge.text.clone(),
                }),
            };
        }
        match lookup.get(&edge.text) {
            Some(RateValue::One(rate)) => {
                if edge.text.contains("<=>") {
                    Err(GenerationError::ReversibleNeedsPair {
                        edge: edge.text.clone(),
                    })
                } else {
                    Ok(Some(*rate))
                }
            }
            Some(RateValue::Pair(forward, backward)) => {
                Ok(Some(if edge.backward { *backward } else { *forward }))
            }
            None => Ok(None),
        }
    }

    /// Resolved rate for an edge
    pub fn rate(&self, edge: EdgeId) -> f64 {
        self.rates[edge.index()]
    }

    /// Rates in edge declaration order
    pub fn as_slice(&self) -> &[f64] {
        &self.rates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foxes() -> ReactionNetwork {
        ReactionNetwork::from_reactions(["R -> 2 R", "R + F -> 2 F", "F -> D"]).unwrap()
    }

    #[test]
    fn test_resolve_by_reaction_text() {
        let net = foxes();
        let mut rates = RateMap::new();
        rates.set("R -> 2 R", 0.7);
        rates.set("R + F -> F + F", 0.005); // spacing/shape differs from canonical
        rates.set("F -> D", 0.5);

        let table = RateTable::resolve(&net, &rates).unwrap();
        assert_eq!(table.as_slice(), &[0.7, 0.005, 0.5]);
    }

    #[test]
    fn test_resolve_by_symbol() {
        let net = foxes();
        let rates = RateMap::positional([0.7, 0.005, 0.5]);
        let table = RateTable::resolve(&net, &rates).unwrap();
        assert_eq!(table.rate(EdgeId::new(1)), 0.005);
    }

    #[test]
    fn test_missing_rate_names_edge() {
        let net = foxes();
        let mut rates = RateMap::new();
        rates.set("R -> 2 R", 0.7);
        let err = RateTable::resolve(&net, &rates).unwrap_err();
        match err {
            GenerationError::MissingRate { edge, symbol } => {
                assert_eq!(edge, "R + F -> 2 F");
                assert_eq!(symbol, "k2");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_lenient_defaults_to_zero() {
        let net = foxes();
        let mut rates = RateMap::new();
        rates.set("R -> 2 R", 0.7);
        let table = RateTable::resolve_lenient(&net, &rates).unwrap();
        assert_eq!(table.as_slice(), &[0.7, 0.0, 0.0]);
    }

    #[test]
    fn test_reversible_pair() {
        let net = ReactionNetwork::from_reactions(["A <=> B"]).unwrap();
        let mut rates = RateMap::new();
        rates.set_pair("A <=> B", 1.0, 2.0);
        let table = RateTable::resolve(&net, &rates).unwrap();
        assert_eq!(table.as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn test_reversible_single_value_rejected() {
        let net = ReactionNetwork::from_reactions(["A <=> B"]).unwrap();
        let mut rates = RateMap::new();
        rates.set("A <=> B", 1.0);
        assert!(matches!(
            RateTable::resolve(&net, &rates),
            Err(GenerationError::ReversibleNeedsPair { .. })
        ));
    }

    #[test]
    fn test_parameter_count() {
        let mut rates = RateMap::new();
        rates.set("A -> B", 1.0);
        rates.set_pair("B <=> C", 1.0, 2.0);
        assert_eq!(rates.parameter_count(), 3);
    }
}
