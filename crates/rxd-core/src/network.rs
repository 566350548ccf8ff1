//! Reaction network: species, reaction edges, and the frozen hypergraph
//!
//! Species declaration order is canonical: it fixes the column order of
//! every trajectory produced by every backend, end to end.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CoreError, Result};
use crate::parse::{parse_reaction, SideTerms};
use crate::{EdgeId, SpeciesId};

/// One network vertex: a chemical species
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Species {
    /// Stable identifier; doubles as the trajectory column index
    pub id: SpeciesId,
    /// Display symbol, unique within a network
    pub symbol: String,
}

/// One reaction channel (a hyperedge of the network)
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionEdge {
    /// Stable identifier in declaration order
    pub id: EdgeId,
    /// Source species with stoichiometric counts, in written order
    pub sources: Vec<(SpeciesId, u32)>,
    /// Target species with stoichiometric counts, in written order
    pub targets: Vec<(SpeciesId, u32)>,
    /// Symbolic rate parameter (`k1`, `k2`, ... in declaration order)
    pub rate_symbol: String,
    /// Normalized reaction text; reversible reactions share it across
    /// their forward and backward edges
    pub text: String,
    /// True for the backward half of a reversible reaction
    pub backward: bool,
}

impl ReactionEdge {
    /// Total reactant stoichiometry (the reaction's kinetic order)
    pub fn reactant_order(&self) -> u32 {
        self.sources.iter().map(|(_, count)| count).sum()
    }

    /// Reactant stoichiometry as a dense row of the given width
    pub fn source_row(&self, width: usize) -> Vec<u32> {
        let mut row = vec![0u32; width];
        for (id, count) in &self.sources {
            row[id.index()] += count;
        }
        row
    }

    /// Net state change per firing as a dense row of the given width
    pub fn delta_row(&self, width: usize) -> Vec<i64> {
        let mut row = vec![0i64; width];
        for (id, count) in &self.sources {
            row[id.index()] -= i64::from(*count);
        }
        for (id, count) in &self.targets {
            row[id.index()] += i64::from(*count);
        }
        row
    }
}

/// An immutable reaction network
///
/// Construct with [`ReactionNetwork::from_reactions`] or via
/// [`NetworkBuilder`]; once built, the network is frozen and may be shared
/// read-only by concurrent simulation runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionNetwork {
    species: Vec<Species>,
    edges: Vec<ReactionEdge>,
    index: BTreeMap<String, usize>,
    ignored: BTreeSet<usize>,
}

impl ReactionNetwork {
    /// Start building a network by hand
    pub fn builder() -> NetworkBuilder {
        NetworkBuilder::new()
    }

    /// Build a network from abstract reaction notation, one reaction per line
    pub fn from_reactions<I, S>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = NetworkBuilder::new();
        for line in lines {
            builder = builder.reaction(line.as_ref())?;
        }
        builder.build()
    }

    /// All species in declaration order
    pub fn species(&self) -> &[Species] {
        &self.species
    }

    /// All reaction edges in declaration order
    pub fn edges(&self) -> &[ReactionEdge] {
        &self.edges
    }

    /// Number of species (trajectory width)
    pub fn species_count(&self) -> usize {
        self.species.len()
    }

    /// Number of reaction channels (reversible reactions count as two)
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Species symbols in declaration order
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.species.iter().map(|s| s.symbol.as_str())
    }

    /// Display symbol for a species ID
    pub fn symbol(&self, id: SpeciesId) -> &str {
        &self.species[id.index()].symbol
    }

    /// Column index of a species symbol, if declared
    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.index.get(symbol).copied()
    }

    /// Column indices of ignored (held-constant) species
    pub fn ignored(&self) -> &BTreeSet<usize> {
        &self.ignored
    }

    /// Number of ignored species
    pub fn ignored_count(&self) -> usize {
        self.ignored.len()
    }

    /// Number of actively simulated species
    pub fn active_count(&self) -> usize {
        self.species_count() - self.ignored_count()
    }

    /// Whether the species at `column` is held constant
    pub fn is_ignored(&self, column: usize) -> bool {
        self.ignored.contains(&column)
    }

    /// Mark species as unchanging: excluded from active simulation but
    /// still present in every model and trajectory for context.
    ///
    /// Requesting every species leaves the network untouched with a
    /// warning, since a network with nothing to simulate is useless.
    pub fn unchanging_species(mut self, symbols: &[&str]) -> Result<Self> {
        if symbols.len() >= self.species_count() {
            log::warn!(
                "ignored species count {} would cover all {} species; ignoring request",
                symbols.len(),
                self.species_count()
            );
            return Ok(self);
        }
        for symbol in symbols {
            let column = self
                .index_of(symbol)
                .ok_or_else(|| CoreError::unknown_species(*symbol))?;
            self.ignored.insert(column);
        }
        Ok(self)
    }

    /// Symbolic rate parameters (`k1`..`kn`) in edge declaration order
    pub fn rate_symbols(&self) -> impl Iterator<Item = &str> {
        self.edges.iter().map(|e| e.rate_symbol.as_str())
    }
}

/// Builder for [`ReactionNetwork`]
///
/// Species are interned in first-mention order; edge ids and `k{n}` rate
/// symbols follow reaction declaration order, with a reversible reaction
/// claiming two consecutive edges.
#[derive(Debug, Default)]
pub struct NetworkBuilder {
    species: Vec<Species>,
    index: BTreeMap<String, usize>,
    edges: Vec<ReactionEdge>,
}

impl NetworkBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a species up front (useful to pin column order)
    pub fn species(mut self, symbol: &str) -> Result<Self> {
        if self.index.contains_key(symbol) {
            return Err(CoreError::duplicate_species(symbol));
        }
        self.intern(symbol);
        Ok(self)
    }

    /// Add a reaction from abstract notation
    pub fn reaction(mut self, line: &str) -> Result<Self> {
        let parsed = parse_reaction(line)?;
        let sources = self.intern_side(&parsed.sources);
        let targets = self.intern_side(&parsed.targets);
        self.push_edge(sources.clone(), targets.clone(), parsed.text.clone(), false);
        if parsed.reversible {
            self.push_edge(targets, sources, parsed.text, true);
        }
        Ok(self)
    }

    /// Freeze the builder into an immutable network
    pub fn build(self) -> Result<ReactionNetwork> {
        if self.species.is_empty() {
            return Err(CoreError::empty_network("no species declared"));
        }
        if self.edges.is_empty() {
            return Err(CoreError::empty_network("no reactions declared"));
        }
        Ok(ReactionNetwork {
            species: self.species,
            edges: self.edges,
            index: self.index,
            ignored: BTreeSet::new(),
        })
    }

    fn intern(&mut self, symbol: &str) -> SpeciesId {
        if let Some(&idx) = self.index.get(symbol) {
            return self.species[idx].id;
        }
        let id = SpeciesId::new(self.species.len() as u32);
        self.index.insert(symbol.to_string(), id.index());
        self.species.push(Species {
            id,
            symbol: symbol.to_string(),
        });
        id
    }

    fn intern_side(&mut self, terms: &SideTerms) -> Vec<(SpeciesId, u32)> {
        terms
            .iter()
            .map(|(symbol, count)| (self.intern(symbol), *count))
            .collect()
    }

    fn push_edge(
        &mut self,
        sources: Vec<(SpeciesId, u32)>,
        targets: Vec<(SpeciesId, u32)>,
        text: String,
        backward: bool,
    ) {
        let id = EdgeId::new(self.edges.len() as u32);
        // Rate symbol indices start at 1 by mathematical convention
        let rate_symbol = format!("k{}", id.raw() + 1);
        self.edges.push(ReactionEdge {
            id,
            sources,
            targets,
            rate_symbol,
            text,
            backward,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foxes() -> ReactionNetwork {
        ReactionNetwork::from_reactions(["R -> 2 R", "R + F -> 2 F", "F -> D"])
            .unwrap()
            .unchanging_species(&["D"])
            .unwrap()
    }

    #[test]
    fn test_declaration_order_is_column_order() {
        let net = foxes();
        let symbols: Vec<_> = net.symbols().collect();
        assert_eq!(symbols, vec!["R", "F", "D"]);
        assert_eq!(net.index_of("R"), Some(0));
        assert_eq!(net.index_of("F"), Some(1));
        assert_eq!(net.index_of("D"), Some(2));
        assert_eq!(net.index_of("X"), None);
    }

    #[test]
    fn test_rate_symbols_in_edge_order() {
        let net = foxes();
        let rates: Vec<_> = net.rate_symbols().collect();
        assert_eq!(rates, vec!["k1", "k2", "k3"]);
    }

    #[test]
    fn test_reversible_counts_as_two_edges() {
        let net = ReactionNetwork::from_reactions(["A <=> B"]).unwrap();
        assert_eq!(net.edge_count(), 2);
        assert_eq!(net.edges()[0].text, net.edges()[1].text);
        assert!(!net.edges()[0].backward);
        assert!(net.edges()[1].backward);
        assert_eq!(net.edges()[1].sources[0].0, net.edges()[0].targets[0].0);
    }

    #[test]
    fn test_ignored_indices() {
        let net = foxes();
        assert!(net.is_ignored(2));
        assert!(!net.is_ignored(0));
        assert_eq!(net.ignored_count(), 1);
        assert_eq!(net.active_count(), 2);
    }

    #[test]
    fn test_unchanging_unknown_symbol_fails() {
        let net = ReactionNetwork::from_reactions(["A -> B"]).unwrap();
        assert!(net.unchanging_species(&["Q"]).is_err());
    }

    #[test]
    fn test_unchanging_all_species_warns_and_keeps() {
        let net = ReactionNetwork::from_reactions(["A -> B"]).unwrap();
        let net = net.unchanging_species(&["A", "B"]).unwrap();
        assert_eq!(net.ignored_count(), 0);
    }

    #[test]
    fn test_stoichiometry_rows() {
        let net = foxes();
        let hunt = &net.edges()[1]; // R + F -> 2 F
        assert_eq!(hunt.reactant_order(), 2);
        assert_eq!(hunt.source_row(3), vec![1, 1, 0]);
        assert_eq!(hunt.delta_row(3), vec![-1, 1, 0]);
    }

    #[test]
    fn test_empty_network_rejected() {
        assert!(NetworkBuilder::new().build().is_err());
        let only_species = NetworkBuilder::new().species("A").unwrap();
        assert!(only_species.build().is_err());
    }

    #[test]
    fn test_duplicate_species_rejected() {
        let b = NetworkBuilder::new().species("A").unwrap();
        assert!(b.species("A").is_err());
    }
}
