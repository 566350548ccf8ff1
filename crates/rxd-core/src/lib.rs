//! Reaction-network model for the rxd simulation framework
//!
//! A reaction network is a hypergraph: vertices are chemical species and
//! edges are reactions, each carrying a multiset of source and target
//! species and a symbolic rate parameter. Networks are built once, frozen,
//! and then shared read-only by any number of simulation runs.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod drain;
pub mod error;
pub mod network;
pub mod parse;

pub use channel::{decompose_channels, Channel, ChannelKind};
pub use drain::{DrainTable, DrainTerm};
pub use error::{CoreError, Result};
pub use network::{NetworkBuilder, ReactionEdge, ReactionNetwork, Species};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Species identifier (a vertex of the reaction hypergraph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeciesId(pub u32);

impl SpeciesId {
    /// Create a new species ID
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Column index of this species in trajectory data
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Reaction-edge identifier (a hyperedge of the reaction hypergraph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeId(pub u32);

impl EdgeId {
    /// Create a new edge ID
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Position of this edge in declaration order
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}
