//! Channel decomposition for the process-calculus backend
//!
//! A reaction edge becomes one or two guarded channels on its reactant
//! species. A unary reaction is a spontaneous `delay` on its reactant; a
//! binary reaction is a communication over a shared channel where the first
//! reactant sends (and continues as the products) and the second receives
//! (and terminates). Both channels of an edge share one rate id, so a rate
//! id may appear on several channels but is declared at most once.

use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::network::ReactionNetwork;
use crate::SpeciesId;

/// Direction of one channel, fixed by the reaction's shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Spontaneous unary reaction (`delay@r`)
    Decay,
    /// Receiving half of a communication (`?chan`)
    Input,
    /// Sending half of a communication (`!chan`)
    Output,
}

/// One guarded channel owned by a species
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Distinct rate id, shared by both halves of a communication
    pub rate_id: usize,
    /// Direction of this channel
    pub kind: ChannelKind,
    /// Species produced when this channel fires, with multiplicity
    pub solutions: Vec<SpeciesId>,
}

impl Channel {
    /// True for spontaneous (`delay`) channels
    pub fn is_decay(&self) -> bool {
        self.kind == ChannelKind::Decay
    }

    /// True for the receiving half of a communication
    pub fn is_input(&self) -> bool {
        self.kind == ChannelKind::Input
    }
}

/// Decompose every edge of a network into per-species channels.
///
/// The map is keyed by the owning species and each species' channels appear
/// in edge declaration order. Reactions of kinetic order above two cannot be
/// expressed in the calculus and are rejected.
pub fn decompose_channels(
    network: &ReactionNetwork,
) -> Result<BTreeMap<SpeciesId, Vec<Channel>>> {
    let mut channels: BTreeMap<SpeciesId, Vec<Channel>> = BTreeMap::new();

    for edge in network.edges() {
        let rate_id = edge.id.index();
        let solutions = expand_targets(edge.targets.iter().copied());

        match edge.reactant_order() {
            1 => {
                let (owner, _) = edge.sources[0];
                channels.entry(owner).or_default().push(Channel {
                    rate_id,
                    kind: ChannelKind::Decay,
                    solutions,
                });
            }
            2 if edge.sources.len() == 1 => {
                // Homo-dimerization: the species talks to itself, one copy
                // sending and continuing as the products, one receiving
                // and terminating.
                let (owner, _) = edge.sources[0];
                let entry = channels.entry(owner).or_default();
                entry.push(Channel {
                    rate_id,
                    kind: ChannelKind::Output,
                    solutions,
                });
                entry.push(Channel {
                    rate_id,
                    kind: ChannelKind::Input,
                    solutions: Vec::new(),
                });
            }
            2 => {
                let (sender, _) = edge.sources[0];
                let (receiver, _) = edge.sources[1];
                channels.entry(sender).or_default().push(Channel {
                    rate_id,
                    kind: ChannelKind::Output,
                    solutions,
                });
                channels.entry(receiver).or_default().push(Channel {
                    rate_id,
                    kind: ChannelKind::Input,
                    solutions: Vec::new(),
                });
            }
            order => {
                return Err(CoreError::unsupported_reaction(
                    &edge.text,
                    format!("kinetic order {} exceeds pairwise communication", order),
                ));
            }
        }
    }

    Ok(channels)
}

fn expand_targets(targets: impl Iterator<Item = (SpeciesId, u32)>) -> Vec<SpeciesId> {
    let mut solutions = Vec::new();
    for (id, count) in targets {
        for _ in 0..count {
            solutions.push(id);
        }
    }
    solutions
}
