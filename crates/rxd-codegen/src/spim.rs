//! Process-calculus model generator (SPiM `.spi` source)
//!
//! Emits, in order: a sampling/plot directive block, one rate declaration
//! per distinct rate id (a decay channel becomes a named `val`, a
//! communication channel a rate-annotated `new chan`), a mutually recursive
//! `let`/`and` definition per species, and a single top-level `run`
//! composition carrying the initial population of each simulated species.
//!
//! Channel direction is fixed by the edge's shape during decomposition,
//! never chosen here. A rate id already rendered is never re-declared, even
//! when several channels reference it.

use std::collections::BTreeSet;
use std::fmt::Write;

use rxd_core::{decompose_channels, Channel, ReactionNetwork, SpeciesId};

use crate::error::Result;
use crate::rates::RateTable;
use crate::{as_population, fmt_float};

/// Render a SPiM model.
///
/// `initial` is the full-width initial amounts in species declaration
/// order; amounts must be whole populations. `end` and `samples` form the
/// sampling directive; `precision` fixes the decimal precision of every
/// numeric literal.
pub fn generate_model(
    network: &ReactionNetwork,
    rates: &RateTable,
    initial: &[f64],
    end: f64,
    samples: u32,
    precision: usize,
) -> Result<String> {
    let channels = decompose_channels(network)?;
    let populations = populations(network, initial)?;

    let mut out = String::new();
    preamble(&mut out, network, end, samples, precision);
    out.push('\n');
    rate_declarations(&mut out, network, rates, &channels, precision);
    out.push('\n');
    automata(&mut out, network, &channels);
    out.push_str("\n\n");
    run_block(&mut out, network, &populations);
    Ok(out)
}

fn populations(network: &ReactionNetwork, initial: &[f64]) -> Result<Vec<u64>> {
    network
        .species()
        .iter()
        .map(|s| as_population(&s.symbol, initial[s.id.index()]))
        .collect()
}

fn preamble(out: &mut String, network: &ReactionNetwork, end: f64, samples: u32, precision: usize) {
    let _ = writeln!(out, "directive sample {} {}", fmt_float(end, precision), samples);

    // Only simulated species are plotted; SPiM omits unplotted species
    // from its result table entirely.
    let plotted: Vec<String> = network
        .species()
        .iter()
        .filter(|s| !network.is_ignored(s.id.index()))
        .map(|s| format!("{}()", s.symbol))
        .collect();
    let _ = writeln!(out, "directive plot {}", plotted.join("; "));
}

fn rate_declarations(
    out: &mut String,
    network: &ReactionNetwork,
    rates: &RateTable,
    channels: &std::collections::BTreeMap<SpeciesId, Vec<Channel>>,
    precision: usize,
) {
    let mut declared: BTreeSet<usize> = BTreeSet::new();
    for species in network.species() {
        let Some(owned) = channels.get(&species.id) else {
            continue;
        };
        for channel in owned {
            if !declared.insert(channel.rate_id) {
                continue;
            }
            let rate = rates.rate(network.edges()[channel.rate_id].id);
            if channel.is_decay() {
                let _ = writeln!(out, "val r{} = {}", channel.rate_id, fmt_float(rate, precision));
            } else {
                let _ = writeln!(
                    out,
                    "new chan{}@{} : chan()",
                    channel.rate_id,
                    fmt_float(rate, precision)
                );
            }
        }
    }
}

fn automata(
    out: &mut String,
    network: &ReactionNetwork,
    channels: &std::collections::BTreeMap<SpeciesId, Vec<Channel>>,
) {
    out.push_str("let ");
    let count = network.species_count();
    for (index, species) in network.species().iter().enumerate() {
        let _ = write!(out, "{}() = ", species.symbol);
        match channels.get(&species.id).map(Vec::as_slice) {
            None | Some([]) => out.push_str("()"),
            Some([only]) => write_channel(out, network, only),
            Some(many) => {
                out.push_str("do ");
                for (ci, channel) in many.iter().enumerate() {
                    write_channel(out, network, channel);
                    if ci < many.len() - 1 {
                        out.push_str(" or ");
                    }
                }
            }
        }
        if index < count - 1 {
            out.push_str("\nand ");
        }
    }
}

fn write_channel(out: &mut String, network: &ReactionNetwork, channel: &Channel) {
    if channel.is_decay() {
        let _ = write!(out, "delay@r{}; ", channel.rate_id);
    } else if channel.is_input() {
        let _ = write!(out, "?chan{}; ", channel.rate_id);
    } else {
        let _ = write!(out, "!chan{}; ", channel.rate_id);
    }
    match channel.solutions.as_slice() {
        [] => out.push_str("()"),
        [only] => {
            let _ = write!(out, "{}()", network.symbol(*only));
        }
        many => {
            out.push_str("( ");
            for (index, id) in many.iter().enumerate() {
                let _ = write!(out, "{}()", network.symbol(*id));
                if index < many.len() - 1 {
                    out.push_str(" | ");
                }
            }
            out.push_str(" )");
        }
    }
}

fn run_block(out: &mut String, network: &ReactionNetwork, populations: &[u64]) {
    let parts: Vec<String> = network
        .species()
        .iter()
        .filter(|s| !network.is_ignored(s.id.index()))
        .map(|s| format!("{} of {}()", populations[s.id.index()], s.symbol))
        .collect();
    let _ = writeln!(out, "run ( {} )", parts.join(" | "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::RateMap;

    fn foxes() -> ReactionNetwork {
        ReactionNetwork::from_reactions(["R -> 2 R", "R + F -> 2 F", "F -> D"])
            .unwrap()
            .unchanging_species(&["D"])
            .unwrap()
    }

    fn foxes_rates(net: &ReactionNetwork) -> RateTable {
        RateTable::resolve(net, &RateMap::positional([0.7, 0.005, 0.5])).unwrap()
    }

    fn render(precision: usize) -> String {
        let net = foxes();
        let rates = foxes_rates(&net);
        generate_model(&net, &rates, &[250.0, 250.0, 0.0], 100.0, 1000, precision).unwrap()
    }

    #[test]
    fn test_preamble_directives() {
        let model = render(2);
        assert!(model.starts_with("directive sample 100.00 1000\n"));
        // Ignored species never appears in the plot directive
        let plot_line = model
            .lines()
            .find(|l| l.starts_with("directive plot"))
            .unwrap();
        assert_eq!(plot_line, "directive plot R(); F()");
    }

    #[test]
    fn test_rate_declarations_unique() {
        let model = render(2);
        assert!(model.contains("val r0 = 0.70"));
        assert!(model.contains("new chan1@0.01 : chan()"));
        assert!(model.contains("val r2 = 0.50"));
        // The communication channel is referenced by both halves but
        // declared exactly once.
        assert_eq!(model.matches("new chan1@").count(), 1);
    }

    #[test]
    fn test_automata_shapes() {
        let net = foxes();
        let rates = foxes_rates(&net);
        let model =
            generate_model(&net, &rates, &[250.0, 250.0, 0.0], 100.0, 1000, 2).unwrap();

        // R has two channels: its decay-like doubling and the hunt send
        assert!(model.contains("let R() = do delay@r0; ( R() | R() ) or !chan1; ( F() | F() )"));
        // F receives the hunt and decays to D
        assert!(model.contains("and F() = do ?chan1; () or delay@r2; D()"));
        // D has no outgoing channel: inert
        assert!(model.contains("and D() = ()"));
    }

    #[test]
    fn test_run_block_simulated_species_only() {
        let model = render(2);
        assert!(model.contains("run ( 250 of R() | 250 of F() )"));
    }

    #[test]
    fn test_non_integer_initial_rejected() {
        let net = foxes();
        let rates = foxes_rates(&net);
        let err =
            generate_model(&net, &rates, &[250.5, 250.0, 0.0], 100.0, 1000, 2).unwrap_err();
        assert!(matches!(
            err,
            crate::GenerationError::InvalidInitialValue { .. }
        ));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        assert_eq!(render(18), render(18));
    }
}
