//! Rule-based text model generator (PSC format)
//!
//! Line-oriented sections, each terminated by a blank line: the fixed
//! (held-constant) species, one `rate law` block per reaction, synthetic
//! in/out reactions per drain term, a parameter block binding every rate
//! symbol to a numeric value, and the initial-condition block.
//!
//! This backend tolerates partially specified networks: a rate symbol the
//! user never bound is written as `0` instead of failing generation.

use std::fmt::Write;

use rxd_core::{DrainTable, ReactionNetwork};

use crate::error::Result;
use crate::rates::{RateMap, RateTable};

/// Render a PSC model.
///
/// Unlike the other generators this one takes the raw [`RateMap`]: missing
/// parameters default to zero, which is this engine's documented tolerance.
pub fn generate_model(
    network: &ReactionNetwork,
    rates: &RateMap,
    initial: &[f64],
    drains: &DrainTable,
) -> Result<String> {
    let table = RateTable::resolve_lenient(network, rates)?;

    let mut out = String::new();
    fixed_species(&mut out, network);
    reactions(&mut out, network);
    drain_reactions(&mut out, network, drains);
    parameter_block(&mut out, network, &table);
    initial_conditions(&mut out, network, initial);
    Ok(out)
}

fn fixed_species(out: &mut String, network: &ReactionNetwork) {
    if network.ignored().is_empty() {
        return;
    }
    let fixed: Vec<&str> = network
        .species()
        .iter()
        .filter(|s| network.is_ignored(s.id.index()))
        .map(|s| s.symbol.as_str())
        .collect();
    let _ = writeln!(out, "FIX: {}", fixed.join(" "));
    out.push('\n');
}

fn reactions(out: &mut String, network: &ReactionNetwork) {
    for edge in network.edges() {
        let _ = writeln!(out, "R{}:", edge.id.raw() + 1);
        let _ = writeln!(out, "    {} > {}", side(network, &edge.sources), side(network, &edge.targets));
        let _ = writeln!(out, "    {}", rate_law(network, edge));
        out.push('\n');
    }
}

fn side(network: &ReactionNetwork, terms: &[(rxd_core::SpeciesId, u32)]) -> String {
    terms
        .iter()
        .map(|(id, count)| {
            let symbol = network.symbol(*id);
            if *count == 1 {
                symbol.to_string()
            } else {
                format!("{} {}", count, symbol)
            }
        })
        .collect::<Vec<_>>()
        .join(" + ")
}

fn rate_law(network: &ReactionNetwork, edge: &rxd_core::ReactionEdge) -> String {
    let mut factors = vec![edge.rate_symbol.clone()];
    for (id, count) in &edge.sources {
        for _ in 0..*count {
            factors.push(network.symbol(*id).to_string());
        }
    }
    factors.join("*")
}

fn drain_reactions(out: &mut String, network: &ReactionNetwork, drains: &DrainTable) {
    for species in network.species() {
        let Some(term) = drains.get(&species.symbol) else {
            continue;
        };
        if term.influx != 0.0 {
            let _ = writeln!(out, "{}_in:", species.symbol);
            let _ = writeln!(out, "    $pool > {}", species.symbol);
            let _ = writeln!(out, "    {}", term.influx);
            out.push('\n');
        }
        if term.efflux != 0.0 {
            let _ = writeln!(out, "{}_out:", species.symbol);
            let _ = writeln!(out, "    {} > $pool", species.symbol);
            let _ = writeln!(out, "    {}*{}", term.efflux, species.symbol);
            out.push('\n');
        }
    }
}

fn parameter_block(out: &mut String, network: &ReactionNetwork, table: &RateTable) {
    for (edge, rate) in network.edges().iter().zip(table.as_slice()) {
        let _ = writeln!(out, "{} = {}", edge.rate_symbol, rate);
    }
    out.push('\n');
}

fn initial_conditions(out: &mut String, network: &ReactionNetwork, initial: &[f64]) {
    for species in network.species() {
        let _ = writeln!(out, "{} = {}", species.symbol, initial[species.id.index()]);
    }
}
