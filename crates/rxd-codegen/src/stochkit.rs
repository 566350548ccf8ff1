//! Structured stochastic model generator (StochKit2 XML)
//!
//! Emits the parameter list, the reaction list with stoichiometric
//! reactant/product references and a mass-action propensity (rate times the
//! product over reactants of `species^stoichiometry`), the species list
//! with integer initial populations, and one synthetic pseudo-reaction per
//! configured drain term.

use std::fmt::Write;

use rxd_core::{DrainTable, ReactionNetwork};

use crate::error::Result;
use crate::rates::RateTable;
use crate::{as_population, fmt_float};

/// Render a StochKit2 XML model.
pub fn generate_model(
    network: &ReactionNetwork,
    rates: &RateTable,
    initial: &[f64],
    drains: &DrainTable,
    precision: usize,
) -> Result<String> {
    let populations: Vec<u64> = network
        .species()
        .iter()
        .map(|s| as_population(&s.symbol, initial[s.id.index()]))
        .collect::<Result<_>>()?;

    let drain_reactions = drain_count(network, drains);
    let mut out = String::new();

    out.push_str("<Model>\n");
    let _ = writeln!(out, "  <Description>{}</Description>", "rxd generated model");
    let _ = writeln!(
        out,
        "  <NumberOfReactions>{}</NumberOfReactions>",
        network.edge_count() + drain_reactions
    );
    let _ = writeln!(
        out,
        "  <NumberOfSpecies>{}</NumberOfSpecies>",
        network.species_count()
    );

    parameters_list(&mut out, network, rates, precision);
    reactions_list(&mut out, network, drains, precision);
    species_list(&mut out, network, &populations);

    out.push_str("</Model>\n");
    Ok(out)
}

fn drain_count(network: &ReactionNetwork, drains: &DrainTable) -> usize {
    network
        .symbols()
        .filter_map(|sym| drains.get(sym))
        .map(|term| usize::from(term.influx != 0.0) + usize::from(term.efflux != 0.0))
        .sum()
}

fn parameters_list(
    out: &mut String,
    network: &ReactionNetwork,
    rates: &RateTable,
    precision: usize,
) {
    out.push_str("  <ParametersList>\n");
    for edge in network.edges() {
        out.push_str("    <Parameter>\n");
        let _ = writeln!(out, "      <Id>{}</Id>", edge.rate_symbol);
        let _ = writeln!(
            out,
            "      <Expression>{}</Expression>",
            fmt_float(rates.rate(edge.id), precision)
        );
        out.push_str("    </Parameter>\n");
    }
    out.push_str("  </ParametersList>\n");
}

fn reactions_list(
    out: &mut String,
    network: &ReactionNetwork,
    drains: &DrainTable,
    precision: usize,
) {
    out.push_str("  <ReactionsList>\n");
    for edge in network.edges() {
        out.push_str("    <Reaction>\n");
        let _ = writeln!(out, "      <Id>R{}</Id>", edge.id.raw() + 1);
        out.push_str("      <Type>customized</Type>\n");
        let _ = writeln!(
            out,
            "      <PropensityFunction>{}</PropensityFunction>",
            propensity(network, edge)
        );
        side(out, "Reactants", network, &edge.sources);
        side(out, "Products", network, &edge.targets);
        out.push_str("    </Reaction>\n");
    }
    drain_reactions(out, network, drains, precision);
    out.push_str("  </ReactionsList>\n");
}

/// Mass-action propensity: rate symbol times each reactant repeated by
/// its stoichiometry.
fn propensity(network: &ReactionNetwork, edge: &rxd_core::ReactionEdge) -> String {
    let mut factors = vec![edge.rate_symbol.clone()];
    for (id, count) in &edge.sources {
        for _ in 0..*count {
            factors.push(network.symbol(*id).to_string());
        }
    }
    factors.join("*")
}

fn side(out: &mut String, tag: &str, network: &ReactionNetwork, terms: &[(rxd_core::SpeciesId, u32)]) {
    if terms.is_empty() {
        let _ = writeln!(out, "      <{tag}/>");
        return;
    }
    let _ = writeln!(out, "      <{tag}>");
    for (id, count) in terms {
        let _ = writeln!(
            out,
            "        <SpeciesReference id=\"{}\" stoichiometry=\"{}\"/>",
            network.symbol(*id),
            count
        );
    }
    let _ = writeln!(out, "      </{tag}>");
}

fn drain_reactions(
    out: &mut String,
    network: &ReactionNetwork,
    drains: &DrainTable,
    precision: usize,
) {
    for species in network.species() {
        let Some(term) = drains.get(&species.symbol) else {
            continue;
        };
        if term.influx != 0.0 {
            out.push_str("    <Reaction>\n");
            let _ = writeln!(out, "      <Id>{}_in</Id>", species.symbol);
            out.push_str("      <Type>customized</Type>\n");
            let _ = writeln!(
                out,
                "      <PropensityFunction>{}</PropensityFunction>",
                fmt_float(term.influx, precision)
            );
            out.push_str("      <Reactants/>\n");
            side(out, "Products", network, &[(species.id, 1)]);
            out.push_str("    </Reaction>\n");
        }
        if term.efflux != 0.0 {
            out.push_str("    <Reaction>\n");
            let _ = writeln!(out, "      <Id>{}_out</Id>", species.symbol);
            out.push_str("      <Type>customized</Type>\n");
            let _ = writeln!(
                out,
                "      <PropensityFunction>{}*{}</PropensityFunction>",
                fmt_float(term.efflux, precision),
                species.symbol
            );
            side(out, "Reactants", network, &[(species.id, 1)]);
            out.push_str("      <Products/>\n");
            out.push_str("    </Reaction>\n");
        }
    }
}

fn species_list(out: &mut String, network: &ReactionNetwork, populations: &[u64]) {
    out.push_str("  <SpeciesList>\n");
    for species in network.species() {
        out.push_str("    <Species>\n");
        let _ = writeln!(out, "      <Id>{}</Id>", species.symbol);
        let _ = writeln!(
            out,
            "      <InitialPopulation>{}</InitialPopulation>",
            populations[species.id.index()]
        );
        out.push_str("    </Species>\n");
    }
    out.push_str("  </SpeciesList>\n");
}
