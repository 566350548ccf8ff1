//! Property tests over the model generators: rendering is deterministic,
//! and rate declarations are emitted exactly once per distinct rate id.

use proptest::prelude::*;

use rxd_codegen::{psc, spim, RateMap, RateTable};
use rxd_core::{DrainTable, ReactionNetwork};

const SYMBOLS: [&str; 6] = ["A", "B", "C", "D", "E", "F"];

/// A random reaction over the symbol pool, restricted to the unary and
/// binary shapes every backend supports.
fn reaction_line() -> impl Strategy<Value = String> {
    let unary = (0usize..6, 0usize..6, 1u32..3)
        .prop_map(|(s, t, n)| format!("{} -> {} {}", SYMBOLS[s], n, SYMBOLS[t]));
    let binary = (0usize..6, 0usize..6, 0usize..6)
        .prop_filter("distinct reactants", |(a, b, _)| a != b)
        .prop_map(|(a, b, t)| format!("{} + {} -> {}", SYMBOLS[a], SYMBOLS[b], SYMBOLS[t]));
    prop_oneof![unary, binary]
}

fn network_lines() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(reaction_line(), 1..8)
}

fn render_spim(lines: &[String]) -> String {
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let net = ReactionNetwork::from_reactions(refs).unwrap();
    let rates = RateMap::positional((0..net.edge_count()).map(|i| 0.1 * (i + 1) as f64));
    let table = RateTable::resolve(&net, &rates).unwrap();
    let initial = vec![10.0; net.species_count()];
    spim::generate_model(&net, &table, &initial, 50.0, 100, 6).unwrap()
}

proptest! {
    #[test]
    fn spim_rendering_is_deterministic(lines in network_lines()) {
        prop_assert_eq!(render_spim(&lines), render_spim(&lines));
    }

    #[test]
    fn spim_declares_each_rate_id_exactly_once(lines in network_lines()) {
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let net = ReactionNetwork::from_reactions(refs).unwrap();
        let model = render_spim(&lines);

        for edge in net.edges() {
            let id = edge.id.index();
            let declarations = model.matches(&format!("val r{} = ", id)).count()
                + model.matches(&format!("new chan{}@", id)).count();
            prop_assert_eq!(
                declarations, 1,
                "rate id {} declared {} times in:\n{}", id, declarations, model
            );
        }
    }

    #[test]
    fn psc_binds_every_rate_symbol_once(lines in network_lines()) {
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let net = ReactionNetwork::from_reactions(refs).unwrap();
        let initial = vec![10.0; net.species_count()];
        let model =
            psc::generate_model(&net, &RateMap::new(), &initial, &DrainTable::new()).unwrap();

        for edge in net.edges() {
            let line = format!("{} = ", edge.rate_symbol);
            prop_assert_eq!(model.matches(&line).count(), 1);
        }
    }
}
