//! System inspection command

use clap::Args;
use std::path::PathBuf;
use tracing::info;

use crate::error::CliResult;
use crate::project::SystemFile;

/// Summarize a reaction system description
#[derive(Args, Debug)]
pub struct InspectCommand {
    /// System description file (TOML)
    pub system: PathBuf,

    /// List every reaction edge with its rate symbol
    #[arg(short, long)]
    pub detailed: bool,

    /// Emit the summary as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

impl InspectCommand {
    pub fn execute(self) -> CliResult<()> {
        let system = SystemFile::load(&self.system)?;
        let network = system.network()?;

        if self.json {
            let summary = serde_json::json!({
                "species": network.symbols().collect::<Vec<_>>(),
                "edges": network
                    .edges()
                    .iter()
                    .map(|e| serde_json::json!({
                        "text": e.text,
                        "rate": e.rate_symbol,
                    }))
                    .collect::<Vec<_>>(),
                "unchanging": network
                    .symbols()
                    .enumerate()
                    .filter(|&(i, _)| network.is_ignored(i))
                    .map(|(_, s)| s)
                    .collect::<Vec<_>>(),
                "rate_parameters": system.rate_map().parameter_count(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            return Ok(());
        }

        info!("System: {}", self.system.display());
        println!(
            "{} species, {} reaction edges, {} held constant",
            network.species_count(),
            network.edge_count(),
            network.ignored_count()
        );

        let symbols: Vec<&str> = network.symbols().collect();
        println!("species: {}", symbols.join(", "));
        if network.ignored_count() > 0 {
            let pinned: Vec<&str> = symbols
                .iter()
                .enumerate()
                .filter(|&(i, _)| network.is_ignored(i))
                .map(|(_, s)| *s)
                .collect();
            println!("unchanging: {}", pinned.join(", "));
        }

        if self.detailed {
            for edge in network.edges() {
                println!("  {}  [{}]", edge.text, edge.rate_symbol);
            }
        }

        let bound = system.rate_map().parameter_count();
        if bound != network.edge_count() {
            println!(
                "warning: {} rate parameters bound for {} edges",
                bound,
                network.edge_count()
            );
        }
        Ok(())
    }
}
