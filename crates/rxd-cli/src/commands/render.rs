//! Model rendering command

use clap::{Args, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use rxd_codegen::{RateTable, DEFAULT_FLOAT_PRECISION};
use rxd_runtime::MatchStrategy;

use crate::error::{CliError, CliResult};
use crate::project::SystemFile;

/// Textual model formats the generators can emit
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// SPiM stochastic pi-calculus program
    Spim,
    /// StochKit2 XML model
    Stochkit2,
    /// PSC line format
    Psc,
}

/// Render a backend model file without running it
#[derive(Args, Debug)]
pub struct RenderCommand {
    /// System description file (TOML)
    pub system: PathBuf,

    /// Target model format
    #[arg(short, long, value_enum)]
    pub format: ModelFormat,

    /// Write the model here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Simulated end time (SPiM directives only)
    #[arg(long, default_value_t = 100.0)]
    pub end: f64,

    /// Sample count (SPiM directives only)
    #[arg(long, default_value_t = 1000)]
    pub samples: u32,

    /// Decimal digits for rendered floats
    #[arg(long, default_value_t = DEFAULT_FLOAT_PRECISION)]
    pub precision: usize,

    /// Match initial-amount keys to species by common prefix
    #[arg(long)]
    pub fuzzy: bool,
}

impl RenderCommand {
    pub fn execute(self) -> CliResult<()> {
        let system = SystemFile::load(&self.system)?;
        let network = system.network()?;
        let rates = system.rate_map();
        let strategy = if self.fuzzy {
            MatchStrategy::FuzzyPrefix
        } else {
            MatchStrategy::Exact
        };
        let initial = system
            .initial_amounts()
            .normalize(&network, strategy)
            .map_err(|e| CliError::InvalidArgs(e.to_string()))?;

        let model = match self.format {
            ModelFormat::Spim => {
                let table = RateTable::resolve(&network, &rates)?;
                rxd_codegen::spim::generate_model(
                    &network,
                    &table,
                    &initial,
                    self.end,
                    self.samples,
                    self.precision,
                )?
            }
            ModelFormat::Stochkit2 => {
                let table = RateTable::resolve(&network, &rates)?;
                rxd_codegen::stochkit::generate_model(
                    &network,
                    &table,
                    &initial,
                    &system.drain_table(),
                    self.precision,
                )?
            }
            ModelFormat::Psc => rxd_codegen::psc::generate_model(
                &network,
                &rates,
                &initial,
                &system.drain_table(),
            )?,
        };

        match self.output {
            Some(path) => {
                std::fs::write(&path, model)?;
                info!("model written to {}", path.display());
            }
            None => print!("{}", model),
        }
        Ok(())
    }
}
