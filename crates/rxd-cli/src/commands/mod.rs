//! CLI command implementations for rxd

use clap::{Parser, Subcommand};

use crate::error::CliResult;

pub mod inspect;
pub mod render;
pub mod run;

/// rxd - reaction network simulation toolkit
#[derive(Parser, Debug)]
#[command(
    name = "rxd",
    version,
    about = "Simulate reaction networks with pluggable backends",
    long_about = "rxd builds reaction networks from plain-text reaction lines, renders \
                  them as SPiM, StochKit2, or PSC models, and runs them through \
                  deterministic and stochastic simulation backends."
)]
pub struct RxdCli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize a reaction system description
    Inspect(inspect::InspectCommand),

    /// Render a backend model file without running it
    Render(render::RenderCommand),

    /// Run a simulation and export the trajectory
    Run(run::RunCommand),
}

impl RxdCli {
    /// Dispatch the selected command
    pub fn execute(self) -> CliResult<()> {
        match self.command {
            Commands::Inspect(cmd) => cmd.execute(),
            Commands::Render(cmd) => cmd.execute(),
            Commands::Run(cmd) => cmd.execute(),
        }
    }
}
