//! Simulation run command

use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use rxd_runtime::{
    Backend, EmbeddedPlugin, GillespieEngine, InitialAmounts, OdeMethod, OdePlugin,
    RunRequest, RunStatus, SaveOptions, SimulationRange, SimulatorPlugin, SpimConfig,
    SpimPlugin, StochKitConfig, StochKitMethod, StochKitPlugin, StochasticMethod,
};

use crate::error::{CliError, CliResult};
use crate::project::SystemFile;

/// Backend selector on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    /// In-process deterministic ODE integration
    Ode,
    /// SPiM subprocess interpreter
    Spim,
    /// StochKit2 subprocess simulator
    Stochkit2,
    /// In-process Gillespie engine
    Embedded,
}

impl BackendArg {
    fn backend(self) -> Backend {
        match self {
            Self::Ode => Backend::Ode,
            Self::Spim => Backend::Spim,
            Self::Stochkit2 => Backend::StochKit2,
            Self::Embedded => Backend::Embedded,
        }
    }
}

/// Run a simulation and export the trajectory
#[derive(Args, Debug)]
pub struct RunCommand {
    /// System description file (TOML)
    pub system: PathBuf,

    /// Simulation backend
    #[arg(short, long, value_enum)]
    pub backend: BackendArg,

    /// Backend-specific method (ode: rk4, rkf45; stochastic: direct, tau-leaping)
    #[arg(short, long)]
    pub method: Option<String>,

    /// Simulated end time
    #[arg(long, default_value_t = 100.0)]
    pub end: f64,

    /// Fixed step width (selects the continuous discipline)
    #[arg(long, conflicts_with = "samples")]
    pub delta: Option<f64>,

    /// Requested sample count (selects the sampled discipline)
    #[arg(long)]
    pub samples: Option<u32>,

    /// Write the trajectory here as TSV
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep ignored columns in the export, marked with an underscore
    #[arg(long)]
    pub unfiltered: bool,

    /// Wall-clock budget for subprocess backends, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Path to the SPiM interpreter
    #[arg(long, env = "RXD_SPIM")]
    pub spim: Option<PathBuf>,

    /// Root of the StochKit2 installation
    #[arg(long, env = "RXD_STOCHKIT")]
    pub stochkit: Option<PathBuf>,

    /// Seed for the embedded stochastic engine
    #[arg(long)]
    pub seed: Option<u64>,

    /// Match initial-amount keys to species by common prefix
    #[arg(long)]
    pub fuzzy: bool,
}

impl RunCommand {
    pub fn execute(self) -> CliResult<()> {
        let system = SystemFile::load(&self.system)?;
        let network = system.network()?;

        let range = match (self.delta, self.samples) {
            (Some(delta), _) => SimulationRange::continuous(0.0, self.end, delta),
            (None, Some(samples)) => SimulationRange::sampled(self.end, samples),
            (None, None) => SimulationRange::sampled(self.end, 1000),
        };

        let mut request = RunRequest::new(range, system.initial_amounts(), system.rate_map())
            .with_drains(system.drain_table());
        if self.fuzzy {
            request = request.with_fuzzy_matching();
        }
        if let InitialAmounts::Named(entries) = &request.initial {
            if entries.is_empty() {
                return Err(CliError::InvalidArgs(
                    "system file declares no initial amounts".to_string(),
                ));
            }
        }

        let mut plugin = self.build_plugin(network)?;
        info!("running {} over {:?}", plugin.backend(), range);
        let output = plugin.run(&request)?;

        match output.status() {
            RunStatus::Completed => {
                info!("{} samples over {} time units", output.len(), output.duration());
            }
            RunStatus::Failed | RunStatus::TimedOut => {
                for error in output.errors() {
                    warn!("{}", error);
                }
            }
        }

        if let Some(path) = &self.output {
            let options = SaveOptions {
                unfiltered: self.unfiltered,
                ..Default::default()
            };
            output.save(path, options).wait()?;
            info!("trajectory written to {}", path.display());
        }

        if output.status() != RunStatus::Completed {
            return Err(anyhow::anyhow!(
                "run did not complete ({} errors captured)",
                output.errors().len()
            )
            .into());
        }
        Ok(())
    }

    fn build_plugin(
        &self,
        network: std::sync::Arc<rxd_core::ReactionNetwork>,
    ) -> CliResult<Box<dyn SimulatorPlugin>> {
        let timeout = self.timeout_ms.map(Duration::from_millis);
        match self.backend.backend() {
            Backend::Ode => {
                let method = match self.method.as_deref() {
                    None | Some("rkf45") => OdeMethod::Fehlberg45,
                    Some("rk4") => OdeMethod::RungeKutta4,
                    Some(other) => {
                        return Err(CliError::InvalidArgs(format!(
                            "unknown ode method '{}'",
                            other
                        )))
                    }
                };
                Ok(Box::new(OdePlugin::new(network, method)))
            }
            Backend::Spim => {
                let interpreter = self.spim.clone().ok_or_else(|| {
                    CliError::InvalidArgs("--spim (or RXD_SPIM) is required".to_string())
                })?;
                let mut config = SpimConfig::new(interpreter);
                if let Some(timeout) = timeout {
                    config = config.with_timeout(timeout);
                }
                Ok(Box::new(SpimPlugin::new(network, config)))
            }
            Backend::StochKit2 => {
                let root = self.stochkit.clone().ok_or_else(|| {
                    CliError::InvalidArgs(
                        "--stochkit (or RXD_STOCHKIT) is required".to_string(),
                    )
                })?;
                let mut config = StochKitConfig::new(root);
                if let Some(timeout) = timeout {
                    config = config.with_timeout(timeout);
                }
                let method = match self.method.as_deref() {
                    None | Some("direct") | Some("ssa") => StochKitMethod::Direct,
                    Some("tau-leaping") => StochKitMethod::TauLeaping,
                    Some(other) => {
                        return Err(CliError::InvalidArgs(format!(
                            "unknown stochkit2 method '{}'",
                            other
                        )))
                    }
                };
                Ok(Box::new(StochKitPlugin::with_method(network, config, method)))
            }
            Backend::Embedded => {
                let engine = match self.seed {
                    Some(seed) => GillespieEngine::seeded(seed),
                    None => GillespieEngine::from_entropy(),
                };
                let method = match self.method.as_deref() {
                    None | Some("direct") => StochasticMethod::Direct,
                    Some("tau-leaping") => StochasticMethod::TauLeaping,
                    Some(other) => {
                        return Err(CliError::InvalidArgs(format!(
                            "unknown embedded method '{}'",
                            other
                        )))
                    }
                };
                Ok(Box::new(
                    EmbeddedPlugin::new(network, engine).with_method(method),
                ))
            }
        }
    }
}
