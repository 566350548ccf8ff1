//! Simulation backends for reaction networks.
//!
//! This crate hosts the runtime half of the toolkit: the plugin protocol
//! that every backend speaks, the concrete backends themselves, and the
//! unified output model their trajectories are normalized into.
//!
//! Backends fall into two camps. The ODE and embedded stochastic backends
//! run in-process; the SPiM and StochKit2 backends render a model file
//! with `rxd-codegen`, hand it to an external executable under a scratch
//! directory, and parse the result table the tool leaves behind.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rxd_core::ReactionNetwork;
//! use rxd_codegen::RateMap;
//! use rxd_runtime::{
//!     InitialAmounts, OdeMethod, OdePlugin, RunRequest, SimulationRange,
//!     SimulatorPlugin,
//! };
//!
//! # fn main() -> rxd_runtime::Result<()> {
//! let network = Arc::new(ReactionNetwork::from_reactions(&[
//!     "R -> 2 R",
//!     "R + F -> 2 F",
//!     "F -> D",
//! ])?);
//!
//! let mut rates = RateMap::new();
//! rates.set("k1", 0.7);
//! rates.set("k2", 0.2);
//! rates.set("k3", 0.4);
//!
//! let request = RunRequest::new(
//!     SimulationRange::continuous(0.0, 100.0, 0.1),
//!     InitialAmounts::named([("R", 120.0), ("F", 40.0), ("D", 0.0)]),
//!     rates,
//! );
//!
//! let mut plugin = OdePlugin::new(network, OdeMethod::Fehlberg45);
//! let output = plugin.run(&request)?;
//! println!("{} samples", output.len());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod embedded;
pub mod error;
pub mod gillespie;
pub mod ode;
pub mod output;
pub mod plugin;
mod proc;
pub mod registry;
pub mod spim;
pub mod stochkit;
pub mod table;

pub use embedded::{EmbeddedEngine, EmbeddedPlugin, StochasticMethod, Trajectory};
pub use error::{Result, RuntimeError};
pub use gillespie::GillespieEngine;
pub use ode::{MassActionRhs, OdeMethod, OdePlugin, OdeStepper};
pub use output::{
    PlotArgs, PlotRequest, RunStatus, SaveHandle, SaveOptions, SimulationOutput,
    TrajectoryPlotter,
};
pub use plugin::{InitialAmounts, MatchStrategy, RunRequest, SimulationRange, SimulatorPlugin};
pub use registry::{Backend, BackendRegistry};
pub use spim::{SpimConfig, SpimPlugin};
pub use stochkit::{StochKitConfig, StochKitMethod, StochKitPlugin};
