//! Embedded stochastic backend
//!
//! Unlike the subprocess backends, an embedded engine runs inside the
//! process and speaks a small protocol: load the network, pick a method,
//! set the end time, execute. [`EmbeddedPlugin`] adapts any
//! [`EmbeddedEngine`] to the common plugin protocol; the built-in engine
//! is [`GillespieEngine`](crate::gillespie::GillespieEngine).

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rxd_core::{DrainTable, ReactionNetwork};
use rxd_codegen::RateTable;

use crate::error::Result;
use crate::output::SimulationOutput;
use crate::plugin::{validate_request, BusyGuard, RunRequest, SimulatorPlugin};
use crate::registry::Backend;

/// Sampling method an embedded engine simulates with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StochasticMethod {
    /// Exact SSA (direct method)
    #[default]
    Direct,
    /// Approximate tau-leaping
    TauLeaping,
}

impl StochasticMethod {
    /// Stable lowercase name used in logs and output metadata
    pub fn name(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::TauLeaping => "tau-leaping",
        }
    }
}

/// Raw trajectory produced by an embedded engine
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    /// Time points, one per sample
    pub independent: Vec<f64>,
    /// Species amounts, one full-width row per sample
    pub dependent: Vec<Vec<f64>>,
}

/// Protocol between the embedded plugin and an in-process engine
pub trait EmbeddedEngine: Send {
    /// Compile the network and rates into the engine's internal form
    fn load(
        &mut self,
        network: &ReactionNetwork,
        rates: &RateTable,
        drains: &DrainTable,
    ) -> Result<()>;

    /// Select the sampling method for subsequent runs
    fn set_method(&mut self, method: StochasticMethod);

    /// Set the simulated end time for subsequent runs
    fn set_end_time(&mut self, end: f64);

    /// Simulate one realization starting from `initial`
    fn execute(&mut self, initial: &[f64]) -> Result<Trajectory>;
}

/// Adapts an [`EmbeddedEngine`] to the common plugin protocol
pub struct EmbeddedPlugin<E: EmbeddedEngine> {
    network: Arc<ReactionNetwork>,
    engine: E,
    method: StochasticMethod,
    busy: AtomicBool,
}

impl<E: EmbeddedEngine> EmbeddedPlugin<E> {
    /// Plugin for `network` driving `engine` with the direct method
    pub fn new(network: Arc<ReactionNetwork>, engine: E) -> Self {
        Self {
            network,
            engine,
            method: StochasticMethod::Direct,
            busy: AtomicBool::new(false),
        }
    }

    /// Select the sampling method
    pub fn with_method(mut self, method: StochasticMethod) -> Self {
        self.method = method;
        self
    }
}

impl<E: EmbeddedEngine> SimulatorPlugin for EmbeddedPlugin<E> {
    fn backend(&self) -> Backend {
        Backend::Embedded
    }

    fn run(&mut self, request: &RunRequest) -> Result<SimulationOutput> {
        let _guard = BusyGuard::acquire(&self.busy, Backend::Embedded)?;
        let y0 = validate_request(&self.network, request)?;
        let rates = RateTable::resolve(&self.network, &request.rates)?;

        self.engine.load(&self.network, &rates, &request.drains)?;
        self.engine.set_method(self.method);
        self.engine.set_end_time(request.range.end());

        let symbols: Vec<String> = self.network.symbols().map(str::to_string).collect();
        let method = Some(self.method.name().to_string());

        match self.engine.execute(&y0) {
            Ok(trajectory) => Ok(SimulationOutput::completed(
                Backend::Embedded,
                method,
                request.range,
                symbols,
                trajectory.independent,
                trajectory.dependent,
                self.network.ignored().clone(),
            )),
            Err(error) if error.is_captured() => {
                log::warn!("embedded engine failed: {}", error);
                Ok(SimulationOutput::failed(
                    Backend::Embedded,
                    method,
                    request.range,
                    symbols,
                    Vec::new(),
                    Vec::new(),
                    Default::default(),
                    vec![error],
                ))
            }
            Err(error) => Err(error),
        }
    }
}
