//! Deterministic ODE backend
//!
//! The network's mass-action kinetics are compiled into a
//! [`MassActionRhs`] and integrated in-process. Two sampling disciplines
//! exist: fixed-step methods are driven across the uniform grid of a
//! continuous range, while adaptive methods pick their own step sizes
//! and report every accepted step up to the end time.
//!
//! The [`OdeStepper`] trait is the seam for alternative integrators;
//! [`RungeKutta4`] and [`Fehlberg45`] are the built-in implementations.

use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rxd_core::{DrainTable, ReactionNetwork};
use rxd_codegen::RateTable;

use crate::error::{Result, RuntimeError};
use crate::output::SimulationOutput;
use crate::plugin::{validate_request, BusyGuard, RunRequest, SimulationRange, SimulatorPlugin};
use crate::registry::Backend;

/// Built-in integration methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OdeMethod {
    /// Classic fourth-order Runge-Kutta on a fixed grid
    RungeKutta4,
    /// Runge-Kutta-Fehlberg 4(5) with adaptive step control
    #[default]
    Fehlberg45,
}

impl OdeMethod {
    /// Stable lowercase name used in logs and output metadata
    pub fn name(&self) -> &'static str {
        match self {
            Self::RungeKutta4 => "rk4",
            Self::Fehlberg45 => "rkf45",
        }
    }

    /// Whether this method picks its own step sizes
    pub fn is_adaptive(&self) -> bool {
        matches!(self, Self::Fehlberg45)
    }
}

/// Mass-action right-hand side compiled from a reaction network.
///
/// Each edge contributes `rate * prod(y_i ^ s_i)` over its sources, scaled
/// by the per-species stoichiometric change. Drain terms add a constant
/// influx and a first-order efflux per species. Derivatives of ignored
/// species are pinned to zero so their amounts stay constant.
#[derive(Debug, Clone)]
pub struct MassActionRhs {
    source_rows: Vec<Vec<u32>>,
    delta_rows: Vec<Vec<i64>>,
    rates: Vec<f64>,
    drains: Vec<(f64, f64)>,
    ignored: Vec<bool>,
}

impl MassActionRhs {
    /// Compile the right-hand side for a network.
    ///
    /// Drain terms naming species the network does not declare are
    /// skipped with a warning.
    pub fn new(network: &ReactionNetwork, rates: &RateTable, drains: &DrainTable) -> Self {
        let width = network.species_count();
        let mut drain_columns = vec![(0.0, 0.0); width];
        for (symbol, term) in drains.iter() {
            match network.index_of(symbol) {
                Some(index) => drain_columns[index] = (term.influx, term.efflux),
                None => log::warn!("drain term names unknown species '{}', skipping", symbol),
            }
        }
        Self {
            source_rows: network
                .edges()
                .iter()
                .map(|edge| edge.source_row(width))
                .collect(),
            delta_rows: network
                .edges()
                .iter()
                .map(|edge| edge.delta_row(width))
                .collect(),
            rates: rates.as_slice().to_vec(),
            drains: drain_columns,
            ignored: (0..width).map(|i| network.is_ignored(i)).collect(),
        }
    }

    /// Number of species columns
    pub fn dimension(&self) -> usize {
        self.ignored.len()
    }

    /// Evaluate `dy/dt` at state `y` into `dydt`
    pub fn eval(&self, y: &[f64], dydt: &mut [f64]) {
        dydt.fill(0.0);
        for (edge, sources) in self.source_rows.iter().enumerate() {
            let mut flux = self.rates[edge];
            for (column, &order) in sources.iter().enumerate() {
                if order > 0 {
                    flux *= y[column].powi(order as i32);
                }
            }
            for (column, &delta) in self.delta_rows[edge].iter().enumerate() {
                if delta != 0 {
                    dydt[column] += delta as f64 * flux;
                }
            }
        }
        for (column, &(influx, efflux)) in self.drains.iter().enumerate() {
            dydt[column] += influx - efflux * y[column];
        }
        for (column, &ignored) in self.ignored.iter().enumerate() {
            if ignored {
                dydt[column] = 0.0;
            }
        }
    }
}

/// One-step interface the ODE plugin drives.
///
/// Fixed-step methods are advanced to explicit target times via
/// [`advance_to`](OdeStepper::advance_to); adaptive methods take their own
/// steps toward a bound via [`step_toward`](OdeStepper::step_toward) and
/// are sampled after each accepted step.
pub trait OdeStepper: Send {
    /// Reset the stepper to state `y0` at time `t0`
    fn set_initial(&mut self, t0: f64, y0: &[f64]);

    /// Take a single step landing exactly on `target`
    fn advance_to(&mut self, target: f64);

    /// Take one internally-sized step, clamped to `bound`
    fn step_toward(&mut self, bound: f64);

    /// Whether every step so far produced finite state
    fn is_successful(&self) -> bool;

    /// Current time
    fn t(&self) -> f64;

    /// Current state
    fn y(&self) -> &[f64];
}

/// Classic fourth-order Runge-Kutta
pub struct RungeKutta4 {
    rhs: MassActionRhs,
    t: f64,
    y: Vec<f64>,
    ok: bool,
}

impl RungeKutta4 {
    /// Stepper over the given right-hand side
    pub fn new(rhs: MassActionRhs) -> Self {
        let width = rhs.dimension();
        Self {
            rhs,
            t: 0.0,
            y: vec![0.0; width],
            ok: true,
        }
    }

    fn rk4_step(&mut self, h: f64) {
        let n = self.y.len();
        let mut k1 = vec![0.0; n];
        let mut k2 = vec![0.0; n];
        let mut k3 = vec![0.0; n];
        let mut k4 = vec![0.0; n];
        let mut stage = vec![0.0; n];

        self.rhs.eval(&self.y, &mut k1);
        for i in 0..n {
            stage[i] = self.y[i] + 0.5 * h * k1[i];
        }
        self.rhs.eval(&stage, &mut k2);
        for i in 0..n {
            stage[i] = self.y[i] + 0.5 * h * k2[i];
        }
        self.rhs.eval(&stage, &mut k3);
        for i in 0..n {
            stage[i] = self.y[i] + h * k3[i];
        }
        self.rhs.eval(&stage, &mut k4);
        for i in 0..n {
            self.y[i] += h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
        }
        self.t += h;
        self.ok = self.y.iter().all(|v| v.is_finite());
    }
}

impl OdeStepper for RungeKutta4 {
    fn set_initial(&mut self, t0: f64, y0: &[f64]) {
        self.t = t0;
        self.y = y0.to_vec();
        self.ok = true;
    }

    fn advance_to(&mut self, target: f64) {
        let h = target - self.t;
        if h > 0.0 {
            self.rk4_step(h);
            self.t = target;
        }
    }

    fn step_toward(&mut self, bound: f64) {
        self.advance_to(bound);
    }

    fn is_successful(&self) -> bool {
        self.ok
    }

    fn t(&self) -> f64 {
        self.t
    }

    fn y(&self) -> &[f64] {
        &self.y
    }
}

/// Runge-Kutta-Fehlberg 4(5) with adaptive step-size control
pub struct Fehlberg45 {
    rhs: MassActionRhs,
    t: f64,
    y: Vec<f64>,
    h: f64,
    tolerance: f64,
    ok: bool,
}

/// Default local error tolerance for [`Fehlberg45`]
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

const MIN_STEP: f64 = 1e-12;

impl Fehlberg45 {
    /// Stepper over the given right-hand side with the default tolerance
    pub fn new(rhs: MassActionRhs) -> Self {
        Self::with_tolerance(rhs, DEFAULT_TOLERANCE)
    }

    /// Stepper with an explicit local error tolerance
    pub fn with_tolerance(rhs: MassActionRhs, tolerance: f64) -> Self {
        let width = rhs.dimension();
        Self {
            rhs,
            t: 0.0,
            y: vec![0.0; width],
            h: 1e-3,
            tolerance,
            ok: true,
        }
    }

    fn stages(&self, h: f64) -> [Vec<f64>; 6] {
        // Fehlberg coefficients, see Hairer/Norsett/Wanner table 5.1.
        let n = self.y.len();
        let mut k: [Vec<f64>; 6] = std::array::from_fn(|_| vec![0.0; n]);
        let mut stage = vec![0.0; n];

        self.rhs.eval(&self.y, &mut k[0]);

        for i in 0..n {
            stage[i] = self.y[i] + h * 0.25 * k[0][i];
        }
        self.rhs.eval(&stage, &mut k[1]);

        for i in 0..n {
            stage[i] = self.y[i] + h * (3.0 / 32.0 * k[0][i] + 9.0 / 32.0 * k[1][i]);
        }
        self.rhs.eval(&stage, &mut k[2]);

        for i in 0..n {
            stage[i] = self.y[i]
                + h * (1932.0 / 2197.0 * k[0][i] - 7200.0 / 2197.0 * k[1][i]
                    + 7296.0 / 2197.0 * k[2][i]);
        }
        self.rhs.eval(&stage, &mut k[3]);

        for i in 0..n {
            stage[i] = self.y[i]
                + h * (439.0 / 216.0 * k[0][i] - 8.0 * k[1][i] + 3680.0 / 513.0 * k[2][i]
                    - 845.0 / 4104.0 * k[3][i]);
        }
        self.rhs.eval(&stage, &mut k[4]);

        for i in 0..n {
            stage[i] = self.y[i]
                + h * (-8.0 / 27.0 * k[0][i] + 2.0 * k[1][i] - 3544.0 / 2565.0 * k[2][i]
                    + 1859.0 / 4104.0 * k[3][i]
                    - 11.0 / 40.0 * k[4][i]);
        }
        self.rhs.eval(&stage, &mut k[5]);

        k
    }

    fn try_step(&mut self, h: f64) -> f64 {
        let n = self.y.len();
        let k = self.stages(h);

        let mut error: f64 = 0.0;
        let mut next = vec![0.0; n];
        for i in 0..n {
            let fourth = self.y[i]
                + h * (25.0 / 216.0 * k[0][i] + 1408.0 / 2565.0 * k[2][i]
                    + 2197.0 / 4104.0 * k[3][i]
                    - 0.2 * k[4][i]);
            let fifth = self.y[i]
                + h * (16.0 / 135.0 * k[0][i] + 6656.0 / 12825.0 * k[2][i]
                    + 28561.0 / 56430.0 * k[3][i]
                    - 9.0 / 50.0 * k[4][i]
                    + 2.0 / 55.0 * k[5][i]);
            error = error.max((fifth - fourth).abs());
            next[i] = fifth;
        }

        if error <= self.tolerance || h <= MIN_STEP {
            self.y = next;
            self.t += h;
            self.ok = self.y.iter().all(|v| v.is_finite()) && self.t.is_finite();
        }
        error
    }
}

impl OdeStepper for Fehlberg45 {
    fn set_initial(&mut self, t0: f64, y0: &[f64]) {
        self.t = t0;
        self.y = y0.to_vec();
        self.h = 1e-3;
        self.ok = true;
    }

    fn advance_to(&mut self, target: f64) {
        // Used when an adaptive stepper is driven over a fixed grid.
        while self.ok && self.t < target {
            self.step_toward(target);
        }
    }

    fn step_toward(&mut self, bound: f64) {
        if !self.ok || self.t >= bound {
            return;
        }
        let before = self.t;
        loop {
            let h = self.h.min(bound - self.t).max(MIN_STEP);
            let error = self.try_step(h);

            if error > 0.0 {
                // Standard safety-factored step update, clamped to [0.1, 4].
                let scale = (0.9 * (self.tolerance / error).powf(0.2)).clamp(0.1, 4.0);
                self.h = (h * scale).max(MIN_STEP);
            } else {
                self.h = (h * 4.0).max(MIN_STEP);
            }

            if !self.ok || self.t > before {
                return;
            }
        }
    }

    fn is_successful(&self) -> bool {
        self.ok
    }

    fn t(&self) -> f64 {
        self.t
    }

    fn y(&self) -> &[f64] {
        &self.y
    }
}

/// In-process deterministic ODE backend
pub struct OdePlugin {
    network: Arc<ReactionNetwork>,
    method: OdeMethod,
    stepper: Option<Box<dyn OdeStepper>>,
    adaptive_override: Option<bool>,
    busy: AtomicBool,
}

impl OdePlugin {
    /// Plugin for `network` using a built-in method
    pub fn new(network: Arc<ReactionNetwork>, method: OdeMethod) -> Self {
        Self {
            network,
            method,
            stepper: None,
            adaptive_override: None,
            busy: AtomicBool::new(false),
        }
    }

    /// Inject an external stepper for the next run.
    ///
    /// The stepper is consumed by that run; `adaptive` selects the
    /// sampling discipline it is driven with.
    pub fn with_stepper(mut self, stepper: Box<dyn OdeStepper>, adaptive: bool) -> Self {
        self.stepper = Some(stepper);
        self.adaptive_override = Some(adaptive);
        self
    }

    fn build_stepper(
        slot: &mut Option<Box<dyn OdeStepper>>,
        adaptive_override: Option<bool>,
        method: OdeMethod,
        rhs: MassActionRhs,
    ) -> (Box<dyn OdeStepper>, bool) {
        if let Some(stepper) = slot.take() {
            let adaptive = adaptive_override.unwrap_or(false);
            return (stepper, adaptive);
        }
        match method {
            OdeMethod::RungeKutta4 => (Box::new(RungeKutta4::new(rhs)), false),
            OdeMethod::Fehlberg45 => (Box::new(Fehlberg45::new(rhs)), true),
        }
    }
}

impl SimulatorPlugin for OdePlugin {
    fn backend(&self) -> Backend {
        Backend::Ode
    }

    fn run(&mut self, request: &RunRequest) -> Result<SimulationOutput> {
        let _guard = BusyGuard::acquire(&self.busy, Backend::Ode)?;
        let y0 = validate_request(&self.network, request)?;
        let rates = RateTable::resolve(&self.network, &request.rates)?;

        let (start, end, delta) = match request.range {
            SimulationRange::Continuous { start, end, delta } => (start, end, Some(delta)),
            SimulationRange::Sampled { end, samples } => {
                // Sampled ranges map onto a uniform grid.
                (0.0, end, Some(end / f64::from(samples)))
            }
        };

        let rhs = MassActionRhs::new(&self.network, &rates, &request.drains);
        let (mut stepper, adaptive) = Self::build_stepper(
            &mut self.stepper,
            self.adaptive_override,
            self.method,
            rhs,
        );
        stepper.set_initial(start, &y0);

        let mut independent = vec![start];
        let mut dependent = vec![y0.clone()];

        if adaptive {
            while stepper.is_successful() && stepper.t() < end {
                stepper.step_toward(end);
                if stepper.is_successful() {
                    independent.push(stepper.t());
                    dependent.push(stepper.y().to_vec());
                }
            }
        } else {
            // delta is always Some for the fixed discipline
            let delta = delta.unwrap_or(end - start);
            let mut step = 1u64;
            while stepper.is_successful() && stepper.t() < end {
                let target = (start + step as f64 * delta).min(end);
                stepper.advance_to(target);
                if stepper.is_successful() {
                    independent.push(stepper.t());
                    dependent.push(stepper.y().to_vec());
                }
                step += 1;
            }
        }

        let symbols: Vec<String> = self.network.symbols().map(str::to_string).collect();
        let ignored: BTreeSet<usize> = self.network.ignored().clone();
        let method = Some(self.method.name().to_string());

        if stepper.is_successful() {
            Ok(SimulationOutput::completed(
                Backend::Ode,
                method,
                request.range,
                symbols,
                independent,
                dependent,
                ignored,
            ))
        } else {
            let error = RuntimeError::numerical(
                stepper.t(),
                "integration produced a non-finite state",
            );
            log::warn!("{}", error);
            Ok(SimulationOutput::failed(
                Backend::Ode,
                method,
                request.range,
                symbols,
                independent,
                dependent,
                ignored,
                vec![error],
            ))
        }
    }
}
