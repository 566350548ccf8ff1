//! Built-in Gillespie engine for the embedded backend
//!
//! Implements the direct SSA and a fixed-step tau-leaping variant over
//! integer populations. Propensities follow the same mass-action form as
//! the ODE right-hand side; drain terms appear as zero-order influx and
//! first-order efflux pseudo-reactions. Ignored species contribute to
//! propensities but their populations never change.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rxd_core::{DrainTable, ReactionNetwork};
use rxd_codegen::RateTable;

use crate::embedded::{EmbeddedEngine, StochasticMethod, Trajectory};
use crate::error::{Result, RuntimeError};

const DEFAULT_MAX_STEPS: usize = 1_000_000;
const DEFAULT_LEAP_COUNT: u32 = 1_000;

#[derive(Debug, Clone, Default)]
struct CompiledModel {
    source_rows: Vec<Vec<u32>>,
    delta_rows: Vec<Vec<i64>>,
    rates: Vec<f64>,
    ignored: Vec<bool>,
}

impl CompiledModel {
    fn width(&self) -> usize {
        self.ignored.len()
    }

    /// Propensity of reaction `j` at population `y`
    fn propensity(&self, j: usize, y: &[f64]) -> f64 {
        let mut a = self.rates[j];
        for (column, &order) in self.source_rows[j].iter().enumerate() {
            if order > 0 {
                a *= y[column].powi(order as i32);
            }
        }
        a
    }

    fn apply(&self, j: usize, y: &mut [f64], count: f64) {
        for (column, &delta) in self.delta_rows[j].iter().enumerate() {
            if delta != 0 && !self.ignored[column] {
                y[column] = (y[column] + delta as f64 * count).max(0.0);
            }
        }
    }
}

/// In-process stochastic simulation engine.
///
/// Seedable for reproducible trajectories; runs abort with a warning
/// once the step guard is hit so a runaway network cannot spin forever.
pub struct GillespieEngine {
    model: CompiledModel,
    method: StochasticMethod,
    end: f64,
    max_steps: usize,
    leap_count: u32,
    rng: StdRng,
}

impl GillespieEngine {
    /// Engine seeded from OS entropy
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Engine with a fixed seed, for reproducible trajectories
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            model: CompiledModel::default(),
            method: StochasticMethod::Direct,
            end: 0.0,
            max_steps: DEFAULT_MAX_STEPS,
            leap_count: DEFAULT_LEAP_COUNT,
            rng,
        }
    }

    /// Cap the number of reaction events per run
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Number of leaps a tau-leaping run divides the time span into
    pub fn with_leap_count(mut self, leap_count: u32) -> Self {
        self.leap_count = leap_count.max(1);
        self
    }

    fn direct(&mut self, initial: &[f64]) -> Trajectory {
        let mut y = initial.to_vec();
        let mut t = 0.0;
        let mut independent = vec![t];
        let mut dependent = vec![y.clone()];

        for step in 0usize.. {
            if step >= self.max_steps {
                log::warn!(
                    "gillespie run hit the {}-step guard at t={}, stopping early",
                    self.max_steps,
                    t
                );
                break;
            }

            let propensities: Vec<f64> =
                (0..self.model.rates.len()).map(|j| self.model.propensity(j, &y)).collect();
            let total: f64 = propensities.iter().sum();
            if total <= 0.0 {
                // Nothing can fire any more; the state is absorbing.
                break;
            }

            let u1: f64 = self.rng.gen_range(f64::MIN_POSITIVE..1.0);
            t += -u1.ln() / total;
            if t > self.end {
                break;
            }

            let mut pick = self.rng.gen_range(0.0..total);
            let mut chosen = propensities.len() - 1;
            for (j, &a) in propensities.iter().enumerate() {
                if pick < a {
                    chosen = j;
                    break;
                }
                pick -= a;
            }

            self.model.apply(chosen, &mut y, 1.0);
            independent.push(t);
            dependent.push(y.clone());
        }

        Trajectory {
            independent,
            dependent,
        }
    }

    fn tau_leaping(&mut self, initial: &[f64]) -> Trajectory {
        let tau = self.end / f64::from(self.leap_count);
        let mut y = initial.to_vec();
        let mut independent = vec![0.0];
        let mut dependent = vec![y.clone()];

        for leap in 1..=self.leap_count {
            let counts: Vec<f64> = (0..self.model.rates.len())
                .map(|j| {
                    let mean = self.model.propensity(j, &y) * tau;
                    self.sample_poisson(mean)
                })
                .collect();
            for (j, &count) in counts.iter().enumerate() {
                if count > 0.0 {
                    self.model.apply(j, &mut y, count);
                }
            }
            independent.push(f64::from(leap) * tau);
            dependent.push(y.clone());
        }

        Trajectory {
            independent,
            dependent,
        }
    }

    fn sample_poisson(&mut self, mean: f64) -> f64 {
        if mean <= 0.0 {
            return 0.0;
        }
        if mean > 30.0 {
            // Normal approximation for large means.
            let u1: f64 = self.rng.gen_range(f64::MIN_POSITIVE..1.0);
            let u2: f64 = self.rng.gen::<f64>();
            let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
            return (mean + mean.sqrt() * z).round().max(0.0);
        }
        // Knuth's multiplication method.
        let threshold = (-mean).exp();
        let mut k = 0.0;
        let mut product = 1.0;
        loop {
            product *= self.rng.gen::<f64>();
            if product <= threshold {
                return k;
            }
            k += 1.0;
        }
    }
}

impl EmbeddedEngine for GillespieEngine {
    fn load(
        &mut self,
        network: &ReactionNetwork,
        rates: &RateTable,
        drains: &DrainTable,
    ) -> Result<()> {
        let width = network.species_count();
        let mut source_rows: Vec<Vec<u32>> = network
            .edges()
            .iter()
            .map(|edge| edge.source_row(width))
            .collect();
        let mut delta_rows: Vec<Vec<i64>> = network
            .edges()
            .iter()
            .map(|edge| edge.delta_row(width))
            .collect();
        let mut rate_values = rates.as_slice().to_vec();

        // Drains become pseudo-reactions alongside the real edges.
        for (symbol, term) in drains.iter() {
            let index = match network.index_of(symbol) {
                Some(index) => index,
                None => {
                    log::warn!("drain term names unknown species '{}', skipping", symbol);
                    continue;
                }
            };
            if term.influx > 0.0 {
                let mut delta = vec![0i64; width];
                delta[index] = 1;
                source_rows.push(vec![0; width]);
                delta_rows.push(delta);
                rate_values.push(term.influx);
            }
            if term.efflux > 0.0 {
                let mut source = vec![0u32; width];
                source[index] = 1;
                let mut delta = vec![0i64; width];
                delta[index] = -1;
                source_rows.push(source);
                delta_rows.push(delta);
                rate_values.push(term.efflux);
            }
        }

        self.model = CompiledModel {
            source_rows,
            delta_rows,
            rates: rate_values,
            ignored: (0..width).map(|i| network.is_ignored(i)).collect(),
        };
        Ok(())
    }

    fn set_method(&mut self, method: StochasticMethod) {
        self.method = method;
    }

    fn set_end_time(&mut self, end: f64) {
        self.end = end;
    }

    fn execute(&mut self, initial: &[f64]) -> Result<Trajectory> {
        if self.model.width() == 0 {
            return Err(RuntimeError::validation("engine has no model loaded"));
        }
        if initial.len() != self.model.width() {
            return Err(RuntimeError::validation(format!(
                "initial state has {} entries, model has {} species",
                initial.len(),
                self.model.width()
            )));
        }
        if initial.iter().any(|v| *v < 0.0 || v.fract() != 0.0) {
            return Err(RuntimeError::validation(
                "stochastic simulation needs non-negative integer populations",
            ));
        }

        let trajectory = match self.method {
            StochasticMethod::Direct => self.direct(initial),
            StochasticMethod::TauLeaping => self.tau_leaping(initial),
        };
        log::debug!(
            "gillespie {} produced {} samples",
            self.method.name(),
            trajectory.independent.len()
        );
        Ok(trajectory)
    }
}
