//! Common plugin protocol shared by every simulation backend
//!
//! A backend is anything implementing [`SimulatorPlugin`]: it owns a
//! reaction network, receives a [`RunRequest`], and produces a
//! [`SimulationOutput`](crate::SimulationOutput). Request validation is
//! centralized here so that all backends reject a bad range, a mismatched
//! initial-condition set, or an incomplete rate map with the same errors.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use rxd_core::ReactionNetwork;
use rxd_codegen::RateMap;

use crate::error::{Result, RuntimeError};
use crate::output::SimulationOutput;
use crate::registry::Backend;

/// Time span over which a trajectory is simulated.
///
/// The two variants mirror the two sampling disciplines backends use:
/// fixed-step integration walks a uniform grid, while subprocess and
/// event-driven backends are told an end time and how many samples to
/// report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimulationRange {
    /// Uniform grid from `start` to `end` with spacing `delta`
    Continuous {
        /// Inclusive start time
        start: f64,
        /// Inclusive end time
        end: f64,
        /// Step width, must be positive
        delta: f64,
    },
    /// End time plus a requested number of reported samples
    Sampled {
        /// Inclusive end time
        end: f64,
        /// Number of samples the backend should report
        samples: u32,
    },
}

impl SimulationRange {
    /// Continuous range from `start` to `end` with step `delta`
    pub fn continuous(start: f64, end: f64, delta: f64) -> Self {
        Self::Continuous { start, end, delta }
    }

    /// Sampled range ending at `end` with `samples` reported points
    pub fn sampled(end: f64, samples: u32) -> Self {
        Self::Sampled { end, samples }
    }

    /// End of the simulated span
    pub fn end(&self) -> f64 {
        match *self {
            Self::Continuous { end, .. } | Self::Sampled { end, .. } => end,
        }
    }

    /// Start of the simulated span (zero for sampled ranges)
    pub fn start(&self) -> f64 {
        match *self {
            Self::Continuous { start, .. } => start,
            Self::Sampled { .. } => 0.0,
        }
    }

    /// End time and sample count, if this is a sampled range
    pub fn as_sampled(&self) -> Option<(f64, u32)> {
        match *self {
            Self::Sampled { end, samples } => Some((end, samples)),
            Self::Continuous { .. } => None,
        }
    }

    /// Reject inverted, degenerate, or non-finite ranges
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Continuous { start, end, delta } => {
                if !start.is_finite() || !end.is_finite() || !delta.is_finite() {
                    return Err(RuntimeError::validation("simulation range must be finite"));
                }
                if end <= start {
                    return Err(RuntimeError::validation(format!(
                        "simulation range end {} must exceed start {}",
                        end, start
                    )));
                }
                if delta <= 0.0 {
                    return Err(RuntimeError::validation(format!(
                        "step width must be positive, got {}",
                        delta
                    )));
                }
                Ok(())
            }
            Self::Sampled { end, samples } => {
                if !end.is_finite() || end <= 0.0 {
                    return Err(RuntimeError::validation(format!(
                        "simulation end time must be positive and finite, got {}",
                        end
                    )));
                }
                if samples == 0 {
                    return Err(RuntimeError::validation("sample count must be nonzero"));
                }
                Ok(())
            }
        }
    }
}

/// How initial-condition keys are matched against species symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStrategy {
    /// Keys must equal a species symbol exactly
    #[default]
    Exact,
    /// After exact matching fails, a key may claim every species whose
    /// symbol starts with it
    FuzzyPrefix,
}

/// Initial amounts for a run, either keyed by symbol or positional
#[derive(Debug, Clone, PartialEq)]
pub enum InitialAmounts {
    /// Amounts keyed by species symbol
    Named(BTreeMap<String, f64>),
    /// Amounts in species declaration order
    Positional(Vec<f64>),
}

impl InitialAmounts {
    /// Build named amounts from `(symbol, amount)` pairs
    pub fn named<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, f64)>,
    {
        Self::Named(
            entries
                .into_iter()
                .map(|(key, amount)| (key.into(), amount))
                .collect(),
        )
    }

    /// Build positional amounts in species declaration order
    pub fn positional(amounts: impl IntoIterator<Item = f64>) -> Self {
        Self::Positional(amounts.into_iter().collect())
    }

    /// Resolve the amounts into one value per species, declaration order.
    ///
    /// Named amounts must cover every non-ignored species; entries for
    /// ignored species are optional and default to zero. Positional
    /// amounts must either span the full species list or exactly the
    /// non-ignored species, again in declaration order.
    pub fn normalize(
        &self,
        network: &ReactionNetwork,
        strategy: MatchStrategy,
    ) -> Result<Vec<f64>> {
        match self {
            Self::Named(entries) => normalize_named(network, entries, strategy),
            Self::Positional(amounts) => normalize_positional(network, amounts),
        }
    }
}

fn normalize_named(
    network: &ReactionNetwork,
    entries: &BTreeMap<String, f64>,
    strategy: MatchStrategy,
) -> Result<Vec<f64>> {
    let width = network.species_count();
    let mut values = vec![0.0; width];
    let mut filled = vec![false; width];

    for (key, &amount) in entries {
        if let Some(index) = network.index_of(key) {
            if filled[index] {
                return Err(RuntimeError::validation(format!(
                    "initial amount for '{}' given more than once",
                    key
                )));
            }
            values[index] = amount;
            filled[index] = true;
            continue;
        }

        if strategy == MatchStrategy::FuzzyPrefix {
            let mut claimed = false;
            for (index, symbol) in network.symbols().enumerate() {
                if !filled[index] && symbol.starts_with(key.as_str()) {
                    log::debug!(
                        "initial amount key '{}' matched species '{}' by prefix",
                        key,
                        symbol
                    );
                    values[index] = amount;
                    filled[index] = true;
                    claimed = true;
                }
            }
            if claimed {
                continue;
            }
        }

        return Err(RuntimeError::validation(format!(
            "initial amount refers to unknown species '{}'",
            key
        )));
    }

    let missing: Vec<&str> = network
        .symbols()
        .enumerate()
        .filter(|&(index, _)| !filled[index] && !network.is_ignored(index))
        .map(|(_, symbol)| symbol)
        .collect();
    if !missing.is_empty() {
        return Err(RuntimeError::validation(format!(
            "missing initial amounts for species: {}",
            missing.join(", ")
        )));
    }

    Ok(values)
}

fn normalize_positional(network: &ReactionNetwork, amounts: &[f64]) -> Result<Vec<f64>> {
    let width = network.species_count();
    let active = network.active_count();

    if amounts.len() == width {
        return Ok(amounts.to_vec());
    }
    if amounts.len() == active {
        let mut values = vec![0.0; width];
        let mut supplied = amounts.iter();
        for (index, value) in values.iter_mut().enumerate() {
            if !network.is_ignored(index) {
                // active == number of non-ignored columns, so this never runs dry
                if let Some(&amount) = supplied.next() {
                    *value = amount;
                }
            }
        }
        return Ok(values);
    }

    let detail = if amounts.len() < active {
        "too few"
    } else {
        "too many"
    };
    Err(RuntimeError::validation(format!(
        "{} initial amounts: got {}, expected {} (all species) or {} (non-ignored only)",
        detail,
        amounts.len(),
        width,
        active
    )))
}

/// Everything a backend needs for one run
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Simulated time span and sampling discipline
    pub range: SimulationRange,
    /// Initial amounts per species
    pub initial: InitialAmounts,
    /// Rate parameters, keyed by symbol or reaction text
    pub rates: RateMap,
    /// Influx and efflux terms for open networks
    pub drains: rxd_core::DrainTable,
    /// How named initial-amount keys match species symbols
    pub matching: MatchStrategy,
}

impl RunRequest {
    /// Request over `range` with the given amounts and rates, no drains,
    /// exact symbol matching
    pub fn new(range: SimulationRange, initial: InitialAmounts, rates: RateMap) -> Self {
        Self {
            range,
            initial,
            rates,
            drains: rxd_core::DrainTable::new(),
            matching: MatchStrategy::Exact,
        }
    }

    /// Attach drain terms for open networks
    pub fn with_drains(mut self, drains: rxd_core::DrainTable) -> Self {
        self.drains = drains;
        self
    }

    /// Use fuzzy prefix matching for named initial amounts
    pub fn with_fuzzy_matching(mut self) -> Self {
        self.matching = MatchStrategy::FuzzyPrefix;
        self
    }
}

/// A simulation backend.
///
/// Implementations validate the request, run the simulation, and
/// normalize whatever the backend produced into a
/// [`SimulationOutput`](crate::SimulationOutput). Failures of the
/// simulation itself are captured into the output's error list; only
/// pre-flight and parse failures surface as `Err`.
pub trait SimulatorPlugin {
    /// Which backend this plugin drives
    fn backend(&self) -> Backend;

    /// Execute one simulation run
    fn run(&mut self, request: &RunRequest) -> Result<SimulationOutput>;
}

/// Validate the request against the network and resolve initial amounts.
///
/// Checks the range, the initial-amount coverage, and that the rate map
/// binds exactly as many parameters as the network has reaction edges.
pub(crate) fn validate_request(
    network: &ReactionNetwork,
    request: &RunRequest,
) -> Result<Vec<f64>> {
    request.range.validate()?;

    let expected = network.edge_count();
    let supplied = request.rates.parameter_count();
    if supplied != expected {
        return Err(RuntimeError::validation(format!(
            "rate map binds {} parameters but the network has {} reaction edges",
            supplied, expected
        )));
    }

    request.initial.normalize(network, request.matching)
}

/// Single-run guard flipped for the duration of a plugin's `run`.
///
/// Released on drop, including on early `?` returns.
pub(crate) struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool, backend: Backend) -> Result<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            return Err(RuntimeError::Busy {
                backend: backend.name(),
            });
        }
        Ok(Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foxes() -> ReactionNetwork {
        ReactionNetwork::from_reactions(&["R -> 2 R", "R + F -> 2 F", "F -> D"])
            .and_then(|n| n.unchanging_species(&["D"]))
            .expect("valid network")
    }

    #[test]
    fn test_range_validation() {
        assert!(SimulationRange::continuous(0.0, 10.0, 0.1).validate().is_ok());
        assert!(SimulationRange::continuous(10.0, 0.0, 0.1).validate().is_err());
        assert!(SimulationRange::continuous(0.0, 10.0, 0.0).validate().is_err());
        assert!(SimulationRange::continuous(0.0, f64::NAN, 0.1)
            .validate()
            .is_err());
        assert!(SimulationRange::sampled(10.0, 100).validate().is_ok());
        assert!(SimulationRange::sampled(10.0, 0).validate().is_err());
        assert!(SimulationRange::sampled(-1.0, 100).validate().is_err());
    }

    #[test]
    fn test_named_amounts_exact() {
        let network = foxes();
        let initial = InitialAmounts::named([("R", 120.0), ("F", 40.0), ("D", 0.0)]);
        let values = initial
            .normalize(&network, MatchStrategy::Exact)
            .expect("normalizes");
        assert_eq!(values, vec![120.0, 40.0, 0.0]);
    }

    #[test]
    fn test_named_amounts_ignored_optional() {
        let network = foxes();
        // D is ignored, so omitting it is fine and it defaults to zero.
        let initial = InitialAmounts::named([("R", 120.0), ("F", 40.0)]);
        let values = initial
            .normalize(&network, MatchStrategy::Exact)
            .expect("normalizes");
        assert_eq!(values, vec![120.0, 40.0, 0.0]);
    }

    #[test]
    fn test_named_amounts_missing_active_species() {
        let network = foxes();
        let initial = InitialAmounts::named([("R", 120.0)]);
        let err = initial
            .normalize(&network, MatchStrategy::Exact)
            .expect_err("F is required");
        assert!(err.to_string().contains('F'));
    }

    #[test]
    fn test_named_amounts_unknown_symbol() {
        let network = foxes();
        let initial = InitialAmounts::named([("R", 120.0), ("F", 40.0), ("X", 1.0)]);
        assert!(initial.normalize(&network, MatchStrategy::Exact).is_err());
    }

    #[test]
    fn test_fuzzy_prefix_matching() {
        let network = ReactionNetwork::from_reactions(&["Rabbit + Fox -> 2 Fox"])
            .expect("valid network");
        let initial = InitialAmounts::named([("Rab", 120.0), ("Fox", 40.0)]);
        assert!(initial.normalize(&network, MatchStrategy::Exact).is_err());
        let values = initial
            .normalize(&network, MatchStrategy::FuzzyPrefix)
            .expect("prefix match resolves");
        assert_eq!(values, vec![120.0, 40.0]);
    }

    #[test]
    fn test_positional_full_width() {
        let network = foxes();
        let values = InitialAmounts::positional([120.0, 40.0, 5.0])
            .normalize(&network, MatchStrategy::Exact)
            .expect("full width accepted");
        assert_eq!(values, vec![120.0, 40.0, 5.0]);
    }

    #[test]
    fn test_positional_active_width_pads_ignored() {
        let network = foxes();
        let values = InitialAmounts::positional([120.0, 40.0])
            .normalize(&network, MatchStrategy::Exact)
            .expect("active width accepted");
        assert_eq!(values, vec![120.0, 40.0, 0.0]);
    }

    #[test]
    fn test_positional_wrong_width() {
        let network = foxes();
        let one = InitialAmounts::positional([120.0]);
        let err = one
            .normalize(&network, MatchStrategy::Exact)
            .expect_err("too few");
        assert!(err.to_string().contains("too few"));

        let four = InitialAmounts::positional([1.0, 2.0, 3.0, 4.0]);
        let err = four
            .normalize(&network, MatchStrategy::Exact)
            .expect_err("too many");
        assert!(err.to_string().contains("too many"));
    }

    #[test]
    fn test_rate_parameter_count_checked() {
        let network = foxes();
        let mut rates = RateMap::new();
        rates.set("k1", 0.7);
        rates.set("k2", 0.2);
        let request = RunRequest::new(
            SimulationRange::continuous(0.0, 10.0, 0.1),
            InitialAmounts::positional([120.0, 40.0, 0.0]),
            rates,
        );
        let err = validate_request(&network, &request).expect_err("k3 missing");
        assert!(matches!(err, RuntimeError::Validation { .. }));
    }

    #[test]
    fn test_busy_guard_excludes_second_run() {
        let flag = AtomicBool::new(false);
        let guard = BusyGuard::acquire(&flag, Backend::Ode).expect("first acquire");
        assert!(matches!(
            BusyGuard::acquire(&flag, Backend::Ode),
            Err(RuntimeError::Busy { .. })
        ));
        drop(guard);
        assert!(BusyGuard::acquire(&flag, Backend::Ode).is_ok());
    }
}
