//! StochKit2 subprocess backend
//!
//! Renders the network as a StochKit2 XML model, invokes one of the
//! batch drivers (`ssa` or `tau_leaping`) under a scratch directory, and
//! reads back the single trajectory the driver writes. Runs are executed
//! with one realization and without ensemble statistics, matching the
//! one-trajectory output model.

use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use rxd_core::ReactionNetwork;
use rxd_codegen::{RateTable, DEFAULT_FLOAT_PRECISION};

use crate::error::{Result, RuntimeError};
use crate::output::SimulationOutput;
use crate::plugin::{validate_request, BusyGuard, RunRequest, SimulatorPlugin};
use crate::proc::{run_with_deadline, Outcome};
use crate::registry::Backend;
use crate::table::{parse_table, Delimiter};

const MODEL_FILE: &str = "model.xml";
const OUTPUT_DIR: &str = "model_output";

/// StochKit2 solver driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StochKitMethod {
    /// Exact SSA (direct method)
    #[default]
    Direct,
    /// Approximate tau-leaping
    TauLeaping,
}

impl StochKitMethod {
    /// Name of the driver executable inside the StochKit2 tree
    pub fn driver(&self) -> &'static str {
        match self {
            Self::Direct => "ssa",
            Self::TauLeaping => "tau_leaping",
        }
    }
}

/// Where the StochKit2 tree lives and how runs are bounded
#[derive(Debug, Clone)]
pub struct StochKitConfig {
    /// Root of the StochKit2 installation; drivers live directly below it
    pub root: PathBuf,
    /// Wall-clock budget; the driver is killed when it passes
    pub timeout: Option<Duration>,
    /// Tau-leaping error bound, forwarded as `--epsilon`
    pub epsilon: f64,
    /// Reactions-per-leap threshold, forwarded as `--threshold`
    pub threshold: u32,
    /// Decimal digits used when rendering the model
    pub float_precision: usize,
}

impl StochKitConfig {
    /// Configuration for a StochKit2 tree at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            timeout: None,
            epsilon: 0.03,
            threshold: 10,
            float_precision: DEFAULT_FLOAT_PRECISION,
        }
    }

    /// Kill the driver after `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// StochKit2 batch simulator backend
pub struct StochKitPlugin {
    network: Arc<ReactionNetwork>,
    config: StochKitConfig,
    method: StochKitMethod,
    busy: AtomicBool,
}

impl StochKitPlugin {
    /// Plugin for `network` using the exact SSA driver
    pub fn new(network: Arc<ReactionNetwork>, config: StochKitConfig) -> Self {
        Self::with_method(network, config, StochKitMethod::Direct)
    }

    /// Plugin with an explicit solver driver
    pub fn with_method(
        network: Arc<ReactionNetwork>,
        config: StochKitConfig,
        method: StochKitMethod,
    ) -> Self {
        Self {
            network,
            config,
            method,
            busy: AtomicBool::new(false),
        }
    }

    fn command(
        &self,
        model_path: &std::path::Path,
        scratch: &std::path::Path,
        end: f64,
        samples: u32,
    ) -> Command {
        let mut command = Command::new(self.config.root.join(self.method.driver()));
        command.current_dir(scratch);
        command.arg("-m").arg(model_path);
        command.arg("-r").arg("1");
        command.arg("-t").arg(end.to_string());
        command.arg("-i").arg(samples.to_string());
        if self.method == StochKitMethod::TauLeaping {
            command.arg("--epsilon").arg(self.config.epsilon.to_string());
            command
                .arg("--threshold")
                .arg(self.config.threshold.to_string());
        }
        command.arg("--no-stats");
        command.arg("--keep-trajectories");
        command.arg("--label");
        command.arg("-f");
        command
    }
}

impl SimulatorPlugin for StochKitPlugin {
    fn backend(&self) -> Backend {
        Backend::StochKit2
    }

    fn run(&mut self, request: &RunRequest) -> Result<SimulationOutput> {
        let _guard = BusyGuard::acquire(&self.busy, Backend::StochKit2)?;
        let y0 = validate_request(&self.network, request)?;
        let rates = RateTable::resolve(&self.network, &request.rates)?;

        let (end, samples) = request.range.as_sampled().ok_or_else(|| {
            RuntimeError::validation("the stochkit2 backend requires a sampled range")
        })?;

        let model = rxd_codegen::stochkit::generate_model(
            &self.network,
            &rates,
            &y0,
            &request.drains,
            self.config.float_precision,
        )?;

        let scratch = tempfile::tempdir()
            .map_err(|e| RuntimeError::io("creating scratch directory", &e))?;
        let model_path = scratch.path().join(MODEL_FILE);
        std::fs::write(&model_path, &model)
            .map_err(|e| RuntimeError::io(format!("writing {}", model_path.display()), &e))?;

        let symbols: Vec<String> = self.network.symbols().map(str::to_string).collect();
        let method = Some(self.method.driver().to_string());
        let budget = self.config.timeout;
        let command = self.command(&model_path, scratch.path(), end, samples);
        let outcome = run_with_deadline(command, budget)?;

        let (status, stdout, stderr) = match outcome {
            Outcome::TimedOut => {
                let budget_ms = budget.map_or(0, |d| d.as_millis() as u64);
                log::warn!(
                    "stochkit2 {} exceeded its {}ms budget and was killed",
                    self.method.driver(),
                    budget_ms
                );
                return Ok(SimulationOutput::timed_out(
                    Backend::StochKit2,
                    method,
                    request.range,
                    symbols,
                    budget_ms,
                ));
            }
            Outcome::Exited {
                status,
                stdout,
                stderr,
            } => (status, stdout, stderr),
        };

        if !stdout.trim().is_empty() {
            log::debug!("stochkit2 stdout: {}", stdout.trim());
        }
        if !status.success() {
            let error = RuntimeError::process(
                "stochkit2",
                format!("driver exited with {}: {}", status, stderr.trim()),
            );
            log::warn!("{}", error);
            return Ok(SimulationOutput::failed(
                Backend::StochKit2,
                method,
                request.range,
                symbols,
                Vec::new(),
                Vec::new(),
                Default::default(),
                vec![error],
            ));
        }

        let result_path = scratch
            .path()
            .join(OUTPUT_DIR)
            .join("trajectories")
            .join("trajectory0.txt");
        let text = match std::fs::read_to_string(&result_path) {
            Ok(text) => text,
            Err(err) => {
                let error = RuntimeError::process(
                    "stochkit2",
                    format!("missing trajectory {}: {}", result_path.display(), err),
                );
                log::warn!("{}", error);
                return Ok(SimulationOutput::failed(
                    Backend::StochKit2,
                    method,
                    request.range,
                    symbols,
                    Vec::new(),
                    Vec::new(),
                    Default::default(),
                    vec![error],
                ));
            }
        };

        let table = parse_table(&text, Delimiter::Whitespace)?;
        if table.width() != symbols.len() {
            return Err(RuntimeError::parse(
                1,
                format!(
                    "trajectory has {} species columns, expected {}",
                    table.width(),
                    symbols.len()
                ),
            ));
        }

        Ok(SimulationOutput::completed(
            Backend::StochKit2,
            method,
            request.range,
            symbols,
            table.independent,
            table.dependent,
            self.network.ignored().clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RunStatus;
    use crate::plugin::{InitialAmounts, SimulationRange};
    use rxd_codegen::RateMap;

    fn network() -> Arc<ReactionNetwork> {
        Arc::new(ReactionNetwork::from_reactions(&["A -> B"]).expect("valid network"))
    }

    fn request() -> RunRequest {
        let mut rates = RateMap::new();
        rates.set("k1", 0.5);
        RunRequest::new(
            SimulationRange::sampled(5.0, 50),
            InitialAmounts::positional([100.0, 0.0]),
            rates,
        )
    }

    /// Fake StochKit2 tree with an `ssa` driver that behaves like the
    /// real one: writes a trajectory under `<cwd>/model_output`.
    fn fake_tree(dir: &std::path::Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let driver = dir.join("ssa");
        std::fs::write(&driver, format!("#!/bin/sh\n{}\n", body)).expect("write driver");
        let mut perms = std::fs::metadata(&driver).expect("stat").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&driver, perms).expect("chmod");
        dir.to_path_buf()
    }

    #[test]
    fn test_successful_run_reads_trajectory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = fake_tree(
            dir.path(),
            "mkdir -p model_output/trajectories\n\
             printf 'time A B\\n0 100 0\\n2.5 60 40\\n5 30 70\\n' \
             > model_output/trajectories/trajectory0.txt",
        );
        let mut plugin = StochKitPlugin::new(network(), StochKitConfig::new(root));
        let output = plugin.run(&request()).expect("runs");

        assert_eq!(output.status(), RunStatus::Completed);
        assert_eq!(output.method(), Some("ssa"));
        assert_eq!(output.len(), 3);
        assert_eq!(output.get(2), Some((5.0, &[30.0, 70.0][..])));
    }

    #[test]
    fn test_missing_trajectory_is_captured() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = fake_tree(dir.path(), "exit 0");
        let mut plugin = StochKitPlugin::new(network(), StochKitConfig::new(root));
        let output = plugin.run(&request()).expect("captured, not raised");

        assert_eq!(output.status(), RunStatus::Failed);
        assert!(matches!(
            output.errors()[0],
            RuntimeError::Process {
                backend: "stochkit2",
                ..
            }
        ));
    }

    #[test]
    fn test_timeout_kills_driver() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = fake_tree(dir.path(), "sleep 30");
        let config = StochKitConfig::new(root).with_timeout(Duration::from_millis(1));
        let mut plugin = StochKitPlugin::new(network(), config);
        let output = plugin.run(&request()).expect("captured, not raised");

        assert_eq!(output.status(), RunStatus::TimedOut);
        assert!(matches!(output.errors()[0], RuntimeError::Timeout { .. }));
    }

    #[test]
    fn test_fractional_population_rejected_before_spawn() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = fake_tree(dir.path(), "exit 0");
        let mut plugin = StochKitPlugin::new(network(), StochKitConfig::new(root));
        let mut bad = request();
        bad.initial = InitialAmounts::positional([99.5, 0.0]);
        assert!(plugin.run(&bad).is_err());
    }
}
