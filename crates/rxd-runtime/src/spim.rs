//! SPiM subprocess backend
//!
//! Renders the network as a stochastic pi-calculus program, hands it to
//! the SPiM interpreter under a scratch directory, and parses the CSV
//! table the interpreter writes next to the model file. SPiM only
//! reports plotted species, so outputs from this backend carry the
//! non-ignored columns and an empty ignored set.

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

const MODEL_FILE: &str = "model.spi";

/// Where and how to run the SPiM interpreter
#[derive(Debug, Clone)]
pub struct SpimConfig {
    /// Path to the SPiM interpreter (`spim.ocaml` bytecode or native)
    pub interpreter: PathBuf,
    /// OCaml runtime to launch the interpreter with, when it is bytecode
    pub runtime: Option<PathBuf>,
    /// Wall-clock budget; the interpreter is killed when it passes
    pub timeout: Option<Duration>,
    /// Decimal digits used when rendering the model
    pub float_precision: usize,
}

impl SpimConfig {
    /// Configuration for an interpreter at `path`, no timeout
    pub fn new(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            runtime: None,
            timeout: None,
            float_precision: DEFAULT_FLOAT_PRECISION,
        }
    }

    /// Launch through an OCaml runtime binary
    pub fn with_runtime(mut self, runtime: impl Into<PathBuf>) -> Self {
        self.runtime = Some(runtime.into());
        self
    }

    /// Kill the interpreter after `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// SPiM process-calculus backend
pub struct SpimPlugin {
    network: Arc<ReactionNetwork>,
    config: SpimConfig,
    busy: AtomicBool,
}

impl SpimPlugin {
    /// Plugin for `network` driving the configured interpreter
    pub fn new(network: Arc<ReactionNetwork>, config: SpimConfig) -> Self {
        Self {
            network,
            config,
            busy: AtomicBool::new(false),
        }
    }

    fn command(&self, model_path: &std::path::Path) -> Command {
        match &self.config.runtime {
            Some(runtime) => {
                let mut command = Command::new(runtime);
                command.arg(&self.config.interpreter);
                command.arg(model_path);
                command
            }
            None => {
                let mut command = Command::new(&self.config.interpreter);
                command.arg(model_path);
                command
            }
        }
    }

    fn plotted_symbols(&self) -> Vec<String> {
        self.network
            .symbols()
            .enumerate()
            .filter(|&(i, _)| !self.network.is_ignored(i))
            .map(|(_, s)| s.to_string())
            .collect()
    }
}

impl SimulatorPlugin for SpimPlugin {
    fn backend(&self) -> Backend {
        Backend::Spim
    }

    fn run(&mut self, request: &RunRequest) -> Result<SimulationOutput> {
        let _guard = BusyGuard::acquire(&self.busy, Backend::Spim)?;
        let y0 = validate_request(&self.network, request)?;
        let rates = RateTable::resolve(&self.network, &request.rates)?;

        let (end, samples) = request.range.as_sampled().ok_or_else(|| {
            RuntimeError::validation("the spim backend requires a sampled range")
        })?;

        let model = rxd_codegen::spim::generate_model(
            &self.network,
            &rates,
            &y0,
            end,
            samples,
            self.config.float_precision,
        )?;

        let scratch = tempfile::tempdir()
            .map_err(|e| RuntimeError::io("creating scratch directory", &e))?;
        let model_path = scratch.path().join(MODEL_FILE);
        std::fs::write(&model_path, &model)
            .map_err(|e| RuntimeError::io(format!("writing {}", model_path.display()), &e))?;

        let symbols = self.plotted_symbols();
        let budget = self.config.timeout;
        let outcome = run_with_deadline(self.command(&model_path), budget)?;

        let (status, stdout, stderr) = match outcome {
            Outcome::TimedOut => {
                let budget_ms = budget.map_or(0, |d| d.as_millis() as u64);
                log::warn!("spim exceeded its {}ms budget and was killed", budget_ms);
                return Ok(SimulationOutput::timed_out(
                    Backend::Spim,
                    None,
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
            log::debug!("spim stdout: {}", stdout.trim());
        }
        if !status.success() {
            let error = RuntimeError::process(
                "spim",
                format!("interpreter exited with {}: {}", status, stderr.trim()),
            );
            log::warn!("{}", error);
            return Ok(SimulationOutput::failed(
                Backend::Spim,
                None,
                request.range,
                symbols,
                Vec::new(),
                Vec::new(),
                Default::default(),
                vec![error],
            ));
        }

        // SPiM writes its table next to the model file.
        let result_path = scratch.path().join(format!("{}.csv", MODEL_FILE));
        let text = match std::fs::read_to_string(&result_path) {
            Ok(text) => text,
            Err(err) => {
                let error = RuntimeError::process(
                    "spim",
                    format!("missing result table {}: {}", result_path.display(), err),
                );
                log::warn!("{}", error);
                return Ok(SimulationOutput::failed(
                    Backend::Spim,
                    None,
                    request.range,
                    symbols,
                    Vec::new(),
                    Vec::new(),
                    Default::default(),
                    vec![error],
                ));
            }
        };

        let table = parse_table(&text, Delimiter::Comma)?;
        if table.width() != symbols.len() {
            return Err(RuntimeError::parse(
                1,
                format!(
                    "result table has {} species columns, expected {}",
                    table.width(),
                    symbols.len()
                ),
            ));
        }

        Ok(SimulationOutput::completed(
            Backend::Spim,
            None,
            request.range,
            symbols,
            table.independent,
            table.dependent,
            Default::default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RunStatus;
    use crate::plugin::{InitialAmounts, SimulationRange};
    use rxd_codegen::RateMap;

    fn foxes() -> Arc<ReactionNetwork> {
        Arc::new(
            ReactionNetwork::from_reactions(&["R -> 2 R", "R + F -> 2 F", "F -> D"])
                .and_then(|n| n.unchanging_species(&["D"]))
                .expect("valid network"),
        )
    }

    fn foxes_request() -> RunRequest {
        let mut rates = RateMap::new();
        rates.set("k1", 10.0);
        rates.set("k2", 0.01);
        rates.set("k3", 10.0);
        RunRequest::new(
            SimulationRange::sampled(10.0, 100),
            InitialAmounts::positional([120.0, 40.0, 0.0]),
            rates,
        )
    }

    /// Stand-in interpreter: writes a plausible result table next to the
    /// model file, mimicking how SPiM leaves its CSV behind.
    fn fake_interpreter(dir: &std::path::Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-spim.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write script");
        let mut perms = std::fs::metadata(&path).expect("stat").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod");
        path
    }

    #[test]
    fn test_successful_run_parses_sibling_csv() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = fake_interpreter(
            dir.path(),
            "printf '\"Time\",\"R()\",\"F()\"\\n0.0,120,40\\n5.0,90,70\\n10.0,60,95\\n' > \"$1.csv\"",
        );
        let mut plugin = SpimPlugin::new(foxes(), SpimConfig::new(script));
        let output = plugin.run(&foxes_request()).expect("runs");

        assert_eq!(output.status(), RunStatus::Completed);
        assert_eq!(output.symbols(), &["R".to_string(), "F".to_string()]);
        assert!(output.ignored().is_empty());
        assert_eq!(output.len(), 3);
        assert_eq!(output.get_at(1, 1), Some((5.0, 70.0)));
    }

    #[test]
    fn test_missing_result_table_is_captured() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = fake_interpreter(dir.path(), "exit 0");
        let mut plugin = SpimPlugin::new(foxes(), SpimConfig::new(script));
        let output = plugin.run(&foxes_request()).expect("captured, not raised");

        assert_eq!(output.status(), RunStatus::Failed);
        assert!(output.is_empty());
        assert!(matches!(
            output.errors()[0],
            RuntimeError::Process { backend: "spim", .. }
        ));
    }

    #[test]
    fn test_nonzero_exit_is_captured() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = fake_interpreter(dir.path(), "echo 'parse error' >&2; exit 2");
        let mut plugin = SpimPlugin::new(foxes(), SpimConfig::new(script));
        let output = plugin.run(&foxes_request()).expect("captured, not raised");

        assert_eq!(output.status(), RunStatus::Failed);
        match &output.errors()[0] {
            RuntimeError::Process { reason, .. } => assert!(reason.contains("parse error")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_timeout_produces_timed_out_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = fake_interpreter(dir.path(), "sleep 30");
        let config = SpimConfig::new(script).with_timeout(Duration::from_millis(1));
        let mut plugin = SpimPlugin::new(foxes(), config);
        let output = plugin.run(&foxes_request()).expect("captured, not raised");

        assert_eq!(output.status(), RunStatus::TimedOut);
        assert!(output.is_empty());
        assert!(matches!(output.errors()[0], RuntimeError::Timeout { .. }));
    }

    #[test]
    fn test_continuous_range_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = fake_interpreter(dir.path(), "exit 0");
        let mut plugin = SpimPlugin::new(foxes(), SpimConfig::new(script));
        let mut request = foxes_request();
        request.range = SimulationRange::continuous(0.0, 10.0, 0.1);
        assert!(plugin.run(&request).is_err());
    }
}
