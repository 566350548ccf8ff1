//! Unified simulation output model
//!
//! Every backend normalizes its trajectory into a [`SimulationOutput`]:
//! one independent time sequence plus one dependent row per sample, all
//! rows the same width, in species declaration order. Captured runtime
//! failures travel in the output's error list next to whatever samples
//! were collected before the failure.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use crate::error::{Result, RuntimeError};
use crate::plugin::SimulationRange;
use crate::registry::Backend;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The backend ran to the end of the requested range
    Completed,
    /// The backend failed; partial samples may still be present
    Failed,
    /// The backend exceeded its wall-clock budget and was killed
    TimedOut,
}

/// Trajectory produced by one simulation run
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    backend: Backend,
    method: Option<String>,
    range: SimulationRange,
    symbols: Vec<String>,
    independent: Vec<f64>,
    dependent: Vec<Vec<f64>>,
    ignored: BTreeSet<usize>,
    status: RunStatus,
    errors: Vec<RuntimeError>,
}

impl SimulationOutput {
    /// Output of a run that reached the end of its range.
    ///
    /// `independent` and `dependent` must have the same length and every
    /// dependent row must have one entry per symbol.
    pub fn completed(
        backend: Backend,
        method: Option<String>,
        range: SimulationRange,
        symbols: Vec<String>,
        independent: Vec<f64>,
        dependent: Vec<Vec<f64>>,
        ignored: BTreeSet<usize>,
    ) -> Self {
        let output = Self {
            backend,
            method,
            range,
            symbols,
            independent,
            dependent,
            ignored,
            status: RunStatus::Completed,
            errors: Vec::new(),
        };
        debug_assert!(output.shape_is_consistent());
        output
    }

    /// Output of a failed run, keeping whatever samples were collected
    pub fn failed(
        backend: Backend,
        method: Option<String>,
        range: SimulationRange,
        symbols: Vec<String>,
        independent: Vec<f64>,
        dependent: Vec<Vec<f64>>,
        ignored: BTreeSet<usize>,
        errors: Vec<RuntimeError>,
    ) -> Self {
        let output = Self {
            backend,
            method,
            range,
            symbols,
            independent,
            dependent,
            ignored,
            status: RunStatus::Failed,
            errors,
        };
        debug_assert!(output.shape_is_consistent());
        output
    }

    /// Output of a run that was killed after exceeding its budget
    pub fn timed_out(
        backend: Backend,
        method: Option<String>,
        range: SimulationRange,
        symbols: Vec<String>,
        budget_ms: u64,
    ) -> Self {
        Self {
            backend,
            method,
            range,
            symbols,
            independent: Vec::new(),
            dependent: Vec::new(),
            ignored: BTreeSet::new(),
            status: RunStatus::TimedOut,
            errors: vec![RuntimeError::timeout(backend.name(), budget_ms)],
        }
    }

    fn shape_is_consistent(&self) -> bool {
        self.independent.len() == self.dependent.len()
            && self
                .dependent
                .iter()
                .all(|row| row.len() == self.symbols.len())
    }

    /// Backend that produced this output
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Backend-specific method name, when one was selected
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Range the run was requested over
    pub fn range(&self) -> SimulationRange {
        self.range
    }

    /// How the run ended
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Captured runtime failures, empty for a clean run
    pub fn errors(&self) -> &[RuntimeError] {
        &self.errors
    }

    /// Whether any failure was captured during the run
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Species symbols, one per dependent column
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Independent (time) sequence
    pub fn independent(&self) -> &[f64] {
        &self.independent
    }

    /// Dependent rows, one per sample
    pub fn dependent(&self) -> &[Vec<f64>] {
        &self.dependent
    }

    /// Column indices excluded from plots and filtered views
    pub fn ignored(&self) -> &BTreeSet<usize> {
        &self.ignored
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.independent.len()
    }

    /// Whether the run produced no samples at all
    pub fn is_empty(&self) -> bool {
        self.independent.is_empty()
    }

    /// Number of dependent columns per sample
    pub fn dimension(&self) -> usize {
        self.symbols.len()
    }

    /// Simulated time covered by the samples
    pub fn duration(&self) -> f64 {
        match (self.independent.first(), self.independent.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Sample at `index`: time plus the full dependent row
    pub fn get(&self, index: usize) -> Option<(f64, &[f64])> {
        let t = *self.independent.get(index)?;
        Some((t, self.dependent.get(index)?.as_slice()))
    }

    /// Value of column `column` at sample `index`, paired with its time
    pub fn get_at(&self, index: usize, column: usize) -> Option<(f64, f64)> {
        let (t, row) = self.get(index)?;
        Some((t, *row.get(column)?))
    }

    /// Iterate over samples as `(time, row)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (f64, &[f64])> {
        self.independent
            .iter()
            .copied()
            .zip(self.dependent.iter().map(Vec::as_slice))
    }

    /// Iterate over one dependent column.
    ///
    /// The iterator borrows the output, so it can be recreated any number
    /// of times; columns out of range yield nothing.
    pub fn column(&self, column: usize) -> impl Iterator<Item = f64> + '_ {
        self.dependent
            .iter()
            .filter_map(move |row| row.get(column).copied())
    }

    /// Iterate over `(time, value)` pairs of one dependent column
    pub fn column_pair(&self, column: usize) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.independent
            .iter()
            .copied()
            .zip(self.dependent.iter())
            .filter_map(move |(t, row)| row.get(column).map(|&v| (t, v)))
    }

    /// New output with the ignored columns removed.
    ///
    /// The independent sequence, status, and captured errors carry over
    /// unchanged; the result has an empty ignored set.
    pub fn filtered(&self) -> SimulationOutput {
        if self.ignored.is_empty() {
            return self.clone();
        }
        let keep: Vec<usize> = (0..self.symbols.len())
            .filter(|i| !self.ignored.contains(i))
            .collect();
        SimulationOutput {
            backend: self.backend,
            method: self.method.clone(),
            range: self.range,
            symbols: keep.iter().map(|&i| self.symbols[i].clone()).collect(),
            independent: self.independent.clone(),
            dependent: self
                .dependent
                .iter()
                .map(|row| keep.iter().map(|&i| row[i]).collect())
                .collect(),
            ignored: BTreeSet::new(),
            status: self.status,
            errors: self.errors.clone(),
        }
    }

    /// Render the output as tab-separated text.
    ///
    /// The header names the time column `t` and dependent columns
    /// `y0..yN`. With `unfiltered` set, ignored columns are kept and
    /// their headers gain a leading underscore; otherwise they are
    /// dropped entirely.
    pub fn to_tsv(&self, options: &SaveOptions) -> String {
        let view;
        let source = if options.unfiltered {
            self
        } else {
            view = self.filtered();
            &view
        };

        let mut text = String::from("t");
        for column in 0..source.dimension() {
            if source.ignored.contains(&column) {
                let _ = write!(text, "\t_y{}", column);
            } else {
                let _ = write!(text, "\ty{}", column);
            }
        }
        text.push('\n');

        for (t, row) in source.iter() {
            let _ = write!(text, "{:.*}", options.precision, t);
            for value in row {
                let _ = write!(text, "\t{:.*}", options.precision, value);
            }
            text.push('\n');
        }
        text
    }

    /// Write the output to `path` as TSV on a background thread.
    ///
    /// The data is snapshotted before the thread starts, so later drops
    /// or mutations of surrounding state cannot change what is written.
    /// The returned handle reports the I/O outcome; dropping it without
    /// calling [`SaveHandle::wait`] still joins the writer.
    pub fn save(&self, path: impl Into<PathBuf>, options: SaveOptions) -> SaveHandle {
        let path = path.into();
        let text = self.to_tsv(&options);
        log::debug!(
            "saving {} samples from {} to {}",
            self.len(),
            self.backend.name(),
            path.display()
        );
        let handle = std::thread::spawn(move || write_file(&path, &text));
        SaveHandle {
            handle: Some(handle),
        }
    }

    /// Hand the trajectory to a plotter after resolving titles and labels.
    ///
    /// When `args` supplies labels there must be at least one per plotted
    /// (non-ignored) column; missing titles default to the backend and
    /// method names.
    pub fn plot(&self, plotter: &dyn TrajectoryPlotter, args: PlotArgs) -> Result<()> {
        let plotted = self.dimension() - self.ignored.len();
        let labels = match args.labels {
            Some(labels) => {
                if labels.len() < plotted {
                    return Err(RuntimeError::validation(format!(
                        "{} labels supplied for {} plotted columns",
                        labels.len(),
                        plotted
                    )));
                }
                labels
            }
            None => self
                .symbols
                .iter()
                .enumerate()
                .filter(|(i, _)| !self.ignored.contains(i))
                .map(|(_, s)| s.clone())
                .collect(),
        };
        let title = args.title.unwrap_or_else(|| match &self.method {
            Some(method) => format!("{} ({})", self.backend.name(), method),
            None => self.backend.name().to_string(),
        });
        plotter.plot(&PlotRequest {
            output: self,
            title,
            labels,
            axis_limits: args.axis_limits,
            axis_labels: args.axis_labels,
        })
    }
}

fn write_file(path: &Path, text: &str) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .map_err(|e| RuntimeError::io(format!("creating {}", path.display()), &e))?;
    file.write_all(text.as_bytes())
        .map_err(|e| RuntimeError::io(format!("writing {}", path.display()), &e))?;
    Ok(())
}

/// Formatting knobs for [`SimulationOutput::save`]
#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    /// Decimal digits written per value
    pub precision: usize,
    /// Keep ignored columns and mark their headers with an underscore
    pub unfiltered: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            precision: 15,
            unfiltered: false,
        }
    }
}

/// Handle to a background save.
///
/// Dropping the handle joins the writer thread and logs any failure, so
/// a fire-and-forget save still completes before the program moves on.
#[derive(Debug)]
pub struct SaveHandle {
    handle: Option<JoinHandle<Result<()>>>,
}

impl SaveHandle {
    /// Block until the write finishes and return its outcome
    pub fn wait(mut self) -> Result<()> {
        self.join()
    }

    fn join(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => Err(RuntimeError::Io {
                    context: "joining save thread".to_string(),
                    reason: "writer thread panicked".to_string(),
                }),
            },
            None => Ok(()),
        }
    }
}

impl Drop for SaveHandle {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(err) = self.join() {
                log::error!("background save failed: {}", err);
            }
        }
    }
}

/// Optional presentation overrides for [`SimulationOutput::plot`]
#[derive(Debug, Clone, Default)]
pub struct PlotArgs {
    /// Figure title, defaults to backend and method names
    pub title: Option<String>,
    /// One label per plotted column, defaults to species symbols
    pub labels: Option<Vec<String>>,
    /// `((x_min, x_max), (y_min, y_max))` axis limits
    pub axis_limits: Option<((f64, f64), (f64, f64))>,
    /// Axis labels as `(x, y)`
    pub axis_labels: Option<(String, String)>,
}

/// Fully resolved plot input handed to a [`TrajectoryPlotter`]
#[derive(Debug)]
pub struct PlotRequest<'a> {
    /// Trajectory to draw; ignored columns are still present and should
    /// be skipped by the plotter
    pub output: &'a SimulationOutput,
    /// Resolved figure title
    pub title: String,
    /// Resolved labels, one per plotted column
    pub labels: Vec<String>,
    /// Axis limits, when requested
    pub axis_limits: Option<((f64, f64), (f64, f64))>,
    /// Axis labels, when requested
    pub axis_labels: Option<(String, String)>,
}

/// Renders a trajectory; implementations decide the medium
pub trait TrajectoryPlotter {
    /// Draw the resolved plot request
    fn plot(&self, request: &PlotRequest<'_>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_output() -> SimulationOutput {
        SimulationOutput::completed(
            Backend::Ode,
            Some("rk4".to_string()),
            SimulationRange::continuous(0.0, 2.0, 1.0),
            vec!["R".to_string(), "F".to_string(), "D".to_string()],
            vec![0.0, 1.0, 2.0],
            vec![
                vec![10.0, 5.0, 0.0],
                vec![8.0, 6.0, 1.0],
                vec![7.0, 6.5, 1.5],
            ],
            BTreeSet::from([2]),
        )
    }

    #[test]
    fn test_accessors() {
        let output = sample_output();
        assert_eq!(output.len(), 3);
        assert_eq!(output.dimension(), 3);
        assert!(!output.is_empty());
        assert!(!output.has_errors());
        assert_eq!(output.duration(), 2.0);
        assert_eq!(output.get(1), Some((1.0, &[8.0, 6.0, 1.0][..])));
        assert_eq!(output.get_at(2, 1), Some((2.0, 6.5)));
        assert_eq!(output.get(9), None);
        assert_eq!(output.get_at(0, 9), None);
    }

    #[test]
    fn test_column_iterators_are_restartable() {
        let output = sample_output();
        let first: Vec<f64> = output.column(0).collect();
        let again: Vec<f64> = output.column(0).collect();
        assert_eq!(first, vec![10.0, 8.0, 7.0]);
        assert_eq!(first, again);

        let pairs: Vec<(f64, f64)> = output.column_pair(1).collect();
        assert_eq!(pairs, vec![(0.0, 5.0), (1.0, 6.0), (2.0, 6.5)]);
    }

    #[test]
    fn test_filtered_drops_ignored_columns() {
        let output = sample_output();
        let filtered = output.filtered();
        assert_eq!(filtered.dimension(), 2);
        assert_eq!(filtered.symbols(), &["R".to_string(), "F".to_string()]);
        assert_eq!(filtered.get(0), Some((0.0, &[10.0, 5.0][..])));
        assert!(filtered.ignored().is_empty());
        // The source is untouched.
        assert_eq!(output.dimension(), 3);
    }

    #[test]
    fn test_tsv_filtered_and_unfiltered_headers() {
        let output = sample_output();
        let filtered = output.to_tsv(&SaveOptions {
            precision: 1,
            unfiltered: false,
        });
        let mut lines = filtered.lines();
        assert_eq!(lines.next(), Some("t\ty0\ty1"));
        assert_eq!(lines.next(), Some("0.0\t10.0\t5.0"));

        let unfiltered = output.to_tsv(&SaveOptions {
            precision: 1,
            unfiltered: true,
        });
        assert_eq!(unfiltered.lines().next(), Some("t\ty0\ty1\t_y2"));
    }

    #[test]
    fn test_save_writes_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run.tsv");
        let output = sample_output();
        let handle = output.save(
            &path,
            SaveOptions {
                precision: 1,
                unfiltered: false,
            },
        );
        drop(output);
        handle.wait().expect("save succeeds");

        let text = std::fs::read_to_string(&path).expect("file exists");
        assert_eq!(text.lines().count(), 4);
        assert!(text.starts_with("t\ty0\ty1\n"));
    }

    #[test]
    fn test_timed_out_output_carries_error() {
        let output = SimulationOutput::timed_out(
            Backend::Spim,
            None,
            SimulationRange::sampled(10.0, 100),
            vec!["A".to_string()],
            1,
        );
        assert_eq!(output.status(), RunStatus::TimedOut);
        assert!(output.is_empty());
        assert!(matches!(
            output.errors()[0],
            RuntimeError::Timeout { budget_ms: 1, .. }
        ));
    }

    struct CountingPlotter {
        expected_labels: usize,
    }

    impl TrajectoryPlotter for CountingPlotter {
        fn plot(&self, request: &PlotRequest<'_>) -> Result<()> {
            assert_eq!(request.labels.len(), self.expected_labels);
            assert!(!request.title.is_empty());
            Ok(())
        }
    }

    #[test]
    fn test_plot_defaults_and_label_validation() {
        let output = sample_output();
        let plotter = CountingPlotter { expected_labels: 2 };
        output
            .plot(&plotter, PlotArgs::default())
            .expect("defaults resolve");

        let short = PlotArgs {
            labels: Some(vec!["only one".to_string()]),
            ..Default::default()
        };
        assert!(output.plot(&plotter, short).is_err());
    }
}
