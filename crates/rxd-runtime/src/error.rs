//! Error types for the simulation runtime
//!
//! Two delivery channels exist for runtime failures. Pre-flight problems
//! (bad ranges, unresolvable rates, malformed result tables) are returned
//! as `Err` from [`SimulatorPlugin::run`](crate::SimulatorPlugin::run).
//! Failures of the simulation itself (dead subprocess, exceeded timeout,
//! numerical blow-up) are captured into the error list of an otherwise
//! well-formed [`SimulationOutput`](crate::SimulationOutput) so batch
//! drivers keep going.
//!
//! Every variant carries owned strings rather than source errors so that
//! outputs, and the filtered views derived from them, stay `Clone`.

use thiserror::Error;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors raised or captured while driving a simulation backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// Run request rejected before anything was executed
    #[error("Validation error: {reason}")]
    Validation {
        /// Reason the request was rejected
        reason: String,
    },

    /// Model text could not be generated for the target backend
    #[error("Generation error: {0}")]
    Generation(#[from] rxd_codegen::GenerationError),

    /// External process misbehaved (bad exit status, missing artifact)
    #[error("Process error ({backend}): {reason}")]
    Process {
        /// Backend whose process failed
        backend: &'static str,
        /// What went wrong
        reason: String,
    },

    /// External process exceeded its wall-clock budget and was killed
    #[error("Timeout: {backend} exceeded {budget_ms}ms and was terminated")]
    Timeout {
        /// Backend that was terminated
        backend: &'static str,
        /// Budget that was exceeded, in milliseconds
        budget_ms: u64,
    },

    /// Result table produced by a backend could not be parsed
    #[error("Parse error at line {line}: {reason}")]
    Parse {
        /// 1-based line number within the result table
        line: usize,
        /// What made the line unparseable
        reason: String,
    },

    /// Filesystem operation failed while staging or collecting a run
    #[error("I/O error while {context}: {reason}")]
    Io {
        /// Operation that failed
        context: String,
        /// Underlying error message
        reason: String,
    },

    /// Plugin was asked to run while a previous run was still active
    #[error("Backend {backend} is busy with a previous run")]
    Busy {
        /// Backend that refused the request
        backend: &'static str,
    },

    /// In-process integration or sampling broke down
    #[error("Numerical error at t={time}: {reason}")]
    Numerical {
        /// Simulated time at which the failure was detected
        time: f64,
        /// What broke down
        reason: String,
    },
}

impl RuntimeError {
    /// Create a validation error
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Create a process error for the named backend
    pub fn process(backend: &'static str, reason: impl Into<String>) -> Self {
        Self::Process {
            backend,
            reason: reason.into(),
        }
    }

    /// Create a timeout error for the named backend
    pub fn timeout(backend: &'static str, budget_ms: u64) -> Self {
        Self::Timeout { backend, budget_ms }
    }

    /// Create a parse error
    pub fn parse(line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            line,
            reason: reason.into(),
        }
    }

    /// Create an I/O error with context
    pub fn io(context: impl Into<String>, source: &std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            reason: source.to_string(),
        }
    }

    /// Create a numerical error
    pub fn numerical(time: f64, reason: impl Into<String>) -> Self {
        Self::Numerical {
            time,
            reason: reason.into(),
        }
    }

    /// Whether this error is captured into an output rather than raised
    pub fn is_captured(&self) -> bool {
        matches!(
            self,
            Self::Process { .. } | Self::Timeout { .. } | Self::Numerical { .. }
        )
    }
}

impl From<rxd_core::CoreError> for RuntimeError {
    fn from(err: rxd_core::CoreError) -> Self {
        Self::Validation {
            reason: err.to_string(),
        }
    }
}
