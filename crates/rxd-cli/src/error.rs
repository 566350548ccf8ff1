//! Error handling for the rxd CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Network construction error
    #[error("Network error: {0}")]
    Network(#[from] rxd_core::CoreError),

    /// Model generation error
    #[error("Generation error: {0}")]
    Generation(#[from] rxd_codegen::GenerationError),

    /// Simulation runtime error
    #[error("Runtime error: {0}")]
    Runtime(#[from] rxd_runtime::RuntimeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// System description could not be parsed
    #[error("System file error: {0}")]
    SystemFile(#[from] toml::de::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Generic error
    #[error("Error: {0}")]
    Generic(#[from] anyhow::Error),

    /// Invalid command arguments
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),
}
