//! Error types for model generation

use thiserror::Error;

/// Result type for generator operations
pub type Result<T> = std::result::Result<T, GenerationError>;

/// Errors raised while rendering a backend-native model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// A reaction edge has no resolvable rate value
    #[error("Missing rate for reaction {edge:?} (parameter {symbol})")]
    MissingRate {
        /// Normalized reaction text of the edge
        edge: String,
        /// The unresolved rate symbol
        symbol: String,
    },

    /// A reversible reaction was given a single rate value
    #[error("Reversible reaction {edge:?} needs a forward and a backward rate")]
    ReversibleNeedsPair {
        /// Normalized reaction text
        edge: String,
    },

    /// The backend demands integer populations and got something else
    #[error("Invalid initial value {value} for species {species}: expected a non-negative integer population")]
    InvalidInitialValue {
        /// The offending species symbol
        species: String,
        /// The rejected value
        value: f64,
    },

    /// The network cannot be expressed in the target grammar
    #[error(transparent)]
    Network(#[from] rxd_core::CoreError),
}

impl GenerationError {
    /// Create a missing-rate error
    pub fn missing_rate(edge: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self::MissingRate {
            edge: edge.into(),
            symbol: symbol.into(),
        }
    }

    /// Create an invalid-initial-value error
    pub fn invalid_initial_value(species: impl Into<String>, value: f64) -> Self {
        Self::InvalidInitialValue {
            species: species.into(),
            value,
        }
    }
}
