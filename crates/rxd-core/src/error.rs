//! Error types for the reaction-network model

use thiserror::Error;

/// Result type for network-model operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while building or querying a reaction network
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A species symbol was declared twice
    #[error("Duplicate species symbol: {symbol}")]
    DuplicateSpecies {
        /// The offending symbol
        symbol: String,
    },

    /// A species symbol was referenced but never declared
    #[error("Unknown species symbol: {symbol}")]
    UnknownSpecies {
        /// The unresolved symbol
        symbol: String,
    },

    /// A network must declare at least one species and one reaction
    #[error("Empty network: {reason}")]
    EmptyNetwork {
        /// What is missing
        reason: String,
    },

    /// Abstract reaction notation could not be parsed
    #[error("Cannot parse reaction {line:?}: {reason}")]
    ParseReaction {
        /// The offending input line
        line: String,
        /// Reason the line was rejected
        reason: String,
    },

    /// A reaction cannot be expressed by the requested decomposition
    #[error("Unsupported reaction {text:?}: {reason}")]
    UnsupportedReaction {
        /// Normalized reaction text
        text: String,
        /// Why the reaction cannot be decomposed
        reason: String,
    },
}

impl CoreError {
    /// Create a duplicate-species error
    pub fn duplicate_species(symbol: impl Into<String>) -> Self {
        Self::DuplicateSpecies {
            symbol: symbol.into(),
        }
    }

    /// Create an unknown-species error
    pub fn unknown_species(symbol: impl Into<String>) -> Self {
        Self::UnknownSpecies {
            symbol: symbol.into(),
        }
    }

    /// Create an empty-network error
    pub fn empty_network(reason: impl Into<String>) -> Self {
        Self::EmptyNetwork {
            reason: reason.into(),
        }
    }

    /// Create a reaction-parse error
    pub fn parse_reaction(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ParseReaction {
            line: line.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported-reaction error
    pub fn unsupported_reaction(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedReaction {
            text: text.into(),
            reason: reason.into(),
        }
    }
}
