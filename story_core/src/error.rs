//! Error types for the stateful side of the engine.

use story_expr::{EvalError, PathError};
use thiserror::Error;

/// Why one `;`-separated set statement was skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatementError {
    #[error("no assignment operator in `{statement}`")]
    MissingOperator { statement: String },

    #[error("`{target}` is not a valid assignment target in `{statement}`")]
    InvalidTarget { statement: String, target: String },

    #[error("missing right-hand side in `{statement}`")]
    MissingValue { statement: String },

    #[error("right-hand side of `{statement}` failed to compile")]
    Compile { statement: String },

    #[error("evaluating `{statement}`: {source}")]
    Eval {
        statement: String,
        #[source]
        source: EvalError,
    },

    #[error("writing `{statement}`: {source}")]
    Path {
        statement: String,
        #[source]
        source: PathError,
    },
}

impl StatementError {
    /// The statement text that was skipped.
    pub fn statement(&self) -> &str {
        match self {
            Self::MissingOperator { statement }
            | Self::InvalidTarget { statement, .. }
            | Self::MissingValue { statement }
            | Self::Compile { statement }
            | Self::Eval { statement, .. }
            | Self::Path { statement, .. } => statement,
        }
    }
}

/// Undo or redo with nothing to restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,
}

/// Failure to load or validate engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
