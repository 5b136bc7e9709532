//! Core error types for fgdb-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering every
//! failure mode of registration, execution recording and snapshot restore.

use thiserror::Error;

use crate::id::Timestamp;
use crate::registry::BlockKind;

/// Core errors produced by the fgdb-core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A statement line could not be parsed. `line` is 1-based; 0 means the
    /// text did not come from a numbered source.
    #[error("parse error on line {line} at '{token}': {reason}")]
    Parse {
        line: usize,
        token: String,
        reason: String,
    },

    /// A name was declared again under a different kind.
    #[error("'{name}' is already declared as a {existing}, cannot redeclare as a {requested}")]
    Conflict {
        name: String,
        existing: BlockKind,
        requested: BlockKind,
    },

    /// An execution referenced a function that was never configured.
    #[error("unknown function: '{name}'")]
    UnknownFunction { name: String },

    /// An execution referenced a variable that was never configured.
    #[error("unknown variable: '{name}'")]
    UnknownVariable { name: String },

    /// The timestamp handed to an execution was not fresh.
    #[error("timestamp {timestamp} for '{name}' is not fresh (latest recorded: {latest})")]
    TimestampCollision {
        name: String,
        timestamp: Timestamp,
        latest: Timestamp,
    },

    /// A versioned variable was treated as independent again.
    #[error("'{name}' has already been produced and cannot become independent again")]
    InvalidTransition { name: String },

    /// An execution was recorded without any input variable.
    #[error("function '{function}' was executed without inputs")]
    NoInputs { function: String },

    /// A snapshot blob was corrupt or of an unsupported format.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// A graph invariant was violated.
    #[error("graph inconsistency: {reason}")]
    GraphInconsistency { reason: String },
}

impl CoreError {
    /// Returns `true` for errors a batch may skip past. Only per-statement
    /// parse failures qualify; everything else aborts the enclosing batch.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CoreError::Parse { .. })
    }

    pub(crate) fn parse(line: usize, token: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::Parse {
            line,
            token: token.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_parse_errors_are_recoverable() {
        assert!(CoreError::parse(3, "y1", "missing '='").is_recoverable());
        assert!(!CoreError::UnknownFunction { name: "f".into() }.is_recoverable());
        assert!(!CoreError::TimestampCollision {
            name: "y".into(),
            timestamp: Timestamp(4),
            latest: Timestamp(4),
        }
        .is_recoverable());
    }

    #[test]
    fn conflict_message_names_both_kinds() {
        let err = CoreError::Conflict {
            name: "f1".into(),
            existing: BlockKind::Function,
            requested: BlockKind::Variable,
        };
        assert_eq!(
            err.to_string(),
            "'f1' is already declared as a function, cannot redeclare as a variable"
        );
    }

    #[test]
    fn parse_message_names_token() {
        let err = CoreError::parse(2, "f(", "unbalanced parentheses");
        assert_eq!(
            err.to_string(),
            "parse error on line 2 at 'f(': unbalanced parentheses"
        );
    }
}
