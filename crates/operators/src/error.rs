//! Operator-level error type.

use thiserror::Error;

/// Errors returned while resolving or registering operators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OperatorError {
    /// No handler is registered under the given identifier.
    #[error("unknown operator: '{0}'")]
    UnknownOperator(String),

    /// A bare class name matches handlers from more than one module.
    #[error("ambiguous operator '{name}', candidates: {candidates:?}")]
    Ambiguous {
        name: String,
        candidates: Vec<String>,
    },

    /// A handler with the same identifier is already registered.
    #[error("operator already registered: '{0}'")]
    AlreadyRegistered(String),
}
