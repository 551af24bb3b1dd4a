//! Error types for the rill lowering core.

use thiserror::Error;

/// Result type for lowering operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while lowering cells and modules.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to parse cell or module source.
    #[error("parse error: {0}")]
    Parse(String),

    /// A view-flagged reference reached the classifier.
    ///
    /// View references must be rewritten upstream before lowering; one
    /// surviving into a cell's reference list is a contract breach, not a
    /// user error, and is never recovered.
    #[error("view reference '{0}' must be rewritten before lowering")]
    ViewReference(String),

    /// Resolving an imported module failed.
    #[error("failed to resolve import \"{path}\": {message}")]
    ImportResolution { path: String, message: String },

    /// A computation was invoked or defined with the wrong number of inputs.
    #[error("arity mismatch: expected {expected} inputs, got {actual}")]
    Arity { expected: usize, actual: usize },

    /// A synthesized computation failed while evaluating.
    #[error("evaluation error: {0}")]
    Eval(String),

    /// A variable was used before it was defined.
    #[error("variable is not defined")]
    NotDefined,

    /// The module registry could not be reached.
    #[error("registry error: {0}")]
    Registry(#[from] reqwest::Error),

    /// The registry or resolver has no module under the requested path.
    #[error("no module found for \"{0}\"")]
    UnknownModule(String),
}
