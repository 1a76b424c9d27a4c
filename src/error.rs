use thiserror::Error;

use crate::algebra::{DenseFactorizationError, SparsityError};

/// Error type shared by every facade, registry and backend in the crate.
///
/// The variants partition failures by what the caller can do about them:
/// configuration problems are permanent for the offending construction,
/// numeric problems may succeed on a fresh attempt with different values,
/// and backend failures carry the wrapped solver's own status vocabulary.
#[derive(Error, Debug)]
pub enum SolverError {
    /// Invalid or unknown option, or structurally unusable problem data
    /// detected at construction.  Never retried automatically.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Numeric failure during a call, e.g. a singular factorization.  The
    /// instance remains usable for a fresh attempt with different values.
    #[error("numeric error: {0}")]
    Numeric(String),

    /// Operation invoked out of the required call order, e.g. a solve
    /// before a successful factorization.
    #[error("state error: {0}")]
    State(String),

    /// The wrapped backend reported a non-recoverable native status code.
    /// `message` comes from the backend's fixed code translation table.
    #[error("{backend} failure (code {code}): {message}")]
    SolverFailure {
        backend: &'static str,
        code: i32,
        message: String,
    },

    /// Capability not offered by the selected backend.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Requested backend name is neither registered nor loadable.
    #[error("plugin not found: no solver named \"{0}\" is registered or loadable")]
    PluginNotFound(String),
}

impl From<SparsityError> for SolverError {
    fn from(e: SparsityError) -> Self {
        SolverError::Configuration(e.to_string())
    }
}

impl From<DenseFactorizationError> for SolverError {
    fn from(e: DenseFactorizationError) -> Self {
        SolverError::Numeric(e.to_string())
    }
}
