//! Error types for the NLP solvers.

use thiserror::Error;

use crate::linalg::kkt::KktError;

/// Errors raised while setting up or advancing a solve.
///
/// Only [`NlpError::InvalidProblem`] and [`NlpError::InvalidOption`] escape
/// `run` as `Err`; the algorithmic variants are mapped to a
/// [`SolveStatus`](crate::SolveStatus) so the caller still gets the last iterate.
#[derive(Error, Debug)]
pub enum NlpError {
    /// Problem dimensions, bounds or starting point are inconsistent
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// Unknown option name or wrong value type
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// A problem callback returned false or produced non-finite values
    #[error("Evaluation of {what} failed")]
    Evaluation {
        /// Which callback failed (e.g. "eval_f")
        what: &'static str,
    },

    /// The Newton system could not produce a usable direction
    #[error("KKT solve failed: {0}")]
    Kkt(#[from] KktError),

    /// Backtracking exhausted without an acceptable trial point
    #[error("Line search failed: step length {alpha:.3e} below minimum")]
    LineSearch {
        /// Last step length tried
        alpha: f64,
    },
}

/// Result type for NLP operations.
pub type NlpResult<T> = Result<T, NlpError>;
