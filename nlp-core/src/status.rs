//! Solve outcomes and reported results.

use std::fmt;

use serde::Serialize;

/// Solver status.
///
/// `Pending` while a run is in progress, `SolveNotCalled` before the first
/// run. Exactly one value holds at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolveStatus {
    /// Run in progress
    Pending,

    /// All errors below the absolute tolerance
    Success,

    /// All errors below the relative tolerance times their initial values
    SuccessRelTol,

    /// Acceptable tolerance held for the required number of consecutive iterations
    AcceptableLevel,

    /// Iteration cap reached
    MaxIterExceeded,

    /// Starting point could not be built
    IncompleteInit,

    /// An observer requested an early stop
    UserStopped,

    /// `run` has not been called yet
    SolveNotCalled,

    /// A problem callback failed or returned non-finite values
    ErrorInEvaluation,

    /// Line search exhausted; a restoration phase would be needed
    SteplengthTooSmall,

    /// The KKT system could not produce a usable direction
    LinearSolverFailure,

    /// An inner IPM solve of the augmented-Lagrangian loop failed
    InnerSolveFailed,
}

impl SolveStatus {
    /// One of the three converged outcomes.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SolveStatus::Success | SolveStatus::SuccessRelTol | SolveStatus::AcceptableLevel
        )
    }

    /// A hard failure (not an iteration budget or user stop).
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SolveStatus::IncompleteInit
                | SolveStatus::ErrorInEvaluation
                | SolveStatus::SteplengthTooSmall
                | SolveStatus::LinearSolverFailure
                | SolveStatus::InnerSolveFailed
        )
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Pending => write!(f, "Pending"),
            SolveStatus::Success => write!(f, "Success"),
            SolveStatus::SuccessRelTol => write!(f, "Success (relative tolerance)"),
            SolveStatus::AcceptableLevel => write!(f, "Acceptable Level"),
            SolveStatus::MaxIterExceeded => write!(f, "Max Iterations Exceeded"),
            SolveStatus::IncompleteInit => write!(f, "Incomplete Initialization"),
            SolveStatus::UserStopped => write!(f, "User Stopped"),
            SolveStatus::SolveNotCalled => write!(f, "Solve Not Called"),
            SolveStatus::ErrorInEvaluation => write!(f, "Error In Evaluation"),
            SolveStatus::SteplengthTooSmall => write!(f, "Steplength Too Small"),
            SolveStatus::LinearSolverFailure => write!(f, "Linear Solver Failure"),
            SolveStatus::InnerSolveFailed => write!(f, "Inner Solve Failed"),
        }
    }
}

/// Solve result with the final iterate and diagnostics.
///
/// Returned on failure too; the vectors then hold the current (best-known)
/// iterate at the time the run stopped.
#[derive(Debug, Clone, Serialize)]
pub struct SolveResult {
    /// Solution status
    pub status: SolveStatus,

    /// Primal solution x (length n)
    pub x: Vec<f64>,

    /// Equality constraint multipliers (length m_eq)
    pub yc: Vec<f64>,

    /// Inequality constraint multipliers (length m_ineq)
    pub yd: Vec<f64>,

    /// Lower bound multipliers on x (length n, zero where unbounded)
    pub zl: Vec<f64>,

    /// Upper bound multipliers on x (length n, zero where unbounded)
    pub zu: Vec<f64>,

    /// User objective value at `x`
    pub obj_val: f64,

    /// Detailed solve information and diagnostics
    pub info: SolveInfo,
}

/// Detailed solve information and diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SolveInfo {
    /// Number of (outer) iterations completed
    pub iters: usize,

    /// Total solve time (milliseconds)
    pub solve_time_ms: u64,

    /// Final unscaled optimality error
    pub err_optim: f64,

    /// Final unscaled feasibility error
    pub err_feas: f64,

    /// Final unscaled complementarity error
    pub err_complem: f64,

    /// Final scaled overall error
    pub err_overall: f64,

    /// Final barrier parameter (IPM)
    pub mu: f64,

    /// Final penalty parameter (augmented Lagrangian)
    pub rho: f64,

    /// Number of filter entries at termination (IPM)
    pub filter_size: usize,

    /// Total inner IPM iterations (augmented Lagrangian)
    pub inner_iters: usize,

    /// Status of every inner solve, in order (augmented Lagrangian)
    pub inner_statuses: Vec<SolveStatus>,

    /// Number of KKT solves that needed primal regularization
    pub reg_primal_bumps: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(SolveStatus::Success.is_success());
        assert!(SolveStatus::SuccessRelTol.is_success());
        assert!(SolveStatus::AcceptableLevel.is_success());
        assert!(!SolveStatus::MaxIterExceeded.is_success());
        assert!(!SolveStatus::MaxIterExceeded.is_failure());
        assert!(!SolveStatus::UserStopped.is_failure());
        assert!(SolveStatus::SteplengthTooSmall.is_failure());
        assert!(SolveStatus::ErrorInEvaluation.is_failure());
    }
}
