//! NLP core: local solvers for smooth nonlinear programs
//!
//! Solves problems of the form
//!
//! ```text
//! minimize    f(x)
//! subject to  c(x) = 0,  dl <= d(x) <= du,  xl <= x <= xu
//! ```
//!
//! with dense first and (optionally) second derivatives supplied through the
//! [`NlpProblem`] trait. Two engines are provided:
//!
//! - **Filter-IPM** ([`FilterIpm`]): primal-dual log-barrier interior point
//!   method globalized by a filter line search, with inertia-corrected
//!   Newton steps and exact or quasi-Newton (damped BFGS) Hessians
//! - **Augmented Lagrangian** ([`AugLagrSolver`]): outer multiplier/penalty
//!   loop whose bound-constrained subproblems are solved by the Filter-IPM
//!
//! # Example
//!
//! ```ignore
//! use nlp_core::{solve_ipm, IpmSettings, NlpProblem};
//!
//! let settings = IpmSettings::default();
//! let result = solve_ipm(&my_problem, &settings)?;
//!
//! println!("Status: {}", result.status);
//! println!("Objective: {}", result.obj_val);
//! ```
//!
//! # References
//!
//! - Wächter & Biegler, "On the implementation of an interior-point filter
//!   line-search algorithm for large-scale nonlinear programming" (IPOPT)
//! - Nocedal & Wright, "Numerical Optimization", ch. 17-19

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod auglagr;
pub mod error;
pub mod ipm;
pub mod linalg;
pub mod observer;
pub mod options;
pub mod problem;
pub mod status;
pub mod termination;

// Re-export main types
pub use auglagr::{AugLagrNlpAdapter, AugLagrProblem, AugLagrSolver};
pub use error::{NlpError, NlpResult};
pub use ipm::FilterIpm;
pub use observer::{IterationInfo, IterationObserver};
pub use options::{
    AugLagrSettings, DualsInitialization, DualsUpdateType, FixedVarHandling, HessianApprox, IpmSettings,
    OptionValue, PenaltyUpdate,
};
pub use problem::{NlpDims, NlpProblem, INFINITE_BOUND};
pub use status::{SolveInfo, SolveResult, SolveStatus};

/// Solve `problem` with the Filter-IPM.
///
/// Returns `Err` only for an invalid problem or option combination; every
/// algorithmic outcome is reported through [`SolveResult::status`].
pub fn solve_ipm<P: NlpProblem + ?Sized>(problem: &P, settings: &IpmSettings) -> NlpResult<SolveResult> {
    FilterIpm::new(problem, settings)?.run()
}

/// Solve `problem` with the augmented-Lagrangian method.
pub fn solve_aug_lagr<P: NlpProblem + ?Sized>(problem: &P, settings: &AugLagrSettings) -> NlpResult<SolveResult> {
    AugLagrSolver::new(problem, settings)?.run()
}
