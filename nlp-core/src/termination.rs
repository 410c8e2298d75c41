//! Layered termination criteria shared by both engines.
//!
//! Checks, in priority order:
//! - Absolute: every error ≤ `tolerance`
//! - Iteration cap: `iter ≥ max_iter`
//! - Relative: every error ≤ `rel_tolerance` × its initial value (only when
//!   `rel_tolerance > 0`)
//! - Acceptable level: every error ≤ `acceptable_tolerance` for
//!   `acceptable_iterations` consecutive checks
//!
//! The IPM feeds a single error (the scaled overall NLP error); the
//! augmented-Lagrangian loop feeds two (feasibility and optimality).

use crate::options::{AugLagrSettings, IpmSettings};
use crate::status::SolveStatus;

/// Termination state for one run.
#[derive(Debug, Clone)]
pub struct Termination {
    /// Absolute tolerance
    pub tolerance: f64,

    /// Relative tolerance; 0 disables the check
    pub rel_tolerance: f64,

    /// Acceptable tolerance
    pub acceptable_tolerance: f64,

    /// Iteration cap
    pub max_iter: usize,

    /// Consecutive acceptable checks required
    pub acceptable_iterations: usize,

    initial_errors: Vec<f64>,
    acceptable_count: usize,
}

impl Termination {
    pub fn new(
        tolerance: f64,
        rel_tolerance: f64,
        acceptable_tolerance: f64,
        max_iter: usize,
        acceptable_iterations: usize,
    ) -> Self {
        Self {
            tolerance,
            rel_tolerance,
            acceptable_tolerance,
            max_iter,
            acceptable_iterations,
            initial_errors: Vec::new(),
            acceptable_count: 0,
        }
    }

    pub fn from_ipm(settings: &IpmSettings) -> Self {
        Self::new(
            settings.tolerance,
            settings.rel_tolerance,
            settings.acceptable_tolerance,
            settings.max_iter,
            settings.acceptable_iterations,
        )
    }

    pub fn from_auglagr(settings: &AugLagrSettings) -> Self {
        Self::new(
            settings.tolerance,
            settings.rel_tolerance,
            settings.acceptable_tolerance,
            settings.max_iter,
            settings.acceptable_iterations,
        )
    }

    /// Record the errors at the starting point (reference for the relative test).
    pub fn record_initial(&mut self, errors: &[f64]) {
        self.initial_errors = errors.to_vec();
        self.acceptable_count = 0;
    }

    /// Current number of consecutive acceptable checks.
    pub fn acceptable_count(&self) -> usize {
        self.acceptable_count
    }

    /// Check termination.
    ///
    /// Returns `Some(status)` if the run should stop, `None` otherwise.
    /// Updates the consecutive-acceptable counter as a side effect.
    pub fn check(&mut self, errors: &[f64], iter: usize) -> Option<SolveStatus> {
        if errors.iter().all(|&e| e <= self.tolerance) {
            return Some(SolveStatus::Success);
        }

        if iter >= self.max_iter {
            return Some(SolveStatus::MaxIterExceeded);
        }

        if self.rel_tolerance > 0.0
            && self.initial_errors.len() == errors.len()
            && errors
                .iter()
                .zip(&self.initial_errors)
                .all(|(&e, &e0)| e <= self.rel_tolerance * e0)
        {
            return Some(SolveStatus::SuccessRelTol);
        }

        if errors.iter().all(|&e| e <= self.acceptable_tolerance) {
            self.acceptable_count += 1;
        } else {
            self.acceptable_count = 0;
        }
        if self.acceptable_iterations > 0 && self.acceptable_count >= self.acceptable_iterations {
            return Some(SolveStatus::AcceptableLevel);
        }

        None
    }
}
