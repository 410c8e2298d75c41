//! Per-iteration observer hooks.

use std::ops::ControlFlow;

use crate::status::{SolveResult, SolveStatus};

/// Snapshot handed to observers once per (outer) iteration.
#[derive(Debug, Clone, Copy)]
pub struct IterationInfo {
    /// Iteration number
    pub iter: usize,

    /// User objective at the current iterate
    pub obj: f64,

    /// Log-barrier objective (IPM only, otherwise equal to `obj`)
    pub phi: f64,

    /// Scaled overall error (IPM) or max of feasibility/optimality (AL)
    pub err_overall: f64,

    /// Feasibility error
    pub err_feas: f64,

    /// Optimality error
    pub err_optim: f64,

    /// Barrier parameter (IPM only, otherwise 0)
    pub mu: f64,

    /// Penalty parameter (AL only, otherwise 0)
    pub rho: f64,

    /// Primal step length of the last accepted step
    pub alpha_primal: f64,

    /// Dual step length of the last accepted step
    pub alpha_dual: f64,

    /// Number of filter entries (IPM only)
    pub filter_size: usize,

    /// Status of the last inner solve (AL only)
    pub inner_status: Option<SolveStatus>,
}

/// Receives solver events and may stop the run early.
///
/// Closures `FnMut(&IterationInfo) -> ControlFlow<()>` implement this
/// trait, and `()` is a no-op observer.
pub trait IterationObserver {
    /// Called once per iteration before the step is computed.
    /// Returning `ControlFlow::Break(())` ends the run with `UserStopped`.
    fn on_iteration(&mut self, info: &IterationInfo) -> ControlFlow<()>;

    /// Called once when the run terminates, with the final result.
    fn on_solution(&mut self, _result: &SolveResult) {}
}

impl<F> IterationObserver for F
where
    F: FnMut(&IterationInfo) -> ControlFlow<()>,
{
    fn on_iteration(&mut self, info: &IterationInfo) -> ControlFlow<()> {
        self(info)
    }
}

impl IterationObserver for () {
    fn on_iteration(&mut self, _info: &IterationInfo) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}
