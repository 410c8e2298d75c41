//! Augmented-Lagrangian outer loop.
//!
//! Each major iteration minimizes the bound-constrained augmented Lagrangian
//! in `(x, s)` with a fresh [`FilterIpm`], then moves the multiplier
//! estimates and the penalty parameter:
//!
//! ```text
//! λ ← λ + p / ρ
//! ρ ← min(10 ρ, ρ_max)
//! ```
//!
//! Convergence is measured on the penalty vector (feasibility) and the
//! projected gradient of the augmented Lagrangian (optimality).

pub mod adapter;
pub mod update;

use std::time::Instant;

use crate::error::{NlpError, NlpResult};
use crate::ipm::FilterIpm;
use crate::linalg::dense::inf_norm;
use crate::observer::{IterationInfo, IterationObserver};
use crate::options::AugLagrSettings;
use crate::problem::{NlpDims, NlpProblem};
use crate::status::{SolveInfo, SolveResult, SolveStatus};
use crate::termination::Termination;

pub use adapter::{AugLagrNlpAdapter, AugLagrProblem};
pub use update::{update_lambda, update_rho};

/// Augmented-Lagrangian solver over a borrowed problem.
pub struct AugLagrSolver<'a, P: NlpProblem + ?Sized> {
    adapter: AugLagrNlpAdapter<'a, P>,
    settings: &'a AugLagrSettings,
    dims: NlpDims,

    /// Current inner iterate (x, s)
    z: Vec<f64>,
    lambda: Vec<f64>,
    rho: f64,

    penalty: Vec<f64>,
    grad_lagr: Vec<f64>,
    f_user: f64,
    err_feas: f64,
    err_optim: f64,

    /// Bound multipliers of the last inner solve
    zl: Vec<f64>,
    zu: Vec<f64>,

    termination: Termination,
    status: SolveStatus,
    iter: usize,
    inner_iters: usize,
    inner_statuses: Vec<SolveStatus>,
    last_inner: Option<SolveStatus>,
}

impl<'a, P: NlpProblem + ?Sized> AugLagrSolver<'a, P> {
    /// Validate the problem and set up the outer loop.
    pub fn new(problem: &'a P, settings: &'a AugLagrSettings) -> NlpResult<Self> {
        if settings.rho0 <= 0.0 || !settings.rho0.is_finite() {
            return Err(NlpError::InvalidOption(format!("rho0 must be positive, got {}", settings.rho0)));
        }
        let adapter = AugLagrNlpAdapter::new(problem, &settings.inner)?;
        let dims = adapter.user_dims();
        let nz = adapter.get_prob_sizes();
        let m = adapter.get_penalty_size();

        Ok(Self {
            adapter,
            settings,
            dims,
            z: vec![0.0; nz],
            lambda: vec![settings.lambda0; m],
            rho: settings.rho0,
            penalty: vec![0.0; m],
            grad_lagr: vec![0.0; nz],
            f_user: 0.0,
            err_feas: 0.0,
            err_optim: 0.0,
            zl: vec![0.0; dims.n],
            zu: vec![0.0; dims.n],
            termination: Termination::from_auglagr(settings),
            status: SolveStatus::SolveNotCalled,
            iter: 0,
            inner_iters: 0,
            inner_statuses: Vec::new(),
            last_inner: None,
        })
    }

    /// Solve without an observer.
    pub fn run(&mut self) -> NlpResult<SolveResult> {
        self.run_with_observer(&mut ())
    }

    /// Solve, reporting every major iteration to `observer`.
    pub fn run_with_observer<O: IterationObserver + ?Sized>(&mut self, observer: &mut O) -> NlpResult<SolveResult> {
        let start = Instant::now();
        self.status = SolveStatus::Pending;
        self.iter = 0;
        self.inner_iters = 0;
        self.inner_statuses.clear();
        self.last_inner = None;

        if self.settings.verbosity >= 1 {
            log::info!(
                "AugLagr: n = {}, m_eq = {}, m_ineq = {}, rho0 = {:.1e}, penalty update = {:?}",
                self.dims.n,
                self.dims.m_eq,
                self.dims.m_ineq,
                self.settings.rho0,
                self.settings.penalty_update
            );
        }

        let status = match self.initialize() {
            Ok(None) => match self.outer_loop(observer) {
                Ok(status) => status,
                Err(e) => self.status_from_error(&e),
            },
            Ok(Some(status)) => status,
            Err(e @ NlpError::Evaluation { .. }) => self.status_from_error(&e),
            Err(e) => {
                log::warn!("initialization failed: {}", e);
                SolveStatus::IncompleteInit
            }
        };
        self.status = status;

        let result = self.build_result(start);
        if self.settings.verbosity >= 1 {
            log::info!(
                "AugLagr: {} after {} iterations ({} inner), obj = {:.8e}, feas = {:.3e}, optim = {:.3e}",
                status,
                self.iter,
                self.inner_iters,
                result.obj_val,
                self.err_feas,
                self.err_optim
            );
        }
        observer.on_solution(&result);
        Ok(result)
    }

    /// Starting point, initial multipliers and penalty, initial errors.
    ///
    /// Returns a status if the starting point already terminates the run.
    fn initialize(&mut self) -> NlpResult<Option<SolveStatus>> {
        if !self.adapter.get_user_starting_point(&mut self.z) {
            return Err(NlpError::InvalidProblem("get_starting_point failed".to_string()));
        }
        self.adapter.set_starting_point(&self.z);

        self.lambda.fill(self.settings.lambda0);
        self.adapter.set_lambda(&self.lambda);
        self.rho = self.settings.rho0;
        self.adapter.set_rho(self.rho);

        self.eval_nlp()?;
        self.eval_nlp_errors()?;

        self.termination = Termination::from_auglagr(self.settings);
        let status = self.check_termination();
        self.termination.record_initial(&[self.err_feas, self.err_optim]);
        if self.settings.verbosity >= 3 {
            log::debug!(
                "start: f = {:.6e}, feas0 = {:.3e}, optim0 = {:.3e}",
                self.f_user,
                self.err_feas,
                self.err_optim
            );
        }
        Ok(status)
    }

    fn outer_loop<O: IterationObserver + ?Sized>(&mut self, observer: &mut O) -> NlpResult<SolveStatus> {
        loop {
            self.log_iteration();
            if observer.on_iteration(&self.iteration_info()).is_break() {
                return Ok(SolveStatus::UserStopped);
            }

            let inner = self.solve_subproblem()?;
            self.iter += 1;

            self.eval_nlp()?;
            self.eval_nlp_errors()?;

            if inner.is_failure() && self.settings.stop_on_inner_failure {
                return Ok(SolveStatus::InnerSolveFailed);
            }
            if let Some(status) = self.check_termination() {
                return Ok(status);
            }

            self.adapter.set_starting_point(&self.z);
            self.update_lambda();
            self.update_rho();
        }
    }

    /// Minimize the current augmented Lagrangian from the current iterate.
    fn solve_subproblem(&mut self) -> NlpResult<SolveStatus> {
        let mut ipm = FilterIpm::new(&self.adapter, &self.settings.inner)?;
        let res = ipm.run()?;

        self.inner_iters += res.info.iters;
        self.inner_statuses.push(res.status);
        self.last_inner = Some(res.status);
        if !res.status.is_success() {
            log::warn!("AugLagr iteration {}: inner solve ended with {}", self.iter, res.status);
        }

        if res.x.iter().all(|v| v.is_finite()) {
            self.z.copy_from_slice(&res.x);
            self.zl.copy_from_slice(&res.zl[..self.dims.n]);
            self.zu.copy_from_slice(&res.zu[..self.dims.n]);
        }
        Ok(res.status)
    }

    /// Objective of the user problem at the current iterate.
    fn eval_nlp(&mut self) -> NlpResult<()> {
        if !self.adapter.eval_f_user(&self.z, true, &mut self.f_user) {
            return Err(NlpError::Evaluation { what: "eval_f" });
        }
        Ok(())
    }

    /// Feasibility `‖p‖∞` and optimality `‖z - P(z - ∇L)‖∞`.
    fn eval_nlp_errors(&mut self) -> NlpResult<()> {
        if !self
            .adapter
            .eval_residuals(&self.z, true, &mut self.penalty, &mut self.grad_lagr)
        {
            return Err(NlpError::Evaluation { what: "eval_residuals" });
        }
        self.err_feas = inf_norm(&self.penalty);
        self.err_optim = inf_norm(&self.grad_lagr);
        Ok(())
    }

    fn check_termination(&mut self) -> Option<SolveStatus> {
        self.termination.check(&[self.err_feas, self.err_optim], self.iter)
    }

    fn update_lambda(&mut self) {
        update_lambda(&mut self.lambda, &self.penalty, self.rho);
        self.adapter.set_lambda(&self.lambda);
    }

    fn update_rho(&mut self) {
        let s = self.settings;
        self.rho = update_rho(self.rho, s.penalty_update, s.rho_increase, s.rho_max);
        self.adapter.set_rho(self.rho);
    }

    fn log_iteration(&self) {
        if self.settings.verbosity < 2 {
            return;
        }
        if self.iter % 10 == 0 {
            log::info!(
                "{:>5} {:>15} {:>10} {:>10} {:>8} {:>5}",
                "iter", "objective", "inf_pr", "inf_du", "lg(rho)", "inner"
            );
        }
        log::info!(
            "{:>5} {:>15.8e} {:>10.3e} {:>10.3e} {:>8.2} {:>5}",
            self.iter,
            self.f_user,
            self.err_feas,
            self.err_optim,
            self.rho.log10(),
            self.inner_iters
        );
    }

    fn status_from_error(&self, e: &NlpError) -> SolveStatus {
        if self.settings.verbosity >= 1 {
            log::warn!("AugLagr iteration {}: {}", self.iter, e);
        }
        match e {
            NlpError::Evaluation { .. } => SolveStatus::ErrorInEvaluation,
            NlpError::Kkt(_) => SolveStatus::LinearSolverFailure,
            NlpError::LineSearch { .. } => SolveStatus::SteplengthTooSmall,
            NlpError::InvalidProblem(_) | NlpError::InvalidOption(_) => SolveStatus::IncompleteInit,
        }
    }

    fn iteration_info(&self) -> IterationInfo {
        IterationInfo {
            iter: self.iter,
            obj: self.f_user,
            phi: self.f_user,
            err_overall: self.err_feas.max(self.err_optim),
            err_feas: self.err_feas,
            err_optim: self.err_optim,
            mu: 0.0,
            rho: self.rho,
            alpha_primal: 0.0,
            alpha_dual: 0.0,
            filter_size: 0,
            inner_status: self.last_inner,
        }
    }

    fn build_result(&self, start: Instant) -> SolveResult {
        let y = self.adapter.multiplier_estimate(&self.penalty);
        let (yc, yd) = y.split_at(self.dims.m_eq);
        SolveResult {
            status: self.status,
            x: self.solution().to_vec(),
            yc: yc.to_vec(),
            yd: yd.to_vec(),
            zl: self.zl.clone(),
            zu: self.zu.clone(),
            obj_val: self.f_user,
            info: SolveInfo {
                iters: self.iter,
                solve_time_ms: start.elapsed().as_millis() as u64,
                err_optim: self.err_optim,
                err_feas: self.err_feas,
                err_overall: self.err_feas.max(self.err_optim),
                rho: self.rho,
                inner_iters: self.inner_iters,
                inner_statuses: self.inner_statuses.clone(),
                ..SolveInfo::default()
            },
        }
    }

    /// Objective of the user problem at the current iterate.
    pub fn objective(&self) -> f64 {
        self.f_user
    }

    /// User variables `x` of the current iterate.
    pub fn solution(&self) -> &[f64] {
        &self.z[..self.dims.n]
    }

    pub fn status(&self) -> SolveStatus {
        self.status
    }

    pub fn num_iterations(&self) -> usize {
        self.iter
    }

    /// Current multiplier estimates λ (one per general constraint).
    pub fn lambda(&self) -> &[f64] {
        &self.lambda
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }
}
