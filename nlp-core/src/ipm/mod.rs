//! Filter line-search interior point method.
//!
//! Solves
//!
//! ```text
//! minimize f(x)  s.t.  c(x) = 0,  d(x) - d = 0,  dl <= d <= du,  xl <= x <= xu
//! ```
//!
//! through a sequence of log-barrier subproblems with decreasing mu. Each
//! iteration computes a primal-dual Newton step, shortens it by the
//! fraction-to-boundary rule and backtracks against the filter.

pub mod barrier;
pub mod duals;
pub mod evaluation;
pub mod filter;
pub mod hessian;
pub mod iterate;
pub mod line_search;
pub mod residual;

use std::time::Instant;

use crate::error::{NlpError, NlpResult};
use crate::linalg::kkt::{DenseKktSolver, KktInput, KktSystem};
use crate::linalg::regularization::RegularizationPolicy;
use crate::observer::{IterationInfo, IterationObserver};
use crate::options::{DualsInitialization, HessianApprox, IpmSettings};
use crate::problem::{validate_dims, NlpDims, NlpProblem, ProblemBounds};
use crate::status::{SolveInfo, SolveResult, SolveStatus};
use crate::termination::Termination;

use barrier::BarrierSchedule;
use duals::{lsq_initial, DualsUpdater};
use evaluation::NlpEvaluation;
use filter::Filter;
use hessian::HessianStrategy;
use iterate::{project_into_interior, Iterate, StepDirection};
use line_search::{Accepted, LineSearch, StepKind};
use residual::Residual;

/// Slack value substituted when a projected slack rounds to zero.
const MIN_SLACK: f64 = 1e-16;

/// Steps smaller than this relative to the iterate skip the line search.
const TINY_STEP: f64 = 10.0 * f64::EPSILON;

/// Filter line-search IPM over a borrowed problem.
pub struct FilterIpm<'a, P: NlpProblem + ?Sized> {
    problem: &'a P,
    settings: &'a IpmSettings,
    dims: NlpDims,
    bounds: ProblemBounds,

    curr: Iterate,
    trial: Iterate,
    eval: NlpEvaluation,
    eval_trial: NlpEvaluation,
    resid: Residual,
    filter: Filter,

    barrier: BarrierSchedule,
    mu: f64,
    tau: f64,
    line_search: LineSearch,

    hessian: HessianStrategy,
    kkt: DenseKktSolver,
    duals: DualsUpdater,
    termination: Termination,

    status: SolveStatus,
    iter: usize,
    alpha_primal: f64,
    alpha_dual: f64,
}

impl<'a, P: NlpProblem + ?Sized> FilterIpm<'a, P> {
    /// Validate the problem and set up an engine.
    ///
    /// Fails on inconsistent dimensions or bounds, on fixed variables or
    /// equal-bound inequalities with `fixed_var = error`, and when an exact Hessian is requested from a
    /// problem that provides none.
    pub fn new(problem: &'a P, settings: &'a IpmSettings) -> NlpResult<Self> {
        let dims = problem.dims();
        validate_dims(&dims)?;
        let mut bounds = ProblemBounds::from_problem(
            problem,
            settings.fixed_var,
            settings.fixed_var_tolerance,
            settings.fixed_var_perturb,
        )?;
        if bounds.n_relaxed_fixed > 0 && settings.verbosity >= 1 {
            log::info!("relaxed {} fixed variables or equal-bound inequalities", bounds.n_relaxed_fixed);
        }
        bounds.relax(settings.bound_relax_factor);

        let hessian = match settings.hessian {
            HessianApprox::Auto if problem.provides_hessian() => HessianStrategy::exact(dims.n),
            HessianApprox::Auto | HessianApprox::QuasiNewton => HessianStrategy::quasi_newton(dims.n),
            HessianApprox::Exact if problem.provides_hessian() => HessianStrategy::exact(dims.n),
            HessianApprox::Exact => {
                return Err(NlpError::InvalidOption(
                    "hessian = exact but the problem provides no Hessian".to_string(),
                ))
            }
        };

        Ok(Self {
            problem,
            settings,
            dims,
            bounds,
            curr: Iterate::new(&dims),
            trial: Iterate::new(&dims),
            eval: NlpEvaluation::new(&dims),
            eval_trial: NlpEvaluation::new(&dims),
            resid: Residual::default(),
            filter: Filter::new(settings.gamma_theta, settings.gamma_phi),
            barrier: BarrierSchedule::from_settings(settings),
            mu: settings.mu0,
            tau: settings.tau_min.max(1.0 - settings.mu0),
            line_search: LineSearch::new(settings, 0.0),
            hessian,
            kkt: DenseKktSolver::new(RegularizationPolicy::from_settings(settings)),
            duals: DualsUpdater::new(settings.duals_update_type),
            termination: Termination::from_ipm(settings),
            status: SolveStatus::SolveNotCalled,
            iter: 0,
            alpha_primal: 0.0,
            alpha_dual: 0.0,
        })
    }

    /// Solve without an observer.
    pub fn run(&mut self) -> NlpResult<SolveResult> {
        self.run_with_observer(&mut ())
    }

    /// Solve, reporting every iteration to `observer`.
    ///
    /// Algorithmic failures do not produce `Err`; they end the run with a
    /// failure status and the current iterate.
    pub fn run_with_observer<O: IterationObserver + ?Sized>(&mut self, observer: &mut O) -> NlpResult<SolveResult> {
        let start = Instant::now();
        self.status = SolveStatus::Pending;
        self.iter = 0;
        self.alpha_primal = 0.0;
        self.alpha_dual = 0.0;

        if self.settings.verbosity >= 1 {
            log::info!(
                "Filter-IPM: n = {}, m_eq = {}, m_ineq = {}, bounds = {}, hessian = {}",
                self.dims.n,
                self.dims.m_eq,
                self.dims.m_ineq,
                self.bounds.num_bounds(),
                if self.hessian.is_exact() { "exact" } else { "quasi-Newton" }
            );
        }

        let status = match self.starting_procedure() {
            Ok(()) => match self.iterate(observer) {
                Ok(status) => status,
                Err(e) => self.status_from_error(&e),
            },
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
                "Filter-IPM: {} after {} iterations, obj = {:.8e}, error = {:.3e}",
                status,
                self.iter,
                result.obj_val,
                self.resid.nlp_overall
            );
        }
        observer.on_solution(&result);
        Ok(result)
    }

    /// Build the starting point.
    ///
    /// The user point is pushed strictly inside the bounds, the slack `d`
    /// starts at the projection of d(x0), every bound multiplier at one, and
    /// the constraint multipliers by least squares or at a constant.
    pub fn starting_procedure(&mut self) -> NlpResult<()> {
        let s = self.settings;
        let b = &self.bounds;

        let mut x0 = vec![0.0; self.dims.n];
        if !self.problem.get_starting_point(&mut x0) {
            return Err(NlpError::InvalidProblem("get_starting_point failed".to_string()));
        }
        if x0.iter().any(|v| !v.is_finite()) {
            return Err(NlpError::InvalidProblem("starting point is not finite".to_string()));
        }
        project_into_interior(&mut x0, &b.xl, &b.xu, &b.has_xl, &b.has_xu, s.kappa1, s.kappa2);
        self.curr.x = x0;

        self.eval.eval_all(self.problem, &self.curr.x)?;

        self.curr.d = self.eval.d.clone();
        project_into_interior(&mut self.curr.d, &b.dl, &b.du, &b.has_dl, &b.has_du, s.kappa1, s.kappa2);
        self.curr.set_slacks_from_primals(b, MIN_SLACK);
        self.curr.set_bound_duals(b, 1.0);

        match s.duals_initialization {
            DualsInitialization::Lsq => lsq_initial(&self.eval, &mut self.curr, b, s.constr_mult_init_max),
            DualsInitialization::Constant => {
                self.curr.yc.fill(s.duals_init_value);
                self.curr.yd.fill(s.duals_init_value);
            }
        }

        self.mu = s.mu0;
        self.tau = self.barrier.tau(self.mu);
        self.filter.clear();
        self.resid.update(&self.curr, &self.eval, b, self.mu, s.p_smax);

        let theta0 = residual::theta(&self.eval, &self.curr);
        self.line_search = LineSearch::new(s, theta0);
        self.termination = Termination::from_ipm(s);
        self.termination.record_initial(&[self.resid.nlp_overall]);

        if s.verbosity >= 3 {
            log::debug!(
                "start: f = {:.6e}, theta0 = {:.3e}, err0 = {:.3e}, |yc| = {:.3e}",
                self.eval.f,
                theta0,
                self.resid.nlp_overall,
                crate::linalg::dense::inf_norm(&self.curr.yc)
            );
        }
        Ok(())
    }

    fn iterate<O: IterationObserver + ?Sized>(&mut self, observer: &mut O) -> NlpResult<SolveStatus> {
        if self.settings.verbosity >= 2 {
            log::info!(
                "{:>5} {:>15} {:>10} {:>10} {:>10} {:>10} {:>10} {:>4}",
                "iter", "objective", "inf_pr", "inf_du", "mu", "alpha_du", "alpha_pr", "ls"
            );
            log::info!("{}", "-".repeat(82));
        }

        loop {
            if let Some(status) = self.termination.check(&[self.resid.nlp_overall], self.iter) {
                return Ok(status);
            }

            self.update_log_barrier_parameters();

            if observer.on_iteration(&self.iteration_info()).is_break() {
                return Ok(SolveStatus::UserStopped);
            }

            let dir = self.compute_search_direction()?;

            let alpha_max = self.curr.max_primal_step(&dir, &self.bounds, self.tau);
            let alpha_dual = self.curr.max_dual_step(&dir, &self.bounds, self.tau);
            let accepted = self.line_search(&dir, alpha_max)?;
            if accepted.kind == StepKind::Filter {
                let theta = residual::theta(&self.eval, &self.curr);
                let phi = residual::phi(&self.eval, &self.curr, &self.bounds, self.mu);
                self.filter.add(theta, phi);
            }

            // Trial buffers hold the accepted point with its function values
            std::mem::swap(&mut self.curr, &mut self.trial);
            std::mem::swap(&mut self.eval, &mut self.eval_trial);

            self.curr.take_bound_dual_step(&dir, &self.bounds, alpha_dual);
            self.eval.eval_derivs(self.problem, &self.curr.x)?;
            self.duals.update(&mut self.curr, &self.eval, &self.bounds, &dir, accepted.alpha);
            self.curr
                .clip_bound_duals(&self.bounds, self.mu, self.settings.kappa_sigma);
            self.resid
                .update(&self.curr, &self.eval, &self.bounds, self.mu, self.settings.p_smax);

            self.alpha_primal = accepted.alpha;
            self.alpha_dual = alpha_dual;
            self.iter += 1;

            if self.settings.verbosity >= 2 {
                log::info!(
                    "{:>5} {:>15.8e} {:>10.3e} {:>10.3e} {:>10.3e} {:>10.3e} {:>10.3e} {:>4}",
                    self.iter,
                    self.eval.f,
                    self.resid.nlp_feas,
                    self.resid.nlp_optim,
                    self.mu,
                    self.alpha_dual,
                    self.alpha_primal,
                    accepted.backtracks
                );
            }
        }
    }

    /// Decrease mu while the barrier subproblem is solved to `kappa_eps mu`.
    ///
    /// Every decrease clears the filter.
    fn update_log_barrier_parameters(&mut self) {
        while self.barrier.subproblem_solved(self.resid.bar_overall, self.mu) {
            let (mu, tau) = self.barrier.next(self.mu);
            if mu >= self.mu {
                break;
            }
            self.mu = mu;
            self.tau = tau;
            self.filter.clear();
            self.resid.update_barrier(&self.curr, &self.bounds, mu);
            if self.settings.verbosity >= 3 {
                log::debug!("mu -> {:.3e}, tau -> {:.6}, barrier error {:.3e}", mu, tau, self.resid.bar_overall);
            }
        }
    }

    fn compute_search_direction(&mut self) -> NlpResult<StepDirection> {
        self.hessian
            .update(self.problem, &self.curr.x, &self.eval, &self.curr.yc, &self.curr.yd)?;

        let (sigma_x, sigma_d) = self.curr.barrier_diagonals(&self.bounds);
        let (rx, rd) = residual::barrier_gradients(&self.eval, &self.curr, &self.bounds, self.mu);
        let rhs_x: Vec<f64> = rx.iter().map(|v| -v).collect();
        let rhs_d: Vec<f64> = rd.iter().map(|v| -v).collect();
        let rhs_yc: Vec<f64> = self.eval.c.iter().map(|v| -v).collect();
        let rhs_yd: Vec<f64> = self
            .eval
            .d
            .iter()
            .zip(&self.curr.d)
            .map(|(dx, d)| d - dx)
            .collect();

        let dir = self.kkt.solve(&KktInput {
            hess: self.hessian.matrix(),
            jac_c: &self.eval.jac_c,
            jac_d: &self.eval.jac_d,
            sigma_x: &sigma_x,
            sigma_d: &sigma_d,
            rhs_x: &rhs_x,
            rhs_d: &rhs_d,
            rhs_yc: &rhs_yc,
            rhs_yd: &rhs_yd,
            mu: self.mu,
        })?;
        if self.settings.verbosity >= 3 && dir.delta_w > 0.0 {
            log::debug!("inertia correction: delta_w = {:.2e}, delta_c = {:.2e}", dir.delta_w, dir.delta_c);
        }
        Ok(StepDirection::from_kkt(dir, &self.curr, &self.bounds, self.mu))
    }

    /// Backtracking search from `alpha_max`; leaves the accepted point in the
    /// trial buffers.
    fn line_search(&mut self, dir: &StepDirection, alpha_max: f64) -> NlpResult<Accepted> {
        let problem = self.problem;
        let bounds = &self.bounds;
        let curr = &self.curr;
        let trial = &mut self.trial;
        let eval_trial = &mut self.eval_trial;
        let mu = self.mu;

        let mut evaluate = |alpha: f64| -> NlpResult<(f64, f64)> {
            trial.set_primal_trial(curr, dir, bounds, alpha);
            eval_trial.eval_funcs(problem, &trial.x)?;
            Ok((
                residual::theta(eval_trial, trial),
                residual::phi(eval_trial, trial, bounds, mu),
            ))
        };

        if dir.relative_primal_size(curr) < TINY_STEP {
            evaluate(alpha_max)?;
            return Ok(Accepted { alpha: alpha_max, kind: StepKind::Tiny, backtracks: 0 });
        }

        let theta = residual::theta(&self.eval, curr);
        let phi = residual::phi(&self.eval, curr, bounds, mu);
        let dphi = residual::phi_directional_derivative(&self.eval, curr, dir, bounds, mu);
        self.line_search
            .backtrack(alpha_max, theta, phi, dphi, &self.filter, evaluate)
    }

    fn status_from_error(&self, e: &NlpError) -> SolveStatus {
        let status = match e {
            NlpError::Evaluation { .. } => SolveStatus::ErrorInEvaluation,
            NlpError::Kkt(_) => SolveStatus::LinearSolverFailure,
            NlpError::LineSearch { .. } => SolveStatus::SteplengthTooSmall,
            NlpError::InvalidProblem(_) | NlpError::InvalidOption(_) => SolveStatus::IncompleteInit,
        };
        if self.settings.verbosity >= 1 {
            log::warn!("iteration {}: {}", self.iter, e);
        }
        status
    }

    fn iteration_info(&self) -> IterationInfo {
        IterationInfo {
            iter: self.iter,
            obj: self.eval.f,
            phi: residual::phi(&self.eval, &self.curr, &self.bounds, self.mu),
            err_overall: self.resid.nlp_overall,
            err_feas: self.resid.nlp_feas,
            err_optim: self.resid.nlp_optim,
            mu: self.mu,
            rho: 0.0,
            alpha_primal: self.alpha_primal,
            alpha_dual: self.alpha_dual,
            filter_size: self.filter.len(),
            inner_status: None,
        }
    }

    fn build_result(&self, start: Instant) -> SolveResult {
        SolveResult {
            status: self.status,
            x: self.curr.x.clone(),
            yc: self.curr.yc.clone(),
            yd: self.curr.yd.clone(),
            zl: self.curr.zl.clone(),
            zu: self.curr.zu.clone(),
            obj_val: self.eval.f,
            info: SolveInfo {
                iters: self.iter,
                solve_time_ms: start.elapsed().as_millis() as u64,
                err_optim: self.resid.nlp_optim,
                err_feas: self.resid.nlp_feas,
                err_complem: self.resid.nlp_complem,
                err_overall: self.resid.nlp_overall,
                mu: self.mu,
                filter_size: self.filter.len(),
                reg_primal_bumps: self.kkt.primal_bumps(),
                ..SolveInfo::default()
            },
        }
    }

    /// Objective at the current iterate.
    pub fn objective(&self) -> f64 {
        self.eval.f
    }

    /// Primal part of the current iterate.
    pub fn solution(&self) -> &[f64] {
        &self.curr.x
    }

    pub fn status(&self) -> SolveStatus {
        self.status
    }

    pub fn num_iterations(&self) -> usize {
        self.iter
    }

    /// Current primal-dual iterate.
    pub fn current_iterate(&self) -> &Iterate {
        &self.curr
    }

    pub fn bounds(&self) -> &ProblemBounds {
        &self.bounds
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    /// min (x0 - 3)² + (x1 + 1)² with box bounds and an optional Hessian.
    struct Shifted {
        xl: [f64; 2],
        xu: [f64; 2],
        x0: [f64; 2],
        exact: bool,
    }

    impl NlpProblem for Shifted {
        fn dims(&self) -> NlpDims {
            NlpDims { n: 2, m_eq: 0, m_ineq: 0 }
        }
        fn var_bounds(&self, xl: &mut [f64], xu: &mut [f64]) -> bool {
            xl.copy_from_slice(&self.xl);
            xu.copy_from_slice(&self.xu);
            true
        }
        fn get_starting_point(&self, x0: &mut [f64]) -> bool {
            x0.copy_from_slice(&self.x0);
            true
        }
        fn eval_f(&self, x: &[f64], _new_x: bool, f: &mut f64) -> bool {
            *f = (x[0] - 3.0).powi(2) + (x[1] + 1.0).powi(2);
            true
        }
        fn eval_grad_f(&self, x: &[f64], _new_x: bool, grad: &mut [f64]) -> bool {
            grad[0] = 2.0 * (x[0] - 3.0);
            grad[1] = 2.0 * (x[1] + 1.0);
            true
        }
        fn provides_hessian(&self) -> bool {
            self.exact
        }
        fn eval_hess_lagr(
            &self,
            _x: &[f64],
            _new_x: bool,
            obj_factor: f64,
            _lambda_c: &[f64],
            _lambda_d: &[f64],
            hess: &mut DMatrix<f64>,
        ) -> bool {
            hess[(0, 0)] = 2.0 * obj_factor;
            hess[(1, 1)] = 2.0 * obj_factor;
            true
        }
    }

    #[test]
    fn test_starting_procedure_pushes_inside_bounds() {
        let prob = Shifted {
            xl: [0.0, -1e-3],
            xu: [1.0, 1e-3],
            x0: [-5.0, 1e-3],
            exact: true,
        };
        let settings = IpmSettings::default();
        let mut ipm = FilterIpm::new(&prob, &settings).unwrap();
        ipm.starting_procedure().unwrap();

        let it = ipm.current_iterate();
        assert!(it.is_interior(ipm.bounds()));
        for i in 0..2 {
            assert!(it.x[i] > prob.xl[i] && it.x[i] < prob.xu[i]);
            assert!(it.sxl[i] > 0.0 && it.sxu[i] > 0.0);
        }
    }

    #[test]
    fn test_active_bound_solution() {
        // Unconstrained minimizer (3, -1) lies outside the box
        let prob = Shifted {
            xl: [0.0, 0.0],
            xu: [1.0, 1.0],
            x0: [0.5, 0.5],
            exact: true,
        };
        let settings = IpmSettings { verbosity: 0, ..IpmSettings::default() };
        let mut ipm = FilterIpm::new(&prob, &settings).unwrap();
        let res = ipm.run().unwrap();

        assert_eq!(res.status, SolveStatus::Success);
        assert!((res.x[0] - 1.0).abs() < 1e-6);
        assert!(res.x[1].abs() < 1e-6);
        // Multipliers of the active bounds: zu0 = -∇f0 = 4, zl1 = ∇f1 = 2
        assert!((res.zu[0] - 4.0).abs() < 1e-4);
        assert!((res.zl[1] - 2.0).abs() < 1e-4);
        assert_eq!(ipm.num_iterations(), res.info.iters);
        assert_eq!(ipm.solution(), &res.x[..]);
        assert_eq!(ipm.objective(), res.obj_val);
    }

    #[test]
    fn test_exact_hessian_requires_callback() {
        let prob = Shifted {
            xl: [0.0, 0.0],
            xu: [1.0, 1.0],
            x0: [0.5, 0.5],
            exact: false,
        };
        let settings = IpmSettings { hessian: HessianApprox::Exact, ..IpmSettings::default() };
        assert!(matches!(FilterIpm::new(&prob, &settings), Err(NlpError::InvalidOption(_))));
    }

    #[test]
    fn test_max_iter_status_returns_iterate() {
        let prob = Shifted {
            xl: [0.0, 0.0],
            xu: [1.0, 1.0],
            x0: [0.5, 0.5],
            exact: true,
        };
        let settings = IpmSettings { max_iter: 2, verbosity: 0, ..IpmSettings::default() };
        let mut ipm = FilterIpm::new(&prob, &settings).unwrap();
        let res = ipm.run().unwrap();
        assert_eq!(res.status, SolveStatus::MaxIterExceeded);
        assert_eq!(res.info.iters, 2);
        assert_eq!(res.x.len(), 2);
        assert!(res.x.iter().all(|v| v.is_finite()));
    }
}
