//! Problem formulation contract and bound preprocessing.
//!
//! The solvers work with the formulation:
//!
//! ```text
//! minimize    f(x)
//! subject to  c(x) = 0
//!             dl <= d(x) <= du
//!             xl <=  x   <= xu
//! ```
//!
//! # Dimensions
//!
//! - `n`: number of primal variables (length of x)
//! - `m_eq`: number of equality constraints (length of c)
//! - `m_ineq`: number of inequality constraints (length of d)
//!
//! Jacobians are dense `m × n` matrices and the Hessian of the Lagrangian is
//! a dense symmetric `n × n` matrix.

use nalgebra::DMatrix;

use crate::error::{NlpError, NlpResult};
use crate::options::FixedVarHandling;

/// Magnitude at or above which a bound is treated as absent.
pub const INFINITE_BOUND: f64 = 1e20;

/// Problem sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NlpDims {
    /// Number of primal variables
    pub n: usize,
    /// Number of equality constraints c(x) = 0
    pub m_eq: usize,
    /// Number of two-sided inequality constraints dl <= d(x) <= du
    pub m_ineq: usize,
}

impl NlpDims {
    /// Total number of general constraints.
    pub fn m(&self) -> usize {
        self.m_eq + self.m_ineq
    }
}

/// Evaluation callbacks of a smooth nonlinear program.
///
/// Every evaluation receives the point and a `new_x` flag. `new_x == false`
/// promises that `x` is identical to the point of the previous call, so an
/// implementation may reuse cached intermediate quantities. The engines
/// always call the function evaluations first with `new_x == true` and then
/// the derivatives at the same point with `new_x == false`.
///
/// A `false` return signals evaluation failure; the solver aborts the run
/// with [`SolveStatus::ErrorInEvaluation`](crate::SolveStatus::ErrorInEvaluation).
pub trait NlpProblem {
    /// Problem sizes.
    fn dims(&self) -> NlpDims;

    /// Variable bounds. Use `-INFINITY`/`INFINITY` (or |b| >= 1e20) for none.
    fn var_bounds(&self, xl: &mut [f64], xu: &mut [f64]) -> bool;

    /// Bounds of the inequality constraints.
    fn ineq_bounds(&self, dl: &mut [f64], du: &mut [f64]) -> bool {
        dl.is_empty() && du.is_empty()
    }

    /// User starting point (need not satisfy the bounds).
    fn get_starting_point(&self, x0: &mut [f64]) -> bool;

    /// Objective value.
    fn eval_f(&self, x: &[f64], new_x: bool, f: &mut f64) -> bool;

    /// Objective gradient.
    fn eval_grad_f(&self, x: &[f64], new_x: bool, grad: &mut [f64]) -> bool;

    /// Equality constraint values.
    fn eval_c(&self, _x: &[f64], _new_x: bool, c: &mut [f64]) -> bool {
        c.is_empty()
    }

    /// Inequality constraint values.
    fn eval_d(&self, _x: &[f64], _new_x: bool, d: &mut [f64]) -> bool {
        d.is_empty()
    }

    /// Jacobian of c (m_eq × n).
    fn eval_jac_c(&self, _x: &[f64], _new_x: bool, jac: &mut DMatrix<f64>) -> bool {
        jac.nrows() == 0
    }

    /// Jacobian of d (m_ineq × n).
    fn eval_jac_d(&self, _x: &[f64], _new_x: bool, jac: &mut DMatrix<f64>) -> bool {
        jac.nrows() == 0
    }

    /// Whether [`NlpProblem::eval_hess_lagr`] is implemented.
    fn provides_hessian(&self) -> bool {
        false
    }

    /// Hessian of the Lagrangian:
    /// `obj_factor ∇²f + Σ lambda_c[i] ∇²c_i + Σ lambda_d[j] ∇²d_j`,
    /// written as a full symmetric `n × n` matrix.
    fn eval_hess_lagr(
        &self,
        _x: &[f64],
        _new_x: bool,
        _obj_factor: f64,
        _lambda_c: &[f64],
        _lambda_d: &[f64],
        _hess: &mut DMatrix<f64>,
    ) -> bool {
        false
    }
}

/// Preprocessed bounds with presence masks.
///
/// Absent bounds keep their raw value but are flagged off in the mask; every
/// slack and multiplier attached to an absent bound stays at zero.
#[derive(Debug, Clone)]
pub struct ProblemBounds {
    pub xl: Vec<f64>,
    pub xu: Vec<f64>,
    pub has_xl: Vec<bool>,
    pub has_xu: Vec<bool>,
    pub dl: Vec<f64>,
    pub du: Vec<f64>,
    pub has_dl: Vec<bool>,
    pub has_du: Vec<bool>,
    /// Number of variables and inequalities whose bounds were relaxed
    /// because lower == upper
    pub n_relaxed_fixed: usize,
}

impl ProblemBounds {
    /// Query, validate and preprocess the bounds of `problem`.
    pub fn from_problem<P: NlpProblem + ?Sized>(
        problem: &P,
        fixed_var: FixedVarHandling,
        fixed_var_tolerance: f64,
        fixed_var_perturb: f64,
    ) -> NlpResult<Self> {
        let dims = problem.dims();
        let mut xl = vec![f64::NEG_INFINITY; dims.n];
        let mut xu = vec![f64::INFINITY; dims.n];
        if !problem.var_bounds(&mut xl, &mut xu) {
            return Err(NlpError::InvalidProblem("var_bounds callback failed".to_string()));
        }
        let mut dl = vec![f64::NEG_INFINITY; dims.m_ineq];
        let mut du = vec![f64::INFINITY; dims.m_ineq];
        if !problem.ineq_bounds(&mut dl, &mut du) {
            return Err(NlpError::InvalidProblem("ineq_bounds callback failed".to_string()));
        }

        let mut n_relaxed_fixed = 0;
        for i in 0..dims.n {
            if xl[i].is_nan() || xu[i].is_nan() {
                return Err(NlpError::InvalidProblem(format!("bound of variable {} is NaN", i)));
            }
            if xl[i] > xu[i] {
                return Err(NlpError::InvalidProblem(format!(
                    "Variable {} has lower bound {} > upper bound {}",
                    i, xl[i], xu[i]
                )));
            }
            if is_finite_bound(xl[i])
                && is_finite_bound(xu[i])
                && xu[i] - xl[i] <= fixed_var_tolerance * xu[i].abs().max(1.0)
            {
                match fixed_var {
                    FixedVarHandling::Error => {
                        return Err(NlpError::InvalidProblem(format!(
                            "Variable {} is fixed (xl = xu = {}); set fixed_var = relax",
                            i, xl[i]
                        )));
                    }
                    FixedVarHandling::Relax => {
                        xl[i] -= fixed_var_perturb * xl[i].abs().max(1.0);
                        xu[i] += fixed_var_perturb * xu[i].abs().max(1.0);
                        n_relaxed_fixed += 1;
                    }
                }
            }
        }

        for j in 0..dims.m_ineq {
            if dl[j].is_nan() || du[j].is_nan() {
                return Err(NlpError::InvalidProblem(format!("bound of inequality {} is NaN", j)));
            }
            if dl[j] > du[j] {
                return Err(NlpError::InvalidProblem(format!(
                    "Inequality {} has lower bound {} > upper bound {}",
                    j, dl[j], du[j]
                )));
            }
            if !is_finite_bound(dl[j]) && !is_finite_bound(du[j]) {
                return Err(NlpError::InvalidProblem(format!(
                    "Inequality {} has no finite bound",
                    j
                )));
            }
            if is_finite_bound(dl[j])
                && is_finite_bound(du[j])
                && du[j] - dl[j] <= fixed_var_tolerance * du[j].abs().max(1.0)
            {
                match fixed_var {
                    FixedVarHandling::Error => {
                        return Err(NlpError::InvalidProblem(format!(
                            "Inequality {} has equal bounds (dl = du = {}); move it to c(x) or set fixed_var = relax",
                            j, dl[j]
                        )));
                    }
                    FixedVarHandling::Relax => {
                        dl[j] -= fixed_var_perturb * dl[j].abs().max(1.0);
                        du[j] += fixed_var_perturb * du[j].abs().max(1.0);
                        n_relaxed_fixed += 1;
                    }
                }
            }
        }

        let has_xl = xl.iter().map(|&b| is_finite_bound(b)).collect();
        let has_xu = xu.iter().map(|&b| is_finite_bound(b)).collect();
        let has_dl = dl.iter().map(|&b| is_finite_bound(b)).collect();
        let has_du = du.iter().map(|&b| is_finite_bound(b)).collect();

        Ok(Self {
            xl,
            xu,
            has_xl,
            has_xu,
            dl,
            du,
            has_dl,
            has_du,
            n_relaxed_fixed,
        })
    }

    /// Move every finite bound outwards by `factor · max(1, |bound|)`.
    ///
    /// Gives narrow ranges an interior the barrier can work in; a zero
    /// factor leaves the bounds untouched.
    pub fn relax(&mut self, factor: f64) {
        if factor <= 0.0 {
            return;
        }
        let widen = |v: &mut [f64], mask: &[bool], sign: f64| {
            for (b, &on) in v.iter_mut().zip(mask) {
                if on {
                    *b += sign * factor * b.abs().max(1.0);
                }
            }
        };
        widen(&mut self.xl, &self.has_xl, -1.0);
        widen(&mut self.xu, &self.has_xu, 1.0);
        widen(&mut self.dl, &self.has_dl, -1.0);
        widen(&mut self.du, &self.has_du, 1.0);
    }

    /// Total number of finite bounds (the size of the complementarity set).
    pub fn num_bounds(&self) -> usize {
        [&self.has_xl, &self.has_xu, &self.has_dl, &self.has_du]
            .iter()
            .map(|mask| mask.iter().filter(|&&b| b).count())
            .sum()
    }
}

/// Whether a bound value is finite in the solver's sense.
#[inline]
pub fn is_finite_bound(b: f64) -> bool {
    b.is_finite() && b.abs() < INFINITE_BOUND
}

/// Validate that `problem`'s dimensions are usable.
pub fn validate_dims(dims: &NlpDims) -> NlpResult<()> {
    if dims.n == 0 {
        return Err(NlpError::InvalidProblem("problem has no variables".to_string()));
    }
    if dims.m_eq > dims.n {
        return Err(NlpError::InvalidProblem(format!(
            "{} equality constraints exceed {} variables",
            dims.m_eq, dims.n
        )));
    }
    Ok(())
}
