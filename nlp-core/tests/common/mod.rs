//! Test problems shared by the integration tests.

#![allow(dead_code)]

use nalgebra::DMatrix;
use nlp_core::{NlpDims, NlpProblem};

/// Hock-Schittkowski problem 71.
///
/// ```text
/// min  x0 x3 (x0 + x1 + x2) + x2
/// s.t. x0² + x1² + x2² + x3² = 40
///      x0 x1 x2 x3 >= 25
///      1 <= x <= 5
/// ```
///
/// f* = 17.0140173 at x* = (1, 4.7429994, 3.8211503, 1.3794082).
pub struct Hs071 {
    pub with_hessian: bool,
}

pub const HS071_OBJ: f64 = 17.014_017_3;
pub const HS071_X: [f64; 4] = [1.0, 4.742_999_4, 3.821_150_3, 1.379_408_2];

impl NlpProblem for Hs071 {
    fn dims(&self) -> NlpDims {
        NlpDims { n: 4, m_eq: 1, m_ineq: 1 }
    }

    fn var_bounds(&self, xl: &mut [f64], xu: &mut [f64]) -> bool {
        xl.fill(1.0);
        xu.fill(5.0);
        true
    }

    fn ineq_bounds(&self, dl: &mut [f64], du: &mut [f64]) -> bool {
        dl[0] = 25.0;
        du[0] = f64::INFINITY;
        true
    }

    fn get_starting_point(&self, x0: &mut [f64]) -> bool {
        x0.copy_from_slice(&[1.0, 5.0, 5.0, 1.0]);
        true
    }

    fn eval_f(&self, x: &[f64], _new_x: bool, f: &mut f64) -> bool {
        *f = x[0] * x[3] * (x[0] + x[1] + x[2]) + x[2];
        true
    }

    fn eval_grad_f(&self, x: &[f64], _new_x: bool, grad: &mut [f64]) -> bool {
        grad[0] = x[3] * (2.0 * x[0] + x[1] + x[2]);
        grad[1] = x[0] * x[3];
        grad[2] = x[0] * x[3] + 1.0;
        grad[3] = x[0] * (x[0] + x[1] + x[2]);
        true
    }

    fn eval_c(&self, x: &[f64], _new_x: bool, c: &mut [f64]) -> bool {
        c[0] = x.iter().map(|v| v * v).sum::<f64>() - 40.0;
        true
    }

    fn eval_d(&self, x: &[f64], _new_x: bool, d: &mut [f64]) -> bool {
        d[0] = x.iter().product();
        true
    }

    fn eval_jac_c(&self, x: &[f64], _new_x: bool, jac: &mut DMatrix<f64>) -> bool {
        for j in 0..4 {
            jac[(0, j)] = 2.0 * x[j];
        }
        true
    }

    fn eval_jac_d(&self, x: &[f64], _new_x: bool, jac: &mut DMatrix<f64>) -> bool {
        jac[(0, 0)] = x[1] * x[2] * x[3];
        jac[(0, 1)] = x[0] * x[2] * x[3];
        jac[(0, 2)] = x[0] * x[1] * x[3];
        jac[(0, 3)] = x[0] * x[1] * x[2];
        true
    }

    fn provides_hessian(&self) -> bool {
        self.with_hessian
    }

    fn eval_hess_lagr(
        &self,
        x: &[f64],
        _new_x: bool,
        obj_factor: f64,
        lambda_c: &[f64],
        lambda_d: &[f64],
        hess: &mut DMatrix<f64>,
    ) -> bool {
        let (s, lc, ld) = (obj_factor, lambda_c[0], lambda_d[0]);
        let mut set = |i: usize, j: usize, v: f64| {
            hess[(i, j)] = v;
            hess[(j, i)] = v;
        };
        set(0, 0, s * 2.0 * x[3] + 2.0 * lc);
        set(1, 1, 2.0 * lc);
        set(2, 2, 2.0 * lc);
        set(3, 3, 2.0 * lc);
        set(0, 1, s * x[3] + ld * x[2] * x[3]);
        set(0, 2, s * x[3] + ld * x[1] * x[3]);
        set(0, 3, s * (2.0 * x[0] + x[1] + x[2]) + ld * x[1] * x[2]);
        set(1, 2, ld * x[0] * x[3]);
        set(1, 3, s * x[0] + ld * x[0] * x[2]);
        set(2, 3, s * x[0] + ld * x[0] * x[1]);
        true
    }
}

/// Rosenbrock function, unconstrained, from (-1.2, 1).
pub struct Rosenbrock {
    pub with_hessian: bool,
}

impl NlpProblem for Rosenbrock {
    fn dims(&self) -> NlpDims {
        NlpDims { n: 2, m_eq: 0, m_ineq: 0 }
    }

    fn var_bounds(&self, xl: &mut [f64], xu: &mut [f64]) -> bool {
        xl.fill(f64::NEG_INFINITY);
        xu.fill(f64::INFINITY);
        true
    }

    fn get_starting_point(&self, x0: &mut [f64]) -> bool {
        x0.copy_from_slice(&[-1.2, 1.0]);
        true
    }

    fn eval_f(&self, x: &[f64], _new_x: bool, f: &mut f64) -> bool {
        *f = 100.0 * (x[1] - x[0] * x[0]).powi(2) + (1.0 - x[0]).powi(2);
        true
    }

    fn eval_grad_f(&self, x: &[f64], _new_x: bool, grad: &mut [f64]) -> bool {
        grad[0] = -400.0 * x[0] * (x[1] - x[0] * x[0]) - 2.0 * (1.0 - x[0]);
        grad[1] = 200.0 * (x[1] - x[0] * x[0]);
        true
    }

    fn provides_hessian(&self) -> bool {
        self.with_hessian
    }

    fn eval_hess_lagr(
        &self,
        x: &[f64],
        _new_x: bool,
        obj_factor: f64,
        _lambda_c: &[f64],
        _lambda_d: &[f64],
        hess: &mut DMatrix<f64>,
    ) -> bool {
        hess[(0, 0)] = obj_factor * (1200.0 * x[0] * x[0] - 400.0 * x[1] + 2.0);
        hess[(0, 1)] = obj_factor * -400.0 * x[0];
        hess[(1, 0)] = obj_factor * -400.0 * x[0];
        hess[(1, 1)] = obj_factor * 200.0;
        true
    }
}

/// Convex bound-constrained QP with one active bound.
///
/// ```text
/// min ½ xᵀ [4 1; 1 3] x + [1, -2]ᵀ x   s.t.  0 <= x <= 10
/// ```
///
/// Solution x* = (0, 2/3), f* = -2/3, zl0 = 5/3.
pub struct BoundQp;

impl NlpProblem for BoundQp {
    fn dims(&self) -> NlpDims {
        NlpDims { n: 2, m_eq: 0, m_ineq: 0 }
    }

    fn var_bounds(&self, xl: &mut [f64], xu: &mut [f64]) -> bool {
        xl.fill(0.0);
        xu.fill(10.0);
        true
    }

    fn get_starting_point(&self, x0: &mut [f64]) -> bool {
        x0.copy_from_slice(&[3.0, 3.0]);
        true
    }

    fn eval_f(&self, x: &[f64], _new_x: bool, f: &mut f64) -> bool {
        *f = 2.0 * x[0] * x[0] + x[0] * x[1] + 1.5 * x[1] * x[1] + x[0] - 2.0 * x[1];
        true
    }

    fn eval_grad_f(&self, x: &[f64], _new_x: bool, grad: &mut [f64]) -> bool {
        grad[0] = 4.0 * x[0] + x[1] + 1.0;
        grad[1] = x[0] + 3.0 * x[1] - 2.0;
        true
    }

    fn provides_hessian(&self) -> bool {
        true
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
        hess[(0, 0)] = 4.0 * obj_factor;
        hess[(0, 1)] = obj_factor;
        hess[(1, 0)] = obj_factor;
        hess[(1, 1)] = 3.0 * obj_factor;
        true
    }
}

/// `min (x - 3)²` on `[-1, 5]` from 0, whose objective callback fails above `fail_above`.
pub struct Fragile {
    pub fail_above: f64,
}

impl NlpProblem for Fragile {
    fn dims(&self) -> NlpDims {
        NlpDims { n: 1, m_eq: 0, m_ineq: 0 }
    }

    fn var_bounds(&self, xl: &mut [f64], xu: &mut [f64]) -> bool {
        xl[0] = -1.0;
        xu[0] = 5.0;
        true
    }

    fn get_starting_point(&self, x0: &mut [f64]) -> bool {
        x0[0] = 0.0;
        true
    }

    fn eval_f(&self, x: &[f64], _new_x: bool, f: &mut f64) -> bool {
        *f = (x[0] - 3.0).powi(2);
        x[0] <= self.fail_above
    }

    fn eval_grad_f(&self, x: &[f64], _new_x: bool, grad: &mut [f64]) -> bool {
        grad[0] = 2.0 * (x[0] - 3.0);
        true
    }
}

/// Strictly convex quadratic without bounds or constraints.
///
/// ```text
/// min (x0 - 1)² + 2 (x1 + 3)² + ½ x0 x1
/// ```
///
/// x* = (56/31, -100/31), f* = -2077/961, started from (-2, 3).
pub struct FreeQuadratic {
    pub with_hessian: bool,
}

pub const FREE_QUADRATIC_X: [f64; 2] = [56.0 / 31.0, -100.0 / 31.0];
pub const FREE_QUADRATIC_OBJ: f64 = -2077.0 / 961.0;

impl NlpProblem for FreeQuadratic {
    fn dims(&self) -> NlpDims {
        NlpDims { n: 2, m_eq: 0, m_ineq: 0 }
    }

    fn var_bounds(&self, xl: &mut [f64], xu: &mut [f64]) -> bool {
        xl.fill(f64::NEG_INFINITY);
        xu.fill(f64::INFINITY);
        true
    }

    fn get_starting_point(&self, x0: &mut [f64]) -> bool {
        x0.copy_from_slice(&[-2.0, 3.0]);
        true
    }

    fn eval_f(&self, x: &[f64], _new_x: bool, f: &mut f64) -> bool {
        *f = (x[0] - 1.0).powi(2) + 2.0 * (x[1] + 3.0).powi(2) + 0.5 * x[0] * x[1];
        true
    }

    fn eval_grad_f(&self, x: &[f64], _new_x: bool, grad: &mut [f64]) -> bool {
        grad[0] = 2.0 * (x[0] - 1.0) + 0.5 * x[1];
        grad[1] = 4.0 * (x[1] + 3.0) + 0.5 * x[0];
        true
    }

    fn provides_hessian(&self) -> bool {
        self.with_hessian
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
        hess[(0, 1)] = 0.5 * obj_factor;
        hess[(1, 0)] = 0.5 * obj_factor;
        hess[(1, 1)] = 4.0 * obj_factor;
        true
    }
}

/// `min x0² + x1²` subject to `lo <= x0 + x1 <= hi`, from (3, 0).
///
/// With `lo = 1` the solution is (½, ½) for any `hi >= 1`.
pub struct SumRange {
    pub lo: f64,
    pub hi: f64,
}

impl NlpProblem for SumRange {
    fn dims(&self) -> NlpDims {
        NlpDims { n: 2, m_eq: 0, m_ineq: 1 }
    }

    fn var_bounds(&self, xl: &mut [f64], xu: &mut [f64]) -> bool {
        xl.fill(f64::NEG_INFINITY);
        xu.fill(f64::INFINITY);
        true
    }

    fn ineq_bounds(&self, dl: &mut [f64], du: &mut [f64]) -> bool {
        dl[0] = self.lo;
        du[0] = self.hi;
        true
    }

    fn get_starting_point(&self, x0: &mut [f64]) -> bool {
        x0.copy_from_slice(&[3.0, 0.0]);
        true
    }

    fn eval_f(&self, x: &[f64], _new_x: bool, f: &mut f64) -> bool {
        *f = x[0] * x[0] + x[1] * x[1];
        true
    }

    fn eval_grad_f(&self, x: &[f64], _new_x: bool, grad: &mut [f64]) -> bool {
        grad[0] = 2.0 * x[0];
        grad[1] = 2.0 * x[1];
        true
    }

    fn eval_d(&self, x: &[f64], _new_x: bool, d: &mut [f64]) -> bool {
        d[0] = x[0] + x[1];
        true
    }

    fn eval_jac_d(&self, _x: &[f64], _new_x: bool, jac: &mut DMatrix<f64>) -> bool {
        jac[(0, 0)] = 1.0;
        jac[(0, 1)] = 1.0;
        true
    }

    fn provides_hessian(&self) -> bool {
        true
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
        hess[(0, 1)] = 0.0;
        hess[(1, 0)] = 0.0;
        hess[(1, 1)] = 2.0 * obj_factor;
        true
    }
}
