//! Problem evaluations at one point.
//!
//! Function values are always requested first at a new point
//! (`new_x = true`); derivatives follow at the same point with
//! `new_x = false`. A callback returning `false` or any non-finite output is
//! an evaluation failure.

use nalgebra::DMatrix;

use crate::error::{NlpError, NlpResult};
use crate::linalg::dense::all_finite;
use crate::problem::{NlpDims, NlpProblem};

/// Function and first-derivative values of the NLP at one point.
#[derive(Debug, Clone)]
pub struct NlpEvaluation {
    pub f: f64,
    pub c: Vec<f64>,
    /// d(x), the inequality body (not the slack variable)
    pub d: Vec<f64>,
    pub grad_f: Vec<f64>,
    pub jac_c: DMatrix<f64>,
    pub jac_d: DMatrix<f64>,
}

impl NlpEvaluation {
    pub fn new(dims: &NlpDims) -> Self {
        Self {
            f: 0.0,
            c: vec![0.0; dims.m_eq],
            d: vec![0.0; dims.m_ineq],
            grad_f: vec![0.0; dims.n],
            jac_c: DMatrix::zeros(dims.m_eq, dims.n),
            jac_d: DMatrix::zeros(dims.m_ineq, dims.n),
        }
    }

    /// Objective and constraint bodies at a new point.
    pub fn eval_funcs<P: NlpProblem + ?Sized>(&mut self, problem: &P, x: &[f64]) -> NlpResult<()> {
        if !problem.eval_f(x, true, &mut self.f) || !self.f.is_finite() {
            return Err(NlpError::Evaluation { what: "eval_f" });
        }
        if !problem.eval_c(x, false, &mut self.c) || !all_finite(&self.c) {
            return Err(NlpError::Evaluation { what: "eval_c" });
        }
        if !problem.eval_d(x, false, &mut self.d) || !all_finite(&self.d) {
            return Err(NlpError::Evaluation { what: "eval_d" });
        }
        Ok(())
    }

    /// Gradient and Jacobians at the point of the last `eval_funcs`.
    pub fn eval_derivs<P: NlpProblem + ?Sized>(&mut self, problem: &P, x: &[f64]) -> NlpResult<()> {
        if !problem.eval_grad_f(x, false, &mut self.grad_f) || !all_finite(&self.grad_f) {
            return Err(NlpError::Evaluation { what: "eval_grad_f" });
        }
        self.jac_c.fill(0.0);
        self.jac_d.fill(0.0);
        if !problem.eval_jac_c(x, false, &mut self.jac_c) || self.jac_c.iter().any(|v| !v.is_finite()) {
            return Err(NlpError::Evaluation { what: "eval_jac_c" });
        }
        if !problem.eval_jac_d(x, false, &mut self.jac_d) || self.jac_d.iter().any(|v| !v.is_finite()) {
            return Err(NlpError::Evaluation { what: "eval_jac_d" });
        }
        Ok(())
    }

    /// Full evaluation at a new point.
    pub fn eval_all<P: NlpProblem + ?Sized>(&mut self, problem: &P, x: &[f64]) -> NlpResult<()> {
        self.eval_funcs(problem, x)?;
        self.eval_derivs(problem, x)
    }

    /// ∇f + Jcᵀ yc + Jdᵀ yd
    pub fn lagrangian_gradient(&self, yc: &[f64], yd: &[f64]) -> Vec<f64> {
        let mut g = self.grad_f.clone();
        add_transpose_product(&self.jac_c, yc, &mut g);
        add_transpose_product(&self.jac_d, yd, &mut g);
        g
    }
}

/// out += Aᵀ y
pub fn add_transpose_product(a: &DMatrix<f64>, y: &[f64], out: &mut [f64]) {
    for (r, &yr) in y.iter().enumerate() {
        if yr == 0.0 {
            continue;
        }
        for (c, o) in out.iter_mut().enumerate() {
            *o += a[(r, c)] * yr;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Faulty {
        nan_grad: bool,
    }

    impl NlpProblem for Faulty {
        fn dims(&self) -> NlpDims {
            NlpDims { n: 1, m_eq: 1, m_ineq: 0 }
        }
        fn var_bounds(&self, _xl: &mut [f64], _xu: &mut [f64]) -> bool {
            true
        }
        fn get_starting_point(&self, x0: &mut [f64]) -> bool {
            x0[0] = 1.0;
            true
        }
        fn eval_f(&self, x: &[f64], new_x: bool, f: &mut f64) -> bool {
            assert!(new_x);
            *f = x[0];
            true
        }
        fn eval_grad_f(&self, _x: &[f64], new_x: bool, grad: &mut [f64]) -> bool {
            assert!(!new_x);
            grad[0] = if self.nan_grad { f64::NAN } else { 1.0 };
            true
        }
        fn eval_c(&self, x: &[f64], _new_x: bool, c: &mut [f64]) -> bool {
            c[0] = x[0] - 1.0;
            true
        }
        fn eval_jac_c(&self, _x: &[f64], _new_x: bool, jac: &mut DMatrix<f64>) -> bool {
            jac[(0, 0)] = 2.0;
            true
        }
    }

    #[test]
    fn test_evaluation_order_and_values() {
        let prob = Faulty { nan_grad: false };
        let mut ev = NlpEvaluation::new(&prob.dims());
        ev.eval_all(&prob, &[3.0]).unwrap();
        assert_eq!(ev.f, 3.0);
        assert_eq!(ev.c, vec![2.0]);
        assert_eq!(ev.lagrangian_gradient(&[0.5], &[]), vec![2.0]);
    }

    #[test]
    fn test_non_finite_derivative_is_evaluation_error() {
        let prob = Faulty { nan_grad: true };
        let mut ev = NlpEvaluation::new(&prob.dims());
        let err = ev.eval_all(&prob, &[3.0]);
        assert!(matches!(err, Err(NlpError::Evaluation { what: "eval_grad_f" })));
    }

    #[test]
    fn test_missing_constraint_callback_fails() {
        struct NoC;
        impl NlpProblem for NoC {
            fn dims(&self) -> NlpDims {
                NlpDims { n: 1, m_eq: 1, m_ineq: 0 }
            }
            fn var_bounds(&self, _xl: &mut [f64], _xu: &mut [f64]) -> bool {
                true
            }
            fn get_starting_point(&self, _x0: &mut [f64]) -> bool {
                true
            }
            fn eval_f(&self, _x: &[f64], _new_x: bool, f: &mut f64) -> bool {
                *f = 0.0;
                true
            }
            fn eval_grad_f(&self, _x: &[f64], _new_x: bool, _grad: &mut [f64]) -> bool {
                true
            }
        }
        let mut ev = NlpEvaluation::new(&NoC.dims());
        assert!(matches!(ev.eval_funcs(&NoC, &[0.0]), Err(NlpError::Evaluation { what: "eval_c" })));
    }
}
