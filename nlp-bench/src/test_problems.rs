//! Small classic test problems with known solutions.

use nalgebra::DMatrix;
use nlp_core::{NlpDims, NlpProblem};

/// A registered problem with its reference optimum.
pub struct TestProblem {
    pub name: &'static str,
    pub problem: Box<dyn NlpProblem>,
    pub optimal_obj: f64,
}

/// Every registered problem, in a fixed order.
pub fn registry() -> Vec<TestProblem> {
    vec![
        TestProblem { name: "hs071", problem: Box::new(Hs071), optimal_obj: 17.014_017_3 },
        TestProblem { name: "hs035", problem: Box::new(Hs035), optimal_obj: 1.0 / 9.0 },
        TestProblem { name: "hs006", problem: Box::new(Hs006), optimal_obj: 0.0 },
        TestProblem { name: "rosenbrock", problem: Box::new(ChainedRosenbrock { n: 2 }), optimal_obj: 0.0 },
        // From (-1.2, 1, ...) the solvers land in the local minimum near
        // (-1, 1, ..., 1), not at the global one (f = 0)
        TestProblem {
            name: "rosenbrock20",
            problem: Box::new(ChainedRosenbrock { n: 20 }),
            optimal_obj: 3.986_623_85,
        },
    ]
}

impl TestProblem {
    /// Objective error relative to the reference, floored at an absolute scale of one.
    pub fn objective_error(&self, obj: f64) -> f64 {
        (obj - self.optimal_obj).abs() / self.optimal_obj.abs().max(1.0)
    }
}

/// Look up a problem by name.
pub fn find(name: &str) -> Option<TestProblem> {
    registry().into_iter().find(|p| p.name == name)
}

/// HS071: min x0 x3 (x0+x1+x2) + x2, Σx² = 40, Πx >= 25, 1 <= x <= 5.
struct Hs071;

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
        for (j, v) in x.iter().enumerate() {
            jac[(0, j)] = 2.0 * v;
        }
        true
    }

    fn eval_jac_d(&self, x: &[f64], _new_x: bool, jac: &mut DMatrix<f64>) -> bool {
        let prod: f64 = x.iter().product();
        for (j, v) in x.iter().enumerate() {
            // Bounds keep every x_j >= 1
            jac[(0, j)] = prod / v;
        }
        true
    }

    fn provides_hessian(&self) -> bool {
        true
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
        for i in 0..4 {
            hess[(i, i)] = 2.0 * lc;
            for j in (i + 1)..4 {
                // ∂²(Πx)/∂xi∂xj is the product of the two other entries
                let others: f64 = (0..4).filter(|&k| k != i && k != j).map(|k| x[k]).product();
                hess[(i, j)] = ld * others;
                hess[(j, i)] = ld * others;
            }
        }
        let obj = [
            (0, 0, 2.0 * x[3]),
            (0, 1, x[3]),
            (0, 2, x[3]),
            (0, 3, 2.0 * x[0] + x[1] + x[2]),
            (1, 3, x[0]),
            (2, 3, x[0]),
        ];
        for (i, j, v) in obj {
            hess[(i, j)] += s * v;
            if i != j {
                hess[(j, i)] += s * v;
            }
        }
        true
    }
}

/// HS035: convex QP with one linear inequality and nonnegative variables.
///
/// f* = 1/9 at x* = (4/3, 7/9, 4/9).
struct Hs035;

impl NlpProblem for Hs035 {
    fn dims(&self) -> NlpDims {
        NlpDims { n: 3, m_eq: 0, m_ineq: 1 }
    }

    fn var_bounds(&self, xl: &mut [f64], xu: &mut [f64]) -> bool {
        xl.fill(0.0);
        xu.fill(f64::INFINITY);
        true
    }

    fn ineq_bounds(&self, dl: &mut [f64], du: &mut [f64]) -> bool {
        dl[0] = f64::NEG_INFINITY;
        du[0] = 3.0;
        true
    }

    fn get_starting_point(&self, x0: &mut [f64]) -> bool {
        x0.fill(0.5);
        true
    }

    fn eval_f(&self, x: &[f64], _new_x: bool, f: &mut f64) -> bool {
        *f = 9.0 - 8.0 * x[0] - 6.0 * x[1] - 4.0 * x[2]
            + 2.0 * x[0] * x[0]
            + 2.0 * x[1] * x[1]
            + x[2] * x[2]
            + 2.0 * x[0] * x[1]
            + 2.0 * x[0] * x[2];
        true
    }

    fn eval_grad_f(&self, x: &[f64], _new_x: bool, grad: &mut [f64]) -> bool {
        grad[0] = -8.0 + 4.0 * x[0] + 2.0 * x[1] + 2.0 * x[2];
        grad[1] = -6.0 + 4.0 * x[1] + 2.0 * x[0];
        grad[2] = -4.0 + 2.0 * x[2] + 2.0 * x[0];
        true
    }

    fn eval_d(&self, x: &[f64], _new_x: bool, d: &mut [f64]) -> bool {
        d[0] = x[0] + x[1] + 2.0 * x[2];
        true
    }

    fn eval_jac_d(&self, _x: &[f64], _new_x: bool, jac: &mut DMatrix<f64>) -> bool {
        jac[(0, 0)] = 1.0;
        jac[(0, 1)] = 1.0;
        jac[(0, 2)] = 2.0;
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
        let h = DMatrix::from_row_slice(3, 3, &[4.0, 2.0, 2.0, 2.0, 4.0, 0.0, 2.0, 0.0, 2.0]);
        hess.copy_from(&(h * obj_factor));
        true
    }
}

/// HS006: min (1 - x0)²  s.t.  10 (x1 - x0²) = 0, from (-1.2, 1).
struct Hs006;

impl NlpProblem for Hs006 {
    fn dims(&self) -> NlpDims {
        NlpDims { n: 2, m_eq: 1, m_ineq: 0 }
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
        *f = (1.0 - x[0]).powi(2);
        true
    }

    fn eval_grad_f(&self, x: &[f64], _new_x: bool, grad: &mut [f64]) -> bool {
        grad[0] = -2.0 * (1.0 - x[0]);
        grad[1] = 0.0;
        true
    }

    fn eval_c(&self, x: &[f64], _new_x: bool, c: &mut [f64]) -> bool {
        c[0] = 10.0 * (x[1] - x[0] * x[0]);
        true
    }

    fn eval_jac_c(&self, x: &[f64], _new_x: bool, jac: &mut DMatrix<f64>) -> bool {
        jac[(0, 0)] = -20.0 * x[0];
        jac[(0, 1)] = 10.0;
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
        lambda_c: &[f64],
        _lambda_d: &[f64],
        hess: &mut DMatrix<f64>,
    ) -> bool {
        hess[(0, 0)] = 2.0 * obj_factor - 20.0 * lambda_c[0];
        true
    }
}

/// Chained Rosenbrock in `n` variables, from (-1.2, 1, -1.2, 1, ...).
struct ChainedRosenbrock {
    n: usize,
}

impl NlpProblem for ChainedRosenbrock {
    fn dims(&self) -> NlpDims {
        NlpDims { n: self.n, m_eq: 0, m_ineq: 0 }
    }

    fn var_bounds(&self, xl: &mut [f64], xu: &mut [f64]) -> bool {
        xl.fill(f64::NEG_INFINITY);
        xu.fill(f64::INFINITY);
        true
    }

    fn get_starting_point(&self, x0: &mut [f64]) -> bool {
        for (i, v) in x0.iter_mut().enumerate() {
            *v = if i % 2 == 0 { -1.2 } else { 1.0 };
        }
        true
    }

    fn eval_f(&self, x: &[f64], _new_x: bool, f: &mut f64) -> bool {
        *f = x
            .windows(2)
            .map(|w| 100.0 * (w[1] - w[0] * w[0]).powi(2) + (1.0 - w[0]).powi(2))
            .sum();
        true
    }

    fn eval_grad_f(&self, x: &[f64], _new_x: bool, grad: &mut [f64]) -> bool {
        grad.fill(0.0);
        for i in 0..self.n - 1 {
            let r = x[i + 1] - x[i] * x[i];
            grad[i] += -400.0 * x[i] * r - 2.0 * (1.0 - x[i]);
            grad[i + 1] += 200.0 * r;
        }
        true
    }

    fn provides_hessian(&self) -> bool {
        true
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
        hess.fill(0.0);
        for i in 0..self.n - 1 {
            hess[(i, i)] += obj_factor * (1200.0 * x[i] * x[i] - 400.0 * x[i + 1] + 2.0);
            hess[(i + 1, i + 1)] += obj_factor * 200.0;
            hess[(i, i + 1)] -= obj_factor * 400.0 * x[i];
            hess[(i + 1, i)] -= obj_factor * 400.0 * x[i];
        }
        true
    }
}
