//! Bound-constrained augmented-Lagrangian view of a general NLP.
//!
//! The inequality bodies get explicit slacks `s`, so every general
//! constraint becomes an entry of the penalty vector
//!
//! ```text
//! p(x, s) = [ c(x) ; d(x) - s ]
//! ```
//!
//! and the subproblem in `(x, s)` only keeps simple bounds:
//!
//! ```text
//! minimize  f(x) + λᵀp + (ρ/2)‖p‖²   s.t.  xl <= x <= xu,  dl <= s <= du
//! ```

use nalgebra::DMatrix;

use crate::error::NlpResult;
use crate::ipm::evaluation::NlpEvaluation;
use crate::linalg::dense::{all_finite, dot};
use crate::options::IpmSettings;
use crate::problem::{validate_dims, NlpDims, NlpProblem, ProblemBounds};

/// Callbacks the outer loop needs on top of [`NlpProblem`].
///
/// The inner variables are `z = (x, s)`; `get_prob_sizes` is their count
/// and `get_penalty_size` the length of the penalty vector.
pub trait AugLagrProblem {
    fn get_prob_sizes(&self) -> usize;

    fn get_penalty_size(&self) -> usize;

    /// User starting point with slacks `s = d(x0)` clipped into `[dl, du]`.
    fn get_user_starting_point(&self, z0: &mut [f64]) -> bool;

    /// Starting point of the next inner solve.
    fn set_starting_point(&mut self, z0: &[f64]);

    fn set_lambda(&mut self, lambda: &[f64]);

    fn set_rho(&mut self, rho: f64);

    /// Objective of the wrapped problem (not the augmented Lagrangian).
    fn eval_f_user(&self, z: &[f64], new_x: bool, f: &mut f64) -> bool;

    /// Penalty vector and projected gradient of the augmented Lagrangian,
    /// `z - P(z - ∇L)`, which vanishes at a bound-constrained stationary point.
    fn eval_residuals(&self, z: &[f64], new_x: bool, penalty: &mut [f64], grad_lagr: &mut [f64]) -> bool;
}

/// Wraps an [`NlpProblem`] as the bound-constrained AL subproblem.
pub struct AugLagrNlpAdapter<'p, P: NlpProblem + ?Sized> {
    problem: &'p P,
    dims: NlpDims,
    lo: Vec<f64>,
    hi: Vec<f64>,
    has_lo: Vec<bool>,
    has_hi: Vec<bool>,
    start: Vec<f64>,
    lambda: Vec<f64>,
    rho: f64,
}

impl<'p, P: NlpProblem + ?Sized> AugLagrNlpAdapter<'p, P> {
    /// Validate `problem` and build the adapter.
    ///
    /// Fixed variables follow `inner.fixed_var`.
    pub fn new(problem: &'p P, inner: &IpmSettings) -> NlpResult<Self> {
        let dims = problem.dims();
        validate_dims(&dims)?;
        let b = ProblemBounds::from_problem(
            problem,
            inner.fixed_var,
            inner.fixed_var_tolerance,
            inner.fixed_var_perturb,
        )?;

        let lo: Vec<f64> = b.xl.iter().chain(&b.dl).copied().collect();
        let hi: Vec<f64> = b.xu.iter().chain(&b.du).copied().collect();
        let has_lo: Vec<bool> = b.has_xl.iter().chain(&b.has_dl).copied().collect();
        let has_hi: Vec<bool> = b.has_xu.iter().chain(&b.has_du).copied().collect();

        Ok(Self {
            problem,
            dims,
            lo,
            hi,
            has_lo,
            has_hi,
            start: vec![0.0; dims.n + dims.m_ineq],
            lambda: vec![0.0; dims.m()],
            rho: 1.0,
        })
    }

    /// Sizes of the wrapped problem.
    pub fn user_dims(&self) -> NlpDims {
        self.dims
    }

    pub fn lambda(&self) -> &[f64] {
        &self.lambda
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    /// First-order multiplier estimate `λ + ρ p` for a penalty vector `p`.
    pub fn multiplier_estimate(&self, penalty: &[f64]) -> Vec<f64> {
        self.lambda
            .iter()
            .zip(penalty)
            .map(|(l, p)| l + self.rho * p)
            .collect()
    }

    /// Evaluate the wrapped problem at the `x` part of `z` and form the
    /// penalty vector.
    fn evaluate(&self, z: &[f64], derivs: bool) -> NlpResult<(NlpEvaluation, Vec<f64>)> {
        let (x, s) = z.split_at(self.dims.n);
        let mut ev = NlpEvaluation::new(&self.dims);
        if derivs {
            ev.eval_all(self.problem, x)?;
        } else {
            ev.eval_funcs(self.problem, x)?;
        }
        let mut p = ev.c.clone();
        p.extend(ev.d.iter().zip(s).map(|(d, s)| d - s));
        Ok((ev, p))
    }

    /// Gradient of the augmented Lagrangian in `(x, s)`.
    fn merit_gradient(&self, ev: &NlpEvaluation, p: &[f64], grad: &mut [f64]) {
        let lam = self.multiplier_estimate(p);
        let (lam_c, lam_d) = lam.split_at(self.dims.m_eq);
        let gx = ev.lagrangian_gradient(lam_c, lam_d);
        let (grad_x, grad_s) = grad.split_at_mut(self.dims.n);
        grad_x.copy_from_slice(&gx);
        for (g, l) in grad_s.iter_mut().zip(lam_d) {
            *g = -l;
        }
    }
}

impl<P: NlpProblem + ?Sized> AugLagrProblem for AugLagrNlpAdapter<'_, P> {
    fn get_prob_sizes(&self) -> usize {
        self.dims.n + self.dims.m_ineq
    }

    fn get_penalty_size(&self) -> usize {
        self.dims.m()
    }

    fn get_user_starting_point(&self, z0: &mut [f64]) -> bool {
        let n = self.dims.n;
        let (x0, s0) = z0.split_at_mut(n);
        if !self.problem.get_starting_point(x0) || !all_finite(x0) {
            return false;
        }
        if !self.problem.eval_d(x0, true, s0) || !all_finite(s0) {
            return false;
        }
        for (j, s) in s0.iter_mut().enumerate() {
            if self.has_lo[n + j] {
                *s = s.max(self.lo[n + j]);
            }
            if self.has_hi[n + j] {
                *s = s.min(self.hi[n + j]);
            }
        }
        true
    }

    fn set_starting_point(&mut self, z0: &[f64]) {
        self.start.copy_from_slice(z0);
    }

    fn set_lambda(&mut self, lambda: &[f64]) {
        self.lambda.copy_from_slice(lambda);
    }

    fn set_rho(&mut self, rho: f64) {
        self.rho = rho;
    }

    fn eval_f_user(&self, z: &[f64], new_x: bool, f: &mut f64) -> bool {
        self.problem.eval_f(&z[..self.dims.n], new_x, f) && f.is_finite()
    }

    fn eval_residuals(&self, z: &[f64], _new_x: bool, penalty: &mut [f64], grad_lagr: &mut [f64]) -> bool {
        let Ok((ev, p)) = self.evaluate(z, true) else {
            return false;
        };
        penalty.copy_from_slice(&p);

        let mut g = vec![0.0; z.len()];
        self.merit_gradient(&ev, &p, &mut g);
        for i in 0..z.len() {
            let mut proj = z[i] - g[i];
            if self.has_lo[i] {
                proj = proj.max(self.lo[i]);
            }
            if self.has_hi[i] {
                proj = proj.min(self.hi[i]);
            }
            grad_lagr[i] = z[i] - proj;
        }
        all_finite(grad_lagr)
    }
}

impl<P: NlpProblem + ?Sized> NlpProblem for AugLagrNlpAdapter<'_, P> {
    fn dims(&self) -> NlpDims {
        NlpDims {
            n: self.dims.n + self.dims.m_ineq,
            m_eq: 0,
            m_ineq: 0,
        }
    }

    fn var_bounds(&self, xl: &mut [f64], xu: &mut [f64]) -> bool {
        for i in 0..self.lo.len() {
            xl[i] = if self.has_lo[i] { self.lo[i] } else { f64::NEG_INFINITY };
            xu[i] = if self.has_hi[i] { self.hi[i] } else { f64::INFINITY };
        }
        true
    }

    fn get_starting_point(&self, x0: &mut [f64]) -> bool {
        x0.copy_from_slice(&self.start);
        true
    }

    fn eval_f(&self, z: &[f64], _new_x: bool, f: &mut f64) -> bool {
        let Ok((ev, p)) = self.evaluate(z, false) else {
            return false;
        };
        *f = ev.f + dot(&self.lambda, &p) + 0.5 * self.rho * dot(&p, &p);
        f.is_finite()
    }

    fn eval_grad_f(&self, z: &[f64], _new_x: bool, grad: &mut [f64]) -> bool {
        let Ok((ev, p)) = self.evaluate(z, true) else {
            return false;
        };
        self.merit_gradient(&ev, &p, grad);
        true
    }

    fn provides_hessian(&self) -> bool {
        self.problem.provides_hessian()
    }

    /// `H(x; λ + ρp) + ρJᵀJ` in the x block, `-ρJdᵀ` coupling x with s and
    /// `ρI` in the s block.
    fn eval_hess_lagr(
        &self,
        z: &[f64],
        _new_x: bool,
        obj_factor: f64,
        _lambda_c: &[f64],
        _lambda_d: &[f64],
        hess: &mut DMatrix<f64>,
    ) -> bool {
        let Ok((ev, p)) = self.evaluate(z, true) else {
            return false;
        };
        let n = self.dims.n;
        let mi = self.dims.m_ineq;
        let lam = self.multiplier_estimate(&p);
        let (lam_c, lam_d) = lam.split_at(self.dims.m_eq);

        let mut h_user = DMatrix::zeros(n, n);
        if !self
            .problem
            .eval_hess_lagr(&z[..n], false, 1.0, lam_c, lam_d, &mut h_user)
        {
            return false;
        }

        let rho = self.rho;
        hess.fill(0.0);
        let mut xx = h_user + (ev.jac_c.transpose() * &ev.jac_c + ev.jac_d.transpose() * &ev.jac_d) * rho;
        xx *= obj_factor;
        hess.view_mut((0, 0), (n, n)).copy_from(&xx);
        let xs = ev.jac_d.transpose() * (-rho * obj_factor);
        hess.view_mut((0, n), (n, mi)).copy_from(&xs);
        hess.view_mut((n, 0), (mi, n)).copy_from(&xs.transpose());
        for j in 0..mi {
            hess[(n + j, n + j)] = rho * obj_factor;
        }
        hess.iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// min x0⁴ + x0 x1  s.t.  x0² + x1 = 1,  -1 <= x0 x1 <= 2,  x0 >= -5
    struct Quartic;

    impl NlpProblem for Quartic {
        fn dims(&self) -> NlpDims {
            NlpDims { n: 2, m_eq: 1, m_ineq: 1 }
        }
        fn var_bounds(&self, xl: &mut [f64], xu: &mut [f64]) -> bool {
            xl.copy_from_slice(&[-5.0, f64::NEG_INFINITY]);
            xu.copy_from_slice(&[f64::INFINITY, f64::INFINITY]);
            true
        }
        fn ineq_bounds(&self, dl: &mut [f64], du: &mut [f64]) -> bool {
            dl[0] = -1.0;
            du[0] = 2.0;
            true
        }
        fn get_starting_point(&self, x0: &mut [f64]) -> bool {
            x0.copy_from_slice(&[3.0, 1.0]);
            true
        }
        fn eval_f(&self, x: &[f64], _new_x: bool, f: &mut f64) -> bool {
            *f = x[0].powi(4) + x[0] * x[1];
            true
        }
        fn eval_grad_f(&self, x: &[f64], _new_x: bool, grad: &mut [f64]) -> bool {
            grad[0] = 4.0 * x[0].powi(3) + x[1];
            grad[1] = x[0];
            true
        }
        fn eval_c(&self, x: &[f64], _new_x: bool, c: &mut [f64]) -> bool {
            c[0] = x[0] * x[0] + x[1] - 1.0;
            true
        }
        fn eval_d(&self, x: &[f64], _new_x: bool, d: &mut [f64]) -> bool {
            d[0] = x[0] * x[1];
            true
        }
        fn eval_jac_c(&self, x: &[f64], _new_x: bool, jac: &mut DMatrix<f64>) -> bool {
            jac[(0, 0)] = 2.0 * x[0];
            jac[(0, 1)] = 1.0;
            true
        }
        fn eval_jac_d(&self, x: &[f64], _new_x: bool, jac: &mut DMatrix<f64>) -> bool {
            jac[(0, 0)] = x[1];
            jac[(0, 1)] = x[0];
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
            hess[(0, 0)] = 12.0 * obj_factor * x[0] * x[0] + 2.0 * lambda_c[0];
            hess[(0, 1)] = obj_factor + lambda_d[0];
            hess[(1, 0)] = obj_factor + lambda_d[0];
            hess[(1, 1)] = 0.0;
            true
        }
    }

    fn adapter(prob: &Quartic) -> AugLagrNlpAdapter<'_, Quartic> {
        let mut al = AugLagrNlpAdapter::new(prob, &IpmSettings::default()).unwrap();
        al.set_lambda(&[0.7, -0.4]);
        al.set_rho(3.0);
        al
    }

    #[test]
    fn test_sizes_and_bounds() {
        let prob = Quartic;
        let al = adapter(&prob);
        assert_eq!(al.get_prob_sizes(), 3);
        assert_eq!(al.get_penalty_size(), 2);
        assert_eq!(al.dims(), NlpDims { n: 3, m_eq: 0, m_ineq: 0 });

        let mut xl = [0.0; 3];
        let mut xu = [0.0; 3];
        assert!(al.var_bounds(&mut xl, &mut xu));
        assert_eq!(xl, [-5.0, f64::NEG_INFINITY, -1.0]);
        assert_eq!(xu, [f64::INFINITY, f64::INFINITY, 2.0]);
    }

    #[test]
    fn test_user_starting_point_clips_slacks() {
        let prob = Quartic;
        let al = adapter(&prob);
        let mut z0 = [0.0; 3];
        assert!(al.get_user_starting_point(&mut z0));
        // d(x0) = 3 lies above du = 2
        assert_eq!(z0, [3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_merit_gradient_matches_finite_differences() {
        let prob = Quartic;
        let al = adapter(&prob);
        let z = [0.8, -0.3, 0.5];
        let mut grad = [0.0; 3];
        assert!(al.eval_grad_f(&z, true, &mut grad));

        let h = 1e-6;
        for i in 0..3 {
            let mut zp = z;
            let mut zm = z;
            zp[i] += h;
            zm[i] -= h;
            let (mut fp, mut fm) = (0.0, 0.0);
            assert!(al.eval_f(&zp, true, &mut fp));
            assert!(al.eval_f(&zm, true, &mut fm));
            assert_relative_eq!(grad[i], (fp - fm) / (2.0 * h), epsilon = 1e-6, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_hessian_matches_gradient_differences() {
        let prob = Quartic;
        let al = adapter(&prob);
        let z = [0.8, -0.3, 0.5];
        let mut hess = DMatrix::zeros(3, 3);
        assert!(al.eval_hess_lagr(&z, true, 1.0, &[], &[], &mut hess));

        let h = 1e-6;
        for j in 0..3 {
            let mut zp = z;
            let mut zm = z;
            zp[j] += h;
            zm[j] -= h;
            let mut gp = [0.0; 3];
            let mut gm = [0.0; 3];
            assert!(al.eval_grad_f(&zp, true, &mut gp));
            assert!(al.eval_grad_f(&zm, true, &mut gm));
            for i in 0..3 {
                assert_relative_eq!(hess[(i, j)], (gp[i] - gm[i]) / (2.0 * h), epsilon = 1e-5, max_relative = 1e-5);
            }
        }
        assert_eq!(hess, hess.transpose());
    }

    #[test]
    fn test_residuals_report_penalty_and_projected_gradient() {
        let prob = Quartic;
        let al = adapter(&prob);
        // Interior point: the projection is inactive and r = ∇L
        let z = [0.2, 0.9, 0.3];
        let mut p = [0.0; 2];
        let mut r = [0.0; 3];
        assert!(al.eval_residuals(&z, true, &mut p, &mut r));
        assert_relative_eq!(p[0], -0.06, epsilon = 1e-12);
        assert_relative_eq!(p[1], -0.12, epsilon = 1e-12);

        let mut g = [0.0; 3];
        assert!(al.eval_grad_f(&z, true, &mut g));
        for i in 0..3 {
            assert_relative_eq!(r[i], g[i], epsilon = 1e-12);
        }

        // Slack on its upper bound with -∇L pointing out of the box
        let mut al = adapter(&prob);
        al.set_lambda(&[0.7, 10.0]);
        let z = [1.0, 2.0, 2.0];
        assert!(al.eval_residuals(&z, true, &mut p, &mut r));
        assert_eq!(p[1], 0.0);
        assert_eq!(r[2], 0.0);
    }

    #[test]
    fn test_multiplier_estimate() {
        let prob = Quartic;
        let al = adapter(&prob);
        let lam = al.multiplier_estimate(&[1.0, -2.0]);
        assert_relative_eq!(lam[0], 3.7, epsilon = 1e-12);
        assert_relative_eq!(lam[1], -6.4, epsilon = 1e-12);
    }
}
