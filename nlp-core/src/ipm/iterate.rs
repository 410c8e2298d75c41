//! Primal-dual iterate.
//!
//! Slacks are carried explicitly and moved with the same direction as the
//! variables they measure:
//!
//! ```text
//! sxl = x - xl    sxu = xu - x    sdl = d - dl    sdu = du - d
//! ```
//!
//! Entries whose bound is absent hold zero slack and zero multiplier and are
//! never touched by a step.

use crate::linalg::kkt::Direction;
use crate::problem::{NlpDims, ProblemBounds};

/// Primal-dual point of the barrier problem.
#[derive(Debug, Clone)]
pub struct Iterate {
    /// Primal variables (n)
    pub x: Vec<f64>,
    /// Inequality slack variables, d(x) - d = 0 at feasibility (m_ineq)
    pub d: Vec<f64>,

    pub sxl: Vec<f64>,
    pub sxu: Vec<f64>,
    pub sdl: Vec<f64>,
    pub sdu: Vec<f64>,

    /// Equality multipliers (m_eq)
    pub yc: Vec<f64>,
    /// Inequality multipliers (m_ineq)
    pub yd: Vec<f64>,

    /// Bound multipliers for xl / xu (n)
    pub zl: Vec<f64>,
    pub zu: Vec<f64>,
    /// Bound multipliers for dl / du (m_ineq)
    pub vl: Vec<f64>,
    pub vu: Vec<f64>,
}

/// Full search direction including the bound multipliers.
#[derive(Debug, Clone)]
pub struct StepDirection {
    pub dx: Vec<f64>,
    pub dd: Vec<f64>,
    pub dyc: Vec<f64>,
    pub dyd: Vec<f64>,
    pub dzl: Vec<f64>,
    pub dzu: Vec<f64>,
    pub dvl: Vec<f64>,
    pub dvu: Vec<f64>,
}

impl Iterate {
    pub fn new(dims: &NlpDims) -> Self {
        let (n, me, mi) = (dims.n, dims.m_eq, dims.m_ineq);
        Self {
            x: vec![0.0; n],
            d: vec![0.0; mi],
            sxl: vec![0.0; n],
            sxu: vec![0.0; n],
            sdl: vec![0.0; mi],
            sdu: vec![0.0; mi],
            yc: vec![0.0; me],
            yd: vec![0.0; mi],
            zl: vec![0.0; n],
            zu: vec![0.0; n],
            vl: vec![0.0; mi],
            vu: vec![0.0; mi],
        }
    }

    /// Recompute every present slack from `x` and `d`.
    ///
    /// A slack that rounds to a non-positive value is replaced by `floor`.
    pub fn set_slacks_from_primals(&mut self, b: &ProblemBounds, floor: f64) {
        for i in 0..self.x.len() {
            self.sxl[i] = if b.has_xl[i] { (self.x[i] - b.xl[i]).max(floor) } else { 0.0 };
            self.sxu[i] = if b.has_xu[i] { (b.xu[i] - self.x[i]).max(floor) } else { 0.0 };
        }
        for j in 0..self.d.len() {
            self.sdl[j] = if b.has_dl[j] { (self.d[j] - b.dl[j]).max(floor) } else { 0.0 };
            self.sdu[j] = if b.has_du[j] { (b.du[j] - self.d[j]).max(floor) } else { 0.0 };
        }
    }

    /// Set every present bound multiplier to `value`, absent ones to 0.
    pub fn set_bound_duals(&mut self, b: &ProblemBounds, value: f64) {
        fill_masked(&mut self.zl, &b.has_xl, value);
        fill_masked(&mut self.zu, &b.has_xu, value);
        fill_masked(&mut self.vl, &b.has_dl, value);
        fill_masked(&mut self.vu, &b.has_du, value);
    }

    /// Largest alpha in (0, 1] keeping every present slack above (1 - tau) of
    /// its current value.
    pub fn max_primal_step(&self, dir: &StepDirection, b: &ProblemBounds, tau: f64) -> f64 {
        let mut alpha = 1.0;
        alpha = fraction_to_boundary(&self.sxl, &dir.dx, 1.0, &b.has_xl, tau, alpha);
        alpha = fraction_to_boundary(&self.sxu, &dir.dx, -1.0, &b.has_xu, tau, alpha);
        alpha = fraction_to_boundary(&self.sdl, &dir.dd, 1.0, &b.has_dl, tau, alpha);
        alpha = fraction_to_boundary(&self.sdu, &dir.dd, -1.0, &b.has_du, tau, alpha);
        alpha
    }

    /// Same rule applied to the bound multipliers.
    pub fn max_dual_step(&self, dir: &StepDirection, b: &ProblemBounds, tau: f64) -> f64 {
        let mut alpha = 1.0;
        alpha = fraction_to_boundary(&self.zl, &dir.dzl, 1.0, &b.has_xl, tau, alpha);
        alpha = fraction_to_boundary(&self.zu, &dir.dzu, 1.0, &b.has_xu, tau, alpha);
        alpha = fraction_to_boundary(&self.vl, &dir.dvl, 1.0, &b.has_dl, tau, alpha);
        alpha = fraction_to_boundary(&self.vu, &dir.dvu, 1.0, &b.has_du, tau, alpha);
        alpha
    }

    /// `self = from + alpha * (dx, dd)` on the primal part and slacks.
    /// Multipliers are copied from `from`.
    pub fn set_primal_trial(&mut self, from: &Iterate, dir: &StepDirection, b: &ProblemBounds, alpha: f64) {
        self.clone_from(from);
        for i in 0..self.x.len() {
            self.x[i] += alpha * dir.dx[i];
            if b.has_xl[i] {
                self.sxl[i] += alpha * dir.dx[i];
            }
            if b.has_xu[i] {
                self.sxu[i] -= alpha * dir.dx[i];
            }
        }
        for j in 0..self.d.len() {
            self.d[j] += alpha * dir.dd[j];
            if b.has_dl[j] {
                self.sdl[j] += alpha * dir.dd[j];
            }
            if b.has_du[j] {
                self.sdu[j] -= alpha * dir.dd[j];
            }
        }
    }

    /// Bound multipliers `+= alpha_dual * dz`.
    pub fn take_bound_dual_step(&mut self, dir: &StepDirection, b: &ProblemBounds, alpha_dual: f64) {
        axpy_masked(&mut self.zl, &dir.dzl, &b.has_xl, alpha_dual);
        axpy_masked(&mut self.zu, &dir.dzu, &b.has_xu, alpha_dual);
        axpy_masked(&mut self.vl, &dir.dvl, &b.has_dl, alpha_dual);
        axpy_masked(&mut self.vu, &dir.dvu, &b.has_du, alpha_dual);
    }

    /// Constraint multipliers `+= alpha * dy`.
    pub fn take_constraint_dual_step(&mut self, dir: &StepDirection, alpha: f64) {
        for (y, dy) in self.yc.iter_mut().zip(&dir.dyc) {
            *y += alpha * dy;
        }
        for (y, dy) in self.yd.iter_mut().zip(&dir.dyd) {
            *y += alpha * dy;
        }
    }

    /// Clip bound multipliers into `[mu / (kappa_sigma s), kappa_sigma mu / s]`.
    pub fn clip_bound_duals(&mut self, b: &ProblemBounds, mu: f64, kappa_sigma: f64) {
        clip_masked(&mut self.zl, &self.sxl, &b.has_xl, mu, kappa_sigma);
        clip_masked(&mut self.zu, &self.sxu, &b.has_xu, mu, kappa_sigma);
        clip_masked(&mut self.vl, &self.sdl, &b.has_dl, mu, kappa_sigma);
        clip_masked(&mut self.vu, &self.sdu, &b.has_du, mu, kappa_sigma);
    }

    /// Primal barrier diagonals `(Σx, Σd)`.
    pub fn barrier_diagonals(&self, b: &ProblemBounds) -> (Vec<f64>, Vec<f64>) {
        let sigma_x = (0..self.x.len())
            .map(|i| {
                let mut s = 0.0;
                if b.has_xl[i] {
                    s += self.zl[i] / self.sxl[i];
                }
                if b.has_xu[i] {
                    s += self.zu[i] / self.sxu[i];
                }
                s
            })
            .collect();
        let sigma_d = (0..self.d.len())
            .map(|j| {
                let mut s = 0.0;
                if b.has_dl[j] {
                    s += self.vl[j] / self.sdl[j];
                }
                if b.has_du[j] {
                    s += self.vu[j] / self.sdu[j];
                }
                s
            })
            .collect();
        (sigma_x, sigma_d)
    }

    /// Every present slack and bound multiplier is strictly positive.
    pub fn is_interior(&self, b: &ProblemBounds) -> bool {
        let positive = |v: &[f64], mask: &[bool]| v.iter().zip(mask).all(|(&x, &on)| !on || x > 0.0);
        positive(&self.sxl, &b.has_xl)
            && positive(&self.sxu, &b.has_xu)
            && positive(&self.sdl, &b.has_dl)
            && positive(&self.sdu, &b.has_du)
            && positive(&self.zl, &b.has_xl)
            && positive(&self.zu, &b.has_xu)
            && positive(&self.vl, &b.has_dl)
            && positive(&self.vu, &b.has_du)
    }
}

impl StepDirection {
    /// Complete a KKT direction with the bound-multiplier steps obtained by
    /// back-substitution into the linearized complementarity conditions.
    pub fn from_kkt(dir: Direction, it: &Iterate, b: &ProblemBounds, mu: f64) -> Self {
        let n = it.x.len();
        let mi = it.d.len();
        let mut dzl = vec![0.0; n];
        let mut dzu = vec![0.0; n];
        for i in 0..n {
            if b.has_xl[i] {
                dzl[i] = mu / it.sxl[i] - it.zl[i] - it.zl[i] / it.sxl[i] * dir.dx[i];
            }
            if b.has_xu[i] {
                dzu[i] = mu / it.sxu[i] - it.zu[i] + it.zu[i] / it.sxu[i] * dir.dx[i];
            }
        }
        let mut dvl = vec![0.0; mi];
        let mut dvu = vec![0.0; mi];
        for j in 0..mi {
            if b.has_dl[j] {
                dvl[j] = mu / it.sdl[j] - it.vl[j] - it.vl[j] / it.sdl[j] * dir.dd[j];
            }
            if b.has_du[j] {
                dvu[j] = mu / it.sdu[j] - it.vu[j] + it.vu[j] / it.sdu[j] * dir.dd[j];
            }
        }
        Self {
            dx: dir.dx,
            dd: dir.dd,
            dyc: dir.dyc,
            dyd: dir.dyd,
            dzl,
            dzu,
            dvl,
            dvu,
        }
    }

    /// Relative size of the primal step, max |dx_i| / (1 + |x_i|).
    pub fn relative_primal_size(&self, it: &Iterate) -> f64 {
        self.dx
            .iter()
            .zip(&it.x)
            .chain(self.dd.iter().zip(&it.d))
            .fold(0.0, |acc, (dv, v)| acc.max(dv.abs() / (1.0 + v.abs())))
    }
}

/// Push `v` strictly inside `[lo, hi]`.
///
/// With both bounds present the push is
/// `min(kappa1 max(1, |bound|), kappa2 (hi - lo))` on each side; with one
/// bound it is `kappa1 max(1, |bound|)`.
pub fn project_into_interior(
    v: &mut [f64],
    lo: &[f64],
    hi: &[f64],
    has_lo: &[bool],
    has_hi: &[bool],
    kappa1: f64,
    kappa2: f64,
) {
    for i in 0..v.len() {
        match (has_lo[i], has_hi[i]) {
            (true, true) => {
                let range = hi[i] - lo[i];
                let pl = (kappa1 * lo[i].abs().max(1.0)).min(kappa2 * range);
                let pu = (kappa1 * hi[i].abs().max(1.0)).min(kappa2 * range);
                v[i] = v[i].max(lo[i] + pl).min(hi[i] - pu);
            }
            (true, false) => {
                v[i] = v[i].max(lo[i] + kappa1 * lo[i].abs().max(1.0));
            }
            (false, true) => {
                v[i] = v[i].min(hi[i] - kappa1 * hi[i].abs().max(1.0));
            }
            (false, false) => {}
        }
    }
}

fn fraction_to_boundary(s: &[f64], ds: &[f64], sign: f64, mask: &[bool], tau: f64, alpha: f64) -> f64 {
    s.iter()
        .zip(ds)
        .zip(mask)
        .filter(|(_, &on)| on)
        .fold(alpha, |acc, ((&si, &dsi), _)| {
            let step = sign * dsi;
            if step < 0.0 {
                acc.min(-tau * si / step)
            } else {
                acc
            }
        })
}

fn fill_masked(v: &mut [f64], mask: &[bool], value: f64) {
    for (vi, &on) in v.iter_mut().zip(mask) {
        *vi = if on { value } else { 0.0 };
    }
}

fn axpy_masked(v: &mut [f64], dv: &[f64], mask: &[bool], alpha: f64) {
    for ((vi, &dvi), &on) in v.iter_mut().zip(dv).zip(mask) {
        if on {
            *vi += alpha * dvi;
        }
    }
}

fn clip_masked(z: &mut [f64], s: &[f64], mask: &[bool], mu: f64, kappa_sigma: f64) {
    for ((zi, &si), &on) in z.iter_mut().zip(s).zip(mask) {
        if on {
            let lo = mu / (kappa_sigma * si);
            let hi = kappa_sigma * mu / si;
            *zi = zi.max(lo).min(hi);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(xl: Vec<f64>, xu: Vec<f64>) -> ProblemBounds {
        let has_xl = xl.iter().map(|b| b.is_finite()).collect();
        let has_xu = xu.iter().map(|b| b.is_finite()).collect();
        ProblemBounds {
            xl,
            xu,
            has_xl,
            has_xu,
            dl: vec![],
            du: vec![],
            has_dl: vec![],
            has_du: vec![],
            n_relaxed_fixed: 0,
        }
    }

    fn dims(n: usize) -> NlpDims {
        NlpDims { n, m_eq: 0, m_ineq: 0 }
    }

    #[test]
    fn test_projection_into_interior() {
        let b = bounds(
            vec![0.0, 0.0, f64::NEG_INFINITY, 1e3],
            vec![1.0, f64::INFINITY, -5.0, 1e3 + 1e-6],
        );
        let mut x = vec![-3.0, 0.0, 0.0, 0.0];
        project_into_interior(&mut x, &b.xl, &b.xu, &b.has_xl, &b.has_xu, 1e-2, 1e-2);

        assert!((x[0] - 1e-2).abs() < 1e-15);
        assert!((x[1] - 1e-2).abs() < 1e-15);
        assert!((x[2] - (-5.05)).abs() < 1e-12);
        assert!(x[3] > 1e3 && x[3] < 1e3 + 1e-6);
    }

    #[test]
    fn test_fraction_to_boundary() {
        let b = bounds(vec![0.0, f64::NEG_INFINITY], vec![f64::INFINITY, f64::INFINITY]);
        let mut it = Iterate::new(&dims(2));
        it.x = vec![1.0, 1.0];
        it.set_slacks_from_primals(&b, 1e-16);
        it.set_bound_duals(&b, 1.0);

        let dir = StepDirection {
            dx: vec![-2.0, -100.0],
            dd: vec![],
            dyc: vec![],
            dyd: vec![],
            dzl: vec![-0.5, -7.0],
            dzu: vec![0.0, 0.0],
            dvl: vec![],
            dvu: vec![],
        };
        // x1 has no lower bound, so only x0 limits the step
        assert!((it.max_primal_step(&dir, &b, 0.99) - 0.495).abs() < 1e-15);
        assert_eq!(it.max_dual_step(&dir, &b, 0.99), 1.0);

        let mut trial = Iterate::new(&dims(2));
        trial.set_primal_trial(&it, &dir, &b, 0.495);
        assert!(trial.is_interior(&b));
        assert!((trial.sxl[0] - 0.01).abs() < 1e-14);
        assert_eq!(trial.sxl[1], 0.0);
    }

    #[test]
    fn test_kappa_sigma_clipping() {
        let b = bounds(vec![0.0, 0.0], vec![f64::INFINITY, f64::INFINITY]);
        let mut it = Iterate::new(&dims(2));
        it.x = vec![1.0, 1.0];
        it.set_slacks_from_primals(&b, 1e-16);
        it.zl = vec![1e6, 1e-9];

        it.clip_bound_duals(&b, 0.1, 10.0);
        assert_eq!(it.zl[0], 1.0);
        assert!((it.zl[1] - 0.01).abs() < 1e-15);
    }

    #[test]
    fn test_bound_dual_recovery_satisfies_linearized_complementarity() {
        let b = bounds(vec![0.0], vec![2.0]);
        let mut it = Iterate::new(&dims(1));
        it.x = vec![0.5];
        it.set_slacks_from_primals(&b, 1e-16);
        it.set_bound_duals(&b, 0.3);
        let mu = 0.1;
        let dir = StepDirection::from_kkt(
            Direction { dx: vec![0.2], ..Direction::default() },
            &it,
            &b,
            mu,
        );
        // z ds + s dz = mu - s z, with ds = dx for the lower and -dx for the upper slack
        let lhs_l = it.zl[0] * 0.2 + it.sxl[0] * dir.dzl[0];
        let lhs_u = -it.zu[0] * 0.2 + it.sxu[0] * dir.dzu[0];
        assert!((lhs_l - (mu - it.sxl[0] * it.zl[0])).abs() < 1e-14);
        assert!((lhs_u - (mu - it.sxu[0] * it.zu[0])).abs() < 1e-14);
    }
}
