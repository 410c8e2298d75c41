//! KKT residuals and scaled error measures.
//!
//! Stationarity uses the Lagrangian
//! `f + ycᵀc + ydᵀ(d(x) - d) - zlᵀ(x - xl) - zuᵀ(xu - x) - vlᵀ(d - dl) - vuᵀ(du - d)`:
//!
//! ```text
//! rx = ∇f + Jcᵀ yc + Jdᵀ yd - zl + zu
//! rd = -yd - vl + vu
//! ```
//!
//! The overall error divides optimality and complementarity by multiplier
//! scalings `sd, sc ≥ 1` that only kick in once the average multiplier
//! magnitude exceeds `p_smax`.

use crate::linalg::dense::{inf_norm, masked_complementarity, masked_log_sum, masked_one_norm, one_norm};
use crate::problem::ProblemBounds;

use super::evaluation::NlpEvaluation;
use super::iterate::{Iterate, StepDirection};

/// Residual vectors and derived error norms at one iterate.
#[derive(Debug, Clone, Default)]
pub struct Residual {
    pub rx: Vec<f64>,
    pub rd: Vec<f64>,
    /// c(x)
    pub rc: Vec<f64>,
    /// d(x) - d
    pub ryd: Vec<f64>,

    pub nlp_optim: f64,
    pub nlp_feas: f64,
    pub nlp_complem: f64,
    pub nlp_overall: f64,

    pub bar_optim: f64,
    pub bar_feas: f64,
    pub bar_complem: f64,
    pub bar_overall: f64,

    sd: f64,
    sc: f64,
}

impl Residual {
    /// Recompute every vector and norm.
    pub fn update(&mut self, it: &Iterate, eval: &NlpEvaluation, b: &ProblemBounds, mu: f64, p_smax: f64) {
        self.rx = eval.lagrangian_gradient(&it.yc, &it.yd);
        for i in 0..self.rx.len() {
            if b.has_xl[i] {
                self.rx[i] -= it.zl[i];
            }
            if b.has_xu[i] {
                self.rx[i] += it.zu[i];
            }
        }
        self.rd = (0..it.d.len())
            .map(|j| {
                let mut r = -it.yd[j];
                if b.has_dl[j] {
                    r -= it.vl[j];
                }
                if b.has_du[j] {
                    r += it.vu[j];
                }
                r
            })
            .collect();
        self.rc = eval.c.clone();
        self.ryd = eval.d.iter().zip(&it.d).map(|(dx, d)| dx - d).collect();

        self.nlp_optim = inf_norm(&self.rx).max(inf_norm(&self.rd));
        self.nlp_feas = inf_norm(&self.rc).max(inf_norm(&self.ryd));
        self.nlp_complem = complementarity(it, b, 0.0);

        let n_b = b.num_bounds();
        let z_norm = masked_one_norm(&it.zl, &b.has_xl)
            + masked_one_norm(&it.zu, &b.has_xu)
            + masked_one_norm(&it.vl, &b.has_dl)
            + masked_one_norm(&it.vu, &b.has_du);
        let y_norm = one_norm(&it.yc) + one_norm(&it.yd);
        let m = it.yc.len() + it.yd.len();

        self.sd = if m + n_b > 0 {
            p_smax.max((y_norm + z_norm) / (m + n_b) as f64) / p_smax
        } else {
            1.0
        };
        self.sc = if n_b > 0 {
            p_smax.max(z_norm / n_b as f64) / p_smax
        } else {
            1.0
        };

        self.nlp_overall = (self.nlp_optim / self.sd)
            .max(self.nlp_feas)
            .max(self.nlp_complem / self.sc);

        self.bar_optim = self.nlp_optim;
        self.bar_feas = self.nlp_feas;
        self.update_barrier(it, b, mu);
    }

    /// Recompute the log-barrier measures after a change of mu.
    pub fn update_barrier(&mut self, it: &Iterate, b: &ProblemBounds, mu: f64) {
        self.bar_complem = complementarity(it, b, mu);
        self.bar_overall = (self.bar_optim / self.sd)
            .max(self.bar_feas)
            .max(self.bar_complem / self.sc);
    }
}

/// max |s z - mu| over all present bounds.
pub fn complementarity(it: &Iterate, b: &ProblemBounds, mu: f64) -> f64 {
    masked_complementarity(&it.sxl, &it.zl, &b.has_xl, mu)
        .max(masked_complementarity(&it.sxu, &it.zu, &b.has_xu, mu))
        .max(masked_complementarity(&it.sdl, &it.vl, &b.has_dl, mu))
        .max(masked_complementarity(&it.sdu, &it.vu, &b.has_du, mu))
}

/// Constraint violation ‖c(x)‖₁ + ‖d(x) - d‖₁.
pub fn theta(eval: &NlpEvaluation, it: &Iterate) -> f64 {
    one_norm(&eval.c) + eval.d.iter().zip(&it.d).map(|(dx, d)| (dx - d).abs()).sum::<f64>()
}

/// Log-barrier objective f - mu Σ ln(s).
pub fn phi(eval: &NlpEvaluation, it: &Iterate, b: &ProblemBounds, mu: f64) -> f64 {
    let logs = masked_log_sum(&it.sxl, &b.has_xl)
        + masked_log_sum(&it.sxu, &b.has_xu)
        + masked_log_sum(&it.sdl, &b.has_dl)
        + masked_log_sum(&it.sdu, &b.has_du);
    eval.f - mu * logs
}

/// Directional derivative of phi along the primal part of `dir`.
pub fn phi_directional_derivative(
    eval: &NlpEvaluation,
    it: &Iterate,
    dir: &StepDirection,
    b: &ProblemBounds,
    mu: f64,
) -> f64 {
    let mut dphi = 0.0;
    for i in 0..it.x.len() {
        let mut g = eval.grad_f[i];
        if b.has_xl[i] {
            g -= mu / it.sxl[i];
        }
        if b.has_xu[i] {
            g += mu / it.sxu[i];
        }
        dphi += g * dir.dx[i];
    }
    for j in 0..it.d.len() {
        let mut g = 0.0;
        if b.has_dl[j] {
            g -= mu / it.sdl[j];
        }
        if b.has_du[j] {
            g += mu / it.sdu[j];
        }
        dphi += g * dir.dd[j];
    }
    dphi
}

/// Barrier-augmented right-hand sides `(rx, rd)` of the Newton system.
pub fn barrier_gradients(eval: &NlpEvaluation, it: &Iterate, b: &ProblemBounds, mu: f64) -> (Vec<f64>, Vec<f64>) {
    let mut rx = eval.lagrangian_gradient(&it.yc, &it.yd);
    for i in 0..rx.len() {
        if b.has_xl[i] {
            rx[i] -= mu / it.sxl[i];
        }
        if b.has_xu[i] {
            rx[i] += mu / it.sxu[i];
        }
    }
    let rd = (0..it.d.len())
        .map(|j| {
            let mut r = -it.yd[j];
            if b.has_dl[j] {
                r -= mu / it.sdl[j];
            }
            if b.has_du[j] {
                r += mu / it.sdu[j];
            }
            r
        })
        .collect();
    (rx, rd)
}
