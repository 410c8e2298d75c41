//! Hessian of the Lagrangian: exact or dense damped BFGS.

use nalgebra::{DMatrix, DVector};

use crate::error::{NlpError, NlpResult};
use crate::problem::NlpProblem;

use super::evaluation::NlpEvaluation;

/// Curvature pairs with sᵀr at or below this are skipped.
const MIN_CURVATURE: f64 = 1e-12;

/// Powell damping threshold.
const DAMPING: f64 = 0.2;

/// Hessian strategy, chosen once per run.
#[derive(Debug, Clone)]
pub enum HessianStrategy {
    Exact { hess: DMatrix<f64> },
    QuasiNewton(DenseBfgs),
}

impl HessianStrategy {
    pub fn exact(n: usize) -> Self {
        HessianStrategy::Exact { hess: DMatrix::zeros(n, n) }
    }

    pub fn quasi_newton(n: usize) -> Self {
        HessianStrategy::QuasiNewton(DenseBfgs::new(n))
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, HessianStrategy::Exact { .. })
    }

    /// Refresh the matrix at `x` with the current multipliers.
    ///
    /// Derivatives in `eval` must already be evaluated at `x`.
    pub fn update<P: NlpProblem + ?Sized>(
        &mut self,
        problem: &P,
        x: &[f64],
        eval: &NlpEvaluation,
        yc: &[f64],
        yd: &[f64],
    ) -> NlpResult<()> {
        match self {
            HessianStrategy::Exact { hess } => {
                hess.fill(0.0);
                if !problem.eval_hess_lagr(x, false, 1.0, yc, yd, hess) || hess.iter().any(|v| !v.is_finite()) {
                    return Err(NlpError::Evaluation { what: "eval_hess_lagr" });
                }
                Ok(())
            }
            HessianStrategy::QuasiNewton(bfgs) => {
                bfgs.update(x, eval, yc, yd);
                Ok(())
            }
        }
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        match self {
            HessianStrategy::Exact { hess } => hess,
            HessianStrategy::QuasiNewton(bfgs) => &bfgs.b,
        }
    }
}

/// Dense damped BFGS approximation.
///
/// The pair is `s = x⁺ - x` and `y = ∇ₓL(x⁺, λ⁺) - ∇ₓL(x, λ⁺)`, both
/// gradients taken with the newest constraint multipliers.
#[derive(Debug, Clone)]
pub struct DenseBfgs {
    b: DMatrix<f64>,
    scaled: bool,
    prev: Option<BfgsPoint>,
    /// Number of pairs skipped for lack of curvature
    pub skipped: usize,
}

#[derive(Debug, Clone)]
struct BfgsPoint {
    x: Vec<f64>,
    eval: NlpEvaluation,
}

impl DenseBfgs {
    pub fn new(n: usize) -> Self {
        Self {
            b: DMatrix::identity(n, n),
            scaled: false,
            prev: None,
            skipped: 0,
        }
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.b
    }

    pub fn update(&mut self, x: &[f64], eval: &NlpEvaluation, yc: &[f64], yd: &[f64]) {
        if let Some(prev) = self.prev.take() {
            let s = DVector::from_iterator(x.len(), x.iter().zip(&prev.x).map(|(a, b)| a - b));
            let g_new = eval.lagrangian_gradient(yc, yd);
            let g_old = prev.eval.lagrangian_gradient(yc, yd);
            let y = DVector::from_iterator(x.len(), g_new.iter().zip(&g_old).map(|(a, b)| a - b));
            self.update_pair(&s, &y);
        }
        self.prev = Some(BfgsPoint { x: x.to_vec(), eval: eval.clone() });
    }

    /// Damped BFGS update with the pair `(s, y)`.
    pub fn update_pair(&mut self, s: &DVector<f64>, y: &DVector<f64>) {
        let sy = s.dot(y);
        if !self.scaled && sy > MIN_CURVATURE {
            let scale = y.dot(y) / sy;
            self.b = DMatrix::identity(s.len(), s.len()) * scale;
            self.scaled = true;
        }

        let bs = &self.b * s;
        let sbs = s.dot(&bs);
        if sbs <= MIN_CURVATURE {
            self.skipped += 1;
            return;
        }
        let theta = if sy >= DAMPING * sbs {
            1.0
        } else {
            (1.0 - DAMPING) * sbs / (sbs - sy)
        };
        let r = y * theta + &bs * (1.0 - theta);
        let sr = s.dot(&r);
        if sr <= MIN_CURVATURE {
            self.skipped += 1;
            return;
        }
        self.b += &r * r.transpose() / sr - &bs * bs.transpose() / sbs;
    }
}
