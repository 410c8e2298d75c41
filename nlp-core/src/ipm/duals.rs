//! Constraint-multiplier updates.
//!
//! The least-squares estimate minimizes the dual infeasibility over `y`:
//!
//! ```text
//! min_y ‖ [∇f - zl + zu; -vl + vu] + J̃ᵀ y ‖²,   J̃ = [Jc 0; Jd -I]
//! ```
//!
//! solved through the normal equations `(J̃ J̃ᵀ + δI) y = -J̃ b` with a dense
//! Cholesky factorization.

use nalgebra::{Cholesky, DMatrix, DVector};

use crate::linalg::dense::inf_norm;
use crate::options::DualsUpdateType;
use crate::problem::ProblemBounds;

use super::evaluation::NlpEvaluation;
use super::iterate::{Iterate, StepDirection};

/// Regularization of the normal equations.
const LSQ_REG: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
pub struct DualsUpdater {
    pub kind: DualsUpdateType,
}

impl DualsUpdater {
    pub fn new(kind: DualsUpdateType) -> Self {
        Self { kind }
    }

    /// Refresh `it.yc`/`it.yd` after an accepted step of length `alpha_primal`.
    pub fn update(
        &self,
        it: &mut Iterate,
        eval: &NlpEvaluation,
        b: &ProblemBounds,
        dir: &StepDirection,
        alpha_primal: f64,
    ) {
        match self.kind {
            DualsUpdateType::Newton => it.take_constraint_dual_step(dir, alpha_primal),
            DualsUpdateType::Lsq => {
                if let Some((yc, yd)) = lsq_estimate(eval, it, b) {
                    it.yc = yc;
                    it.yd = yd;
                } else {
                    log::debug!("LSQ multiplier estimate failed; taking the Newton step");
                    it.take_constraint_dual_step(dir, alpha_primal);
                }
            }
        }
    }
}

/// Least-squares constraint multipliers at `it` (bound multipliers fixed).
///
/// Returns `None` if the normal equations cannot be factored.
pub fn lsq_estimate(eval: &NlpEvaluation, it: &Iterate, b: &ProblemBounds) -> Option<(Vec<f64>, Vec<f64>)> {
    let n = it.x.len();
    let me = it.yc.len();
    let mi = it.yd.len();
    if me + mi == 0 {
        return Some((Vec::new(), Vec::new()));
    }

    let mut jt = DMatrix::<f64>::zeros(me + mi, n + mi);
    jt.view_mut((0, 0), (me, n)).copy_from(&eval.jac_c);
    jt.view_mut((me, 0), (mi, n)).copy_from(&eval.jac_d);
    for j in 0..mi {
        jt[(me + j, n + j)] = -1.0;
    }

    let mut rhs = DVector::<f64>::zeros(n + mi);
    for i in 0..n {
        rhs[i] = eval.grad_f[i];
        if b.has_xl[i] {
            rhs[i] -= it.zl[i];
        }
        if b.has_xu[i] {
            rhs[i] += it.zu[i];
        }
    }
    for j in 0..mi {
        if b.has_dl[j] {
            rhs[n + j] -= it.vl[j];
        }
        if b.has_du[j] {
            rhs[n + j] += it.vu[j];
        }
    }

    let mut normal = &jt * jt.transpose();
    for k in 0..me + mi {
        normal[(k, k)] += LSQ_REG;
    }
    let chol = Cholesky::new(normal)?;
    let y = chol.solve(&(-(&jt * rhs)));
    if y.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let y = y.as_slice();
    Some((y[..me].to_vec(), y[me..].to_vec()))
}

/// Initial constraint multipliers by least squares, discarded (zeroed) when
/// larger than `max_norm` in the infinity norm.
pub fn lsq_initial(eval: &NlpEvaluation, it: &mut Iterate, b: &ProblemBounds, max_norm: f64) {
    match lsq_estimate(eval, it, b) {
        Some((yc, yd)) if inf_norm(&yc).max(inf_norm(&yd)) <= max_norm => {
            it.yc = yc;
            it.yd = yd;
        }
        _ => {
            log::debug!("initial LSQ multipliers rejected; starting from zero");
            it.yc.fill(0.0);
            it.yd.fill(0.0);
        }
    }
}
