//! Primal-dual KKT system for the barrier Newton step.
//!
//! Unknowns `[dx, dd, dyc, dyd]`, matrix
//!
//! ```text
//! [ W + Σx + δw I        0          Jcᵀ      Jdᵀ  ] [dx ]   [rhs_x ]
//! [      0          Σd + δw I        0       -I   ] [dd ] = [rhs_d ]
//! [      Jc              0        -δc I       0   ] [dyc]   [rhs_yc]
//! [      Jd             -I           0     -δc I  ] [dyd]   [rhs_yd]
//! ```
//!
//! The step is a descent direction for the barrier problem only when the
//! matrix has inertia `(n + m_ineq, m_eq + m_ineq, 0)`. The dense solver
//! reads the inertia from a symmetric eigendecomposition and shifts the
//! diagonal until it matches.

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use thiserror::Error;

use super::dense::all_finite;
use super::regularization::{RegularizationPolicy, RegularizationState};

#[derive(Debug, Error)]
pub enum KktError {
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("KKT matrix has non-finite entries")]
    NonFiniteMatrix,

    #[error("inertia correction failed (delta_w exceeded {delta_w_max:.1e})")]
    InertiaCorrectionFailed { delta_w_max: f64 },

    #[error("KKT solution is not finite")]
    NonFiniteSolution,
}

/// Data of one Newton system.
#[derive(Debug)]
pub struct KktInput<'a> {
    /// Hessian (or approximation) of the Lagrangian, n × n
    pub hess: &'a DMatrix<f64>,
    /// Equality Jacobian, m_eq × n
    pub jac_c: &'a DMatrix<f64>,
    /// Inequality Jacobian, m_ineq × n
    pub jac_d: &'a DMatrix<f64>,
    /// Primal barrier diagonal zl/sxl + zu/sxu
    pub sigma_x: &'a [f64],
    /// Slack barrier diagonal vl/sdl + vu/sdu
    pub sigma_d: &'a [f64],
    pub rhs_x: &'a [f64],
    pub rhs_d: &'a [f64],
    pub rhs_yc: &'a [f64],
    pub rhs_yd: &'a [f64],
    /// Current barrier parameter (scales the dual shift)
    pub mu: f64,
}

/// Newton direction for the primal and constraint-multiplier blocks.
#[derive(Debug, Clone, Default)]
pub struct Direction {
    pub dx: Vec<f64>,
    pub dd: Vec<f64>,
    pub dyc: Vec<f64>,
    pub dyd: Vec<f64>,
    /// Primal shift used
    pub delta_w: f64,
    /// Dual shift used
    pub delta_c: f64,
}

/// Solver of the barrier Newton system.
pub trait KktSystem {
    fn solve(&mut self, input: &KktInput<'_>) -> Result<Direction, KktError>;

    /// Number of solves that needed a primal shift.
    fn primal_bumps(&self) -> u64 {
        0
    }
}

/// Eigenvalue counts (positive, negative, zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inertia {
    pub pos: usize,
    pub neg: usize,
    pub zero: usize,
}

/// Dense symmetric KKT solver with IPOPT-style inertia correction.
#[derive(Debug, Clone)]
pub struct DenseKktSolver {
    policy: RegularizationPolicy,
    state: RegularizationState,
    /// Threshold, relative to the largest scaled eigenvalue, below which an
    /// eigenvalue counts as zero
    zero_tol: f64,
}

const EQUILIBRATION_PASSES: usize = 3;

impl DenseKktSolver {
    pub fn new(policy: RegularizationPolicy) -> Self {
        Self {
            policy,
            state: RegularizationState::default(),
            zero_tol: 1e-13,
        }
    }

    pub fn state(&self) -> &RegularizationState {
        &self.state
    }

    fn assemble(input: &KktInput<'_>, delta_w: f64, delta_c: f64) -> DMatrix<f64> {
        let n = input.hess.nrows();
        let me = input.jac_c.nrows();
        let mi = input.jac_d.nrows();
        let dim = n + mi + me + mi;
        let (od, oyc, oyd) = (n, n + mi, n + mi + me);

        let mut k = DMatrix::<f64>::zeros(dim, dim);
        k.view_mut((0, 0), (n, n)).copy_from(input.hess);
        for i in 0..n {
            k[(i, i)] += input.sigma_x[i] + delta_w;
        }
        for j in 0..mi {
            k[(od + j, od + j)] = input.sigma_d[j] + delta_w;
            k[(od + j, oyd + j)] = -1.0;
            k[(oyd + j, od + j)] = -1.0;
        }
        k.view_mut((oyc, 0), (me, n)).copy_from(input.jac_c);
        k.view_mut((0, oyc), (n, me)).copy_from(&input.jac_c.transpose());
        k.view_mut((oyd, 0), (mi, n)).copy_from(input.jac_d);
        k.view_mut((0, oyd), (n, mi)).copy_from(&input.jac_d.transpose());
        for r in 0..me + mi {
            k[(oyc + r, oyc + r)] = -delta_c;
        }
        k
    }

    fn factor(&self, mut k: DMatrix<f64>) -> (ScaledEigen, Inertia) {
        let scale = equilibrate(&k, EQUILIBRATION_PASSES);
        for j in 0..k.ncols() {
            for i in 0..k.nrows() {
                k[(i, j)] *= scale[i] * scale[j];
            }
        }
        let eig = SymmetricEigen::new(k);
        let largest = eig.eigenvalues.amax().max(1.0);
        let mut inertia = Inertia { pos: 0, neg: 0, zero: 0 };
        for &l in eig.eigenvalues.iter() {
            if l.abs() <= self.zero_tol * largest {
                inertia.zero += 1;
            } else if l > 0.0 {
                inertia.pos += 1;
            } else {
                inertia.neg += 1;
            }
        }
        (ScaledEigen { eig, scale }, inertia)
    }
}

/// Eigendecomposition of `D K D` together with the diagonal `D`.
///
/// A congruence keeps the inertia of `K`, so counting eigenvalues of the
/// scaled matrix is valid; `K x = b` is recovered as `x = D (DKD)⁻¹ D b`.
#[derive(Debug, Clone)]
struct ScaledEigen {
    eig: SymmetricEigen<f64, nalgebra::Dyn>,
    scale: DVector<f64>,
}

impl ScaledEigen {
    fn solve(&self, rhs: &DVector<f64>) -> DVector<f64> {
        let b = rhs.component_mul(&self.scale);
        let mut w = self.eig.eigenvectors.tr_mul(&b);
        for (wi, &l) in w.iter_mut().zip(self.eig.eigenvalues.iter()) {
            *wi /= l;
        }
        (&self.eig.eigenvectors * w).component_mul(&self.scale)
    }
}

/// Symmetric Ruiz scaling: repeatedly divide row and column `i` by the
/// square root of the largest entry of row `i`. Empty rows keep unit scale.
fn equilibrate(k: &DMatrix<f64>, passes: usize) -> DVector<f64> {
    let dim = k.nrows();
    let mut scale = DVector::from_element(dim, 1.0);
    for _ in 0..passes {
        let mut step = DVector::from_element(dim, 1.0);
        for i in 0..dim {
            let row_max = (0..dim).fold(0.0_f64, |acc, j| acc.max((k[(i, j)] * scale[i] * scale[j]).abs()));
            if row_max > 0.0 {
                step[i] = 1.0 / row_max.sqrt();
            }
        }
        scale.component_mul_assign(&step);
    }
    scale
}

impl KktSystem for DenseKktSolver {
    fn solve(&mut self, input: &KktInput<'_>) -> Result<Direction, KktError> {
        let n = input.hess.nrows();
        let me = input.jac_c.nrows();
        let mi = input.jac_d.nrows();
        if input.hess.ncols() != n
            || input.jac_c.ncols() != n
            || input.jac_d.ncols() != n
            || input.sigma_x.len() != n
            || input.sigma_d.len() != mi
            || input.rhs_x.len() != n
            || input.rhs_d.len() != mi
            || input.rhs_yc.len() != me
            || input.rhs_yd.len() != mi
        {
            return Err(KktError::DimensionMismatch(format!(
                "n = {}, m_eq = {}, m_ineq = {}",
                n, me, mi
            )));
        }
        if input.hess.iter().any(|v| !v.is_finite())
            || input.jac_c.iter().any(|v| !v.is_finite())
            || input.jac_d.iter().any(|v| !v.is_finite())
            || !all_finite(input.sigma_x)
            || !all_finite(input.sigma_d)
        {
            return Err(KktError::NonFiniteMatrix);
        }

        let target = Inertia { pos: n + mi, neg: me + mi, zero: 0 };

        let mut delta_w = 0.0;
        let mut delta_c = 0.0;
        let (mut eig, mut inertia) = self.factor(Self::assemble(input, delta_w, delta_c));

        if inertia.zero > 0 {
            delta_c = self.policy.dual_shift(input.mu);
            let refactored = self.factor(Self::assemble(input, delta_w, delta_c));
            eig = refactored.0;
            inertia = refactored.1;
        }

        if inertia != target {
            delta_w = self.policy.first_primal_shift(&self.state);
            loop {
                let refactored = self.factor(Self::assemble(input, delta_w, delta_c));
                eig = refactored.0;
                inertia = refactored.1;
                if inertia == target {
                    break;
                }
                log::trace!("inertia {:?} with delta_w = {:.2e}", inertia, delta_w);
                delta_w = match self.policy.next_primal_shift(&self.state, delta_w) {
                    Some(w) => w,
                    None => {
                        return Err(KktError::InertiaCorrectionFailed {
                            delta_w_max: self.policy.delta_w_max,
                        })
                    }
                };
            }
            self.state.delta_w_last = delta_w;
            self.state.primal_bumps += 1;
        }

        let rhs = DVector::from_iterator(
            n + mi + me + mi,
            input
                .rhs_x
                .iter()
                .chain(input.rhs_d)
                .chain(input.rhs_yc)
                .chain(input.rhs_yd)
                .copied(),
        );
        let sol = eig.solve(&rhs);
        if sol.iter().any(|v| !v.is_finite()) {
            return Err(KktError::NonFiniteSolution);
        }

        let sol = sol.as_slice();
        Ok(Direction {
            dx: sol[..n].to_vec(),
            dd: sol[n..n + mi].to_vec(),
            dyc: sol[n + mi..n + mi + me].to_vec(),
            dyd: sol[n + mi + me..].to_vec(),
            delta_w,
            delta_c,
        })
    }

    fn primal_bumps(&self) -> u64 {
        self.state.primal_bumps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn solve(
        solver: &mut DenseKktSolver,
        hess: &DMatrix<f64>,
        jac_c: &DMatrix<f64>,
        rhs_x: &[f64],
        rhs_yc: &[f64],
    ) -> Result<Direction, KktError> {
        let n = hess.nrows();
        let jac_d = DMatrix::zeros(0, n);
        let sigma_x = vec![0.0; n];
        solver.solve(&KktInput {
            hess,
            jac_c,
            jac_d: &jac_d,
            sigma_x: &sigma_x,
            sigma_d: &[],
            rhs_x,
            rhs_d: &[],
            rhs_yc,
            rhs_yd: &[],
            mu: 0.1,
        })
    }

    #[test]
    fn test_convex_system_needs_no_shift() {
        let mut solver = DenseKktSolver::new(RegularizationPolicy::default());
        let hess = DMatrix::from_diagonal_element(2, 2, 2.0);
        let jac_c = DMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
        // min x1² + x2² s.t. x1 + x2 = 1 from the origin
        let dir = solve(&mut solver, &hess, &jac_c, &[0.0, 0.0], &[1.0]).unwrap();

        assert_eq!(dir.delta_w, 0.0);
        assert_relative_eq!(dir.dx[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(dir.dx[1], 0.5, epsilon = 1e-12);
        assert_relative_eq!(dir.dyc[0], -1.0, epsilon = 1e-12);
        assert_eq!(solver.primal_bumps(), 0);
    }

    #[test]
    fn test_indefinite_hessian_is_shifted() {
        let mut solver = DenseKktSolver::new(RegularizationPolicy::default());
        let hess = DMatrix::from_diagonal_element(2, 2, -1.0);
        let jac_c = DMatrix::zeros(0, 2);
        let dir = solve(&mut solver, &hess, &jac_c, &[1.0, -2.0], &[]).unwrap();

        assert!(dir.delta_w > 1.0);
        assert_eq!(solver.primal_bumps(), 1);
        assert_eq!(solver.state().delta_w_last, dir.delta_w);
        // (W + δw I) dx = rhs
        let shifted = dir.delta_w - 1.0;
        assert_relative_eq!(dir.dx[0] * shifted, 1.0, epsilon = 1e-10);
        assert_relative_eq!(dir.dx[1] * shifted, -2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_rank_deficient_jacobian_gets_dual_shift() {
        let mut solver = DenseKktSolver::new(RegularizationPolicy::default());
        let hess = DMatrix::from_diagonal_element(2, 2, 1.0);
        let jac_c = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let dir = solve(&mut solver, &hess, &jac_c, &[0.0, 0.0], &[1.0, 1.0]).unwrap();

        assert!(dir.delta_c > 0.0);
        assert!(dir.dx.iter().all(|v| v.is_finite()));
        assert_relative_eq!(dir.dx[0] + dir.dx[1], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_huge_slack_barrier_keeps_inertia() {
        // Slack pinned against a narrow range: Σd dwarfs every other entry
        let mut solver = DenseKktSolver::new(RegularizationPolicy::default());
        let hess = DMatrix::from_diagonal_element(2, 2, 2.0);
        let jac_c = DMatrix::zeros(0, 2);
        let jac_d = DMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
        let sigma_d = 1e30;
        let dir = solver
            .solve(&KktInput {
                hess: &hess,
                jac_c: &jac_c,
                jac_d: &jac_d,
                sigma_x: &[0.0, 0.0],
                sigma_d: &[sigma_d],
                rhs_x: &[-4.0, 2.0],
                rhs_d: &[1e20],
                rhs_yc: &[],
                rhs_yd: &[0.5],
                mu: 0.1,
            })
            .unwrap();

        assert_eq!(dir.delta_w, 0.0);
        assert_eq!(dir.delta_c, 0.0);
        // Residuals of the four block rows
        assert_relative_eq!(2.0 * dir.dx[0] + dir.dyd[0], -4.0, epsilon = 1e-8);
        assert_relative_eq!(2.0 * dir.dx[1] + dir.dyd[0], 2.0, epsilon = 1e-8);
        assert_relative_eq!(sigma_d * dir.dd[0] - dir.dyd[0], 1e20, max_relative = 1e-10);
        assert_relative_eq!(dir.dx[0] + dir.dx[1] - dir.dd[0], 0.5, epsilon = 1e-8);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut solver = DenseKktSolver::new(RegularizationPolicy::default());
        let hess = DMatrix::from_diagonal_element(2, 2, 1.0);
        let jac_c = DMatrix::zeros(0, 2);
        let err = solve(&mut solver, &hess, &jac_c, &[0.0], &[]);
        assert!(matches!(err, Err(KktError::DimensionMismatch(_))));
    }

    #[test]
    fn test_correction_gives_up_at_cap() {
        let policy = RegularizationPolicy { delta_w_max: 1.0, ..Default::default() };
        let mut solver = DenseKktSolver::new(policy);
        let hess = DMatrix::from_diagonal_element(1, 1, -10.0);
        let jac_c = DMatrix::zeros(0, 1);
        let err = solve(&mut solver, &hess, &jac_c, &[1.0], &[]);
        assert!(matches!(err, Err(KktError::InertiaCorrectionFailed { .. })));
    }
}
