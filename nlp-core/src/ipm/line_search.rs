//! Backtracking filter line search.
//!
//! A trial step is rejected outright when its infeasibility exceeds
//! `theta_max` or the filter dominates it. Otherwise it is an Armijo step
//! when the current point is nearly feasible and the switching condition
//!
//! ```text
//! dphi < 0  and  alpha (-dphi)^s_phi > delta theta^s_theta
//! ```
//!
//! holds, and a filter step (sufficient decrease of theta or phi) otherwise.
//! Only filter steps augment the filter.

use crate::error::{NlpError, NlpResult};
use crate::options::IpmSettings;

use super::filter::Filter;

/// How a trial step was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Switching condition plus Armijo decrease of phi
    Armijo,
    /// Sufficient decrease of theta or phi; the filter is augmented
    Filter,
    /// Step below numerical resolution, taken without a test
    Tiny,
}

#[derive(Debug, Clone, Copy)]
pub struct Accepted {
    pub alpha: f64,
    pub kind: StepKind,
    pub backtracks: usize,
}

#[derive(Debug, Clone)]
pub struct LineSearch {
    pub theta_min: f64,
    pub theta_max: f64,
    pub gamma_theta: f64,
    pub gamma_phi: f64,
    pub s_theta: f64,
    pub s_phi: f64,
    pub delta: f64,
    pub eta_phi: f64,
    pub gamma_alpha: f64,
    pub max_backtracks: usize,
}

impl LineSearch {
    /// Thresholds relative to the constraint violation at the starting point.
    pub fn new(settings: &IpmSettings, theta0: f64) -> Self {
        Self {
            theta_min: 1e-4 * theta0.max(1.0),
            theta_max: 1e4 * theta0.max(1.0),
            gamma_theta: settings.gamma_theta,
            gamma_phi: settings.gamma_phi,
            s_theta: settings.s_theta,
            s_phi: settings.s_phi,
            delta: settings.delta,
            eta_phi: settings.eta_phi,
            gamma_alpha: settings.gamma_alpha,
            max_backtracks: settings.max_ls_backtracks,
        }
    }

    /// Smallest step length worth trying.
    pub fn alpha_min(&self, theta: f64, dphi: f64) -> f64 {
        let base = if dphi < 0.0 {
            let mut a = self.gamma_theta.min(self.gamma_phi * theta / -dphi);
            if theta <= self.theta_min {
                a = a.min(self.delta * theta.powf(self.s_theta) / (-dphi).powf(self.s_phi));
            }
            a
        } else {
            self.gamma_theta
        };
        self.gamma_alpha * base
    }

    #[inline]
    pub fn switching_condition(&self, alpha: f64, theta: f64, dphi: f64) -> bool {
        dphi < 0.0 && alpha * (-dphi).powf(self.s_phi) > self.delta * theta.powf(self.s_theta)
    }

    /// Acceptance test of one trial point.
    pub fn accept(
        &self,
        theta: f64,
        phi: f64,
        theta_trial: f64,
        phi_trial: f64,
        alpha: f64,
        dphi: f64,
        filter: &Filter,
    ) -> Option<StepKind> {
        if !(theta_trial <= self.theta_max) || !phi_trial.is_finite() {
            return None;
        }
        if filter.is_dominated(theta_trial, phi_trial) {
            return None;
        }
        if theta <= self.theta_min && self.switching_condition(alpha, theta, dphi) {
            return (phi_trial <= phi + self.eta_phi * alpha * dphi).then_some(StepKind::Armijo);
        }
        let sufficient = theta_trial <= (1.0 - self.gamma_theta) * theta
            || phi_trial <= phi - self.gamma_phi * theta;
        sufficient.then_some(StepKind::Filter)
    }

    /// Halve alpha from `alpha_max` until `trial(alpha)` yields an acceptable
    /// `(theta, phi)` pair.
    ///
    /// Fails with [`NlpError::LineSearch`] once alpha drops below
    /// [`LineSearch::alpha_min`] or the backtracking budget is spent.
    pub fn backtrack<F>(
        &self,
        alpha_max: f64,
        theta: f64,
        phi: f64,
        dphi: f64,
        filter: &Filter,
        mut trial: F,
    ) -> NlpResult<Accepted>
    where
        F: FnMut(f64) -> NlpResult<(f64, f64)>,
    {
        let alpha_min = self.alpha_min(theta, dphi);
        let mut alpha = alpha_max;
        for backtracks in 0..=self.max_backtracks {
            let (theta_trial, phi_trial) = trial(alpha)?;
            if let Some(kind) = self.accept(theta, phi, theta_trial, phi_trial, alpha, dphi, filter) {
                return Ok(Accepted { alpha, kind, backtracks });
            }
            log::trace!(
                "reject alpha = {:.3e}: theta {:.3e} -> {:.3e}, phi {:.6e} -> {:.6e}",
                alpha,
                theta,
                theta_trial,
                phi,
                phi_trial
            );
            alpha *= 0.5;
            if alpha < alpha_min {
                break;
            }
        }
        Err(NlpError::LineSearch { alpha })
    }
}
