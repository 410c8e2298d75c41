//! Monotone barrier parameter continuation.
//!
//! ```text
//! mu_new  = max(eps_tol / 10, min(kappa_mu mu, mu^theta_mu))
//! tau_new = max(tau_min, 1 - mu_new)
//! ```

use crate::options::IpmSettings;

#[derive(Debug, Clone, Copy)]
pub struct BarrierSchedule {
    pub kappa_mu: f64,
    pub theta_mu: f64,
    pub tau_min: f64,
    pub kappa_eps: f64,
    /// Floor of mu, a tenth of the absolute tolerance
    pub mu_min: f64,
}

impl BarrierSchedule {
    pub fn from_settings(settings: &IpmSettings) -> Self {
        Self {
            kappa_mu: settings.kappa_mu,
            theta_mu: settings.theta_mu,
            tau_min: settings.tau_min,
            kappa_eps: settings.kappa_eps,
            mu_min: settings.tolerance / 10.0,
        }
    }

    /// Fraction-to-boundary parameter for a given mu.
    #[inline]
    pub fn tau(&self, mu: f64) -> f64 {
        self.tau_min.max(1.0 - mu)
    }

    /// Whether the barrier subproblem is solved well enough to decrease mu.
    #[inline]
    pub fn subproblem_solved(&self, err_barrier: f64, mu: f64) -> bool {
        err_barrier <= self.kappa_eps * mu
    }

    /// Next `(mu, tau)`.
    #[inline]
    pub fn next(&self, mu: f64) -> (f64, f64) {
        let mu_new = self.mu_min.max((self.kappa_mu * mu).min(mu.powf(self.theta_mu)));
        (mu_new, self.tau(mu_new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn schedule() -> BarrierSchedule {
        BarrierSchedule::from_settings(&IpmSettings::default())
    }

    #[test]
    fn test_linear_then_superlinear() {
        let s = schedule();
        // mu = 1: kappa_mu mu = 0.2 < 1^1.5
        let (mu, tau) = s.next(1.0);
        assert!((mu - 0.2).abs() < 1e-15);
        assert_eq!(tau, 0.99);
        // mu = 0.01: 0.01^1.5 = 1e-3 < 2e-3
        let (mu, _) = s.next(0.01);
        assert!((mu - 1e-3).abs() < 1e-15);
    }

    #[test]
    fn test_floor_at_tenth_of_tolerance() {
        let s = schedule();
        let (mu, tau) = s.next(1e-9);
        assert_eq!(mu, s.mu_min);
        assert!((tau - (1.0 - 1e-9)).abs() < 1e-15);
    }

    #[test]
    fn test_subproblem_test() {
        let s = schedule();
        assert!(s.subproblem_solved(0.5, 0.1));
        assert!(!s.subproblem_solved(1.5, 0.1));
    }

    proptest! {
        #[test]
        fn prop_mu_non_increasing(mu0 in 1e-12f64..1e3, steps in 1usize..60) {
            let s = schedule();
            let mut mu = mu0.max(s.mu_min);
            for _ in 0..steps {
                let (next, tau) = s.next(mu);
                prop_assert!(next <= mu);
                prop_assert!(next >= s.mu_min);
                prop_assert!(tau >= s.tau_min && tau < 1.0 + 1e-15);
                mu = next;
            }
        }
    }
}
