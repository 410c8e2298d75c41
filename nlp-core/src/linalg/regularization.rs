//! Inertia-correcting regularization schedule for the KKT system.
//!
//! The primal shift `delta_w` is added to the (1,1) and (2,2) blocks and the
//! dual shift `delta_c` subtracted on the constraint diagonal until the
//! factorization reports the inertia of a descent-producing system.

use crate::options::IpmSettings;

#[derive(Debug, Clone)]
pub struct RegularizationPolicy {
    /// First primal shift tried when no previous shift is known
    pub delta_w_init: f64,
    /// Smallest primal shift reused from a previous iteration
    pub delta_w_min: f64,
    /// Largest primal shift before giving up
    pub delta_w_max: f64,
    /// Decrease factor applied to the previous shift
    pub kappa_w_minus: f64,
    /// Growth factor when a previous shift is known
    pub kappa_w_plus: f64,
    /// Growth factor on the first correction
    pub kappa_w_plus_bar: f64,
    /// Dual shift coefficient
    pub delta_c: f64,
    /// Dual shift exponent on mu
    pub kappa_c: f64,
}

impl Default for RegularizationPolicy {
    fn default() -> Self {
        Self {
            delta_w_init: 1e-4,
            delta_w_min: 1e-20,
            delta_w_max: 1e40,
            kappa_w_minus: 1.0 / 3.0,
            kappa_w_plus: 8.0,
            kappa_w_plus_bar: 100.0,
            delta_c: 1e-8,
            kappa_c: 0.25,
        }
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct RegularizationState {
    /// Last successful nonzero primal shift (0 if none yet)
    pub delta_w_last: f64,
    /// Number of solves that needed a primal shift
    pub primal_bumps: u64,
}

impl RegularizationPolicy {
    pub fn from_settings(settings: &IpmSettings) -> Self {
        Self {
            delta_w_init: settings.delta_w_init,
            delta_w_max: settings.delta_w_max,
            delta_c: settings.delta_c,
            ..Self::default()
        }
    }

    /// Dual shift for a singular system at barrier parameter `mu`.
    #[inline]
    pub fn dual_shift(&self, mu: f64) -> f64 {
        self.delta_c * mu.powf(self.kappa_c)
    }

    /// First primal shift of a correction sequence.
    #[inline]
    pub fn first_primal_shift(&self, st: &RegularizationState) -> f64 {
        if st.delta_w_last == 0.0 {
            self.delta_w_init
        } else {
            self.delta_w_min.max(self.kappa_w_minus * st.delta_w_last)
        }
    }

    /// Next primal shift after `delta_w` failed; `None` once past the cap.
    #[inline]
    pub fn next_primal_shift(&self, st: &RegularizationState, delta_w: f64) -> Option<f64> {
        let next = if st.delta_w_last == 0.0 {
            self.kappa_w_plus_bar * delta_w
        } else {
            self.kappa_w_plus * delta_w
        };
        (next <= self.delta_w_max).then_some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_first_correction_grows_fast() {
        let p = RegularizationPolicy::default();
        let st = RegularizationState::default();
        let w0 = p.first_primal_shift(&st);
        assert_eq!(w0, 1e-4);
        assert_eq!(p.next_primal_shift(&st, w0), Some(1e-2));
    }

    #[test]
    fn test_schedule_reuses_last_shift() {
        let p = RegularizationPolicy::default();
        let st = RegularizationState { delta_w_last: 3.0, primal_bumps: 1 };
        assert!((p.first_primal_shift(&st) - 1.0).abs() < 1e-15);
        assert_eq!(p.next_primal_shift(&st, 1.0), Some(8.0));
        assert_eq!(p.next_primal_shift(&st, 1e40), None);
    }
}
