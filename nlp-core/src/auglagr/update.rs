//! Multiplier and penalty updates of the outer loop.

use crate::options::PenaltyUpdate;

/// First-order multiplier update `lambda_i += p_i / rho`.
pub fn update_lambda(lambda: &mut [f64], penalty: &[f64], rho: f64) {
    debug_assert_eq!(lambda.len(), penalty.len());
    for (l, &p) in lambda.iter_mut().zip(penalty) {
        *l += p / rho;
    }
}

/// Next penalty parameter.
///
/// Both strategies are non-decreasing in `rho`; only
/// [`PenaltyUpdate::BoundedGeometric`] keeps `rho <= rho_max`.
pub fn update_rho(rho: f64, strategy: PenaltyUpdate, increase: f64, rho_max: f64) -> f64 {
    match strategy {
        PenaltyUpdate::BoundedGeometric => (increase * rho).min(rho_max).max(rho),
        PenaltyUpdate::Saturating => (increase * rho).max(rho_max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_lambda_update() {
        let mut lambda = [1.0, 1.0];
        update_lambda(&mut lambda, &[2.0, -1.0], 100.0);
        assert_relative_eq!(lambda[0], 1.02, epsilon = 1e-15);
        assert_relative_eq!(lambda[1], 0.99, epsilon = 1e-15);
    }

    #[test]
    fn test_zero_penalty_keeps_lambda() {
        let mut lambda = [0.5, -3.0];
        update_lambda(&mut lambda, &[0.0, 0.0], 1e3);
        assert_eq!(lambda, [0.5, -3.0]);
    }

    #[test]
    fn test_bounded_geometric_rho() {
        let mut rho = 100.0;
        let mut seen = vec![rho];
        for _ in 0..8 {
            rho = update_rho(rho, PenaltyUpdate::BoundedGeometric, 10.0, 1e7);
            seen.push(rho);
        }
        assert_eq!(seen[1], 1e3);
        assert_eq!(*seen.last().unwrap(), 1e7);
        assert!(seen.windows(2).all(|w| w[1] >= w[0]));
        assert!(seen.iter().all(|&r| r <= 1e7));
    }

    #[test]
    fn test_bounded_geometric_never_decreases_above_cap() {
        // Start above the cap: rho stays put rather than dropping to rho_max
        assert_eq!(update_rho(1e8, PenaltyUpdate::BoundedGeometric, 10.0, 1e7), 1e8);
    }

    #[test]
    fn test_saturating_rho() {
        assert_eq!(update_rho(100.0, PenaltyUpdate::Saturating, 10.0, 1e7), 1e7);
        assert_eq!(update_rho(1e7, PenaltyUpdate::Saturating, 10.0, 1e7), 1e8);
    }
}
