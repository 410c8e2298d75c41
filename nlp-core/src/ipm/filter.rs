//! Line-search filter of (theta, phi) pairs.
//!
//! A trial pair is dominated when some entry `(theta_j, phi_j)` satisfies
//! both `theta ≥ (1 - gamma_theta) theta_j` and `phi ≥ phi_j - gamma_phi theta_j`.
//! Entries are only added within a barrier phase; the filter is cleared when
//! mu changes and at the start of a run.

#[derive(Debug, Clone)]
pub struct Filter {
    entries: Vec<(f64, f64)>,
    gamma_theta: f64,
    gamma_phi: f64,
}

impl Filter {
    pub fn new(gamma_theta: f64, gamma_phi: f64) -> Self {
        Self {
            entries: Vec::new(),
            gamma_theta,
            gamma_phi,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Record the pair of an iterate left by a non-Armijo step.
    pub fn add(&mut self, theta: f64, phi: f64) {
        self.entries.push((theta, phi));
    }

    pub fn is_dominated(&self, theta: f64, phi: f64) -> bool {
        self.entries.iter().any(|&(theta_j, phi_j)| {
            theta >= (1.0 - self.gamma_theta) * theta_j && phi >= phi_j - self.gamma_phi * theta_j
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
