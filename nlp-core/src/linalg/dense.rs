//! Small dense vector kernels on slices.
//!
//! Masked variants skip entries whose bound is absent; those entries hold
//! zero slacks and multipliers and must not enter norms or logarithms.

#[inline]
pub fn inf_norm(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |acc, &x| acc.max(x.abs()))
}

#[inline]
pub fn one_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x.abs()).sum()
}

#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(ai, bi)| ai * bi).sum()
}

/// Sum of |v_i| over entries where `mask[i]` is set.
#[inline]
pub fn masked_one_norm(v: &[f64], mask: &[bool]) -> f64 {
    v.iter()
        .zip(mask)
        .filter(|(_, &on)| on)
        .map(|(x, _)| x.abs())
        .sum()
}

/// Sum of ln(s_i) over entries where `mask[i]` is set.
#[inline]
pub fn masked_log_sum(s: &[f64], mask: &[bool]) -> f64 {
    s.iter()
        .zip(mask)
        .filter(|(_, &on)| on)
        .map(|(x, _)| x.ln())
        .sum()
}

/// max_i |s_i z_i - mu| over entries where `mask[i]` is set.
#[inline]
pub fn masked_complementarity(s: &[f64], z: &[f64], mask: &[bool], mu: f64) -> f64 {
    s.iter()
        .zip(z)
        .zip(mask)
        .filter(|(_, &on)| on)
        .fold(0.0, |acc, ((si, zi), _)| acc.max((si * zi - mu).abs()))
}

#[inline]
pub fn all_finite(v: &[f64]) -> bool {
    v.iter().all(|x| x.is_finite())
}
