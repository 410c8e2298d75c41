//! Linear algebra layer.
//!
//! Dense vector helpers, the KKT system trait and its dense eigenvalue-based
//! implementation with inertia correction.

pub mod dense;
pub mod kkt;
pub mod regularization;
