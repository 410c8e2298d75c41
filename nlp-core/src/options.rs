//! Solver settings.
//!
//! Both engines take an immutable settings struct by reference at
//! construction. Settings can be built with struct-update syntax from
//! `Default`, set by name through [`IpmSettings::set_option`] /
//! [`AugLagrSettings::set_option`] (the flat key-value interface), or
//! deserialized from TOML/JSON via serde.

use serde::Deserialize;

use crate::error::{NlpError, NlpResult};

/// A value for the flat key-value option interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionValue<'a> {
    Numeric(f64),
    Integer(i64),
    Str(&'a str),
}

impl From<f64> for OptionValue<'_> {
    fn from(v: f64) -> Self {
        OptionValue::Numeric(v)
    }
}

impl From<i64> for OptionValue<'_> {
    fn from(v: i64) -> Self {
        OptionValue::Integer(v)
    }
}

impl From<i32> for OptionValue<'_> {
    fn from(v: i32) -> Self {
        OptionValue::Integer(v as i64)
    }
}

impl<'a> From<&'a str> for OptionValue<'a> {
    fn from(v: &'a str) -> Self {
        OptionValue::Str(v)
    }
}

/// How constraint multipliers are refreshed after an accepted step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DualsUpdateType {
    /// Least-squares estimate at the new point (recommended with quasi-Newton)
    #[default]
    Lsq,
    /// Newton step: y += alpha_primal * dy
    Newton,
}

/// How constraint multipliers are initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DualsInitialization {
    /// Least-squares estimate at the starting point
    #[default]
    Lsq,
    /// Constant value `duals_init_value`
    Constant,
}

/// Which Hessian the Newton system uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HessianApprox {
    /// Exact if the problem provides one, quasi-Newton otherwise
    #[default]
    Auto,
    /// Problem's Hessian of the Lagrangian
    Exact,
    /// Dense damped BFGS
    QuasiNewton,
}

/// Treatment of variables with xl == xu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixedVarHandling {
    /// Reject the problem
    #[default]
    Error,
    /// Relax both bounds by `fixed_var_perturb`
    Relax,
}

/// Penalty parameter continuation for the augmented-Lagrangian loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyUpdate {
    /// rho <- min(rho_increase * rho, rho_max)
    #[default]
    BoundedGeometric,
    /// rho <- max(rho_increase * rho, rho_max)
    Saturating,
}

/// Filter-IPM settings and parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IpmSettings {
    /// Absolute tolerance on the scaled NLP error
    pub tolerance: f64,

    /// Relative tolerance (to the error at the starting point); 0 disables
    pub rel_tolerance: f64,

    /// Acceptable tolerance
    pub acceptable_tolerance: f64,

    /// Consecutive acceptable iterations before stopping
    pub acceptable_iterations: usize,

    /// Maximum number of iterations
    pub max_iter: usize,

    /// Initial barrier parameter
    pub mu0: f64,

    /// Linear decrease factor of mu
    pub kappa_mu: f64,

    /// Superlinear decrease exponent of mu
    pub theta_mu: f64,

    /// Lower bound of the fraction-to-boundary parameter
    pub tau_min: f64,

    /// Barrier subproblem tolerance relative to mu
    pub kappa_eps: f64,

    /// Starting point push relative to the bound magnitude
    pub kappa1: f64,

    /// Starting point push relative to the bound range
    pub kappa2: f64,

    /// Multiplier magnitude threshold in the error scaling
    pub p_smax: f64,

    /// Sufficient progress factor for infeasibility
    pub gamma_theta: f64,

    /// Sufficient progress factor for the barrier objective
    pub gamma_phi: f64,

    /// Switching condition exponent on theta
    pub s_theta: f64,

    /// Switching condition exponent on the directional derivative
    pub s_phi: f64,

    /// Switching condition multiplier
    pub delta: f64,

    /// Armijo parameter
    pub eta_phi: f64,

    /// Safety factor for the minimal step length
    pub gamma_alpha: f64,

    /// Maximum step-halvings per line search
    pub max_ls_backtracks: usize,

    /// Bound multiplier clipping factor
    pub kappa_sigma: f64,

    pub duals_update_type: DualsUpdateType,
    pub duals_initialization: DualsInitialization,

    /// Constant used by `DualsInitialization::Constant`
    pub duals_init_value: f64,

    /// LSQ initial multipliers larger than this (inf-norm) are discarded
    pub constr_mult_init_max: f64,

    pub hessian: HessianApprox,
    pub fixed_var: FixedVarHandling,

    /// Relative width below which a variable counts as fixed
    pub fixed_var_tolerance: f64,

    /// Relative relaxation applied to fixed variables
    pub fixed_var_perturb: f64,

    /// Relative outward shift of every finite bound before solving
    pub bound_relax_factor: f64,

    /// First trial primal regularization in the KKT inertia correction
    pub delta_w_init: f64,

    /// Primal regularization at which the KKT solve gives up
    pub delta_w_max: f64,

    /// Dual regularization coefficient for singular KKT systems
    pub delta_c: f64,

    /// Log output level: 0 silent, 1 summary, 2 iterations, 3 scalars
    pub verbosity: u8,
}

impl Default for IpmSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            rel_tolerance: 0.0,
            acceptable_tolerance: 1e-6,
            acceptable_iterations: 10,
            max_iter: 3000,
            mu0: 1.0,
            kappa_mu: 0.2,
            theta_mu: 1.5,
            tau_min: 0.99,
            kappa_eps: 10.0,
            kappa1: 1e-2,
            kappa2: 1e-2,
            p_smax: 100.0,
            gamma_theta: 1e-5,
            gamma_phi: 1e-8,
            s_theta: 1.1,
            s_phi: 2.3,
            delta: 1.0,
            eta_phi: 1e-4,
            gamma_alpha: 0.05,
            max_ls_backtracks: 50,
            kappa_sigma: 1e10,
            duals_update_type: DualsUpdateType::Lsq,
            duals_initialization: DualsInitialization::Lsq,
            duals_init_value: 1.0,
            constr_mult_init_max: 1e3,
            hessian: HessianApprox::Auto,
            fixed_var: FixedVarHandling::Error,
            fixed_var_tolerance: 1e-15,
            fixed_var_perturb: 1e-8,
            bound_relax_factor: 1e-8,
            delta_w_init: 1e-4,
            delta_w_max: 1e40,
            delta_c: 1e-8,
            verbosity: 1,
        }
    }
}

impl IpmSettings {
    /// Set an option by name.
    ///
    /// Accepts the established option names (`tolerance`, `kappa_Sigma`,
    /// `dualsUpdateType`, ...) as well as the field names.
    pub fn set_option<'a>(&mut self, name: &str, value: impl Into<OptionValue<'a>>) -> NlpResult<()> {
        let value = value.into();
        match name {
            "tolerance" => self.tolerance = positive(name, value)?,
            "rel_tolerance" => self.rel_tolerance = non_negative(name, value)?,
            "acceptable_tolerance" => self.acceptable_tolerance = positive(name, value)?,
            "acceptable_iterations" => self.acceptable_iterations = count(name, value)?,
            "max_iter" => self.max_iter = count(name, value)?,
            "mu0" => self.mu0 = positive(name, value)?,
            "kappa_mu" => self.kappa_mu = open_unit(name, value)?,
            "theta_mu" => self.theta_mu = in_range(name, value, 1.0, 2.0)?,
            "tau_min" => self.tau_min = open_unit(name, value)?,
            "kappa_eps" => self.kappa_eps = positive(name, value)?,
            "kappa1" => self.kappa1 = positive(name, value)?,
            "kappa2" => self.kappa2 = in_range(name, value, 0.0, 0.5)?,
            "p_smax" => self.p_smax = positive(name, value)?,
            "gamma_theta" => self.gamma_theta = open_unit(name, value)?,
            "gamma_phi" => self.gamma_phi = open_unit(name, value)?,
            "s_theta" => self.s_theta = positive(name, value)?,
            "s_phi" => self.s_phi = positive(name, value)?,
            "delta" => self.delta = positive(name, value)?,
            "eta_phi" => self.eta_phi = in_range(name, value, 0.0, 0.5)?,
            "gamma_alpha" => self.gamma_alpha = open_unit(name, value)?,
            "max_ls_backtracks" => self.max_ls_backtracks = count(name, value)?,
            "kappa_Sigma" | "kappa_sigma" => self.kappa_sigma = in_range(name, value, 1.0, f64::INFINITY)?,
            "dualsUpdateType" | "duals_update_type" => {
                self.duals_update_type = match keyword(name, value)? {
                    "lsq" | "0" => DualsUpdateType::Lsq,
                    "newton" | "1" => DualsUpdateType::Newton,
                    other => return Err(bad_keyword(name, other)),
                }
            }
            "dualsInitialization" | "dualsInitializ" | "duals_initialization" => {
                self.duals_initialization = match keyword(name, value)? {
                    "lsq" | "0" => DualsInitialization::Lsq,
                    "constant" | "1" => DualsInitialization::Constant,
                    other => return Err(bad_keyword(name, other)),
                }
            }
            "duals_init_value" => self.duals_init_value = numeric(name, value)?,
            "constr_mult_init_max" => self.constr_mult_init_max = non_negative(name, value)?,
            "hessian" | "Hessian" => {
                self.hessian = match keyword(name, value)? {
                    "auto" => HessianApprox::Auto,
                    "exact" | "analytical_exact" => HessianApprox::Exact,
                    "quasinewton" | "quasi_newton" | "quasinewton_approx" => HessianApprox::QuasiNewton,
                    other => return Err(bad_keyword(name, other)),
                }
            }
            "fixed_var" => {
                self.fixed_var = match keyword(name, value)? {
                    "none" | "error" => FixedVarHandling::Error,
                    "relax" => FixedVarHandling::Relax,
                    other => return Err(bad_keyword(name, other)),
                }
            }
            "fixed_var_tolerance" => self.fixed_var_tolerance = non_negative(name, value)?,
            "fixed_var_perturb" => self.fixed_var_perturb = positive(name, value)?,
            "bound_relax_factor" => self.bound_relax_factor = non_negative(name, value)?,
            "delta_w_init" => self.delta_w_init = positive(name, value)?,
            "delta_w_max" => self.delta_w_max = positive(name, value)?,
            "delta_c" => self.delta_c = non_negative(name, value)?,
            "verbosity_level" | "verbosity" => self.verbosity = count(name, value)?.min(u8::MAX as usize) as u8,
            _ => return Err(NlpError::InvalidOption(format!("unknown option '{}'", name))),
        }
        Ok(())
    }
}

/// Augmented-Lagrangian settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AugLagrSettings {
    /// Absolute tolerance on both feasibility and optimality errors
    pub tolerance: f64,

    /// Relative tolerance (to the errors at the starting point); 0 disables
    pub rel_tolerance: f64,

    /// Acceptable tolerance
    pub acceptable_tolerance: f64,

    /// Consecutive acceptable iterations before stopping
    pub acceptable_iterations: usize,

    /// Maximum number of outer iterations
    pub max_iter: usize,

    /// Initial penalty parameter
    pub rho0: f64,

    /// Penalty parameter cap
    pub rho_max: f64,

    /// Geometric penalty growth factor
    pub rho_increase: f64,

    pub penalty_update: PenaltyUpdate,

    /// Initial value of every multiplier estimate
    pub lambda0: f64,

    /// Stop the outer loop when an inner solve fails
    pub stop_on_inner_failure: bool,

    /// Settings of the inner Filter-IPM solves. They default to
    /// `fixed_var = relax` and verbosity 0; both can be overridden.
    pub inner: IpmSettings,

    /// Log output level: 0 silent, 1 summary, 2 iterations, 3 scalars
    pub verbosity: u8,
}

impl Default for AugLagrSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            rel_tolerance: 1e-6,
            acceptable_tolerance: 1e-4,
            acceptable_iterations: 5,
            max_iter: 1000,
            rho0: 100.0,
            rho_max: 1e7,
            rho_increase: 10.0,
            penalty_update: PenaltyUpdate::BoundedGeometric,
            lambda0: 1.0,
            stop_on_inner_failure: false,
            inner: IpmSettings {
                fixed_var: FixedVarHandling::Relax,
                verbosity: 0,
                ..IpmSettings::default()
            },
            verbosity: 1,
        }
    }
}

impl AugLagrSettings {
    /// Set an option by name. Names prefixed with `inner.` are forwarded to
    /// the inner IPM settings.
    pub fn set_option<'a>(&mut self, name: &str, value: impl Into<OptionValue<'a>>) -> NlpResult<()> {
        let value = value.into();
        if let Some(inner_name) = name.strip_prefix("inner.") {
            return self.inner.set_option(inner_name, value);
        }
        match name {
            "tolerance" => self.tolerance = positive(name, value)?,
            "rel_tolerance" => self.rel_tolerance = non_negative(name, value)?,
            "acceptable_tolerance" => self.acceptable_tolerance = positive(name, value)?,
            "acceptable_iterations" => self.acceptable_iterations = count(name, value)?,
            "max_iter" => self.max_iter = count(name, value)?,
            "rho0" => self.rho0 = positive(name, value)?,
            "rho_max" => self.rho_max = positive(name, value)?,
            "rho_increase" => self.rho_increase = in_range(name, value, 1.0, f64::INFINITY)?,
            "penalty_update" => {
                self.penalty_update = match keyword(name, value)? {
                    "bounded_geometric" | "min" => PenaltyUpdate::BoundedGeometric,
                    "saturating" | "max" => PenaltyUpdate::Saturating,
                    other => return Err(bad_keyword(name, other)),
                }
            }
            "lambda0" => self.lambda0 = numeric(name, value)?,
            "stop_on_inner_failure" => {
                self.stop_on_inner_failure = match keyword(name, value)? {
                    "yes" | "true" | "1" => true,
                    "no" | "false" | "0" => false,
                    other => return Err(bad_keyword(name, other)),
                }
            }
            "verbosity_level" | "verbosity" => self.verbosity = count(name, value)?.min(u8::MAX as usize) as u8,
            _ => return Err(NlpError::InvalidOption(format!("unknown option '{}'", name))),
        }
        Ok(())
    }
}

fn numeric(name: &str, value: OptionValue<'_>) -> NlpResult<f64> {
    match value {
        OptionValue::Numeric(v) if v.is_finite() || v == f64::INFINITY => Ok(v),
        OptionValue::Integer(v) => Ok(v as f64),
        other => Err(NlpError::InvalidOption(format!(
            "option '{}' expects a number, got {:?}",
            name, other
        ))),
    }
}

fn positive(name: &str, value: OptionValue<'_>) -> NlpResult<f64> {
    in_range(name, value, 0.0, f64::INFINITY).and_then(|v| {
        if v > 0.0 {
            Ok(v)
        } else {
            Err(NlpError::InvalidOption(format!("option '{}' must be positive", name)))
        }
    })
}

fn non_negative(name: &str, value: OptionValue<'_>) -> NlpResult<f64> {
    in_range(name, value, 0.0, f64::INFINITY)
}

fn open_unit(name: &str, value: OptionValue<'_>) -> NlpResult<f64> {
    let v = numeric(name, value)?;
    if v > 0.0 && v < 1.0 {
        Ok(v)
    } else {
        Err(NlpError::InvalidOption(format!("option '{}' must lie in (0, 1), got {}", name, v)))
    }
}

fn in_range(name: &str, value: OptionValue<'_>, lo: f64, hi: f64) -> NlpResult<f64> {
    let v = numeric(name, value)?;
    if v >= lo && v <= hi {
        Ok(v)
    } else {
        Err(NlpError::InvalidOption(format!(
            "option '{}' must lie in [{}, {}], got {}",
            name, lo, hi, v
        )))
    }
}

fn count(name: &str, value: OptionValue<'_>) -> NlpResult<usize> {
    match value {
        OptionValue::Integer(v) if v >= 0 => Ok(v as usize),
        other => Err(NlpError::InvalidOption(format!(
            "option '{}' expects a non-negative integer, got {:?}",
            name, other
        ))),
    }
}

fn keyword<'a>(name: &str, value: OptionValue<'a>) -> NlpResult<&'a str> {
    match value {
        OptionValue::Str(s) => Ok(s),
        other => Err(NlpError::InvalidOption(format!(
            "option '{}' expects a string, got {:?}",
            name, other
        ))),
    }
}

fn bad_keyword(name: &str, got: &str) -> NlpError {
    NlpError::InvalidOption(format!("option '{}' does not accept '{}'", name, got))
}
