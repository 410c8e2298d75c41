//! Bench configuration: solver settings read from a TOML file.
//!
//! ```toml
//! [ipm]
//! tolerance = 1e-8
//! hessian = "quasinewton"
//!
//! [auglagr]
//! rho_max = 1e8
//! penalty_update = "saturating"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use nlp_core::{AugLagrSettings, IpmSettings};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub ipm: IpmSettings,
    pub auglagr: AugLagrSettings,
}

impl BenchConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Apply `name=value` overrides through the settings' option setters.
    ///
    /// `ipm.` and `auglagr.` prefixes select the target; bare names go to
    /// both engines' Filter-IPM settings.
    pub fn apply_overrides(&mut self, overrides: &[String]) -> Result<()> {
        for item in overrides {
            let (name, raw) = item
                .split_once('=')
                .with_context(|| format!("override '{}' is not name=value", item))?;
            let (name, raw) = (name.trim(), raw.trim());
            if let Some(rest) = name.strip_prefix("auglagr.") {
                set_parsed(raw, |v| self.auglagr.set_option(rest, v))?;
            } else {
                let rest = name.strip_prefix("ipm.").unwrap_or(name);
                set_parsed(raw, |v| self.ipm.set_option(rest, v))?;
                if !name.starts_with("ipm.") {
                    set_parsed(raw, |v| self.auglagr.inner.set_option(rest, v))?;
                }
            }
        }
        Ok(())
    }

    /// Propagate the CLI verbosity to both engines.
    pub fn set_verbosity(&mut self, level: u8) {
        self.ipm.verbosity = level;
        self.auglagr.verbosity = level;
    }
}

/// Integers first, then floats, then keywords.
fn set_parsed<F>(raw: &str, mut set: F) -> Result<()>
where
    F: FnMut(nlp_core::OptionValue<'_>) -> nlp_core::NlpResult<()>,
{
    let res = if let Ok(i) = raw.parse::<i64>() {
        // Numeric options accept integer literals too
        set(i.into()).or_else(|_| set((i as f64).into()))
    } else if let Ok(f) = raw.parse::<f64>() {
        set(f.into())
    } else {
        set(raw.into())
    };
    res.map_err(anyhow::Error::from)
}
