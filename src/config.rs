use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ops::normalize::LengthCheck;
use crate::ops::smooth::EdgeMode;
use crate::units::WavelengthUnit;

// ---------------------------------------------------------------------------
// Physical constants – initialised once, never mutated
// ---------------------------------------------------------------------------

/// Process-wide numeric constants.
#[derive(Debug, Clone, Copy)]
pub struct Constants {
    /// Speed of light in km/s.
    pub c_km_s: f64,
    /// Machine epsilon for `f64`.
    pub eps: f64,
}

static CONSTANTS: OnceLock<Constants> = OnceLock::new();

/// Shared constants, built on first access.
pub fn constants() -> &'static Constants {
    CONSTANTS.get_or_init(|| Constants {
        c_km_s: 299_792.458,
        eps: f64::EPSILON,
    })
}

// ---------------------------------------------------------------------------
// User-tunable defaults
// ---------------------------------------------------------------------------

/// Processing defaults, optionally read from a JSON file.
///
/// ```json
/// { "default_unit": "nm", "knot_spacing": 25.0, "gauss_edge": "reflect" }
/// ```
///
/// Any field left out falls back to [`Settings::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Unit assumed for wavelengths read without an explicit unit tag.
    pub default_unit: WavelengthUnit,
    /// Approximate distance between continuum knots, in wavelength units.
    pub knot_spacing: f64,
    /// Padding policy for Gaussian smoothing.
    pub gauss_edge: EdgeMode,
    /// Length policy used by `normalize`.
    pub normalize_check: LengthCheck,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_unit: WavelengthUnit::Angstrom,
            knot_spacing: 10.0,
            gauss_edge: EdgeMode::Invert,
            normalize_check: LengthCheck::Strict,
        }
    }
}

impl Settings {
    /// Read settings from `path`, or return the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&text).context("parsing config JSON")?;
        log::debug!("loaded settings from {}: {settings:?}", path.display());
        Ok(settings)
    }
}
