use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SpecError;

// ---------------------------------------------------------------------------
// WavelengthUnit – the unit tag carried by every dispersion axis
// ---------------------------------------------------------------------------

/// Length units accepted for wavelengths. Angstrom is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WavelengthUnit {
    #[default]
    Angstrom,
    Nanometer,
    Micron,
    Meter,
}

impl WavelengthUnit {
    /// How many Angstrom make up one of `self`.
    pub fn in_angstrom(self) -> f64 {
        match self {
            WavelengthUnit::Angstrom => 1.0,
            WavelengthUnit::Nanometer => 10.0,
            WavelengthUnit::Micron => 1.0e4,
            WavelengthUnit::Meter => 1.0e10,
        }
    }

    /// Convert `value` expressed in `self` into `target`.
    pub fn convert(self, value: f64, target: WavelengthUnit) -> f64 {
        if self == target {
            value
        } else {
            value * self.in_angstrom() / target.in_angstrom()
        }
    }
}

impl fmt::Display for WavelengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WavelengthUnit::Angstrom => "Angstrom",
            WavelengthUnit::Nanometer => "nm",
            WavelengthUnit::Micron => "um",
            WavelengthUnit::Meter => "m",
        };
        write!(f, "{s}")
    }
}

impl FromStr for WavelengthUnit {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "angstrom" | "aa" | "a" | "\u{e5}" | "\u{c5}" => Ok(WavelengthUnit::Angstrom),
            "nm" | "nanometer" => Ok(WavelengthUnit::Nanometer),
            "um" | "micron" | "\u{b5}m" => Ok(WavelengthUnit::Micron),
            "m" | "meter" => Ok(WavelengthUnit::Meter),
            other => Err(SpecError::invalid(format!("unknown wavelength unit '{other}'"))),
        }
    }
}

impl TryFrom<String> for WavelengthUnit {
    type Error = SpecError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<WavelengthUnit> for String {
    fn from(unit: WavelengthUnit) -> Self {
        unit.to_string()
    }
}

// ---------------------------------------------------------------------------
// Quantities
// ---------------------------------------------------------------------------

/// A wavelength together with its unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wavelength {
    pub value: f64,
    pub unit: WavelengthUnit,
}

impl Wavelength {
    pub fn new(value: f64, unit: WavelengthUnit) -> Self {
        Self { value, unit }
    }

    pub fn angstrom(value: f64) -> Self {
        Self::new(value, WavelengthUnit::Angstrom)
    }

    /// Numeric value expressed in `unit`.
    pub fn value_in(&self, unit: WavelengthUnit) -> f64 {
        self.unit.convert(self.value, unit)
    }
}

impl fmt::Display for Wavelength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VelocityUnit {
    #[default]
    KmPerSec,
    MPerSec,
}

/// A velocity together with its unit. Results are always reported in km/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Velocity {
    pub value: f64,
    pub unit: VelocityUnit,
}

impl Velocity {
    pub fn km_s(value: f64) -> Self {
        Self {
            value,
            unit: VelocityUnit::KmPerSec,
        }
    }

    pub fn m_s(value: f64) -> Self {
        Self {
            value,
            unit: VelocityUnit::MPerSec,
        }
    }

    pub fn to_km_s(&self) -> f64 {
        match self.unit {
            VelocityUnit::KmPerSec => self.value,
            VelocityUnit::MPerSec => self.value / 1.0e3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_between_units() {
        assert!((WavelengthUnit::Nanometer.convert(500.0, WavelengthUnit::Angstrom) - 5000.0).abs() < 1e-9);
        assert!((WavelengthUnit::Angstrom.convert(1.0e4, WavelengthUnit::Micron) - 1.0).abs() < 1e-12);
        assert_eq!(WavelengthUnit::Meter.convert(2.0, WavelengthUnit::Meter), 2.0);
    }

    #[test]
    fn parses_unit_aliases() {
        assert_eq!("AA".parse::<WavelengthUnit>().unwrap(), WavelengthUnit::Angstrom);
        assert_eq!("nm".parse::<WavelengthUnit>().unwrap(), WavelengthUnit::Nanometer);
        assert!("parsec".parse::<WavelengthUnit>().is_err());
    }

    #[test]
    fn parses_angstrom_symbol_in_either_case() {
        assert_eq!("\u{c5}".parse::<WavelengthUnit>().unwrap(), WavelengthUnit::Angstrom);
        assert_eq!("\u{e5}".parse::<WavelengthUnit>().unwrap(), WavelengthUnit::Angstrom);
    }

    #[test]
    fn wavelength_displays_value_and_unit() {
        assert_eq!(Wavelength::angstrom(1215.67).to_string(), "1215.67 Angstrom");
        assert_eq!(Wavelength::new(500.0, WavelengthUnit::Nanometer).to_string(), "500 nm");
    }

    #[test]
    fn unit_serde_uses_short_names() {
        let json = serde_json::to_string(&WavelengthUnit::Nanometer).unwrap();
        assert_eq!(json, "\"nm\"");
        let back: WavelengthUnit = serde_json::from_str("\"Angstrom\"").unwrap();
        assert_eq!(back, WavelengthUnit::Angstrom);
    }

    #[test]
    fn velocity_in_km_s() {
        assert_eq!(Velocity::m_s(1500.0).to_km_s(), 1.5);
        assert_eq!(Velocity::km_s(-200.0).to_km_s(), -200.0);
    }
}
