use crate::config::constants;
use crate::data::spectrum::SpectralData;
use crate::error::{Result, SpecError};
use crate::units::{Velocity, Wavelength, WavelengthUnit};

// ---------------------------------------------------------------------------
// Window bounds: a wavelength range, or a velocity range about a line
// ---------------------------------------------------------------------------

/// The two ways of asking for a pixel window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowBounds {
    /// Explicit wavelength limits.
    Wavelength { min: Wavelength, max: Wavelength },
    /// Velocity limits relative to a line at rest wavelength `rest`,
    /// observed at absorption redshift `z`.
    Velocity {
        z: f64,
        rest: Wavelength,
        vmin: Velocity,
        vmax: Velocity,
    },
}

impl WindowBounds {
    /// Observed wavelength limits in `unit`, in the order they were given.
    ///
    /// Velocity bounds map to `(1+z) * w_rest * (1 + v/c)`.
    pub fn wavelength_range(&self, unit: WavelengthUnit) -> (f64, f64) {
        match *self {
            WindowBounds::Wavelength { min, max } => (min.value_in(unit), max.value_in(unit)),
            WindowBounds::Velocity { z, rest, vmin, vmax } => {
                let c = constants().c_km_s;
                let w = rest.value_in(unit);
                let observed = |v: Velocity| (1.0 + z) * (w + w * v.to_km_s() / c);
                (observed(vmin), observed(vmax))
            }
        }
    }
}

/// Positional form: `[wmin, wmax]` (Angstrom) or
/// `[z, w_rest (Angstrom), vmin (km/s), vmax (km/s)]`.
impl TryFrom<&[f64]> for WindowBounds {
    type Error = SpecError;

    fn try_from(args: &[f64]) -> Result<Self> {
        match *args {
            [min, max] => Ok(WindowBounds::Wavelength {
                min: Wavelength::angstrom(min),
                max: Wavelength::angstrom(max),
            }),
            [z, rest, vmin, vmax] => Ok(WindowBounds::Velocity {
                z,
                rest: Wavelength::angstrom(rest),
                vmin: Velocity::km_s(vmin),
                vmax: Velocity::km_s(vmax),
            }),
            _ => Err(SpecError::invalid(format!(
                "window needs 2 (wmin, wmax) or 4 (z, wrest, vmin, vmax) arguments, got {}",
                args.len()
            ))),
        }
    }
}

/// Result of a window lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelWindow {
    /// Every pixel index in `pixel_range`, inclusive.
    pub indices: Vec<usize>,
    /// The requested wavelength limits, in the spectrum's unit.
    pub wavelength_range: (f64, f64),
    /// `(min_index, max_index)`.
    pub pixel_range: (usize, usize),
}

/// Index of the sample closest to `target`; ties go to the lower index.
pub fn nearest_pixel(wavelength: &[f64], target: f64) -> Option<usize> {
    wavelength
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - target).abs().total_cmp(&(*b - target).abs()))
        .map(|(i, _)| i)
}

impl SpectralData {
    /// Resolve `bounds` into the inclusive pixel window nearest to it.
    pub fn pix_minmax(&self, bounds: &WindowBounds) -> Result<PixelWindow> {
        let (w0, w1) = bounds.wavelength_range(self.unit());
        let (Some(p0), Some(p1)) = (
            nearest_pixel(self.wavelength(), w0),
            nearest_pixel(self.wavelength(), w1),
        ) else {
            return Err(SpecError::invalid("cannot select a window in an empty spectrum"));
        };
        let (lo, hi) = if p0 <= p1 { (p0, p1) } else { (p1, p0) };

        Ok(PixelWindow {
            indices: (lo..=hi).collect(),
            wavelength_range: (w0, w1),
            pixel_range: (lo, hi),
        })
    }
}
