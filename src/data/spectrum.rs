use std::cell::OnceCell;
use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Normal;
use rand::distributions::Distribution;

use crate::config::constants;
use crate::error::{Result, SpecError};
use crate::units::{Wavelength, WavelengthUnit};

use super::model::Metadata;

// ---------------------------------------------------------------------------
// Diagnostics – lazily derived from the arrays
// ---------------------------------------------------------------------------

/// Wavelength extent of the good pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diagnostics {
    pub wv_min: Option<f64>,
    pub wv_max: Option<f64>,
}

// ---------------------------------------------------------------------------
// SpectralData – the entity every transform consumes or produces
// ---------------------------------------------------------------------------

/// A one-dimensional spectrum: flux on a strictly increasing wavelength grid,
/// with optional 1-sigma uncertainty, continuum and bad-pixel mask.
///
/// All auxiliary arrays have the same length as `wavelength`. Strict
/// monotonicity of the wavelength grid is assumed, not checked.
#[derive(Debug, Clone)]
pub struct SpectralData {
    wavelength: Vec<f64>,
    unit: WavelengthUnit,
    flux: Vec<f64>,
    uncertainty: Option<Vec<f64>>,
    continuum: Option<Vec<f64>>,
    /// `true` marks an invalid pixel.
    mask: Option<Vec<bool>>,
    metadata: Metadata,
    filename: Option<String>,
    diagnostics: OnceCell<Diagnostics>,
}

impl SpectralData {
    /// Build a spectrum from wavelength and flux (Angstrom).
    pub fn new(wavelength: Vec<f64>, flux: Vec<f64>) -> Result<Self> {
        SpecError::check_len("flux", wavelength.len(), flux.len())?;
        Ok(Self {
            wavelength,
            unit: WavelengthUnit::default(),
            flux,
            uncertainty: None,
            continuum: None,
            mask: None,
            metadata: Metadata::new(),
            filename: None,
            diagnostics: OnceCell::new(),
        })
    }

    /// Build from `(wave, flux)`, `(wave, flux, sig)` or `(wave, flux, sig, co)`.
    pub fn from_arrays(
        wavelength: Vec<f64>,
        flux: Vec<f64>,
        sig: Option<Vec<f64>>,
        co: Option<Vec<f64>>,
    ) -> Result<Self> {
        let mut spec = Self::new(wavelength, flux)?;
        if let Some(sig) = sig {
            spec = spec.with_uncertainty(sig)?;
        }
        if let Some(co) = co {
            spec = spec.with_continuum(co)?;
        }
        Ok(spec)
    }

    pub fn with_uncertainty(mut self, sig: Vec<f64>) -> Result<Self> {
        self.set_uncertainty(Some(sig))?;
        Ok(self)
    }

    pub fn with_continuum(mut self, co: Vec<f64>) -> Result<Self> {
        self.set_continuum(Some(co))?;
        Ok(self)
    }

    pub fn with_mask(mut self, mask: Vec<bool>) -> Result<Self> {
        SpecError::check_len("mask", self.len(), mask.len())?;
        self.mask = Some(mask);
        Ok(self)
    }

    pub fn with_unit(mut self, unit: WavelengthUnit) -> Self {
        self.unit = unit;
        self.invalidate();
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    // -- Accessors --

    pub fn len(&self) -> usize {
        self.flux.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flux.is_empty()
    }

    pub fn wavelength(&self) -> &[f64] {
        &self.wavelength
    }

    pub fn unit(&self) -> WavelengthUnit {
        self.unit
    }

    pub fn flux(&self) -> &[f64] {
        &self.flux
    }

    /// The 1-sigma error array, if known.
    pub fn sig(&self) -> Option<&[f64]> {
        self.uncertainty.as_deref()
    }

    pub fn continuum(&self) -> Option<&[f64]> {
        self.continuum.as_deref()
    }

    pub fn mask(&self) -> Option<&[bool]> {
        self.mask.as_deref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    // -- Mutators (each invalidates cached diagnostics where relevant) --

    /// Flux is mutable in place; the diagnostics do not depend on it.
    pub fn flux_mut(&mut self) -> &mut [f64] {
        &mut self.flux
    }

    pub fn set_uncertainty(&mut self, sig: Option<Vec<f64>>) -> Result<()> {
        if let Some(s) = &sig {
            SpecError::check_len("uncertainty", self.len(), s.len())?;
        }
        self.uncertainty = sig;
        self.invalidate();
        Ok(())
    }

    pub fn set_continuum(&mut self, co: Option<Vec<f64>>) -> Result<()> {
        if let Some(c) = &co {
            SpecError::check_len("continuum", self.len(), c.len())?;
        }
        self.continuum = co;
        Ok(())
    }

    /// Split borrow used by in-place transforms that rewrite flux and error together.
    pub(crate) fn flux_and_sig_mut(&mut self) -> (&mut [f64], Option<&mut [f64]>) {
        self.diagnostics = OnceCell::new();
        (&mut self.flux, self.uncertainty.as_deref_mut())
    }

    fn invalidate(&mut self) {
        self.diagnostics = OnceCell::new();
    }

    // -- Diagnostics --

    /// Minimum wavelength over pixels with positive uncertainty (all pixels if
    /// the uncertainty is unknown).
    pub fn wv_min(&self) -> Option<f64> {
        self.diagnostics().wv_min
    }

    /// Maximum wavelength over the same good pixels as [`Self::wv_min`].
    pub fn wv_max(&self) -> Option<f64> {
        self.diagnostics().wv_max
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        self.diagnostics.get_or_init(|| self.compute_diagnostics())
    }

    fn compute_diagnostics(&self) -> Diagnostics {
        let good = self.wavelength.iter().enumerate().filter(|(i, _)| {
            self.uncertainty
                .as_ref()
                .map_or(true, |sig| sig[*i] > 0.0)
        });
        let (wv_min, wv_max) = good.fold((None, None), |(lo, hi): (Option<f64>, Option<f64>), (_, &w)| {
            (
                Some(lo.map_or(w, |l| l.min(w))),
                Some(hi.map_or(w, |h| h.max(w))),
            )
        });
        Diagnostics { wv_min, wv_max }
    }

    // -- In-place operations --

    /// Add Gaussian noise to the flux.
    ///
    /// The per-pixel sigma is `1 / s2n` when `s2n` is given, otherwise the
    /// uncertainty array. A seed makes the draw reproducible.
    pub fn add_noise(&mut self, seed: Option<u64>, s2n: Option<f64>) -> Result<()> {
        let sigma: Vec<f64> = match (s2n, &self.uncertainty) {
            (Some(s2n), _) if s2n > 0.0 && s2n.is_finite() => vec![1.0 / s2n; self.len()],
            (Some(s2n), _) => {
                return Err(SpecError::invalid(format!("s2n must be positive, got {s2n}")))
            }
            (None, Some(sig)) => sig.clone(),
            (None, None) => {
                return Err(SpecError::invalid(
                    "add_noise needs either s2n or an uncertainty array",
                ))
            }
        };

        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let normal = Normal::new(0.0, 1.0).map_err(|e| SpecError::invalid(e.to_string()))?;

        for (f, s) in self.flux.iter_mut().zip(sigma) {
            *f += normal.sample(&mut rng) * s;
        }
        log::debug!("added noise to {} pixels (seed {seed:?})", self.len());
        Ok(())
    }

    /// Replace the uncertainty with a constant value.
    pub fn constant_sig(&mut self, sigv: f64) {
        self.uncertainty = Some(vec![sigv; self.len()]);
        self.invalidate();
    }

    /// Velocities (km/s) of every pixel relative to `wv_obs`, usually `(1+z)*w_rest`.
    pub fn relative_vel(&self, wv_obs: Wavelength) -> Result<Vec<f64>> {
        let w0 = wv_obs.value_in(self.unit);
        if !w0.is_finite() || w0 <= 0.0 {
            return Err(SpecError::invalid(format!(
                "reference wavelength must be positive and finite, got {wv_obs}"
            )));
        }
        let c = constants().c_km_s;
        Ok(self.wavelength.iter().map(|w| (w - w0) * c / w0).collect())
    }
}

impl fmt::Display for SpectralData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<SpectralData: ")?;
        if let Some(name) = &self.filename {
            write!(f, "file={name},")?;
        }
        match (self.wv_min(), self.wv_max()) {
            (Some(lo), Some(hi)) => write!(f, " wvmin={lo} {u}, wvmax={hi} {u}", u = self.unit)?,
            _ => write!(f, " no good pixels")?,
        }
        write!(f, " >")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SpectralData {
        SpectralData::from_arrays(
            vec![4000.0, 4001.0, 4002.0, 4003.0, 4004.0],
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            Some(vec![0.0, 0.1, 0.1, 0.1, 0.0]),
            None,
        )
        .unwrap()
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let err = SpectralData::new(vec![1.0, 2.0], vec![1.0]).unwrap_err();
        assert_eq!(
            err,
            SpecError::LengthMismatch {
                what: "flux",
                expected: 2,
                found: 1
            }
        );
        let spec = SpectralData::new(vec![1.0, 2.0], vec![1.0, 1.0]).unwrap();
        assert!(spec.with_uncertainty(vec![0.1]).is_err());
    }

    #[test]
    fn diagnostics_skip_zero_error_pixels() {
        let spec = sample();
        assert_eq!(spec.wv_min(), Some(4001.0));
        assert_eq!(spec.wv_max(), Some(4003.0));
    }

    #[test]
    fn diagnostics_without_error_use_all_pixels() {
        let spec = SpectralData::new(vec![10.0, 11.0, 12.0], vec![0.0; 3]).unwrap();
        assert_eq!(spec.wv_min(), Some(10.0));
        assert_eq!(spec.wv_max(), Some(12.0));
    }

    #[test]
    fn cache_is_reset_when_uncertainty_changes() {
        let mut spec = sample();
        assert_eq!(spec.wv_min(), Some(4001.0));
        spec.constant_sig(1.0);
        assert_eq!(spec.wv_min(), Some(4000.0));
        assert_eq!(spec.wv_max(), Some(4004.0));
        spec.constant_sig(0.0);
        assert_eq!(spec.wv_min(), None);
    }

    #[test]
    fn seeded_noise_is_reproducible() {
        let mut a = sample();
        let mut b = sample();
        a.add_noise(Some(7), Some(10.0)).unwrap();
        b.add_noise(Some(7), Some(10.0)).unwrap();
        assert_eq!(a.flux(), b.flux());
        assert_ne!(a.flux(), sample().flux());
    }

    #[test]
    fn noise_needs_a_sigma_source() {
        let mut spec = SpectralData::new(vec![1.0, 2.0], vec![1.0, 1.0]).unwrap();
        assert!(matches!(spec.add_noise(Some(1), None), Err(SpecError::InvalidInput(_))));
        assert!(spec.add_noise(Some(1), Some(0.0)).is_err());
    }

    #[test]
    fn zero_sigma_noise_leaves_flux() {
        let mut spec = sample();
        spec.constant_sig(0.0);
        spec.add_noise(Some(3), None).unwrap();
        assert_eq!(spec.flux(), sample().flux());
    }

    #[test]
    fn relative_velocity_sign_and_units() {
        let spec = SpectralData::new(vec![1215.67, 1216.67], vec![1.0, 1.0]).unwrap();
        let v = spec.relative_vel(Wavelength::angstrom(1215.67)).unwrap();
        assert!(v[0].abs() < 1e-9);
        assert!(v[1] > 0.0);
        assert!((v[1] - 246.61).abs() < 0.01);

        let v_nm = spec
            .relative_vel(Wavelength::new(121.567, WavelengthUnit::Nanometer))
            .unwrap();
        assert!((v_nm[1] - v[1]).abs() < 1e-6);
        assert!(spec.relative_vel(Wavelength::angstrom(0.0)).is_err());
    }

    #[test]
    fn display_lists_range() {
        let spec = sample().with_filename("qso.json");
        let text = spec.to_string();
        assert!(text.contains("file=qso.json"));
        assert!(text.contains("wvmin=4001"));
    }
}
