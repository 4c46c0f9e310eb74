use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::data::spectrum::SpectralData;
use crate::error::{Result, SpecError};

/// 2 * sqrt(2 * ln 2): FWHM to sigma.
const FWHM_PER_SIGMA: f64 = 2.354820046;
/// sqrt(2 * ln 100): the Gaussian is down to 1% of its peak this many sigma out.
const SIGMA_TO_ONE_PERCENT: f64 = 3.034854259;

// ---------------------------------------------------------------------------
// Kernels
// ---------------------------------------------------------------------------

/// Discrete box kernel of width `nbox`, normalised to unit sum.
///
/// Odd widths give `nbox` equal taps. Even widths give `nbox + 1` taps with
/// half weight at both ends, so the kernel stays centred.
pub fn box_kernel(nbox: usize) -> Vec<f64> {
    let w = nbox as f64;
    if nbox % 2 == 1 {
        vec![1.0 / w; nbox]
    } else {
        let mut k = vec![1.0 / w; nbox + 1];
        k[0] = 0.5 / w;
        k[nbox] = 0.5 / w;
        k
    }
}

/// Gaussian kernel for `fwhm` in pixels, truncated at 1% of the peak.
pub fn gaussian_kernel(fwhm: f64) -> Vec<f64> {
    let sigma = fwhm / FWHM_PER_SIGMA;
    let half = (SIGMA_TO_ONE_PERCENT * sigma).ceil() as i64;
    let mut k: Vec<f64> = (-half..=half)
        .map(|x| (-((x * x) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f64 = k.iter().sum();
    k.iter_mut().for_each(|v| *v /= total);
    k
}

/// Centred convolution with zero fill past both ends.
///
/// NaN samples are skipped and the remaining kernel weight renormalised;
/// the zero-filled boundary still counts, so edge pixels are pulled down.
pub fn convolve_fill(data: &[f64], kernel: &[f64]) -> Vec<f64> {
    let n = data.len() as isize;
    let half = (kernel.len() / 2) as isize;
    (0..n)
        .map(|i| {
            let mut acc = 0.0;
            let mut weight = 0.0;
            for (k, &kv) in kernel.iter().enumerate() {
                let j = i + k as isize - half;
                if j < 0 || j >= n {
                    weight += kv;
                    continue;
                }
                let v = data[j as usize];
                if v.is_nan() {
                    continue;
                }
                acc += kv * v;
                weight += kv;
            }
            if weight > 0.0 {
                acc / weight
            } else {
                f64::NAN
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Edge handling for the Gaussian PSF
// ---------------------------------------------------------------------------

/// How the array is extended past its ends before convolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EdgeMode {
    /// Point-reflect about the end value: `2*a[0] - a[k]`. Keeps linear trends.
    #[default]
    Invert,
    /// Mirror: `a[k]`.
    Reflect,
    /// Repeat the end value.
    Extend,
}

fn pad(data: &[f64], n: usize, edge: EdgeMode) -> Vec<f64> {
    let len = data.len();
    let last = len - 1;
    let left = |k: usize| data[k.min(last)];
    let right = |k: usize| data[last - k.min(last)];

    let mut out = Vec::with_capacity(len + 2 * n);
    for k in (1..=n).rev() {
        out.push(match edge {
            EdgeMode::Invert => 2.0 * data[0] - left(k),
            EdgeMode::Reflect => left(k),
            EdgeMode::Extend => data[0],
        });
    }
    out.extend_from_slice(data);
    for k in 1..=n {
        out.push(match edge {
            EdgeMode::Invert => 2.0 * data[last] - right(k),
            EdgeMode::Reflect => right(k),
            EdgeMode::Extend => data[last],
        });
    }
    out
}

/// Replace NaNs by linear interpolation between the nearest finite
/// neighbours; leading/trailing NaNs take the nearest finite value.
pub fn interpolate_nans(data: &[f64]) -> Vec<f64> {
    let good: Vec<usize> = (0..data.len()).filter(|&i| !data[i].is_nan()).collect();
    if good.is_empty() || good.len() == data.len() {
        return data.to_vec();
    }
    let mut out = data.to_vec();
    for (i, v) in out.iter_mut().enumerate() {
        if !v.is_nan() {
            continue;
        }
        let pos = good.partition_point(|&g| g < i);
        *v = match (pos.checked_sub(1).map(|p| good[p]), good.get(pos)) {
            (Some(a), Some(&b)) => {
                let t = (i - a) as f64 / (b - a) as f64;
                data[a] + t * (data[b] - data[a])
            }
            (Some(a), None) => data[a],
            (None, Some(&b)) => data[b],
            (None, None) => f64::NAN,
        };
    }
    out
}

/// Convolve `data` with a Gaussian PSF of `fwhm` pixels.
pub fn convolve_psf(data: &[f64], fwhm: f64, edge: EdgeMode) -> Result<Vec<f64>> {
    if !(fwhm > 0.0 && fwhm.is_finite()) {
        return Err(SpecError::invalid(format!("fwhm must be positive, got {fwhm}")));
    }
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let kernel = gaussian_kernel(fwhm);
    let half = kernel.len() / 2;
    let padded = pad(&interpolate_nans(data), half, edge);

    Ok((0..data.len())
        .map(|i| {
            kernel
                .iter()
                .zip(&padded[i..i + kernel.len()])
                .map(|(k, v)| k * v)
                .sum::<f64>()
        })
        .collect())
}

/// Average consecutive blocks of `nbox` values, dropping any remainder.
fn block_mean(data: &[f64], nbox: usize) -> Vec<f64> {
    data.chunks_exact(nbox)
        .map(|c| c.iter().sum::<f64>() / nbox as f64)
        .collect()
}

// ---------------------------------------------------------------------------
// Smoothing on SpectralData
// ---------------------------------------------------------------------------

impl SpectralData {
    /// Box-car smooth over `nbox` pixels and return a new spectrum.
    ///
    /// Without `preserve`, the spectrum is cut to `floor(N/nbox)*nbox` pixels
    /// and block-averaged, giving `floor(N/nbox)` pixels; the error is the
    /// block mean divided by `sqrt(nbox)`. With `preserve`, flux and error are
    /// convolved with a box kernel and the grid is left as is.
    pub fn box_smooth(&self, nbox: usize, preserve: bool) -> Result<SpectralData> {
        if nbox == 0 {
            return Err(SpecError::DivisionByZero("box_smooth with nbox = 0".into()));
        }

        let (wave, flux, sig) = if preserve {
            let kernel = box_kernel(nbox);
            (
                self.wavelength().to_vec(),
                convolve_fill(self.flux(), &kernel),
                self.sig().map(|s| convolve_fill(s, &kernel)),
            )
        } else {
            let root = (nbox as f64).sqrt();
            (
                block_mean(self.wavelength(), nbox),
                block_mean(self.flux(), nbox),
                self.sig()
                    .map(|s| block_mean(s, nbox).into_iter().map(|v| v / root).collect::<Vec<f64>>()),
            )
        };
        log::debug!(
            "box_smooth nbox={nbox} preserve={preserve}: {} -> {} pixels",
            self.len(),
            flux.len()
        );

        let out = SpectralData::from_arrays(wave, flux, sig, None)?
            .with_unit(self.unit())
            .with_metadata(self.metadata().clone());
        Ok(out)
    }

    /// Smooth the flux with a Gaussian of `fwhm` pixels.
    ///
    /// Wavelength and uncertainty pass through unchanged.
    pub fn gauss_smooth(&self, fwhm: f64, edge: EdgeMode) -> Result<SpectralData> {
        let flux = convolve_psf(self.flux(), fwhm, edge)?;
        let out = SpectralData::from_arrays(
            self.wavelength().to_vec(),
            flux,
            self.sig().map(<[f64]>::to_vec),
            None,
        )?
        .with_unit(self.unit())
        .with_metadata(self.metadata().clone());
        Ok(out)
    }
}
