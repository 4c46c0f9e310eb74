use crate::data::spectrum::SpectralData;
use crate::error::{Result, SpecError};

// ---------------------------------------------------------------------------
// Pixel edges
// ---------------------------------------------------------------------------

/// Pixel boundaries of a grid: `N + 1` edges at the midpoints between
/// samples, with the outermost two placed half a pixel beyond the ends.
pub fn bin_edges(wave: &[f64]) -> Result<Vec<f64>> {
    let n = wave.len();
    if n < 2 {
        return Err(SpecError::invalid(format!(
            "need at least 2 pixels to define bin edges, got {n}"
        )));
    }
    let mut edges = Vec::with_capacity(n + 1);
    edges.push(wave[0] - (wave[1] - wave[0]) / 2.0);
    edges.extend(wave.windows(2).map(|w| (w[0] + w[1]) / 2.0));
    edges.push(wave[n - 1] + (wave[n - 1] - wave[n - 2]) / 2.0);
    Ok(edges)
}

/// Width of every pixel on `wave`.
pub fn bin_widths(wave: &[f64]) -> Result<Vec<f64>> {
    Ok(bin_edges(wave)?.windows(2).map(|e| e[1] - e[0]).collect())
}

// ---------------------------------------------------------------------------
// Cumulative flux curve
// ---------------------------------------------------------------------------

/// Integrated flux as a piecewise-linear function of wavelength.
///
/// Zero below the first edge, the total above the last one.
struct CumulativeFlux {
    edges: Vec<f64>,
    cum: Vec<f64>,
}

impl CumulativeFlux {
    fn new(wave: &[f64], flux: &[f64]) -> Result<Self> {
        let edges = bin_edges(wave)?;
        let mut cum = Vec::with_capacity(edges.len());
        cum.push(0.0);
        let mut total = 0.0;
        for (f, e) in flux.iter().zip(edges.windows(2)) {
            total += f * (e[1] - e[0]);
            cum.push(total);
        }
        Ok(Self { edges, cum })
    }

    fn total(&self) -> f64 {
        self.cum[self.cum.len() - 1]
    }

    fn at(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        let last = self.edges.len() - 1;
        if x <= self.edges[0] {
            return 0.0;
        }
        if x >= self.edges[last] {
            return self.total();
        }
        // edges[i - 1] < x < edges[i]
        let i = self.edges.partition_point(|&e| e < x);
        let (x0, x1) = (self.edges[i - 1], self.edges[i]);
        let (y0, y1) = (self.cum[i - 1], self.cum[i]);
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }
}

/// Flux-conserving resample of `flux` from `wave` onto `new_wave`.
///
/// Each output pixel gets the integrated source flux between its edges
/// divided by its width. Parts of an output pixel outside the source grid
/// receive no flux, so the first and last output pixels are unreliable
/// whenever the new grid reaches past the old one.
pub fn rebin_flux(wave: &[f64], flux: &[f64], new_wave: &[f64]) -> Result<Vec<f64>> {
    SpecError::check_len("flux", wave.len(), flux.len())?;
    let curve = CumulativeFlux::new(wave, flux)?;
    let new_edges = bin_edges(new_wave)?;

    let cum: Vec<f64> = new_edges.iter().map(|&x| curve.at(x)).collect();
    Ok(cum
        .windows(2)
        .zip(new_edges.windows(2))
        .map(|(c, e)| (c[1] - c[0]) / (e[1] - e[0]))
        .collect())
}

impl SpectralData {
    /// Rebin onto `new_wave` (same unit as `self`), conserving flux.
    ///
    /// The uncertainty is not propagated: the result has no error array,
    /// no continuum and no mask. Do not trust either edge pixel of the new
    /// grid. Bins outside `[wv_min, wv_max]` come back as zero flux rather
    /// than an error; check the range first if that matters.
    pub fn rebin(&self, new_wave: &[f64]) -> Result<SpectralData> {
        let new_flux = rebin_flux(self.wavelength(), self.flux(), new_wave)?;
        log::debug!("rebinned {} -> {} pixels", self.len(), new_flux.len());
        Ok(SpectralData::new(new_wave.to_vec(), new_flux)?
            .with_unit(self.unit())
            .with_metadata(self.metadata().clone()))
    }
}
