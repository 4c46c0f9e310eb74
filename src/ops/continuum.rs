use serde::{Deserialize, Serialize};

use crate::data::model::{Metadata, MetadataValue};
use crate::data::spectrum::SpectralData;
use crate::error::{Result, SpecError};
use crate::units::WavelengthUnit;

use super::interp::{interp, AkimaSpline};

/// Metadata key under which continuum knots are persisted.
pub const CONTPOINTS_KEY: &str = "contpoints";

/// Rest wavelength of Lyman-alpha, Angstrom.
const LYA_REST: f64 = 1215.67;

const CLIP_LOW: f64 = 2.0;
const CLIP_HIGH: f64 = 3.0;
const CLIP_ITERATIONS: usize = 5;

// ---------------------------------------------------------------------------
// Knots
// ---------------------------------------------------------------------------

/// A spline control point of the continuum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Knot {
    pub wavelength: f64,
    pub flux: f64,
}

impl Knot {
    pub fn new(wavelength: f64, flux: f64) -> Self {
        Self { wavelength, flux }
    }
}

fn sort_knots(knots: &mut [Knot]) {
    knots.sort_by(|a, b| a.wavelength.total_cmp(&b.wavelength));
}

/// Encode knots as a `[[wavelength, flux], ...]` metadata list.
pub fn knots_to_metadata(knots: &[Knot]) -> MetadataValue {
    MetadataValue::List(
        knots
            .iter()
            .map(|k| MetadataValue::List(vec![k.wavelength.into(), k.flux.into()]))
            .collect(),
    )
}

/// Decode knots stored by [`knots_to_metadata`]. Malformed entries are skipped.
pub fn knots_from_metadata(value: &MetadataValue) -> Vec<Knot> {
    value
        .as_list()
        .unwrap_or_default()
        .iter()
        .filter_map(|pair| match pair.as_list()? {
            [x, y] => Some(Knot::new(x.as_f64()?, y.as_f64()?)),
            _ => None,
        })
        .collect()
}

/// Merge `new` into the stored knots: a new knot replaces a stored one at
/// the same wavelength, everything stays sorted.
fn merge_contpoints(meta: &mut Metadata, new: &[Knot]) {
    let mut knots = meta
        .get(CONTPOINTS_KEY)
        .map(knots_from_metadata)
        .unwrap_or_default();
    knots.retain(|k| !new.iter().any(|n| n.wavelength == k.wavelength));
    knots.extend_from_slice(new);
    sort_knots(&mut knots);
    meta.insert(CONTPOINTS_KEY.to_string(), knots_to_metadata(&knots));
}

// ---------------------------------------------------------------------------
// Chunking and local statistics
// ---------------------------------------------------------------------------

/// Split `[wmin, wmax]` into equal chunks roughly `dw` wide (at least 3).
pub fn chunk_edges(wmin: f64, wmax: f64, dw: f64) -> Result<Vec<f64>> {
    if !(dw > 0.0 && dw.is_finite()) {
        return Err(SpecError::invalid(format!("knot spacing must be positive, got {dw}")));
    }
    let nchunks = (((wmax - wmin) / dw).floor() as usize).max(3);
    let step = (wmax - wmin) / nchunks as f64;
    Ok((0..=nchunks).map(|i| wmin + step * i as f64).collect())
}

/// How a chunk's flux level is estimated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KnotStatistic {
    /// Median after clipping absorption and spikes.
    ClippedMedian,
    /// Given percentile (0-100) of the good pixels; for absorbed regions
    /// such as the Lyman-alpha forest where the median sits below the continuum.
    Percentile(f64),
}

/// Knots placed one per chunk, plus what was used to place them.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedKnots {
    pub knots: Vec<Knot>,
    /// First pixel of every chunk (`wave.searchsorted(edges)`).
    pub indices: Vec<usize>,
    /// Pixels rejected by the clipping.
    pub masked: Vec<bool>,
}

fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    percentile(values, 50.0)
}

/// Place one knot per chunk between consecutive `edges`.
///
/// Pixels count when the flux is finite and the error (if given) positive.
/// The knot sits at the median wavelength of the surviving pixels.
pub fn prepare_knots(
    wave: &[f64],
    flux: &[f64],
    sig: Option<&[f64]>,
    edges: &[f64],
    stat: KnotStatistic,
) -> PreparedKnots {
    let indices: Vec<usize> = edges
        .iter()
        .map(|&e| wave.partition_point(|&w| w < e))
        .collect();
    let mut masked = vec![false; wave.len()];
    let mut knots = Vec::new();

    for bounds in indices.windows(2) {
        let (i0, i1) = (bounds[0], bounds[1]);
        let good: Vec<usize> = (i0..i1)
            .filter(|&i| flux[i].is_finite() && sig.map_or(true, |s| s[i] > 0.0))
            .collect();
        if good.is_empty() {
            continue;
        }

        let keep = match stat {
            KnotStatistic::ClippedMedian => clip(flux, sig, good.clone()),
            KnotStatistic::Percentile(_) => good.clone(),
        };
        for &i in good.iter().filter(|&&i| !keep.contains(&i)) {
            masked[i] = true;
        }

        let mut fl: Vec<f64> = keep.iter().map(|&i| flux[i]).collect();
        let level = match stat {
            KnotStatistic::ClippedMedian => median(&mut fl),
            KnotStatistic::Percentile(q) => {
                fl.sort_by(f64::total_cmp);
                percentile(&fl, q)
            }
        };
        let mut wl: Vec<f64> = keep.iter().map(|&i| wave[i]).collect();
        knots.push(Knot::new(median(&mut wl), level));
    }

    PreparedKnots {
        knots,
        indices,
        masked,
    }
}

/// Iteratively reject pixels more than `CLIP_LOW` sigma below or
/// `CLIP_HIGH` sigma above the median. Without an error array the sigma is
/// the scaled median absolute deviation.
fn clip(flux: &[f64], sig: Option<&[f64]>, mut keep: Vec<usize>) -> Vec<usize> {
    for _ in 0..CLIP_ITERATIONS {
        let mut fl: Vec<f64> = keep.iter().map(|&i| flux[i]).collect();
        let med = median(&mut fl);
        let mad_sigma = {
            let mut dev: Vec<f64> = fl.iter().map(|f| (f - med).abs()).collect();
            1.4826 * median(&mut dev)
        };

        let next: Vec<usize> = keep
            .iter()
            .copied()
            .filter(|&i| {
                let s = sig.map_or(mad_sigma, |s| s[i]);
                if s <= 0.0 {
                    return true;
                }
                let r = (flux[i] - med) / s;
                r > -CLIP_LOW && r < CLIP_HIGH
            })
            .collect();
        if next.len() == keep.len() || next.len() < 3 {
            break;
        }
        keep = next;
    }
    keep
}

// ---------------------------------------------------------------------------
// Object-class heuristics
// ---------------------------------------------------------------------------

/// Knot-placement heuristics for specific object classes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContinuumKind {
    /// Quasar: wider chunks and an upper percentile inside the Lyman-alpha
    /// forest, narrower clipped-median chunks redward of Lyman-alpha emission.
    Qso {
        redshift: f64,
        divmult: f64,
        forest_divmult: f64,
    },
}

impl ContinuumKind {
    pub fn qso(redshift: f64) -> Self {
        ContinuumKind::Qso {
            redshift,
            divmult: 1.0,
            forest_divmult: 2.0,
        }
    }

    /// Knots over `[wmin, wmax]` with base spacing `dw`.
    pub fn knots(
        &self,
        spec: &SpectralData,
        (wmin, wmax): (f64, f64),
        dw: f64,
    ) -> Result<Vec<Knot>> {
        let ContinuumKind::Qso {
            redshift,
            divmult,
            forest_divmult,
        } = *self;
        let lya = WavelengthUnit::Angstrom.convert(LYA_REST * (1.0 + redshift), spec.unit());

        let mut regions = Vec::new();
        if wmin < lya {
            regions.push((wmin, lya.min(wmax), dw * forest_divmult, KnotStatistic::Percentile(90.0)));
        }
        if wmax > lya {
            regions.push((lya.max(wmin), wmax, dw * divmult, KnotStatistic::ClippedMedian));
        }

        let mut knots = Vec::new();
        for (lo, hi, spacing, stat) in regions {
            let edges = chunk_edges(lo, hi, spacing)?;
            let prepared = prepare_knots(spec.wavelength(), spec.flux(), spec.sig(), &edges, stat);
            knots.extend(prepared.knots);
        }
        sort_knots(&mut knots);
        Ok(knots)
    }
}

// ---------------------------------------------------------------------------
// Editor contract
// ---------------------------------------------------------------------------

/// What the continuum editor is handed.
#[derive(Debug, Clone)]
pub struct EditSession<'a> {
    pub wavelength: &'a [f64],
    pub flux: &'a [f64],
    pub sig: Option<&'a [f64]>,
    /// Starting knots, sorted by wavelength.
    pub knots: Vec<Knot>,
    /// Existing continuum, if any.
    pub continuum: Option<&'a [f64]>,
    /// Fitted wavelength range.
    pub wlim: (f64, f64),
    /// Keep the existing continuum outside `wlim`.
    pub anchor: bool,
}

/// What the editor hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub continuum: Vec<f64>,
    pub knots: Vec<Knot>,
}

/// A continuum editor, usually interactive. It receives the spectrum and a
/// set of knots and returns the final continuum with the knots that define it.
pub trait ContinuumEditor {
    fn edit(&mut self, session: EditSession<'_>) -> Result<EditOutcome>;
}

/// Non-interactive editor: accepts the knots as given and evaluates an
/// Akima spline through them.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplineEditor;

impl ContinuumEditor for SplineEditor {
    fn edit(&mut self, session: EditSession<'_>) -> Result<EditOutcome> {
        let mut continuum = continuum_from_knots(session.wavelength, &session.knots)?;
        if let (true, Some(old)) = (session.anchor, session.continuum) {
            let (lo, hi) = session.wlim;
            for (i, &w) in session.wavelength.iter().enumerate() {
                if w < lo || w > hi {
                    continuum[i] = old[i];
                }
            }
        }
        Ok(EditOutcome {
            continuum,
            knots: session.knots,
        })
    }
}

/// Evaluate the continuum defined by `knots` on `wave`.
pub fn continuum_from_knots(wave: &[f64], knots: &[Knot]) -> Result<Vec<f64>> {
    let mut sorted = knots.to_vec();
    sort_knots(&mut sorted);
    sorted.dedup_by(|a, b| a.wavelength == b.wavelength);
    let spline = AkimaSpline::new(
        sorted.iter().map(|k| k.wavelength).collect(),
        sorted.iter().map(|k| k.flux).collect(),
    )?;
    Ok(spline.eval_many(wave))
}

// ---------------------------------------------------------------------------
// Fitting on SpectralData
// ---------------------------------------------------------------------------

/// Where the starting knots come from.
#[derive(Debug, Clone, PartialEq)]
pub enum KnotSource {
    /// Use these knots as they are.
    Explicit(Vec<Knot>),
    /// Reuse the knots stored under `contpoints` in the metadata.
    Stored,
    /// One knot per chunk between these edges.
    Edges(Vec<f64>),
    /// Chunks roughly this wide across the fitted range.
    Spacing(f64),
    /// Object-class heuristics with base spacing `dw`.
    Kind { kind: ContinuumKind, dw: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContinuumOptions {
    /// Wavelength range to fit; the whole spectrum when `None`.
    pub wlim: Option<(f64, f64)>,
    pub source: KnotSource,
}

impl SpectralData {
    /// Build starting knots, run `editor`, and store the result.
    ///
    /// Knot values are re-read from an existing continuum so an edit
    /// continues the previous one. On success the continuum is replaced and
    /// the returned knots are merged into `metadata["contpoints"]`.
    pub fn fit_continuum<E: ContinuumEditor + ?Sized>(
        &mut self,
        options: &ContinuumOptions,
        editor: &mut E,
    ) -> Result<()> {
        if self.is_empty() {
            return Err(SpecError::invalid("cannot fit a continuum to an empty spectrum"));
        }
        let wave = self.wavelength();
        let (wlim, anchor) = match options.wlim {
            None => ((wave[0], wave[wave.len() - 1]), false),
            Some((a, b)) if b < a => ((b, a), true),
            Some(lim) => (lim, true),
        };

        let mut knots = match &options.source {
            KnotSource::Explicit(k) => k.clone(),
            KnotSource::Stored => {
                let stored = self
                    .metadata()
                    .get(CONTPOINTS_KEY)
                    .map(knots_from_metadata)
                    .unwrap_or_default();
                if stored.is_empty() {
                    return Err(SpecError::invalid("no stored contpoints to start from"));
                }
                stored
            }
            KnotSource::Edges(edges) => {
                prepare_knots(wave, self.flux(), self.sig(), edges, KnotStatistic::ClippedMedian)
                    .knots
            }
            KnotSource::Spacing(dw) => {
                let edges = chunk_edges(wlim.0, wlim.1, *dw)?;
                prepare_knots(wave, self.flux(), self.sig(), &edges, KnotStatistic::ClippedMedian)
                    .knots
            }
            KnotSource::Kind { kind, dw } => kind
                .knots(self, wlim, *dw)?
                .into_iter()
                .filter(|k| wlim.0 <= k.wavelength && k.wavelength <= wlim.1)
                .collect(),
        };
        if knots.is_empty() {
            return Err(SpecError::invalid("no usable pixels to place continuum knots"));
        }
        if let Some(k) = knots.iter().find(|k| !k.wavelength.is_finite()) {
            return Err(SpecError::invalid(format!(
                "continuum knot wavelength must be finite, got {}",
                k.wavelength
            )));
        }

        if let Some(co) = self.continuum() {
            for k in knots.iter_mut() {
                k.flux = interp(k.wavelength, wave, co);
            }
        }
        sort_knots(&mut knots);
        log::debug!("starting continuum edit with {} knots over {wlim:?}", knots.len());

        let outcome = editor.edit(EditSession {
            wavelength: wave,
            flux: self.flux(),
            sig: self.sig(),
            knots,
            continuum: self.continuum(),
            wlim,
            anchor,
        })?;

        log::info!("Updating continuum");
        self.set_continuum(Some(outcome.continuum))?;
        merge_contpoints(self.metadata_mut(), &outcome.knots);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat continuum at 2.0 with an absorption dip, 1 Angstrom pixels.
    fn absorbed() -> SpectralData {
        let wave: Vec<f64> = (0..100).map(|i| 4000.0 + i as f64).collect();
        let flux: Vec<f64> = wave
            .iter()
            .map(|w| if (4044.0..=4046.0).contains(w) { 0.5 } else { 2.0 })
            .collect();
        let sig = vec![0.05; wave.len()];
        SpectralData::from_arrays(wave, flux, Some(sig), None).unwrap()
    }

    /// Records the session and returns a fixed continuum.
    struct Recorder {
        seen: Vec<Knot>,
    }

    impl ContinuumEditor for Recorder {
        fn edit(&mut self, session: EditSession<'_>) -> Result<EditOutcome> {
            self.seen = session.knots.clone();
            Ok(EditOutcome {
                continuum: vec![3.0; session.wavelength.len()],
                knots: session.knots,
            })
        }
    }

    #[test]
    fn chunking_has_a_minimum_of_three() {
        let edges = chunk_edges(0.0, 10.0, 100.0).unwrap();
        assert_eq!(edges.len(), 4);
        let edges = chunk_edges(0.0, 100.0, 10.0).unwrap();
        assert_eq!(edges.len(), 11);
        assert!((edges[10] - 100.0).abs() < 1e-12);
        assert!(chunk_edges(0.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn knots_ignore_absorption() {
        let spec = absorbed();
        let edges = chunk_edges(4000.0, 4100.0, 10.0).unwrap();
        let prepared = prepare_knots(
            spec.wavelength(),
            spec.flux(),
            spec.sig(),
            &edges,
            KnotStatistic::ClippedMedian,
        );
        assert_eq!(prepared.knots.len(), 10);
        for k in &prepared.knots {
            assert!((k.flux - 2.0).abs() < 1e-12);
        }
        assert!(prepared.masked[45]);
        assert!(!prepared.masked[10]);
        assert_eq!(prepared.indices[0], 0);
    }

    #[test]
    fn knots_skip_chunks_without_good_pixels() {
        let wave: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let flux = vec![1.0; 30];
        let mut sig = vec![0.1; 30];
        for s in sig.iter_mut().take(10) {
            *s = 0.0;
        }
        let edges = [0.0, 10.0, 20.0, 30.0];
        let prepared =
            prepare_knots(&wave, &flux, Some(&sig), &edges, KnotStatistic::ClippedMedian);
        assert_eq!(prepared.knots.len(), 2);
    }

    #[test]
    fn percentile_statistic() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 50.0), 3.0);
        assert!((percentile(&sorted, 90.0) - 4.6).abs() < 1e-12);
    }

    #[test]
    fn metadata_round_trip() {
        let knots = vec![Knot::new(4000.5, 1.0), Knot::new(4010.0, 1.2)];
        let back = knots_from_metadata(&knots_to_metadata(&knots));
        assert_eq!(back, knots);
    }

    #[test]
    fn spline_editor_fit_stores_continuum_and_knots() {
        let mut spec = absorbed();
        let options = ContinuumOptions {
            wlim: None,
            source: KnotSource::Spacing(10.0),
        };
        spec.fit_continuum(&options, &mut SplineEditor).unwrap();

        let co = spec.continuum().unwrap();
        for v in co {
            assert!((v - 2.0).abs() < 1e-9);
        }
        let stored = knots_from_metadata(&spec.metadata()[CONTPOINTS_KEY]);
        assert!(stored.len() >= 9);
        assert!(stored.windows(2).all(|w| w[0].wavelength < w[1].wavelength));
    }

    #[test]
    fn non_finite_knot_wavelength_is_rejected() {
        let mut spec = absorbed().with_continuum(vec![5.0; 100]).unwrap();
        let options = ContinuumOptions {
            wlim: None,
            source: KnotSource::Explicit(vec![Knot::new(f64::NAN, 1.0), Knot::new(4050.0, 1.0)]),
        };
        let err = spec.fit_continuum(&options, &mut SplineEditor).unwrap_err();
        assert!(matches!(err, SpecError::InvalidInput(_)));
        assert_eq!(spec.continuum().unwrap(), &[5.0; 100][..]);
    }

    #[test]
    fn existing_continuum_sets_knot_values() {
        let mut spec = absorbed().with_continuum(vec![5.0; 100]).unwrap();
        let mut editor = Recorder { seen: Vec::new() };
        let options = ContinuumOptions {
            wlim: Some((4090.0, 4010.0)),
            source: KnotSource::Explicit(vec![Knot::new(4060.0, 0.0), Knot::new(4020.0, 0.0)]),
        };
        spec.fit_continuum(&options, &mut editor).unwrap();

        assert_eq!(editor.seen.len(), 2);
        assert_eq!(editor.seen[0].wavelength, 4020.0);
        assert!(editor.seen.iter().all(|k| k.flux == 5.0));
        assert_eq!(spec.continuum().unwrap()[0], 3.0);
    }

    #[test]
    fn refit_merges_contpoints() {
        let mut spec = absorbed();
        let first = ContinuumOptions {
            wlim: None,
            source: KnotSource::Explicit(vec![Knot::new(4010.0, 2.0), Knot::new(4090.0, 2.0)]),
        };
        spec.fit_continuum(&first, &mut SplineEditor).unwrap();
        let second = ContinuumOptions {
            wlim: None,
            source: KnotSource::Explicit(vec![Knot::new(4050.0, 2.0), Knot::new(4090.0, 2.0)]),
        };
        spec.fit_continuum(&second, &mut SplineEditor).unwrap();

        let stored = knots_from_metadata(&spec.metadata()[CONTPOINTS_KEY]);
        let xs: Vec<f64> = stored.iter().map(|k| k.wavelength).collect();
        assert_eq!(xs, vec![4010.0, 4050.0, 4090.0]);

        let third = ContinuumOptions {
            wlim: None,
            source: KnotSource::Stored,
        };
        spec.fit_continuum(&third, &mut SplineEditor).unwrap();
        assert_eq!(knots_from_metadata(&spec.metadata()[CONTPOINTS_KEY]).len(), 3);
    }

    #[test]
    fn anchored_fit_keeps_old_continuum_outside_window() {
        let mut spec = absorbed().with_continuum(vec![7.0; 100]).unwrap();
        let options = ContinuumOptions {
            wlim: Some((4020.0, 4080.0)),
            source: KnotSource::Explicit(vec![Knot::new(4030.0, 0.0), Knot::new(4070.0, 0.0)]),
        };
        spec.fit_continuum(&options, &mut SplineEditor).unwrap();
        let co = spec.continuum().unwrap();
        assert_eq!(co[0], 7.0);
        assert_eq!(co[99], 7.0);
        // knot values came from the old continuum
        assert!((co[50] - 7.0).abs() < 1e-9);
    }

    #[test]
    fn qso_knots_use_wider_forest_chunks() {
        // z = 2.3: Lya emission at 4011.7 A
        let wave: Vec<f64> = (0..400).map(|i| 3800.0 + i as f64).collect();
        let flux = vec![1.0; 400];
        let spec = SpectralData::from_arrays(wave, flux, Some(vec![0.1; 400]), None).unwrap();
        let kind = ContinuumKind::qso(2.3);
        let knots = kind.knots(&spec, (3800.0, 4199.0), 20.0).unwrap();

        let lya = 1215.67 * 3.3;
        let forest = knots.iter().filter(|k| k.wavelength < lya).count();
        let red = knots.iter().filter(|k| k.wavelength > lya).count();
        // 211.7 A of forest in 40 A chunks, 187.3 A redward in 20 A chunks
        assert_eq!(forest, 5);
        assert_eq!(red, 9);
        assert!(knots.windows(2).all(|w| w[0].wavelength <= w[1].wavelength));
    }

    #[test]
    fn empty_knot_set_is_invalid() {
        let mut spec = absorbed();
        let options = ContinuumOptions {
            wlim: None,
            source: KnotSource::Stored,
        };
        assert!(spec.fit_continuum(&options, &mut SplineEditor).is_err());
    }
}
