use crate::data::spectrum::SpectralData;
use crate::error::Result;
use crate::units::Wavelength;

fn concat_scaled(a: &[f64], b: &[f64], keep: &[usize], scale: f64) -> Vec<f64> {
    a.iter()
        .copied()
        .chain(keep.iter().map(|&i| b[i] * scale))
        .collect()
}

impl SpectralData {
    /// Append the part of `red` lying above `cut` to this (bluer) spectrum.
    ///
    /// `cut` defaults to the largest wavelength of `self`. Flux, error and
    /// continuum taken from `red` are multiplied by `scale`. Nothing is
    /// re-sorted: the result is monotonic only if `red` is.
    ///
    /// Error, continuum and mask survive only when both inputs carry them.
    pub fn splice(
        &self,
        red: &SpectralData,
        cut: Option<Wavelength>,
        scale: f64,
    ) -> Result<SpectralData> {
        let unit = self.unit();
        let cut = match cut {
            Some(w) => w.value_in(unit),
            None => self
                .wavelength()
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max),
        };

        let red_wave: Vec<f64> = red
            .wavelength()
            .iter()
            .map(|&w| red.unit().convert(w, unit))
            .collect();
        let keep: Vec<usize> = (0..red_wave.len()).filter(|&i| red_wave[i] > cut).collect();

        let wave = concat_scaled(self.wavelength(), &red_wave, &keep, 1.0);
        let flux = concat_scaled(self.flux(), red.flux(), &keep, scale);

        let sig = match (self.sig(), red.sig()) {
            (Some(a), Some(b)) => Some(concat_scaled(a, b, &keep, scale)),
            (None, None) => None,
            _ => {
                log::warn!("splice: only one spectrum has an error array, dropping it");
                None
            }
        };
        let co = match (self.continuum(), red.continuum()) {
            (Some(a), Some(b)) => Some(concat_scaled(a, b, &keep, scale)),
            _ => None,
        };

        let mut out = SpectralData::from_arrays(wave, flux, sig, co)?
            .with_unit(unit)
            .with_metadata(self.metadata().clone());
        if let (Some(a), Some(b)) = (self.mask(), red.mask()) {
            let mask = a.iter().copied().chain(keep.iter().map(|&i| b[i])).collect();
            out = out.with_mask(mask)?;
        }
        log::debug!(
            "spliced {} + {} pixels above {cut} {unit}",
            self.len(),
            keep.len()
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::WavelengthUnit;

    fn blue() -> SpectralData {
        SpectralData::from_arrays(
            vec![4000.0, 4001.0, 4002.0, 4003.0],
            vec![1.0; 4],
            Some(vec![0.1; 4]),
            None,
        )
        .unwrap()
    }

    fn red() -> SpectralData {
        SpectralData::from_arrays(
            vec![4002.0, 4003.0, 4004.0, 4005.0],
            vec![2.0; 4],
            Some(vec![0.2; 4]),
            None,
        )
        .unwrap()
    }

    #[test]
    fn default_cut_is_end_of_blue() {
        let out = blue().splice(&red(), None, 1.0).unwrap();
        assert_eq!(out.len(), 6);
        assert_eq!(
            out.wavelength(),
            &[4000.0, 4001.0, 4002.0, 4003.0, 4004.0, 4005.0]
        );
        assert_eq!(out.flux()[4], 2.0);
    }

    #[test]
    fn explicit_cut_and_scale() {
        let out = blue()
            .splice(&red(), Some(Wavelength::angstrom(4004.0)), 0.5)
            .unwrap();
        assert_eq!(out.len(), 5);
        assert_eq!(out.flux()[4], 1.0);
        assert!((out.sig().unwrap()[4] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn no_overlap_leaves_blue_unchanged() {
        let out = blue()
            .splice(&red(), Some(Wavelength::angstrom(9000.0)), 1.0)
            .unwrap();
        assert_eq!(out.wavelength(), blue().wavelength());
        assert_eq!(out.flux(), blue().flux());
    }

    #[test]
    fn red_in_other_unit_is_converted() {
        let red_nm = SpectralData::new(vec![400.15, 400.35, 400.45], vec![2.0; 3])
            .unwrap()
            .with_unit(WavelengthUnit::Nanometer);
        let out = blue().splice(&red_nm, None, 1.0).unwrap();
        assert_eq!(out.len(), 6);
        assert!((out.wavelength()[4] - 4003.5).abs() < 1e-9);
        // blue has an error array, red does not
        assert!(out.sig().is_none());
    }
}
