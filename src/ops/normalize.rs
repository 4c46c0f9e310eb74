use serde::{Deserialize, Serialize};

use crate::data::spectrum::SpectralData;
use crate::error::{Result, SpecError};

/// What `normalize` does when the continuum and flux lengths differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthCheck {
    /// Any mismatch is an error.
    #[default]
    Strict,
    /// A longer continuum is truncated (with a warning); a shorter one is
    /// still an error.
    Tolerant,
}

impl SpectralData {
    /// Divide flux, and error if present, by a continuum. Mutates in place.
    ///
    /// Uses `continuum` when given, otherwise the stored continuum.
    pub fn normalize(&mut self, continuum: Option<&[f64]>, check: LengthCheck) -> Result<()> {
        let co: Vec<f64> = match continuum.or(self.continuum()) {
            Some(c) => c.to_vec(),
            None => {
                return Err(SpecError::invalid(
                    "normalize needs a continuum: pass one or fit one first",
                ))
            }
        };

        let n = self.len();
        if co.len() != n {
            match check {
                LengthCheck::Tolerant if co.len() > n => {
                    log::warn!(
                        "continuum has {} values but flux has {n}; truncating continuum",
                        co.len()
                    );
                }
                LengthCheck::Tolerant => {
                    return Err(SpecError::invalid(format!(
                        "continuum ({}) is shorter than flux ({n})",
                        co.len()
                    )))
                }
                LengthCheck::Strict => {
                    return Err(SpecError::invalid(format!(
                        "continuum has {} values but flux has {n}",
                        co.len()
                    )))
                }
            }
        }

        let (flux, sig) = self.flux_and_sig_mut();
        for (f, c) in flux.iter_mut().zip(&co) {
            *f /= c;
        }
        if let Some(sig) = sig {
            for (s, c) in sig.iter_mut().zip(&co) {
                *s /= c;
            }
        }
        log::debug!("normalized {n} pixels by the continuum");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> SpectralData {
        SpectralData::from_arrays(
            vec![1.0, 2.0, 3.0],
            vec![2.0, 4.0, 9.0],
            Some(vec![0.2, 0.4, 0.3]),
            None,
        )
        .unwrap()
    }

    #[test]
    fn divides_flux_and_error() {
        let mut s = spec();
        s.normalize(Some(&[2.0, 4.0, 3.0]), LengthCheck::Strict).unwrap();
        assert_eq!(s.flux(), &[1.0, 1.0, 3.0]);
        let sig = s.sig().unwrap();
        assert!((sig[0] - 0.1).abs() < 1e-12);
        assert!((sig[2] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn falls_back_to_stored_continuum() {
        let mut s = spec().with_continuum(vec![2.0, 2.0, 3.0]).unwrap();
        s.normalize(None, LengthCheck::Strict).unwrap();
        assert_eq!(s.flux(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn missing_continuum_is_invalid() {
        let mut s = spec();
        let err = s.normalize(None, LengthCheck::Strict).unwrap_err();
        assert!(matches!(err, SpecError::InvalidInput(_)));
    }

    #[test]
    fn strict_rejects_any_mismatch() {
        let mut s = spec();
        let short = s.normalize(Some(&[1.0, 1.0]), LengthCheck::Strict).unwrap_err();
        assert!(matches!(short, SpecError::InvalidInput(_)));
        let long = s.normalize(Some(&[1.0; 4]), LengthCheck::Strict).unwrap_err();
        assert!(matches!(long, SpecError::InvalidInput(_)));
        assert_eq!(s.flux(), spec().flux());
    }

    #[test]
    fn tolerant_truncates_longer_continuum() {
        let mut s = spec();
        s.normalize(Some(&[2.0, 2.0, 3.0, 99.0]), LengthCheck::Tolerant)
            .unwrap();
        assert_eq!(s.flux(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn tolerant_still_rejects_shorter_continuum() {
        let mut s = spec();
        let err = s.normalize(Some(&[1.0]), LengthCheck::Tolerant).unwrap_err();
        assert!(matches!(err, SpecError::InvalidInput(_)));
    }

    #[test]
    fn short_continuum_is_invalid_input_in_both_modes() {
        for check in [LengthCheck::Strict, LengthCheck::Tolerant] {
            let mut s = spec();
            let err = s.normalize(Some(&[1.0]), check).unwrap_err();
            assert!(matches!(err, SpecError::InvalidInput(_)), "{check:?}: {err:?}");
        }
    }
}
