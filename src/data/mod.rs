/// Data layer: the spectrum entity, its metadata, and the file boundary.
///
/// Architecture:
/// ```text
///   .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → SpectralData (and back)
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ SpectralData  │  wavelength, flux, sig, continuum, mask, metadata
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │   ops     │  rebin / smooth / splice / normalize / window / continuum
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod spectrum;
