/// Numeric transforms on [`SpectralData`](crate::data::spectrum::SpectralData).
///
/// ```text
///                 SpectralData
///        ┌────────────┼─────────────┬──────────────┐
///        ▼            ▼             ▼              ▼
///   ┌─────────┐  ┌─────────┐  ┌──────────┐  ┌────────────┐
///   │  rebin   │  │ smooth   │  │  splice   │  │ normalize   │   → new SpectralData
///   └─────────┘  └─────────┘  └──────────┘  └────────────┘     (normalize: in place)
///        │
///   ┌─────────┐  ┌───────────┐
///   │ window   │  │ continuum  │  → pixel indices / knots + continuum
///   └─────────┘  └───────────┘
/// ```

pub mod continuum;
pub mod interp;
pub mod normalize;
pub mod rebin;
pub mod smooth;
pub mod splice;
pub mod window;
