//! Resampling, smoothing, window selection, splicing and continuum
//! normalization of one-dimensional spectra.
//!
//! ```
//! use rusty_spec1d::SpectralData;
//!
//! let spec = SpectralData::new(
//!     vec![4000.0, 4001.0, 4002.0, 4003.0],
//!     vec![1.0, 2.0, 3.0, 4.0],
//! )
//! .unwrap();
//! let coarse = spec.rebin(&[4000.5, 4002.5]).unwrap();
//! assert_eq!(coarse.flux(), &[1.5, 3.5]);
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod ops;
pub mod units;

pub use data::model::{Metadata, MetadataValue};
pub use data::spectrum::SpectralData;
pub use error::SpecError;
pub use ops::continuum::{ContinuumEditor, ContinuumKind, ContinuumOptions, Knot, KnotSource};
pub use ops::normalize::LengthCheck;
pub use ops::smooth::EdgeMode;
pub use ops::window::{PixelWindow, WindowBounds};
pub use units::{Velocity, Wavelength, WavelengthUnit};
