use std::path::Path;

use anyhow::Result;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Normal;

use rusty_spec1d::data::loader::write_file;
use rusty_spec1d::{Metadata, MetadataValue, SpectralData};

/// Gaussian absorption profile: fractional depth `depth` at `mu`.
fn absorption(x: f64, mu: f64, sigma: f64, depth: f64) -> f64 {
    1.0 - depth * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Smooth power-law continuum with a broad emission bump.
fn continuum(w: f64) -> f64 {
    let bump = 0.6 * (-(w - 5200.0).powi(2) / (2.0 * 60.0f64.powi(2))).exp();
    (w / 5000.0).powf(-1.5) + bump
}

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = StdRng::seed_from_u64(42);
    let unit_normal = Normal::new(0.0, 1.0)?;

    // Wavelengths: 4800 → 5600 A on a mildly non-uniform grid
    let wave: Vec<f64> = (0..1600)
        .map(|i| 4800.0 + i as f64 * 0.5 + 1.0e-5 * (i as f64).powi(2))
        .collect();

    // (centre, sigma, depth)
    let lines = [
        (4950.0, 0.8, 0.9),
        (5012.3, 1.2, 0.6),
        (5180.0, 0.6, 0.95),
        (5190.5, 0.6, 0.5),
        (5402.7, 2.0, 0.4),
    ];
    let s2n = 25.0;

    let co: Vec<f64> = wave.iter().map(|&w| continuum(w)).collect();
    let flux: Vec<f64> = wave
        .iter()
        .zip(&co)
        .map(|(&w, &c)| {
            let transmission: f64 = lines
                .iter()
                .map(|&(mu, sigma, depth)| absorption(w, mu, sigma, depth))
                .product();
            c * transmission + unit_normal.sample(&mut rng) * c / s2n
        })
        .collect();
    let sig: Vec<f64> = co.iter().map(|c| c / s2n).collect();

    let mut meta = Metadata::new();
    meta.insert("object".into(), MetadataValue::from("synthetic"));
    meta.insert("s2n".into(), MetadataValue::Float(s2n));
    meta.insert("seed".into(), MetadataValue::Integer(42));

    let spec = SpectralData::from_arrays(wave, flux, Some(sig), Some(co))?.with_metadata(meta);

    let output_path = Path::new("sample_spectrum.json");
    write_file(&spec, output_path)?;

    println!("Wrote {} pixels to {}", spec.len(), output_path.display());
    Ok(())
}
