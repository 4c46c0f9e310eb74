use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use super::model::Metadata;
use super::spectrum::SpectralData;
use crate::units::WavelengthUnit;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a spectrum from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.json` – `{ "wavelength": [...], "flux": [...], "error": [...], "meta": {...} }`
/// * `.csv`  – columns `WAVE`, `FLUX`, optional `ERROR` / `CONTINUUM`
///
/// Wavelengths without a unit tag are read as `default_unit`.
pub fn load_file(path: &Path, default_unit: WavelengthUnit) -> Result<SpectralData> {
    let spec = match extension(path).as_str() {
        "json" => load_json(path, default_unit),
        "csv" | "txt" => load_csv(path, default_unit),
        other => bail!("Unsupported file extension: .{other}"),
    }?;
    Ok(spec.with_filename(path.display().to_string()))
}

/// Write a spectrum to a file, format chosen by extension.
pub fn write_file(spec: &SpectralData, path: &Path) -> Result<()> {
    match extension(path).as_str() {
        "json" => write_json(spec, path),
        "csv" | "txt" => write_csv(spec, path),
        other => bail!("Unsupported file extension: .{other}"),
    }?;
    log::info!("Wrote spectrum to {}", path.display());
    Ok(())
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// On-disk JSON record.
///
/// ```json
/// {
///   "unit": "Angstrom",
///   "wavelength": [4000.0, 4001.0, ...],
///   "flux":       [0.98,   1.02,   ...],
///   "error":      [0.05,   0.05,   ...],
///   "meta": { "contpoints": [[4000.5, 1.0]] }
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
struct SpectrumRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit: Option<WavelengthUnit>,
    wavelength: Vec<f64>,
    flux: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    continuum: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mask: Option<Vec<bool>>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    meta: Metadata,
}

fn load_json(path: &Path, default_unit: WavelengthUnit) -> Result<SpectralData> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let rec: SpectrumRecord = serde_json::from_str(&text).context("parsing JSON")?;

    let mut spec = SpectralData::from_arrays(rec.wavelength, rec.flux, rec.error, rec.continuum)
        .context("building spectrum from JSON arrays")?
        .with_unit(rec.unit.unwrap_or(default_unit))
        .with_metadata(rec.meta);
    if let Some(mask) = rec.mask {
        spec = spec.with_mask(mask).context("JSON mask")?;
    }
    Ok(spec)
}

fn write_json(spec: &SpectralData, path: &Path) -> Result<()> {
    let rec = SpectrumRecord {
        unit: Some(spec.unit()),
        wavelength: spec.wavelength().to_vec(),
        flux: spec.flux().to_vec(),
        error: spec.sig().map(<[f64]>::to_vec),
        continuum: spec.continuum().map(<[f64]>::to_vec),
        mask: spec.mask().map(<[bool]>::to_vec),
        meta: spec.metadata().clone(),
    };
    let text = serde_json::to_string_pretty(&rec).context("serialising spectrum")?;
    std::fs::write(path, text).context("writing JSON file")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

const UNIT_TAG: &str = "# UNIT ";
const META_TAG: &str = "# METADATA ";

/// CSV layout: optional comment lines carrying the unit and a JSON-encoded
/// metadata map, then a header row and one row per pixel.
///
/// ```text
/// # UNIT Angstrom
/// # METADATA {"object":"J0100"}
/// WAVE,FLUX,ERROR
/// 4000.0,0.98,0.05
/// ```
fn load_csv(path: &Path, default_unit: WavelengthUnit) -> Result<SpectralData> {
    let text = std::fs::read_to_string(path).context("reading CSV file")?;

    let mut unit = default_unit;
    let mut meta = Metadata::new();
    for line in text.lines().take_while(|l| l.starts_with('#')) {
        if let Some(u) = line.strip_prefix(UNIT_TAG) {
            unit = u.parse().with_context(|| format!("bad unit line '{line}'"))?;
        } else if let Some(m) = line.strip_prefix(META_TAG) {
            meta = serde_json::from_str(m).context("parsing METADATA header")?;
        }
    }

    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_ascii_uppercase())
        .collect();

    let column = |name: &str| headers.iter().position(|h| h == name);
    let wave_idx = column("WAVE").context("CSV missing 'WAVE' column")?;
    let flux_idx = column("FLUX").context("CSV missing 'FLUX' column")?;
    let err_idx = column("ERROR");
    let co_idx = column("CONTINUUM");

    let mut wave = Vec::new();
    let mut flux = Vec::new();
    let mut err = err_idx.map(|_| Vec::new());
    let mut co = co_idx.map(|_| Vec::new());

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let field = |idx: usize, name: &str| -> Result<f64> {
            let raw = record.get(idx).unwrap_or("");
            raw.parse::<f64>()
                .with_context(|| format!("Row {row_no}, {name}: '{raw}' is not a number"))
        };
        wave.push(field(wave_idx, "WAVE")?);
        flux.push(field(flux_idx, "FLUX")?);
        if let (Some(idx), Some(values)) = (err_idx, err.as_mut()) {
            values.push(field(idx, "ERROR")?);
        }
        if let (Some(idx), Some(values)) = (co_idx, co.as_mut()) {
            values.push(field(idx, "CONTINUUM")?);
        }
    }

    Ok(SpectralData::from_arrays(wave, flux, err, co)
        .context("building spectrum from CSV columns")?
        .with_unit(unit)
        .with_metadata(meta))
}

fn write_csv(spec: &SpectralData, path: &Path) -> Result<()> {
    let mut out = String::new();
    writeln!(out, "{UNIT_TAG}{}", spec.unit())?;
    if !spec.metadata().is_empty() {
        let meta = serde_json::to_string(spec.metadata()).context("serialising metadata")?;
        writeln!(out, "{META_TAG}{meta}")?;
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header = vec!["WAVE", "FLUX"];
    if spec.sig().is_some() {
        header.push("ERROR");
    }
    if spec.continuum().is_some() {
        header.push("CONTINUUM");
    }
    writer.write_record(&header).context("writing CSV header")?;

    for i in 0..spec.len() {
        let mut row = vec![spec.wavelength()[i].to_string(), spec.flux()[i].to_string()];
        if let Some(sig) = spec.sig() {
            row.push(sig[i].to_string());
        }
        if let Some(co) = spec.continuum() {
            row.push(co[i].to_string());
        }
        writer.write_record(&row).with_context(|| format!("writing CSV row {i}"))?;
    }
    let body = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flushing CSV writer: {}", e.error()))?;
    out.push_str(&String::from_utf8(body).context("CSV output is not UTF-8")?);

    std::fs::write(path, out).context("writing CSV file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::MetadataValue;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("rusty_spec1d_{}_{name}", std::process::id()))
    }

    fn sample() -> SpectralData {
        let mut meta = Metadata::new();
        meta.insert("object".into(), MetadataValue::from("J0100+0211"));
        SpectralData::from_arrays(
            vec![4000.0, 4001.0, 4002.0],
            vec![1.0, 0.5, 1.25],
            Some(vec![0.1, 0.2, 0.1]),
            Some(vec![1.0, 1.0, 1.0]),
        )
        .unwrap()
        .with_metadata(meta)
    }

    #[test]
    fn json_round_trip() {
        let path = temp_path("rt.json");
        let spec = sample().with_mask(vec![false, true, false]).unwrap();
        write_file(&spec, &path).unwrap();
        let back = load_file(&path, WavelengthUnit::Nanometer).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(back.wavelength(), spec.wavelength());
        assert_eq!(back.sig(), spec.sig());
        assert_eq!(back.mask(), spec.mask());
        assert_eq!(back.unit(), WavelengthUnit::Angstrom);
        assert_eq!(back.metadata(), spec.metadata());
    }

    #[test]
    fn csv_round_trip_keeps_metadata_header() {
        let path = temp_path("rt.csv");
        let spec = sample();
        write_file(&spec, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# UNIT Angstrom"));
        assert!(text.contains("# METADATA {\"object\":\"J0100+0211\"}"));

        let back = load_file(&path, WavelengthUnit::Angstrom).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(back.flux(), spec.flux());
        assert_eq!(back.continuum(), spec.continuum());
        assert_eq!(back.metadata(), spec.metadata());
    }

    #[test]
    fn csv_without_unit_uses_default() {
        let path = temp_path("plain.csv");
        std::fs::write(&path, "wave,flux\n500.0,1.0\n501.0,2.0\n").unwrap();
        let spec = load_file(&path, WavelengthUnit::Nanometer).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(spec.unit(), WavelengthUnit::Nanometer);
        assert_eq!(spec.len(), 2);
        assert!(spec.sig().is_none());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_file(Path::new("spectrum.fits"), WavelengthUnit::Angstrom).unwrap_err();
        assert!(err.to_string().contains(".fits"));
    }
}
