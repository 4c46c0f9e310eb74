use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueHint};

use rusty_spec1d::config::Settings;
use rusty_spec1d::data::loader::{load_file, write_file};
use rusty_spec1d::ops::continuum::{ContinuumKind, ContinuumOptions, KnotSource, SplineEditor};
use rusty_spec1d::{EdgeMode, LengthCheck, SpectralData, Wavelength, WindowBounds};

#[derive(Parser)]
#[command(author, version, about = "Rebin, smooth, splice and normalize 1D spectra")]
struct Cli {
    /// JSON file with processing defaults
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print size and good-pixel wavelength range
    Info {
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
    },

    /// Flux-conserving rebin onto a linear grid
    Rebin {
        #[command(flatten)]
        io: InOut,
        #[arg(long)]
        start: f64,
        #[arg(long)]
        end: f64,
        #[arg(long)]
        step: f64,
    },

    /// Box-car smooth
    Smooth {
        #[command(flatten)]
        io: InOut,
        #[arg(long)]
        nbox: usize,
        /// Convolve instead of block-averaging, keeping the pixel count
        #[arg(long)]
        preserve: bool,
    },

    /// Gaussian smooth, FWHM in pixels
    Gauss {
        #[command(flatten)]
        io: InOut,
        #[arg(long)]
        fwhm: f64,
        /// Edge handling (defaults to the config value)
        #[arg(long, value_enum)]
        edge: Option<EdgeMode>,
    },

    /// Append the red part of a second spectrum
    Splice(SpliceArgs),

    /// Divide by the stored continuum
    Normalize {
        #[command(flatten)]
        io: InOut,
        /// Truncate a longer continuum instead of failing
        #[arg(long)]
        tolerant: bool,
    },

    /// Pixel window: `wmin wmax` or `z wrest vmin vmax`
    Window {
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(num_args = 1.., allow_negative_numbers = true)]
        bounds: Vec<f64>,
    },

    /// Add Gaussian noise
    Noise {
        #[command(flatten)]
        io: InOut,
        #[arg(long)]
        seed: Option<u64>,
        /// Constant S/N per pixel; the error array is used when omitted
        #[arg(long)]
        s2n: Option<f64>,
    },

    /// Fit a spline continuum through automatically placed knots
    Continuum {
        #[command(flatten)]
        io: InOut,
        /// Knot spacing in wavelength units (defaults to the config value)
        #[arg(long)]
        dw: Option<f64>,
        /// Use quasar heuristics at this emission redshift
        #[arg(long)]
        qso_z: Option<f64>,
        #[arg(long, num_args = 2, allow_negative_numbers = true)]
        wlim: Option<Vec<f64>>,
    },
}

#[derive(Args)]
struct InOut {
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

#[derive(Args)]
struct SpliceArgs {
    #[arg(value_hint = ValueHint::FilePath)]
    blue: PathBuf,
    #[arg(value_hint = ValueHint::FilePath)]
    red: PathBuf,
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: PathBuf,
    /// Splice after this wavelength (blue spectrum's unit)
    #[arg(long)]
    cut: Option<f64>,
    #[arg(long, default_value_t = 1.0)]
    scale: f64,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    run(cli.command, &settings)
}

fn load(path: &Path, settings: &Settings) -> Result<SpectralData> {
    let spec = load_file(path, settings.default_unit)
        .with_context(|| format!("loading {}", path.display()))?;
    log::info!("Loaded {} pixels from {}", spec.len(), path.display());
    Ok(spec)
}

fn run(command: Command, settings: &Settings) -> Result<()> {
    match command {
        Command::Info { input } => {
            let spec = load(&input, settings)?;
            println!("{spec}");
            println!(
                "pixels={} unit={} error={} continuum={}",
                spec.len(),
                spec.unit(),
                spec.sig().is_some(),
                spec.continuum().is_some()
            );
        }
        Command::Rebin {
            io,
            start,
            end,
            step,
        } => {
            anyhow::ensure!(step > 0.0 && end > start, "need start < end and step > 0");
            let npix = ((end - start) / step).floor() as usize + 1;
            let grid: Vec<f64> = (0..npix).map(|i| start + step * i as f64).collect();
            let spec = load(&io.input, settings)?;
            write_file(&spec.rebin(&grid)?, &io.output)?;
        }
        Command::Smooth { io, nbox, preserve } => {
            let spec = load(&io.input, settings)?;
            write_file(&spec.box_smooth(nbox, preserve)?, &io.output)?;
        }
        Command::Gauss { io, fwhm, edge } => {
            let edge = edge.unwrap_or(settings.gauss_edge);
            let spec = load(&io.input, settings)?;
            write_file(&spec.gauss_smooth(fwhm, edge)?, &io.output)?;
        }
        Command::Splice(args) => {
            let blue = load(&args.blue, settings)?;
            let red = load(&args.red, settings)?;
            let cut = args.cut.map(|c| Wavelength::new(c, blue.unit()));
            write_file(&blue.splice(&red, cut, args.scale)?, &args.output)?;
        }
        Command::Normalize { io, tolerant } => {
            let mut spec = load(&io.input, settings)?;
            let check = if tolerant {
                LengthCheck::Tolerant
            } else {
                settings.normalize_check
            };
            spec.normalize(None, check)?;
            write_file(&spec, &io.output)?;
        }
        Command::Window { input, bounds } => {
            let spec = load(&input, settings)?;
            let window = spec.pix_minmax(&WindowBounds::try_from(bounds.as_slice())?)?;
            println!(
                "pixels {}..={} ({} pixels), wavelength {:.4} - {:.4} {}",
                window.pixel_range.0,
                window.pixel_range.1,
                window.indices.len(),
                window.wavelength_range.0,
                window.wavelength_range.1,
                spec.unit()
            );
        }
        Command::Noise { io, seed, s2n } => {
            let mut spec = load(&io.input, settings)?;
            spec.add_noise(seed, s2n)?;
            write_file(&spec, &io.output)?;
        }
        Command::Continuum {
            io,
            dw,
            qso_z,
            wlim,
        } => {
            let mut spec = load(&io.input, settings)?;
            let dw = dw.unwrap_or(settings.knot_spacing);
            let source = match qso_z {
                Some(z) => KnotSource::Kind {
                    kind: ContinuumKind::qso(z),
                    dw,
                },
                None => KnotSource::Spacing(dw),
            };
            let options = ContinuumOptions {
                wlim: wlim.map(|w| (w[0], w[1])),
                source,
            };
            spec.fit_continuum(&options, &mut SplineEditor)?;
            write_file(&spec, &io.output)?;
        }
    }
    Ok(())
}
