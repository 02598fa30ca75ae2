//! pixint CLI: integrate area-detector frames from the command line.
//!
//! The binary works on synthetic frames so geometry and option files can
//! be checked, profiled and benchmarked without any detector data.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use ndarray::Array2;
use pixint_algorithms::{
    integrate, CoordinateRegistry, ExecutionStrategy, IntegrationCache, IntegrationOptions,
    IntegrationOutput, RadialAxisType,
};
use pixint_core::{CoordinateKind, Frame, Profile1D, Profile2D};
use pixint_geometry::{
    pixel_value, DetectorProperties, DiffractionEnvironment, DiffractionGeometry, GeometryProvider,
};
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] pixint_core::Error),

    #[error("Geometry error: {0}")]
    Geometry(#[from] pixint_geometry::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Radial axis selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum AxisArg {
    /// Momentum transfer in 1/Angstrom
    Q,
    /// Scattering angle 2theta in degrees
    Angle,
    /// d-spacing in Angstrom
    Resolution,
    /// Distance from the beam centre in pixels
    Pixel,
}

impl From<AxisArg> for RadialAxisType {
    fn from(arg: AxisArg) -> Self {
        match arg {
            AxisArg::Q => Self::Q,
            AxisArg::Angle => Self::Angle,
            AxisArg::Resolution => Self::Resolution,
            AxisArg::Pixel => Self::Pixel,
        }
    }
}

/// Where the detector geometry comes from.
#[derive(Args, Debug)]
struct GeometryArgs {
    /// Geometry JSON file (overrides the flat-detector flags below)
    #[arg(short, long)]
    geometry: Option<PathBuf>,

    /// Detector rows
    #[arg(long, default_value = "512")]
    rows: usize,

    /// Detector columns
    #[arg(long, default_value = "512")]
    cols: usize,

    /// Pixel size in mm
    #[arg(long, default_value = "0.172")]
    pixel_size: f64,

    /// Sample-detector distance in mm
    #[arg(long, default_value = "200.0")]
    distance: f64,

    /// Wavelength in Angstrom
    #[arg(long, default_value = "1.0")]
    wavelength: f64,
}

impl GeometryArgs {
    fn load(&self) -> Result<Arc<dyn GeometryProvider>> {
        let geometry = if let Some(path) = &self.geometry {
            info!("loading geometry from {}", path.display());
            DiffractionGeometry::from_file(path)?
        } else {
            let beam = (self.cols as f64 / 2.0, self.rows as f64 / 2.0);
            DiffractionGeometry::new(
                DetectorProperties::flat(self.rows, self.cols, self.pixel_size, self.distance, beam),
                DiffractionEnvironment {
                    wavelength: self.wavelength,
                },
            )?
        };
        Ok(Arc::new(geometry))
    }
}

/// Integration option flags, optionally seeded from a JSON file.
#[derive(Args, Debug)]
struct OptionArgs {
    /// Integration options JSON file (flags below override it)
    #[arg(long)]
    options: Option<PathBuf>,

    /// Radial axis
    #[arg(short, long, value_enum)]
    axis: Option<AxisArg>,

    /// Number of radial bins
    #[arg(short, long)]
    bins: Option<usize>,

    /// Number of azimuthal bins
    #[arg(long)]
    azimuthal_bins: Option<usize>,

    /// Produce a 2D radial x azimuthal map
    #[arg(long)]
    map: bool,

    /// Spread pixels over the bins they overlap
    #[arg(short, long)]
    split: bool,

    /// Radial range of bin centres, e.g. `--radial-range 1 5`
    #[arg(long, num_args = 2, allow_negative_numbers = true)]
    radial_range: Option<Vec<f64>>,

    /// Azimuthal range of bin centres in degrees
    #[arg(long, num_args = 2, allow_negative_numbers = true)]
    azimuthal_range: Option<Vec<f64>>,
}

impl OptionArgs {
    fn load(&self) -> Result<IntegrationOptions> {
        let mut options = match &self.options {
            Some(path) => read_options(path)?,
            None => IntegrationOptions::default(),
        };
        if let Some(axis) = self.axis {
            options.radial_axis_type = axis.into();
        }
        if let Some(n) = self.bins {
            options.number_of_bins_radial = n;
        }
        if let Some(n) = self.azimuthal_bins {
            options.number_of_bins_azimuthal = n;
        }
        if self.map {
            options.to_1d = false;
        }
        if self.split {
            options.use_pixel_splitting = true;
        }
        if let Some(range) = pair(self.radial_range.as_deref()) {
            options.radial_range = Some(range);
        }
        if let Some(range) = pair(self.azimuthal_range.as_deref()) {
            options.azimuthal_range = Some(range);
        }
        options.validate()?;
        Ok(options)
    }
}

fn pair(values: Option<&[f64]>) -> Option<[f64; 2]> {
    match values? {
        [a, b] => Some([*a, *b]),
        _ => None,
    }
}

fn read_options(path: &Path) -> Result<IntegrationOptions> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(io::BufReader::new(file))?)
}

/// Azimuthal and radial integration of area-detector frames.
#[derive(Parser)]
#[command(name = "pixint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Worker threads for parallel runs (default: all cores)
    #[arg(short, long, global = true)]
    threads: Option<usize>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the bin edges and axes a geometry and options produce
    Axes {
        #[command(flatten)]
        geometry: GeometryArgs,

        #[command(flatten)]
        options: OptionArgs,

        /// Print the axes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Integrate a synthetic powder-ring frame and print the result
    Synthetic {
        #[command(flatten)]
        geometry: GeometryArgs,

        #[command(flatten)]
        options: OptionArgs,

        /// Scattering angles (2theta, degrees) of the rings
        #[arg(long, num_args = 1.., default_values_t = [10.0, 17.5, 25.0])]
        rings: Vec<f64>,

        /// Ring width (sigma in degrees)
        #[arg(long, default_value = "0.15")]
        width: f64,

        /// Write the result to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run the row-partitioned parallel reduction
        #[arg(long)]
        parallel: bool,
    },

    /// Benchmark the four binning engines, serial and parallel
    Benchmark {
        #[command(flatten)]
        geometry: GeometryArgs,

        /// Number of iterations
        #[arg(short, long, default_value = "3")]
        iterations: usize,

        /// Number of radial bins
        #[arg(short, long, default_value = "1000")]
        bins: usize,

        /// Number of azimuthal bins for 2D maps
        #[arg(long, default_value = "360")]
        azimuthal_bins: usize,
    },
}

/// Frame of Gaussian rings in 2theta over a flat background.
fn synthetic_frame(geometry: &dyn GeometryProvider, rings: &[f64], width: f64) -> Frame {
    let kind = CoordinateKind::Radial(RadialAxisType::Angle);
    let (rows, cols) = geometry.shape();
    let data = Array2::from_shape_fn((rows, cols), |(r, c)| {
        let two_theta = pixel_value(geometry, kind, c as f64 + 0.5, r as f64 + 0.5);
        let peaks: f64 = rings
            .iter()
            .map(|&ring| 1000.0 * (-0.5 * ((two_theta - ring) / width).powi(2)).exp())
            .sum();
        10.0 + peaks
    });
    Frame::with_poisson_error(data)
}

fn write_profile(out: &mut dyn Write, profile: &Profile1D) -> io::Result<()> {
    writeln!(
        out,
        "# {} ({})\tintensity\terror\tweight",
        profile.axis.name, profile.axis.units
    )?;
    for (i, value) in profile.axis.values.iter().enumerate() {
        let error = profile.error.as_ref().map_or(0.0, |e| e[i]);
        writeln!(
            out,
            "{:.6}\t{:.6}\t{:.6}\t{:.4}",
            value, profile.intensity[i], error, profile.weight[i]
        )?;
    }
    Ok(())
}

fn write_map(out: &mut dyn Write, map: &Profile2D) -> io::Result<()> {
    writeln!(
        out,
        "# rows: {} ({}), columns: {} ({})",
        map.y_axis.name, map.y_axis.units, map.x_axis.name, map.x_axis.units
    )?;
    let header: Vec<String> = map.x_axis.values.iter().map(|v| format!("{v:.6}")).collect();
    writeln!(out, "#\t{}", header.join("\t"))?;
    for (y, row) in map.y_axis.values.iter().zip(map.intensity.rows()) {
        let cells: Vec<String> = row.iter().map(|v| format!("{v:.6}")).collect();
        writeln!(out, "{:.6}\t{}", y, cells.join("\t"))?;
    }
    Ok(())
}

fn print_edges(name: &str, edges: &pixint_core::BinEdges) {
    println!(
        "{:<10} {:>6} bins  [{:.6}, {:.6}]  width {:.6}",
        name,
        edges.n_bins(),
        edges.lo(),
        edges.hi(),
        edges.bin_width()
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }

    match cli.command {
        Commands::Axes {
            geometry,
            options,
            json,
        } => {
            let cache = IntegrationCache::new(geometry.load()?, options.load()?)?;
            let (rows, cols) = cache.shape();
            let radial = cache.radial_axis()?;
            let azimuthal = cache.azimuthal_axis()?;

            if json {
                let doc = serde_json::json!({
                    "shape": [rows, cols],
                    "options": cache.options(),
                    "radial": radial,
                    "azimuthal": azimuthal,
                });
                println!("{}", serde_json::to_string_pretty(&doc)?);
            } else {
                println!("Detector: {} x {} pixels", rows, cols);
                println!("Strategy: {:?}", cache.strategy());
                print_edges("radial", cache.radial_edges()?);
                print_edges("azimuthal", cache.azimuthal_edges()?);
                println!(
                    "Radial axis: {} ({}), {} values",
                    radial.name,
                    radial.units,
                    radial.len()
                );
            }
        }

        Commands::Synthetic {
            geometry,
            options,
            rings,
            width,
            output,
            parallel,
        } => {
            let geometry = geometry.load()?;
            let frame = synthetic_frame(geometry.as_ref(), &rings, width);
            let cache = IntegrationCache::new(geometry, options.load()?)?;
            let execution = if parallel {
                ExecutionStrategy::Parallel
            } else {
                ExecutionStrategy::Serial
            };

            let start = Instant::now();
            let result = integrate(&cache, &frame, None, None, execution)?;
            info!(
                "integrated {:?} frame in {:.2?}",
                frame.shape(),
                start.elapsed()
            );

            let mut out: Box<dyn Write> = match &output {
                Some(path) => Box::new(BufWriter::new(File::create(path)?)),
                None => Box::new(BufWriter::new(io::stdout().lock())),
            };
            match &result {
                IntegrationOutput::Profile(profile) => write_profile(&mut out, profile)?,
                IntegrationOutput::Map(map) => write_map(&mut out, map)?,
            }
            out.flush()?;
            if let Some(path) = output {
                eprintln!("Wrote {}", path.display());
            }
        }

        Commands::Benchmark {
            geometry,
            iterations,
            bins,
            azimuthal_bins,
        } => {
            let geometry = geometry.load()?;
            let (rows, cols) = geometry.shape();
            let frame = synthetic_frame(geometry.as_ref(), &[10.0, 17.5, 25.0], 0.15);
            let iterations = iterations.max(1);

            println!(
                "Benchmarking {} x {} frame, {} iterations",
                rows, cols, iterations
            );
            println!(
                "{:<10} | {:<9} | {:<15} | {:<15} | {:<15}",
                "Engine", "Execution", "Mean Time (ms)", "Min Time (ms)", "Max Time (ms)"
            );
            println!("{:-<75}", "");

            let engines = [
                ("Whole1D", true, false),
                ("Split1D", true, true),
                ("Whole2D", false, false),
                ("Split2D", false, true),
            ];
            // Keep coordinates out of the timings; every run shares one registry.
            let registry = Arc::new(CoordinateRegistry::default());

            for (name, to_1d, split) in engines {
                let options = IntegrationOptions::default()
                    .with_radial_bins(bins)
                    .with_azimuthal_bins(azimuthal_bins)
                    .with_to_1d(to_1d)
                    .with_pixel_splitting(split);
                let cache =
                    IntegrationCache::with_registry(Arc::clone(&geometry), options, Arc::clone(&registry))?;

                for execution in [ExecutionStrategy::Serial, ExecutionStrategy::Parallel] {
                    // Warmup
                    integrate(&cache, &frame, None, None, execution)?;

                    let mut times = Vec::with_capacity(iterations);
                    for _ in 0..iterations {
                        let start = Instant::now();
                        integrate(&cache, &frame, None, None, execution)?;
                        times.push(start.elapsed().as_secs_f64() * 1000.0);
                    }

                    let min_time = times.iter().fold(f64::INFINITY, |a, &b| a.min(b));
                    let max_time = times.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
                    let mean_time = times.iter().sum::<f64>() / times.len() as f64;

                    println!(
                        "{:<10} | {:<9} | {:<15.2} | {:<15.2} | {:<15.2}",
                        name,
                        format!("{execution:?}"),
                        mean_time,
                        min_time,
                        max_time
                    );
                }
            }

            let stats = registry.stats();
            println!(
                "Registry: {} entries, {} hits, {} misses",
                registry.len(),
                stats.hits,
                stats.misses
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_synthetic_flags() {
        let cli = Cli::try_parse_from([
            "pixint",
            "synthetic",
            "--rows",
            "64",
            "--cols",
            "48",
            "--axis",
            "angle",
            "--split",
            "--azimuthal-range",
            "-90",
            "90",
        ])
        .unwrap();
        let Commands::Synthetic {
            geometry, options, ..
        } = cli.command
        else {
            panic!("expected synthetic");
        };
        assert_eq!((geometry.rows, geometry.cols), (64, 48));
        let options = options.load().unwrap();
        assert_eq!(options.radial_axis_type, RadialAxisType::Angle);
        assert!(options.use_pixel_splitting);
        assert_eq!(options.azimuthal_range, Some([-90.0, 90.0]));
    }

    #[test]
    fn test_synthetic_frame_peaks_on_ring() {
        let geometry = DiffractionGeometry::new(
            DetectorProperties::flat(40, 40, 0.5, 50.0, (20.0, 20.0)),
            DiffractionEnvironment::default(),
        )
        .unwrap();
        let frame = synthetic_frame(&geometry, &[], 0.1);
        assert!(frame.data().iter().all(|&v| (v - 10.0).abs() < 1e-12));
        assert!(frame.error().is_some());
    }

    #[test]
    fn test_profile_text_output() {
        let geometry: Arc<dyn GeometryProvider> = Arc::new(
            DiffractionGeometry::new(
                DetectorProperties::flat(16, 16, 0.5, 50.0, (8.0, 8.0)),
                DiffractionEnvironment::default(),
            )
            .unwrap(),
        );
        let frame = synthetic_frame(geometry.as_ref(), &[5.0], 0.5);
        let cache = IntegrationCache::with_registry(
            geometry,
            IntegrationOptions::default().with_radial_bins(4),
            Arc::new(CoordinateRegistry::new(2)),
        )
        .unwrap();
        let output = cache.integrate(&frame, None, None).unwrap();
        let mut buf = Vec::new();
        write_profile(&mut buf, output.as_profile().unwrap()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 5);
        assert!(text.starts_with("# q (1/Angstrom)"));
    }
}
