use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use log::debug;

use databuffer_core::accumulate::{AccumulatorConfig, CategoryHistogramAccumulator, KeyPolicy};
use databuffer_core::bounds::{self, BoundsOverrides};
use databuffer_core::error::DataBufferError;
use databuffer_core::manifest::BufferManifestBuilder;
use databuffer_core::projection;
use databuffer_core::source::DataSource;
use databuffer_sources::csv::CsvSource;
use databuffer_sources::embedding::EmbeddingSource;
use databuffer_sources::parquet::ParquetSource;
use databuffer_sources::synthetic::{GaussianMixtureConfig, GaussianMixtureSource};

mod output;

/// Compute categorized heatmap buffers and a render manifest from tabular data
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Copy, Default)]
struct GeometryArgs {
    /// Width of the binned image
    #[arg(long)]
    width: Option<u32>,

    /// Height of the binned image (defaults to the domain aspect ratio)
    #[arg(long)]
    height: Option<u32>,

    /// xmin of bbox
    #[arg(long)]
    xmin: Option<f64>,

    /// ymin of bbox
    #[arg(long)]
    ymin: Option<f64>,

    /// xmax of bbox
    #[arg(long)]
    xmax: Option<f64>,

    /// ymax of bbox
    #[arg(long)]
    ymax: Option<f64>,
}

impl GeometryArgs {
    fn overrides(&self) -> BoundsOverrides {
        BoundsOverrides {
            xmin: self.xmin,
            xmax: self.xmax,
            ymin: self.ymin,
            ymax: self.ymax,
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compute per-category heatmaps from a csv file
    Csv {
        /// Input csv file
        infile: PathBuf,

        /// x column name
        x: String,

        /// y column name
        y: String,

        /// category column name
        category: String,

        #[command(flatten)]
        geometry: GeometryArgs,

        /// Geographic projection applied to these coordinates
        #[arg(long)]
        projection: Option<String>,

        /// Comma separated list of categories to keep (others are discarded)
        #[arg(long)]
        filter: Option<String>,

        /// Replace category labels with 1-based ordinals
        #[arg(long)]
        ordinal: bool,

        /// Scale each grid to percentages of its total
        #[arg(long)]
        percent: bool,
    },

    /// Compute per-category heatmaps from a parquet file
    Parquet {
        /// Input parquet file
        infile: PathBuf,

        /// x column name
        x: String,

        /// y column name
        y: String,

        /// category column name
        category: String,

        #[command(flatten)]
        geometry: GeometryArgs,

        /// Replace category labels with 1-based ordinals
        #[arg(long)]
        ordinal: bool,
    },

    /// Compute per-category heatmaps from an embedding and its labels
    Embedding {
        /// Embedding file of `x y` lines
        points: PathBuf,

        /// Label file, one integer per line
        labels: PathBuf,

        #[command(flatten)]
        geometry: GeometryArgs,
    },

    /// Compute per-category heatmaps from sampled 2-D Gaussian classes
    Synthetic {
        /// Output stem for the generated buffers
        outstem: PathBuf,

        /// Samples drawn per class
        #[arg(long, default_value_t = 100_000)]
        samples: usize,

        /// Class mean as `x,y`; repeat for several classes
        #[arg(long = "mean", value_parser = parse_pair)]
        means: Vec<[f64; 2]>,

        /// Shared covariance as `xx,xy,yx,yy`
        #[arg(long, default_value = "3,0,0,3", value_parser = parse_covariance)]
        cov: [[f64; 2]; 2],

        /// RNG seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        #[command(flatten)]
        geometry: GeometryArgs,
    },

    /// Sum several written buffer files into one combined buffer
    Aggregate {
        /// Output json file
        outfile: PathBuf,

        /// Input buffer json files
        #[arg(required = true)]
        infiles: Vec<PathBuf>,
    },
}

struct PipelineOptions {
    overrides: BoundsOverrides,
    key_policy: KeyPolicy,
    normalize_total: Option<f64>,
    projection: Option<String>,
}

/// Resolve bounds, accumulate every chunk, then write buffers and, last,
/// the manifest.
fn run_pipeline(
    source: &dyn DataSource,
    stem: &Path,
    options: PipelineOptions,
) -> Result<(), DataBufferError> {
    let projection = options
        .projection
        .map(|name| {
            projection::lookup(&name).ok_or_else(|| {
                DataBufferError::MalformedInput(format!("unknown projection `{name}`"))
            })
        })
        .transpose()?;

    let (domain, grid) = bounds::resolve(source, &options.overrides)?;
    let mut accumulator = CategoryHistogramAccumulator::new(
        domain,
        grid,
        AccumulatorConfig {
            key_policy: options.key_policy,
        },
    )?;
    for chunk in source.scan()? {
        let chunk = chunk?;
        debug!("Accumulating chunk of {} rows", chunk.len());
        accumulator.accumulate(&chunk)?;
    }
    let (grids, counts) = accumulator.finish();

    let mut builder = BufferManifestBuilder::new(stem.to_string_lossy());
    if let Some(total) = options.normalize_total {
        builder = builder.with_normalize_total(total);
    }
    if let Some(projection) = projection {
        builder = builder.with_projection(projection);
    }
    let (buffers, manifest) = builder.build(&domain, &grid, grids, counts, &source.descriptor())?;

    output::write_buffers(&buffers)?;
    output::write_manifest(stem, &manifest)
}

fn key_policy(ordinal: bool) -> KeyPolicy {
    if ordinal {
        KeyPolicy::Ordinal
    } else {
        KeyPolicy::Verbatim
    }
}

fn parse_pair(raw: &str) -> Result<[f64; 2], String> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 2 {
        return Err(format!("expected `x,y`, got `{raw}`"));
    }
    let mut pair = [0.0; 2];
    for (slot, part) in pair.iter_mut().zip(&parts) {
        *slot = part
            .trim()
            .parse()
            .map_err(|_| format!("bad number `{part}`"))?;
    }
    Ok(pair)
}

fn parse_covariance(raw: &str) -> Result<[[f64; 2]; 2], String> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 4 {
        return Err(format!("expected `xx,xy,yx,yy`, got `{raw}`"));
    }
    let mut values = [0.0; 4];
    for (slot, part) in values.iter_mut().zip(&parts) {
        *slot = part
            .trim()
            .parse()
            .map_err(|_| format!("bad number `{part}`"))?;
    }
    Ok([[values[0], values[1]], [values[2], values[3]]])
}

fn main() -> Result<(), DataBufferError> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Csv {
            infile,
            x,
            y,
            category,
            geometry,
            projection,
            filter,
            ordinal,
            percent,
        } => {
            let filter: Option<Vec<String>> =
                filter.map(|f| f.split(',').map(str::to_string).collect());
            let source = CsvSource::open(&infile, &x, &y, &category, filter.as_deref())?;
            run_pipeline(
                &source,
                &infile.with_extension(""),
                PipelineOptions {
                    overrides: geometry.overrides(),
                    key_policy: key_policy(ordinal),
                    normalize_total: percent.then_some(100.0),
                    projection,
                },
            )
        }
        Commands::Parquet {
            infile,
            x,
            y,
            category,
            geometry,
            ordinal,
        } => {
            let source = ParquetSource::open(&infile, &x, &y, &category)?;
            run_pipeline(
                &source,
                &infile.with_extension(""),
                PipelineOptions {
                    overrides: geometry.overrides(),
                    key_policy: key_policy(ordinal),
                    normalize_total: None,
                    projection: None,
                },
            )
        }
        Commands::Embedding {
            points,
            labels,
            geometry,
        } => {
            let source = EmbeddingSource::open(&points, &labels)?;
            run_pipeline(
                &source,
                &points.with_extension(""),
                PipelineOptions {
                    overrides: geometry.overrides(),
                    key_policy: KeyPolicy::Verbatim,
                    normalize_total: None,
                    projection: None,
                },
            )
        }
        Commands::Synthetic {
            outstem,
            samples,
            means,
            cov,
            seed,
            geometry,
        } => {
            let mut config = GaussianMixtureConfig {
                samples_per_class: samples,
                covariance: cov,
                seed,
                ..Default::default()
            };
            if !means.is_empty() {
                config.means = means;
            }
            let name = outstem
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("synthetic")
                .to_string();
            let source = GaussianMixtureSource::new(&name, &config)?;
            run_pipeline(
                &source,
                &outstem,
                PipelineOptions {
                    overrides: geometry.overrides(),
                    key_policy: KeyPolicy::Verbatim,
                    normalize_total: None,
                    projection: None,
                },
            )
        }
        Commands::Aggregate { outfile, infiles } => output::aggregate(&outfile, &infiles),
    }
}
