//! Swath binning service.
//!
//! Reads a binning configuration and a JSON-lines observation feed, bins all
//! passes onto the configured planetary grid and writes one JSON line per
//! cell.

mod input;
mod output;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use binning::{bin_passes_parallel, BinningConfig, SpatialBinner, TemporalBin, TemporalBinner};

#[derive(Parser, Debug)]
#[command(name = "binner")]
#[command(about = "Spatio-temporal binning of satellite swath observations")]
struct Args {
    /// Configuration file path (YAML, or JSON with a .json extension)
    #[arg(short, long, env = "BINNING_CONFIG", default_value = "binning.yaml")]
    config: PathBuf,

    /// Observation feed (JSON lines), `-` for stdin
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Cell output (JSON lines), `-` for stdout
    #[arg(short, long, default_value = "-")]
    output: String,

    /// Bin passes in parallel and keep all spatial bins in memory
    #[arg(long)]
    parallel: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting swath binner");

    let mut config = BinningConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    config
        .apply_env()
        .context("Invalid BINNING_* environment override")?;
    config.validate().context("Invalid binning configuration")?;

    let grid = config.create_grid()?;
    let manager = config.create_bin_manager()?;
    info!(
        grid = %config.grid,
        num_rows = config.num_rows,
        num_bins = grid.num_bins(),
        features = ?manager.result_feature_names(),
        time_filter = %config.time_filter,
        "Loaded configuration"
    );

    let passes = if args.input == "-" {
        input::read_passes(io::stdin().lock(), config.variables.len())?
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("Failed to open observations {}", args.input))?;
        input::read_passes(BufReader::new(file), config.variables.len())?
    };
    info!(passes = passes.len(), "Read observations");

    let bins = if args.parallel {
        bin_passes_parallel(grid.as_ref(), &manager, &passes, &config.time_filter)?
    } else {
        bin_with_collector(&config, grid.as_ref(), &manager, &passes)?
    };

    let mut writer: Box<dyn Write> = if args.output == "-" {
        Box::new(BufWriter::new(io::stdout().lock()))
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("Failed to create output {}", args.output))?;
        Box::new(BufWriter::new(file))
    };
    let cells = output::write_cells(&mut writer, grid.as_ref(), &manager, &bins)?;

    info!(cells = cells, "Binning complete");
    Ok(())
}

/// Bin passes one after another, handing completed spatial bins to the
/// configured collector before the temporal merge.
fn bin_with_collector(
    config: &BinningConfig,
    grid: &dyn binning::PlanetaryGrid,
    manager: &binning::BinManager,
    passes: &[Vec<binning::Observation>],
) -> Result<Vec<TemporalBin>> {
    let mut collector = config.create_collector();
    for (i, pass) in passes.iter().enumerate() {
        let mut binner = SpatialBinner::new(grid, manager, &config.time_filter);
        binner.process_observations(pass)?;
        let stats = binner.stats();
        let bins = binner.complete()?;
        info!(
            pass = i,
            bins = bins.len(),
            binned = stats.binned,
            invalid_position = stats.invalid_position,
            outside_period = stats.outside_period,
            "Binned pass"
        );
        collector.consume(bins)?;
    }

    let mut temporal = TemporalBinner::new(manager);
    temporal.aggregate_collected(collector.as_mut())?;
    Ok(temporal.complete()?)
}
