//! Command line runner of the green paths exposure pipeline.
//!
//! `segment` prepares the segmented street network, `preprocess` samples the
//! configured data sources and writes the segment value table, and
//! `aggregate` turns routing results into per-route exposure statistics.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use greenpaths_core::pipeline::{aggregate_routes, preprocess_network, segmented_network};
use greenpaths_core::prelude::*;
use greenpaths_core::store::{read_csv, write_csv};
use hashbrown::HashMap;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "greenpaths")]
#[command(about = "Exposure preprocessing and route aggregation", long_about = None)]
struct Cli {
    /// Pipeline configuration (TOML)
    #[arg(short, long, default_value = "greenpaths.toml")]
    config: PathBuf,

    /// Worker threads for data-parallel stages (defaults to all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Log debug output of the pipeline
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment the OSM extract, reusing the cached result when present
    Segment,
    /// Sample data sources along the network and store normalized values
    Preprocess {
        /// Segment value table to write
        #[arg(short, long, default_value = "segment_values.csv")]
        output: PathBuf,
    },
    /// Aggregate routing results into per-route exposure statistics
    Aggregate {
        /// Segment value table written by `preprocess`
        #[arg(short, long, default_value = "segment_values.csv")]
        segments: PathBuf,

        /// Route records with columns from_id,to_id,user_id,config_name,osm_ids
        #[arg(short, long)]
        routes: PathBuf,

        /// Base travel times per segment (segment_id,travel_time)
        #[arg(short, long)]
        travel_times: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Error> {
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| Error::Configuration(format!("Failed to set up {threads} threads: {e}")))?;
    }

    let registry = TransformRegistry::default();
    let config = GreenPathsConfig::from_path(&cli.config, &registry)?;
    info!("Loaded configuration {}", cli.config.display());

    match &cli.command {
        Commands::Segment => {
            let network = segmented_network(&config)?;
            info!("Segmented network has {} segments", network.len());
        }
        Commands::Preprocess { output } => {
            let network = segmented_network(&config)?;
            let store = preprocess_network(&network, &config, &registry)?;
            write_csv(&store.to_rows(), output)?;
        }
        Commands::Aggregate {
            segments,
            routes,
            travel_times,
        } => aggregate(&config, segments, routes, travel_times.as_deref())?,
    }
    Ok(())
}

fn aggregate(
    config: &GreenPathsConfig,
    segments: &Path,
    routes: &Path,
    travel_times: Option<&Path>,
) -> Result<(), Error> {
    let store = SegmentValueStore::from_rows(read_csv(segments)?);
    info!("Loaded {} segment rows from {}", store.len(), segments.display());

    let routes = CsvRouteSource::new(routes)?;
    if routes.route_count()? == 0 {
        info!("No routes to aggregate");
        return Ok(());
    }

    let times = match travel_times {
        Some(path) => read_travel_times(path)?,
        None => HashMap::new(),
    };
    let times = TravelTimes::new(times, config.aggregation.default_speed_mps);

    let (summary, table) = aggregate_routes(config, &store, &routes, times)?;
    let path = table.save(&config.output)?;
    info!(
        "Aggregated {} of {} routes into {}",
        summary.aggregated_routes,
        summary.total_routes,
        path.display()
    );
    Ok(())
}
