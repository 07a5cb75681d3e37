//! Preprocessing and aggregation stages chained from a validated configuration

use log::info;

use crate::Error;
use crate::config::GreenPathsConfig;
use crate::exposure::{
    AggregationSummary, ExposureAggregator, ExposureTable, RouteSource, SegmentLookup,
    TravelTimes,
};
use crate::loading::osm::{NetworkProjection, load_or_segment};
use crate::model::SegmentedNetwork;
use crate::sampling::{TransformRegistry, sample_data_source};
use crate::store::{SegmentValueStore, SourceBounds};

/// Segments the configured extract, or loads the cached segmentation
///
/// # Errors
///
/// Returns an error if the project crs has no network projection or the
/// extract cannot be read and segmented.
pub fn segmented_network(config: &GreenPathsConfig) -> Result<SegmentedNetwork, Error> {
    let projection = NetworkProjection::from_crs(&config.project_crs)?;
    load_or_segment(
        &config.network.osm_path,
        &config.network.cache_dir,
        config.network.segment_id_base,
        projection,
    )
}

/// Samples every data source along the network, validates coverage and
/// bounds, and derives the normalized routing weights.
///
/// # Errors
///
/// Returns [`Error::DataCoverage`] if a source does not overlap the network
/// well enough, and propagates reading and sampling failures.
pub fn preprocess_network(
    network: &SegmentedNetwork,
    config: &GreenPathsConfig,
    registry: &TransformRegistry,
) -> Result<SegmentValueStore, Error> {
    info!(
        "Preprocessing {} data sources over {} segments",
        config.data_sources.len(),
        network.len()
    );

    let mut store = SegmentValueStore::new();
    store.register_segments(network);

    for source in &config.data_sources {
        let values = sample_data_source(network, source, registry, config.parallel.enabled)?;
        store.save_segment_values(&values, &source.name);
    }

    let names: Vec<&str> = config
        .data_sources
        .iter()
        .map(|source| source.name.as_str())
        .collect();
    store.validate_data_coverage(
        &names,
        network.len(),
        config.validation.data_coverage_safety_percentage,
    )?;

    let bounds: Vec<SourceBounds> = config.data_sources.iter().map(SourceBounds::from).collect();
    store.validate_user_min_max_values(&bounds);
    store.save_normalized_values_to_store(&bounds);

    info!("Preprocessing finished, {} segments stored", store.len());
    Ok(store)
}

/// Aggregates every route of `routes` against the stored segment values
///
/// # Errors
///
/// Returns [`Error::AggregationRuntime`] if a batch yields no usable route
/// and propagates collaborator failures.
pub fn aggregate_routes(
    config: &GreenPathsConfig,
    lookup: &dyn SegmentLookup,
    routes: &dyn RouteSource,
    travel_times: TravelTimes,
) -> Result<(AggregationSummary, ExposureTable), Error> {
    let names: Vec<&str> = config
        .data_sources
        .iter()
        .map(|source| source.name.as_str())
        .collect();
    let mut aggregator = ExposureAggregator::from_config(&config.aggregation, &names, travel_times);
    let mut table = ExposureTable::new();
    let summary = aggregator.run(routes, lookup, &mut table)?;
    Ok((summary, table))
}
