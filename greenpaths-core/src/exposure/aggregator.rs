//! Batch-wise aggregation of route exposure
//!
//! Routes are fetched one batch at a time. For every batch the segments the
//! routes reference are pulled into a [`SegmentCache`], statistics are
//! computed per route and flushed to an [`ExposureSink`]. The cache is
//! cleared before the next batch, so memory is bounded by the segments of a
//! single batch.

use hashbrown::HashSet;
use log::{debug, info, warn};

use super::{ExposureSource, SegmentCache, TravelTimes, aggregate_route};
use crate::Error;
use crate::config::AggregationConfig;
use crate::model::{PathExposureStatistics, RouteRecord, SegmentId};
use crate::store::{SegmentRow, SegmentValueStore};

/// Paged access to the routing engine's results
pub trait RouteSource {
    fn route_count(&self) -> Result<usize, Error>;

    /// Up to `limit` routes starting at `offset`, in a stable order
    fn fetch_routes(&self, limit: usize, offset: usize) -> Result<Vec<RouteRecord>, Error>;
}

/// Point lookups into the segment value table
pub trait SegmentLookup {
    /// Rows of the requested ids. Unknown ids are left out.
    fn select_rows_by_id(&self, ids: &[SegmentId]) -> Result<Vec<SegmentRow>, Error>;
}

/// Destination of aggregated route rows
pub trait ExposureSink {
    /// Called with the output columns first seen in the upcoming batch
    fn add_columns(&mut self, columns: &[String]) -> Result<(), Error>;

    fn write_batch(&mut self, rows: Vec<PathExposureStatistics>) -> Result<(), Error>;
}

impl RouteSource for Vec<RouteRecord> {
    fn route_count(&self) -> Result<usize, Error> {
        Ok(self.len())
    }

    fn fetch_routes(&self, limit: usize, offset: usize) -> Result<Vec<RouteRecord>, Error> {
        Ok(self.iter().skip(offset).take(limit).cloned().collect())
    }
}

impl SegmentLookup for SegmentValueStore {
    fn select_rows_by_id(&self, ids: &[SegmentId]) -> Result<Vec<SegmentRow>, Error> {
        Ok(SegmentValueStore::select_rows_by_id(self, ids))
    }
}

/// Number of routes per batch
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn batch_size(total_routes: usize, single_batch_threshold: usize, batch_fraction: f64) -> usize {
    if total_routes < single_batch_threshold {
        total_routes.max(1)
    } else {
        ((total_routes as f64 * batch_fraction) as usize).max(1)
    }
}

/// Outcome of one aggregation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationSummary {
    pub total_routes: usize,
    pub batches: usize,
    pub aggregated_routes: usize,
    pub routes_without_path: usize,
    /// Union of source columns written, in first-seen order
    pub columns: Vec<String>,
}

pub struct ExposureAggregator {
    sources: Vec<ExposureSource>,
    travel_times: TravelTimes,
    single_batch_threshold: usize,
    batch_fraction: f64,
    keep_geometry: bool,
    known_columns: Vec<String>,
}

impl ExposureAggregator {
    pub fn new(sources: Vec<ExposureSource>, travel_times: TravelTimes) -> Self {
        let defaults = AggregationConfig::default();
        Self {
            sources,
            travel_times,
            single_batch_threshold: defaults.single_batch_threshold,
            batch_fraction: defaults.batch_fraction,
            keep_geometry: defaults.keep_geometry,
            known_columns: Vec::new(),
        }
    }

    /// Aggregator for the given source names with batching, ranges and
    /// geometry handling taken from `config`
    pub fn from_config(
        config: &AggregationConfig,
        source_names: &[&str],
        travel_times: TravelTimes,
    ) -> Self {
        let sources = source_names
            .iter()
            .map(|&name| {
                let source = ExposureSource::new(name);
                match config.ranges_for(name) {
                    Some(ranges) => source.with_ranges(ranges),
                    None => source,
                }
            })
            .collect();
        Self {
            sources,
            travel_times,
            single_batch_threshold: config.single_batch_threshold,
            batch_fraction: config.batch_fraction,
            keep_geometry: config.keep_geometry,
            known_columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_batching(mut self, single_batch_threshold: usize, batch_fraction: f64) -> Self {
        self.single_batch_threshold = single_batch_threshold;
        self.batch_fraction = batch_fraction;
        self
    }

    /// Runs all batches. The first failing batch aborts the run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AggregationRuntime`] when a batch has routes with a
    /// path but none of them could be aggregated, and propagates collaborator
    /// failures.
    pub fn run(
        &mut self,
        routes: &dyn RouteSource,
        lookup: &dyn SegmentLookup,
        sink: &mut dyn ExposureSink,
    ) -> Result<AggregationSummary, Error> {
        let total_routes = routes.route_count()?;
        let batch_size = batch_size(total_routes, self.single_batch_threshold, self.batch_fraction);
        info!("Aggregating {total_routes} routes in batches of {batch_size}");

        let mut summary = AggregationSummary {
            total_routes,
            ..AggregationSummary::default()
        };
        let mut cache = SegmentCache::new();
        let mut offset = 0;

        while offset < total_routes {
            let batch = routes.fetch_routes(batch_size, offset)?;
            if batch.is_empty() {
                break;
            }
            offset += batch.len();
            summary.batches += 1;

            let fetched = cache.warm(&batch, lookup)?;
            debug!(
                "Batch {}: {} routes, {fetched} segments cached",
                summary.batches,
                batch.len()
            );

            let result = self.aggregate_batch(&batch, &cache, sink, &mut summary);
            cache.clear();
            result?;
        }

        summary.columns.clone_from(&self.known_columns);
        info!(
            "Aggregated {} of {} routes in {} batches, {} without a path",
            summary.aggregated_routes, total_routes, summary.batches, summary.routes_without_path
        );
        Ok(summary)
    }

    fn aggregate_batch(
        &mut self,
        batch: &[RouteRecord],
        cache: &SegmentCache,
        sink: &mut dyn ExposureSink,
        summary: &mut AggregationSummary,
    ) -> Result<(), Error> {
        let with_path = batch.iter().filter(|route| route.path().is_some()).count();
        summary.routes_without_path += batch.len() - with_path;

        let rows: Vec<PathExposureStatistics> = batch
            .iter()
            .filter_map(|route| {
                aggregate_route(
                    route,
                    cache,
                    &self.sources,
                    &self.travel_times,
                    self.keep_geometry,
                )
            })
            .collect();

        if with_path == 0 {
            warn!(
                "Batch {} has no routes with a path ({} routes)",
                summary.batches,
                batch.len()
            );
        } else if rows.is_empty() {
            return Err(Error::AggregationRuntime(format!(
                "None of {with_path} routes in batch {} resolved a segment value; \
                 routing results do not match the network data",
                summary.batches
            )));
        }

        let new_columns = self.register_columns(&rows);
        if !new_columns.is_empty() {
            debug!("New output columns: {new_columns:?}");
            sink.add_columns(&new_columns)?;
        }

        summary.aggregated_routes += rows.len();
        sink.write_batch(rows)
    }

    fn register_columns(&mut self, rows: &[PathExposureStatistics]) -> Vec<String> {
        let mut known: HashSet<String> = self.known_columns.iter().cloned().collect();
        let mut new_columns = Vec::new();
        for column in rows.iter().flat_map(PathExposureStatistics::column_names) {
            if known.insert(column.clone()) {
                new_columns.push(column);
            }
        }
        self.known_columns.extend(new_columns.iter().cloned());
        new_columns
    }
}
