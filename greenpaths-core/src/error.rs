use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Unknown transform: {0}")]
    UnknownTransform(String),
    #[error(
        "Data source '{source_name}' covers only {coverage:.1}% of segments \
         (required {required:.1}%), check that it overlaps the street network"
    )]
    DataCoverage {
        source_name: String,
        coverage: f64,
        required: f64,
    },
    #[error("Segmentation error: {0}")]
    Segmentation(String),
    #[error("Aggregation error: {0}")]
    AggregationRuntime(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("GeoJSON error: {0}")]
    GeoJsonError(String),
    #[error("OSM error: {0}")]
    OsmError(#[from] osmpbf::Error),
    #[error("WKT error: {0}")]
    WktError(String),
}
