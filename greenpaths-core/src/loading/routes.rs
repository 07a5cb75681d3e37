//! Routing engine results stored as CSV

use std::fs::File;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use log::{debug, trace};
use serde::Deserialize;

use crate::Error;
use crate::exposure::RouteSource;
use crate::model::{RouteRecord, SegmentId};

#[derive(Debug, Deserialize)]
struct RouteRow {
    from_id: String,
    to_id: String,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    config_name: String,
    #[serde(default)]
    osm_ids: String,
}

impl From<RouteRow> for RouteRecord {
    fn from(row: RouteRow) -> Self {
        let segment_ids = parse_segment_ids(&row.osm_ids);
        if segment_ids.is_none() {
            trace!(
                "Route {} -> {} has a malformed segment list",
                row.from_id, row.to_id
            );
        }
        RouteRecord {
            from_id: row.from_id,
            to_id: row.to_id,
            user_id: row.user_id,
            config_name: row.config_name,
            segment_ids,
        }
    }
}

/// Parses a serialized segment id list such as `[1, -1000000000001]`.
/// Returns `None` when the text is not a list of integers.
pub fn parse_segment_ids(text: &str) -> Option<Vec<SegmentId>> {
    serde_json::from_str(text.trim()).ok()
}

/// Route records read page by page from a CSV file with columns
/// `from_id,to_id,user_id,config_name,osm_ids`
#[derive(Debug, Clone)]
pub struct CsvRouteSource {
    path: PathBuf,
}

impl CsvRouteSource {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        if !path.exists() {
            return Err(Error::Configuration(format!(
                "Route file not found: {}",
                path.display()
            )));
        }
        Ok(Self { path })
    }

    fn reader(&self) -> Result<csv::Reader<File>, Error> {
        Ok(csv::Reader::from_path(&self.path)?)
    }
}

impl RouteSource for CsvRouteSource {
    fn route_count(&self) -> Result<usize, Error> {
        let mut count = 0;
        for record in self.reader()?.records() {
            record?;
            count += 1;
        }
        Ok(count)
    }

    fn fetch_routes(&self, limit: usize, offset: usize) -> Result<Vec<RouteRecord>, Error> {
        let routes = self
            .reader()?
            .deserialize::<RouteRow>()
            .skip(offset)
            .take(limit)
            .map(|row| row.map(RouteRecord::from).map_err(Error::from))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Fetched {} routes at offset {offset}", routes.len());
        Ok(routes)
    }
}

#[derive(Debug, Deserialize)]
struct TravelTimeRow {
    segment_id: SegmentId,
    travel_time: f64,
}

/// Reads the routing engine's base travel time table (`segment_id,travel_time`)
pub fn read_travel_times(path: &Path) -> Result<HashMap<SegmentId, f64>, Error> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut travel_times = HashMap::new();
    for row in reader.deserialize::<TravelTimeRow>() {
        let row = row?;
        if !row.travel_time.is_finite() || row.travel_time < 0.0 {
            return Err(Error::InvalidData(format!(
                "Segment {} has invalid travel time {}",
                row.segment_id, row.travel_time
            )));
        }
        travel_times.insert(row.segment_id, row.travel_time);
    }
    Ok(travel_times)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{name}_{}.csv", std::process::id()));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_segment_ids() {
        assert_eq!(parse_segment_ids("[1, 2, -3]"), Some(vec![1, 2, -3]));
        assert_eq!(parse_segment_ids("[]"), Some(vec![]));
        assert_eq!(parse_segment_ids(""), None);
        assert_eq!(parse_segment_ids("1,2"), None);
        assert_eq!(parse_segment_ids("[\"a\"]"), None);
    }

    #[test]
    fn test_paged_fetch() {
        let path = temp_file(
            "greenpaths_routes",
            "from_id,to_id,user_id,config_name,osm_ids\n\
             a,b,u1,walk,\"[1,2,3]\"\n\
             a,c,u1,walk,[]\n\
             b,c,u2,walk,not-a-list\n",
        );
        let source = CsvRouteSource::new(&path).unwrap();

        assert_eq!(source.route_count().unwrap(), 3);

        let first = source.fetch_routes(2, 0).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].path(), Some(&[1, 2, 3][..]));
        assert_eq!(first[1].path(), None);
        assert_eq!(first[1].segment_ids, Some(vec![]));

        let rest = source.fetch_routes(2, 2).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].user_id, "u2");
        assert_eq!(rest[0].segment_ids, None);

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_read_travel_times() {
        let path = temp_file("greenpaths_travel_times", "segment_id,travel_time\n1,10.5\n-7,3\n");
        let travel_times = read_travel_times(&path).unwrap();
        fs::remove_file(path).unwrap();

        assert_eq!(travel_times.len(), 2);
        assert_eq!(travel_times.get(&-7), Some(&3.0));
    }
}
