//! Traffic rows from Valhalla's `way_edges.txt`.
//!
//! Each line of `way_edges.txt` is an OSM way ID followed by `direction,graph_id` pairs
//! (the raw u64 IDs of the directed edges built from that way).
//! Every edge of a way gets the way's speeds: the nighttime speed as free flow
//! and the daytime speed as constrained flow, or the defaults when the way has no data.

use std::{
    collections::HashMap,
    fs::File,
    io::BufReader,
    path::Path,
};

use anyhow::{Context, anyhow};
use tracing::{debug, warn};

use crate::{
    traffic_dir::{TrafficDirSummary, TrafficRecord, TrafficTiles},
    utils::parse_graph_id,
};

pub const DEFAULT_FREEFLOW_KPH: f32 = 50.0;
pub const DEFAULT_CONSTRAINED_KPH: f32 = 40.0;

/// Per-way speeds (kph), keyed by OSM way ID.
#[derive(Debug, Clone, PartialEq)]
pub struct WaySpeeds {
    pub freeflow: HashMap<u64, f32>,
    pub constrained: HashMap<u64, f32>,
    pub default_freeflow_kph: f32,
    pub default_constrained_kph: f32,
}

impl Default for WaySpeeds {
    fn default() -> Self {
        Self {
            freeflow: HashMap::new(),
            constrained: HashMap::new(),
            default_freeflow_kph: DEFAULT_FREEFLOW_KPH,
            default_constrained_kph: DEFAULT_CONSTRAINED_KPH,
        }
    }
}

impl WaySpeeds {
    /// Loads speed maps from JSON objects of the form `{"<way id>": <kph>, ...}`.
    ///
    /// # Errors
    ///
    /// Fails if a given file can't be read or isn't such an object.
    pub fn load(
        nighttime: Option<&Path>,
        daytime: Option<&Path>,
        default_freeflow_kph: f32,
        default_constrained_kph: f32,
    ) -> anyhow::Result<Self> {
        let load = |path: Option<&Path>| -> anyhow::Result<HashMap<u64, f32>> {
            let Some(path) = path else {
                return Ok(HashMap::new());
            };
            let file =
                File::open(path).with_context(|| format!("Unable to open {}", path.display()))?;
            let speeds: HashMap<u64, f32> = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Invalid way speeds in {}", path.display()))?;
            debug!(ways = speeds.len(), path = %path.display(), "Loaded way speeds");
            Ok(speeds)
        };

        Ok(Self {
            freeflow: load(nighttime)?,
            constrained: load(daytime)?,
            default_freeflow_kph,
            default_constrained_kph,
        })
    }

    fn freeflow_kph(&self, way_id: u64) -> f32 {
        self.freeflow
            .get(&way_id)
            .copied()
            .unwrap_or(self.default_freeflow_kph)
    }

    fn constrained_kph(&self, way_id: u64) -> f32 {
        self.constrained
            .get(&way_id)
            .copied()
            .unwrap_or(self.default_constrained_kph)
    }
}

fn read_way_edges(path: &Path, speeds: &WaySpeeds) -> anyhow::Result<TrafficTiles> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Unable to open {}", path.display()))?;

    let mut tiles = TrafficTiles::default();
    for (i, record) in rdr.records().enumerate() {
        let line = i + 1;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tiles.skip(line, &e.into());
                continue;
            }
        };

        let Some(way_id) = record.get(0).and_then(|id| id.parse::<u64>().ok()) else {
            tiles.skip(line, &anyhow!("invalid OSM way id {:?}", record.get(0)));
            continue;
        };
        let freeflow_kph = speeds.freeflow_kph(way_id);
        let constrained_kph = speeds.constrained_kph(way_id);

        let pairs: Vec<&str> = record.iter().skip(1).collect();
        if pairs.is_empty() {
            warn!(line, way_id, "Way has no edges");
        }
        // The direction flag is informational; the edge ID already encodes it
        for pair in pairs.chunks(2) {
            let edge = match pair {
                [_direction, edge_id] => parse_graph_id(edge_id).and_then(|edge_id| {
                    TrafficRecord::new(edge_id, freeflow_kph, constrained_kph)
                }),
                _ => Err(anyhow!("dangling direction without an edge id")),
            };
            match edge.with_context(|| format!("way {way_id}")) {
                Ok(record) => tiles.insert(line, record),
                Err(e) => tiles.skip(line, &e),
            }
        }
    }
    Ok(tiles)
}

/// Builds the per-tile traffic directory from `way_edges.txt` and per-way speeds.
///
/// # Errors
///
/// Fails if the input can't be opened or an output file can't be written.
/// Bad ways and edges are logged and skipped.
pub fn make_traffic_dir_from_way_edges(
    way_edges: &Path,
    speeds: &WaySpeeds,
    out_dir: &Path,
    tile_dir: Option<&Path>,
) -> anyhow::Result<TrafficDirSummary> {
    read_way_edges(way_edges, speeds)?.write(out_dir, tile_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_way_edges_with_speeds_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let way_edges = dir.path().join("way_edges.txt");
        // 4362457769 is 1/47701/130, 112642252344 is 0/3015/3357
        fs::write(
            &way_edges,
            "100,1,4362457769,0,1/47701/7\n\
             200,1,112642252344\n\
             300,1,1/47702/1\n",
        )
        .unwrap();
        let night = dir.path().join("night.json");
        fs::write(&night, r#"{"100": 61.6, "300": 70}"#).unwrap();
        let day = dir.path().join("day.json");
        fs::write(&day, r#"{"100": 33.2}"#).unwrap();

        let speeds = WaySpeeds::load(
            Some(&night),
            Some(&day),
            DEFAULT_FREEFLOW_KPH,
            DEFAULT_CONSTRAINED_KPH,
        )
        .unwrap();
        let out = dir.path().join("traffic");
        let summary = make_traffic_dir_from_way_edges(&way_edges, &speeds, &out, None).unwrap();
        assert_eq!(
            summary,
            TrafficDirSummary {
                tiles_written: 3,
                records_written: 4,
                rows_skipped: 0,
                tiles_skipped: 0,
            }
        );

        assert_eq!(
            fs::read_to_string(out.join("1/047/701.csv")).unwrap(),
            "1/47701/7,62,33\n1/47701/130,62,33\n"
        );
        // No speed data for way 200
        assert_eq!(
            fs::read_to_string(out.join("0/003/015.csv")).unwrap(),
            "0/3015/3357,50,40\n"
        );
        assert_eq!(
            fs::read_to_string(out.join("1/047/702.csv")).unwrap(),
            "1/47702/1,70,40\n"
        );
    }

    #[test]
    fn test_way_edges_skips_bad_entries() {
        let dir = tempfile::tempdir().unwrap();
        let way_edges = dir.path().join("way_edges.txt");
        fs::write(
            &way_edges,
            "way,1,4362457769\n\
             100,1,1/47701/1,0,bogus,1\n\
             200,1,1/47701/2\n",
        )
        .unwrap();

        let speeds = WaySpeeds {
            freeflow: HashMap::from([(200, 400.0)]),
            ..WaySpeeds::default()
        };
        let out = dir.path().join("traffic");
        let summary = make_traffic_dir_from_way_edges(&way_edges, &speeds, &out, None).unwrap();
        // Bad way id, bad edge id, dangling direction, out of range speed
        assert_eq!(summary.rows_skipped, 4);
        assert_eq!(summary.records_written, 1);
        assert_eq!(
            fs::read_to_string(out.join("1/047/701.csv")).unwrap(),
            "1/47701/1,50,40\n"
        );
    }

    #[test]
    fn test_way_speeds_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        fs::write(&bad, r#"{"not a way": 50}"#).unwrap();
        assert!(WaySpeeds::load(Some(&bad), None, 50.0, 40.0).is_err());
        assert!(WaySpeeds::load(None, Some(&dir.path().join("missing.json")), 50.0, 40.0).is_err());
        assert_eq!(
            WaySpeeds::load(None, None, 50.0, 40.0).unwrap(),
            WaySpeeds::default()
        );
    }
}
