//! Splits a flat traffic CSV into the per-tile layout `valhalla_add_predicted_traffic` expects.
//!
//! Each output file sits at `<out>/<level>/<tile digits>.csv` and holds one row per edge:
//! `level/tile/index,freeflow_kph,constrained_kph[,predicted_speeds]`.

use std::{
    collections::{BTreeMap, HashSet},
    fs::{self, File},
    hash::BuildHasherDefault,
    path::Path,
};

use anyhow::{Context, bail};
use serde::Deserialize;
use tracing::{debug, info, warn};
use valhalla_traffic_codec::{GraphId, GraphIdHasher, GraphIdMap, tile_hierarchy::tile_level};

use crate::{layout::ProfileLayout, utils::parse_graph_id};

type TileSet = HashSet<GraphId, BuildHasherDefault<GraphIdHasher>>;

/// A row as it appears in the input CSV.
#[derive(Debug, Deserialize)]
struct TrafficRow {
    edge_id: String,
    freeflow_kph: f32,
    constrained_kph: f32,
    // Absent in three-column rows
    #[serde(default)]
    predicted_speeds: Option<String>,
}

/// A validated row, ready to be written to its tile's CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficRecord {
    pub edge_id: GraphId,
    pub freeflow_kph: u8,
    pub constrained_kph: u8,
    pub predicted_speeds: Option<String>,
}

impl TrafficRecord {
    /// A record without predicted speeds.
    ///
    /// # Errors
    ///
    /// Fails for the invalid sentinel, a tile outside its level's grid,
    /// or a speed which doesn't round into `0..=255`.
    pub fn new(edge_id: GraphId, freeflow_kph: f32, constrained_kph: f32) -> anyhow::Result<Self> {
        if !edge_id.is_valid() {
            bail!("edge id is the invalid sentinel");
        }
        let max_tile_id = tile_level(edge_id.level())?.tiling_system.max_tile_id();
        if edge_id.tile_id() > u64::from(max_tile_id) {
            bail!(
                "tile {} is outside level {}",
                edge_id.tile_id(),
                edge_id.level()
            );
        }

        Ok(Self {
            edge_id,
            freeflow_kph: speed_kph(freeflow_kph)?,
            constrained_kph: speed_kph(constrained_kph)?,
            predicted_speeds: None,
        })
    }

    fn with_predicted_speeds(mut self, token: String, layout: ProfileLayout) -> anyhow::Result<Self> {
        layout
            .validate_token(&token)
            .with_context(|| format!("bad predicted speeds for {}", self.edge_id))?;
        self.predicted_speeds = Some(token);
        Ok(self)
    }

    fn from_row(row: TrafficRow, layout: ProfileLayout) -> anyhow::Result<Self> {
        let edge_id = parse_graph_id(&row.edge_id)?;
        let record = Self::new(edge_id, row.freeflow_kph, row.constrained_kph)?;
        match row.predicted_speeds.filter(|token| !token.is_empty()) {
            Some(token) => record.with_predicted_speeds(token, layout),
            None => Ok(record),
        }
    }

    fn fields(&self) -> Vec<String> {
        let mut fields = vec![
            self.edge_id.to_string(),
            self.freeflow_kph.to_string(),
            self.constrained_kph.to_string(),
        ];
        if let Some(token) = &self.predicted_speeds {
            fields.push(token.clone());
        }
        fields
    }
}

/// Rounds a speed to the whole kph tiles store.
fn speed_kph(value: f32) -> anyhow::Result<u8> {
    let rounded = value.round();
    if !(0.0..=f32::from(u8::MAX)).contains(&rounded) {
        bail!("speed {value} is outside 0..=255 kph");
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let kph = rounded as u8;
    Ok(kph)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrafficDirSummary {
    pub tiles_written: usize,
    pub records_written: usize,
    pub rows_skipped: usize,
    pub tiles_skipped: usize,
}

/// Collects the base IDs of every `.gph` tile under `root`.
fn existing_tiles(root: &Path) -> TileSet {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "gph"))
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .ok()
                .and_then(|path| GraphId::from_file_path(path).ok())
        })
        .collect()
}

/// Validated records grouped by tile, in edge order within each tile.
#[derive(Debug, Default)]
pub struct TrafficTiles {
    tiles: GraphIdMap<BTreeMap<GraphId, TrafficRecord>>,
    rows_skipped: usize,
}

impl TrafficTiles {
    /// Adds a record. A repeated edge keeps the later record.
    pub fn insert(&mut self, line: usize, record: TrafficRecord) {
        let edges = self.tiles.entry(record.edge_id.tile_base_id()).or_default();
        if let Some(previous) = edges.insert(record.edge_id, record) {
            warn!(line, edge_id = %previous.edge_id, "Duplicate edge; keeping the later row");
        }
    }

    pub fn skip(&mut self, line: usize, error: &anyhow::Error) {
        warn!(line, "Skipping row: {error:#}");
        self.rows_skipped += 1;
    }

    /// Writes one CSV per tile under `out_dir`.
    ///
    /// If `tile_dir` is given, tiles with no matching `.gph` file there are skipped.
    ///
    /// # Errors
    ///
    /// Fails if an output directory or file can't be written.
    pub fn write(self, out_dir: &Path, tile_dir: Option<&Path>) -> anyhow::Result<TrafficDirSummary> {
        let known_tiles = tile_dir.map(|dir| {
            let tiles = existing_tiles(dir);
            info!(count = tiles.len(), dir = %dir.display(), "Found graph tiles");
            tiles
        });

        let mut summary = TrafficDirSummary {
            rows_skipped: self.rows_skipped,
            ..TrafficDirSummary::default()
        };

        let mut tiles: Vec<_> = self.tiles.into_iter().collect();
        tiles.sort_unstable_by_key(|(tile_id, _)| *tile_id);
        for (tile_id, records) in tiles {
            if let Some(known) = &known_tiles
                && !known.contains(&tile_id)
            {
                warn!(%tile_id, records = records.len(), "No graph tile; skipping");
                summary.tiles_skipped += 1;
                continue;
            }

            let path = out_dir.join(tile_id.file_path("csv")?);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Unable to create {}", parent.display()))?;
            }
            debug!(?path, records = records.len(), "Writing tile traffic");
            let file = File::create(&path)
                .with_context(|| format!("Unable to create {}", path.display()))?;
            let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);
            for record in records.values() {
                wtr.write_record(record.fields())?;
            }
            wtr.flush()?;

            summary.tiles_written += 1;
            summary.records_written += records.len();
        }

        info!(?summary, "Traffic directory written");
        Ok(summary)
    }
}

fn read_records(csv_path: &Path, layout: ProfileLayout) -> anyhow::Result<TrafficTiles> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(csv_path)
        .with_context(|| format!("Unable to open {}", csv_path.display()))?;

    let mut tiles = TrafficTiles::default();
    for (i, row) in rdr.deserialize::<TrafficRow>().enumerate() {
        let line = i + 1;
        match row
            .map_err(anyhow::Error::from)
            .and_then(|row| TrafficRecord::from_row(row, layout))
        {
            Ok(record) => tiles.insert(line, record),
            Err(e) => tiles.skip(line, &e),
        }
    }
    Ok(tiles)
}

/// Groups the rows of `csv_path` by tile and writes one CSV per tile under `out_dir`.
///
/// Malformed rows are logged and skipped. If `tile_dir` is given, tiles with no
/// matching `.gph` file there are skipped too.
///
/// # Errors
///
/// Fails if the input can't be opened or an output file can't be written.
pub fn make_traffic_dir(
    csv_path: &Path,
    out_dir: &Path,
    tile_dir: Option<&Path>,
    layout: ProfileLayout,
) -> anyhow::Result<TrafficDirSummary> {
    read_records(csv_path, layout)?.write(out_dir, tile_dir)
}
