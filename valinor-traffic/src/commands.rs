use std::{
    fs::File,
    io::{self, BufRead},
    path::PathBuf,
};

use anyhow::Context;
use clap::Args;
use geo::coord;
use rayon::prelude::*;
use tracing::debug;
use valhalla_traffic_codec::{
    GraphId, SpeedProfileCodec,
    predicted_speeds::{hourly, valhalla},
    tile_hierarchy::tile_level,
};

use crate::{layout::ProfileLayout, utils::parse_speeds};

/// Where weekly speed profiles are read from; one comma-separated profile per line.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SpeedInput {
    /// File with one profile per line
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Read profiles from stdin
    #[arg(long)]
    pub stdin: bool,
    /// A single profile given inline
    #[arg(long)]
    pub speeds: Option<String>,
}

impl SpeedInput {
    fn read_lines(&self) -> anyhow::Result<Vec<String>> {
        let lines = if let Some(speeds) = &self.speeds {
            vec![speeds.clone()]
        } else if let Some(path) = &self.file {
            let file =
                File::open(path).with_context(|| format!("Unable to open {}", path.display()))?;
            io::BufReader::new(file)
                .lines()
                .collect::<io::Result<Vec<_>>>()?
        } else {
            io::stdin().lock().lines().collect::<io::Result<Vec<_>>>()?
        };
        Ok(lines)
    }
}

pub fn encode_id(graph_id: GraphId) -> u64 {
    graph_id.value()
}

pub fn decode_id(raw: u64) -> anyhow::Result<GraphId> {
    GraphId::try_from_id(raw).with_context(|| format!("{raw} is not a graph id"))
}

pub fn tile_path(graph_id: GraphId, extension: &str) -> anyhow::Result<PathBuf> {
    Ok(graph_id.tile_base_id().file_path(extension)?)
}

/// The relative path of the tile at `level` containing a coordinate.
pub fn tile_path_at(lon: f64, lat: f64, level: u8, extension: &str) -> anyhow::Result<PathBuf> {
    let tile = tile_level(level)?.tile_containing(coord! { x: lon, y: lat })?;
    Ok(tile.file_path(extension)?)
}

/// Compresses every profile in `input` to a base64 token, preserving input order.
///
/// Blank lines are ignored.
///
/// # Errors
///
/// Fails on the first line (1-based) that can't be parsed or compressed.
pub fn compress(input: &SpeedInput, layout: ProfileLayout) -> anyhow::Result<Vec<String>> {
    let lines = input.read_lines()?;
    debug!(
        lines = lines.len(),
        buckets = layout.bucket_count(),
        "Compressing speed profiles"
    );
    match layout {
        ProfileLayout::Hourly => compress_lines(hourly(), &lines),
        ProfileLayout::Valhalla => compress_lines(valhalla(), &lines),
    }
}

fn compress_lines<const BUCKETS: usize, const COEFFICIENTS: usize>(
    codec: &SpeedProfileCodec<BUCKETS, COEFFICIENTS>,
    lines: &[String],
) -> anyhow::Result<Vec<String>> {
    lines
        .par_iter()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let line_no = i + 1;
            let speeds = parse_speeds::<BUCKETS>(line).with_context(|| format!("line {line_no}"))?;
            let coefficients = codec
                .compress(&speeds)
                .with_context(|| format!("line {line_no}"))?;
            Ok(codec.encode(&coefficients))
        })
        .collect()
}

/// Decodes a token back into speeds: the whole week, or one bucket.
pub fn decompress(
    token: &str,
    bucket: Option<usize>,
    layout: ProfileLayout,
) -> anyhow::Result<Vec<f32>> {
    match layout {
        ProfileLayout::Hourly => decompress_token(hourly(), token, bucket),
        ProfileLayout::Valhalla => decompress_token(valhalla(), token, bucket),
    }
}

fn decompress_token<const BUCKETS: usize, const COEFFICIENTS: usize>(
    codec: &SpeedProfileCodec<BUCKETS, COEFFICIENTS>,
    token: &str,
    bucket: Option<usize>,
) -> anyhow::Result<Vec<f32>> {
    let coefficients = codec.decode(token.trim())?;
    match bucket {
        Some(bucket) => Ok(vec![codec.decompress_bucket(&coefficients, bucket)?]),
        None => Ok(codec.decompress(&coefficients)),
    }
}
