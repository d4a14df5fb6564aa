use anyhow::{Context, anyhow};
use valhalla_traffic_codec::GraphId;

/// Parses a graph ID given either as a raw u64 or in slash form (`level/tile_id/index`).
pub fn parse_graph_id(input: &str) -> anyhow::Result<GraphId> {
    let input = input.trim();
    // Try pure integer
    if let Ok(id) = input.parse::<u64>() {
        return GraphId::try_from_id(id).with_context(|| format!("invalid graph id {input}"));
    }

    if input.contains('/') {
        return input
            .parse::<GraphId>()
            .with_context(|| format!("invalid graph id {input}"));
    }

    Err(anyhow!(
        "Unrecognized graph id format {input:?}. Use a u64 integer or level/tile/index"
    ))
}

/// Parses one comma-separated line of `BUCKETS` speeds (kph).
pub fn parse_speeds<const BUCKETS: usize>(line: &str) -> anyhow::Result<[f32; BUCKETS]> {
    let speeds = line
        .split(',')
        .map(|s| {
            s.trim()
                .parse::<f32>()
                .with_context(|| format!("invalid speed {s:?}"))
        })
        .collect::<anyhow::Result<Vec<f32>>>()?;

    <[f32; BUCKETS]>::try_from(speeds)
        .map_err(|speeds| anyhow!("Expected {BUCKETS} speed buckets, got {}", speeds.len()))
}
