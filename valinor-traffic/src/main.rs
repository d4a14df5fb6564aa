use std::{
    io::{self, Write},
    path::PathBuf,
};

use anyhow::bail;
use clap::{ArgGroup, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::{
    commands::SpeedInput,
    config::parse_valhalla_data_paths,
    layout::ProfileLayout,
    traffic_dir::make_traffic_dir,
    utils::parse_graph_id,
    way_edges::{
        DEFAULT_CONSTRAINED_KPH, DEFAULT_FREEFLOW_KPH, WaySpeeds, make_traffic_dir_from_way_edges,
    },
};

mod commands;
mod config;
mod layout;
mod traffic_dir;
mod utils;
mod way_edges;

#[derive(Parser, Debug)]
#[command(name = "valinor-traffic", author, version, about, long_about = None)]
struct Cli {
    /// Subcommand/tool to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pack a graph ID into its raw u64 value
    EncodeId {
        /// Graph ID (u64) or slash-form level/tile/index
        graph_id: String,
    },
    /// Unpack a raw u64 graph ID into its fields (printed as JSON)
    DecodeId { graph_id: u64 },
    /// Print the relative path of the tile containing a graph ID or a coordinate
    #[command(group(ArgGroup::new("target").required(true).args(["graph_id", "lon"])))]
    TilePath {
        /// Graph ID (u64) or slash-form level/tile/index
        graph_id: Option<String>,
        /// Longitude, for a coordinate lookup
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
        /// Latitude, for a coordinate lookup
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,
        /// Hierarchy level for a coordinate lookup
        #[arg(long, default_value_t = 2)]
        level: u8,
        #[arg(long, default_value = "gph")]
        extension: String,
    },
    /// Compress weekly speed profiles (comma-separated kph) into base64 tokens, one per line
    Compress {
        #[command(flatten)]
        input: SpeedInput,
        #[arg(long, value_enum, default_value_t)]
        layout: ProfileLayout,
    },
    /// Decode a base64 token back into per-bucket speeds
    Decompress {
        token: String,
        /// Only print this bucket
        #[arg(long)]
        bucket: Option<usize>,
        #[arg(long, value_enum, default_value_t)]
        layout: ProfileLayout,
    },
    /// Write per-tile traffic CSVs for `valhalla_add_predicted_traffic`
    #[command(group(ArgGroup::new("source").required(true).args(["csv", "way_edges"])))]
    MakeTrafficDir {
        /// Input rows: edge_id,freeflow_kph,constrained_kph[,predicted_speeds]
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Valhalla's way_edges.txt (way_id,direction,graph_id,...)
        #[arg(long)]
        way_edges: Option<PathBuf>,
        /// JSON object of per-way nighttime speeds, used as free flow (with --way-edges)
        #[arg(long, requires = "way_edges")]
        nighttime_speeds: Option<PathBuf>,
        /// JSON object of per-way daytime speeds, used as constrained flow (with --way-edges)
        #[arg(long, requires = "way_edges")]
        daytime_speeds: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_FREEFLOW_KPH)]
        default_freeflow_kph: f32,
        #[arg(long, default_value_t = DEFAULT_CONSTRAINED_KPH)]
        default_constrained_kph: f32,
        /// Output directory
        #[arg(long)]
        dir: PathBuf,
        /// Path to valhalla.json; its mjolnir.tile_dir limits output to tiles that exist
        #[arg(long, env)]
        valhalla_config: Option<PathBuf>,
        /// Tile directory (overrides the one in valhalla.json)
        #[arg(long)]
        tile_dir: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t)]
        layout: ProfileLayout,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        // Standard logger, configured via the RUST_LOG env variable
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(EnvFilter::from_default_env()),
        )
        .init();

    let cli = Cli::parse();
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match cli.command {
        Commands::EncodeId { graph_id } => {
            let gid = parse_graph_id(&graph_id)?;
            writeln!(handle, "{}", commands::encode_id(gid))?;
        }
        Commands::DecodeId { graph_id } => {
            let gid = commands::decode_id(graph_id)?;
            let output = serde_json::json!({
                "graph_id": gid,
                "level": gid.level(),
                "tile_id": gid.tile_id(),
                "index": gid.index(),
                "hierarchical": gid.to_string(),
            });
            writeln!(handle, "{}", serde_json::to_string_pretty(&output)?)?;
        }
        Commands::TilePath {
            graph_id,
            lon,
            lat,
            level,
            extension,
        } => {
            let path = match (graph_id, lon, lat) {
                (Some(graph_id), _, _) => {
                    commands::tile_path(parse_graph_id(&graph_id)?, &extension)?
                }
                (None, Some(lon), Some(lat)) => {
                    commands::tile_path_at(lon, lat, level, &extension)?
                }
                _ => bail!("Either a graph ID or --lon and --lat are required"),
            };
            writeln!(handle, "{}", path.display())?;
        }
        Commands::Compress { input, layout } => {
            for token in commands::compress(&input, layout)? {
                writeln!(handle, "{token}")?;
            }
        }
        Commands::Decompress {
            token,
            bucket,
            layout,
        } => {
            let speeds = commands::decompress(&token, bucket, layout)?;
            let line = speeds
                .iter()
                .map(|s| format!("{s:.2}"))
                .collect::<Vec<_>>()
                .join(",");
            writeln!(handle, "{line}")?;
        }
        Commands::MakeTrafficDir {
            csv,
            way_edges,
            nighttime_speeds,
            daytime_speeds,
            default_freeflow_kph,
            default_constrained_kph,
            dir,
            valhalla_config,
            tile_dir,
            layout,
        } => {
            let tile_dir = match (tile_dir, valhalla_config) {
                (Some(dir), _) => Some(dir),
                (None, Some(config)) => parse_valhalla_data_paths(&config)?.tile_dir,
                (None, None) => None,
            };
            match &tile_dir {
                Some(path) => info!(path = path.to_str(), "Using tile directory"),
                None => info!("No tile directory; writing every tile"),
            }
            match (csv, way_edges) {
                (Some(csv), _) => {
                    make_traffic_dir(&csv, &dir, tile_dir.as_deref(), layout)?;
                }
                (None, Some(way_edges)) => {
                    let speeds = WaySpeeds::load(
                        nighttime_speeds.as_deref(),
                        daytime_speeds.as_deref(),
                        default_freeflow_kph,
                        default_constrained_kph,
                    )?;
                    make_traffic_dir_from_way_edges(&way_edges, &speeds, &dir, tile_dir.as_deref())?;
                }
                (None, None) => bail!("Either --csv or --way-edges is required"),
            }
        }
    }

    Ok(())
}
