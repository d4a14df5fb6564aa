//! # Valhalla Predicted Traffic Codec
//!
//! The two pieces of Valhalla's traffic data with a bit-exact contract:
//!
//! - [`GraphId`], the packed 64-bit identifier of a node or edge in the tiled graph.
//! - The [`predicted_speeds`] codec, which compresses a week of average speeds
//!   into a handful of DCT coefficients and frames them as a base64 token.
//!
//! Everything here is pure.
//! The only shared state is the cosine tables of the shared codecs,
//! which are built once on first use and never mutated.

// Private modules by default
mod graph_id;
pub mod predicted_speeds;
pub mod tile_hierarchy;

// Pub use for re-export without too many levels of hierarchy.
pub use graph_id::{
    GraphId, GraphIdHasher, GraphIdMap, INVALID_GRAPH_ID, InvalidGraphIdError,
    MAX_GRAPH_TILE_ID, MAX_HIERARCHY_LEVEL, MAX_TILE_INDEX,
};
pub use predicted_speeds::{
    CompressedSpeeds, HourlyProfileCodec, PredictedSpeedCodecError, SpeedProfileCodec,
    ValhallaProfileCodec,
};
