use crate::tile_hierarchy::{TileHierarchyError, tile_level};
#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Debug, Display, Formatter};
use std::hash::{BuildHasherDefault, Hash, Hasher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use zerocopy::{LE, U64};
use zerocopy_derive::{Immutable, IntoBytes, Unaligned};

/// The max valid hierarchy level.
///
/// There are 3 bits for the hierarchy level.
pub const MAX_HIERARCHY_LEVEL: u8 = (1 << 3) - 1;

/// The max valid tile ID.
///
/// The tile field is 22 bits wide in the tile format,
/// but only the low 21 bits are ever populated.
/// Keeping bit 24 clear is what separates every real ID from [`INVALID_GRAPH_ID`].
pub const MAX_GRAPH_TILE_ID: u64 = (1 << 21) - 1;

/// The max valid tile index.
///
/// There are 21 bits for the index within the tile
pub const MAX_TILE_INDEX: u64 = (1 << 21) - 1;

/// All 46 bits set to 1
pub const INVALID_GRAPH_ID: u64 = (1 << 46) - 1;

const LEVEL_MASK: u64 = MAX_HIERARCHY_LEVEL as u64;
const TILE_ID_MASK: u64 = 0x01ff_fff8;
const INDEX_MASK: u64 = 0x3fff_fe00_0000;
const TILE_BASE_MASK: u64 = LEVEL_MASK | TILE_ID_MASK;
const RESERVED_MASK: u64 = !INVALID_GRAPH_ID;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum InvalidGraphIdError {
    #[error("Level {value} is larger than the maximum allowed value ({MAX_HIERARCHY_LEVEL}).")]
    Level { value: u8 },
    #[error("Tile ID {value} is larger than the maximum allowed value ({MAX_GRAPH_TILE_ID}).")]
    GraphTileId { value: u64 },
    #[error("Tile index {value} is larger than the maximum allowed value ({MAX_TILE_INDEX}).")]
    TileIndex { value: u64 },
    #[error("Offsetting tile index {index} by {delta} leaves the range 0..={MAX_TILE_INDEX}.")]
    IndexOffset { index: u64, delta: i64 },
    #[error("Raw value {value:#x} has reserved bits set.")]
    ReservedBits { value: u64 },
    #[error("Graph ID is invalid")]
    InvalidGraphId,
    #[error("Unable to parse graph ID from {0:?}; expected level/tile_id/index")]
    Parse(String),
}

/// An Identifier of a node or an edge within the tiled, hierarchical graph.
/// It packs a hierarchy level, tile ID, and a unique identifier within
/// the tile/level into a 64-bit integer.
///
/// # Hierarchy
///
/// Valhalla organizes tiles into several levels.
/// See [`crate::tile_hierarchy`] for the standard ones.
/// Within each tile, features are identified by a node or edge index.
///
/// # Bit field layout
///
/// ```text
///        MSb                                          LSb
///        ▼                                            ▼
/// bit   64         46        25    24       3        0
/// pos    ┌──────────┬─────────┬─────┬────────┬────────┐
///        │ RESERVED │ index   │ (0) │ tileid │ level  │
///        └──────────┴─────────┴─────┴────────┴────────┘
/// size     18         21        1     21       3
///```
///
/// Bit 24 belongs to the tile field of the tile format.
/// We bound tile IDs to 21 bits, so it is always zero for IDs built here.
///
/// # Text form
///
/// [`Display`] and [`FromStr`] use `level/tile_id/index`.
/// Downstream tooling matches edges to tiles on this string, so don't change it.
#[repr(C)]
#[derive(IntoBytes, Immutable, Unaligned, Copy, Clone, Eq, PartialEq)]
pub struct GraphId(U64<LE>);

impl GraphId {
    /// The "no edge" sentinel.
    ///
    /// Accessors on it return meaningless (but well-defined) values.
    pub const INVALID: GraphId = GraphId(U64::<LE>::new(INVALID_GRAPH_ID));

    /// Tries to construct a Graph ID from the given components.
    ///
    /// # Errors
    ///
    /// This will fail if any argument is larger than its field allows.
    /// - `level` - 3 bits
    /// - `tile_id` - 21 bits
    /// - `index` - 21 bits
    #[inline]
    pub const fn try_from_components(
        level: u8,
        tile_id: u64,
        index: u64,
    ) -> Result<Self, InvalidGraphIdError> {
        if level > MAX_HIERARCHY_LEVEL {
            Err(InvalidGraphIdError::Level { value: level })
        } else if tile_id > MAX_GRAPH_TILE_ID {
            Err(InvalidGraphIdError::GraphTileId { value: tile_id })
        } else if index > MAX_TILE_INDEX {
            Err(InvalidGraphIdError::TileIndex { value: index })
        } else {
            Ok(Self(U64::<LE>::new(
                level as u64 | (tile_id << 3) | index << 25,
            )))
        }
    }

    /// Creates a graph ID from the given raw value.
    ///
    /// The invalid sentinel is passed through as [`GraphId::INVALID`]
    /// rather than rejected, so that "no edge" survives a round trip.
    ///
    /// # Errors
    ///
    /// This function will fail if the value sets bits outside the layout,
    /// including a tile ID which spills into bit 24.
    pub const fn try_from_id(id: u64) -> Result<Self, InvalidGraphIdError> {
        if id == INVALID_GRAPH_ID {
            return Ok(Self::INVALID);
        }
        if id & RESERVED_MASK != 0 {
            return Err(InvalidGraphIdError::ReservedBits { value: id });
        }

        let result = GraphId(U64::<LE>::new(id));
        if result.tile_id() > MAX_GRAPH_TILE_ID {
            Err(InvalidGraphIdError::GraphTileId {
                value: result.tile_id(),
            })
        } else {
            Ok(result)
        }
    }

    /// Reads a graph ID from its little-endian binary form.
    ///
    /// # Errors
    ///
    /// See [`GraphId::try_from_id`].
    pub const fn try_from_le_bytes(bytes: [u8; 8]) -> Result<Self, InvalidGraphIdError> {
        Self::try_from_id(u64::from_le_bytes(bytes))
    }

    /// Creates a new graph ID from the existing one, but with a new tile index.
    /// This is useful for indexing within a tile.
    ///
    /// # Errors
    ///
    /// See [`GraphId::try_from_components`] for a description of errors.
    #[inline]
    pub const fn with_index(&self, tile_index: u64) -> Result<Self, InvalidGraphIdError> {
        Self::try_from_components(self.level(), self.tile_id(), tile_index)
    }

    /// Creates a new graph ID in the same tile, shifting the index by `delta`.
    ///
    /// # Errors
    ///
    /// Fails rather than wrapping when the result would leave `0..=MAX_TILE_INDEX`,
    /// and fails for [`GraphId::INVALID`].
    pub const fn with_index_offset(&self, delta: i64) -> Result<Self, InvalidGraphIdError> {
        if !self.is_valid() {
            return Err(InvalidGraphIdError::InvalidGraphId);
        }
        match self.index().checked_add_signed(delta) {
            Some(index) if index <= MAX_TILE_INDEX => self.with_index(index),
            _ => Err(InvalidGraphIdError::IndexOffset {
                index: self.index(),
                delta,
            }),
        }
    }

    /// Extracts the raw (packed) graph ID value.
    #[inline]
    pub const fn value(&self) -> u64 {
        self.0.get()
    }

    /// Gets the hierarchy level.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn level(&self) -> u8 {
        (self.value() & LEVEL_MASK) as u8
    }

    /// Gets the graph tile ID.
    #[inline]
    pub const fn tile_id(&self) -> u64 {
        (self.value() & TILE_ID_MASK) >> 3
    }

    /// Gets the unique identifier (index) within the tile and level.
    #[inline]
    pub const fn index(&self) -> u64 {
        (self.value() & INDEX_MASK) >> 25
    }

    /// Is this anything other than the "no edge" sentinel?
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.value() != INVALID_GRAPH_ID
    }

    /// Returns a [`GraphId`] which omits the index within the level.
    /// This groups edges by the tile they belong to, and is used for deriving file names.
    #[inline]
    #[must_use]
    pub const fn tile_base_id(&self) -> GraphId {
        GraphId(U64::<LE>::new(self.tile_value()))
    }

    /// The raw bits holding the level and tile ID.
    #[inline]
    pub const fn tile_value(&self) -> u64 {
        self.value() & TILE_BASE_MASK
    }

    /// A 64-bit avalanche mix of the raw value.
    ///
    /// This is the hash used for graph IDs as map keys (see [`GraphIdHasher`]).
    /// It is fixed so that test vectors are reproducible across tools.
    #[inline]
    pub const fn mix_hash(&self) -> u64 {
        mix64(self.value())
    }

    /// Constructs a relative path for the given tile.
    ///
    /// Tile IDs are zero padded to a multiple of three digits
    /// (based on the largest tile ID in the level)
    /// and split into one directory per group of three.
    ///
    /// # Errors
    ///
    /// This will fail if the level has no tiling system,
    /// or the tile is outside the level's grid.
    pub fn file_path(&self, extension: &str) -> Result<PathBuf, TileHierarchyError> {
        let level = tile_level(self.level())?;
        let max_id = u64::from(level.tiling_system.max_tile_id());
        let tile_id = self.tile_id();
        if tile_id > max_id {
            return Err(TileHierarchyError::TileOutsideLevel {
                tile_id,
                level: self.level(),
            });
        }

        let n_digits = tile_id_digits(max_id);
        let padded_id = format!("{tile_id:0>n_digits$}");
        let tile_id_chars: Vec<_> = padded_id.chars().collect();
        let tile_id_component = tile_id_chars
            .rchunks(3)
            .fold(PathBuf::new(), |acc, chunk| {
                PathBuf::from(chunk.iter().collect::<String>()).join(acc)
            })
            .with_extension(extension);

        Ok(PathBuf::from(self.level().to_string()).join(tile_id_component))
    }

    /// Recovers the tile base ID from a relative tile path
    /// (the inverse of [`GraphId::file_path`]).
    ///
    /// # Errors
    ///
    /// Fails if the path doesn't look like `level/ddd/.../ddd.ext`,
    /// or names a tile outside its level.
    pub fn from_file_path<P: AsRef<Path>>(path: P) -> Result<GraphId, TileHierarchyError> {
        let path = path.as_ref();
        let malformed = || TileHierarchyError::MalformedPath(path.to_path_buf());

        let mut components = path.iter();
        let level: u8 = components
            .next()
            .and_then(|c| c.to_str())
            .and_then(|c| c.parse().ok())
            .ok_or_else(malformed)?;

        let mut digits = String::new();
        let mut groups = components.peekable();
        while let Some(group) = groups.next() {
            let group = if groups.peek().is_none() {
                // The extension only sits on the last group
                Path::new(group).file_stem().ok_or_else(malformed)?
            } else {
                group
            };
            let group = group.to_str().ok_or_else(malformed)?;
            if group.len() != 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed());
            }
            digits.push_str(group);
        }

        let max_id = u64::from(tile_level(level)?.tiling_system.max_tile_id());
        if digits.len() != tile_id_digits(max_id) {
            return Err(malformed());
        }
        let tile_id: u64 = digits.parse().map_err(|_| malformed())?;
        if tile_id > max_id {
            return Err(TileHierarchyError::TileOutsideLevel { tile_id, level });
        }
        Ok(GraphId::try_from_components(level, tile_id, 0)?)
    }
}

/// Digits in a tile path, padded to whole groups of three.
fn tile_id_digits(max_id: u64) -> usize {
    let l = max_id.max(1).ilog10() + 1;
    l.next_multiple_of(3) as usize
}

impl Default for GraphId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl TryFrom<u64> for GraphId {
    type Error = InvalidGraphIdError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::try_from_id(value)
    }
}

impl From<GraphId> for u64 {
    fn from(value: GraphId) -> Self {
        value.value()
    }
}

impl PartialOrd for GraphId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GraphId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value().cmp(&other.value())
    }
}

impl Hash for GraphId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.value());
    }
}

impl Display for GraphId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.level(), self.tile_id(), self.index())
    }
}

impl Debug for GraphId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "GraphId({self})")
        } else {
            f.write_str("GraphId(INVALID)")
        }
    }
}

impl FromStr for GraphId {
    type Err = InvalidGraphIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_error = || InvalidGraphIdError::Parse(s.to_string());
        let mut parts = s.trim().split('/');
        let (Some(level), Some(tile_id), Some(index), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(parse_error());
        };

        Self::try_from_components(
            level.parse().map_err(|_| parse_error())?,
            tile_id.parse().map_err(|_| parse_error())?,
            index.parse().map_err(|_| parse_error())?,
        )
    }
}

#[cfg(feature = "serde")]
impl Serialize for GraphId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.0.get())
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for GraphId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = u64::deserialize(deserializer)?;
        GraphId::try_from_id(raw).map_err(serde::de::Error::custom)
    }
}

const fn mix64(mut v: u64) -> u64 {
    v ^= v >> 33;
    v = v.wrapping_mul(0xff51_afd7_ed55_8ccd);
    v ^= v >> 33;
    v = v.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    v ^= v >> 33;
    v
}

/// A [`Hasher`] for graph IDs which applies [`GraphId::mix_hash`].
///
/// Only meaningful for keys which hash as a single `u64` (like [`GraphId`]).
/// Other writes are folded in 8 bytes at a time.
#[derive(Debug, Default, Clone, Copy)]
pub struct GraphIdHasher(u64);

impl Hasher for GraphIdHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for chunk in bytes.chunks(8) {
            let mut buf = [0u8; 8];
            buf[..chunk.len()].copy_from_slice(chunk);
            self.write_u64(u64::from_le_bytes(buf));
        }
    }

    fn write_u64(&mut self, n: u64) {
        self.0 = mix64(self.0 ^ n);
    }
}

/// A hash map keyed by graph ID.
pub type GraphIdMap<V> = HashMap<GraphId, V, BuildHasherDefault<GraphIdHasher>>;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_invalid_level() {
        assert_eq!(
            GraphId::try_from_components(MAX_HIERARCHY_LEVEL + 1, 0, 0),
            Err(InvalidGraphIdError::Level { value: 8 })
        );
    }

    #[test]
    fn test_invalid_tile_id() {
        assert_eq!(
            GraphId::try_from_components(0, MAX_GRAPH_TILE_ID + 1, 0),
            Err(InvalidGraphIdError::GraphTileId {
                value: MAX_GRAPH_TILE_ID + 1
            })
        );
    }

    #[test]
    fn test_invalid_tile_index() {
        assert_eq!(
            GraphId::try_from_components(0, 0, MAX_TILE_INDEX + 1),
            Err(InvalidGraphIdError::TileIndex {
                value: MAX_TILE_INDEX + 1
            })
        );
    }

    #[test]
    fn test_error_messages() {
        insta::assert_snapshot!(
            GraphId::try_from_components(8, 0, 0).unwrap_err().to_string(),
            @"Level 8 is larger than the maximum allowed value (7)."
        );
        insta::assert_snapshot!(
            GraphId::try_from_components(0, 2_097_152, 0)
                .unwrap_err()
                .to_string(),
            @"Tile ID 2097152 is larger than the maximum allowed value (2097151)."
        );
        insta::assert_snapshot!(
            "x/1/2".parse::<GraphId>().unwrap_err().to_string(),
            @r#"Unable to parse graph ID from "x/1/2"; expected level/tile_id/index"#
        );
    }

    #[test]
    fn test_min_tile() {
        let Ok(graph_id) = GraphId::try_from_components(0, 0, 0) else {
            panic!("Expected that we would construct a valid graph ID.")
        };

        assert_eq!(graph_id, GraphId(0.into()));
        assert_eq!(graph_id.level(), 0);
        assert_eq!(graph_id.tile_id(), 0);
        assert_eq!(graph_id.index(), 0);
        assert!(graph_id.is_valid());
    }

    #[test]
    fn test_max_tile_is_not_the_sentinel() {
        let Ok(graph_id) =
            GraphId::try_from_components(MAX_HIERARCHY_LEVEL, MAX_GRAPH_TILE_ID, MAX_TILE_INDEX)
        else {
            panic!("Expected that we would construct a valid graph ID.")
        };

        assert_eq!(graph_id.value(), 0x3fff_feff_ffff);
        assert_ne!(graph_id, GraphId::INVALID);
        assert!(graph_id.is_valid());
        assert_eq!(graph_id.level(), MAX_HIERARCHY_LEVEL);
        assert_eq!(graph_id.tile_id(), MAX_GRAPH_TILE_ID);
        assert_eq!(graph_id.index(), MAX_TILE_INDEX);
    }

    #[test]
    fn test_invalid_sentinel_round_trips() {
        let graph_id = GraphId::try_from_id(INVALID_GRAPH_ID).expect("sentinel is accepted");
        assert!(!graph_id.is_valid());
        assert_eq!(graph_id, GraphId::INVALID);
        assert_eq!(graph_id.value(), 0x3fff_ffff_ffff);
        assert_eq!(GraphId::default(), GraphId::INVALID);
        assert_eq!(format!("{graph_id:?}"), "GraphId(INVALID)");

        // Accessors stay total
        assert_eq!(graph_id.level(), 7);
        assert_eq!(graph_id.index(), MAX_TILE_INDEX);
    }

    #[test]
    fn test_valid_tile_by_id() {
        let graph_id = GraphId::try_from_id(112_642_252_344).expect("valid id");
        assert_eq!(graph_id.level(), 0);
        assert_eq!(graph_id.tile_id(), 3015);
        assert_eq!(graph_id.index(), 3357);
        assert_eq!(graph_id.to_string(), "0/3015/3357");

        let graph_id = GraphId::try_from_id(4_362_457_769).expect("valid id");
        assert_eq!(graph_id.to_string(), "1/47701/130");
        assert_eq!(format!("{graph_id:?}"), "GraphId(1/47701/130)");
    }

    #[test]
    fn test_invalid_raw_values() {
        // Tile ID spilling into bit 24
        assert_eq!(
            GraphId::try_from_id(1 << 24),
            Err(InvalidGraphIdError::GraphTileId { value: 1 << 21 })
        );
        assert_eq!(
            GraphId::try_from_id(1 << 46),
            Err(InvalidGraphIdError::ReservedBits { value: 1 << 46 })
        );
        assert_eq!(
            GraphId::try_from_id(u64::MAX),
            Err(InvalidGraphIdError::ReservedBits { value: u64::MAX })
        );
    }

    #[test]
    fn test_le_bytes() {
        use zerocopy::IntoBytes;

        let graph_id = GraphId::try_from_components(2, 1_036_799, 12345).unwrap();
        assert_eq!(graph_id.value(), 414_237_757_434);
        let bytes: [u8; 8] = graph_id.as_bytes().try_into().unwrap();
        assert_eq!(bytes, 414_237_757_434u64.to_le_bytes());
        assert_eq!(GraphId::try_from_le_bytes(bytes), Ok(graph_id));
    }

    #[test]
    fn test_tile_base_id() {
        let graph_id = GraphId::try_from_components(1, 47701, 130).unwrap();
        let base = graph_id.tile_base_id();
        assert_eq!(base, GraphId::try_from_components(1, 47701, 0).unwrap());
        assert_eq!(base.tile_value(), graph_id.tile_value());
        assert_eq!(base.tile_base_id(), base);
    }

    #[test]
    fn test_with_index_offset() {
        let graph_id = GraphId::try_from_components(2, 4, 10).unwrap();
        assert_eq!(
            graph_id.with_index_offset(5),
            GraphId::try_from_components(2, 4, 15)
        );
        assert_eq!(
            graph_id.with_index_offset(-10),
            GraphId::try_from_components(2, 4, 0)
        );
        assert_eq!(
            graph_id.with_index_offset(-11),
            Err(InvalidGraphIdError::IndexOffset {
                index: 10,
                delta: -11
            })
        );

        let last = GraphId::try_from_components(2, 4, MAX_TILE_INDEX).unwrap();
        assert_eq!(
            last.with_index_offset(1),
            Err(InvalidGraphIdError::IndexOffset {
                index: MAX_TILE_INDEX,
                delta: 1
            })
        );
        assert_eq!(
            GraphId::INVALID.with_index_offset(0),
            Err(InvalidGraphIdError::InvalidGraphId)
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "1/47701/130".parse::<GraphId>(),
            GraphId::try_from_components(1, 47701, 130)
        );
        assert_eq!(
            "8/0/0".parse::<GraphId>(),
            Err(InvalidGraphIdError::Level { value: 8 })
        );
        for bad in ["", "1/2", "1/2/3/4", "1/-2/3", "1//3"] {
            assert_eq!(
                bad.parse::<GraphId>(),
                Err(InvalidGraphIdError::Parse(bad.to_string())),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn test_ordering_by_raw_value() {
        let mut ids = vec![
            GraphId::try_from_components(0, 0, 2).unwrap(),
            GraphId::try_from_components(2, 0, 0).unwrap(),
            GraphId::try_from_components(0, 1, 0).unwrap(),
        ];
        ids.sort();
        let values: Vec<u64> = ids.iter().map(GraphId::value).collect();
        assert!(values.is_sorted());
        assert_eq!(ids[0].to_string(), "2/0/0");
    }

    #[test]
    fn test_mix_hash_vectors() {
        assert_eq!(GraphId::try_from_id(0).unwrap().mix_hash(), 0);
        assert_eq!(
            GraphId::try_from_id(112_642_252_344).unwrap().mix_hash(),
            0x8705_9d8f_b0a6_4e3c
        );
        assert_eq!(GraphId::INVALID.mix_hash(), 0x60f4_d600_9c7d_b39e);
    }

    #[test]
    fn test_graph_id_hasher() {
        use std::hash::BuildHasher;

        let graph_id = GraphId::try_from_id(112_642_252_344).unwrap();
        let build = BuildHasherDefault::<GraphIdHasher>::default();
        assert_eq!(build.hash_one(graph_id), graph_id.mix_hash());

        let mut map: GraphIdMap<&str> = GraphIdMap::default();
        map.insert(graph_id, "edge");
        assert_eq!(map.get(&graph_id), Some(&"edge"));
    }

    #[test]
    fn test_graph_id_file_valid_suffixes() {
        // Level 2
        assert_eq!(
            GraphId::try_from_components(2, 2, 0)
                .unwrap()
                .file_path("gph"),
            Ok("2/000/000/002.gph".into())
        );
        // Level 1
        assert_eq!(
            GraphId::try_from_components(1, 64799, 0)
                .unwrap()
                .file_path("gph"),
            Ok("1/064/799.gph".into())
        );
        // Level 0, the edge index is irrelevant
        assert_eq!(
            GraphId::try_from_components(0, 49, 17)
                .unwrap()
                .file_path("csv"),
            Ok("0/000/049.csv".into())
        );
        // Transit level
        assert_eq!(
            GraphId::try_from_components(3, 1_000_000, 1)
                .unwrap()
                .file_path("gph"),
            Ok("3/001/000/000.gph".into())
        );
    }

    #[test]
    fn test_graph_id_file_path_errors() {
        assert_eq!(
            GraphId::try_from_components(0, 4050, 0)
                .unwrap()
                .file_path("gph"),
            Err(TileHierarchyError::TileOutsideLevel {
                tile_id: 4050,
                level: 0
            })
        );
        assert_eq!(
            GraphId::try_from_components(5, 0, 0)
                .unwrap()
                .file_path("gph"),
            Err(TileHierarchyError::UnknownLevel { level: 5 })
        );
    }

    #[test]
    fn test_from_file_path() {
        assert_eq!(
            GraphId::from_file_path("2/000/818/660.gph"),
            GraphId::try_from_components(2, 818_660, 0).map_err(TileHierarchyError::from)
        );
        assert_eq!(
            GraphId::from_file_path("1/064/799.csv"),
            GraphId::try_from_components(1, 64799, 0).map_err(TileHierarchyError::from)
        );
        for bad in [
            "",
            "x/000/001.gph",
            "0/01/001.gph",
            "0/abc.gph",
            // Too few or too many digit groups for the level
            "0/049.gph",
            "2/000/702.gph",
            "1/000/064/799.csv",
        ] {
            assert_eq!(
                GraphId::from_file_path(bad),
                Err(TileHierarchyError::MalformedPath(bad.into())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_as_raw_value() {
        let graph_id = GraphId::try_from_components(1, 47701, 130).unwrap();
        assert_eq!(serde_json::to_string(&graph_id).unwrap(), "4362457769");
        assert_eq!(
            serde_json::from_str::<GraphId>("4362457769").unwrap(),
            graph_id
        );
        assert!(serde_json::from_str::<GraphId>("18446744073709551615").is_err());
    }

    proptest! {
        #[test]
        fn prop_components_round_trip(
            level in 0..=MAX_HIERARCHY_LEVEL,
            tile_id in 0..=MAX_GRAPH_TILE_ID,
            index in 0..=MAX_TILE_INDEX,
        ) {
            let graph_id = GraphId::try_from_components(level, tile_id, index).unwrap();
            prop_assert!(graph_id.is_valid());
            prop_assert_eq!(graph_id.level(), level);
            prop_assert_eq!(graph_id.tile_id(), tile_id);
            prop_assert_eq!(graph_id.index(), index);
        }

        #[test]
        fn prop_raw_value_round_trip(
            level in 0..=MAX_HIERARCHY_LEVEL,
            tile_id in 0..=MAX_GRAPH_TILE_ID,
            index in 0..=MAX_TILE_INDEX,
        ) {
            let graph_id = GraphId::try_from_components(level, tile_id, index).unwrap();
            let decoded = GraphId::try_from_id(graph_id.value()).unwrap();
            prop_assert_eq!(decoded, graph_id);
            prop_assert_eq!(decoded.level(), level);
            prop_assert_eq!(decoded.tile_id(), tile_id);
            prop_assert_eq!(decoded.index(), index);
        }

        #[test]
        fn prop_text_form_round_trip(
            level in 0..=MAX_HIERARCHY_LEVEL,
            tile_id in 0..=MAX_GRAPH_TILE_ID,
            index in 0..=MAX_TILE_INDEX,
        ) {
            let graph_id = GraphId::try_from_components(level, tile_id, index).unwrap();
            let text = graph_id.to_string();
            prop_assert_eq!(text.clone(), format!("{level}/{tile_id}/{index}"));
            prop_assert_eq!(text.parse::<GraphId>(), Ok(graph_id));
        }
    }
}
