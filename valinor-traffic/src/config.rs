use anyhow::Context;
use serde_json::Value as JsonValue;
use std::fs;
use std::path::{Path, PathBuf};

/// The parts of `valhalla.json` we care about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSources {
    /// `mjolnir.tile_dir`, if set and present on disk.
    pub tile_dir: Option<PathBuf>,
}

pub fn parse_valhalla_data_paths(path: &Path) -> anyhow::Result<DataSources> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read config at {}", path.display()))?;
    let json: JsonValue =
        serde_json::from_slice(&bytes).context("Invalid JSON in valhalla config")?;

    let get_path_if_exists = |key: &str| -> Option<PathBuf> {
        if let JsonValue::String(s) = &json["mjolnir"][key]
            && !s.is_empty()
            && fs::exists(s).unwrap_or_default()
        {
            Some(PathBuf::from(s))
        } else {
            None
        }
    };

    Ok(DataSources {
        tile_dir: get_path_if_exists("tile_dir"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_dir_from_config() {
        let tiles = tempfile::tempdir().unwrap();
        let config_dir = tempfile::tempdir().unwrap();
        let config = config_dir.path().join("valhalla.json");
        fs::write(
            &config,
            serde_json::json!({
                "mjolnir": { "tile_dir": tiles.path(), "traffic_extract": "" }
            })
            .to_string(),
        )
        .unwrap();

        let sources = parse_valhalla_data_paths(&config).unwrap();
        assert_eq!(sources.tile_dir.as_deref(), Some(tiles.path()));
    }

    #[test]
    fn test_missing_tile_dir_is_absent() {
        let config_dir = tempfile::tempdir().unwrap();
        let config = config_dir.path().join("valhalla.json");
        fs::write(
            &config,
            r#"{"mjolnir": {"tile_dir": "/definitely/not/a/real/tile/dir"}}"#,
        )
        .unwrap();
        assert_eq!(
            parse_valhalla_data_paths(&config).unwrap(),
            DataSources::default()
        );

        fs::write(&config, "not json").unwrap();
        assert!(parse_valhalla_data_paths(&config).is_err());
    }
}
