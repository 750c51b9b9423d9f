//! TOML configuration: map defaults, season, reveal timing, overlay anchors
//! and the point catalog.
//!
//! Lookup order: explicit `--config` path, then `<data dir>/starfall.toml`,
//! then the built-in default compiled into the binary.

use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;
use starfall_core::{
    Coordinate, DEFAULT_ZOOM, OverlayAnchor, Placement, Point, PointCatalog, RevealTiming, Season,
    SessionSettings,
};

use crate::error::{Result, StoreError};

/// Built-in configuration with the default constellation.
pub const DEFAULT_CONFIG: &str = include_str!("../assets/default.toml");

pub const CONFIG_FILE: &str = "starfall.toml";
pub const DB_FILE: &str = "starfall.db";

/// Default base directory for all starfall storage.
pub fn default_base_dir() -> PathBuf {
    dirs_home().join(".starfall")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// `STARFALL_DATA_DIR` if set, otherwise `~/.starfall`.
pub fn resolve_base_dir() -> PathBuf {
    env::var("STARFALL_DATA_DIR")
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default_base_dir)
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// `[lat, lon]` the camera returns to before the reveal.
    pub center: [f64; 2],
    pub zoom: u8,
    /// Viewport size in pixels.
    pub width: u32,
    pub height: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: [-27.43, 153.03],
            zoom: DEFAULT_ZOOM,
            width: 1280,
            height: 800,
        }
    }
}

impl MapConfig {
    pub fn center(&self) -> Coordinate {
        Coordinate::new(self.center[0], self.center[1])
    }
}

/// A catalog entry as written in TOML: either `lat` + `lon` or `offset`.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawPoint {
    pub day: u32,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub offset: Option<[f64; 2]>,
    pub edge: i32,
    pub branch: Option<u32>,
}

impl RawPoint {
    fn into_point(self) -> Result<Point> {
        let placement = match (self.lat, self.lon, self.offset) {
            (Some(lat), Some(lon), None) => Placement::LatLon(Coordinate::new(lat, lon)),
            (None, None, Some([dlat, dlon])) => Placement::OffsetFromCenter { dlat, dlon },
            _ => {
                return Err(StoreError::InvalidData(format!(
                    "day {}: give either lat and lon, or offset",
                    self.day
                )));
            }
        };
        Ok(Point {
            day: self.day,
            placement,
            edge_index: self.edge,
            branch_index: self.branch,
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct StarfallConfig {
    pub map: MapConfig,
    pub season: Season,
    pub reveal: RevealTiming,
    pub overlay: OverlayAnchor,
    pub points: Vec<RawPoint>,
}

impl StarfallConfig {
    pub fn parse(text: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(text)?;
        if config.points.is_empty() {
            config.points = Self::builtin()?.points;
        }
        Ok(config)
    }

    pub fn builtin() -> Result<Self> {
        Ok(toml::from_str(DEFAULT_CONFIG)?)
    }

    /// Load from an explicit path, else `<base_dir>/starfall.toml`, else the built-in default.
    pub fn load(explicit: Option<&Path>, base_dir: &Path) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            let text = fs::read_to_string(path)?;
            return Ok((Self::parse(&text)?, Some(path.to_path_buf())));
        }

        let candidate = base_dir.join(CONFIG_FILE);
        if candidate.is_file() {
            let text = fs::read_to_string(&candidate)?;
            return Ok((Self::parse(&text)?, Some(candidate)));
        }

        tracing::debug!("no {CONFIG_FILE} in {}, using built-in", base_dir.display());
        Ok((Self::builtin()?, None))
    }

    /// Validated point catalog.
    pub fn catalog(&self) -> Result<PointCatalog> {
        let points = self
            .points
            .iter()
            .cloned()
            .map(RawPoint::into_point)
            .collect::<Result<Vec<_>>>()?;
        let catalog = PointCatalog::new(points)?;

        if let Some(max_day) = catalog.days().max()
            && max_day > self.season.last_day
        {
            return Err(StoreError::InvalidData(format!(
                "season.last_day {} is below the highest catalog day {max_day}",
                self.season.last_day
            )));
        }
        self.overlay.validate(&catalog)?;
        Ok(catalog)
    }

    pub fn settings(&self) -> SessionSettings {
        SessionSettings {
            center: self.map.center(),
            season: self.season,
            timing: self.reveal,
            overlay: self.overlay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starfall_core::ConfigurationError;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let config = StarfallConfig::builtin().unwrap();
        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.len(), 24);
        assert_eq!(config.map.zoom, 12);
        assert_eq!(config.season.last_day, 24);
        assert!(catalog.points().iter().any(|p| p.branch_index.is_some()));
    }

    #[test]
    fn test_partial_config_keeps_builtin_points() {
        let config = StarfallConfig::parse(
            r#"
[map]
center = [51.5, -0.12]

[reveal]
step_interval_ms = 250
"#,
        )
        .unwrap();
        assert_eq!(config.map.center(), Coordinate::new(51.5, -0.12));
        assert_eq!(config.map.zoom, DEFAULT_ZOOM);
        assert_eq!(config.reveal.step_interval_ms, 250);
        assert_eq!(config.reveal.settle_delay_ms, RevealTiming::default().settle_delay_ms);
        assert_eq!(config.catalog().unwrap().len(), 24);
    }

    #[test]
    fn test_custom_points() {
        let config = StarfallConfig::parse(
            r#"
[season]
year = 2025
month = 12
last_day = 3

[overlay]
top_left_day = 1
bottom_day = 3
left_offset_px = 10.0

[[points]]
day = 1
lat = -27.4
lon = 153.0
edge = 0

[[points]]
day = 2
offset = [0.01, 0.02]
edge = 1

[[points]]
day = 3
offset = [-0.01, 0.02]
edge = 2
"#,
        )
        .unwrap();
        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.get(1).unwrap().placement,
            Placement::LatLon(Coordinate::new(-27.4, 153.0))
        );
    }

    #[test]
    fn test_point_needs_exactly_one_placement() {
        let config = StarfallConfig::parse(
            r#"
[[points]]
day = 1
lat = -27.4
offset = [0.0, 0.0]
edge = 0
"#,
        )
        .unwrap();
        assert!(matches!(config.catalog(), Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn test_edge_gap_is_configuration_error() {
        let config = StarfallConfig::parse(
            r#"
[season]
last_day = 2

[overlay]
top_left_day = 1
bottom_day = 2
left_offset_px = 0.0

[[points]]
day = 1
offset = [0.0, 0.0]
edge = 0

[[points]]
day = 2
offset = [0.0, 0.0]
edge = 5
"#,
        )
        .unwrap();
        assert!(matches!(
            config.catalog(),
            Err(StoreError::Catalog(ConfigurationError::EdgeIndexGap { after: 0, next: 5 }))
        ));
    }

    #[test]
    fn test_season_must_cover_catalog() {
        let mut config = StarfallConfig::builtin().unwrap();
        config.season.last_day = 10;
        assert!(matches!(config.catalog(), Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn test_load_prefers_data_dir_file() {
        let dir = tempfile::tempdir().unwrap();
        let (config, source) = StarfallConfig::load(None, dir.path()).unwrap();
        assert!(source.is_none());
        assert_eq!(config.points.len(), 24);

        std::fs::write(dir.path().join(CONFIG_FILE), "[map]\nzoom = 14\n").unwrap();
        let (config, source) = StarfallConfig::load(None, dir.path()).unwrap();
        assert_eq!(config.map.zoom, 14);
        assert_eq!(source, Some(dir.path().join(CONFIG_FILE)));
    }

    #[test]
    fn test_unknown_point_field_rejected() {
        let err = StarfallConfig::parse("[[points]]\nday = 1\nedge = 0\ncolour = \"red\"\n");
        assert!(matches!(err, Err(StoreError::Config(_))));
    }
}
