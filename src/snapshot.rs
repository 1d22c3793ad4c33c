//! Persisted control-surface state.
//!
//! A snapshot is a TOML document holding the lighting config and all 64
//! pixel cells. Import is all-or-nothing: [`Snapshot::validate`] builds the
//! complete state before anything is handed back, so a rejected document
//! never leaves a half-applied state behind.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::color::Rgb;
use crate::grid::{PixelCell, PixelGrid, GRID_LEN};
use crate::lighting::{LightingConfig, Pattern, PERCENT_MAX};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to access snapshot file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed snapshot: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("unsupported snapshot version {0}")]
    Version(u32),
    #[error("unknown pattern '{0}'")]
    UnknownPattern(String),
    #[error("{field}: malformed color '{value}'")]
    MalformedColor { field: String, value: String },
    #[error("{field} {value} is outside 0..=100")]
    OutOfRange { field: &'static str, value: i64 },
    #[error("expected 64 pixels, found {0}")]
    PixelCount(usize),
    #[error("pixel {0} is active but has no color")]
    MissingColor(usize),
    #[error("pixel {0} has a color but is not active")]
    OrphanedColor(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LightingRecord {
    pub brightness: i64,
    pub color: String,
    pub pattern: String,
    pub speed: i64,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PixelRecord {
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Raw, unvalidated form. Fields are kept loose (strings, wide integers)
/// so bad input surfaces as a descriptive [`SnapshotError`] instead of a
/// generic parse failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub version: u32,
    pub lighting: LightingRecord,
    pub pixels: Vec<PixelRecord>,
}

impl Snapshot {
    pub fn capture(config: &LightingConfig, grid: &PixelGrid) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            lighting: LightingRecord {
                brightness: config.brightness() as i64,
                color: config.color().to_hex(),
                pattern: config.pattern().name().to_string(),
                speed: config.speed() as i64,
                enabled: config.enabled(),
            },
            pixels: grid
                .cells()
                .iter()
                .map(|cell| PixelRecord {
                    active: cell.is_active(),
                    color: cell.override_color().map(|c| c.to_hex()),
                })
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<(LightingConfig, PixelGrid), SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version(self.version));
        }

        let lighting = &self.lighting;
        let brightness = check_percent("brightness", lighting.brightness)?;
        let speed = check_percent("speed", lighting.speed)?;
        let color = parse_color("lighting.color", &lighting.color)?;
        let pattern: Pattern = lighting
            .pattern
            .parse()
            .map_err(|_| SnapshotError::UnknownPattern(lighting.pattern.clone()))?;
        let config = LightingConfig::new(brightness, color, pattern, speed, lighting.enabled);

        if self.pixels.len() != GRID_LEN {
            return Err(SnapshotError::PixelCount(self.pixels.len()));
        }
        let mut cells = [PixelCell::INACTIVE; GRID_LEN];
        for (index, record) in self.pixels.iter().enumerate() {
            cells[index] = match (record.active, &record.color) {
                (true, Some(hex)) => PixelCell::active(parse_color(&format!("pixels[{}].color", index), hex)?),
                (false, None) => PixelCell::INACTIVE,
                (true, None) => return Err(SnapshotError::MissingColor(index)),
                (false, Some(_)) => return Err(SnapshotError::OrphanedColor(index)),
            };
        }

        Ok((config, PixelGrid::from_cells(cells)))
    }

    pub fn to_toml(&self) -> Result<String, SnapshotError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn from_toml(content: &str) -> Result<Self, SnapshotError> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Default location (~/.local/share/scopelight/state.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("scopelight").join("state.toml"))
    }
}

fn check_percent(field: &'static str, value: i64) -> Result<i64, SnapshotError> {
    if (0..=PERCENT_MAX as i64).contains(&value) {
        Ok(value)
    } else {
        Err(SnapshotError::OutOfRange { field, value })
    }
}

fn parse_color(field: &str, value: &str) -> Result<Rgb, SnapshotError> {
    Rgb::from_hex(value).ok_or_else(|| SnapshotError::MalformedColor {
        field: field.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn painted_state() -> (LightingConfig, PixelGrid) {
        let mut rng = StdRng::seed_from_u64(11);
        let mut grid = PixelGrid::new();
        grid.click(0, &mut rng);
        grid.click(42, &mut rng);
        let mut config = LightingConfig::default();
        config.set_pattern(Pattern::Pulse);
        config.set_brightness(33);
        (config, grid)
    }

    #[test]
    fn survives_a_trip_through_toml() {
        let (config, grid) = painted_state();
        let text = Snapshot::capture(&config, &grid).to_toml().unwrap();
        let (restored_config, restored_grid) = Snapshot::from_toml(&text).unwrap().validate().unwrap();
        assert_eq!(restored_config, config);
        assert_eq!(restored_grid, grid);
    }

    #[test]
    fn rejects_unknown_pattern() {
        let (config, grid) = painted_state();
        let mut snapshot = Snapshot::capture(&config, &grid);
        snapshot.lighting.pattern = "sparkle".into();
        assert!(matches!(snapshot.validate(), Err(SnapshotError::UnknownPattern(p)) if p == "sparkle"));
    }

    #[test]
    fn rejects_out_of_range_numbers() {
        let (config, grid) = painted_state();
        let mut snapshot = Snapshot::capture(&config, &grid);
        snapshot.lighting.brightness = 140;
        assert!(matches!(
            snapshot.validate(),
            Err(SnapshotError::OutOfRange { field: "brightness", value: 140 })
        ));

        let mut snapshot = Snapshot::capture(&config, &grid);
        snapshot.lighting.speed = -1;
        assert!(matches!(
            snapshot.validate(),
            Err(SnapshotError::OutOfRange { field: "speed", .. })
        ));
    }

    #[test]
    fn rejects_malformed_colors() {
        let (config, grid) = painted_state();
        let mut snapshot = Snapshot::capture(&config, &grid);
        snapshot.pixels[42].color = Some("#12345".into());
        let err = snapshot.validate().unwrap_err();
        assert!(err.to_string().contains("pixels[42].color"));

        let mut snapshot = Snapshot::capture(&config, &grid);
        snapshot.lighting.color = "+f+f+f".into();
        assert!(matches!(
            snapshot.validate(),
            Err(SnapshotError::MalformedColor { field, .. }) if field == "lighting.color"
        ));

        let mut snapshot = Snapshot::capture(&config, &grid);
        snapshot.pixels[0].color = Some("#+a+b+c".into());
        assert!(matches!(
            snapshot.validate(),
            Err(SnapshotError::MalformedColor { field, .. }) if field == "pixels[0].color"
        ));
    }

    #[test]
    fn saves_and_loads_through_a_file() {
        let (config, grid) = painted_state();
        let dir = std::env::temp_dir().join(format!("scopelight-snapshot-{}", std::process::id()));
        let path = dir.join("nested").join("state.toml");
        let _ = std::fs::remove_dir_all(&dir);

        Snapshot::capture(&config, &grid).save(&path).unwrap();
        assert!(path.is_file());

        let (restored_config, restored_grid) = Snapshot::load(&path).unwrap().validate().unwrap();
        assert_eq!(restored_config, config);
        assert_eq!(restored_grid, grid);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn rejects_inconsistent_cells() {
        let (config, grid) = painted_state();
        let mut snapshot = Snapshot::capture(&config, &grid);
        snapshot.pixels[0].color = None;
        assert!(matches!(snapshot.validate(), Err(SnapshotError::MissingColor(0))));

        let mut snapshot = Snapshot::capture(&config, &grid);
        snapshot.pixels[1].color = Some("#ffffff".into());
        assert!(matches!(snapshot.validate(), Err(SnapshotError::OrphanedColor(1))));

        let mut snapshot = Snapshot::capture(&config, &grid);
        snapshot.pixels.pop();
        assert!(matches!(snapshot.validate(), Err(SnapshotError::PixelCount(63))));
    }

    #[test]
    fn rejects_other_versions() {
        let (config, grid) = painted_state();
        let mut snapshot = Snapshot::capture(&config, &grid);
        snapshot.version = 2;
        assert!(matches!(snapshot.validate(), Err(SnapshotError::Version(2))));
    }

    #[test]
    fn garbage_does_not_parse() {
        assert!(matches!(
            Snapshot::from_toml("version = \"one\""),
            Err(SnapshotError::Parse(_))
        ));
    }
}
