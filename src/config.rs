use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::color::{Rgb, DEFAULT_COLOR};
use crate::display::DisplayMode;
use crate::lighting::{LightingConfig, Pattern, DEFAULT_BRIGHTNESS, DEFAULT_SPEED};
use crate::preset::{Preset, PresetCatalog};
use crate::snapshot::Snapshot;

pub const MAX_FPS: u32 = 240;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub lighting: LightingSection,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub presets: Vec<Preset>,
}

/// Lighting state at session start. `reset` ignores this and goes back to
/// the built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingSection {
    pub brightness: i64,
    pub color: Rgb,
    pub pattern: Pattern,
    pub speed: i64,
    pub enabled: bool,
}

impl Default for LightingSection {
    fn default() -> Self {
        Self {
            brightness: DEFAULT_BRIGHTNESS as i64,
            color: DEFAULT_COLOR,
            pattern: Pattern::Solid,
            speed: DEFAULT_SPEED as i64,
            enabled: true,
        }
    }
}

impl LightingSection {
    pub fn to_lighting(&self) -> LightingConfig {
        LightingConfig::new(
            self.brightness,
            self.color,
            self.pattern,
            self.speed,
            self.enabled,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub mode: DisplayMode,
    /// Animation frame rate for pulse and strobe
    pub fps: u32,
    pub show_telemetry: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Terminal,
            fps: 60,
            show_telemetry: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub period_ms: u64,
    pub temperature: f32,
    pub voltage: f32,
    pub current: f32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period_ms: 2000,
            temperature: 23.5,
            voltage: 5.0,
            current: 0.85,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SnapshotConfig {
    pub path: Option<PathBuf>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Get the default XDG config path (~/.config/scopelight/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("scopelight").join("config.toml"))
    }

    /// Load config from the default XDG path if it exists.
    /// Returns `Ok(None)` when there is no file there.
    pub fn load_from_default_path() -> Result<Option<Self>> {
        let Some(path) = Self::default_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load(&path)
            .map(Some)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    /// Initialize default config file at XDG path, returns the path
    pub fn init_default_config() -> Result<PathBuf> {
        let path = Self::default_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&path, Self::generate_config_template())?;

        Ok(path)
    }

    pub fn frame_rate(&self) -> u32 {
        self.display.fps.clamp(1, MAX_FPS)
    }

    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.snapshot.path.clone().or_else(Snapshot::default_path)
    }

    pub fn preset_catalog(&self) -> Result<PresetCatalog> {
        Ok(PresetCatalog::with_extra(&self.presets)?)
    }

    /// Generate a commented TOML config template
    pub fn generate_config_template() -> String {
        r##"# Scopelight Configuration
# This file is auto-generated. Edit as needed.

[lighting]
# Initial state when the control surface starts. "reset" always returns to
# brightness 75, color #00d4ff, pattern solid, speed 50, enabled.
# Brightness in percent (0-100)
brightness = 75
# Base color for solid, pulse and strobe
color = "#00d4ff"
# Pattern: "solid", "pulse", "rainbow", "strobe"
pattern = "solid"
# Reserved for animation rate (0-100)
speed = 50
# Master switch
enabled = true

[display]
# Display mode: "terminal" or "headless"
mode = "terminal"
# Frame rate while pulse or strobe is animating (1-240)
fps = 60
# Show the instrument status panel
show_telemetry = true

[telemetry]
# Simulated instrument readings
enabled = true
# Update period in milliseconds
period_ms = 2000
# Baselines: readings wander +/-1.0 C, +/-0.05 V, +/-0.1 A around these
temperature = 23.5
voltage = 5.0
current = 0.85

[snapshot]
# Where "export"/"import" read and write state
# (default: ~/.local/share/scopelight/state.toml)
# path = "/home/me/scope-state.toml"

# Extra presets, appended after the built-in ones
# (Bright, Soft Blue, Warm, Rainbow):
# [[presets]]
# name = "Night"
# brightness = 10
# color = "#ff2000"
# pattern = "solid"
"##
        .to_string()
    }

    /// Merge CLI arguments into config (CLI takes priority)
    pub fn merge_args(&mut self, args: &crate::cli::Args) {
        if let Some(mode) = args.mode {
            self.display.mode = mode;
        }
        if let Some(fps) = args.fps {
            self.display.fps = fps;
        }
        if args.no_telemetry {
            self.telemetry.enabled = false;
        }

        if let Some(brightness) = args.brightness {
            self.lighting.brightness = brightness;
        }
        if let Some(color) = args.color {
            self.lighting.color = color;
        }
        if let Some(pattern) = args.pattern {
            self.lighting.pattern = pattern;
        }
    }
}
