use rand::Rng;
use std::time::Duration;
use tracing::{debug, info};

use crate::color::Rgb;
use crate::engine::{self, Frame};
use crate::grid::PixelGrid;
use crate::lighting::{LightingConfig, Pattern};
use crate::preset::Preset;
use crate::snapshot::{Snapshot, SnapshotError};

/// Everything the control surface owns. Mutations never re-render on their
/// own; callers ask for [`ControlSurfaceState::render_frame`] afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlSurfaceState {
    pub config: LightingConfig,
    pub grid: PixelGrid,
}

impl ControlSurfaceState {
    pub fn new(config: LightingConfig) -> Self {
        Self {
            config,
            grid: PixelGrid::new(),
        }
    }

    /// Out-of-range values are clamped to 0..=100.
    pub fn set_brightness(&mut self, value: i64) {
        self.config.set_brightness(value);
    }

    pub fn set_color(&mut self, color: Rgb) {
        self.config.set_color(color);
    }

    pub fn set_pattern(&mut self, pattern: Pattern) {
        self.config.set_pattern(pattern);
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.set_enabled(enabled);
    }

    pub fn toggle_power(&mut self) -> bool {
        let enabled = !self.config.enabled();
        self.config.set_enabled(enabled);
        enabled
    }

    pub fn apply_preset(&mut self, preset: &Preset) {
        info!("Applying preset '{}'", preset.name);
        self.config = preset.apply(&self.config);
    }

    /// See [`PixelGrid::click`]; `index` must be below 64.
    pub fn click_pixel<R: Rng + ?Sized>(&mut self, index: usize, rng: &mut R) -> Rgb {
        let color = self.grid.click(index, rng);
        debug!("Pixel {} painted {}", index, color);
        color
    }

    pub fn clear_all_pixels(&mut self) {
        self.grid.clear_all();
    }

    /// Clear every override and restore the documented lighting defaults.
    pub fn reset(&mut self) {
        info!("Resetting control surface");
        self.clear_all_pixels();
        self.config = LightingConfig::default();
    }

    pub fn render_frame(&self, now: Duration) -> Frame {
        engine::render_frame(now, &self.config, &self.grid)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.config, &self.grid)
    }

    /// Replace config and grid from `snapshot`, or leave both untouched if
    /// it fails validation.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let (config, grid) = snapshot.validate()?;
        self.config = config;
        self.grid = grid;
        info!(
            "Restored snapshot: pattern={} brightness={} active_pixels={}",
            self.config.pattern(),
            self.config.brightness(),
            self.grid.active_count()
        );
        Ok(())
    }
}
