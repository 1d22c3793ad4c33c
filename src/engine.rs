//! Pattern engine: maps a pixel index, an instant, the lighting config and
//! the pixel's override state to what the LED shows.
//!
//! Rendering is pure. Nothing here reads the clock except [`wall_clock`],
//! which callers use to obtain `now`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::color::{PixelColor, INACTIVE_BASELINE, INACTIVE_OPACITY};
use crate::grid::{PixelCell, PixelGrid, GRID_LEN};
use crate::lighting::{LightingConfig, Pattern};

/// Hue step between neighbouring pixels in the rainbow pattern, in degrees.
const RAINBOW_HUE_STEP: usize = 45;
const RAINBOW_SATURATION: f32 = 1.0;
const RAINBOW_LIGHTNESS: f32 = 0.5;

/// Phase offset in radians per pixel index for the pulse wave.
const PULSE_PHASE_STEP: f64 = 0.1;
const PULSE_FLOOR: f64 = 0.3;
const PULSE_SWING: f64 = 0.7;

const STROBE_HALF_PERIOD_MS: u128 = 200;
const STROBE_DIM_OPACITY: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedPixel {
    pub color: PixelColor,
    /// Always within 0.0..=1.0
    pub opacity: f32,
}

impl RenderedPixel {
    pub const BASELINE: RenderedPixel = RenderedPixel {
        color: PixelColor::Rgb(INACTIVE_BASELINE),
        opacity: INACTIVE_OPACITY,
    };
}

pub type Frame = [RenderedPixel; GRID_LEN];

/// Time since the Unix epoch, the `now` every render takes.
pub fn wall_clock() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

pub fn render(index: usize, now: Duration, config: &LightingConfig, cell: &PixelCell) -> RenderedPixel {
    if !config.enabled() {
        return RenderedPixel::BASELINE;
    }

    let level = config.level();

    // Overrides bypass the pattern entirely, but brightness still applies.
    if let Some(color) = cell.override_color() {
        return RenderedPixel {
            color: PixelColor::Rgb(color),
            opacity: level.clamp(0.0, 1.0),
        };
    }

    let base = PixelColor::Rgb(config.color());
    let (color, opacity) = match config.pattern() {
        Pattern::Solid => (base, level),
        Pattern::Rainbow => {
            let hue = (index * RAINBOW_HUE_STEP) % 360;
            let color = PixelColor::Hsl {
                hue: hue as f32,
                saturation: RAINBOW_SATURATION,
                lightness: RAINBOW_LIGHTNESS,
            };
            (color, level)
        }
        Pattern::Pulse => {
            let phase = now.as_secs_f64() + index as f64 * PULSE_PHASE_STEP;
            let wave = PULSE_FLOOR + PULSE_SWING * phase.sin();
            (base, (level as f64 * wave) as f32)
        }
        Pattern::Strobe => {
            let lit = (now.as_millis() / STROBE_HALF_PERIOD_MS) % 2 == 0;
            (base, if lit { level } else { STROBE_DIM_OPACITY })
        }
    };

    // The pulse wave dips below zero for part of its period.
    RenderedPixel {
        color,
        opacity: opacity.clamp(0.0, 1.0),
    }
}

pub fn render_frame(now: Duration, config: &LightingConfig, grid: &PixelGrid) -> Frame {
    std::array::from_fn(|index| render(index, now, config, &grid.cell(index)))
}
