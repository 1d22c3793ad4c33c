use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::color::{Rgb, DEFAULT_COLOR};

pub const DEFAULT_BRIGHTNESS: u8 = 75;
pub const DEFAULT_SPEED: u8 = 50;

/// Upper bound for brightness and speed, both percentages.
pub const PERCENT_MAX: u8 = 100;

/// Formula the pattern engine uses for pixels without an override
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, ValueEnum, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    #[default]
    Solid,
    Pulse,
    Rainbow,
    Strobe,
}

impl Pattern {
    pub fn all() -> &'static [Pattern] {
        &[
            Pattern::Solid,
            Pattern::Pulse,
            Pattern::Rainbow,
            Pattern::Strobe,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Pattern::Solid => "solid",
            Pattern::Pulse => "pulse",
            Pattern::Rainbow => "rainbow",
            Pattern::Strobe => "strobe",
        }
    }

    /// Whether output changes with wall-clock time
    pub fn is_animated(&self) -> bool {
        matches!(self, Pattern::Pulse | Pattern::Strobe)
    }

    pub fn next(&self) -> Self {
        let all = Self::all();
        let current = all.iter().position(|p| p == self).unwrap_or(0);
        all[(current + 1) % all.len()]
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "solid" => Ok(Self::Solid),
            "pulse" => Ok(Self::Pulse),
            "rainbow" => Ok(Self::Rainbow),
            "strobe" => Ok(Self::Strobe),
            _ => Err(format!("Unknown pattern: {}", s)),
        }
    }
}

/// Global lighting parameters.
///
/// Fields are private so `brightness` and `speed` can only be written
/// through the clamping setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightingConfig {
    brightness: u8,
    color: Rgb,
    pattern: Pattern,
    speed: u8,
    enabled: bool,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            brightness: DEFAULT_BRIGHTNESS,
            color: DEFAULT_COLOR,
            pattern: Pattern::Solid,
            speed: DEFAULT_SPEED,
            enabled: true,
        }
    }
}

impl LightingConfig {
    pub fn new(brightness: i64, color: Rgb, pattern: Pattern, speed: i64, enabled: bool) -> Self {
        Self {
            brightness: clamp_percent(brightness),
            color,
            pattern,
            speed: clamp_percent(speed),
            enabled,
        }
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    /// Stored and persisted, but no pattern reads it yet.
    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Brightness as a 0.0..=1.0 opacity factor
    pub fn level(&self) -> f32 {
        self.brightness as f32 / PERCENT_MAX as f32
    }

    pub fn set_brightness(&mut self, value: i64) {
        self.brightness = clamp_percent(value);
    }

    pub fn set_color(&mut self, color: Rgb) {
        self.color = color;
    }

    pub fn set_pattern(&mut self, pattern: Pattern) {
        self.pattern = pattern;
    }

    pub fn set_speed(&mut self, value: i64) {
        self.speed = clamp_percent(value);
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

fn clamp_percent(value: i64) -> u8 {
    value.clamp(0, PERCENT_MAX as i64) as u8
}
