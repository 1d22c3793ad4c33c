use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::Rgb;
use crate::lighting::{LightingConfig, Pattern, PERCENT_MAX};

/// Named partial snapshot of the lighting config
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Preset {
    pub name: String,
    pub brightness: u8,
    pub color: Rgb,
    pub pattern: Pattern,
}

#[derive(Debug, Error, PartialEq)]
pub enum PresetError {
    #[error("preset '{name}': brightness {brightness} is above {max}")]
    BrightnessOutOfRange { name: String, brightness: u8, max: u8 },
    #[error("preset '{0}': name must not be empty")]
    EmptyName(String),
}

impl Preset {
    pub fn new(name: impl Into<String>, brightness: u8, color: Rgb, pattern: Pattern) -> Self {
        Self {
            name: name.into(),
            brightness,
            color,
            pattern,
        }
    }

    pub fn validate(&self) -> Result<(), PresetError> {
        if self.name.trim().is_empty() {
            return Err(PresetError::EmptyName(self.name.clone()));
        }
        if self.brightness > PERCENT_MAX {
            return Err(PresetError::BrightnessOutOfRange {
                name: self.name.clone(),
                brightness: self.brightness,
                max: PERCENT_MAX,
            });
        }
        Ok(())
    }

    /// Copy of `config` with brightness, color and pattern taken from the
    /// preset. Speed and the power switch are carried over untouched.
    pub fn apply(&self, config: &LightingConfig) -> LightingConfig {
        let mut next = *config;
        next.set_brightness(self.brightness as i64);
        next.set_color(self.color);
        next.set_pattern(self.pattern);
        next
    }
}

pub fn builtin_presets() -> Vec<Preset> {
    vec![
        Preset::new("Bright", 100, Rgb::new(0xff, 0xff, 0xff), Pattern::Solid),
        Preset::new("Soft Blue", 60, Rgb::new(0x00, 0xd4, 0xff), Pattern::Pulse),
        Preset::new("Warm", 80, Rgb::new(0xfb, 0xbf, 0x24), Pattern::Solid),
        Preset::new("Rainbow", 70, Rgb::new(0xff, 0x00, 0x00), Pattern::Rainbow),
    ]
}

#[derive(Debug, Clone)]
pub struct PresetCatalog {
    presets: Vec<Preset>,
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self {
            presets: builtin_presets(),
        }
    }
}

impl PresetCatalog {
    /// Built-in presets followed by `extra`, each validated.
    pub fn with_extra(extra: &[Preset]) -> Result<Self, PresetError> {
        let mut catalog = Self::default();
        for preset in extra {
            preset.validate()?;
            catalog.presets.push(preset.clone());
        }
        Ok(catalog)
    }

    pub fn all(&self) -> &[Preset] {
        &self.presets
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Preset> {
        self.presets.get(index)
    }

    /// Look up by position or by case-insensitive name
    pub fn find(&self, key: &str) -> Option<&Preset> {
        let key = key.trim();
        if let Ok(index) = key.parse::<usize>() {
            return self.get(index);
        }
        self.presets
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(key))
    }

    pub fn names(&self) -> Vec<&str> {
        self.presets.iter().map(|p| p.name.as_str()).collect()
    }
}
