use palette::{Hsl, IntoColor, Srgb};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 24-bit RGB color. Serialized as a `#rrggbb` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse from hex string like "#FF0000" or "FF0000"
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self { r, g, b })
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn as_tuple(&self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }
}

const fn hex(value: u32) -> Rgb {
    Rgb::new((value >> 16) as u8, (value >> 8) as u8, value as u8)
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rgb::from_hex(s).ok_or_else(|| format!("Invalid color '{}': expected #rrggbb", s))
    }
}

impl Serialize for Rgb {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Rgb::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Default base color of the illuminator.
pub const DEFAULT_COLOR: Rgb = hex(0x00d4ff);

/// Gray shown for every pixel while the master switch is off.
pub const INACTIVE_BASELINE: Rgb = hex(0x374151);

/// Opacity of the inactive baseline.
pub const INACTIVE_OPACITY: f32 = 0.3;

/// Colors a clicked pixel can be painted with. Doubles as the swatch row
/// the terminal UI cycles the base color through.
pub const OVERRIDE_PALETTE: [Rgb; 16] = [
    hex(0xffffff),
    hex(0xff0000),
    hex(0x00ff00),
    hex(0x0000ff),
    hex(0xffff00),
    hex(0xff00ff),
    hex(0x00ffff),
    hex(0xffa500),
    hex(0x800080),
    hex(0x008000),
    hex(0x000080),
    hex(0x800000),
    hex(0x808000),
    hex(0x008080),
    hex(0xc0c0c0),
    hex(0x808080),
];

/// Color produced by the pattern engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PixelColor {
    Rgb(Rgb),
    /// Hue in degrees, saturation and lightness in 0.0..=1.0
    Hsl {
        hue: f32,
        saturation: f32,
        lightness: f32,
    },
}

impl PixelColor {
    pub fn to_rgb(&self) -> Rgb {
        match *self {
            PixelColor::Rgb(rgb) => rgb,
            PixelColor::Hsl {
                hue,
                saturation,
                lightness,
            } => {
                let hsl = Hsl::new(hue, saturation, lightness);
                let rgb: Srgb = hsl.into_color();
                Rgb::new(
                    channel(rgb.red),
                    channel(rgb.green),
                    channel(rgb.blue),
                )
            }
        }
    }

    /// Well-formed: hue in [0, 360), saturation and lightness in [0, 1].
    pub fn is_well_formed(&self) -> bool {
        match *self {
            PixelColor::Rgb(_) => true,
            PixelColor::Hsl {
                hue,
                saturation,
                lightness,
            } => {
                (0.0..360.0).contains(&hue)
                    && (0.0..=1.0).contains(&saturation)
                    && (0.0..=1.0).contains(&lightness)
            }
        }
    }
}

impl fmt::Display for PixelColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelColor::Rgb(rgb) => write!(f, "{}", rgb),
            PixelColor::Hsl {
                hue,
                saturation,
                lightness,
            } => write!(
                f,
                "hsl({}, {}%, {}%)",
                hue,
                saturation * 100.0,
                lightness * 100.0
            ),
        }
    }
}

fn channel(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Interpolate between two colors
pub fn lerp_color(a: (u8, u8, u8), b: (u8, u8, u8), t: f32) -> (u8, u8, u8) {
    let t = t.clamp(0.0, 1.0);
    (
        (a.0 as f32 + (b.0 as f32 - a.0 as f32) * t) as u8,
        (a.1 as f32 + (b.1 as f32 - a.1 as f32) * t) as u8,
        (a.2 as f32 + (b.2 as f32 - a.2 as f32) * t) as u8,
    )
}

/// Composite a color at `opacity` over a black background, the way an
/// unlit LED reads in the terminal.
pub fn over_black(color: &PixelColor, opacity: f32) -> (u8, u8, u8) {
    lerp_color((0, 0, 0), color.to_rgb().as_tuple(), opacity)
}
