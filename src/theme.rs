//! Paint values and the built-in color presets.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A resolved paint value: 8-bit RGB with a floating point alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

// Helper function to build an opaque color
pub const fn rgb(r: u8, g: u8, b: u8) -> Rgba {
    Rgba { r, g, b, a: 1.0 }
}

pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Rgba {
    Rgba { r, g, b, a }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unrecognized color: {0}")]
pub struct ParseColorError(String);

impl FromStr for Rgba {
    type Err = ParseColorError;

    /// Parses `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)` and `rgba(r, g, b, a)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let err = || ParseColorError(s.to_string());

        if let Some(hex) = text.strip_prefix('#') {
            if !hex.is_ascii() {
                return Err(err());
            }
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
            return match hex.len() {
                3 => {
                    let mut bytes = [0u8; 3];
                    for (i, c) in hex.chars().enumerate() {
                        let v = c.to_digit(16).ok_or_else(err)? as u8;
                        bytes[i] = v * 17;
                    }
                    Ok(rgb(bytes[0], bytes[1], bytes[2]))
                }
                6 => Ok(rgb(channel(0)?, channel(2)?, channel(4)?)),
                8 => Ok(rgba(
                    channel(0)?,
                    channel(2)?,
                    channel(4)?,
                    f32::from(channel(6)?) / 255.0,
                )),
                _ => Err(err()),
            };
        }

        let body = text
            .strip_prefix("rgba(")
            .or_else(|| text.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(err)?;
        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        let component = |p: &str| p.parse::<u8>().map_err(|_| err());
        match parts.as_slice() {
            [r, g, b] => Ok(rgb(component(r)?, component(g)?, component(b)?)),
            [r, g, b, a] => {
                let alpha = a.parse::<f32>().map_err(|_| err())?;
                Ok(rgba(
                    component(r)?,
                    component(g)?,
                    component(b)?,
                    alpha.clamp(0.0, 1.0),
                ))
            }
            _ => Err(err()),
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a >= 1.0 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
        }
    }
}

impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rgba {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A full set of player colors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorPreset {
    pub waveform: Rgba,
    pub progress: Rgba,
    pub button: Rgba,
    pub text: Rgba,
    pub text_secondary: Rgba,
    pub background: Rgba,
}

/// Light-on-dark colors, the default.
pub const DARK: ColorPreset = ColorPreset {
    waveform: rgba(255, 255, 255, 0.3),
    progress: rgba(255, 255, 255, 0.9),
    button: rgba(255, 255, 255, 0.9),
    text: rgb(255, 255, 255),
    text_secondary: rgba(255, 255, 255, 0.6),
    background: rgb(18, 18, 24),
};

/// Dark-on-light colors.
pub const LIGHT: ColorPreset = ColorPreset {
    waveform: rgba(0, 0, 0, 0.2),
    progress: rgba(0, 0, 0, 0.8),
    button: rgba(0, 0, 0, 0.8),
    text: rgb(51, 51, 51),
    text_secondary: rgba(0, 0, 0, 0.6),
    background: rgb(250, 250, 250),
};

pub fn preset(name: &str) -> Option<ColorPreset> {
    match name {
        "dark" => Some(DARK),
        "light" => Some(LIGHT),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!("#ffffff".parse::<Rgba>().unwrap(), rgb(255, 255, 255));
        assert_eq!("#0f8".parse::<Rgba>().unwrap(), rgb(0, 255, 136));
        let c: Rgba = "#00000080".parse().unwrap();
        assert!((c.a - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_functional() {
        assert_eq!(
            "rgba(255, 255, 255, 0.3)".parse::<Rgba>().unwrap(),
            rgba(255, 255, 255, 0.3)
        );
        assert_eq!("rgb(1,2,3)".parse::<Rgba>().unwrap(), rgb(1, 2, 3));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("blue".parse::<Rgba>().is_err());
        assert!("#12".parse::<Rgba>().is_err());
        assert!("rgb(1,2)".parse::<Rgba>().is_err());
        assert!("rgb(300,2,3)".parse::<Rgba>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for color in [DARK.waveform, LIGHT.text, rgb(10, 20, 30)] {
            assert_eq!(color.to_string().parse::<Rgba>().unwrap(), color);
        }
    }
}
