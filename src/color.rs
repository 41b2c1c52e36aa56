//! Vendor-agnostic color value
//!
//! Users pick colors as `#RRGGBB` or by name; each adapter converts the
//! parsed value into whatever its vendor speaks (CIE xy for Hue, HSV for
//! Nanoleaf and Tuya).

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::DeviceError;

/// Named colors accepted in addition to hex notation.
pub const PALETTE: &[(&str, Rgb)] = &[
    ("red", Rgb::new(255, 0, 0)),
    ("green", Rgb::new(0, 255, 0)),
    ("blue", Rgb::new(0, 0, 255)),
    ("yellow", Rgb::new(255, 255, 0)),
    ("orange", Rgb::new(255, 165, 0)),
    ("pink", Rgb::new(255, 192, 203)),
    ("purple", Rgb::new(128, 0, 128)),
    ("white", Rgb::new(255, 255, 255)),
    ("light_blue", Rgb::new(173, 216, 230)),
];

/// 8-bit sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Hue in degrees `[0, 360)`, saturation and value in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub hue: f64,
    pub saturation: f64,
    pub value: f64,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_hsv(self) -> Hsv {
        let r = f64::from(self.r) / 255.0;
        let g = f64::from(self.g) / 255.0;
        let b = f64::from(self.b) / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let hue = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };
        let saturation = if max == 0.0 { 0.0 } else { delta / max };

        Hsv {
            hue,
            saturation,
            value: max,
        }
    }

    /// CIE 1931 xy chromaticity, using the Wide RGB D65 conversion Hue
    /// bridges expect. Black has no chromaticity.
    pub fn to_xy(self) -> Option<(f64, f64)> {
        fn linear(channel: u8) -> f64 {
            let c = f64::from(channel) / 255.0;
            if c > 0.04045 {
                ((c + 0.055) / 1.055).powf(2.4)
            } else {
                c / 12.92
            }
        }

        let (r, g, b) = (linear(self.r), linear(self.g), linear(self.b));
        let x = r * 0.664_511 + g * 0.154_324 + b * 0.162_028;
        let y = r * 0.283_881 + g * 0.668_433 + b * 0.047_685;
        let z = r * 0.000_088 + g * 0.072_310 + b * 0.986_039;
        let sum = x + y + z;
        if sum == 0.0 {
            return None;
        }

        let round = |v: f64| (v * 10_000.0).round() / 10_000.0;
        Some((round(x / sum), round(y / sum)))
    }
}

impl Hsv {
    /// Back to 8-bit RGB.
    pub fn to_rgb(self) -> Rgb {
        let c = self.value * self.saturation;
        let h = (self.hue.rem_euclid(360.0)) / 60.0;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = self.value - c;
        let to_u8 = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Rgb::new(to_u8(r), to_u8(g), to_u8(b))
    }
}

impl FromStr for Rgb {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if let Some(hex) = trimmed.strip_prefix('#') {
            let bytes = match hex::decode(hex) {
                Ok(bytes) if bytes.len() == 3 => bytes,
                _ => {
                    return Err(DeviceError::Validation(format!(
                        "color '{}' is not a valid hex color; use the form #RRGGBB",
                        s
                    )))
                }
            };
            return Ok(Rgb::new(bytes[0], bytes[1], bytes[2]));
        }

        let lower = trimmed.to_lowercase();
        PALETTE
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, rgb)| *rgb)
            .ok_or_else(|| {
                let names: Vec<&str> = PALETTE.iter().map(|(name, _)| *name).collect();
                DeviceError::Validation(format!(
                    "color '{}' not supported; use #RRGGBB or one of: {}",
                    s,
                    names.join(", ")
                ))
            })
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_and_names() {
        assert_eq!("#FF8000".parse::<Rgb>().unwrap(), Rgb::new(255, 128, 0));
        assert_eq!("#ff8000".parse::<Rgb>().unwrap(), Rgb::new(255, 128, 0));
        assert_eq!("Light_Blue".parse::<Rgb>().unwrap(), Rgb::new(173, 216, 230));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        for bad in ["#FF00", "#GG0000", "FF0000", "chartreuse", ""] {
            let result = bad.parse::<Rgb>();
            assert!(
                matches!(result, Err(DeviceError::Validation(_))),
                "expected validation error for {:?}, got {:?}",
                bad,
                result
            );
        }
    }

    #[test]
    fn test_hsv_primaries() {
        let red = Rgb::new(255, 0, 0).to_hsv();
        assert_eq!(red.hue, 0.0);
        assert_eq!(red.saturation, 1.0);
        assert_eq!(red.value, 1.0);

        let blue = Rgb::new(0, 0, 255).to_hsv();
        assert_eq!(blue.hue, 240.0);

        let grey = Rgb::new(128, 128, 128).to_hsv();
        assert_eq!(grey.saturation, 0.0);
    }

    #[test]
    fn test_hsv_back_to_rgb() {
        for rgb in [Rgb::new(255, 165, 0), Rgb::new(128, 0, 128), Rgb::new(10, 200, 90)] {
            assert_eq!(rgb.to_hsv().to_rgb(), rgb);
        }
    }

    #[test]
    fn test_xy_matches_hue_reference_values() {
        // Reference points from the Hue developer docs (rounded).
        let (x, y) = Rgb::new(255, 0, 0).to_xy().unwrap();
        assert!((x - 0.7006).abs() < 0.001, "x = {}", x);
        assert!((y - 0.2993).abs() < 0.001, "y = {}", y);

        assert_eq!(Rgb::new(0, 0, 0).to_xy(), None);
    }
}
