use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn lerp(self, to: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        Rgb {
            r: lerp_u8(self.r, to.r, t),
            g: lerp_u8(self.g, to.g, t),
            b: lerp_u8(self.b, to.b, t),
        }
    }

    /// Scales HSL lightness by `factor`; 0.5 dims to half, 2.0 brightens
    /// towards white.
    pub fn adjust_brightness(self, factor: f64) -> Rgb {
        let (h, s, l) = rgb_to_hsl(self);
        hsl_to_rgb(h, s, (l * factor.max(0.0)).clamp(0.0, 1.0))
    }

    pub fn nearest_xterm(self) -> u8 {
        let mut best = 16_u8;
        let mut best_distance = u32::MAX;
        for index in 16..=255_u8 {
            let candidate = xterm_to_rgb(index);
            let distance = squared_distance(self, candidate);
            if distance < best_distance {
                best = index;
                best_distance = distance;
            }
        }
        best
    }

    pub fn to_hex(self) -> String {
        format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// A terminal color: an xterm-256 palette index or a 24-bit RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ColorRepr", into = "String")]
pub enum Color {
    Xterm(u8),
    Rgb(Rgb),
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::Rgb(Rgb::new(r, g, b))
    }

    pub fn to_rgb(self) -> Rgb {
        match self {
            Self::Xterm(index) => xterm_to_rgb(index),
            Self::Rgb(rgb) => rgb,
        }
    }

    pub fn to_xterm(self) -> u8 {
        match self {
            Self::Xterm(index) => index,
            Self::Rgb(rgb) => rgb.nearest_xterm(),
        }
    }

    pub fn adjust_brightness(self, factor: f64) -> Color {
        Color::Rgb(self.to_rgb().adjust_brightness(factor))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xterm(index) => write!(f, "{index}"),
            Self::Rgb(rgb) => write!(f, "{}", rgb.to_hex()),
        }
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl From<Rgb> for Color {
    fn from(rgb: Rgb) -> Self {
        Self::Rgb(rgb)
    }
}

impl FromStr for Color {
    type Err = EngineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw.trim();
        let invalid = || EngineError::InvalidColor {
            value: raw.to_owned(),
        };

        if !value.is_empty() && value.len() <= 3 && value.bytes().all(|b| b.is_ascii_digit()) {
            return value.parse::<u8>().map(Color::Xterm).map_err(|_| invalid());
        }

        let hex = value.strip_prefix('#').unwrap_or(value);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| invalid())
        };
        Ok(Color::Rgb(Rgb {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        }))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    Index(u64),
    Text(String),
}

impl TryFrom<ColorRepr> for Color {
    type Error = EngineError;

    fn try_from(repr: ColorRepr) -> Result<Self, Self::Error> {
        match repr {
            ColorRepr::Index(index) => u8::try_from(index)
                .map(Color::Xterm)
                .map_err(|_| EngineError::InvalidColor {
                    value: index.to_string(),
                }),
            ColorRepr::Text(text) => text.parse(),
        }
    }
}

/// How frames encode color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    #[default]
    TrueColor,
    Xterm256,
    None,
}

impl ColorMode {
    pub fn from_flags(xterm_colors: bool, no_color: bool) -> Self {
        if no_color {
            Self::None
        } else if xterm_colors {
            Self::Xterm256
        } else {
            Self::TrueColor
        }
    }

    /// SGR parameters selecting `color` as foreground (`38`) or background
    /// (`48`); `None` when the mode strips color.
    pub fn sgr(self, color: Color, background: bool) -> Option<String> {
        let layer = if background { 48 } else { 38 };
        match (self, color) {
            (Self::None, _) => None,
            (Self::TrueColor, Color::Rgb(rgb)) => {
                Some(format!("{layer};2;{};{};{}", rgb.r, rgb.g, rgb.b))
            }
            (_, color) => Some(format!("{layer};5;{}", color.to_xterm())),
        }
    }
}

pub const SGR_RESET: &str = "\u{1b}[0m";

const SYSTEM_COLORS: [(u8, u8, u8); 16] = [
    (0, 0, 0),
    (128, 0, 0),
    (0, 128, 0),
    (128, 128, 0),
    (0, 0, 128),
    (128, 0, 128),
    (0, 128, 128),
    (192, 192, 192),
    (128, 128, 128),
    (255, 0, 0),
    (0, 255, 0),
    (255, 255, 0),
    (0, 0, 255),
    (255, 0, 255),
    (0, 255, 255),
    (255, 255, 255),
];

const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

pub fn xterm_to_rgb(index: u8) -> Rgb {
    match index {
        0..=15 => {
            let (r, g, b) = SYSTEM_COLORS[index as usize];
            Rgb::new(r, g, b)
        }
        16..=231 => {
            let cube = index - 16;
            Rgb::new(
                CUBE_LEVELS[(cube / 36) as usize],
                CUBE_LEVELS[((cube / 6) % 6) as usize],
                CUBE_LEVELS[(cube % 6) as usize],
            )
        }
        232..=255 => {
            let level = 8 + 10 * (index - 232);
            Rgb::new(level, level, level)
        }
    }
}

fn squared_distance(a: Rgb, b: Rgb) -> u32 {
    let dr = i32::from(a.r) - i32::from(b.r);
    let dg = i32::from(a.g) - i32::from(b.g);
    let db = i32::from(a.b) - i32::from(b.b);
    (dr * dr + dg * dg + db * db) as u32
}

fn lerp_u8(a: u8, b: u8, t: f64) -> u8 {
    (f64::from(a) + (f64::from(b) - f64::from(a)) * t)
        .round()
        .clamp(0.0, 255.0) as u8
}

fn rgb_to_hsl(rgb: Rgb) -> (f64, f64, f64) {
    let r = f64::from(rgb.r) / 255.0;
    let g = f64::from(rgb.g) / 255.0;
    let b = f64::from(rgb.b) / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    if (max - min).abs() < f64::EPSILON {
        return (0.0, 0.0, l);
    }
    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == r {
        ((g - b) / d + if g < b { 6.0 } else { 0.0 }) / 6.0
    } else if max == g {
        ((b - r) / d + 2.0) / 6.0
    } else {
        ((r - g) / d + 4.0) / 6.0
    };
    (h, s, l)
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> Rgb {
    if s == 0.0 {
        let v = (l * 255.0).round() as u8;
        return Rgb::new(v, v, v);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let channel = |t: f64| {
        let t = t.rem_euclid(1.0);
        let value = if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        };
        (value * 255.0).round().clamp(0.0, 255.0) as u8
    };
    Rgb::new(channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0))
}

#[cfg(test)]
mod tests {
    use super::{xterm_to_rgb, Color, ColorMode, Rgb};

    #[test]
    fn parses_hex_and_xterm_forms() {
        assert_eq!("#ff8000".parse::<Color>().expect("hex"), Color::rgb(255, 128, 0));
        assert_eq!("00d1FF".parse::<Color>().expect("hex"), Color::rgb(0, 209, 255));
        assert_eq!("196".parse::<Color>().expect("index"), Color::Xterm(196));
        assert!("256".parse::<Color>().is_err());
        assert!("ggg000".parse::<Color>().is_err());
        assert!("".parse::<Color>().is_err());
    }

    #[test]
    fn deserializes_from_yaml_scalars() {
        let colors: Vec<Color> =
            serde_yaml::from_str("[ffffff, 21, '#000080']").expect("colors should parse");
        assert_eq!(
            colors,
            vec![Color::rgb(255, 255, 255), Color::Xterm(21), Color::rgb(0, 0, 128)]
        );
        assert!(serde_yaml::from_str::<Color>("300").is_err());
    }

    #[test]
    fn nearest_xterm_finds_exact_cube_entries() {
        assert_eq!(Rgb::new(255, 0, 0).nearest_xterm(), 196);
        assert_eq!(xterm_to_rgb(196), Rgb::new(255, 0, 0));
        assert_eq!(xterm_to_rgb(232), Rgb::new(8, 8, 8));
    }

    #[test]
    fn brightness_adjustment_dims_and_keeps_hue() {
        let dimmed = Rgb::new(200, 0, 0).adjust_brightness(0.5);
        assert!(dimmed.r < 200 && dimmed.g == 0 && dimmed.b == 0);
        assert_eq!(Rgb::BLACK.adjust_brightness(2.0), Rgb::BLACK);
    }

    #[test]
    fn color_modes_emit_expected_sgr() {
        let orange = Color::rgb(255, 128, 0);
        assert_eq!(
            ColorMode::TrueColor.sgr(orange, false).as_deref(),
            Some("38;2;255;128;0")
        );
        assert_eq!(
            ColorMode::Xterm256.sgr(Color::rgb(255, 0, 0), true).as_deref(),
            Some("48;5;196")
        );
        assert_eq!(ColorMode::None.sgr(orange, false), None);
    }
}
