//! CSS colour parsing and WCAG contrast
//!
//! Computed styles serialise colours as `rgb(...)`/`rgba(...)`, while theme
//! sources use hex. Comparing both as [`Rgba`] values avoids depending on
//! how a browser happens to format a value.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ColorParseError;

static FUNCTIONAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^rgba?\(\s*([^)]*?)\s*\)$").expect("static regex")
});

static COLOR_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"rgba?\([^)]*\)|#[0-9a-fA-F]{3,8}\b").expect("static regex")
});

/// An sRGB colour with alpha in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const TRANSPARENT: Rgba = Rgba { r: 0, g: 0, b: 0, a: 0.0 };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn is_opaque(&self) -> bool {
        self.a >= 1.0
    }

    pub fn is_transparent(&self) -> bool {
        self.a <= 0.0
    }

    /// Channel-wise comparison; alpha uses the same tolerance scaled to 0..1.
    pub fn matches(&self, other: &Rgba, tolerance: u8) -> bool {
        let close = |a: u8, b: u8| a.abs_diff(b) <= tolerance;
        close(self.r, other.r)
            && close(self.g, other.g)
            && close(self.b, other.b)
            && (self.a - other.a).abs() <= f32::from(tolerance) / 255.0 + f32::EPSILON
    }

    /// Composite this colour over `background`
    pub fn over(&self, background: &Rgba) -> Rgba {
        let a = self.a + background.a * (1.0 - self.a);
        if a <= 0.0 {
            return Rgba::TRANSPARENT;
        }
        let blend = |fg: u8, bg: u8| {
            let v = (f32::from(fg) * self.a + f32::from(bg) * background.a * (1.0 - self.a)) / a;
            v.round().clamp(0.0, 255.0) as u8
        };
        Rgba {
            r: blend(self.r, background.r),
            g: blend(self.g, background.g),
            b: blend(self.b, background.b),
            a,
        }
    }

    /// WCAG relative luminance of the colour channels (alpha ignored)
    pub fn relative_luminance(&self) -> f64 {
        fn linearize(channel: u8) -> f64 {
            let c = f64::from(channel) / 255.0;
            if c <= 0.03928 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }
        0.2126 * linearize(self.r) + 0.7152 * linearize(self.g) + 0.0722 * linearize(self.b)
    }

    pub fn to_hex(&self) -> String {
        if self.is_opaque() {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            let alpha = (self.a.clamp(0.0, 1.0) * 255.0).round() as u8;
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, alpha)
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_opaque() {
            write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
        } else {
            write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
        }
    }
}

impl FromStr for Rgba {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let err = || ColorParseError(s.to_string());

        match input.to_ascii_lowercase().as_str() {
            "transparent" => return Ok(Rgba::TRANSPARENT),
            "white" => return Ok(Rgba::WHITE),
            "black" => return Ok(Rgba::BLACK),
            _ => {}
        }

        if let Some(hex) = input.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(err);
        }

        let caps = FUNCTIONAL.captures(input).ok_or_else(err)?;
        parse_functional(&caps[1]).ok_or_else(err)
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    let (r, g, b, a) = match hex.len() {
        3 => (nibble(0)?, nibble(1)?, nibble(2)?, 255),
        4 => (nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?),
        6 => (byte(0)?, byte(2)?, byte(4)?, 255),
        8 => (byte(0)?, byte(2)?, byte(4)?, byte(6)?),
        _ => return None,
    };

    Some(Rgba {
        r,
        g,
        b,
        a: f32::from(a) / 255.0,
    })
}

// Accepts `r, g, b[, a]` and `r g b[ / a]`.
fn parse_functional(body: &str) -> Option<Rgba> {
    let (channels, alpha) = match body.split_once('/') {
        Some((channels, alpha)) => (channels, Some(alpha.trim())),
        None => (body, None),
    };

    let mut parts: Vec<&str> = channels
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();

    let alpha = match (alpha, parts.len()) {
        (Some(a), 3) => Some(a),
        (None, 4) => parts.pop(),
        (None, 3) => None,
        _ => return None,
    };

    let channel = |p: &str| -> Option<u8> {
        let value = match p.strip_suffix('%') {
            Some(pct) => pct.parse::<f32>().ok()? * 2.55,
            None => p.parse::<f32>().ok()?,
        };
        Some(value.round().clamp(0.0, 255.0) as u8)
    };

    let a = match alpha {
        Some(a) => match a.strip_suffix('%') {
            Some(pct) => pct.parse::<f32>().ok()? / 100.0,
            None => a.parse::<f32>().ok()?,
        },
        None => 1.0,
    };

    Some(Rgba {
        r: channel(parts[0])?,
        g: channel(parts[1])?,
        b: channel(parts[2])?,
        a: a.clamp(0.0, 1.0),
    })
}

/// Every colour token in a computed style value, in order of appearance.
///
/// `linear-gradient(135deg, rgb(240, 230, 217) 0%, #f3e6d0 100%)` yields two
/// colours. Tokens that fail to parse are skipped.
pub fn find_colors(text: &str) -> Vec<Rgba> {
    COLOR_TOKEN
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// WCAG contrast ratio between two colours, from 1.0 to 21.0
pub fn contrast_ratio(a: &Rgba, b: &Rgba) -> f64 {
    let la = a.relative_luminance();
    let lb = b.relative_luminance();
    let (lighter, darker) = if la >= lb { (la, lb) } else { (lb, la) };
    (lighter + 0.05) / (darker + 0.05)
}

/// WCAG conformance level reached by a contrast ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WcagRating {
    Fail,
    AaLarge,
    Aa,
    Aaa,
}

impl WcagRating {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 7.0 {
            WcagRating::Aaa
        } else if ratio >= 4.5 {
            WcagRating::Aa
        } else if ratio >= 3.0 {
            WcagRating::AaLarge
        } else {
            WcagRating::Fail
        }
    }
}

impl fmt::Display for WcagRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WcagRating::Aaa => "AAA",
            WcagRating::Aa => "AA",
            WcagRating::AaLarge => "AA (large text)",
            WcagRating::Fail => "FAIL",
        })
    }
}
