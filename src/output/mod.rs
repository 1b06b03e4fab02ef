// Output emitter: turns RSI points and threshold levels into drawables

use crate::models::{KLine, RsiPoint};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// RGBA color, written as `#RRGGBB` or `#RRGGBBAA`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Scale each channel by 0.7, keeping alpha
    pub fn darker(self) -> Self {
        let scale = |c: u8| (f64::from(c) * 0.7) as u8;
        Self {
            r: scale(self.r),
            g: scale(self.g),
            b: scale(self.b),
            a: self.a,
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02X}", self.a)?;
        }
        Ok(())
    }
}

impl FromStr for Rgba {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if !(hex.len() == 6 || hex.len() == 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(s.to_string());
        }

        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| s.to_string());
        let a = if hex.len() == 8 { channel(6)? } else { 255 };

        Ok(Self::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }
}

impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rgba {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|bad| serde::de::Error::custom(format!("invalid color {:?}", bad)))
    }
}

/// A point in chart space: time on x, indicator value on y
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Decimal,
}

impl From<&RsiPoint> for DataPoint {
    fn from(point: &RsiPoint) -> Self {
        Self {
            timestamp: point.timestamp,
            value: point.value,
        }
    }
}

/// Renderer-agnostic geometry handed to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Drawable {
    Polyline {
        points: Vec<DataPoint>,
        color: Rgba,
        width: f32,
    },
    Rectangle {
        corner1: DataPoint,
        corner2: DataPoint,
        fill: Rgba,
        border: Option<Rgba>,
        border_width: f32,
    },
    HorizontalLine {
        level: Decimal,
        color: Rgba,
        width: f32,
        dashed: bool,
    },
}

/// Styling and levels the emitter needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandStyle {
    pub overbought: Decimal,
    pub oversold: Decimal,
    pub line_color: Rgba,
    pub band_color: Rgba,
}

/// Build the drawables for one RSI pane
///
/// The band box spans the whole visible series even when no new points were
/// produced this call.
pub fn emit(points: &[RsiPoint], klines: &[KLine], style: &BandStyle) -> Vec<Drawable> {
    let mut drawables = Vec::with_capacity(4);

    if !points.is_empty() {
        drawables.push(Drawable::Polyline {
            points: points.iter().map(DataPoint::from).collect(),
            color: style.line_color,
            width: 2.0,
        });
    }

    if let (Some(first), Some(last)) = (klines.first(), klines.last()) {
        drawables.push(Drawable::Rectangle {
            corner1: DataPoint {
                timestamp: first.timestamp,
                value: style.overbought,
            },
            corner2: DataPoint {
                timestamp: last.timestamp,
                value: style.oversold,
            },
            fill: style.band_color,
            border: None,
            border_width: 0.0,
        });
    }

    for level in [style.overbought, style.oversold] {
        drawables.push(Drawable::HorizontalLine {
            level,
            color: style.band_color.darker(),
            width: 1.0,
            dashed: true,
        });
    }

    drawables
}
