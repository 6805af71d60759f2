use std::{fmt, str::FromStr};

use anyhow::{anyhow, ensure};
use serde::Deserialize;

use super::classify::ClassBreakpoints;

/// RGB color, written and parsed as a CSS hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = anyhow::Error;

    /// Accepts `#rrggbb` and the short `#rgb` form.
    fn from_str(value: &str) -> anyhow::Result<Self> {
        let hex = value
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| anyhow!("Color '{}' must start with '#'", value))?;
        ensure!(
            hex.chars().all(|c| c.is_ascii_hexdigit()),
            "Color '{}' is not a hex color",
            value
        );
        let channel = |digits: &str| u8::from_str_radix(digits, 16);
        match hex.len() {
            6 => Ok(Color::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => {
                let doubled: String = hex.chars().flat_map(|c| [c, c]).collect();
                format!("#{}", doubled).parse()
            }
            _ => Err(anyhow!("Color '{}' must have 3 or 6 hex digits", value)),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = anyhow::Error;

    fn try_from(value: String) -> anyhow::Result<Self> {
        value.parse()
    }
}

/// One class of a legend: its color and the value range it covers. `lower`/`upper` are `None`
/// for the open ends. The no-data entry has `class_index` set to `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub class_index: Option<usize>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub color: Color,
}

/// Maps attribute values to palette colors through classification breakpoints. Missing values
/// map to a dedicated no-data color that is never a palette entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorEncoder {
    breakpoints: ClassBreakpoints,
    palette: Vec<Color>,
    no_data_color: Color,
}

impl ColorEncoder {
    pub fn new(
        breakpoints: ClassBreakpoints,
        palette: Vec<Color>,
        no_data_color: Color,
    ) -> anyhow::Result<Self> {
        ensure!(
            palette.len() == breakpoints.class_count(),
            "Palette has {} colors but the breakpoints define {} classes",
            palette.len(),
            breakpoints.class_count()
        );
        ensure!(
            !palette.contains(&no_data_color),
            "No-data color {} is also a palette color",
            no_data_color
        );
        Ok(Self {
            breakpoints,
            palette,
            no_data_color,
        })
    }

    pub fn breakpoints(&self) -> &ClassBreakpoints {
        &self.breakpoints
    }

    pub fn palette(&self) -> &[Color] {
        &self.palette
    }

    pub fn class_index(&self, value: Option<f64>) -> Option<usize> {
        value
            .filter(|value| value.is_finite())
            .map(|value| self.breakpoints.class_index(value))
    }

    pub fn color(&self, value: Option<f64>) -> Color {
        match self.class_index(value) {
            Some(index) => self.palette[index],
            None => self.no_data_color,
        }
    }

    pub fn legend(&self) -> Vec<LegendEntry> {
        let bounds = self.breakpoints.as_slice();
        let mut entries: Vec<LegendEntry> = self
            .palette
            .iter()
            .enumerate()
            .map(|(index, color)| LegendEntry {
                class_index: Some(index),
                lower: index.checked_sub(1).map(|lower| bounds[lower]),
                upper: bounds.get(index).copied(),
                color: *color,
            })
            .collect();
        entries.push(LegendEntry {
            class_index: None,
            lower: None,
            upper: None,
            color: self.no_data_color,
        });
        entries
    }
}
