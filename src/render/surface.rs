use crate::choropleth::color::{Color, LegendEntry};

/// A classified region ready to draw: its key, projected path data and fill.
#[derive(Debug, Clone, PartialEq)]
pub struct MapRegion {
    pub key: String,
    pub path: String,
    pub fill: Color,
}

/// Unclassified layers drawn beneath the regions, as projected path data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapBackdrop {
    pub graticule_outline: Option<String>,
    pub graticule_lines: Vec<String>,
    pub outlines: Vec<String>,
}

/// A positioned chart bar. `value` is `None` for features without data, which are drawn with
/// zero height.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartBar {
    pub key: String,
    pub value: Option<f64>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub fill: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisTick {
    pub value: f64,
    pub y: f64,
}

/// Everything about the chart panel that is not a bar.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartFrame {
    pub width: f64,
    pub height: f64,
    pub inner_width: f64,
    pub inner_height: f64,
    pub left_padding: f64,
    pub top_bottom_padding: f64,
    pub title: String,
    pub ticks: Vec<AxisTick>,
    pub annotate: bool,
}

pub trait MapPanel {
    fn draw_map(
        &mut self,
        backdrop: &MapBackdrop,
        regions: &[MapRegion],
        legend: &[LegendEntry],
    ) -> anyhow::Result<()>;
}

pub trait ChartPanel {
    fn draw_chart(&mut self, frame: &ChartFrame, bars: &[ChartBar]) -> anyhow::Result<()>;
}
