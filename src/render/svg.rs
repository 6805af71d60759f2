//! SVG renderings of the map and chart panels.

use std::io::Write;

use anyhow::Context;

use crate::choropleth::color::LegendEntry;

use super::surface::{ChartBar, ChartFrame, ChartPanel, MapBackdrop, MapPanel, MapRegion};

const MAP_STYLE: &str = ".gratBackground{fill:#d5e3f0}\
.gratLines{fill:none;stroke:#fff;stroke-width:0.5}\
.backgroundCountry{fill:#f2f0eb;stroke:#999;stroke-width:0.5}\
.enumUnits{stroke:#fff;stroke-width:0.5}\
.legend text{font:12px sans-serif}";

const CHART_STYLE: &str = ".chartBackground{fill:#eee}\
.chartFrame{fill:none;stroke:#999;stroke-width:1}\
.chartTitle{font:bold 18px sans-serif}\
.axis line{stroke:#999}\
.axis text,.numbers{font:10px sans-serif}";

/// Escape text for use in SVG attribute values and text nodes.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Shortest readable rendering of a value for labels.
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let formatted = format!("{:.2}", value);
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

fn legend_label(entry: &LegendEntry) -> String {
    match (entry.class_index, entry.lower, entry.upper) {
        (None, _, _) => "No data".to_string(),
        (Some(_), None, Some(upper)) => format!("&lt; {}", format_value(upper)),
        (Some(_), Some(lower), None) => format!("&#8805; {}", format_value(lower)),
        (Some(_), Some(lower), Some(upper)) => {
            format!("{} - {}", format_value(lower), format_value(upper))
        }
        (Some(_), None, None) => "All values".to_string(),
    }
}

pub struct SvgMapPanel<W: Write> {
    writer: W,
    width: f64,
    height: f64,
}

impl<W: Write> SvgMapPanel<W> {
    pub fn new(writer: W, width: f64, height: f64) -> Self {
        Self {
            writer,
            width,
            height,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_legend(&mut self, legend: &[LegendEntry]) -> std::io::Result<()> {
        const SWATCH: f64 = 14.0;
        const ROW: f64 = 18.0;
        let top = self.height - 10.0 - ROW * legend.len() as f64;
        writeln!(self.writer, r#"<g class="legend">"#)?;
        for (row, entry) in legend.iter().enumerate() {
            let y = top + row as f64 * ROW;
            writeln!(
                self.writer,
                r#"<rect x="10" y="{:.2}" width="{}" height="{}" style="fill:{}"/>"#,
                y, SWATCH, SWATCH, entry.color
            )?;
            writeln!(
                self.writer,
                r#"<text x="{}" y="{:.2}">{}</text>"#,
                10.0 + SWATCH + 6.0,
                y + SWATCH - 2.0,
                legend_label(entry)
            )?;
        }
        writeln!(self.writer, "</g>")
    }

    fn write_map(
        &mut self,
        backdrop: &MapBackdrop,
        regions: &[MapRegion],
        legend: &[LegendEntry],
    ) -> std::io::Result<()> {
        writeln!(
            self.writer,
            r#"<svg xmlns="http://www.w3.org/2000/svg" class="map" width="{}" height="{}">"#,
            self.width, self.height
        )?;
        writeln!(self.writer, "<style>{}</style>", MAP_STYLE)?;
        // Drawing order follows document order: graticule, backdrop, then regions.
        if let Some(outline) = &backdrop.graticule_outline {
            writeln!(self.writer, r#"<path class="gratBackground" d="{}"/>"#, outline)?;
        }
        for line in &backdrop.graticule_lines {
            writeln!(self.writer, r#"<path class="gratLines" d="{}"/>"#, line)?;
        }
        for outline in &backdrop.outlines {
            writeln!(self.writer, r#"<path class="backgroundCountry" d="{}"/>"#, outline)?;
        }
        for region in regions {
            writeln!(
                self.writer,
                r#"<path class="enumUnits" id="{}" d="{}" style="fill:{}"/>"#,
                escape_xml(&region.key),
                region.path,
                region.fill
            )?;
        }
        if !legend.is_empty() {
            self.write_legend(legend)?;
        }
        writeln!(self.writer, "</svg>")?;
        self.writer.flush()
    }
}

impl<W: Write> MapPanel for SvgMapPanel<W> {
    fn draw_map(
        &mut self,
        backdrop: &MapBackdrop,
        regions: &[MapRegion],
        legend: &[LegendEntry],
    ) -> anyhow::Result<()> {
        self.write_map(backdrop, regions, legend)
            .context("Writing map SVG")
    }
}

pub struct SvgChartPanel<W: Write> {
    writer: W,
}

impl<W: Write> SvgChartPanel<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_chart(&mut self, frame: &ChartFrame, bars: &[ChartBar]) -> std::io::Result<()> {
        let translate = format!(
            "translate({},{})",
            frame.left_padding, frame.top_bottom_padding
        );
        writeln!(
            self.writer,
            r#"<svg xmlns="http://www.w3.org/2000/svg" class="chart" width="{}" height="{}">"#,
            frame.width, frame.height
        )?;
        writeln!(self.writer, "<style>{}</style>", CHART_STYLE)?;
        writeln!(
            self.writer,
            r#"<rect class="chartBackground" width="{}" height="{}" transform="{}"/>"#,
            frame.inner_width, frame.inner_height, translate
        )?;
        for bar in bars {
            writeln!(
                self.writer,
                r#"<rect class="bars {}" x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" style="fill:{}"/>"#,
                escape_xml(&bar.key),
                bar.x,
                bar.y,
                bar.width,
                bar.height,
                bar.fill
            )?;
        }
        if frame.annotate {
            for bar in bars {
                if let Some(value) = bar.value {
                    writeln!(
                        self.writer,
                        r#"<text class="numbers {}" text-anchor="middle" x="{:.2}" y="{:.2}">{}</text>"#,
                        escape_xml(&bar.key),
                        bar.x + bar.width / 2.0,
                        bar.y - 4.0,
                        format_value(value)
                    )?;
                }
            }
        }
        writeln!(
            self.writer,
            r#"<text class="chartTitle" x="20" y="40">{}</text>"#,
            escape_xml(&frame.title)
        )?;
        writeln!(self.writer, r#"<g class="axis" transform="{}">"#, translate)?;
        for tick in &frame.ticks {
            let y = tick.y - frame.top_bottom_padding;
            writeln!(
                self.writer,
                r#"<line x1="0" x2="6" y1="{:.2}" y2="{:.2}"/><text x="9" y="{:.2}" dy="0.32em">{}</text>"#,
                y,
                y,
                y,
                format_value(tick.value)
            )?;
        }
        writeln!(self.writer, "</g>")?;
        writeln!(
            self.writer,
            r#"<rect class="chartFrame" width="{}" height="{}" transform="{}"/>"#,
            frame.inner_width, frame.inner_height, translate
        )?;
        writeln!(self.writer, "</svg>")?;
        self.writer.flush()
    }
}

impl<W: Write> ChartPanel for SvgChartPanel<W> {
    fn draw_chart(&mut self, frame: &ChartFrame, bars: &[ChartBar]) -> anyhow::Result<()> {
        self.write_chart(frame, bars).context("Writing chart SVG")
    }
}
