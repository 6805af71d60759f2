use std::cmp::Ordering;

use anyhow::Context;
use rayon::prelude::*;

use crate::{
    choropleth::{
        classify::{class_counts, manual_breaks, natural_breaks},
        color::ColorEncoder,
        join::EnrichedFeature,
    },
    config::{ChartConfig, ClassificationConfig, ClassificationMethod},
};

use super::{
    projector::{GeometryProjector, Graticule},
    scale::LinearScale,
    surface::{AxisTick, ChartBar, ChartFrame, ChartPanel, MapBackdrop, MapPanel, MapRegion},
};

/// The joined features of one load together with the classification derived from them. Both
/// panels are rendered from the same session so they share a single color encoding.
#[derive(Debug, Clone)]
pub struct Session {
    features: Vec<EnrichedFeature>,
    attribute: String,
    encoder: ColorEncoder,
}

impl Session {
    /// Classify `attribute` over every feature holding a valid value for it.
    pub fn new(
        features: Vec<EnrichedFeature>,
        attribute: &str,
        classification: &ClassificationConfig,
    ) -> anyhow::Result<Self> {
        let values: Vec<f64> = features
            .iter()
            .filter_map(|feature| feature.value(attribute))
            .collect();
        log::info!(
            "{} of {} features have a value for '{}'",
            values.len(),
            features.len(),
            attribute
        );
        let breakpoints = match &classification.method {
            ClassificationMethod::NaturalBreaks { classes } => natural_breaks(&values, *classes)
                .with_context(|| format!("Classifying '{}'", attribute))?,
            ClassificationMethod::Manual { breakpoints } => manual_breaks(breakpoints)?,
        };
        log::info!("Class breakpoints: {:?}", breakpoints.as_slice());
        log::debug!(
            "Features per class: {:?}",
            class_counts(&values, &breakpoints)
        );
        let encoder = ColorEncoder::new(
            breakpoints,
            classification.palette.clone(),
            classification.no_data_color,
        )?;
        Ok(Self::with_encoder(features, attribute, encoder))
    }

    pub fn with_encoder(
        features: Vec<EnrichedFeature>,
        attribute: &str,
        encoder: ColorEncoder,
    ) -> Self {
        Self {
            features,
            attribute: attribute.to_string(),
            encoder,
        }
    }

    pub fn features(&self) -> &[EnrichedFeature] {
        &self.features
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn encoder(&self) -> &ColorEncoder {
        &self.encoder
    }

    pub fn value_of(&self, feature: &EnrichedFeature) -> Option<f64> {
        feature.value(&self.attribute)
    }
}

/// Ascending by value, features without data first.
fn compare_values(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}

/// Feeds one session to the map and chart panels.
pub struct RenderCoordinator<'s> {
    session: &'s Session,
}

impl<'s> RenderCoordinator<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self { session }
    }

    pub fn map_regions<P: GeometryProjector + ?Sized>(&self, projector: &P) -> Vec<MapRegion> {
        let encoder = self.session.encoder();
        self.session
            .features()
            .par_iter()
            .map(|feature| MapRegion {
                key: feature.key.clone(),
                path: projector.path(&feature.geometry),
                fill: encoder.color(self.session.value_of(feature)),
            })
            .collect()
    }

    pub fn map_backdrop<P: GeometryProjector + ?Sized>(
        &self,
        projector: &P,
        outlines: &[geo::Geometry],
        graticule: Option<&Graticule>,
    ) -> MapBackdrop {
        MapBackdrop {
            graticule_outline: graticule.map(|graticule| {
                projector.path(&geo::Geometry::Polygon(graticule.outline.clone()))
            }),
            graticule_lines: graticule
                .map(|graticule| {
                    graticule
                        .lines
                        .iter()
                        .map(|line| projector.path(&geo::Geometry::LineString(line.clone())))
                        .collect()
                })
                .unwrap_or_default(),
            outlines: outlines
                .iter()
                .map(|outline| projector.path(outline))
                .collect(),
        }
    }

    /// The session's features ordered by ascending value. The session itself is not reordered.
    pub fn sorted_view(&self) -> Vec<&'s EnrichedFeature> {
        let session = self.session;
        let mut view: Vec<&EnrichedFeature> = session.features().iter().collect();
        view.sort_by(|a, b| compare_values(session.value_of(a), session.value_of(b)));
        view
    }

    fn chart_scale(&self, chart: &ChartConfig) -> anyhow::Result<LinearScale> {
        Ok(LinearScale::new(
            (chart.domain[0], chart.domain[1]),
            (0.0, chart.inner_height()),
        )?
        .clamped())
    }

    /// One bar per feature in ascending value order. Bar heights follow the chart's linear scale,
    /// fills come from the session's encoder. Features without data get an empty bar.
    pub fn chart_bars(&self, chart: &ChartConfig) -> anyhow::Result<Vec<ChartBar>> {
        let scale = self.chart_scale(chart)?;
        let view = self.sorted_view();
        let slot = chart.inner_width() / view.len().max(1) as f64;
        Ok(view
            .into_iter()
            .enumerate()
            .map(|(index, feature)| {
                let value = self.session.value_of(feature);
                let height = value.map(|value| scale.scale(value)).unwrap_or(0.0);
                ChartBar {
                    key: feature.key.clone(),
                    value,
                    x: index as f64 * slot + chart.left_padding,
                    y: chart.height - height - chart.top_bottom_padding,
                    width: (slot - 1.0).max(0.0),
                    height,
                    fill: self.session.encoder().color(value),
                }
            })
            .collect())
    }

    pub fn chart_frame(&self, chart: &ChartConfig) -> anyhow::Result<ChartFrame> {
        let scale = self.chart_scale(chart)?;
        let title = if chart.title.is_empty() {
            self.session.attribute().to_string()
        } else {
            chart.title.clone()
        };
        Ok(ChartFrame {
            width: chart.width,
            height: chart.height,
            inner_width: chart.inner_width(),
            inner_height: chart.inner_height(),
            left_padding: chart.left_padding,
            top_bottom_padding: chart.top_bottom_padding,
            title,
            ticks: scale
                .ticks(chart.tick_count)
                .into_iter()
                .map(|value| AxisTick {
                    value,
                    y: chart.height - chart.top_bottom_padding - scale.scale(value),
                })
                .collect(),
            annotate: chart.annotate,
        })
    }

    pub fn render_map<M: MapPanel, P: GeometryProjector + ?Sized>(
        &self,
        panel: &mut M,
        projector: &P,
        outlines: &[geo::Geometry],
        graticule: Option<&Graticule>,
    ) -> anyhow::Result<()> {
        let backdrop = self.map_backdrop(projector, outlines, graticule);
        let regions = self.map_regions(projector);
        panel.draw_map(&backdrop, &regions, &self.session.encoder().legend())
    }

    pub fn render_chart<C: ChartPanel>(
        &self,
        panel: &mut C,
        chart: &ChartConfig,
    ) -> anyhow::Result<()> {
        let frame = self.chart_frame(chart)?;
        let bars = self.chart_bars(chart)?;
        panel.draw_chart(&frame, &bars)
    }
}
