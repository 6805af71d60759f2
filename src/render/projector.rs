use anyhow::{anyhow, ensure};
use geo::BoundingRect;

/// Turns abstract geometry into path data for a rendering surface.
pub trait GeometryProjector: Sync {
    fn project(&self, coord: geo::Coord) -> geo::Coord;

    /// SVG path data for the geometry. Points have no path and yield an empty string.
    fn path(&self, geometry: &geo::Geometry) -> String {
        let mut path = String::new();
        self.append_path(geometry, &mut path);
        path
    }

    fn append_path(&self, geometry: &geo::Geometry, path: &mut String) {
        match geometry {
            geo::Geometry::Point(_) | geo::Geometry::MultiPoint(_) => {}
            geo::Geometry::Line(line) => {
                self.append_ring(&geo::LineString::from(*line), false, path)
            }
            geo::Geometry::LineString(line) => self.append_ring(line, false, path),
            geo::Geometry::MultiLineString(lines) => {
                for line in lines {
                    self.append_ring(line, false, path);
                }
            }
            geo::Geometry::Polygon(polygon) => self.append_polygon(polygon, path),
            geo::Geometry::MultiPolygon(polygons) => {
                for polygon in polygons {
                    self.append_polygon(polygon, path);
                }
            }
            geo::Geometry::Rect(rect) => self.append_polygon(&rect.to_polygon(), path),
            geo::Geometry::Triangle(triangle) => {
                self.append_polygon(&triangle.to_polygon(), path)
            }
            geo::Geometry::GeometryCollection(collection) => {
                for geometry in collection {
                    self.append_path(geometry, path);
                }
            }
        }
    }

    fn append_polygon(&self, polygon: &geo::Polygon, path: &mut String) {
        self.append_ring(polygon.exterior(), true, path);
        for interior in polygon.interiors() {
            self.append_ring(interior, true, path);
        }
    }

    fn append_ring(&self, line: &geo::LineString, closed: bool, path: &mut String) {
        for (index, coord) in line.coords().enumerate() {
            let projected = self.project(*coord);
            let command = if index == 0 { 'M' } else { 'L' };
            path.push_str(&format!("{}{:.2},{:.2}", command, projected.x, projected.y));
        }
        if closed && line.coords().count() > 0 {
            path.push('Z');
        }
    }
}

/// Equirectangular projector scaled uniformly so a lon/lat extent fits a viewport, with north up.
#[derive(Debug, Clone, PartialEq)]
pub struct FitExtentProjector {
    bounds: geo::Rect,
    scale: f64,
    offset: geo::Coord,
}

impl FitExtentProjector {
    pub fn fit(bounds: geo::Rect, width: f64, height: f64, margin: f64) -> anyhow::Result<Self> {
        let available_width = width - 2.0 * margin;
        let available_height = height - 2.0 * margin;
        ensure!(
            available_width > 0.0 && available_height > 0.0,
            "Viewport {}x{} leaves no room inside a margin of {}",
            width,
            height,
            margin
        );
        ensure!(
            bounds.width() > 0.0 || bounds.height() > 0.0,
            "Cannot fit an extent with no area"
        );
        let scale = [
            available_width / bounds.width(),
            available_height / bounds.height(),
        ]
        .into_iter()
        .filter(|scale| scale.is_finite())
        .fold(f64::INFINITY, f64::min);
        let offset = geo::Coord {
            x: margin + (available_width - bounds.width() * scale) / 2.0,
            y: margin + (available_height - bounds.height() * scale) / 2.0,
        };
        Ok(Self {
            bounds,
            scale,
            offset,
        })
    }

    pub fn fit_geometries<'a>(
        geometries: impl IntoIterator<Item = &'a geo::Geometry>,
        width: f64,
        height: f64,
        margin: f64,
    ) -> anyhow::Result<Self> {
        let bounds = bounds_of(geometries).ok_or_else(|| anyhow!("No geometry to fit"))?;
        Self::fit(bounds, width, height, margin)
    }

    pub fn bounds(&self) -> geo::Rect {
        self.bounds
    }
}

impl GeometryProjector for FitExtentProjector {
    fn project(&self, coord: geo::Coord) -> geo::Coord {
        geo::Coord {
            x: self.offset.x + (coord.x - self.bounds.min().x) * self.scale,
            y: self.offset.y + (self.bounds.max().y - coord.y) * self.scale,
        }
    }
}

/// Union of the bounding rectangles of all geometries.
pub fn bounds_of<'a>(geometries: impl IntoIterator<Item = &'a geo::Geometry>) -> Option<geo::Rect> {
    geometries
        .into_iter()
        .filter_map(|geometry| geometry.bounding_rect())
        .reduce(|a, b| {
            geo::Rect::new(
                geo::Coord {
                    x: a.min().x.min(b.min().x),
                    y: a.min().y.min(b.min().y),
                },
                geo::Coord {
                    x: a.max().x.max(b.max().x),
                    y: a.max().y.max(b.max().y),
                },
            )
        })
}

/// Meridians and parallels every `step` degrees over an extent snapped outwards to the step.
pub struct Graticule {
    pub outline: geo::Polygon,
    pub lines: Vec<geo::LineString>,
}

pub fn graticule(extent: geo::Rect, step: f64) -> anyhow::Result<Graticule> {
    ensure!(
        step.is_finite() && step > 0.0,
        "Graticule step must be positive, got {}",
        step
    );
    let snap_down = |value: f64, limit: f64| ((value / step).floor() * step).max(limit);
    let snap_up = |value: f64, limit: f64| ((value / step).ceil() * step).min(limit);
    let min = geo::Coord {
        x: snap_down(extent.min().x, -180.0),
        y: snap_down(extent.min().y, -90.0),
    };
    let max = geo::Coord {
        x: snap_up(extent.max().x, 180.0),
        y: snap_up(extent.max().y, 90.0),
    };

    let steps = |from: f64, to: f64| {
        let first = (from / step).ceil() as i64;
        let last = (to / step).floor() as i64;
        (first..=last).map(move |i| i as f64 * step)
    };
    let meridians = steps(min.x, max.x)
        .map(|lon| geo::LineString::from(vec![(lon, min.y), (lon, max.y)]));
    let parallels = steps(min.y, max.y)
        .map(|lat| geo::LineString::from(vec![(min.x, lat), (max.x, lat)]));

    Ok(Graticule {
        outline: geo::Rect::new(min, max).to_polygon(),
        lines: meridians.chain(parallels).collect(),
    })
}
