use geojson::JsonObject;

/// A region read from the geometry source. `properties` holds whatever metadata the source
/// carried alongside the geometry.
#[derive(Debug, Clone)]
pub struct GeoFeature {
    pub key: String,
    pub geometry: geo::Geometry,
    pub properties: JsonObject,
}

impl GeoFeature {
    pub fn new(key: &str, geometry: geo::Geometry) -> Self {
        Self {
            key: key.to_string(),
            geometry,
            properties: JsonObject::new(),
        }
    }
}
