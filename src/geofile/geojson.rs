use std::{collections::HashSet, fs, path::Path};

use anyhow::{anyhow, Context};

use crate::choropleth::{
    color::ColorEncoder,
    join::{EnrichedFeature, Measure},
};

use super::feature::GeoFeature;

fn parse_geojson(contents: &str) -> anyhow::Result<Vec<geojson::Feature>> {
    match contents.parse::<geojson::GeoJson>()? {
        geojson::GeoJson::FeatureCollection(collection) => Ok(collection.features),
        geojson::GeoJson::Feature(feature) => Ok(vec![feature]),
        geojson::GeoJson::Geometry(geometry) => Ok(vec![geojson::Feature::from(geometry)]),
    }
}

fn to_geo_geometry(feature: &geojson::Feature) -> anyhow::Result<geo::Geometry> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| anyhow!("Feature has no geometry"))?;
    geo::Geometry::<f64>::try_from(geometry.value.clone())
        .map_err(|err| anyhow!("Could not convert geometry, {}", err))
}

/// Decode the regions of a GeoJSON document. Each feature must carry a unique join key in
/// `key_property`; numeric keys are accepted and read as their decimal text.
pub fn parse_features(contents: &str, key_property: &str) -> anyhow::Result<Vec<GeoFeature>> {
    let features: Vec<GeoFeature> = parse_geojson(contents)?
        .into_iter()
        .enumerate()
        .map(|(index, feature)| {
            let geometry = to_geo_geometry(&feature)
                .with_context(|| format!("Reading feature {}", index))?;
            let properties = feature.properties.unwrap_or_default();
            let key = match properties.get(key_property) {
                Some(geojson::JsonValue::String(key)) => key.clone(),
                Some(geojson::JsonValue::Number(key)) => key.to_string(),
                _ => {
                    return Err(anyhow!(
                        "Feature {} has no '{}' property to join on",
                        index,
                        key_property
                    ))
                }
            };
            Ok(GeoFeature {
                key,
                geometry,
                properties,
            })
        })
        .collect::<anyhow::Result<_>>()?;

    let mut keys = HashSet::new();
    for feature in &features {
        if !keys.insert(feature.key.as_str()) {
            return Err(anyhow!(
                "Several features share the '{}' value '{}'",
                key_property,
                feature.key
            ));
        }
    }
    Ok(features)
}

pub fn read_features_from_geojson(
    filepath: &Path,
    key_property: &str,
) -> anyhow::Result<Vec<GeoFeature>> {
    let contents = fs::read_to_string(filepath)
        .with_context(|| format!("Reading geometry file {:?}", filepath))?;
    parse_features(&contents, key_property)
        .with_context(|| format!("Decoding geometry file {:?}", filepath))
}

/// Read every geometry of a GeoJSON document, ignoring properties.
pub fn read_geometries_from_geojson(filepath: &Path) -> anyhow::Result<Vec<geo::Geometry>> {
    let contents = fs::read_to_string(filepath)
        .with_context(|| format!("Reading backdrop file {:?}", filepath))?;
    parse_geojson(&contents)
        .and_then(|features| features.iter().map(to_geo_geometry).collect())
        .with_context(|| format!("Decoding backdrop file {:?}", filepath))
}

/// Write the joined features with their measures and assigned fill color. Invalid measures are
/// written as `null`, attributes that were never joined are left out.
pub fn write_enriched_features_to_geojson(
    features: &[EnrichedFeature],
    encoder: &ColorEncoder,
    attribute: &str,
    output_filepath: &Path,
) -> anyhow::Result<()> {
    let feature_collection: geojson::FeatureCollection = features
        .iter()
        .map(|feature| {
            let mut properties = feature.properties.clone();
            for (name, measure) in feature.measures() {
                let value = match measure {
                    Measure::Value(value) => geojson::JsonValue::from(*value),
                    Measure::Invalid => geojson::JsonValue::Null,
                };
                properties.insert(name.clone(), value);
            }
            properties.insert(
                "fill".to_string(),
                geojson::JsonValue::from(encoder.color(feature.value(attribute)).to_string()),
            );
            geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(
                    &feature.geometry,
                ))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();
    let geojson_contents = geojson::GeoJson::from(feature_collection);
    fs::write(output_filepath, geojson_contents.to_string())
        .with_context(|| format!("Writing enriched features to {:?}", output_filepath))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use testdir::testdir;

    use crate::{
        choropleth::{
            classify::ClassBreakpoints,
            color::{Color, ColorEncoder},
            join::join,
        },
        data::record::AttributeRecord,
    };

    use super::{parse_features, write_enriched_features_to_geojson};

    const PROVINCES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"name": "A", "adcode": 11},
                "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}
            },
            {
                "type": "Feature",
                "properties": {"name": "B"},
                "geometry": {"type": "MultiPolygon", "coordinates": [[[[2, 2], [3, 2], [3, 3], [2, 2]]]]}
            }
        ]
    }"#;

    #[rstest]
    fn test_parse_features() {
        let features = parse_features(PROVINCES, "name").unwrap();

        assert_eq!(2, features.len());
        assert_eq!("A", features[0].key);
        assert!(matches!(features[0].geometry, geo::Geometry::Polygon(_)));
        assert_eq!(
            Some(&geojson::JsonValue::from(11)),
            features[0].properties.get("adcode")
        );
        assert_eq!("B", features[1].key);
        assert!(matches!(features[1].geometry, geo::Geometry::MultiPolygon(_)));
    }

    #[rstest]
    fn test_parse_features_missing_key() {
        // The second feature has no adcode.
        assert!(parse_features(PROVINCES, "adcode").is_err());
    }

    #[rstest]
    fn test_parse_features_duplicate_key() {
        let contents = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"name": "A"},
             "geometry": {"type": "Point", "coordinates": [0, 0]}},
            {"type": "Feature", "properties": {"name": "A"},
             "geometry": {"type": "Point", "coordinates": [1, 1]}},
            {"type": "Feature", "properties": {"name": "B"},
             "geometry": {"type": "Point", "coordinates": [2, 2]}}
        ]}"#;
        let err = parse_features(contents, "name").unwrap_err();
        assert!(err.to_string().contains("'A'"));
    }

    #[rstest]
    fn test_parse_features_numeric_key() {
        let contents = r#"{"type": "Feature", "properties": {"adcode": 110000},
            "geometry": {"type": "Point", "coordinates": [116.4, 39.9]}}"#;
        let features = parse_features(contents, "adcode").unwrap();
        assert_eq!("110000", features[0].key);
    }

    #[rstest]
    fn test_write_enriched_features() {
        let features = parse_features(PROVINCES, "name").unwrap();
        let records = vec![AttributeRecord::new("A", &[("2009", "12"), ("2000", "x")])];
        let attributes = vec!["2000".to_string(), "2009".to_string()];
        let enriched = join(&features, &records, &attributes);
        let encoder = ColorEncoder::new(
            ClassBreakpoints::new(vec![10.0]).unwrap(),
            vec![Color::rgb(1, 1, 1), Color::rgb(2, 2, 2)],
            Color::rgb(0xcc, 0xcc, 0xcc),
        )
        .unwrap();

        let output_filepath = testdir!().join("enriched.geojson");
        write_enriched_features_to_geojson(&enriched, &encoder, "2009", &output_filepath)
            .unwrap();

        let contents = std::fs::read_to_string(&output_filepath).unwrap();
        let document: geojson::GeoJson = contents.parse().unwrap();
        let collection = match document {
            geojson::GeoJson::FeatureCollection(collection) => collection,
            _ => panic!("Expected a feature collection"),
        };
        let first = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(Some(&geojson::JsonValue::from(12.0)), first.get("2009"));
        assert_eq!(Some(&geojson::JsonValue::Null), first.get("2000"));
        assert_eq!(Some(&geojson::JsonValue::from("#020202")), first.get("fill"));
        let second = collection.features[1].properties.as_ref().unwrap();
        assert_eq!(None, second.get("2009"));
        assert_eq!(Some(&geojson::JsonValue::from("#cccccc")), second.get("fill"));
    }
}
