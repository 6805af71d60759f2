use std::collections::{HashMap, HashSet};

use geojson::JsonObject;

use crate::{data::record::AttributeRecord, geofile::feature::GeoFeature};

/// A joined numeric attribute. `Invalid` marks a matched record whose raw value could not be read
/// as a finite number; an attribute that was never joined is simply absent from the feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measure {
    Value(f64),
    Invalid,
}

impl Measure {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Measure::Value(value),
            _ => Measure::Invalid,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Measure::Value(value) => Some(*value),
            Measure::Invalid => None,
        }
    }
}

/// A GeoFeature extended with the numeric attributes of its matching record.
#[derive(Debug, Clone)]
pub struct EnrichedFeature {
    pub key: String,
    pub geometry: geo::Geometry,
    pub properties: JsonObject,
    measures: HashMap<String, Measure>,
}

impl From<GeoFeature> for EnrichedFeature {
    fn from(feature: GeoFeature) -> Self {
        Self {
            key: feature.key,
            geometry: feature.geometry,
            properties: feature.properties,
            measures: HashMap::new(),
        }
    }
}

impl EnrichedFeature {
    pub fn measure(&self, attribute: &str) -> Option<Measure> {
        self.measures.get(attribute).copied()
    }

    /// The attribute's value, or `None` for both the unmatched and the invalid state.
    pub fn value(&self, attribute: &str) -> Option<f64> {
        self.measure(attribute).and_then(|measure| measure.value())
    }

    pub fn measures(&self) -> &HashMap<String, Measure> {
        &self.measures
    }

    pub fn set_measure(&mut self, attribute: &str, measure: Measure) {
        self.measures.insert(attribute.to_string(), measure);
    }
}

/// Join tabular records onto geometry features by exact, case-sensitive key equality.
///
/// Every feature is returned, in input order. Features without a matching record carry no
/// measures. When several records share a key they are applied in record order, so for each
/// attribute the last record wins.
pub fn join(
    features: &[GeoFeature],
    records: &[AttributeRecord],
    attribute_names: &[String],
) -> Vec<EnrichedFeature> {
    let mut records_by_key: HashMap<&str, Vec<&AttributeRecord>> = HashMap::new();
    for record in records {
        records_by_key.entry(&record.key).or_default().push(record);
    }
    for (key, matching) in &records_by_key {
        if matching.len() > 1 {
            log::warn!(
                "{} records share the key '{}', later values overwrite earlier ones",
                matching.len(),
                key
            );
        }
    }

    let mut feature_keys: HashSet<&str> = HashSet::new();
    for feature in features {
        if !feature_keys.insert(&feature.key) {
            log::warn!("Several features share the key '{}'", feature.key);
        }
    }

    let mut matched_keys: HashSet<&str> = HashSet::new();
    let enriched: Vec<EnrichedFeature> = features
        .iter()
        .map(|feature| {
            let mut enriched = EnrichedFeature::from(feature.clone());
            if let Some(matching) = records_by_key.get(feature.key.as_str()) {
                matched_keys.insert(&feature.key);
                for record in matching {
                    for attribute in attribute_names {
                        let measure = record
                            .get(attribute)
                            .map(Measure::parse)
                            .unwrap_or(Measure::Invalid);
                        if measure == Measure::Invalid {
                            log::warn!(
                                "Value of '{}' for '{}' is not a number",
                                attribute,
                                record.key
                            );
                        }
                        enriched.set_measure(attribute, measure);
                    }
                }
            }
            enriched
        })
        .collect();

    let unmatched_features = enriched
        .iter()
        .filter(|feature| feature.measures.is_empty())
        .count();
    if unmatched_features > 0 {
        log::warn!("{} features have no matching record", unmatched_features);
    }
    for key in records_by_key.keys() {
        if !matched_keys.contains(key) {
            log::warn!("Record '{}' matches no feature", key);
        }
    }
    log::info!(
        "Joined {} records onto {} features",
        records.len(),
        features.len()
    );
    enriched
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{data::record::AttributeRecord, geofile::feature::GeoFeature};

    use super::{join, Measure};

    fn feature(key: &str) -> GeoFeature {
        GeoFeature::new(key, geo::Geometry::Point(geo::Point::new(0.0, 0.0)))
    }

    fn attributes(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[rstest]
    fn test_join_keeps_unmatched_features() {
        let features = vec![feature("A"), feature("B")];
        let records = vec![AttributeRecord::new("A", &[("v", "10")])];

        let enriched = join(&features, &records, &attributes(&["v"]));

        assert_eq!(2, enriched.len());
        assert_eq!("A", enriched[0].key);
        assert_eq!(Some(10.0), enriched[0].value("v"));
        assert_eq!("B", enriched[1].key);
        assert_eq!(None, enriched[1].measure("v"));
        assert_eq!(None, enriched[1].value("v"));
    }

    #[rstest]
    #[case("12153", Measure::Value(12153.0))]
    #[case(" 7.5 ", Measure::Value(7.5))]
    #[case("-3e2", Measure::Value(-300.0))]
    #[case("", Measure::Invalid)]
    #[case("n/a", Measure::Invalid)]
    #[case("NaN", Measure::Invalid)]
    #[case("inf", Measure::Invalid)]
    fn test_measure_parse(#[case] raw: &str, #[case] expected: Measure) {
        assert_eq!(expected, Measure::parse(raw));
    }

    #[rstest]
    fn test_join_invalid_value_is_kept_as_invalid() {
        let features = vec![feature("A")];
        let records = vec![AttributeRecord::new("A", &[("2000", "x"), ("2009", "4")])];

        let enriched = join(&features, &records, &attributes(&["2000", "2009", "2010"]));

        assert_eq!(Some(Measure::Invalid), enriched[0].measure("2000"));
        assert_eq!(Some(Measure::Value(4.0)), enriched[0].measure("2009"));
        // Missing column on a matched record.
        assert_eq!(Some(Measure::Invalid), enriched[0].measure("2010"));
        assert_eq!(None, enriched[0].value("2000"));
    }

    #[rstest]
    fn test_join_is_case_sensitive() {
        let features = vec![feature("Beijing")];
        let records = vec![AttributeRecord::new("beijing", &[("v", "1")])];

        let enriched = join(&features, &records, &attributes(&["v"]));

        assert_eq!(None, enriched[0].measure("v"));
    }

    #[rstest]
    fn test_join_duplicate_keys_last_write_wins() {
        let features = vec![feature("A")];
        let records = vec![
            AttributeRecord::new("A", &[("x", "1"), ("y", "2")]),
            AttributeRecord::new("A", &[("x", "3"), ("y", "oops")]),
        ];

        let enriched = join(&features, &records, &attributes(&["x", "y"]));

        assert_eq!(Some(Measure::Value(3.0)), enriched[0].measure("x"));
        assert_eq!(Some(Measure::Invalid), enriched[0].measure("y"));
    }

    #[rstest]
    fn test_join_duplicate_feature_keys_are_not_merged() {
        let features = vec![feature("A"), feature("A"), feature("B")];
        let records = vec![
            AttributeRecord::new("A", &[("v", "1")]),
            AttributeRecord::new("B", &[("v", "9")]),
        ];

        let enriched = join(&features, &records, &attributes(&["v"]));

        let keys: Vec<&str> = enriched.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(vec!["A", "A", "B"], keys);
        assert_eq!(Some(1.0), enriched[1].value("v"));
    }

    #[rstest]
    fn test_join_preserves_order_and_properties() {
        let mut first = feature("C");
        first
            .properties
            .insert("adcode".to_string(), geojson::JsonValue::from(110000));
        let features = vec![first, feature("A"), feature("B")];
        let records = vec![
            AttributeRecord::new("B", &[("v", "2")]),
            AttributeRecord::new("C", &[("v", "3")]),
        ];

        let enriched = join(&features, &records, &attributes(&["v"]));

        let keys: Vec<&str> = enriched.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(vec!["C", "A", "B"], keys);
        assert_eq!(
            Some(&geojson::JsonValue::from(110000)),
            enriched[0].properties.get("adcode")
        );
        assert_eq!(Some(3.0), enriched[0].value("v"));
        // The source features are untouched.
        assert!(features.iter().all(|f| !f.properties.contains_key("v")));
    }
}
