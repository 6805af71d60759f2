use std::path::PathBuf;

use anyhow::ensure;
use serde::Deserialize;

use crate::choropleth::color::Color;

#[derive(Deserialize, Debug, Clone)]
pub struct JoinConfig {
    /// Column of the tabular source holding the join key.
    #[serde(default = "default_key_name")]
    pub key_column: String,
    /// Property of the geometry features holding the join key.
    #[serde(default = "default_key_name")]
    pub key_property: String,
    /// Numeric columns copied onto matching features.
    pub attributes: Vec<String>,
}

fn default_key_name() -> String {
    "name".to_string()
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClassificationMethod {
    NaturalBreaks { classes: usize },
    Manual { breakpoints: Vec<f64> },
}

impl ClassificationMethod {
    pub fn class_count(&self) -> usize {
        match self {
            ClassificationMethod::NaturalBreaks { classes } => *classes,
            ClassificationMethod::Manual { breakpoints } => breakpoints.len() + 1,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ClassificationConfig {
    pub method: ClassificationMethod,
    /// Lightest to darkest, one color per class.
    pub palette: Vec<Color>,
    #[serde(default = "default_no_data_color")]
    pub no_data_color: Color,
}

fn default_no_data_color() -> Color {
    Color::rgb(0xcc, 0xcc, 0xcc)
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
    /// Graticule spacing in degrees, no graticule when absent.
    pub graticule_step: Option<f64>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 960.0,
            height: 850.0,
            margin: 10.0,
            graticule_step: Some(10.0),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ChartConfig {
    /// Value range mapped linearly onto the bar heights.
    pub domain: [f64; 2],
    #[serde(default = "default_chart_width")]
    pub width: f64,
    #[serde(default = "default_chart_height")]
    pub height: f64,
    #[serde(default = "default_left_padding")]
    pub left_padding: f64,
    #[serde(default = "default_right_padding")]
    pub right_padding: f64,
    #[serde(default = "default_top_bottom_padding")]
    pub top_bottom_padding: f64,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_tick_count")]
    pub tick_count: usize,
    /// Print each bar's value above it.
    #[serde(default)]
    pub annotate: bool,
}

fn default_chart_width() -> f64 {
    600.0
}

fn default_chart_height() -> f64 {
    500.0
}

fn default_left_padding() -> f64 {
    10.0
}

fn default_right_padding() -> f64 {
    2.0
}

fn default_top_bottom_padding() -> f64 {
    5.0
}

fn default_tick_count() -> usize {
    10
}

impl ChartConfig {
    pub fn inner_width(&self) -> f64 {
        self.width - self.left_padding - self.right_padding
    }

    pub fn inner_height(&self) -> f64 {
        self.height - self.top_bottom_padding * 2.0
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub tabular_path: PathBuf,
    pub geometry_path: PathBuf,
    /// Unclassified outline drawn beneath the regions.
    #[serde(default)]
    pub backdrop_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub join: JoinConfig,
    /// The attribute that is classified, colored and charted.
    pub expressed_attribute: String,
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub map: MapConfig,
    pub chart: ChartConfig,
}

impl Config {
    pub fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.join.attributes.contains(&self.expressed_attribute),
            "Expressed attribute '{}' is not one of the joined attributes {:?}",
            self.expressed_attribute,
            self.join.attributes
        );

        let classification = &self.classification;
        ensure!(
            classification.method.class_count() > 0,
            "Classification needs at least one class"
        );
        ensure!(
            classification.palette.len() == classification.method.class_count(),
            "Palette has {} colors for {} classes",
            classification.palette.len(),
            classification.method.class_count()
        );
        ensure!(
            !classification
                .palette
                .contains(&classification.no_data_color),
            "No-data color {} must differ from every palette color",
            classification.no_data_color
        );

        ensure!(
            self.map.width > 0.0 && self.map.height > 0.0,
            "Map size must be positive"
        );

        let chart = &self.chart;
        ensure!(
            chart.domain.iter().all(|bound| bound.is_finite()) && chart.domain[0] < chart.domain[1],
            "Chart domain {:?} must be an increasing pair of finite values",
            chart.domain
        );
        ensure!(
            chart.inner_width() > 0.0 && chart.inner_height() > 0.0,
            "Chart paddings leave no room for bars"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use rstest::rstest;

    use crate::choropleth::color::Color;

    use super::{ClassificationMethod, Config};

    const CONFIG: &str = r##"
tabular_path: data/tour.csv
geometry_path: data/provinces.geojson
backdrop_path: data/asia.geojson
output_dir: out
join:
  attributes: ["2000", "2009"]
expressed_attribute: "2009"
classification:
  method:
    type: natural_breaks
    classes: 5
  palette: ["#fee5d9", "#fcae91", "#fb6a4a", "#de2d26", "#a50f15"]
chart:
  domain: [400, 40367]
  title: GDP of 2009 in each region
"##;

    #[rstest]
    fn test_parse_config() {
        let config = Config::from_yaml(CONFIG).unwrap();

        assert_eq!(PathBuf::from("data/tour.csv"), config.tabular_path);
        assert_eq!(Some(PathBuf::from("data/asia.geojson")), config.backdrop_path);
        assert_eq!("name", config.join.key_column);
        assert_eq!("name", config.join.key_property);
        assert_eq!(
            ClassificationMethod::NaturalBreaks { classes: 5 },
            config.classification.method
        );
        assert_eq!(Color::rgb(0xcc, 0xcc, 0xcc), config.classification.no_data_color);
        assert_eq!(Some(10.0), config.map.graticule_step);
        assert_eq!(500.0, config.chart.height);
        assert_eq!(490.0, config.chart.inner_height());
        assert_eq!(588.0, config.chart.inner_width());
        assert!(!config.chart.annotate);
    }

    #[rstest]
    fn test_parse_manual_classification() {
        let contents = CONFIG.replace(
            "    type: natural_breaks\n    classes: 5",
            "    type: manual\n    breakpoints: [2000, 5000, 10000, 20000]",
        );
        let config = Config::from_yaml(&contents).unwrap();
        assert_eq!(5, config.classification.method.class_count());
    }

    #[rstest]
    #[case("expressed_attribute: \"2009\"", "expressed_attribute: \"2010\"")]
    #[case("classes: 5", "classes: 4")]
    #[case("classes: 5", "classes: 0")]
    #[case("domain: [400, 40367]", "domain: [400, 400]")]
    #[case(
        "  title: GDP of 2009 in each region",
        "  title: x\n  height: 10\n  top_bottom_padding: 5"
    )]
    #[case(
        "  palette:",
        "  no_data_color: \"#fee5d9\"\n  palette:"
    )]
    #[case("\"#fb6a4a\"", "\"fb6a4a\"")]
    fn test_invalid_config(#[case] from: &str, #[case] to: &str) {
        let contents = CONFIG.replace(from, to);
        assert_ne!(CONFIG, contents);
        assert!(Config::from_yaml(&contents).is_err());
    }
}
