use std::{
    fs::{self, File},
    io::BufWriter,
    path::PathBuf,
};

use anyhow::Context;

use crate::{
    choropleth::join::join,
    config::Config,
    data::record::{read_records_from_csv, AttributeRecord},
    geofile::{
        feature::GeoFeature,
        geojson::{
            read_features_from_geojson, read_geometries_from_geojson,
            write_enriched_features_to_geojson,
        },
    },
    render::{
        coordinator::{RenderCoordinator, Session},
        projector::{graticule, FitExtentProjector},
        svg::{SvgChartPanel, SvgMapPanel},
    },
};

/// Fully materialized external data for one session.
pub struct Inputs {
    pub records: Vec<AttributeRecord>,
    pub features: Vec<GeoFeature>,
    pub backdrop: Vec<geo::Geometry>,
}

/// Load the tabular and geometry sources concurrently and wait for all of them. Any failure
/// aborts the whole load.
pub fn load_inputs(config: &Config) -> anyhow::Result<Inputs> {
    let (records, (features, backdrop)) = rayon::join(
        || {
            read_records_from_csv(&config.tabular_path, &config.join.key_column)
                .context("Loading tabular data")
        },
        || {
            rayon::join(
                || {
                    read_features_from_geojson(&config.geometry_path, &config.join.key_property)
                        .context("Loading region geometry")
                },
                || match &config.backdrop_path {
                    Some(path) => {
                        read_geometries_from_geojson(path).context("Loading backdrop geometry")
                    }
                    None => Ok(Vec::new()),
                },
            )
        },
    );
    let inputs = Inputs {
        records: records?,
        features: features?,
        backdrop: backdrop?,
    };
    log::info!(
        "Read {} records, {} features and {} backdrop geometries",
        inputs.records.len(),
        inputs.features.len(),
        inputs.backdrop.len()
    );
    Ok(inputs)
}

/// Join and classify the loaded data.
pub fn build_session(config: &Config, inputs: &Inputs) -> anyhow::Result<Session> {
    let enriched = join(&inputs.features, &inputs.records, &config.join.attributes);
    Session::new(
        enriched,
        &config.expressed_attribute,
        &config.classification,
    )
}

pub struct Outputs {
    pub map_filepath: PathBuf,
    pub chart_filepath: PathBuf,
    pub geojson_filepath: PathBuf,
}

/// Draw both panels from the session and dump the enriched features next to them.
pub fn render_session(
    config: &Config,
    session: &Session,
    backdrop: &[geo::Geometry],
) -> anyhow::Result<Outputs> {
    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Creating output directory {:?}", config.output_dir))?;
    let outputs = Outputs {
        map_filepath: config.output_dir.join("map.svg"),
        chart_filepath: config.output_dir.join("chart.svg"),
        geojson_filepath: config.output_dir.join("enriched.geojson"),
    };
    let coordinator = RenderCoordinator::new(session);

    let projector = FitExtentProjector::fit_geometries(
        session
            .features()
            .iter()
            .map(|feature| &feature.geometry)
            .chain(backdrop),
        config.map.width,
        config.map.height,
        config.map.margin,
    )?;
    let graticule = match config.map.graticule_step {
        Some(step) => Some(graticule(projector.bounds(), step)?),
        None => None,
    };
    log::info!("Writing map to {:?}", outputs.map_filepath);
    let mut map_panel = SvgMapPanel::new(
        BufWriter::new(
            File::create(&outputs.map_filepath)
                .with_context(|| format!("Creating {:?}", outputs.map_filepath))?,
        ),
        config.map.width,
        config.map.height,
    );
    coordinator.render_map(&mut map_panel, &projector, backdrop, graticule.as_ref())?;

    log::info!("Writing chart to {:?}", outputs.chart_filepath);
    let mut chart_panel = SvgChartPanel::new(BufWriter::new(
        File::create(&outputs.chart_filepath)
            .with_context(|| format!("Creating {:?}", outputs.chart_filepath))?,
    ));
    coordinator.render_chart(&mut chart_panel, &config.chart)?;

    log::info!(
        "Writing enriched features to {:?}",
        outputs.geojson_filepath
    );
    write_enriched_features_to_geojson(
        session.features(),
        session.encoder(),
        session.attribute(),
        &outputs.geojson_filepath,
    )?;
    Ok(outputs)
}

pub fn run(config: &Config) -> anyhow::Result<Outputs> {
    let inputs = load_inputs(config)?;
    let session = build_session(config, &inputs)?;
    render_session(config, &session, &inputs.backdrop)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rstest::rstest;
    use testdir::testdir;

    use crate::config::Config;

    use super::{load_inputs, run};

    const PROVINCES: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {"name": "A"},
         "geometry": {"type": "Polygon", "coordinates": [[[100, 30], [101, 30], [101, 31], [100, 30]]]}},
        {"type": "Feature", "properties": {"name": "B"},
         "geometry": {"type": "Polygon", "coordinates": [[[101, 30], [102, 30], [102, 31], [101, 30]]]}},
        {"type": "Feature", "properties": {"name": "C"},
         "geometry": {"type": "Polygon", "coordinates": [[[102, 30], [103, 30], [103, 31], [102, 30]]]}}
    ]}"#;

    const ASIA: &str = r#"{"type": "Polygon",
        "coordinates": [[[95, 25], [110, 25], [110, 40], [95, 25]]]}"#;

    const TABLE: &str = "name,2000,2009\nA,1,5\nC,20,50\nD,3,4\n";

    fn write_config(dir: &std::path::Path, tabular: &str) -> Config {
        fs::write(dir.join("table.csv"), tabular).unwrap();
        fs::write(dir.join("provinces.geojson"), PROVINCES).unwrap();
        fs::write(dir.join("asia.geojson"), ASIA).unwrap();
        let contents = format!(
            r##"
tabular_path: {dir}/table.csv
geometry_path: {dir}/provinces.geojson
backdrop_path: {dir}/asia.geojson
output_dir: {dir}/out
join:
  attributes: ["2000", "2009"]
expressed_attribute: "2009"
classification:
  method:
    type: natural_breaks
    classes: 2
  palette: ["#fee5d9", "#a50f15"]
chart:
  domain: [0, 100]
  annotate: true
"##,
            dir = dir.display()
        );
        Config::from_yaml(&contents).unwrap()
    }

    #[rstest]
    fn test_run() {
        let dir = testdir!();
        let config = write_config(&dir, TABLE);

        let outputs = run(&config).unwrap();

        let map = fs::read_to_string(&outputs.map_filepath).unwrap();
        assert!(map.contains(r#"id="A""#));
        assert!(map.contains(r#"id="B""#));
        assert!(map.contains("fill:#fee5d9"));
        assert!(map.contains("fill:#a50f15"));
        assert!(map.contains("fill:#cccccc"));
        assert!(map.contains("backgroundCountry"));
        assert!(map.contains("gratLines"));

        let chart = fs::read_to_string(&outputs.chart_filepath).unwrap();
        let b = chart.find(r#"class="bars B""#).unwrap();
        let a = chart.find(r#"class="bars A""#).unwrap();
        let c = chart.find(r#"class="bars C""#).unwrap();
        assert!(b < a && a < c);
        assert!(!chart.contains("bars D"));

        assert!(outputs.geojson_filepath.exists());
    }

    #[rstest]
    fn test_load_failure_aborts_before_output() {
        let dir = testdir!();
        let config = write_config(&dir, TABLE);
        fs::remove_file(dir.join("provinces.geojson")).unwrap();

        assert!(load_inputs(&config).is_err());
        assert!(run(&config).is_err());
        assert!(!dir.join("out").exists());
    }
}
