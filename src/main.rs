extern crate log;
pub mod choropleth;
pub mod config;
pub mod data;
pub mod geofile;
pub mod pipeline;
pub mod render;
use crate::config::Config;
use anyhow::anyhow;
use clap::Parser;
use std::{fs::read_to_string, path::Path};

/// Render a choropleth map and a linked bar chart from a table and region geometry.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input config file.
    #[arg(short, long)]
    config_filepath: String,
}

fn try_main() -> anyhow::Result<()> {
    let args = Args::try_parse()?;
    if !Path::new(&args.config_filepath).exists() {
        return Err(anyhow!("Config file {} not found", &args.config_filepath));
    }
    let config_contents = read_to_string(&args.config_filepath)?;
    let config = Config::from_yaml(&config_contents)?;

    let outputs = pipeline::run(&config)?;
    log::info!(
        "Wrote {:?}, {:?} and {:?}",
        outputs.map_filepath,
        outputs.chart_filepath,
        outputs.geojson_filepath
    );
    Ok(())
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}
