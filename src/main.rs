pub mod crs;
pub mod dashboard;
pub mod geofile;
pub mod geometry;
pub mod join;
pub mod pipeline;
pub mod raster;

use std::fs::read_to_string;
use std::path::Path;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;

use crate::pipeline::air_quality::AirQualityConfig;
use crate::pipeline::hazard_metrics::HazardMetricsConfig;
use crate::pipeline::snap_points::SnapPointsConfig;
use crate::pipeline::stormwater::StormwaterConfig;

/// Geospatial preparation jobs for the NYC school hazard-exposure map.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Join stormwater flood polygons onto buffered school points.
    StormwaterJoin {
        /// Path to the input config file.
        #[arg(short, long)]
        config_filepath: String,
    },
    /// Attach hazard-zone categories and nearest-facility distances to schools.
    HazardMetrics {
        /// Path to the input config file.
        #[arg(short, long)]
        config_filepath: String,
    },
    /// Convert air-pollution rasters and sample them at school locations.
    AirQuality {
        /// Path to the input config file.
        #[arg(short, long)]
        config_filepath: String,
    },
    /// Snap points sharing a building code to one shared coordinate.
    SnapPoints {
        /// Path to the input config file.
        #[arg(short, long)]
        config_filepath: String,
    },
}

fn load_config<T: DeserializeOwned>(config_filepath: &str) -> anyhow::Result<T> {
    if !Path::new(config_filepath).exists() {
        return Err(anyhow!("Config file {} not found", config_filepath));
    }
    let config_contents = read_to_string(config_filepath)?;
    Ok(serde_yaml::from_str(&config_contents)?)
}

fn try_main() -> anyhow::Result<()> {
    let args = Args::try_parse()?;
    match args.command {
        Command::StormwaterJoin { config_filepath } => {
            let config: StormwaterConfig = load_config(&config_filepath)?;
            pipeline::stormwater::run(&config)
        }
        Command::HazardMetrics { config_filepath } => {
            let config: HazardMetricsConfig = load_config(&config_filepath)?;
            pipeline::hazard_metrics::run(&config)
        }
        Command::AirQuality { config_filepath } => {
            let config: AirQualityConfig = load_config(&config_filepath)?;
            pipeline::air_quality::run(&config)
        }
        Command::SnapPoints { config_filepath } => {
            let config: SnapPointsConfig = load_config(&config_filepath)?;
            pipeline::snap_points::run(&config)
        }
    }
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
