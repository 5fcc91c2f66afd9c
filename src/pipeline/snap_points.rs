use std::path::PathBuf;
use std::time::Instant;

use serde::Deserialize;

use crate::geofile::gdal_geofile::read_features_from_geofile;
use crate::geofile::geojson::write_features_to_geojson;
use crate::geometry::snap::snap_points_by_group;
use crate::pipeline::format_elapsed;

/// Snap all points sharing the same building code to one shared coordinate
/// and rewrite the lat/lng fields to match.
#[derive(Deserialize, Debug)]
pub struct SnapPointsConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub group_field: String,
    pub lat_field: String,
    pub lng_field: String,
}

pub fn run(config: &SnapPointsConfig) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut collection = read_features_from_geofile(
        &config.input_path,
        None,
        &[
            &config.group_field,
            &config.lat_field,
            &config.lng_field,
        ],
    )?;
    let rows_before = collection.len();

    let summary = snap_points_by_group(
        &mut collection,
        &config.group_field,
        &config.lat_field,
        &config.lng_field,
    )?;

    write_features_to_geojson(&collection, &config.output_path)?;

    log::info!("Rows before: {}", rows_before);
    log::info!("Rows after:  {}", collection.len());
    log::info!("Rows snapped: {}", summary.rows_snapped);
    log::info!("Unique {} snapped: {}", config.group_field, summary.groups_snapped);
    log::info!("Saved: {:?}", config.output_path);
    log::info!("Total runtime: {}", format_elapsed(start.elapsed()));
    Ok(())
}
