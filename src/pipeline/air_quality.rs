use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Deserialize;

use crate::geofile::errors::GeofileError;
use crate::geofile::feature::AttributeValue;
use crate::geofile::fieldsafe::sanitize_for_filegdb;
use crate::geofile::gdal_geofile::{
    read_features_from_geofile, write_features_to_geofile, GdalDriverType,
};
use crate::pipeline::format_elapsed;
use crate::raster::convert::convert_to_geotiff;
use crate::raster::sample::sample_raster_at_points;

/// One ESRI GRID folder to locate, convert, and sample. The sampled values
/// land on the schools as `{pollutant}_{year}`.
#[derive(Deserialize, Debug)]
pub struct GridSpec {
    pub folder_name: String,
    pub pollutant: String,
    pub year: String,
}

impl GridSpec {
    pub fn field_name(&self) -> String {
        format!("{}_{}", self.pollutant, self.year)
    }

    pub fn geotiff_name(&self) -> String {
        format!("{}.tif", self.field_name())
    }
}

/// Convert air-pollution ESRI GRID rasters to compressed GeoTIFFs, sample
/// them at school point locations, and write an updated FileGDB.
#[derive(Deserialize, Debug)]
pub struct AirQualityConfig {
    /// Folder tree searched for the ESRI GRID subfolders.
    pub grids_base_folder: PathBuf,
    /// Output folder for the GeoTIFFs.
    pub out_folder: PathBuf,
    pub schools_path: PathBuf,
    pub schools_layer: Option<String>,
    pub grids: Vec<GridSpec>,
    pub output_gdb_path: PathBuf,
    pub output_layer_name: String,
}

/// Walk `base_folder` and map each wanted directory name to its full path.
fn find_grid_folders(
    base_folder: &Path,
    wanted: &[&str],
) -> anyhow::Result<BTreeMap<String, PathBuf>> {
    fn walk(
        dir: &Path,
        wanted: &[&str],
        found: &mut BTreeMap<String, PathBuf>,
    ) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                if wanted.contains(&name) {
                    found.insert(name.to_string(), path.clone());
                }
            }
            walk(&path, wanted, found)?;
        }
        Ok(())
    }

    if !base_folder.exists() {
        return Err(GeofileError::InputNotFound {
            path: base_folder.to_path_buf(),
        }
        .into());
    }
    let mut found = BTreeMap::new();
    walk(base_folder, wanted, &mut found)?;
    Ok(found)
}

pub fn run(config: &AirQualityConfig) -> anyhow::Result<()> {
    let start = Instant::now();
    std::fs::create_dir_all(&config.out_folder)?;

    let wanted: Vec<&str> = config
        .grids
        .iter()
        .map(|grid| grid.folder_name.as_str())
        .collect();
    let found = find_grid_folders(&config.grids_base_folder, &wanted)?;
    for grid in &config.grids {
        if !found.contains_key(&grid.folder_name) {
            return Err(GeofileError::InputNotFound {
                path: config.grids_base_folder.join(&grid.folder_name),
            }
            .into());
        }
    }

    let mut geotiff_paths = BTreeMap::new();
    for grid in &config.grids {
        let output_path = config.out_folder.join(grid.geotiff_name());
        convert_to_geotiff(&found[&grid.folder_name], &output_path)?;
        geotiff_paths.insert(grid.folder_name.clone(), output_path);
    }

    let mut schools = read_features_from_geofile(
        &config.schools_path,
        config.schools_layer.as_deref(),
        &[],
    )?;

    for grid in &config.grids {
        let field_name = grid.field_name();
        let geotiff_path = &geotiff_paths[&grid.folder_name];
        log::info!("Sampling {:?} -> field {}", geotiff_path, field_name);
        let sampled = sample_raster_at_points(geotiff_path, &schools)?;
        for (feature, value) in schools.features.iter_mut().zip(sampled) {
            let value = match value {
                Some(v) => AttributeValue::Real(v),
                None => AttributeValue::Null,
            };
            feature.attributes.insert(field_name.clone(), value);
        }
    }

    // FileGDB field naming is strict; sanitize before handing to the driver.
    let sanitized = sanitize_for_filegdb(&schools);

    if config.output_gdb_path.exists() {
        log::warn!("Removing existing output {:?}", config.output_gdb_path);
        std::fs::remove_dir_all(&config.output_gdb_path)?;
    }
    write_features_to_geofile(
        &sanitized,
        &config.output_gdb_path,
        &config.output_layer_name,
        GdalDriverType::OpenFileGdb.name(),
    )?;

    log::info!("Saved updated output to: {:?}", config.output_gdb_path);
    log::info!("Total runtime: {}", format_elapsed(start.elapsed()));
    Ok(())
}
