use std::path::Path;

use anyhow::Context;
use gdal::raster::RasterCreationOption;

use crate::geofile::errors::GeofileError;

/// Convert any GDAL-readable raster (ESRI GRID folders included, which GDAL
/// opens by directory path) to a losslessly compressed, tiled GeoTIFF.
/// Floating-point bands get predictor 3, integer bands predictor 2.
pub fn convert_to_geotiff(input_path: &Path, output_path: &Path) -> anyhow::Result<()> {
    if !input_path.exists() {
        return Err(GeofileError::InputNotFound {
            path: input_path.to_path_buf(),
        }
        .into());
    }
    let dataset = gdal::Dataset::open(input_path)
        .with_context(|| format!("Opening raster {:?}", input_path))?;
    let band = dataset.rasterband(1)?;
    let predictor = if band_type_is_float(band.band_type()) {
        "3"
    } else {
        "2"
    };

    let driver = gdal::DriverManager::get_driver_by_name("GTiff").map_err(|_| {
        GeofileError::NoCapableDriver {
            driver: "GTiff".to_string(),
        }
    })?;
    let creation_options = [
        RasterCreationOption {
            key: "COMPRESS",
            value: "DEFLATE",
        },
        RasterCreationOption {
            key: "ZLEVEL",
            value: "9",
        },
        RasterCreationOption {
            key: "PREDICTOR",
            value: predictor,
        },
        RasterCreationOption {
            key: "TILED",
            value: "YES",
        },
        RasterCreationOption {
            key: "BIGTIFF",
            value: "IF_SAFER",
        },
    ];
    log::info!("Converting {:?} -> {:?}", input_path, output_path);
    dataset
        .create_copy(&driver, output_path, &creation_options)
        .with_context(|| format!("Creating GeoTIFF {:?}", output_path))?;
    Ok(())
}

fn band_type_is_float(band_type: gdal_sys::GDALDataType::Type) -> bool {
    band_type == gdal_sys::GDALDataType::GDT_Float32
        || band_type == gdal_sys::GDALDataType::GDT_Float64
}
