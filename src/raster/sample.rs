use std::path::Path;

use anyhow::{anyhow, Context};
use geo::algorithm::centroid::Centroid;

use crate::crs::crs_utils::same_authority_code;
use crate::crs::reproject::reproject_features;
use crate::geofile::errors::GeofileError;
use crate::geofile::feature::FeatureCollection;

/// Sample band 1 of a raster at each feature's point location. Returns one
/// value per input feature, in order: None for features without geometry,
/// points outside the raster extent, and pixels equal to the declared nodata
/// value. Points are reprojected into the raster's CRS first when the CRSs
/// differ.
pub fn sample_raster_at_points(
    raster_path: &Path,
    points: &FeatureCollection,
) -> anyhow::Result<Vec<Option<f64>>> {
    if !raster_path.exists() {
        return Err(GeofileError::InputNotFound {
            path: raster_path.to_path_buf(),
        }
        .into());
    }
    let dataset = gdal::Dataset::open(raster_path)
        .with_context(|| format!("Opening raster {:?}", raster_path))?;
    let raster_crs = dataset.spatial_ref()?;

    let points = if same_authority_code(&points.spatial_ref, &raster_crs)? {
        points.clone()
    } else {
        reproject_features(points, &raster_crs)?
    };

    let geo_transform = dataset.geo_transform()?;
    if geo_transform[2] != 0.0 || geo_transform[4] != 0.0 {
        return Err(anyhow!(
            "Only north-up rasters are supported, got a rotated geotransform."
        ));
    }
    let (raster_width, raster_height) = dataset.raster_size();
    let band = dataset.rasterband(1)?;
    let nodata = band.no_data_value();

    let mut values = Vec::with_capacity(points.len());
    for feature in &points.features {
        let location = feature
            .geometry
            .as_ref()
            .and_then(|geometry| geometry.centroid());
        let Some(location) = location else {
            values.push(None);
            continue;
        };
        let column = ((location.x() - geo_transform[0]) / geo_transform[1]).floor();
        let row = ((location.y() - geo_transform[3]) / geo_transform[5]).floor();
        if column < 0.0
            || row < 0.0
            || column >= raster_width as f64
            || row >= raster_height as f64
        {
            values.push(None);
            continue;
        }
        let buffer = band.read_as::<f64>((column as isize, row as isize), (1, 1), (1, 1), None)?;
        let value = buffer.data[0];
        let is_nodata = value.is_nan() || nodata.map(|nodata| value == nodata).unwrap_or(false);
        values.push(if is_nodata { None } else { Some(value) });
    }
    Ok(values)
}
