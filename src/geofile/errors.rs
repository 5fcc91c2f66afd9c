use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or writing geofiles. All are fatal to the
/// running batch job; the jobs are re-run manually once the reported
/// condition is fixed.
#[derive(Debug, Error)]
pub enum GeofileError {
    #[error("Input not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Layer '{layer}' not found in {path}")]
    LayerNotFound { layer: String, path: PathBuf },

    #[error("Missing required field '{field}' in {path}")]
    MissingField { field: String, path: PathBuf },

    #[error("No geometry column in {path}")]
    MissingGeometry { path: PathBuf },

    #[error("Layer in {path} has no declared coordinate reference system")]
    MissingCrs { path: PathBuf },

    #[error("No capable GDAL driver '{driver}' in this GDAL build")]
    NoCapableDriver { driver: String },
}
