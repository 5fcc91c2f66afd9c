pub mod errors;
pub mod feature;
pub mod fieldsafe;
pub mod gdal_geofile;
pub mod geojson;
