use anyhow::{anyhow, Context};
use gdal::vector::LayerAccess;
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::{collections::BTreeMap, path::Path};

use super::errors::GeofileError;
use super::feature::{AttributeMap, AttributeValue, Feature, FeatureCollection};

pub enum GdalDriverType {
    GeoPackage,
    GeoJson,
    OpenFileGdb,
}

impl GdalDriverType {
    pub fn name(&self) -> &'static str {
        match self {
            GdalDriverType::GeoPackage => "GPKG",
            GdalDriverType::GeoJson => "GeoJSON",
            GdalDriverType::OpenFileGdb => "OpenFileGDB",
        }
    }
}

/// Read one layer of a vector geofile (GeoJSON, Shapefile, GeoPackage,
/// FileGDB) into a FeatureCollection.
///
/// # Arguments
/// * `layer_name` - layer to read. May be None for single-layer sources.
/// * `required_fields` - fields that must exist on the layer; the read fails
///   with `GeofileError::MissingField` on the first absent one.
pub fn read_features_from_geofile(
    filepath: &Path,
    layer_name: Option<&str>,
    required_fields: &[&str],
) -> anyhow::Result<FeatureCollection> {
    if !filepath.exists() {
        return Err(GeofileError::InputNotFound {
            path: filepath.to_path_buf(),
        }
        .into());
    }
    gdal::DriverManager::register_all();
    let mut open_options = gdal::DatasetOptions::default();
    open_options.open_flags = gdal::GdalOpenFlags::GDAL_OF_VECTOR;
    let dataset = gdal::Dataset::open_ex(filepath, open_options)
        .with_context(|| format!("Opening {:?}", filepath))?;

    let mut layer = match layer_name {
        Some(name) => dataset
            .layer_by_name(name)
            .map_err(|_| GeofileError::LayerNotFound {
                layer: name.to_string(),
                path: filepath.to_path_buf(),
            })?,
        None => {
            let layer_count = dataset.layer_count();
            if 1 != layer_count {
                return Err(anyhow!(
                    "Found {} layers in {:?}, specify the layer to read by name.",
                    layer_count,
                    filepath
                ));
            }
            dataset.layer(0)?
        }
    };

    if 0 == layer.defn().geom_fields().count() {
        return Err(GeofileError::MissingGeometry {
            path: filepath.to_path_buf(),
        }
        .into());
    }

    let spatial_ref = layer.spatial_ref().ok().ok_or_else(|| GeofileError::MissingCrs {
        path: filepath.to_path_buf(),
    })?;

    let layer_fields: Vec<String> = layer.defn().fields().map(|field| field.name()).collect();
    for required in required_fields {
        if !layer_fields.iter().any(|name| name == required) {
            return Err(GeofileError::MissingField {
                field: required.to_string(),
                path: filepath.to_path_buf(),
            }
            .into());
        }
    }

    let mut features = Vec::new();
    for gdal_feature in layer.features() {
        let geometry = match gdal_feature.geometry_by_index(0) {
            // Null geometries stay as features without geometry; the caller
            // decides whether to filter them.
            Ok(gdal_geometry) => match gdal_geometry.wkb() {
                Ok(wkb_bytes) => wkb::wkb_to_geom(&mut &wkb_bytes[..]).ok(),
                Err(_) => None,
            },
            Err(_) => None,
        };
        let mut attributes = AttributeMap::new();
        for (name, value) in gdal_feature.fields() {
            attributes.insert(name, field_value_to_attribute(value));
        }
        features.push(Feature::new(geometry, attributes));
    }
    log::info!("Read {} features from {:?}", features.len(), filepath);
    Ok(FeatureCollection::new(features, spatial_ref))
}

fn field_value_to_attribute(value: Option<gdal::vector::FieldValue>) -> AttributeValue {
    use gdal::vector::FieldValue::*;
    match value {
        Some(IntegerValue(v)) => AttributeValue::Integer(v as i64),
        Some(Integer64Value(v)) => AttributeValue::Integer(v),
        Some(RealValue(v)) => AttributeValue::Real(v),
        Some(StringValue(v)) => AttributeValue::Text(v),
        Some(other) => match other.into_string() {
            Some(text) => AttributeValue::Text(text),
            None => AttributeValue::Null,
        },
        None => AttributeValue::Null,
    }
}

/// Write a FeatureCollection to a vector geofile.
///
/// Field definitions are typed (Integer64/Real/String) based on the values
/// observed across all features. Null attribute values are written as OGR
/// nulls by omission.
pub fn write_features_to_geofile(
    collection: &FeatureCollection,
    output_filepath: &Path,
    layer_name: &str,
    driver: &str,
) -> anyhow::Result<()> {
    let driver_name = driver;
    let driver = gdal::DriverManager::get_driver_by_name(driver).map_err(|_| {
        GeofileError::NoCapableDriver {
            driver: driver_name.to_string(),
        }
    })?;

    if collection.is_empty() {
        return Ok(());
    }
    let layer_type = {
        use gdal::vector::OGRwkbGeometryType::*;
        let geometry = collection
            .features
            .iter()
            .find_map(|feature| feature.geometry.as_ref());
        match geometry {
            Some(geo::Geometry::Point(_)) => wkbPoint,
            Some(geo::Geometry::LineString(_)) => wkbLineString,
            Some(geo::Geometry::Polygon(_)) => wkbPolygon,
            Some(geo::Geometry::MultiPoint(_)) => wkbMultiPoint,
            Some(geo::Geometry::MultiLineString(_)) => wkbMultiLineString,
            Some(geo::Geometry::MultiPolygon(_)) => wkbMultiPolygon,
            Some(geometry) => {
                return Err(anyhow!("Cannot write geometry type {:?} to file.", {
                    geometry
                }))
            }
            None => wkbUnknown,
        }
    };

    let crs = collection.spatial_ref.clone();
    let crs_name = crs.name()?;
    log::debug!("Using spatial ref {} for writing geofile", crs_name);

    let mut dataset = driver
        .create_vector_only(output_filepath)
        .context("Creating output dataset")?;
    let layer_options = gdal::LayerOptions {
        name: layer_name,
        srs: Some(&crs),
        ty: layer_type,
        options: None,
    };

    let mut layer = dataset.create_layer(layer_options)?;

    // Create the fields based on all attributes of all features.
    log::info!("Setting up fields");
    let field_definitions = infer_field_definitions(collection);
    let field_definitions_ref: Vec<(&str, gdal::vector::OGRFieldType::Type)> = field_definitions
        .iter()
        .map(|(name, field_type)| (name as &str, *field_type))
        .collect();
    layer.create_defn_fields(&field_definitions_ref)?;

    log::info!(
        "Writing {} features to {:?}",
        collection.len(),
        output_filepath
    );
    unsafe {
        // Start a transaction in case the driver supports transactions, e.g. GeoPackage.
        // Committing all features once as opposed to per-feature is a massive speedup for these drivers.
        gdal_sys::OGR_L_StartTransaction(layer.c_layer());
    };
    let bar = ProgressBar::new(collection.len() as u64);
    for feature in &collection.features {
        let geometry = match &feature.geometry {
            Some(geo_geometry) => {
                let wkb = wkb::geom_to_wkb(geo_geometry)
                    .or_else(|err| Err(anyhow!("Could not write geometry to WKB, {:?}", err)))?;
                gdal::vector::Geometry::from_wkb(&wkb)?
            }
            None => gdal::vector::Geometry::empty(layer_type)?,
        };

        let mut field_names = Vec::new();
        let mut values = Vec::new();
        for (key, value) in &feature.attributes {
            if let Some(field_value) = attribute_to_field_value(value) {
                field_names.push(key as &str);
                values.push(field_value);
            }
        }
        if field_names.is_empty() {
            layer.create_feature(geometry)?;
        } else {
            layer.create_feature_fields(geometry, &field_names, &values)?;
        }

        bar.inc(1);
    }
    unsafe {
        // Commit the transaction in case the driver supports transactions.
        gdal_sys::OGR_L_CommitTransaction(layer.c_layer());
    };
    Ok(())
}

fn attribute_to_field_value(value: &AttributeValue) -> Option<gdal::vector::FieldValue> {
    match value {
        AttributeValue::Integer(v) => Some(gdal::vector::FieldValue::Integer64Value(*v)),
        AttributeValue::Real(v) => Some(gdal::vector::FieldValue::RealValue(*v)),
        AttributeValue::Text(v) => Some(gdal::vector::FieldValue::StringValue(v.clone())),
        AttributeValue::Null => None,
    }
}

/// One OGR field type per attribute name: Integer64 when every non-null value
/// is an integer, Real when all are numeric, String otherwise.
fn infer_field_definitions(
    collection: &FeatureCollection,
) -> Vec<(String, gdal::vector::OGRFieldType::Type)> {
    use gdal::vector::OGRFieldType::{OFTInteger64, OFTReal, OFTString};

    let field_names: Vec<String> = {
        let names: std::collections::HashSet<String> = collection
            .features
            .par_iter()
            .flat_map(|feature| {
                feature
                    .attributes
                    .keys()
                    .cloned()
                    .collect::<Vec<String>>()
            })
            .collect();
        let mut names: Vec<String> = names.into_iter().collect();
        names.sort();
        names
    };

    let mut types: BTreeMap<&String, gdal::vector::OGRFieldType::Type> = BTreeMap::new();
    for feature in &collection.features {
        for (name, value) in &feature.attributes {
            let observed = match value {
                AttributeValue::Integer(_) => OFTInteger64,
                AttributeValue::Real(_) => OFTReal,
                AttributeValue::Text(_) => OFTString,
                AttributeValue::Null => continue,
            };
            types
                .entry(name)
                .and_modify(|current| {
                    *current = match (*current, observed) {
                        (OFTInteger64, OFTInteger64) => OFTInteger64,
                        (OFTInteger64, OFTReal) | (OFTReal, OFTInteger64) | (OFTReal, OFTReal) => {
                            OFTReal
                        }
                        _ => OFTString,
                    }
                })
                .or_insert(observed);
        }
    }

    field_names
        .into_iter()
        .map(|name| {
            let field_type = types.get(&name).copied().unwrap_or(OFTString);
            (name, field_type)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use gdal::vector::LayerAccess;
    use rstest::rstest;
    use testdir::testdir;

    use crate::geofile::{
        feature::{AttributeMap, AttributeValue, Feature, FeatureCollection},
        gdal_geofile::{read_features_from_geofile, write_features_to_geofile, GdalDriverType},
    };

    fn sample_collection() -> FeatureCollection {
        let mut attributes = AttributeMap::new();
        attributes.insert("name".to_string(), AttributeValue::Text("PS 1".to_string()));
        attributes.insert("risk".to_string(), AttributeValue::Integer(2));
        attributes.insert("pm25_aa14".to_string(), AttributeValue::Real(7.25));
        let features = vec![Feature::new(
            Some(geo::Geometry::Point(geo::Point::new(-73.9, 40.7))),
            attributes,
        )];
        FeatureCollection::new(
            features,
            gdal::spatial_ref::SpatialRef::from_epsg(4326).unwrap(),
        )
    }

    #[rstest]
    fn test_geofile_write_read_round_trip() {
        let collection = sample_collection();
        let test_dir = testdir!();
        let geofile_filepath = test_dir.join("output.gpkg");

        write_features_to_geofile(
            &collection,
            &geofile_filepath,
            "schools",
            GdalDriverType::GeoPackage.name(),
        )
        .unwrap();
        let read_back =
            read_features_from_geofile(&geofile_filepath, Some("schools"), &["name", "risk"])
                .unwrap();
        assert_eq!(read_back.len(), 1);
        let feature = &read_back.features[0];
        assert_eq!(
            feature.attributes.get("name"),
            Some(&AttributeValue::Text("PS 1".to_string()))
        );
        assert_eq!(
            feature.attributes.get("risk"),
            Some(&AttributeValue::Integer(2))
        );
        assert!(feature.has_valid_geometry());
    }

    #[rstest]
    fn test_read_missing_file_is_input_not_found() {
        let err = read_features_from_geofile(
            std::path::Path::new("does/not/exist.geojson"),
            None,
            &[],
        )
        .unwrap_err();
        assert!(err.to_string().contains("Input not found"));
    }

    #[rstest]
    fn test_read_wrong_layer_name_is_layer_not_found() {
        let collection = sample_collection();
        let test_dir = testdir!();
        let geofile_filepath = test_dir.join("layers.gpkg");
        write_features_to_geofile(
            &collection,
            &geofile_filepath,
            "schools",
            GdalDriverType::GeoPackage.name(),
        )
        .unwrap();
        let err = read_features_from_geofile(&geofile_filepath, Some("districts"), &[])
            .unwrap_err();
        assert!(err.to_string().contains("Layer 'districts' not found"));
    }

    #[rstest]
    fn test_read_layer_without_crs_is_missing_crs() {
        let test_dir = testdir!();
        let geofile_filepath = test_dir.join("no_crs.shp");
        // Shapefiles carry their CRS in a sidecar .prj; creating the layer
        // without one yields a file with no declared CRS.
        {
            let driver =
                gdal::DriverManager::get_driver_by_name("ESRI Shapefile").unwrap();
            let mut dataset = driver.create_vector_only(&geofile_filepath).unwrap();
            let mut layer = dataset
                .create_layer(gdal::LayerOptions {
                    name: "no_crs",
                    srs: None,
                    ty: gdal::vector::OGRwkbGeometryType::wkbPoint,
                    options: None,
                })
                .unwrap();
            layer
                .create_feature(gdal::vector::Geometry::from_wkt("POINT (0 0)").unwrap())
                .unwrap();
        }
        let err = read_features_from_geofile(&geofile_filepath, None, &[]).unwrap_err();
        assert!(err
            .to_string()
            .contains("no declared coordinate reference system"));
    }

    #[rstest]
    fn test_read_missing_required_field() {
        let collection = sample_collection();
        let test_dir = testdir!();
        let geofile_filepath = test_dir.join("fields.gpkg");
        write_features_to_geofile(
            &collection,
            &geofile_filepath,
            "schools",
            GdalDriverType::GeoPackage.name(),
        )
        .unwrap();
        let err = read_features_from_geofile(&geofile_filepath, Some("schools"), &["absent"])
            .unwrap_err();
        assert!(err.to_string().contains("Missing required field 'absent'"));
    }
}
