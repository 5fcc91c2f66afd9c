use std::path::PathBuf;
use std::time::Instant;

use serde::Deserialize;

use crate::crs::reproject::reproject_features;
use crate::geofile::feature::{AttributeMap, AttributeValue, Feature, FeatureCollection};
use crate::geofile::{gdal_geofile::read_features_from_geofile, geojson::write_features_to_geojson};
use crate::geometry::buffer::buffer_point_features;
use crate::join::candidates::intersects_join;
use crate::join::resolve::resolve_by_rank;
use crate::geofile::fieldsafe;
use crate::pipeline::format_elapsed;

/// Buffer school points, join the buffers to stormwater flood polygons, and
/// attach only the highest-priority flood record back to the original points.
#[derive(Deserialize, Debug)]
pub struct StormwaterConfig {
    pub schools_path: PathBuf,
    pub stormwater_path: PathBuf,
    /// Projected CRS for buffering, NY State Plane Long Island (ft).
    pub target_epsg: u32,
    pub buffer_distance_ft: f64,
    pub scenario_field: String,
    pub category_field: String,
    pub risk_field: String,
    /// Text written when no polygon overlaps a school's buffer.
    pub no_risk_label: String,
    /// Risk value written when no polygon overlaps a school's buffer.
    pub no_risk_value: i64,
    pub output_points_path: PathBuf,
    pub output_buffers_path: PathBuf,
}

impl StormwaterConfig {
    fn no_risk_record(&self) -> AttributeMap {
        let mut record = AttributeMap::new();
        record.insert(
            self.scenario_field.clone(),
            AttributeValue::Text(self.no_risk_label.clone()),
        );
        record.insert(
            self.category_field.clone(),
            AttributeValue::Text(self.no_risk_label.clone()),
        );
        record.insert(
            self.risk_field.clone(),
            AttributeValue::Integer(self.no_risk_value),
        );
        record
    }
}

/// In-memory core of the stormwater join. Returns the enriched points (in the
/// schools' original CRS) and the QA buffer polygons (in the projected CRS).
///
/// Schools with null or empty geometry are filtered before the join; after
/// that the output cardinality equals the filtered input exactly.
pub fn enrich_schools_with_stormwater(
    schools: &FeatureCollection,
    stormwater: &FeatureCollection,
    config: &StormwaterConfig,
) -> anyhow::Result<(FeatureCollection, FeatureCollection)> {
    let target_crs = gdal::spatial_ref::SpatialRef::from_epsg(config.target_epsg)?;

    let mut schools = schools.clone();
    // Pre-existing copies of the joined fields would collide with the
    // enrichment output; drop them up front.
    for feature in &mut schools.features {
        feature.attributes.remove(&config.scenario_field);
        feature.attributes.remove(&config.category_field);
        feature.attributes.remove(&config.risk_field);
    }
    let removed = schools.retain_valid_geometries();
    if removed > 0 {
        log::warn!("Dropped {} schools without valid geometry", removed);
    }

    let schools_projected = reproject_features(&schools, &target_crs)?;
    let buffers = buffer_point_features(&schools_projected, config.buffer_distance_ft)?;

    let mut stormwater = stormwater.clone();
    stormwater.retain_valid_geometries();
    let stormwater = reproject_features(&stormwater, &target_crs)?;

    let candidates = intersects_join(
        &buffers,
        &stormwater,
        &[
            &config.scenario_field,
            &config.category_field,
            &config.risk_field,
        ],
    )?;
    log::info!(
        "Found {} candidate school/flood-polygon overlaps",
        candidates.len()
    );
    let resolved = resolve_by_rank(
        buffers.len(),
        &candidates,
        &config.risk_field,
        &config.no_risk_record(),
    );

    let enriched_features: Vec<Feature> = schools
        .features
        .iter()
        .zip(resolved)
        .map(|(feature, record)| {
            let mut attributes = feature.attributes.clone();
            for (name, value) in record {
                let value = if name == config.risk_field {
                    // Risk travels as an integer even when the source layer
                    // stored it as text.
                    match fieldsafe::coerce_value(&value, fieldsafe::FieldKind::Integer) {
                        AttributeValue::Null => AttributeValue::Integer(config.no_risk_value),
                        coerced => coerced,
                    }
                } else {
                    value
                };
                attributes.insert(name, value);
            }
            Feature::new(feature.geometry.clone(), attributes)
        })
        .collect();
    let enriched = FeatureCollection::new(enriched_features, schools.spatial_ref.clone());
    Ok((enriched, buffers))
}

pub fn run(config: &StormwaterConfig) -> anyhow::Result<()> {
    let start = Instant::now();

    let schools = read_features_from_geofile(&config.schools_path, None, &[])?;
    let stormwater = read_features_from_geofile(
        &config.stormwater_path,
        None,
        &[
            &config.scenario_field,
            &config.category_field,
            &config.risk_field,
        ],
    )?;

    let rows_before = schools.len();
    let (enriched, buffers) = enrich_schools_with_stormwater(&schools, &stormwater, config)?;

    write_features_to_geojson(&enriched, &config.output_points_path)?;
    write_features_to_geojson(&buffers, &config.output_buffers_path)?;

    log::info!("Schools read: {}", rows_before);
    log::info!("Schools written: {}", enriched.len());
    log::info!("Saved points: {:?}", config.output_points_path);
    log::info!("Saved buffers: {:?}", config.output_buffers_path);
    log::info!("Runtime {}", format_elapsed(start.elapsed()));
    Ok(())
}
