use std::path::PathBuf;
use std::time::Instant;

use serde::Deserialize;

use crate::crs::reproject::reproject_features;
use crate::geofile::feature::{AttributeMap, AttributeValue, FeatureCollection};
use crate::geofile::gdal_geofile::{
    read_features_from_geofile, write_features_to_geofile, GdalDriverType,
};
use crate::join::candidates::{intersects_join, nearest_join};
use crate::join::resolve::resolve_first;
use crate::pipeline::format_elapsed;

const FEET_PER_MILE: f64 = 5280.0;

/// One polygon layer joined by intersection; the matched source field lands
/// on the schools under a new name.
#[derive(Deserialize, Debug)]
pub struct ZoneJoinSpec {
    pub path: PathBuf,
    pub layer: Option<String>,
    pub source_field: String,
    pub output_field: String,
}

/// One point layer joined by nearest distance, reported in miles.
#[derive(Deserialize, Debug)]
pub struct NearestJoinSpec {
    pub path: PathBuf,
    pub layer: Option<String>,
    pub output_field: String,
}

/// Attach hazard-zone categories and nearest-facility distances to school
/// points, then export a GeoPackage.
#[derive(Deserialize, Debug)]
pub struct HazardMetricsConfig {
    pub schools_path: PathBuf,
    pub schools_layer: Option<String>,
    pub zone_joins: Vec<ZoneJoinSpec>,
    pub nearest_joins: Vec<NearestJoinSpec>,
    /// Projected CRS (feet) for the distance joins.
    pub projected_epsg: u32,
    pub output_path: PathBuf,
    pub output_layer_name: String,
}

/// In-memory core. Every school row survives: rows without geometry simply
/// get null zone fields and null distances.
pub fn enrich_schools_with_hazards(
    schools: &FeatureCollection,
    zones: &[(&ZoneJoinSpec, FeatureCollection)],
    centers: &[(&NearestJoinSpec, FeatureCollection)],
    projected_crs: &gdal::spatial_ref::SpatialRef,
) -> anyhow::Result<FeatureCollection> {
    let mut enriched = schools.clone();

    for (spec, zone_layer) in zones {
        let zone_layer = reproject_features(zone_layer, &enriched.spatial_ref)?;
        let candidates = intersects_join(&enriched, &zone_layer, &[&spec.source_field])?;
        let mut default = AttributeMap::new();
        default.insert(spec.source_field.clone(), AttributeValue::Null);
        let resolved = resolve_first(enriched.len(), &candidates, &default);
        for (feature, mut record) in enriched.features.iter_mut().zip(resolved) {
            let value = record
                .remove(&spec.source_field)
                .unwrap_or(AttributeValue::Null);
            feature.attributes.insert(spec.output_field.clone(), value);
        }
        log::info!(
            "Joined field {} from {:?}",
            spec.output_field,
            spec.path
        );
    }

    if !centers.is_empty() {
        let schools_projected = reproject_features(&enriched, projected_crs)?;
        for (spec, center_layer) in centers {
            let center_layer = reproject_features(center_layer, projected_crs)?;
            let candidates = nearest_join(&schools_projected, &center_layer, &[])?;
            let mut distances_mi: Vec<AttributeValue> =
                vec![AttributeValue::Null; enriched.len()];
            for candidate in &candidates {
                if let Some(distance_ft) = candidate.distance {
                    distances_mi[candidate.subject_idx] =
                        AttributeValue::Real(distance_ft / FEET_PER_MILE);
                }
            }
            for (feature, value) in enriched.features.iter_mut().zip(distances_mi) {
                feature.attributes.insert(spec.output_field.clone(), value);
            }
            log::info!(
                "Computed {} from {:?}",
                spec.output_field,
                spec.path
            );
        }
    }

    Ok(enriched)
}

pub fn run(config: &HazardMetricsConfig) -> anyhow::Result<()> {
    let start = Instant::now();

    let schools = read_features_from_geofile(
        &config.schools_path,
        config.schools_layer.as_deref(),
        &[],
    )?;
    log::info!("Number of schools: {}", schools.len());

    let mut zones = Vec::new();
    for spec in &config.zone_joins {
        let layer = read_features_from_geofile(
            &spec.path,
            spec.layer.as_deref(),
            &[&spec.source_field],
        )?;
        zones.push((spec, layer));
    }
    let mut centers = Vec::new();
    for spec in &config.nearest_joins {
        let layer = read_features_from_geofile(&spec.path, spec.layer.as_deref(), &[])?;
        centers.push((spec, layer));
    }

    let projected_crs = gdal::spatial_ref::SpatialRef::from_epsg(config.projected_epsg)?;
    let enriched = enrich_schools_with_hazards(&schools, &zones, &centers, &projected_crs)?;

    write_features_to_geofile(
        &enriched,
        &config.output_path,
        &config.output_layer_name,
        GdalDriverType::GeoPackage.name(),
    )?;
    log::info!("Exported layer to: {:?}", config.output_path);
    log::info!("Layer name: {}", config.output_layer_name);
    log::info!("Total runtime: {}", format_elapsed(start.elapsed()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::geofile::feature::{AttributeMap, AttributeValue, Feature, FeatureCollection};

    use super::{enrich_schools_with_hazards, NearestJoinSpec, ZoneJoinSpec};

    fn projected_crs() -> gdal::spatial_ref::SpatialRef {
        gdal::spatial_ref::SpatialRef::from_epsg(2263).unwrap()
    }

    fn point(x: f64, y: f64) -> Feature {
        Feature::new(
            Some(geo::Geometry::Point(geo::Point::new(x, y))),
            AttributeMap::new(),
        )
    }

    fn zone(min_x: f64, min_y: f64, size: f64, label: &str) -> Feature {
        let polygon = geo::Polygon::new(
            geo::LineString::from(vec![
                (min_x, min_y),
                (min_x + size, min_y),
                (min_x + size, min_y + size),
                (min_x, min_y + size),
                (min_x, min_y),
            ]),
            vec![],
        );
        let mut attributes = AttributeMap::new();
        attributes.insert(
            "hurricane_".to_string(),
            AttributeValue::Text(label.to_string()),
        );
        Feature::new(Some(geo::Geometry::Polygon(polygon)), attributes)
    }

    #[test]
    fn test_zone_and_distance_enrichment() {
        let schools = FeatureCollection::new(
            vec![
                point(50.0, 50.0),
                point(10_000.0, 10_000.0),
                Feature::new(None, AttributeMap::new()),
            ],
            projected_crs(),
        );
        let zone_layer = FeatureCollection::new(
            vec![zone(0.0, 0.0, 100.0, "Zone 1")],
            projected_crs(),
        );
        let center_layer = FeatureCollection::new(
            vec![point(50.0, 50.0 + 5280.0)],
            projected_crs(),
        );

        let zone_spec = ZoneJoinSpec {
            path: "unused".into(),
            layer: None,
            source_field: "hurricane_".to_string(),
            output_field: "hurricane_evacZone".to_string(),
        };
        let nearest_spec = NearestJoinSpec {
            path: "unused".into(),
            layer: None,
            output_field: "evacCenters_distance_mi".to_string(),
        };
        let enriched = enrich_schools_with_hazards(
            &schools,
            &[(&zone_spec, zone_layer)],
            &[(&nearest_spec, center_layer)],
            &projected_crs(),
        )
        .unwrap();

        // Cardinality preserved, including the geometry-less row.
        assert_eq!(enriched.len(), 3);

        let first = &enriched.features[0].attributes;
        assert_eq!(
            first.get("hurricane_evacZone"),
            Some(&AttributeValue::Text("Zone 1".to_string()))
        );
        match first.get("evacCenters_distance_mi") {
            Some(AttributeValue::Real(miles)) => assert_relative_eq!(*miles, 1.0),
            other => panic!("expected a distance, got {:?}", other),
        }

        let second = &enriched.features[1].attributes;
        assert_eq!(
            second.get("hurricane_evacZone"),
            Some(&AttributeValue::Null)
        );

        let third = &enriched.features[2].attributes;
        assert_eq!(third.get("hurricane_evacZone"), Some(&AttributeValue::Null));
        assert_eq!(
            third.get("evacCenters_distance_mi"),
            Some(&AttributeValue::Null)
        );
    }
}
