use anyhow::anyhow;
use proj::Transform;

use crate::geofile::feature::{Feature, FeatureCollection};

use super::crs_utils::{epsg_code_to_authority_string, same_authority_code};

/// Reproject a collection into the target CRS. Returns a plain copy when the
/// authority codes already match, so callers can normalize unconditionally
/// without paying for a redundant transform.
///
/// Features without geometry keep their attributes and stay geometry-less.
pub fn reproject_features(
    collection: &FeatureCollection,
    to_crs: &gdal::spatial_ref::SpatialRef,
) -> anyhow::Result<FeatureCollection> {
    if same_authority_code(&collection.spatial_ref, to_crs)? {
        return Ok(collection.clone());
    }
    let from_authority =
        epsg_code_to_authority_string(collection.spatial_ref.auth_code()? as u32);
    let to_authority = epsg_code_to_authority_string(to_crs.auth_code()? as u32);
    log::info!("Projecting {} features to {}", collection.len(), to_authority);
    let projection = proj::Proj::new_known_crs(&from_authority, &to_authority, None)?;

    let features: anyhow::Result<Vec<Feature>> = collection
        .features
        .iter()
        .map(|feature| {
            let geometry = match &feature.geometry {
                Some(geometry) => Some(
                    geometry
                        .transformed(&projection)
                        .map_err(|err| anyhow!("Could not project geometry, {}", err))?,
                ),
                None => None,
            };
            Ok(Feature::new(geometry, feature.attributes.clone()))
        })
        .collect();
    Ok(FeatureCollection::new(features?, to_crs.clone()))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::crs::crs_utils::epsg_4326;
    use crate::geofile::feature::{Feature, FeatureCollection};

    use super::reproject_features;

    fn point_collection(x: f64, y: f64) -> FeatureCollection {
        FeatureCollection::new(
            vec![Feature::from(geo::Geometry::Point(geo::Point::new(x, y)))],
            epsg_4326(),
        )
    }

    #[test]
    fn test_round_trip_returns_original_coordinate() {
        let original = point_collection(-73.9277866, 40.6976701);
        let ny_li_ft = gdal::spatial_ref::SpatialRef::from_epsg(2263).unwrap();

        let projected = reproject_features(&original, &ny_li_ft).unwrap();
        let back = reproject_features(&projected, &epsg_4326()).unwrap();

        match back.features[0].geometry.as_ref().unwrap() {
            geo::Geometry::Point(point) => {
                assert_relative_eq!(point.x(), -73.9277866, epsilon = 1e-6);
                assert_relative_eq!(point.y(), 40.6976701, epsilon = 1e-6);
            }
            other => panic!("expected a point, got {:?}", other),
        }
    }

    #[test]
    fn test_same_crs_is_a_no_op() {
        let original = point_collection(-73.9, 40.7);
        let unchanged = reproject_features(&original, &epsg_4326()).unwrap();
        match (
            original.features[0].geometry.as_ref().unwrap(),
            unchanged.features[0].geometry.as_ref().unwrap(),
        ) {
            (geo::Geometry::Point(a), geo::Geometry::Point(b)) => assert_eq!(a, b),
            _ => panic!("expected points"),
        }
    }
}
