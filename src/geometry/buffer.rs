use anyhow::anyhow;

use crate::geofile::feature::{Feature, FeatureCollection};

/// Quadrant segments for the buffer approximation, the GEOS default.
const BUFFER_QUAD_SEGS: u32 = 30;

/// Buffer every point feature by `distance` (in the units of the collection's
/// CRS, feet for EPSG:2263). Returns one polygon feature per buffered input,
/// carrying the input's attributes. Features with null or empty geometry are
/// skipped, not fatal. Refuses a geographic CRS since degrees are not a
/// distance.
pub fn buffer_point_features(
    collection: &FeatureCollection,
    distance: f64,
) -> anyhow::Result<FeatureCollection> {
    if collection.spatial_ref.is_geographic() {
        return Err(anyhow!(
            "Buffering requires a projected CRS, got a geographic one."
        ));
    }
    let mut features = Vec::with_capacity(collection.len());
    let mut skipped = 0usize;
    for feature in &collection.features {
        if !feature.has_valid_geometry() {
            skipped += 1;
            continue;
        }
        let geometry = feature.geometry.as_ref().unwrap();
        let wkb = wkb::geom_to_wkb(geometry)
            .or_else(|err| Err(anyhow!("Could not write geometry to WKB, {:?}", err)))?;
        let gdal_geometry = gdal::vector::Geometry::from_wkb(&wkb)?;
        let buffered = gdal_geometry.buffer(distance, BUFFER_QUAD_SEGS)?;
        let buffered_wkb = buffered.wkb()?;
        let buffered_geometry = wkb::wkb_to_geom(&mut &buffered_wkb[..])
            .or_else(|err| Err(anyhow!("Could not read buffered WKB, {:?}", err)))?;
        features.push(Feature::new(
            Some(buffered_geometry),
            feature.attributes.clone(),
        ));
    }
    if skipped > 0 {
        log::warn!("Skipped {} features without valid geometry", skipped);
    }
    Ok(FeatureCollection::new(
        features,
        collection.spatial_ref.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use geo::Contains;

    use crate::geofile::feature::{AttributeMap, Feature, FeatureCollection};

    use super::buffer_point_features;

    fn projected_point_collection(points: Vec<Option<geo::Point>>) -> FeatureCollection {
        let features = points
            .into_iter()
            .map(|point| {
                Feature::new(point.map(geo::Geometry::Point), AttributeMap::new())
            })
            .collect();
        FeatureCollection::new(
            features,
            gdal::spatial_ref::SpatialRef::from_epsg(2263).unwrap(),
        )
    }

    #[test]
    fn test_point_lies_within_its_own_buffer() {
        let point = geo::Point::new(1_000_000.0, 200_000.0);
        let collection = projected_point_collection(vec![Some(point)]);
        let buffers = buffer_point_features(&collection, 300.0).unwrap();
        assert_eq!(buffers.len(), 1);
        match buffers.features[0].geometry.as_ref().unwrap() {
            geo::Geometry::Polygon(polygon) => assert!(polygon.contains(&point)),
            other => panic!("expected a polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_null_geometry_is_skipped_not_fatal() {
        let collection =
            projected_point_collection(vec![Some(geo::Point::new(0.0, 0.0)), None]);
        let buffers = buffer_point_features(&collection, 50.0).unwrap();
        assert_eq!(buffers.len(), 1);
    }

    #[test]
    fn test_geographic_crs_is_rejected() {
        let collection = FeatureCollection::new(
            vec![Feature::from(geo::Geometry::Point(geo::Point::new(0.0, 0.0)))],
            gdal::spatial_ref::SpatialRef::from_epsg(4326).unwrap(),
        );
        assert!(buffer_point_features(&collection, 300.0).is_err());
    }
}
