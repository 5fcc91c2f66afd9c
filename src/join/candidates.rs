use anyhow::anyhow;
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::centroid::Centroid;
use geo::algorithm::intersects::Intersects;
use rstar::{
    primitives::{GeomWithData, Rectangle},
    RTree, AABB,
};

use crate::crs::crs_utils::same_authority_code;
use crate::geofile::feature::{AttributeMap, AttributeValue, FeatureCollection};

/// One potential attribute match for a subject feature, produced by a join
/// and consumed by the resolution stage.
#[derive(Debug, Clone)]
pub struct JoinCandidate {
    pub subject_idx: usize,
    pub reference_idx: usize,
    /// Values of the requested reference fields, as one atomic record.
    pub attributes: AttributeMap,
    /// Planar distance in CRS units, only for nearest joins.
    pub distance: Option<f64>,
}

fn extract_fields(attributes: &AttributeMap, fields: &[&str]) -> AttributeMap {
    fields
        .iter()
        .map(|field| {
            let value = attributes
                .get(*field)
                .cloned()
                .unwrap_or(AttributeValue::Null);
            (field.to_string(), value)
        })
        .collect()
}

fn ensure_same_crs(
    subjects: &FeatureCollection,
    reference: &FeatureCollection,
) -> anyhow::Result<()> {
    if !same_authority_code(&subjects.spatial_ref, &reference.spatial_ref)? {
        return Err(anyhow!(
            "Spatial join requires both layers in the same CRS; reproject first."
        ));
    }
    Ok(())
}

/// All intersecting (subject, reference) pairs. Zero, one, or many candidates
/// per subject; subjects without valid geometry produce none. Candidate order
/// follows subject order, then reference order, so downstream tie-breaks are
/// reproducible.
pub fn intersects_join(
    subjects: &FeatureCollection,
    reference: &FeatureCollection,
    fields: &[&str],
) -> anyhow::Result<Vec<JoinCandidate>> {
    ensure_same_crs(subjects, reference)?;

    // Coarse pass over reference bounding boxes, exact test afterwards.
    let tree_entries: Vec<GeomWithData<Rectangle<[f64; 2]>, usize>> = reference
        .features
        .iter()
        .enumerate()
        .filter_map(|(reference_idx, feature)| {
            let rect = feature.geometry.as_ref()?.bounding_rect()?;
            Some(GeomWithData::new(
                Rectangle::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                reference_idx,
            ))
        })
        .collect();
    let tree = RTree::bulk_load(tree_entries);

    let mut candidates = Vec::new();
    for (subject_idx, subject) in subjects.features.iter().enumerate() {
        let Some(subject_geometry) = subject.geometry.as_ref() else {
            continue;
        };
        let Some(rect) = subject_geometry.bounding_rect() else {
            continue;
        };
        let envelope = AABB::from_corners(
            [rect.min().x, rect.min().y],
            [rect.max().x, rect.max().y],
        );
        let mut matched: Vec<usize> = tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.data)
            .filter(|&reference_idx| {
                reference.features[reference_idx]
                    .geometry
                    .as_ref()
                    .map(|reference_geometry| subject_geometry.intersects(reference_geometry))
                    .unwrap_or(false)
            })
            .collect();
        matched.sort_unstable();
        for reference_idx in matched {
            candidates.push(JoinCandidate {
                subject_idx,
                reference_idx,
                attributes: extract_fields(&reference.features[reference_idx].attributes, fields),
                distance: None,
            });
        }
    }
    Ok(candidates)
}

/// Exactly one nearest reference point per subject feature with valid
/// geometry, with the planar distance in CRS units. Non-point subjects are
/// matched from their centroid. Equidistant references resolve to the lowest
/// reference index.
pub fn nearest_join(
    subjects: &FeatureCollection,
    reference: &FeatureCollection,
    fields: &[&str],
) -> anyhow::Result<Vec<JoinCandidate>> {
    ensure_same_crs(subjects, reference)?;

    let tree_entries: Vec<GeomWithData<[f64; 2], usize>> = reference
        .features
        .iter()
        .enumerate()
        .filter_map(|(reference_idx, feature)| match &feature.geometry {
            Some(geo::Geometry::Point(point)) => {
                Some(GeomWithData::new([point.x(), point.y()], reference_idx))
            }
            _ => None,
        })
        .collect();
    if tree_entries.is_empty() {
        return Err(anyhow!("Nearest join reference layer has no point features."));
    }
    let tree = RTree::bulk_load(tree_entries);

    let mut candidates = Vec::new();
    for (subject_idx, subject) in subjects.features.iter().enumerate() {
        let Some(subject_geometry) = subject.geometry.as_ref() else {
            continue;
        };
        let Some(query_point) = subject_geometry.centroid() else {
            continue;
        };
        let query = [query_point.x(), query_point.y()];

        let mut nearest_distance_2: Option<f64> = None;
        let mut nearest_idx: Option<usize> = None;
        for (entry, distance_2) in tree.nearest_neighbor_iter_with_distance_2(&query) {
            match nearest_distance_2 {
                None => {
                    nearest_distance_2 = Some(distance_2);
                    nearest_idx = Some(entry.data);
                }
                Some(best) if distance_2 <= best => {
                    // Exact tie: keep the lowest reference index.
                    if entry.data < nearest_idx.unwrap() {
                        nearest_idx = Some(entry.data);
                    }
                }
                Some(_) => break,
            }
        }
        let (reference_idx, distance_2) = (nearest_idx.unwrap(), nearest_distance_2.unwrap());
        candidates.push(JoinCandidate {
            subject_idx,
            reference_idx,
            attributes: extract_fields(&reference.features[reference_idx].attributes, fields),
            distance: Some(distance_2.sqrt()),
        });
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::geofile::feature::{AttributeMap, AttributeValue, Feature, FeatureCollection};

    use super::{intersects_join, nearest_join};

    fn projected_crs() -> gdal::spatial_ref::SpatialRef {
        gdal::spatial_ref::SpatialRef::from_epsg(2263).unwrap()
    }

    fn square(min_x: f64, min_y: f64, size: f64, label: &str) -> Feature {
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
            "label".to_string(),
            AttributeValue::Text(label.to_string()),
        );
        Feature::new(Some(geo::Geometry::Polygon(polygon)), attributes)
    }

    fn point(x: f64, y: f64) -> Feature {
        Feature::new(
            Some(geo::Geometry::Point(geo::Point::new(x, y))),
            AttributeMap::new(),
        )
    }

    #[test]
    fn test_intersects_join_finds_all_overlaps() {
        let subjects = FeatureCollection::new(
            vec![point(5.0, 5.0), point(100.0, 100.0)],
            projected_crs(),
        );
        let reference = FeatureCollection::new(
            vec![
                square(0.0, 0.0, 10.0, "a"),
                square(4.0, 4.0, 10.0, "b"),
                square(50.0, 50.0, 10.0, "c"),
            ],
            projected_crs(),
        );
        let candidates = intersects_join(&subjects, &reference, &["label"]).unwrap();
        let subject_0: Vec<usize> = candidates
            .iter()
            .filter(|candidate| candidate.subject_idx == 0)
            .map(|candidate| candidate.reference_idx)
            .collect();
        assert_eq!(subject_0, vec![0, 1]);
        assert!(!candidates.iter().any(|candidate| candidate.subject_idx == 1));
    }

    #[test]
    fn test_intersects_join_requires_matching_crs() {
        let subjects = FeatureCollection::new(
            vec![point(0.0, 0.0)],
            gdal::spatial_ref::SpatialRef::from_epsg(4326).unwrap(),
        );
        let reference =
            FeatureCollection::new(vec![square(0.0, 0.0, 1.0, "a")], projected_crs());
        assert!(intersects_join(&subjects, &reference, &["label"]).is_err());
    }

    #[test]
    fn test_nearest_join_distance_and_cardinality() {
        let subjects = FeatureCollection::new(vec![point(0.0, 0.0)], projected_crs());
        let reference = FeatureCollection::new(
            vec![point(3.0, 4.0), point(30.0, 40.0)],
            projected_crs(),
        );
        let candidates = nearest_join(&subjects, &reference, &[]).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].reference_idx, 0);
        assert_relative_eq!(candidates[0].distance.unwrap(), 5.0);
    }

    #[test]
    fn test_nearest_join_tie_breaks_to_lowest_reference_index() {
        // Two references exactly equidistant from the subject.
        let subjects = FeatureCollection::new(vec![point(0.0, 0.0)], projected_crs());
        let reference = FeatureCollection::new(
            vec![point(0.0, 10.0), point(10.0, 0.0), point(0.0, -10.0)],
            projected_crs(),
        );
        let candidates = nearest_join(&subjects, &reference, &[]).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].reference_idx, 0);
    }

    #[test]
    fn test_nearest_join_skips_subjects_without_geometry() {
        let subjects = FeatureCollection::new(
            vec![point(0.0, 0.0), Feature::new(None, AttributeMap::new())],
            projected_crs(),
        );
        let reference = FeatureCollection::new(vec![point(1.0, 0.0)], projected_crs());
        let candidates = nearest_join(&subjects, &reference, &[]).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].subject_idx, 0);
    }
}
