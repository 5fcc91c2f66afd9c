use std::collections::BTreeMap;

use crate::geofile::feature::{AttributeValue, FeatureCollection};

#[derive(Debug, PartialEq, Eq)]
pub struct SnapSummary {
    pub rows_snapped: usize,
    pub groups_snapped: usize,
}

/// Snap every point sharing the same grouping key to one shared coordinate:
/// the first valid point of the group in feature order. Geometry and the
/// lat/lng attribute fields are rewritten together; all other attributes and
/// the row count are untouched.
///
/// Rows with a blank or null grouping key are never snapped. A group with no
/// valid geometry anywhere is left entirely unchanged.
pub fn snap_points_by_group(
    collection: &mut FeatureCollection,
    group_field: &str,
    lat_field: &str,
    lng_field: &str,
) -> anyhow::Result<SnapSummary> {
    // First pass: one target coordinate per group, first valid point wins.
    let mut targets: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for feature in &collection.features {
        let Some(code) = normalized_group_code(feature.attributes.get(group_field)) else {
            continue;
        };
        if targets.contains_key(&code) {
            continue;
        }
        if let Some(geo::Geometry::Point(point)) = &feature.geometry {
            targets.insert(code, (point.x(), point.y()));
        }
    }

    // Second pass: rewrite every row whose group has a target.
    let mut rows_snapped = 0usize;
    for feature in &mut collection.features {
        let Some(code) = normalized_group_code(feature.attributes.get(group_field)) else {
            continue;
        };
        let Some(&(x, y)) = targets.get(&code) else {
            continue;
        };
        feature.geometry = Some(geo::Geometry::Point(geo::Point::new(x, y)));
        feature
            .attributes
            .insert(lng_field.to_string(), AttributeValue::Real(x));
        feature
            .attributes
            .insert(lat_field.to_string(), AttributeValue::Real(y));
        rows_snapped += 1;
    }

    Ok(SnapSummary {
        rows_snapped,
        groups_snapped: targets.len(),
    })
}

fn normalized_group_code(value: Option<&AttributeValue>) -> Option<String> {
    let text = value?.as_text()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
