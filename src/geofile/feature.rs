use std::collections::BTreeMap;

use geo::dimensions::HasDimensions;

/// Scalar attribute value. Matches the field types the GDAL vector drivers
/// support for our outputs (Integer64, Real, String).
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Null,
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Numeric view of the value. Text is parsed, so a risk rank stored as "1"
    /// still ranks.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Integer(value) => Some(*value as f64),
            AttributeValue::Real(value) => Some(*value),
            AttributeValue::Text(value) => value.trim().parse().ok(),
            AttributeValue::Null => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            AttributeValue::Integer(value) => Some(value.to_string()),
            AttributeValue::Real(value) => Some(value.to_string()),
            AttributeValue::Text(value) => Some(value.clone()),
            AttributeValue::Null => None,
        }
    }
}

/// Attribute table row. BTreeMap keeps field order deterministic across runs.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

#[derive(Debug, Clone)]
pub struct Feature {
    /// None when the source feature had no geometry.
    pub geometry: Option<geo::Geometry>,
    pub attributes: AttributeMap,
}

impl Feature {
    pub fn new(geometry: Option<geo::Geometry>, attributes: AttributeMap) -> Self {
        Self {
            geometry,
            attributes,
        }
    }

    pub fn has_valid_geometry(&self) -> bool {
        match &self.geometry {
            Some(geometry) => !geometry.is_empty(),
            None => false,
        }
    }
}

impl From<geo::Geometry> for Feature {
    fn from(value: geo::Geometry) -> Self {
        Self {
            geometry: Some(value),
            attributes: AttributeMap::new(),
        }
    }
}

/// Ordered set of features sharing a coordinate reference system.
#[derive(Debug)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    pub spatial_ref: gdal::spatial_ref::SpatialRef,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>, spatial_ref: gdal::spatial_ref::SpatialRef) -> Self {
        Self {
            features,
            spatial_ref,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Drop features with null or empty geometry. Returns how many were
    /// removed. Only called before a join; enrichment itself never drops rows.
    pub fn retain_valid_geometries(&mut self) -> usize {
        let before = self.features.len();
        self.features.retain(|feature| feature.has_valid_geometry());
        before - self.features.len()
    }
}

impl Clone for FeatureCollection {
    fn clone(&self) -> Self {
        Self {
            features: self.features.clone(),
            spatial_ref: self.spatial_ref.clone(),
        }
    }
}
