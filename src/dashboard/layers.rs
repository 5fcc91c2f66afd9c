//! Map layer catalog: precomputed files mapped to styled, toggleable layers.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::geofile::feature::{AttributeValue, Feature, FeatureCollection};
use crate::geofile::gdal_geofile::read_features_from_geofile;

/// RGBA color, 0-255 per channel.
pub type Rgba = [u8; 4];

/// Visual style for one map layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStyle {
    pub fill_color: Rgba,
    pub line_color: Rgba,
    pub line_width: f32,
    /// Only meaningful for point layers.
    pub point_radius: f32,
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self {
            fill_color: [100, 200, 250, 75],
            line_color: [150, 150, 150, 50],
            line_width: 2.0,
            point_radius: 40.0,
        }
    }
}

/// One entry in the map: a source file plus its style. The file is
/// precomputed by the pipelines (or supplied as a static layer).
#[derive(Debug, Clone)]
pub struct MapLayer {
    /// Stable identifier used by the view state.
    pub id: String,
    /// Human-readable legend title.
    pub title: String,
    pub path: PathBuf,
    pub style: LayerStyle,
    /// Shown in the legend whether or not the layer is currently visible.
    pub default_visible: bool,
}

/// Legend row derived from a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub layer_id: String,
    pub title: String,
    pub fill_color: Rgba,
}

/// Holds the layer definitions and memoizes file loads: asking for the same
/// layer twice re-reads nothing. Staleness is accepted if the backing file
/// changes on disk while the catalog is alive.
pub struct LayerCatalog {
    layers: Vec<MapLayer>,
    cache: BTreeMap<String, FeatureCollection>,
}

impl LayerCatalog {
    pub fn new(layers: Vec<MapLayer>) -> Self {
        Self {
            layers,
            cache: BTreeMap::new(),
        }
    }

    pub fn layers(&self) -> &[MapLayer] {
        &self.layers
    }

    pub fn get(&self, layer_id: &str) -> Option<&MapLayer> {
        self.layers.iter().find(|layer| layer.id == layer_id)
    }

    /// Load a layer's features, reading the file only on the first request.
    pub fn load(&mut self, layer_id: &str) -> anyhow::Result<&FeatureCollection> {
        if !self.cache.contains_key(layer_id) {
            let path = self
                .layers
                .iter()
                .find(|layer| layer.id == layer_id)
                .map(|layer| layer.path.clone())
                .ok_or_else(|| anyhow::anyhow!("No layer with id {}", layer_id))?;
            log::info!("Loading layer {} from {:?}", layer_id, path);
            let collection = read_features_from_geofile(&path, None, &[])?;
            self.cache.insert(layer_id.to_string(), collection);
        }
        Ok(&self.cache[layer_id])
    }

    pub fn legend_entries(&self) -> Vec<LegendEntry> {
        self.layers
            .iter()
            .map(|layer| LegendEntry {
                layer_id: layer.id.clone(),
                title: layer.title.clone(),
                fill_color: layer.style.fill_color,
            })
            .collect()
    }
}

/// Designation filter predicate for the community-designation layer. A
/// feature passes when `show_non_designated` is on, or when its designation
/// field is truthy (integer/real nonzero, or the text "true").
pub fn is_designated(feature: &Feature, designation_field: &str) -> bool {
    match feature.attributes.get(designation_field) {
        Some(AttributeValue::Integer(value)) => *value != 0,
        Some(AttributeValue::Real(value)) => *value != 0.0,
        Some(AttributeValue::Text(value)) => value.trim().eq_ignore_ascii_case("true"),
        Some(AttributeValue::Null) | None => false,
    }
}

/// Apply the designation filter to a collection, pure copy-with-changes.
pub fn filter_designated(
    collection: &FeatureCollection,
    designation_field: &str,
    show_non_designated: bool,
) -> FeatureCollection {
    if show_non_designated {
        return collection.clone();
    }
    let features = collection
        .features
        .iter()
        .filter(|feature| is_designated(feature, designation_field))
        .cloned()
        .collect();
    FeatureCollection::new(features, collection.spatial_ref.clone())
}
