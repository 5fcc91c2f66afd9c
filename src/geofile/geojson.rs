use std::{fs, path::Path};

use geojson::{JsonObject, JsonValue};

use super::feature::{AttributeValue, FeatureCollection};

fn attribute_to_json(value: &AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Integer(v) => JsonValue::from(*v),
        AttributeValue::Real(v) => JsonValue::from(*v),
        AttributeValue::Text(v) => JsonValue::from(v.as_str()),
        AttributeValue::Null => JsonValue::Null,
    }
}

/// Dump a FeatureCollection as GeoJSON. Features without geometry are written
/// with a null geometry member, which GeoJSON permits.
pub fn write_features_to_geojson(
    collection: &FeatureCollection,
    output_filepath: &Path,
) -> anyhow::Result<()> {
    let features: Vec<geojson::Feature> = collection
        .features
        .iter()
        .map(|feature| {
            let geometry = feature
                .geometry
                .as_ref()
                .map(|geometry| geojson::Geometry::new(geojson::Value::from(geometry)));
            let mut properties = JsonObject::new();
            for (name, value) in &feature.attributes {
                properties.insert(name.clone(), attribute_to_json(value));
            }
            geojson::Feature {
                bbox: None,
                geometry,
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();
    let feature_collection = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    let geojson_contents = geojson::GeoJson::from(feature_collection);
    fs::write(output_filepath, geojson_contents.to_string())?;
    log::info!(
        "Wrote {} features to {:?}",
        collection.len(),
        output_filepath
    );
    Ok(())
}
