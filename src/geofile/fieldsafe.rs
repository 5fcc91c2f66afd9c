use std::collections::{BTreeMap, HashSet};

use super::feature::{AttributeMap, AttributeValue, Feature, FeatureCollection};

/// FileGDB caps field names at 64 characters.
pub const FILEGDB_MAX_FIELD_NAME_LEN: usize = 64;

/// Names the FileGDB drivers treat as internal row identifiers. Colliding
/// source fields are renamed with the `src_` prefix instead of being dropped.
pub const FILEGDB_RESERVED_FIELD_NAMES: [&str; 2] = ["fid", "objectid"];

/// Target field type for coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Real,
    Text,
}

/// Coerce a value to the target field type. Failures become Null, never an
/// error, so one bad row cannot abort a whole write.
pub fn coerce_value(value: &AttributeValue, kind: FieldKind) -> AttributeValue {
    match kind {
        FieldKind::Integer => match value {
            AttributeValue::Integer(v) => AttributeValue::Integer(*v),
            AttributeValue::Real(v) if v.is_finite() => AttributeValue::Integer(*v as i64),
            AttributeValue::Text(v) => match v.trim().parse::<i64>() {
                Ok(parsed) => AttributeValue::Integer(parsed),
                Err(_) => match v.trim().parse::<f64>() {
                    Ok(parsed) if parsed.is_finite() => AttributeValue::Integer(parsed as i64),
                    _ => AttributeValue::Null,
                },
            },
            _ => AttributeValue::Null,
        },
        FieldKind::Real => match value {
            AttributeValue::Integer(v) => AttributeValue::Real(*v as f64),
            AttributeValue::Real(v) => AttributeValue::Real(*v),
            AttributeValue::Text(v) => match v.trim().parse::<f64>() {
                Ok(parsed) => AttributeValue::Real(parsed),
                Err(_) => AttributeValue::Null,
            },
            AttributeValue::Null => AttributeValue::Null,
        },
        FieldKind::Text => match value.as_text() {
            Some(text) => AttributeValue::Text(text),
            None => AttributeValue::Null,
        },
    }
}

/// Truncate to at most `max_len` bytes without splitting a multibyte
/// character; the cut backs up to the previous char boundary.
fn truncate_to_char_boundary(name: &mut String, max_len: usize) {
    if name.len() <= max_len {
        return;
    }
    let mut end = max_len;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name.truncate(end);
}

/// Build the rename map for a set of field names: reserved names get the
/// `src_` prefix, over-long names are truncated to `max_len` bytes and
/// de-duplicated (case-insensitively) with a numeric suffix that itself stays
/// within the limit. Names that survive unchanged are absent from the map.
pub fn build_rename_map(
    field_names: &[String],
    max_len: usize,
    reserved: &[&str],
) -> BTreeMap<String, String> {
    let mut renames = BTreeMap::new();
    let mut seen: HashSet<String> = HashSet::new();
    for name in field_names {
        let mut new_name = if reserved
            .iter()
            .any(|reserved_name| name.eq_ignore_ascii_case(reserved_name))
        {
            format!("src_{}", name.to_ascii_lowercase())
        } else {
            name.clone()
        };
        truncate_to_char_boundary(&mut new_name, max_len);
        let base = new_name.clone();
        let mut counter = 1;
        while seen.contains(&new_name.to_ascii_lowercase()) {
            let suffix = format!("_{}", counter);
            let mut stem = base.clone();
            truncate_to_char_boundary(&mut stem, max_len.saturating_sub(suffix.len()));
            new_name = format!("{}{}", stem, suffix);
            counter += 1;
        }
        seen.insert(new_name.to_ascii_lowercase());
        if &new_name != name {
            renames.insert(name.clone(), new_name);
        }
    }
    renames
}

/// Copy of the collection with FileGDB-safe field names. The input is left
/// untouched.
pub fn sanitize_for_filegdb(collection: &FeatureCollection) -> FeatureCollection {
    let field_names: Vec<String> = {
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        for feature in &collection.features {
            for name in feature.attributes.keys() {
                if seen.insert(name.clone()) {
                    names.push(name.clone());
                }
            }
        }
        names
    };
    let renames = build_rename_map(
        &field_names,
        FILEGDB_MAX_FIELD_NAME_LEN,
        &FILEGDB_RESERVED_FIELD_NAMES,
    );
    if renames.is_empty() {
        return collection.clone();
    }
    log::info!("Renaming {} fields for FileGDB output", renames.len());
    for (old, new) in &renames {
        log::debug!("Field rename: {} -> {}", old, new);
    }

    let features = collection
        .features
        .iter()
        .map(|feature| {
            let mut attributes = AttributeMap::new();
            for (name, value) in &feature.attributes {
                let name = renames.get(name).unwrap_or(name).clone();
                attributes.insert(name, value.clone());
            }
            Feature::new(feature.geometry.clone(), attributes)
        })
        .collect();
    FeatureCollection::new(features, collection.spatial_ref.clone())
}
