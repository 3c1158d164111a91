//! Country boundary features, passed through with normalized identifiers.
//!
//! Geometry is never read. Each feature only gains two properties:
//! `iso3` and `display_name`.

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{Dataset, PipelineError};

/// Identifier fields, in order of preference. Natural Earth marks some
/// countries with `-99` in `ISO_A3`, so later fields fill the gap.
pub const ISO_FIELDS: &[&str] = &["ISO_A3", "ADM0_A3", "ISO_A3_EH"];
pub const NAME_FIELDS: &[&str] = &["NAME", "ADMIN"];

fn valid_iso3(raw: &str) -> Option<String> {
    let code = raw.trim().to_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code)
    } else {
        None
    }
}

fn first_iso3(properties: &Map<String, Value>) -> Option<String> {
    ISO_FIELDS
        .iter()
        .filter_map(|field| properties.get(*field)?.as_str())
        .find_map(valid_iso3)
}

fn first_name(properties: &Map<String, Value>) -> Option<String> {
    NAME_FIELDS
        .iter()
        .filter_map(|field| properties.get(*field)?.as_str())
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(str::to_string)
}

/// Add `iso3` and `display_name` to one feature's properties.
pub fn normalize_feature(feature: &mut Value) {
    let Some(object) = feature.as_object_mut() else {
        return;
    };

    let properties = object
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()));
    if !properties.is_object() {
        *properties = Value::Object(Map::new());
    }
    let Some(properties) = properties.as_object_mut() else {
        return;
    };

    let iso3 = first_iso3(properties);
    let name = first_name(properties);
    properties.insert("iso3".to_string(), iso3.map(Value::String).unwrap_or(Value::Null));
    properties.insert(
        "display_name".to_string(),
        name.map(Value::String).unwrap_or(Value::Null),
    );
}

/// Parse a GeoJSON feature collection and normalize every feature.
pub fn normalize_boundaries(payload: &str) -> Result<Value, PipelineError> {
    let mut collection: Value = serde_json::from_str(payload).map_err(|e| {
        PipelineError::empty(Dataset::Boundaries, format!("payload is not valid JSON: {}", e))
    })?;

    let features = collection
        .get_mut("features")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| PipelineError::empty(Dataset::Boundaries, "no 'features' list"))?;

    if features.is_empty() {
        return Err(PipelineError::empty(Dataset::Boundaries, "feature list is empty"));
    }

    features.iter_mut().for_each(normalize_feature);

    let unidentified = features
        .iter()
        .filter(|f| f["properties"]["iso3"].is_null())
        .count();
    if unidentified > 0 {
        warn!(unidentified, "boundary features without a 3-letter identifier");
    }
    info!(features = features.len(), "normalized boundary features");

    Ok(collection)
}
