//! Field boundaries arriving as a GeoJSON FeatureCollection.
//!
//! Converting KMZ/KML to GeoJSON happens before this point.

use crate::error::{Result, StoreError};
use crate::reconcile::next_lineno;
use crate::records::{check_boundary, Field};
use serde_json::{json, Value};

const UNNAMED_FIELD: &str = "Unnamed Field";

/// Pulls `(name, boundary feature)` pairs for every polygon in `bytes`.
pub fn parse_boundaries(bytes: &[u8]) -> Result<Vec<(String, Value)>> {
    let doc: Value = serde_json::from_slice(bytes)
        .map_err(|e| StoreError::InvalidInput(format!("upload is not GeoJSON: {}", e)))?;
    if doc.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        return Err(StoreError::InvalidInput(
            "upload must be a GeoJSON FeatureCollection".to_string(),
        ));
    }
    let features = doc
        .get("features")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut parsed = Vec::new();
    for feature in features {
        let Some(geometry) = feature.get("geometry").filter(|g| !g.is_null()) else {
            continue;
        };
        let name = feature
            .pointer("/properties/name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(UNNAMED_FIELD)
            .to_string();
        let boundary = json!({
            "type": "Feature",
            "properties": { "name": name },
            "geometry": geometry,
        });
        if check_boundary(&boundary).is_ok() {
            parsed.push((name, boundary));
        }
    }
    Ok(parsed)
}

/// Updates for fields that already exist by name, inserts for the rest.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BoundaryPlan {
    pub updates: Vec<Field>,
    pub inserts: Vec<Field>,
}

pub fn plan_boundaries(existing: &[Field], uploaded: Vec<(String, Value)>) -> BoundaryPlan {
    let mut plan = BoundaryPlan::default();
    let mut next = next_lineno(existing.iter().filter_map(|f| f.lineno));

    for (name, boundary) in uploaded {
        // A name repeated within one upload keeps the last boundary.
        if let Some(planned) = plan
            .updates
            .iter_mut()
            .chain(plan.inserts.iter_mut())
            .find(|f| f.name == name)
        {
            planned.boundary = boundary;
            continue;
        }
        match existing.iter().find(|f| f.name == name) {
            Some(field) => plan.updates.push(Field {
                lineno: field.lineno,
                name,
                boundary,
            }),
            None => {
                plan.inserts.push(Field {
                    lineno: Some(next),
                    name,
                    boundary,
                });
                next += 1;
            }
        }
    }
    plan
}
