mod common;
use common::square;
use serde_json::json;
use sheetstore_core::boundaries::{parse_boundaries, plan_boundaries};
use sheetstore_core::error::StoreError;
use sheetstore_core::records::Field;

fn collection(features: Vec<serde_json::Value>) -> Vec<u8> {
    json!({ "type": "FeatureCollection", "features": features })
        .to_string()
        .into_bytes()
}

#[test]
fn test_boundaries_parse_names_and_skips_non_polygons() -> anyhow::Result<()> {
    let mut unnamed = square("", 4.0);
    unnamed["properties"] = json!({});
    let bytes = collection(vec![
        square("North", 0.0),
        unnamed,
        json!({ "type": "Feature", "properties": { "name": "Gate" },
                "geometry": { "type": "Point", "coordinates": [0.0, 0.0] } }),
        json!({ "type": "Feature", "properties": { "name": "Empty" }, "geometry": null }),
    ]);

    let parsed = parse_boundaries(&bytes)?;
    let names: Vec<&str> = parsed.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["North", "Unnamed Field"]);
    assert_eq!(parsed[1].1["properties"]["name"], "Unnamed Field");
    Ok(())
}

#[test]
fn test_boundaries_parse_rejects_non_collections() {
    let err = parse_boundaries(br#"{"type":"Feature"}"#).expect_err("not a collection");
    assert!(matches!(err, StoreError::InvalidInput(_)));
    let err = parse_boundaries(b"PK\x03\x04").expect_err("not json");
    assert!(matches!(err, StoreError::InvalidInput(_)));
}

#[test]
fn test_boundaries_plan_updates_by_name_and_appends_the_rest() {
    let existing = vec![
        Field { lineno: Some(2), name: "North".into(), boundary: square("North", 0.0) },
        Field { lineno: Some(4), name: "South".into(), boundary: square("South", 2.0) },
    ];
    let uploaded = vec![
        ("South".to_string(), square("South", 9.0)),
        ("East".to_string(), square("East", 5.0)),
        ("West".to_string(), square("West", 6.0)),
        ("East".to_string(), square("East", 7.0)),
    ];

    let plan = plan_boundaries(&existing, uploaded);
    assert_eq!(plan.updates.len(), 1);
    assert_eq!(plan.updates[0].lineno, Some(4));
    assert_eq!(plan.updates[0].boundary, square("South", 9.0));

    let inserts: Vec<(&str, Option<u32>)> = plan
        .inserts
        .iter()
        .map(|f| (f.name.as_str(), f.lineno))
        .collect();
    assert_eq!(inserts, vec![("East", Some(5)), ("West", Some(6))]);
    // The later duplicate wins.
    assert_eq!(plan.inserts[0].boundary, square("East", 7.0));
}
