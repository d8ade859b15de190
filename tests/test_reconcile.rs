use serde_json::json;
use sheetstore_core::error::StoreError;
use sheetstore_core::reconcile::{next_lineno, LoadEditor, LoadIndex, LoadPatch, RecordReconciler};
use sheetstore_core::records::{empty_point_collection, point_feature, LoadKey, LoadsRecord};

fn load(lineno: u32, date: &str, field: &str, loads: u32) -> LoadsRecord {
    LoadsRecord {
        lineno: Some(lineno),
        date: date.into(),
        field: field.into(),
        source: "Pit 1".into(),
        loads,
        driver: "Ann".into(),
        geojson: empty_point_collection(),
    }
}

fn key(date: &str, field: &str) -> LoadKey {
    LoadKey {
        date: date.into(),
        field: field.into(),
        source: "Pit 1".into(),
        driver: "Ann".into(),
    }
}

#[test]
fn test_reconcile_next_lineno_starts_after_header() {
    assert_eq!(next_lineno(Vec::<u32>::new()), 2);
    assert_eq!(next_lineno([2, 7, 4]), 8);
}

#[test]
fn test_reconcile_match_reuses_line_and_quantity() {
    let mut matched = load(3, "2024-04-03", "North", 3);
    matched.geojson = json!({
        "type": "FeatureCollection",
        "features": [point_feature(-86.1, 40.2)],
    });
    let existing = vec![load(2, "2024-04-02", "North", 1), matched.clone()];

    let res = RecordReconciler::resolve_lineno(&key("2024-04-03", "North"), None, &existing);
    assert_eq!(res.lineno, 3);
    assert!(!res.is_new);
    assert_eq!(res.loads, 3);
    assert_eq!(res.geojson, matched.geojson);

    let edited = RecordReconciler::resolve_lineno(&key("2024-04-03", "North"), Some(5), &existing);
    assert_eq!(edited.lineno, 3);
    assert_eq!(edited.loads, 5);
}

#[test]
fn test_reconcile_no_match_goes_after_last_line() {
    let existing = vec![load(2, "2024-04-02", "North", 1), load(5, "2024-04-03", "North", 3)];

    let res = RecordReconciler::resolve_lineno(&key("2024-04-03", "South"), None, &existing);
    assert_eq!(res.lineno, 6);
    assert!(res.is_new);
    assert_eq!(res.loads, 0);
    assert_eq!(res.geojson, empty_point_collection());

    let first = RecordReconciler::resolve_lineno(&key("2024-04-03", "South"), None, &[]);
    assert_eq!(first.lineno, 2);
}

#[test]
fn test_reconcile_index_matches_linear_scan() {
    let existing = vec![load(2, "2024-04-02", "North", 1), load(4, "2024-04-03", "North", 3)];
    let index = LoadIndex::build(&existing);
    assert_eq!(index.position(&key("2024-04-03", "North")), Some(1));
    assert_eq!(index.position(&key("2024-04-03", "South")), None);
    assert_eq!(index.next_lineno(), 5);
}

#[test]
fn test_reconcile_editor_follows_key_changes() {
    let existing = vec![load(2, "2024-04-02", "North", 1), load(3, "2024-04-03", "North", 3)];
    let mut editor = LoadEditor::new(key("2024-04-03", "North"), &existing);
    assert_eq!(editor.resolution().lineno, 3);
    assert_eq!(editor.resolution().loads, 3);

    editor.record_load(Some([-86.1, 40.2]));
    assert_eq!(editor.resolution().loads, 4);

    // Changing the date moves the draft to a fresh line.
    let res = editor.apply(
        LoadPatch {
            date: Some("2024-04-04".into()),
            ..LoadPatch::default()
        },
        &existing,
    );
    assert!(res.is_new);
    assert_eq!(res.lineno, 4);
    assert_eq!(res.loads, 0);

    // A quantity-only edit keeps the line.
    let res = editor.apply(
        LoadPatch {
            loads: Some(2),
            ..LoadPatch::default()
        },
        &existing,
    );
    assert_eq!(res.lineno, 4);
    assert_eq!(res.loads, 2);

    editor.record_load(Some([-86.0, 40.0]));
    let record = editor.record().expect("complete key");
    assert_eq!(record.lineno, Some(4));
    assert_eq!(record.date, "2024-04-04");
    assert_eq!(record.loads, 3);
    assert_eq!(record.points(), vec![[-86.0, 40.0]]);
}

#[test]
fn test_reconcile_editor_requires_complete_key() {
    let mut editor = LoadEditor::new(LoadKey::default(), &[]);
    editor.apply(
        LoadPatch {
            date: Some("2024-04-04".into()),
            field: Some("North".into()),
            ..LoadPatch::default()
        },
        &[],
    );
    let err = editor.record().expect_err("source and driver missing");
    assert!(matches!(err, StoreError::InvalidInput(_)));
}
