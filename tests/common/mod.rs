use anyhow::Result;
use opendal::services::Memory;
use opendal::Operator;
use serde_json::{json, Value};
use sheetstore_core::node::NodeId;
use sheetstore_core::remote::{OpendalRemote, RawRow, Tabular, WriteMode};

#[allow(dead_code)]
pub fn setup_operator() -> Result<Operator> {
    let builder = Memory::default();
    let op = Operator::new(builder)?.finish();
    Ok(op)
}

#[allow(dead_code)]
pub fn setup_remote() -> Result<OpendalRemote> {
    Ok(OpendalRemote::new(setup_operator()?))
}

/// Creates `table` in `sheet` and fills it with `header` and `rows` from line 2.
#[allow(dead_code)]
pub async fn seed_table(
    remote: &OpendalRemote,
    sheet: &NodeId,
    table: &str,
    header: &[&str],
    rows: &[Vec<String>],
) -> Result<()> {
    remote.create_table(sheet, table).await?;
    let header: Vec<String> = header.iter().map(|h| h.to_string()).collect();
    let raw: Vec<RawRow> = rows
        .iter()
        .enumerate()
        .map(|(idx, cells)| RawRow {
            lineno: 2 + idx as u32,
            cells: cells.clone(),
        })
        .collect();
    remote
        .write_rows(sheet, table, &raw, &header, WriteMode::Update)
        .await?;
    Ok(())
}

#[allow(dead_code)]
pub fn cells(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[allow(dead_code)]
pub fn square(name: &str, offset: f64) -> Value {
    json!({
        "type": "Feature",
        "properties": { "name": name },
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [offset, 0.0], [offset + 1.0, 0.0], [offset + 1.0, 1.0], [offset, 1.0], [offset, 0.0]
            ]]
        }
    })
}

#[allow(dead_code)]
pub fn empty_points() -> String {
    r#"{"type":"FeatureCollection","features":[]}"#.to_string()
}
