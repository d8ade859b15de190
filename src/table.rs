use crate::error::{Result, StoreError};
use crate::node::NodeId;
use crate::remote::{RawRow, RawTable, Tabular, WriteMode};
use crate::schema::SchemaCatalog;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, info};

pub const HEADER_LINENO: u32 = 1;
pub const FIRST_DATA_LINENO: u32 = 2;

/// One data row. `lineno` is the row's address in its worksheet, not a key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Row {
    pub lineno: u32,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Row {
    pub fn new(lineno: u32, fields: Map<String, Value>) -> Self {
        Self { lineno, fields }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn max_lineno(&self) -> Option<u32> {
        self.rows.iter().map(|r| r.lineno).max()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Spreadsheet {
    pub id: NodeId,
    pub tables: BTreeMap<String, Table>,
}

impl Spreadsheet {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }
}

fn number_re() -> &'static Regex {
    static NUMBER_RE: OnceLock<Regex> = OnceLock::new();
    NUMBER_RE.get_or_init(|| {
        Regex::new(r"^-?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)$").expect("number pattern is valid")
    })
}

/// Turns a text cell from the service into a typed value.
///
/// Blank cells are absent. Whole-cell decimals become numbers and cells that
/// hold a JSON object or array become that JSON. Everything else is a string.
pub fn normalize_cell(raw: &str) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }
    let trimmed = raw.trim();
    if number_re().is_match(trimmed) {
        if let Ok(n) = trimmed.parse::<i64>() {
            return Some(Value::Number(n.into()));
        }
        if let Some(n) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
            return Some(Value::Number(n));
        }
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
            return Some(json);
        }
    }
    Some(Value::String(raw.to_string()))
}

/// Inverse of [`normalize_cell`] for the write path.
pub fn encode_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Parses a raw worksheet into rows, recomputing line numbers from position.
pub fn parse_raw_table(name: &str, raw: RawTable) -> Result<Table> {
    let mut rows = Vec::new();
    for (idx, cells) in raw.rows.into_iter().enumerate() {
        let lineno = FIRST_DATA_LINENO + idx as u32;
        let mut fields = Map::new();
        for (col, cell) in cells.iter().enumerate() {
            let Some(value) = normalize_cell(cell) else {
                continue;
            };
            match raw.header.get(col).filter(|h| !h.is_empty()) {
                Some(column) => {
                    fields.insert(column.clone(), value);
                }
                None => {
                    return Err(StoreError::validation(
                        name,
                        lineno,
                        format!("value in column {} has no header", col + 1),
                    ))
                }
            }
        }
        if fields.is_empty() {
            continue;
        }
        rows.push(Row { lineno, fields });
    }

    Ok(Table {
        name: name.to_string(),
        header: raw.header,
        rows,
    })
}

/// Loads whole spreadsheets into tables and writes rows back by line number.
pub struct TableStore<'a, T: Tabular + ?Sized> {
    remote: &'a T,
    catalog: &'a SchemaCatalog,
}

impl<'a, T: Tabular + ?Sized> TableStore<'a, T> {
    pub fn new(remote: &'a T, catalog: &'a SchemaCatalog) -> Self {
        Self { remote, catalog }
    }

    /// Reads every worksheet and validates rows of tables the catalog knows.
    ///
    /// The first bad row fails the whole load.
    pub async fn load(&self, spreadsheet: &NodeId) -> Result<Spreadsheet> {
        let loaded = self.load_unchecked(spreadsheet).await?;
        for table in loaded.tables.values() {
            self.validate(table)?;
        }
        Ok(loaded)
    }

    /// Reads every worksheet with structural checks only.
    pub async fn load_unchecked(&self, spreadsheet: &NodeId) -> Result<Spreadsheet> {
        let mut tables = BTreeMap::new();
        for name in self.remote.list_tables(spreadsheet).await? {
            let raw = self.remote.read_table(spreadsheet, &name).await?;
            let table = parse_raw_table(&name, raw)?;
            debug!(table = %name, rows = table.rows.len(), "loaded worksheet");
            tables.insert(name, table);
        }
        Ok(Spreadsheet {
            id: spreadsheet.clone(),
            tables,
        })
    }

    pub fn validate(&self, table: &Table) -> Result<()> {
        let Some(schema) = self.catalog.get(&table.name) else {
            return Ok(());
        };
        for row in &table.rows {
            schema
                .check(row)
                .map_err(|reason| StoreError::validation(&table.name, row.lineno, reason))?;
        }
        Ok(())
    }

    /// Writes `rows` at their line numbers, re-sending `header` as line 1.
    ///
    /// Nothing is rolled back if the call fails part way; reload to see what landed.
    pub async fn batch_upsert(
        &self,
        spreadsheet: &NodeId,
        table: &str,
        rows: &[Row],
        header: &[String],
        mode: WriteMode,
    ) -> Result<()> {
        if header.is_empty() {
            return Err(StoreError::InvalidInput(format!(
                "cannot write to '{}' without a header",
                table
            )));
        }

        let mut raw_rows = Vec::with_capacity(rows.len());
        for row in rows {
            if row.lineno < FIRST_DATA_LINENO {
                return Err(StoreError::InvalidInput(format!(
                    "line {} of '{}' is not a data row",
                    row.lineno, table
                )));
            }
            if let Some(extra) = row.fields.keys().find(|k| !header.contains(k)) {
                return Err(StoreError::InvalidInput(format!(
                    "column '{}' is not in the header of '{}'",
                    extra, table
                )));
            }
            let cells = header
                .iter()
                .map(|h| row.fields.get(h).map(encode_cell).unwrap_or_default())
                .collect();
            raw_rows.push(RawRow {
                lineno: row.lineno,
                cells,
            });
        }

        info!(table = %table, rows = raw_rows.len(), mode = ?mode, "batch upsert");
        self.remote
            .write_rows(spreadsheet, table, &raw_rows, header, mode)
            .await
    }
}
