use crate::records::{Driver, Field, LoadsRecord, Record, Source};
use crate::table::Row;

pub type RowCheck = fn(&Row) -> std::result::Result<(), String>;

/// Canonical column order and row shape for one logical table.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: String,
    pub header: Vec<String>,
    /// Transactional tables never inherit rows from the previous year.
    pub append_only: bool,
    check: Option<RowCheck>,
}

fn check_record<R: Record>(row: &Row) -> std::result::Result<(), String> {
    R::from_row(row).map(|_| ())
}

impl TableSchema {
    pub fn new(name: &str, header: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            header: header.iter().map(|h| h.to_string()).collect(),
            append_only: false,
            check: None,
        }
    }

    pub fn for_record<R: Record>() -> Self {
        Self {
            check: Some(check_record::<R>),
            ..Self::new(R::TABLE, R::HEADER)
        }
    }

    pub fn append_only(mut self) -> Self {
        self.append_only = true;
        self
    }

    pub fn check(&self, row: &Row) -> std::result::Result<(), String> {
        match self.check {
            Some(check) => check(row),
            None => Ok(()),
        }
    }
}

/// Ordered set of the tables every yearly spreadsheet carries.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    tables: Vec<TableSchema>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, schema: TableSchema) -> Self {
        self.tables.retain(|t| t.name != schema.name);
        self.tables.push(schema);
        self
    }

    /// Fields, sources, drivers and the append-only loads table.
    pub fn manure() -> Self {
        Self::new()
            .with(TableSchema::for_record::<Field>())
            .with(TableSchema::for_record::<Source>())
            .with(TableSchema::for_record::<Driver>())
            .with(TableSchema::for_record::<LoadsRecord>().append_only())
    }

    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}
