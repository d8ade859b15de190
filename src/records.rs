//! Typed records of the manure app, one per worksheet.
//!
//! Each record validates itself from a normalized [`Row`]. Validation is
//! strict: a value of the wrong type is an error, never coerced.

use crate::error::{Result, StoreError};
use crate::table::{Row, Table};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number, Value};

pub trait Record: Sized {
    const TABLE: &'static str;
    const HEADER: &'static [&'static str];

    fn from_row(row: &Row) -> std::result::Result<Self, String>;

    fn to_fields(&self) -> Map<String, Value>;

    fn lineno(&self) -> Option<u32>;

    fn to_row(&self, lineno: u32) -> Row {
        Row::new(lineno, self.to_fields())
    }

    fn header() -> Vec<String> {
        Self::HEADER.iter().map(|h| h.to_string()).collect()
    }
}

/// Converts every row of `table`, failing on the first bad one.
///
/// A missing table yields no records.
pub fn parse_records<R: Record>(table: Option<&Table>) -> Result<Vec<R>> {
    let Some(table) = table else {
        return Ok(Vec::new());
    };
    table
        .rows
        .iter()
        .map(|row| {
            R::from_row(row).map_err(|reason| StoreError::validation(&table.name, row.lineno, reason))
        })
        .collect()
}

fn require_string(row: &Row, record: &str, column: &str) -> std::result::Result<String, String> {
    match row.get(column) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) | None => Err(format!("Expected {}.{} to be present", record, column)),
        Some(other) => Err(format!(
            "Expected {}.{} ({}) to be a string",
            record, column, other
        )),
    }
}

fn require_number(row: &Row, record: &str, column: &str) -> std::result::Result<f64, String> {
    row.get(column)
        .and_then(Value::as_f64)
        .ok_or_else(|| format!("Expected {}.{} to be a number", record, column))
}

fn require_object(row: &Row, record: &str, column: &str) -> std::result::Result<Value, String> {
    match row.get(column) {
        Some(v @ Value::Object(_)) => Ok(v.clone()),
        _ => Err(format!(
            "Expected {}.{} to be a GeoJSON object",
            record, column
        )),
    }
}

/// Integral values go out as integers so "3" does not come back as "3.0".
pub(crate) fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Value::Number((n as i64).into());
    }
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Field {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    pub name: String,
    /// GeoJSON Feature with a Polygon or MultiPolygon geometry.
    pub boundary: Value,
}

pub fn check_boundary(boundary: &Value) -> std::result::Result<(), String> {
    if boundary.get("type").and_then(Value::as_str) != Some("Feature") {
        return Err("Expected Field.boundary to be a Feature".to_string());
    }
    match boundary
        .get("geometry")
        .and_then(|g| g.get("type"))
        .and_then(Value::as_str)
    {
        Some("Polygon") | Some("MultiPolygon") => Ok(()),
        _ => Err("Expected Field.boundary to be a Polygon or MultiPolygon".to_string()),
    }
}

impl Record for Field {
    const TABLE: &'static str = "fields";
    const HEADER: &'static [&'static str] = &["name", "boundary"];

    fn from_row(row: &Row) -> std::result::Result<Self, String> {
        let name = require_string(row, "Field", "name")?;
        let boundary = require_object(row, "Field", "boundary")?;
        check_boundary(&boundary)?;
        Ok(Field {
            lineno: Some(row.lineno),
            name,
            boundary,
        })
    }

    fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("name".into(), Value::String(self.name.clone()));
        fields.insert("boundary".into(), self.boundary.clone());
        fields
    }

    fn lineno(&self) -> Option<u32> {
        self.lineno
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Solid,
    Liquid,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Solid => "solid",
            SourceKind::Liquid => "liquid",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "solid" => Some(SourceKind::Solid),
            "liquid" => Some(SourceKind::Liquid),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// Acres covered by one load, used to plan loads per field.
    #[serde(rename = "acPerLoad")]
    pub ac_per_load: f64,
}

impl Record for Source {
    const TABLE: &'static str = "sources";
    const HEADER: &'static [&'static str] = &["name", "type", "acPerLoad"];

    fn from_row(row: &Row) -> std::result::Result<Self, String> {
        let name = require_string(row, "Source", "name")?;
        let kind_raw = require_string(row, "Source", "type")?;
        let kind = SourceKind::parse(&kind_raw).ok_or_else(|| {
            format!(
                "Expected Source.type ({}) to be solid or liquid",
                kind_raw
            )
        })?;
        let ac_per_load = require_number(row, "Source", "acPerLoad")?;
        Ok(Source {
            lineno: Some(row.lineno),
            name,
            kind,
            ac_per_load,
        })
    }

    fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("name".into(), Value::String(self.name.clone()));
        fields.insert("type".into(), Value::String(self.kind.as_str().into()));
        fields.insert("acPerLoad".into(), number_value(self.ac_per_load));
        fields
    }

    fn lineno(&self) -> Option<u32> {
        self.lineno
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Driver {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    pub name: String,
}

impl Record for Driver {
    const TABLE: &'static str = "drivers";
    const HEADER: &'static [&'static str] = &["name"];

    fn from_row(row: &Row) -> std::result::Result<Self, String> {
        Ok(Driver {
            lineno: Some(row.lineno),
            name: require_string(row, "Driver", "name")?,
        })
    }

    fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("name".into(), Value::String(self.name.clone()));
        fields
    }

    fn lineno(&self) -> Option<u32> {
        self.lineno
    }
}

/// Key fields identifying one day's loads for a field/source/driver combination.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LoadKey {
    pub date: String,
    pub field: String,
    pub source: String,
    pub driver: String,
}

impl LoadKey {
    pub fn is_complete(&self) -> bool {
        [&self.date, &self.field, &self.source, &self.driver]
            .iter()
            .all(|v| !v.trim().is_empty())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoadsRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    pub date: String,
    pub field: String,
    pub source: String,
    pub loads: u32,
    pub driver: String,
    /// FeatureCollection of Point features, one per recorded load.
    pub geojson: Value,
}

pub fn empty_point_collection() -> Value {
    json!({ "type": "FeatureCollection", "features": [] })
}

pub fn point_feature(lon: f64, lat: f64) -> Value {
    json!({
        "type": "Feature",
        "properties": {},
        "geometry": { "type": "Point", "coordinates": [number_value(lon), number_value(lat)] },
    })
}

pub fn check_point_collection(geojson: &Value) -> std::result::Result<(), String> {
    if geojson.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        return Err("Expected LoadsRecord.geojson to be a FeatureCollection".to_string());
    }
    let features = geojson
        .get("features")
        .and_then(Value::as_array)
        .ok_or("Expected LoadsRecord.geojson to be a FeatureCollection of Features")?;
    for feature in features {
        if feature.get("type").and_then(Value::as_str) != Some("Feature") {
            return Err(
                "Expected LoadsRecord.geojson to be a FeatureCollection of Features".to_string(),
            );
        }
        let geometry = feature.get("geometry");
        let is_point = geometry
            .and_then(|g| g.get("type"))
            .and_then(Value::as_str)
            == Some("Point");
        let coords_ok = geometry
            .and_then(|g| g.get("coordinates"))
            .and_then(Value::as_array)
            .map(|c| c.len() == 2 && c.iter().all(Value::is_number))
            .unwrap_or(false);
        if !is_point || !coords_ok {
            return Err(
                "Expected LoadsRecord.geojson to be a FeatureCollection of Points".to_string(),
            );
        }
    }
    Ok(())
}

impl LoadsRecord {
    pub fn key(&self) -> LoadKey {
        LoadKey {
            date: self.date.clone(),
            field: self.field.clone(),
            source: self.source.clone(),
            driver: self.driver.clone(),
        }
    }

    pub fn matches(&self, key: &LoadKey) -> bool {
        self.date == key.date
            && self.field == key.field
            && self.source == key.source
            && self.driver == key.driver
    }

    /// `[lon, lat]` of every recorded point.
    pub fn points(&self) -> Vec<[f64; 2]> {
        self.geojson
            .get("features")
            .and_then(Value::as_array)
            .map(|features| {
                features
                    .iter()
                    .filter_map(|f| f.pointer("/geometry/coordinates"))
                    .filter_map(|c| Some([c.get(0)?.as_f64()?, c.get(1)?.as_f64()?]))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Record for LoadsRecord {
    const TABLE: &'static str = "loads";
    const HEADER: &'static [&'static str] =
        &["date", "field", "source", "loads", "driver", "geojson"];

    fn from_row(row: &Row) -> std::result::Result<Self, String> {
        let date = require_string(row, "LoadsRecord", "date")?;
        let field = require_string(row, "LoadsRecord", "field")?;
        let source = require_string(row, "LoadsRecord", "source")?;
        let driver = require_string(row, "LoadsRecord", "driver")?;
        let loads = require_number(row, "LoadsRecord", "loads")?;
        if loads < 0.0 || loads.fract() != 0.0 || loads > u32::MAX as f64 {
            return Err(format!(
                "Expected LoadsRecord.loads ({}) to be a whole number",
                loads
            ));
        }
        let geojson = require_object(row, "LoadsRecord", "geojson")?;
        check_point_collection(&geojson)?;
        Ok(LoadsRecord {
            lineno: Some(row.lineno),
            date,
            field,
            source,
            loads: loads as u32,
            driver,
            geojson,
        })
    }

    fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("date".into(), Value::String(self.date.clone()));
        fields.insert("field".into(), Value::String(self.field.clone()));
        fields.insert("source".into(), Value::String(self.source.clone()));
        fields.insert("loads".into(), Value::Number(self.loads.into()));
        fields.insert("driver".into(), Value::String(self.driver.clone()));
        fields.insert("geojson".into(), self.geojson.clone());
        fields
    }

    fn lineno(&self) -> Option<u32> {
        self.lineno
    }
}
