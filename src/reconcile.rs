use crate::error::{Result, StoreError};
use crate::records::{empty_point_collection, point_feature, LoadKey, LoadsRecord};
use crate::table::FIRST_DATA_LINENO;
use serde_json::Value;
use std::collections::HashMap;

/// Next free line number after `linenos`. An empty table still has its header on line 1.
pub fn next_lineno<I: IntoIterator<Item = u32>>(linenos: I) -> u32 {
    linenos
        .into_iter()
        .max()
        .unwrap_or(FIRST_DATA_LINENO - 1)
        .max(FIRST_DATA_LINENO - 1)
        + 1
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub lineno: u32,
    pub is_new: bool,
    pub loads: u32,
    /// Points already recorded on the matched row.
    pub geojson: Value,
}

/// Finds the row a candidate load belongs to, or the line a new one goes on.
pub struct RecordReconciler;

impl RecordReconciler {
    /// `loads_edit` is the quantity the current edit sets, if it touches it at all.
    pub fn resolve_lineno(
        key: &LoadKey,
        loads_edit: Option<u32>,
        existing: &[LoadsRecord],
    ) -> Resolution {
        let matched = existing
            .iter()
            .find(|r| r.lineno.is_some() && r.matches(key));

        match matched {
            Some(row) => Resolution {
                lineno: row.lineno.unwrap_or(FIRST_DATA_LINENO),
                is_new: false,
                loads: loads_edit.unwrap_or(row.loads),
                geojson: row.geojson.clone(),
            },
            None => Resolution {
                lineno: next_lineno(existing.iter().filter_map(|r| r.lineno)),
                is_new: true,
                loads: loads_edit.unwrap_or(0),
                geojson: empty_point_collection(),
            },
        }
    }
}

/// Key-tuple index over one load of the loads table.
///
/// Rebuild it after every load; it does not follow later edits.
#[derive(Debug, Default)]
pub struct LoadIndex {
    by_key: HashMap<LoadKey, usize>,
    next: u32,
}

impl LoadIndex {
    pub fn build(records: &[LoadsRecord]) -> Self {
        let mut by_key = HashMap::new();
        for (pos, record) in records.iter().enumerate() {
            if record.lineno.is_some() {
                by_key.entry(record.key()).or_insert(pos);
            }
        }
        Self {
            by_key,
            next: next_lineno(records.iter().filter_map(|r| r.lineno)),
        }
    }

    pub fn position(&self, key: &LoadKey) -> Option<usize> {
        self.by_key.get(key).copied()
    }

    pub fn next_lineno(&self) -> u32 {
        self.next
    }
}

/// Partial change coming from the load form.
#[derive(Debug, Clone, Default)]
pub struct LoadPatch {
    pub date: Option<String>,
    pub field: Option<String>,
    pub source: Option<String>,
    pub driver: Option<String>,
    pub loads: Option<u32>,
}

impl LoadPatch {
    fn touches_key(&self) -> bool {
        self.date.is_some() || self.field.is_some() || self.source.is_some() || self.driver.is_some()
    }
}

/// Draft load being edited, kept in step with the rows it may land on.
#[derive(Debug, Clone)]
pub struct LoadEditor {
    key: LoadKey,
    resolution: Resolution,
}

impl LoadEditor {
    pub fn new(key: LoadKey, existing: &[LoadsRecord]) -> Self {
        let resolution = RecordReconciler::resolve_lineno(&key, None, existing);
        Self { key, resolution }
    }

    pub fn key(&self) -> &LoadKey {
        &self.key
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    /// Applies a form change. Any key change re-resolves the target row.
    pub fn apply(&mut self, patch: LoadPatch, existing: &[LoadsRecord]) -> &Resolution {
        if patch.touches_key() {
            if let Some(date) = patch.date {
                self.key.date = date;
            }
            if let Some(field) = patch.field {
                self.key.field = field;
            }
            if let Some(source) = patch.source {
                self.key.source = source;
            }
            if let Some(driver) = patch.driver {
                self.key.driver = driver;
            }
            self.resolution = RecordReconciler::resolve_lineno(&self.key, patch.loads, existing);
        } else if let Some(loads) = patch.loads {
            self.resolution.loads = loads;
        }
        &self.resolution
    }

    /// Counts one more load, optionally at a `[lon, lat]` position.
    pub fn record_load(&mut self, position: Option<[f64; 2]>) {
        self.resolution.loads += 1;
        if let Some([lon, lat]) = position {
            if let Some(features) = self
                .resolution
                .geojson
                .get_mut("features")
                .and_then(Value::as_array_mut)
            {
                features.push(point_feature(lon, lat));
            }
        }
    }

    /// The record to save, addressed at the resolved line.
    pub fn record(&self) -> Result<LoadsRecord> {
        if !self.key.is_complete() {
            return Err(StoreError::InvalidInput(
                "choose a date, field, source and driver before saving".to_string(),
            ));
        }
        Ok(LoadsRecord {
            lineno: Some(self.resolution.lineno),
            date: self.key.date.clone(),
            field: self.key.field.clone(),
            source: self.key.source.clone(),
            loads: self.resolution.loads,
            driver: self.key.driver.clone(),
            geojson: self.resolution.geojson.clone(),
        })
    }
}
