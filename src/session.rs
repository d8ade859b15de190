//! The surface the farm forms talk to: load a year, save a load, import boundaries.
//!
//! Every operation either fully succeeds or leaves one user-facing notice
//! behind. Failures that cast doubt on a cached spreadsheet id clear the
//! identifier cache so the next attempt resolves from scratch.

use crate::boundaries::{parse_boundaries, plan_boundaries};
use crate::cache::IdentityCache;
use crate::config::{Period, StoreConfig, YearPaths};
use crate::drift::{DriftGuard, DriftReport};
use crate::error::{Result, StoreError};
use crate::node::NodeId;
use crate::path::PathResolver;
use crate::provision::SpreadsheetProvisioner;
use crate::reconcile::{LoadEditor, LoadIndex, RecordReconciler};
use crate::records::{
    check_point_collection, parse_records, Driver, Field, LoadKey, LoadsRecord, Record, Source,
};
use crate::remote::{OpendalRemote, RemoteService, WriteMode};
use crate::schema::SchemaCatalog;
use crate::storage::operator_from_uri;
use crate::table::{Spreadsheet, TableStore};
use chrono::Utc;
use opendal::Operator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A message meant for the person using the app.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct YearData {
    pub period: Period,
    pub last_period: Option<Period>,
    pub fields: Vec<Field>,
    pub sources: Vec<Source>,
    pub drivers: Vec<Driver>,
    pub loads: Vec<LoadsRecord>,
    /// Read-only history; never written back.
    pub last_year_loads: Vec<LoadsRecord>,
    pub headers: BTreeMap<String, Vec<String>>,
}

impl YearData {
    fn from_sheets(
        year: i32,
        this_year: Spreadsheet,
        last_year: Option<Spreadsheet>,
    ) -> Result<Self> {
        let last_year_loads = match &last_year {
            Some(sheet) => parse_records::<LoadsRecord>(sheet.table(LoadsRecord::TABLE))?,
            None => Vec::new(),
        };
        Ok(YearData {
            period: Period {
                year,
                spreadsheet: this_year.id.clone(),
            },
            last_period: last_year.as_ref().map(|sheet| Period {
                year: year - 1,
                spreadsheet: sheet.id.clone(),
            }),
            fields: parse_records(this_year.table(Field::TABLE))?,
            sources: parse_records(this_year.table(Source::TABLE))?,
            drivers: parse_records(this_year.table(Driver::TABLE))?,
            loads: parse_records(this_year.table(LoadsRecord::TABLE))?,
            last_year_loads,
            headers: this_year
                .tables
                .iter()
                .map(|(name, table)| (name.clone(), table.header.clone()))
                .collect(),
        })
    }

    /// Header to write `R` rows with: the sheet's own order, plus any
    /// canonical columns the sheet is missing appended at the end.
    pub fn header_for<R: Record>(&self) -> Vec<String> {
        let mut header = self
            .headers
            .get(R::TABLE)
            .cloned()
            .unwrap_or_default();
        for column in R::HEADER {
            if !header.iter().any(|h| h == column) {
                header.push(column.to_string());
            }
        }
        header
    }
}

#[derive(Debug, Clone)]
pub struct YearLoad {
    pub data: YearData,
    pub drift: Vec<DriftReport>,
}

impl YearLoad {
    /// True when this year's spreadsheet moved while it was being loaded.
    pub fn reload_recommended(&self) -> bool {
        self.drift
            .iter()
            .any(|d| !d.valid && d.cached == self.data.period.spreadsheet)
    }
}

pub struct FarmSession<R: RemoteService> {
    remote: R,
    config: StoreConfig,
    catalog: SchemaCatalog,
    cache_op: Operator,
    cache: IdentityCache,
    data: Option<YearData>,
    notices: Vec<Notice>,
}

impl FarmSession<OpendalRemote> {
    /// Opens a session on the operators named by `config`.
    pub async fn from_config(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let remote = OpendalRemote::new(operator_from_uri(&config.remote_uri)?);
        let cache_op = operator_from_uri(&config.cache_uri)?;
        Self::open(remote, config, cache_op).await
    }
}

impl<R: RemoteService> FarmSession<R> {
    /// Reads the persisted id cache and prepares a session. Nothing remote is touched.
    pub async fn open(remote: R, config: StoreConfig, cache_op: Operator) -> Result<Self> {
        config.validate()?;
        let cache = IdentityCache::load(&cache_op, &config.app_name).await?;
        Ok(Self {
            remote,
            config,
            catalog: SchemaCatalog::manure(),
            cache_op,
            cache,
            data: None,
            notices: Vec::new(),
        })
    }

    pub fn with_catalog(mut self, catalog: SchemaCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    pub fn data(&self) -> Option<&YearData> {
        self.data.as_ref()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notice(&mut self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        info!(level = ?level, text = %message, "notice");
        self.notices.push(Notice { level, message });
    }

    async fn persist_cache(&mut self) {
        if let Err(e) = self.cache.save(&self.cache_op).await {
            warn!(error = %e, "could not persist sheet id cache");
        }
    }

    /// Reports `err` to the user and drops cached ids when they may be stale.
    async fn surface(&mut self, err: StoreError, clear_cache: bool) -> StoreError {
        error!(error = %err, "operation failed");
        self.notice(NoticeLevel::Error, err.user_message());
        if clear_cache {
            info!("invalidating sheet id cache in case the error needs new sheets");
            self.cache.clear();
            self.persist_cache().await;
        }
        err
    }

    /// Provisions (when needed) and loads `year` plus last year's loads.
    ///
    /// Drift is checked after the data is loaded; a moved spreadsheet for this
    /// year clears the cache and recommends a reload, a moved one for last
    /// year triggers a single immediate reload.
    pub async fn ensure_and_load_year(&mut self, year: i32) -> Result<YearLoad> {
        let paths = self.config.year_paths(year);
        let first = self.load_cycle(year, &paths).await?;

        let this_year_moved = first
            .drift
            .iter()
            .any(|d| !d.valid && d.path_key == paths.this_year);
        let last_year_moved = first
            .drift
            .iter()
            .any(|d| !d.valid && d.path_key == paths.last_year);
        if !last_year_moved || this_year_moved {
            return Ok(first);
        }

        info!("last year's spreadsheet moved, reloading with cleared id");
        let mut second = self.load_cycle(year, &paths).await?;
        let mut drift = first.drift;
        drift.append(&mut second.drift);
        second.drift = drift;
        Ok(second)
    }

    async fn load_cycle(&mut self, year: i32, paths: &YearPaths) -> Result<YearLoad> {
        let data = match self.provision_and_load(year, paths).await {
            Ok(data) => data,
            Err(e) => return Err(self.surface(e, true).await),
        };
        let drift = self.check_drift(&data, paths).await;
        self.data = Some(data.clone());
        Ok(YearLoad { data, drift })
    }

    async fn provision_and_load(&mut self, year: i32, paths: &YearPaths) -> Result<YearData> {
        let this_id = match self.cache.get(&paths.this_year).cloned() {
            Some(id) => {
                info!(id = %id, "already have this year's id, will double-check it after loading");
                id
            }
            None => self.provision(paths).await?,
        };
        let last_id = self.cache.get(&paths.last_year).cloned();

        let store = TableStore::new(&self.remote, &self.catalog);
        info!(id = %this_id, "loading this year's spreadsheet");
        let this_year = store.load(&this_id).await?;
        let last_year = match &last_id {
            Some(id) => {
                info!(id = %id, "loading last year's spreadsheet");
                Some(store.load(id).await?)
            }
            None => None,
        };

        YearData::from_sheets(year, this_year, last_year)
    }

    async fn provision(&mut self, paths: &YearPaths) -> Result<NodeId> {
        self.notice(NoticeLevel::Info, "Setting up this year's spreadsheets");
        // Whatever was cached is suspect once we have to provision.
        self.cache.clear();
        self.persist_cache().await;

        let provisioned = SpreadsheetProvisioner::new(&self.remote, &self.catalog)
            .ensure(&paths.this_year, &paths.last_year)
            .await?;
        let last_year = PathResolver::new(&self.remote)
            .find(&paths.last_year)
            .await?;

        self.cache.set(&paths.this_year, provisioned.id.clone());
        if let Some(id) = last_year {
            self.cache.set(&paths.last_year, id);
        }
        self.persist_cache().await;
        Ok(provisioned.id)
    }

    async fn check_drift(&mut self, data: &YearData, paths: &YearPaths) -> Vec<DriftReport> {
        let guard = DriftGuard::new(&self.remote);
        let mut reports = vec![
            guard
                .verify(&paths.this_year, &data.period.spreadsheet, &mut self.cache)
                .await,
        ];
        if let Some(last) = &data.last_period {
            reports.push(
                guard
                    .verify(&paths.last_year, &last.spreadsheet, &mut self.cache)
                    .await,
            );
        }

        let mut changed = false;
        for report in reports.iter().filter(|r| !r.valid) {
            changed = true;
            if report.path_key != paths.this_year {
                self.notice(
                    NoticeLevel::Warning,
                    "WARNING: last year's sheet has changed its id remotely, reloading it.",
                );
                continue;
            }
            // Nothing cached for the year can be trusted once this year's sheet moved.
            self.cache.clear();
            if let Some(err) = report.to_error() {
                self.notice(NoticeLevel::Warning, err.user_message());
            }
        }
        if changed {
            self.persist_cache().await;
        }
        reports
    }

    /// Starts a form draft against the loaded loads.
    pub fn editor(&self, key: LoadKey) -> Result<LoadEditor> {
        let data = self.loaded()?;
        Ok(LoadEditor::new(key, &data.loads))
    }

    fn loaded(&self) -> Result<&YearData> {
        self.data
            .as_ref()
            .ok_or_else(|| StoreError::InvalidInput("load a year before editing it".to_string()))
    }

    /// The loaded year, provided its spreadsheet id is still the cached one.
    ///
    /// Drift or an earlier failure clears the cache; writes then wait for a reload.
    fn writable(&self) -> Result<&YearData> {
        let data = self.loaded()?;
        let path = self.config.year_path(data.period.year);
        match self.cache.get(&path) {
            Some(id) if *id == data.period.spreadsheet => Ok(data),
            cached => Err(StoreError::DriftDetected {
                path,
                cached: data.period.spreadsheet.to_string(),
                resolved: cached
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "nothing".to_string()),
            }),
        }
    }

    /// Writes one load record at the line its key fields resolve to.
    ///
    /// An existing row for the same date/field/source/driver is overwritten
    /// in place; otherwise the record goes on the next free line.
    pub async fn save_record(&mut self, record: LoadsRecord) -> Result<LoadsRecord> {
        match self.try_save_record(record).await {
            Ok(saved) => Ok(saved),
            Err(e) => {
                let clear = e.invalidates_identity();
                Err(self.surface(e, clear).await)
            }
        }
    }

    async fn try_save_record(&mut self, record: LoadsRecord) -> Result<LoadsRecord> {
        self.loaded()?;
        if !record.key().is_complete() {
            return Err(StoreError::InvalidInput(
                "choose a date, field, source and driver before saving".to_string(),
            ));
        }
        check_point_collection(&record.geojson).map_err(StoreError::InvalidInput)?;
        let data = self.writable()?;

        let resolution =
            RecordReconciler::resolve_lineno(&record.key(), Some(record.loads), &data.loads);
        let saved = LoadsRecord {
            lineno: Some(resolution.lineno),
            ..record
        };
        let mode = if resolution.is_new {
            WriteMode::Insert
        } else {
            WriteMode::Update
        };
        let header = data.header_for::<LoadsRecord>();
        let sheet = data.period.spreadsheet.clone();

        TableStore::new(&self.remote, &self.catalog)
            .batch_upsert(
                &sheet,
                LoadsRecord::TABLE,
                &[saved.to_row(resolution.lineno)],
                &header,
                mode,
            )
            .await?;
        info!(lineno = resolution.lineno, new = resolution.is_new, "load record saved");

        if let Some(data) = self.data.as_mut() {
            let index = LoadIndex::build(&data.loads);
            match index.position(&saved.key()) {
                Some(pos) => data.loads[pos] = saved.clone(),
                None => data.loads.push(saved.clone()),
            }
            data.headers.insert(LoadsRecord::TABLE.to_string(), header);
        }
        Ok(saved)
    }

    /// Imports field boundaries from GeoJSON bytes and returns the new field list.
    pub async fn upload_boundaries(&mut self, bytes: &[u8]) -> Result<Vec<Field>> {
        match self.try_upload_boundaries(bytes).await {
            Ok(fields) => Ok(fields),
            Err(e) => {
                let clear = e.invalidates_identity();
                Err(self.surface(e, clear).await)
            }
        }
    }

    async fn try_upload_boundaries(&mut self, bytes: &[u8]) -> Result<Vec<Field>> {
        let uploaded = parse_boundaries(bytes)?;
        let data = self.writable()?;
        let plan = plan_boundaries(&data.fields, uploaded);
        let header = data.header_for::<Field>();
        let sheet = data.period.spreadsheet.clone();
        let store = TableStore::new(&self.remote, &self.catalog);

        if !plan.updates.is_empty() {
            let rows: Vec<_> = plan
                .updates
                .iter()
                .filter_map(|f| f.lineno.map(|l| f.to_row(l)))
                .collect();
            store
                .batch_upsert(&sheet, Field::TABLE, &rows, &header, WriteMode::Update)
                .await?;
        }
        if !plan.inserts.is_empty() {
            let rows: Vec<_> = plan
                .inserts
                .iter()
                .filter_map(|f| f.lineno.map(|l| f.to_row(l)))
                .collect();
            store
                .batch_upsert(&sheet, Field::TABLE, &rows, &header, WriteMode::Insert)
                .await?;
        }
        info!(
            updated = plan.updates.len(),
            inserted = plan.inserts.len(),
            "field boundaries imported"
        );

        if self.config.archive_uploads {
            if let Err(e) = self.archive_upload(bytes).await {
                warn!(error = %e, "could not archive boundary upload");
                self.notice(
                    NoticeLevel::Warning,
                    format!("Boundaries saved, but the upload was not archived: {}", e),
                );
            }
        }

        let Some(data) = self.data.as_mut() else {
            return Ok(Vec::new());
        };
        for update in plan.updates {
            if let Some(field) = data.fields.iter_mut().find(|f| f.name == update.name) {
                field.boundary = update.boundary;
            }
        }
        data.fields.extend(plan.inserts);
        data.headers.insert(Field::TABLE.to_string(), header);
        Ok(data.fields.clone())
    }

    async fn archive_upload(&self, bytes: &[u8]) -> Result<NodeId> {
        let folder = PathResolver::new(&self.remote)
            .resolve(&self.config.uploads_path(), &NodeId::root(), true)
            .await?;
        let name = format!(
            "{}_boundaries.geojson",
            Utc::now().format("%Y-%m-%dT%H-%M-%S")
        );
        self.remote
            .upload_file(&folder, &name, "application/geo+json", bytes.to_vec())
            .await
    }
}
