use crate::error::{Result, StoreError};
use crate::node::NodeId;
use chrono::{Datelike, Local};
use opendal::Operator;
use serde::{Deserialize, Serialize};

fn default_app_name() -> String {
    "manure".to_string()
}

fn default_base_path() -> String {
    "Ault Farms Operations/ManureRecords".to_string()
}

fn default_sheet_suffix() -> String {
    "_ManureRecords".to_string()
}

fn default_remote_uri() -> String {
    "memory://remote".to_string()
}

fn default_cache_uri() -> String {
    "memory://cache".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Key for the persisted identifier cache.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Folder path holding one spreadsheet per year.
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default = "default_sheet_suffix")]
    pub sheet_suffix: String,
    #[serde(default = "default_remote_uri")]
    pub remote_uri: String,
    #[serde(default = "default_cache_uri")]
    pub cache_uri: String,
    /// Keep a copy of every boundary upload next to the spreadsheets.
    #[serde(default = "default_true")]
    pub archive_uploads: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            base_path: default_base_path(),
            sheet_suffix: default_sheet_suffix(),
            remote_uri: default_remote_uri(),
            cache_uri: default_cache_uri(),
            archive_uploads: true,
        }
    }
}

impl StoreConfig {
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let config: StoreConfig = serde_json::from_slice(bytes)
            .map_err(|e| StoreError::Config(format!("bad JSON config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: StoreConfig = serde_yaml::from_str(text)
            .map_err(|e| StoreError::Config(format!("bad YAML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a config file from `op`; `.yaml`/`.yml` are YAML, anything else JSON.
    pub async fn load(op: &Operator, path: &str) -> Result<Self> {
        let bytes = op.read(path).await?.to_vec();
        if path.ends_with(".yaml") || path.ends_with(".yml") {
            let text = String::from_utf8(bytes)
                .map_err(|e| StoreError::Config(format!("config is not UTF-8: {}", e)))?;
            return Self::from_yaml_str(&text);
        }
        Self::from_json_slice(&bytes)
    }

    pub fn validate(&self) -> Result<()> {
        if self.app_name.trim().is_empty() {
            return Err(StoreError::Config("app_name must not be empty".into()));
        }
        if self.base_path.trim_matches('/').is_empty() {
            return Err(StoreError::Config("base_path must not be empty".into()));
        }
        Ok(())
    }

    pub fn year_path(&self, year: i32) -> String {
        format!(
            "{}/{}{}",
            self.base_path.trim_end_matches('/'),
            year,
            self.sheet_suffix
        )
    }

    pub fn year_paths(&self, year: i32) -> YearPaths {
        YearPaths {
            this_year: self.year_path(year),
            last_year: self.year_path(year - 1),
        }
    }

    /// Folder for archived uploads.
    pub fn uploads_path(&self) -> String {
        format!("{}/uploads", self.base_path.trim_end_matches('/'))
    }
}

pub fn current_year() -> i32 {
    Local::now().year()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearPaths {
    pub this_year: String,
    pub last_year: String,
}

/// One year's spreadsheet once its id is known.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub year: i32,
    pub spreadsheet: NodeId,
}
