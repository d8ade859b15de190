#![warn(warnings)]
#![deny(clippy::all)]

//! Typed records kept in remote spreadsheets that are addressed by path.

pub mod boundaries;
pub mod cache;
pub mod config;
pub mod drift;
pub mod error;
pub mod node;
pub mod path;
pub mod provision;
pub mod reconcile;
pub mod records;
pub mod remote;
pub mod schema;
pub mod session;
pub mod storage;
pub mod table;

pub use cache::IdentityCache;
pub use config::{current_year, Period, StoreConfig, YearPaths};
pub use drift::{DriftGuard, DriftReport};
pub use error::{Result, StoreError};
pub use node::{NodeId, NodeKind};
pub use path::{NodeCreator, PathResolver};
pub use provision::{Provisioned, SpreadsheetProvisioner};
pub use reconcile::{LoadEditor, LoadPatch, RecordReconciler, Resolution};
pub use records::{Driver, Field, LoadKey, LoadsRecord, Record, Source, SourceKind};
pub use remote::{OpendalRemote, RemoteService, WriteMode};
pub use schema::{SchemaCatalog, TableSchema};
pub use session::{FarmSession, Notice, NoticeLevel, YearData, YearLoad};
pub use table::{Row, Spreadsheet, Table, TableStore};
