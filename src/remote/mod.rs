//! Capability interfaces of the remote spreadsheet service.
//!
//! The store only ever talks to the outside world through [`Namespace`]
//! (folders and files addressed by opaque ids) and [`Tabular`] (worksheets
//! inside a spreadsheet, all cells as text).

pub mod opendal_backend;

use crate::error::Result;
use crate::node::{ChildEntry, NodeId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use self::opendal_backend::OpendalRemote;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum WriteMode {
    /// Rows land at line numbers assumed to be free; occupied rows shift down.
    Insert,
    /// Rows overwrite whatever is at their line numbers.
    Update,
}

/// A worksheet exactly as the service returns it.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub header: Vec<String>,
    /// Data rows in sheet order; `rows[0]` is line 2.
    pub rows: Vec<Vec<String>>,
}

/// A row ready for the wire, cells already laid out in header order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RawRow {
    pub lineno: u32,
    pub cells: Vec<String>,
}

#[async_trait]
pub trait Namespace: Send + Sync {
    async fn create_container(&self, parent: &NodeId, name: &str) -> Result<NodeId>;

    async fn create_spreadsheet(&self, parent: &NodeId, name: &str) -> Result<NodeId>;

    async fn list_children(&self, parent: &NodeId) -> Result<Vec<ChildEntry>>;

    /// Name search among the children of `parent`.
    ///
    /// Like the real service this may match case-insensitively; callers that
    /// need an exact match filter the candidates themselves.
    async fn search_children(&self, parent: &NodeId, name: &str) -> Result<Vec<ChildEntry>> {
        let wanted = name.to_lowercase();
        Ok(self
            .list_children(parent)
            .await?
            .into_iter()
            .filter(|c| c.name.to_lowercase() == wanted)
            .collect())
    }

    async fn upload_file(
        &self,
        parent: &NodeId,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<NodeId>;

    async fn file_contents(&self, id: &NodeId) -> Result<Vec<u8>>;
}

#[async_trait]
pub trait Tabular: Send + Sync {
    async fn create_table(&self, spreadsheet: &NodeId, table: &str) -> Result<()>;

    async fn list_tables(&self, spreadsheet: &NodeId) -> Result<Vec<String>>;

    async fn read_table(&self, spreadsheet: &NodeId, table: &str) -> Result<RawTable>;

    /// Writes `rows` at their line numbers and rewrites the header row.
    async fn write_rows(
        &self,
        spreadsheet: &NodeId,
        table: &str,
        rows: &[RawRow],
        header: &[String],
        mode: WriteMode,
    ) -> Result<()>;
}

/// Both halves of the remote service.
pub trait RemoteService: Namespace + Tabular {}

impl<T: Namespace + Tabular> RemoteService for T {}
