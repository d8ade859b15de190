//! Remote service backed by an OpenDAL operator.
//!
//! Layout under the operator root:
//!
//! ```text
//! nodes/{id}/node.json           node record (name, kind, parent)
//! nodes/{id}/children/{child}    empty marker, one per child
//! nodes/{id}/content             bytes of a file node
//! nodes/{id}/tables/{name}.json  worksheet, every cell stored as text
//! ```
//!
//! The root node is implicit and always a container.

use super::{Namespace, RawRow, RawTable, Tabular, WriteMode};
use crate::error::{Result, StoreError};
use crate::node::{ChildEntry, NodeId, NodeKind};
use ::opendal::{ErrorKind, Operator};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone)]
struct StoredNode {
    id: NodeId,
    name: String,
    kind: NodeKind,
    parent: NodeId,
    created_at: i64,
    #[serde(default)]
    mime_type: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
struct StoredTable {
    position: usize,
    #[serde(default)]
    rows: Vec<Vec<String>>,
}

#[derive(Clone)]
pub struct OpendalRemote {
    op: Operator,
}

impl OpendalRemote {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    /// Renames a node the way someone editing the remote service directly would.
    pub async fn rename_node(&self, id: &NodeId, new_name: &str) -> Result<()> {
        let mut node = self.read_node(id).await?;
        node.name = new_name.to_string();
        self.write_node(&node).await
    }

    /// Detaches a node from its parent. Its id stays readable, as with a trashed file.
    pub async fn trash_node(&self, id: &NodeId) -> Result<()> {
        let node = self.read_node(id).await?;
        self.op
            .delete(&child_marker_path(&node.parent, id))
            .await?;
        Ok(())
    }

    async fn read_node(&self, id: &NodeId) -> Result<StoredNode> {
        match self.op.read(&node_path(id)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes.to_vec())?),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::remote(
                "get",
                format!("File not found: {}", id),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_node(&self, node: &StoredNode) -> Result<()> {
        self.op
            .write(&node_path(&node.id), serde_json::to_vec_pretty(node)?)
            .await?;
        Ok(())
    }

    async fn require_kind(&self, id: &NodeId, kind: NodeKind) -> Result<StoredNode> {
        let node = self.read_node(id).await?;
        if node.kind != kind {
            return Err(StoreError::remote(
                "get",
                format!("{} is a {:?}, expected {:?}", id, node.kind, kind),
            ));
        }
        Ok(node)
    }

    async fn require_container(&self, id: &NodeId) -> Result<()> {
        if id.is_root() {
            return Ok(());
        }
        self.require_kind(id, NodeKind::Container).await.map(|_| ())
    }

    async fn create_node(
        &self,
        parent: &NodeId,
        name: &str,
        kind: NodeKind,
        mime_type: Option<&str>,
    ) -> Result<StoredNode> {
        if name.is_empty() {
            return Err(StoreError::remote("create", "name must not be empty"));
        }
        self.require_container(parent).await?;

        let node = StoredNode {
            id: NodeId::new(Uuid::new_v4().simple().to_string()),
            name: name.to_string(),
            kind,
            parent: parent.clone(),
            created_at: Utc::now().timestamp_micros(),
            mime_type: mime_type.map(|m| m.to_string()),
        };
        self.write_node(&node).await?;
        self.op
            .write(&child_marker_path(parent, &node.id), Vec::<u8>::new())
            .await?;
        Ok(node)
    }

    async fn list_names(&self, dir: &str) -> Result<Vec<String>> {
        let mut lister = match self.op.lister(dir).await {
            Ok(lister) => lister,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = lister.try_next().await? {
            if entry.metadata().is_dir() || entry.path() == dir {
                continue;
            }
            let name = entry.name().trim_end_matches('/');
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    async fn read_stored_table(&self, spreadsheet: &NodeId, table: &str) -> Result<StoredTable> {
        match self.op.read(&table_path(spreadsheet, table)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes.to_vec())?),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::remote(
                "values.get",
                format!("Unable to parse range: {} (no such worksheet)", table),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_stored_table(
        &self,
        spreadsheet: &NodeId,
        table: &str,
        stored: &StoredTable,
    ) -> Result<()> {
        self.op
            .write(
                &table_path(spreadsheet, table),
                serde_json::to_vec_pretty(stored)?,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Namespace for OpendalRemote {
    async fn create_container(&self, parent: &NodeId, name: &str) -> Result<NodeId> {
        let node = self
            .create_node(parent, name, NodeKind::Container, None)
            .await?;
        Ok(node.id)
    }

    async fn create_spreadsheet(&self, parent: &NodeId, name: &str) -> Result<NodeId> {
        let node = self
            .create_node(parent, name, NodeKind::Spreadsheet, None)
            .await?;
        Ok(node.id)
    }

    async fn list_children(&self, parent: &NodeId) -> Result<Vec<ChildEntry>> {
        let mut nodes = Vec::new();
        for child_id in self.list_names(&children_dir(parent)).await? {
            let node = self.read_node(&NodeId::new(child_id)).await?;
            nodes.push(node);
        }
        nodes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(nodes
            .into_iter()
            .map(|n| ChildEntry {
                id: n.id,
                name: n.name,
                kind: n.kind,
            })
            .collect())
    }

    async fn upload_file(
        &self,
        parent: &NodeId,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<NodeId> {
        let node = self
            .create_node(parent, name, NodeKind::File, Some(mime_type))
            .await?;
        self.op.write(&content_path(&node.id), bytes).await?;
        Ok(node.id)
    }

    async fn file_contents(&self, id: &NodeId) -> Result<Vec<u8>> {
        self.require_kind(id, NodeKind::File).await?;
        Ok(self.op.read(&content_path(id)).await?.to_vec())
    }
}

#[async_trait]
impl Tabular for OpendalRemote {
    async fn create_table(&self, spreadsheet: &NodeId, table: &str) -> Result<()> {
        check_table_name(table)?;
        self.require_kind(spreadsheet, NodeKind::Spreadsheet)
            .await?;
        let existing = self.list_tables(spreadsheet).await?;
        if existing.iter().any(|t| t == table) {
            return Err(StoreError::remote(
                "addSheet",
                format!("A sheet with the name \"{}\" already exists", table),
            ));
        }
        let stored = StoredTable {
            position: existing.len(),
            rows: Vec::new(),
        };
        self.write_stored_table(spreadsheet, table, &stored).await
    }

    async fn list_tables(&self, spreadsheet: &NodeId) -> Result<Vec<String>> {
        self.require_kind(spreadsheet, NodeKind::Spreadsheet)
            .await?;
        let mut tables = Vec::new();
        for file in self.list_names(&tables_dir(spreadsheet)).await? {
            let Some(name) = file.strip_suffix(".json") else {
                continue;
            };
            let stored = self.read_stored_table(spreadsheet, name).await?;
            tables.push((stored.position, name.to_string()));
        }
        tables.sort();
        Ok(tables.into_iter().map(|(_, name)| name).collect())
    }

    async fn read_table(&self, spreadsheet: &NodeId, table: &str) -> Result<RawTable> {
        self.require_kind(spreadsheet, NodeKind::Spreadsheet)
            .await?;
        let stored = self.read_stored_table(spreadsheet, table).await?;
        let mut rows = stored.rows.into_iter();
        let header = rows.next().unwrap_or_default();
        Ok(RawTable {
            header,
            rows: rows.collect(),
        })
    }

    async fn write_rows(
        &self,
        spreadsheet: &NodeId,
        table: &str,
        rows: &[RawRow],
        header: &[String],
        mode: WriteMode,
    ) -> Result<()> {
        self.require_kind(spreadsheet, NodeKind::Spreadsheet)
            .await?;
        let mut stored = self.read_stored_table(spreadsheet, table).await?;

        if stored.rows.is_empty() {
            stored.rows.push(Vec::new());
        }
        stored.rows[0] = header.to_vec();

        let mut ordered: Vec<&RawRow> = rows.iter().collect();
        ordered.sort_by_key(|r| r.lineno);
        for row in ordered {
            if row.lineno < 2 {
                return Err(StoreError::remote(
                    "values.update",
                    format!("line {} is reserved for the header", row.lineno),
                ));
            }
            let idx = (row.lineno - 1) as usize;
            let cells = trim_trailing_blanks(&row.cells);
            match mode {
                WriteMode::Update => {
                    if stored.rows.len() <= idx {
                        stored.rows.resize(idx + 1, Vec::new());
                    }
                    stored.rows[idx] = cells;
                }
                WriteMode::Insert => {
                    if stored.rows.len() <= idx {
                        stored.rows.resize(idx, Vec::new());
                        stored.rows.push(cells);
                    } else {
                        stored.rows.insert(idx, cells);
                    }
                }
            }
        }

        self.write_stored_table(spreadsheet, table, &stored).await
    }
}

fn node_path(id: &NodeId) -> String {
    format!("nodes/{}/node.json", id)
}

fn children_dir(id: &NodeId) -> String {
    format!("nodes/{}/children/", id)
}

fn child_marker_path(parent: &NodeId, child: &NodeId) -> String {
    format!("nodes/{}/children/{}", parent, child)
}

fn content_path(id: &NodeId) -> String {
    format!("nodes/{}/content", id)
}

fn tables_dir(id: &NodeId) -> String {
    format!("nodes/{}/tables/", id)
}

fn table_path(id: &NodeId, table: &str) -> String {
    format!("nodes/{}/tables/{}.json", id, table)
}

fn check_table_name(table: &str) -> Result<()> {
    if table.is_empty() || table.contains('/') {
        return Err(StoreError::remote(
            "addSheet",
            format!("Invalid sheet name: {:?}", table),
        ));
    }
    Ok(())
}

fn trim_trailing_blanks(cells: &[String]) -> Vec<String> {
    let end = cells
        .iter()
        .rposition(|c| !c.is_empty())
        .map(|i| i + 1)
        .unwrap_or(0);
    cells[..end].to_vec()
}
