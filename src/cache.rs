use crate::error::Result;
use crate::node::NodeId;
use opendal::Operator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Spreadsheet ids remembered between runs, keyed by the path they came from.
///
/// Persisted as `cache/{app}.json` on a local operator. Entries are only
/// hints: they must be re-checked against the namespace before being trusted
/// across sessions.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct IdentityCache {
    pub app: String,
    #[serde(default)]
    pub sheets: BTreeMap<String, NodeId>,
}

fn cache_path(app: &str) -> String {
    format!("cache/{}.json", app)
}

impl IdentityCache {
    pub fn new(app: &str) -> Self {
        Self {
            app: app.to_string(),
            sheets: BTreeMap::new(),
        }
    }

    /// Reads the cache for `app`. A missing or unreadable blob starts empty.
    pub async fn load(op: &Operator, app: &str) -> Result<Self> {
        let path = cache_path(app);
        if !op.exists(&path).await? {
            return Ok(Self::new(app));
        }
        let bytes = op.read(&path).await?;
        match serde_json::from_slice::<IdentityCache>(&bytes.to_vec()) {
            Ok(mut cache) => {
                cache.app = app.to_string();
                cache.sheets.retain(|_, id| !id.as_str().is_empty());
                Ok(cache)
            }
            Err(e) => {
                info!(app = %app, error = %e, "no valid cached sheet ids, starting empty");
                Ok(Self::new(app))
            }
        }
    }

    pub async fn save(&self, op: &Operator) -> Result<()> {
        op.write(&cache_path(&self.app), serde_json::to_vec_pretty(self)?)
            .await?;
        debug!(app = %self.app, entries = self.sheets.len(), "saved sheet id cache");
        Ok(())
    }

    pub fn get(&self, path_key: &str) -> Option<&NodeId> {
        self.sheets.get(path_key)
    }

    pub fn set(&mut self, path_key: &str, id: NodeId) {
        self.sheets.insert(path_key.to_string(), id);
    }

    /// Drops one entry; returns whether anything was removed.
    pub fn invalidate(&mut self, path_key: &str) -> bool {
        self.sheets.remove(path_key).is_some()
    }

    pub fn clear(&mut self) {
        self.sheets.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}
