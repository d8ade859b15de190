use crate::error::{Result, StoreError};
use crate::node::{split_path, ChildEntry, Ensured, NodeId};
use crate::remote::Namespace;
use tracing::{debug, info, warn};

/// Resolves slash-delimited name paths to node ids, one segment at a time.
pub struct PathResolver<'a, N: Namespace + ?Sized> {
    ns: &'a N,
}

impl<'a, N: Namespace + ?Sized> PathResolver<'a, N> {
    pub fn new(ns: &'a N) -> Self {
        Self { ns }
    }

    /// Walks `path` from `root`, creating missing containers when `create` is set.
    ///
    /// Returns [`StoreError::NotFound`] for the first absent segment when
    /// `create` is false. An empty path resolves to `root` itself.
    pub async fn resolve(&self, path: &str, root: &NodeId, create: bool) -> Result<NodeId> {
        let segments = split_path(path);
        let creator = NodeCreator::new(self.ns);
        let mut current = root.clone();

        for (depth, name) in segments.iter().enumerate() {
            debug!(segment = %name, parent = %current, "resolving path segment");
            current = match self.find_child(&current, name).await? {
                Some(child) => child.id,
                None if create => creator.container(&current, name).await?,
                None => {
                    warn!(path = %path, missing = %name, "path not found and creation disabled");
                    return Err(StoreError::NotFound {
                        path: segments[..=depth].join("/"),
                    });
                }
            };
        }

        Ok(current)
    }

    /// Resolves from the namespace root without creating anything.
    pub async fn find(&self, path: &str) -> Result<Option<NodeId>> {
        match self.resolve(path, &NodeId::root(), false).await {
            Ok(id) => Ok(Some(id)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Exact, case-sensitive child lookup.
    ///
    /// The remote search may hand back names that only differ in case; those
    /// are dropped here. If several exact matches remain the first one wins.
    pub async fn find_child(&self, parent: &NodeId, name: &str) -> Result<Option<ChildEntry>> {
        let mut matches: Vec<ChildEntry> = self
            .ns
            .search_children(parent, name)
            .await?
            .into_iter()
            .filter(|c| c.name == name)
            .collect();

        if matches.len() > 1 {
            warn!(
                name = %name,
                parent = %parent,
                count = matches.len(),
                "found several children with the same name, using the first"
            );
        }
        if matches.is_empty() {
            return Ok(None);
        }
        Ok(Some(matches.swap_remove(0)))
    }
}

/// Creates containers and spreadsheets.
pub struct NodeCreator<'a, N: Namespace + ?Sized> {
    ns: &'a N,
}

impl<'a, N: Namespace + ?Sized> NodeCreator<'a, N> {
    pub fn new(ns: &'a N) -> Self {
        Self { ns }
    }

    pub async fn container(&self, parent: &NodeId, name: &str) -> Result<NodeId> {
        info!(name = %name, parent = %parent, "creating folder");
        self.ns.create_container(parent, name).await
    }

    pub async fn spreadsheet(&self, parent: &NodeId, name: &str) -> Result<NodeId> {
        info!(name = %name, parent = %parent, "creating spreadsheet");
        self.ns.create_spreadsheet(parent, name).await
    }

    /// Makes sure a spreadsheet exists at `path`, creating parents as needed.
    pub async fn ensure_spreadsheet(&self, path: &str) -> Result<Ensured> {
        let segments = split_path(path);
        let Some((leaf, parents)) = segments.split_last() else {
            return Err(StoreError::InvalidInput(format!(
                "spreadsheet path '{}' has no name",
                path
            )));
        };

        let resolver = PathResolver::new(self.ns);
        let parent = resolver
            .resolve(&parents.join("/"), &NodeId::root(), true)
            .await?;

        if let Some(existing) = resolver.find_child(&parent, leaf).await? {
            return Ok(Ensured {
                id: existing.id,
                created: false,
            });
        }

        let id = self.spreadsheet(&parent, leaf).await?;
        Ok(Ensured { id, created: true })
    }
}
