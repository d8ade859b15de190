use crate::cache::IdentityCache;
use crate::error::StoreError;
use crate::node::NodeId;
use crate::path::PathResolver;
use crate::remote::Namespace;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftReport {
    pub path_key: String,
    pub cached: NodeId,
    /// What the path points at now, `None` if it no longer resolves.
    pub resolved: Option<NodeId>,
    pub valid: bool,
}

impl DriftReport {
    pub fn to_error(&self) -> Option<StoreError> {
        if self.valid {
            return None;
        }
        Some(StoreError::DriftDetected {
            path: self.path_key.clone(),
            cached: self.cached.to_string(),
            resolved: self
                .resolved
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "nothing".to_string()),
        })
    }
}

/// Re-checks that a cached id is still what its path resolves to.
pub struct DriftGuard<'a, N: Namespace + ?Sized> {
    resolver: PathResolver<'a, N>,
}

impl<'a, N: Namespace + ?Sized> DriftGuard<'a, N> {
    pub fn new(ns: &'a N) -> Self {
        Self {
            resolver: PathResolver::new(ns),
        }
    }

    /// Resolves `path_key` without creating anything and compares it to `cached`.
    ///
    /// On mismatch, including any failure to resolve, the cache entry for the
    /// path is dropped so the next load provisions from scratch.
    pub async fn verify(
        &self,
        path_key: &str,
        cached: &NodeId,
        cache: &mut IdentityCache,
    ) -> DriftReport {
        let resolved = match self.resolver.find(path_key).await {
            Ok(found) => found,
            Err(e) => {
                warn!(path = %path_key, error = %e, "could not re-resolve cached spreadsheet");
                None
            }
        };

        let valid = resolved.as_ref() == Some(cached);
        if valid {
            debug!(path = %path_key, id = %cached, "cached spreadsheet id still valid");
        } else {
            warn!(
                path = %path_key,
                cached = %cached,
                resolved = ?resolved,
                "spreadsheet id changed underneath us, dropping cached id"
            );
            cache.invalidate(path_key);
        }

        DriftReport {
            path_key: path_key.to_string(),
            cached: cached.clone(),
            resolved,
            valid,
        }
    }
}
