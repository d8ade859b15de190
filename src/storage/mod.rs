use crate::error::{Result, StoreError};
use opendal::Operator;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use url::Url;

static MEMORY_OPERATORS: OnceLock<Mutex<HashMap<String, Operator>>> = OnceLock::new();

fn memory_cache() -> &'static Mutex<HashMap<String, Operator>> {
    MEMORY_OPERATORS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Creates an OpenDAL Operator from a URI string.
///
/// Supported schemes:
/// - memory://name -> In-memory, shared by every caller using the same URI
/// - file:///path/to/dir -> local filesystem rooted at the path
pub fn operator_from_uri(uri: &str) -> Result<Operator> {
    if uri.starts_with("memory://") {
        let mut cache = memory_cache()
            .lock()
            .map_err(|_| StoreError::Config("memory operator cache lock poisoned".into()))?;
        if let Some(op) = cache.get(uri) {
            return Ok(op.clone());
        }
        let op = Operator::new(opendal::services::Memory::default())?.finish();
        cache.insert(uri.to_string(), op.clone());
        return Ok(op);
    }

    let url =
        Url::parse(uri).map_err(|e| StoreError::Config(format!("Invalid storage URI: {}", e)))?;
    match url.scheme() {
        "file" | "fs" => {
            let root = url.path();
            if root.is_empty() {
                return Err(StoreError::Config(format!(
                    "Storage URI has no path: {}",
                    uri
                )));
            }
            let builder = opendal::services::Fs::default().root(root);
            Ok(Operator::new(builder)?.finish())
        }
        other => Err(StoreError::Config(format!(
            "Unsupported storage scheme: {}",
            other
        ))),
    }
}
