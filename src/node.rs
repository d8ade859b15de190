use serde::{Deserialize, Serialize};
use std::fmt;

pub const ROOT_ID: &str = "root";

/// Opaque identifier handed out by the remote namespace.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn root() -> Self {
        NodeId(ROOT_ID.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId(value.to_string())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Container,
    Spreadsheet,
    File,
}

impl NodeKind {
    pub fn is_leaf(self) -> bool {
        !matches!(self, NodeKind::Container)
    }
}

/// One child as reported by a namespace listing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
}

/// Result of ensuring a leaf exists at a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ensured {
    pub id: NodeId,
    pub created: bool,
}

/// Splits a slash-delimited path into its segments.
///
/// One leading slash is dropped before each segment, so `/a/b` and `a//b`
/// both yield `["a", "b"]`. Walking stops at the first empty segment after
/// that, so `a///b` and `a/` yield `["a"]`.
pub fn split_path(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut rest = path;
    loop {
        rest = rest.strip_prefix('/').unwrap_or(rest);
        let (name, tail) = match rest.split_once('/') {
            Some((name, tail)) => (name, Some(tail)),
            None => (rest, None),
        };
        if name.is_empty() {
            break;
        }
        segments.push(name);
        match tail {
            Some(tail) => rest = tail,
            None => break,
        }
    }
    segments
}
