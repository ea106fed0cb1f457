//! Node interface consumed by the scanners.
//!
//! A node is a handle to a build artifact owned by an external registry.
//! Scanners only read nodes and fill in their include cache; [`fs`]
//! provides the on-disk registry used by the CLI and the tests.

pub mod fs;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use fs::{FileSystem, FsNode};

/// Shared handle to a node.
pub type NodeRef = Arc<dyn Node>;

/// What a node stands for on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Dir,
    /// Not yet known to be a file or a directory.
    Entry,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Dir => "dir",
            NodeKind::Entry => "entry",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bracket style of a CPP include directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    /// `#include "name"`: containing directory first.
    Quote,
    /// `#include <name>`: search path first.
    Angle,
}

impl Delimiter {
    /// Map the opening character captured by an include pattern.
    pub fn from_opening(s: &str) -> Option<Self> {
        match s {
            "\"" => Some(Delimiter::Quote),
            "<" => Some(Delimiter::Angle),
            _ => None,
        }
    }

    pub fn opening(&self) -> char {
        match self {
            Delimiter::Quote => '"',
            Delimiter::Angle => '<',
        }
    }
}

/// One include directive as written in the scanned text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncludeName {
    pub name: String,
    /// Present only for CPP-style extraction.
    pub delimiter: Option<Delimiter>,
}

impl IncludeName {
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delimiter: None,
        }
    }

    pub fn bracketed(delimiter: Delimiter, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delimiter: Some(delimiter),
        }
    }
}

impl fmt::Display for IncludeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.delimiter {
            Some(Delimiter::Quote) => write!(f, "\"{}\"", self.name),
            Some(Delimiter::Angle) => write!(f, "<{}>", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Write-once slot holding the include names extracted from a node.
///
/// Initialization runs at most once per node; concurrent callers block
/// until the first one finishes.
#[derive(Debug, Default)]
pub struct IncludeCache {
    cell: OnceCell<Vec<IncludeName>>,
}

impl IncludeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached names, if the node has been parsed.
    pub fn get(&self) -> Option<&[IncludeName]> {
        self.cell.get().map(Vec::as_slice)
    }

    /// Return the cached names, running `parse` only if nothing is cached.
    /// A failed parse leaves the slot empty.
    pub fn get_or_try_init<F>(&self, parse: F) -> Result<&[IncludeName]>
    where
        F: FnOnce() -> Result<Vec<IncludeName>>,
    {
        self.cell.get_or_try_init(parse).map(Vec::as_slice)
    }
}

/// A build artifact as seen by the scanners.
pub trait Node: Send + Sync + fmt::Debug {
    /// Absolute path; doubles as the node's identity.
    fn path(&self) -> &Path;

    fn kind(&self) -> NodeKind;

    fn exists(&self) -> bool;

    /// Full text of the node.
    fn text_contents(&self) -> Result<String>;

    /// Containing directory.
    fn dir(&self) -> Option<NodeRef>;

    /// Whether a build action generates this node.
    fn has_builder(&self) -> bool;

    /// Whether the node already reflects its dependencies.
    fn is_up_to_date(&self) -> bool;

    /// Classification key used for dispatch (file suffix, with the dot).
    fn scanner_key(&self) -> String {
        suffix_of(self.path())
    }

    /// The repository copy standing in for a missing local node.
    fn repository_copy(&self) -> Option<NodeRef> {
        None
    }

    fn includes(&self) -> &IncludeCache;

    /// Directory nodes: the file `name` inside this directory or one of its
    /// repository mirrors.
    fn find_file(&self, _name: &str) -> Option<NodeRef> {
        None
    }

    /// Directory nodes: every directory `path` names relative to this one,
    /// local tree first, then repository mirrors.
    fn find_all_dirs(&self, _path: &str) -> Vec<NodeRef> {
        Vec::new()
    }
}

/// The node's real underlying file: its repository copy when the local one
/// is missing, otherwise the node itself.
pub fn rfile(node: &NodeRef) -> NodeRef {
    node.repository_copy().unwrap_or_else(|| Arc::clone(node))
}

/// Search `dirs` in order for a file called `name`.
pub fn find_file(name: &str, dirs: &[NodeRef]) -> Option<NodeRef> {
    dirs.iter().find_map(|dir| dir.find_file(name))
}

/// Identity comparison.
pub fn same_node(a: &NodeRef, b: &NodeRef) -> bool {
    a.path() == b.path()
}

/// File suffix including the leading dot, or an empty string.
pub fn suffix_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Normalize case for path comparison on this platform.
pub fn normcase(s: &str) -> String {
    if cfg!(windows) {
        s.to_lowercase()
    } else {
        s.to_string()
    }
}
