//! Error types for depscan.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that fail a scan, path or configuration call.
///
/// Unresolved includes and missing source files are not errors: the first
/// goes to the environment's warning sink, the second yields no dependencies.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A dispatching scanner has nothing registered for a node's key.
    #[error("No scanner registered for key '{key}' (node: {})", node.display())]
    NoScanner { key: String, node: PathBuf },

    /// The scan function expects a fixed argument the scanner does not carry.
    #[error("Scanner '{scanner}' requires an argument but none was configured")]
    MissingArgument { scanner: String },

    /// Sub-scanners can only be registered on a dispatching scanner.
    #[error("Scanner '{scanner}' does not dispatch by key")]
    NotADispatcher { scanner: String },

    /// A path already known as one kind of node was requested as another.
    #[error(
        "Node kind conflict for {}: registered as {existing}, requested as {requested}",
        path.display()
    )]
    NodeConflict {
        path: PathBuf,
        existing: &'static str,
        requested: &'static str,
    },

    #[error("Invalid include pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Include pattern {pattern:?} needs at least {required} capture group(s)")]
    PatternGroups { pattern: String, required: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type alias for depscan operations.
pub type Result<T> = std::result::Result<T, ScanError>;
