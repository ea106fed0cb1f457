//! Advisory diagnostics raised while scanning.

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Serialize;
use tracing::warn;

/// An include name that matched no file in any searched directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyWarning {
    /// The include name as written.
    pub include: String,
    /// The node that contains the include.
    pub from: PathBuf,
}

impl fmt::Display for DependencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "No dependency generated for file: {} (included from: {}) -- file not found",
            self.include,
            self.from.display()
        )
    }
}

/// Receives unresolved-include events. Never fails the scan.
pub trait WarningSink: Send + Sync {
    fn dependency(&self, warning: DependencyWarning);
}

/// Default sink: one `tracing` warning per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl WarningSink for TracingSink {
    fn dependency(&self, warning: DependencyWarning) {
        warn!(
            include = %warning.include,
            from = %warning.from.display(),
            "no dependency generated for file -- file not found"
        );
    }
}

/// Keeps every event, for reports and tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<DependencyWarning>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DependencyWarning> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WarningSink for CollectingSink {
    fn dependency(&self, warning: DependencyWarning) {
        self.events.lock().unwrap().push(warning);
    }
}
