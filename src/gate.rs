//! Scan gates: decide whether a node needs scanning at all.

use std::fmt;
use std::sync::Arc;

use crate::env::Environment;
use crate::node::NodeRef;

type GateFn = dyn Fn(&NodeRef, &Environment) -> bool + Send + Sync;

/// Predicate evaluated before a scan. A scanner without a gate scans
/// every node.
#[derive(Clone)]
pub enum ScanGate {
    /// Scan source files (no builder) and generated files that are
    /// already up to date. A stale generated file is skipped until it
    /// has been rebuilt.
    Current,
    Custom(Arc<GateFn>),
}

impl ScanGate {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&NodeRef, &Environment) -> bool + Send + Sync + 'static,
    {
        ScanGate::Custom(Arc::new(f))
    }

    pub fn should_scan(&self, node: &NodeRef, env: &Environment) -> bool {
        match self {
            ScanGate::Current => !node.has_builder() || node.is_up_to_date(),
            ScanGate::Custom(f) => f(node, env),
        }
    }
}

/// Evaluate an optional gate; no gate always scans.
pub fn should_scan(gate: Option<&ScanGate>, node: &NodeRef, env: &Environment) -> bool {
    gate.map_or(true, |g| g.should_scan(node, env))
}

impl PartialEq for ScanGate {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ScanGate::Current, ScanGate::Current) => true,
            (ScanGate::Custom(a), ScanGate::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for ScanGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanGate::Current => f.write_str("Current"),
            ScanGate::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
