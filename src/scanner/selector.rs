//! Pure key-based dispatcher.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::{lookup, DependencyScanner, Scanner};
use crate::env::Environment;
use crate::error::Result;
use crate::node::NodeRef;

/// Routes each node to the scanner registered for its key.
///
/// A selector has no scan function, gate or search path of its own. The
/// selected scanner runs in full, gate included, and decides its own
/// recursion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selector {
    name: String,
    mapping: BTreeMap<String, Arc<Scanner>>,
    skeys: Vec<String>,
}

impl Selector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A selector over an existing key table; the table's keys become the
    /// applicability keys.
    pub fn from_mapping(name: impl Into<String>, mapping: BTreeMap<String, Arc<Scanner>>) -> Self {
        let skeys = mapping.keys().cloned().collect();
        Self {
            name: name.into(),
            mapping,
            skeys,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind `key` to `scanner`, replacing any earlier binding.
    pub fn add_scanner(&mut self, key: impl Into<String>, scanner: impl Into<Arc<Scanner>>) {
        let key = key.into();
        if !self.skeys.contains(&key) {
            self.skeys.push(key.clone());
        }
        self.mapping.insert(key, scanner.into());
    }

    /// Every registered scanner, ordered by key.
    pub fn scanners(&self) -> impl Iterator<Item = (&String, &Arc<Scanner>)> {
        self.mapping.iter()
    }

    pub fn select(&self, node: &NodeRef) -> Result<&Scanner> {
        lookup(&self.mapping, node)
    }

    pub fn scan(
        &self,
        node: &NodeRef,
        env: &Environment,
        path: &[NodeRef],
    ) -> Result<Vec<NodeRef>> {
        let scanner = self.select(node)?;
        trace!(selector = %self.name, scanner = %scanner.name(), "selected scanner");
        scanner.scan(node, env, path)
    }

    pub fn skeys(&self) -> &[String] {
        &self.skeys
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl DependencyScanner for Selector {
    fn name(&self) -> &str {
        &self.name
    }

    fn scan(&self, node: &NodeRef, env: &Environment, path: &[NodeRef]) -> Result<Vec<NodeRef>> {
        Selector::scan(self, node, env, path)
    }

    fn path(
        &self,
        _env: &Environment,
        _dir: Option<&NodeRef>,
        _target: &[NodeRef],
        _source: &[NodeRef],
    ) -> Result<Vec<NodeRef>> {
        Ok(Vec::new())
    }

    fn select(&self, node: &NodeRef) -> Result<&Scanner> {
        Selector::select(self, node)
    }

    fn skeys(&self, _env: Option<&Environment>) -> Result<Vec<String>> {
        Ok(self.skeys.clone())
    }

    fn recurse_nodes(&self, _nodes: &[NodeRef]) -> Vec<NodeRef> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use crate::gate::ScanGate;
    use crate::node::FileSystem;
    use crate::scanner::ScanItem;
    use tempfile::tempdir;

    fn named(name: &'static str, dep: &'static str) -> Scanner {
        Scanner::from_fn(move |_, _, _| Ok(vec![ScanItem::from(dep)])).with_name(name)
    }

    #[test]
    fn test_select_by_key() {
        let dir = tempdir().unwrap();
        let env = Environment::new(FileSystem::new(dir.path()));
        let c: NodeRef = env.fs().file("main.c", None).unwrap();
        let f: NodeRef = env.fs().file("main.f", None).unwrap();
        let txt: NodeRef = env.fs().file("README", None).unwrap();

        let mut selector = Selector::new("sources");
        selector.add_scanner(".c", named("c", "c.h"));
        selector.add_scanner(".f", named("fortran", "mod.inc"));

        assert_eq!(selector.select(&c).unwrap().name(), "c");
        assert_eq!(selector.select(&f).unwrap().name(), "fortran");
        assert_eq!(
            selector.scan(&c, &env, &[]).unwrap()[0].path(),
            env.fs().top().join("c.h")
        );

        let err = selector.scan(&txt, &env, &[]).unwrap_err();
        assert!(matches!(err, ScanError::NoScanner { ref key, .. } if key.is_empty()));
    }

    #[test]
    fn test_sub_scanner_gate_applies() {
        let dir = tempdir().unwrap();
        let env = Environment::new(FileSystem::new(dir.path()));
        let generated = env.fs().file("gen.c", None).unwrap();
        generated.set_builder(true);
        let node: NodeRef = generated.clone();

        let mut selector = Selector::new("sources");
        selector.add_scanner(".c", named("c", "c.h").with_gate(ScanGate::Current));
        assert!(selector.scan(&node, &env, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_registration_keys_and_surface() {
        let dir = tempdir().unwrap();
        let env = Environment::new(FileSystem::new(dir.path()));
        let node: NodeRef = env.fs().file("a.c", None).unwrap();

        let mut selector = Selector::from_mapping("s", BTreeMap::new());
        selector.add_scanner(".c", named("first", "x.h"));
        selector.add_scanner(".c", named("second", "y.h"));
        selector.add_scanner(".h", named("header", "z.h"));

        assert_eq!(selector.skeys(), [".c", ".h"]);
        assert_eq!(selector.select(&node).unwrap().name(), "second");

        let scanner: &dyn DependencyScanner = &selector;
        assert!(scanner.path(&env, None, &[], &[]).unwrap().is_empty());
        assert!(scanner.recurse_nodes(&[node]).is_empty());
        assert_eq!(scanner.skeys(Some(&env)).unwrap(), vec![".c", ".h"]);
    }
}
