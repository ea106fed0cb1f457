//
//  env.rs
//  Depscan
//
//  Created by hak (tharun)
//

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::node::{FileSystem, NodeKind, NodeRef};
use crate::subst::Substituter;
use crate::warnings::{DependencyWarning, TracingSink, WarningSink};

/// A construction variable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    List(Vec<String>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items)
    }
}

impl From<Vec<&str>> for Value {
    fn from(items: Vec<&str>) -> Self {
        Value::List(items.into_iter().map(str::to_string).collect())
    }
}

type FactoryFn = dyn Fn(&Environment, &str, Option<&NodeRef>) -> Result<NodeRef> + Send + Sync;

/// Turns a raw name returned by a scan function into a node.
#[derive(Clone)]
pub enum NodeFactory {
    File,
    Dir,
    Entry,
    Custom(Arc<FactoryFn>),
}

impl NodeFactory {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Environment, &str, Option<&NodeRef>) -> Result<NodeRef> + Send + Sync + 'static,
    {
        NodeFactory::Custom(Arc::new(f))
    }

    /// Build the node for `name`, relative to `directory` when given.
    pub fn make(
        &self,
        env: &Environment,
        name: &str,
        directory: Option<&NodeRef>,
    ) -> Result<NodeRef> {
        let dir_path = directory.map(|d| d.path());
        let kind = match self {
            NodeFactory::File => NodeKind::File,
            NodeFactory::Dir => NodeKind::Dir,
            NodeFactory::Entry => NodeKind::Entry,
            NodeFactory::Custom(f) => return f(env, name, directory),
        };
        let node: NodeRef = env.fs().lookup(name, dir_path, kind)?;
        Ok(node)
    }
}

impl PartialEq for NodeFactory {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NodeFactory::File, NodeFactory::File)
            | (NodeFactory::Dir, NodeFactory::Dir)
            | (NodeFactory::Entry, NodeFactory::Entry) => true,
            (NodeFactory::Custom(a), NodeFactory::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for NodeFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeFactory::File => f.write_str("File"),
            NodeFactory::Dir => f.write_str("Dir"),
            NodeFactory::Entry => f.write_str("Entry"),
            NodeFactory::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Construction environment: variables, the node registry and the
/// warning sink. Passed by reference to every scan.
#[derive(Clone)]
pub struct Environment {
    vars: BTreeMap<String, Value>,
    fs: FileSystem,
    warnings: Arc<dyn WarningSink>,
}

impl Environment {
    pub fn new(fs: FileSystem) -> Self {
        Self {
            vars: BTreeMap::new(),
            fs,
            warnings: Arc::new(TracingSink),
        }
    }

    /// Replace the warning sink.
    pub fn with_warnings(mut self, sink: Arc<dyn WarningSink>) -> Self {
        self.warnings = sink;
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Append to a variable, promoting a string value to a list.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let added = match value.into() {
            Value::Str(s) => vec![s],
            Value::List(items) => items,
        };
        let merged = match self.vars.remove(&name) {
            None => added,
            Some(Value::Str(s)) => std::iter::once(s).chain(added).collect(),
            Some(Value::List(mut items)) => {
                items.extend(added);
                items
            }
        };
        self.vars.insert(name, Value::List(merged));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars.iter()
    }

    pub fn fs(&self) -> &FileSystem {
        &self.fs
    }

    /// Expand `text` to a single string.
    pub fn subst(&self, text: &str, target: &[NodeRef], source: &[NodeRef]) -> Result<String> {
        Substituter::new(self, target, source).expand(text)
    }

    /// Expand `text` into words.
    pub fn subst_list(
        &self,
        text: &str,
        target: &[NodeRef],
        source: &[NodeRef],
    ) -> Result<Vec<String>> {
        Substituter::new(self, target, source).expand_words(text)
    }

    /// Build a node with `factory`, or with the default file factory.
    pub fn make_node(
        &self,
        factory: Option<&NodeFactory>,
        name: &str,
        directory: Option<&NodeRef>,
    ) -> Result<NodeRef> {
        factory
            .unwrap_or(&NodeFactory::File)
            .make(self, name, directory)
    }

    /// Report an unresolved include.
    pub fn warn(&self, warning: DependencyWarning) {
        self.warnings.dependency(warning);
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("vars", &self.vars)
            .field("fs", &self.fs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_append_promotes_to_list() {
        let dir = tempdir().unwrap();
        let mut env = Environment::new(FileSystem::new(dir.path()));

        env.set("CPPPATH", "include");
        env.append("CPPPATH", "#/gen");
        env.append("CPPPATH", vec!["a", "b"]);
        assert_eq!(
            env.get("CPPPATH"),
            Some(&Value::from(vec!["include", "#/gen", "a", "b"]))
        );
    }

    #[test]
    fn test_default_factory_makes_files() {
        let dir = tempdir().unwrap();
        let env = Environment::new(FileSystem::new(dir.path()));
        let src: NodeRef = env.fs().dir("src", None).unwrap();

        let node = env.make_node(None, "main.c", Some(&src)).unwrap();
        assert_eq!(node.kind(), NodeKind::File);
        assert_eq!(node.path(), env.fs().top().join("src/main.c"));

        let entry = env
            .make_node(Some(&NodeFactory::Entry), "thing", Some(&src))
            .unwrap();
        assert_eq!(entry.kind(), NodeKind::Entry);
    }

    #[test]
    fn test_factory_equality() {
        let f = NodeFactory::custom(|env, name, dir| env.make_node(None, name, dir));
        assert_eq!(f, f.clone());
        assert_ne!(f, NodeFactory::custom(|env, name, dir| env.make_node(None, name, dir)));
        assert_eq!(NodeFactory::File, NodeFactory::File);
        assert_ne!(NodeFactory::File, NodeFactory::Dir);
    }
}
