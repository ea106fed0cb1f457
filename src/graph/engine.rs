//
//  engine.rs
//  Depscan
//
//  Created by hak (tharun)
//

use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::env::Environment;
use crate::error::Result;
use crate::node::NodeRef;
use crate::scanner::{DependencyScanner, Scanner};
use crate::walk;

/// Include graph: one vertex per scanned or discovered file, one edge per
/// direct dependency.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub(crate) graph: DiGraph<PathBuf, ()>,
    /// Index: absolute path -> vertex.
    pub(crate) index: HashMap<PathBuf, NodeIndex>,
    pub(crate) roots: Vec<NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk every root and record the direct edges of each scanned node.
    pub fn build<S, P>(
        roots: &[NodeRef],
        env: &Environment,
        scanner: &S,
        path_fn: P,
    ) -> Result<Self>
    where
        S: DependencyScanner + ?Sized,
        P: Fn(&Scanner) -> Result<Vec<NodeRef>>,
    {
        let mut graph = Self::new();
        for root in roots {
            graph.add_root(root, env, scanner, &path_fn)?;
        }
        Ok(graph)
    }

    /// Walk `root` into the graph. Nodes already present are scanned again
    /// but never duplicated.
    pub fn add_root<S, P>(
        &mut self,
        root: &NodeRef,
        env: &Environment,
        scanner: &S,
        path_fn: P,
    ) -> Result<()>
    where
        S: DependencyScanner + ?Sized,
        P: Fn(&Scanner) -> Result<Vec<NodeRef>>,
    {
        let root_idx = self.add_node(root.path());
        if !self.roots.contains(&root_idx) {
            self.roots.push(root_idx);
        }
        walk::walk(root, env, scanner, path_fn, |node, deps| {
            let from = self.add_node(node.path());
            for dep in deps {
                let to = self.add_node(dep.path());
                self.add_edge(from, to);
            }
        })?;
        Ok(())
    }

    /// Vertex for `path`, created on first use.
    pub fn add_node(&mut self, path: &Path) -> NodeIndex {
        if let Some(&idx) = self.index.get(path) {
            return idx;
        }
        let idx = self.graph.add_node(path.to_path_buf());
        self.index.insert(path.to_path_buf(), idx);
        idx
    }

    /// Add a dependency edge unless it is already recorded.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex) {
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, ());
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.index.contains_key(path)
    }

    pub fn roots(&self) -> Vec<&Path> {
        self.roots.iter().map(|&idx| self.graph[idx].as_path()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::FileSystem;
    use crate::scanner::builtin::c_scanner;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_empty_graph() {
        let graph = DependencyGraph::new();
        let stats = graph.stats();
        assert_eq!(stats.nodes, 0);
        assert_eq!(stats.edges, 0);
    }

    #[test]
    fn test_nodes_and_edges_are_unique() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node(Path::new("/src/a.c"));
        let b = graph.add_node(Path::new("/src/b.h"));
        assert_eq!(graph.add_node(Path::new("/src/a.c")), a);

        graph.add_edge(a, b);
        graph.add_edge(a, b);
        assert_eq!(graph.stats().edges, 1);
    }

    #[test]
    fn test_build_from_shared_headers() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("one.c"), "#include \"common.h\"\n").unwrap();
        fs::write(dir.path().join("two.c"), "#include \"common.h\"\n").unwrap();
        fs::write(dir.path().join("common.h"), "").unwrap();

        let env = Environment::new(FileSystem::new(dir.path()));
        let one: NodeRef = env.fs().file("one.c", None).unwrap();
        let two: NodeRef = env.fs().file("two.c", None).unwrap();

        let scanner = c_scanner();
        let graph =
            DependencyGraph::build(&[one, two], &env, &scanner, walk::search_path(&env)).unwrap();
        let stats = graph.stats();
        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.edges, 2);
        assert_eq!(stats.roots, 2);
        assert!(graph.contains(&env.fs().top().join("common.h")));
    }
}
