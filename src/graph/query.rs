//
//  query.rs
//  Depscan
//
//  Created by hak (tharun)
//

use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::engine::DependencyGraph;

/// Summary counts for a dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub roots: usize,
    pub cycles: usize,
}

/// One line of a dependency tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeLine {
    pub depth: usize,
    pub path: PathBuf,
    /// The node is already on the current branch; not expanded.
    pub cycle: bool,
    /// The node was expanded earlier in the tree; not expanded again.
    pub repeated: bool,
}

impl DependencyGraph {
    /// Direct dependencies of `path`, in scan order.
    pub fn dependencies(&self, path: &Path) -> Vec<&Path> {
        self.neighbors(path, Direction::Outgoing)
    }

    /// Nodes that include `path` directly.
    pub fn dependents(&self, path: &Path) -> Vec<&Path> {
        self.neighbors(path, Direction::Incoming)
    }

    /// Include cycles, each as the set of files that reach one another.
    /// Members are sorted by path; cycles are sorted by their first member.
    pub fn cycles(&self) -> Vec<Vec<PathBuf>> {
        let mut cycles: Vec<Vec<PathBuf>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&idx| self.graph.find_edge(idx, idx).is_some())
            })
            .map(|component| {
                let mut members: Vec<PathBuf> =
                    component.into_iter().map(|idx| self.graph[idx].clone()).collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Depth-first rendering of everything `root` depends on.
    pub fn tree(&self, root: &Path) -> Vec<TreeLine> {
        let mut lines = Vec::new();
        if let Some(&idx) = self.index.get(root) {
            let mut branch = Vec::new();
            let mut expanded = HashSet::new();
            self.tree_into(idx, 0, &mut branch, &mut expanded, &mut lines);
        }
        lines
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self.graph.node_count(),
            edges: self.graph.edge_count(),
            roots: self.roots.len(),
            cycles: self.cycles().len(),
        }
    }

    fn tree_into(
        &self,
        idx: NodeIndex,
        depth: usize,
        branch: &mut Vec<NodeIndex>,
        expanded: &mut HashSet<NodeIndex>,
        lines: &mut Vec<TreeLine>,
    ) {
        let cycle = branch.contains(&idx);
        let repeated = !cycle && expanded.contains(&idx);
        lines.push(TreeLine {
            depth,
            path: self.graph[idx].clone(),
            cycle,
            repeated,
        });
        if cycle || repeated {
            return;
        }

        expanded.insert(idx);
        branch.push(idx);
        for child in self.ordered_neighbors(idx, Direction::Outgoing) {
            self.tree_into(child, depth + 1, branch, expanded, lines);
        }
        branch.pop();
    }

    fn neighbors(&self, path: &Path, direction: Direction) -> Vec<&Path> {
        match self.index.get(path) {
            Some(&idx) => self
                .ordered_neighbors(idx, direction)
                .into_iter()
                .map(|n| self.graph[n].as_path())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Neighbors in edge insertion order (petgraph yields newest first).
    fn ordered_neighbors(&self, idx: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                (edge.id(), other)
            })
            .collect();
        edges.sort_by_key(|(id, _)| *id);
        edges.into_iter().map(|(_, other)| other).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str)]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (from, to) in edges {
            let a = graph.add_node(Path::new(from));
            let b = graph.add_node(Path::new(to));
            graph.add_edge(a, b);
        }
        graph
    }

    #[test]
    fn test_dependencies_keep_scan_order() {
        let g = graph(&[("/m.c", "/z.h"), ("/m.c", "/a.h"), ("/x.c", "/a.h")]);
        assert_eq!(
            g.dependencies(Path::new("/m.c")),
            vec![Path::new("/z.h"), Path::new("/a.h")]
        );
        assert_eq!(
            g.dependents(Path::new("/a.h")),
            vec![Path::new("/m.c"), Path::new("/x.c")]
        );
        assert!(g.dependencies(Path::new("/missing.c")).is_empty());
    }

    #[test]
    fn test_cycles() {
        let g = graph(&[
            ("/m.c", "/b.h"),
            ("/b.h", "/a.h"),
            ("/a.h", "/b.h"),
            ("/self.h", "/self.h"),
            ("/m.c", "/leaf.h"),
        ]);
        assert_eq!(
            g.cycles(),
            vec![
                vec![PathBuf::from("/a.h"), PathBuf::from("/b.h")],
                vec![PathBuf::from("/self.h")],
            ]
        );
        assert_eq!(g.stats().cycles, 2);
    }

    #[test]
    fn test_tree_marks_cycles_and_repeats() {
        let g = graph(&[
            ("/m.c", "/a.h"),
            ("/m.c", "/b.h"),
            ("/a.h", "/b.h"),
            ("/b.h", "/a.h"),
        ]);
        let lines = g.tree(Path::new("/m.c"));
        let rendered: Vec<_> = lines
            .iter()
            .map(|l| (l.depth, l.path.display().to_string(), l.cycle, l.repeated))
            .collect();
        assert_eq!(
            rendered,
            vec![
                (0, "/m.c".to_string(), false, false),
                (1, "/a.h".to_string(), false, false),
                (2, "/b.h".to_string(), false, false),
                (3, "/a.h".to_string(), true, false),
                (1, "/b.h".to_string(), false, true),
            ]
        );
    }
}
