//! Recursive scanning on top of the single-node scanners.
//!
//! Scanners only report direct dependencies. This module is the build
//! driver side: it follows recursion policies, guards against include
//! cycles and memoizes search paths.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use rayon::prelude::*;
use tracing::debug;

use crate::env::Environment;
use crate::error::Result;
use crate::node::NodeRef;
use crate::scanner::{DependencyScanner, Scanner};

/// Search path for a concrete scanner, relative to the working directory.
pub fn search_path(env: &Environment) -> impl Fn(&Scanner) -> Result<Vec<NodeRef>> + Sync + '_ {
    move |scanner| scanner.path(env, None, &[], &[])
}

/// Every implicit dependency of `root`, breadth first, without duplicates.
///
/// Each visited node is scanned with the scanner `scanner` selects for it,
/// or with the root's scanner when nothing matches its key. `path_fn` runs
/// once per distinct concrete scanner. A root with no scanner of its own is
/// a [`ScanError::NoScanner`](crate::error::ScanError::NoScanner) error.
pub fn implicit_deps<S, P>(
    root: &NodeRef,
    env: &Environment,
    scanner: &S,
    path_fn: P,
) -> Result<Vec<NodeRef>>
where
    S: DependencyScanner + ?Sized,
    P: Fn(&Scanner) -> Result<Vec<NodeRef>>,
{
    walk(root, env, scanner, path_fn, |_, _| {})
}

/// Like [`implicit_deps`], also reporting every scanned node with its full
/// list of direct dependencies (including ones already seen).
pub fn walk<S, P, F>(
    root: &NodeRef,
    env: &Environment,
    scanner: &S,
    path_fn: P,
    mut on_scan: F,
) -> Result<Vec<NodeRef>>
where
    S: DependencyScanner + ?Sized,
    P: Fn(&Scanner) -> Result<Vec<NodeRef>>,
    F: FnMut(&NodeRef, &[NodeRef]),
{
    let root_scanner = scanner.select(root)?;
    let mut seen: HashSet<PathBuf> = HashSet::from([root.path().to_path_buf()]);
    let mut queue: VecDeque<NodeRef> = VecDeque::from([root.clone()]);
    let mut path_memo: HashMap<*const Scanner, Vec<NodeRef>> = HashMap::new();
    let mut dependencies = Vec::new();

    while let Some(node) = queue.pop_front() {
        let concrete = scanner.select(&node).unwrap_or(root_scanner);

        let key = concrete as *const Scanner;
        if !path_memo.contains_key(&key) {
            path_memo.insert(key, path_fn(concrete)?);
        }
        let path = &path_memo[&key];

        let found = concrete.scan(&node, env, path)?;
        on_scan(&node, &found);

        let fresh: Vec<NodeRef> = found
            .into_iter()
            .filter(|dep| seen.insert(dep.path().to_path_buf()))
            .collect();
        if fresh.is_empty() {
            continue;
        }

        queue.extend(concrete.recurse_nodes(&fresh));
        dependencies.extend(fresh);
    }

    debug!(
        root = %root.path().display(),
        count = dependencies.len(),
        "collected implicit dependencies"
    );
    Ok(dependencies)
}

/// [`implicit_deps`] for independent roots, scanned in parallel.
///
/// Results are in `roots` order. A node shared by several roots is parsed
/// once; its include cache serializes concurrent first scans.
pub fn scan_many<S, P>(
    roots: &[NodeRef],
    env: &Environment,
    scanner: &S,
    path_fn: P,
) -> Vec<Result<Vec<NodeRef>>>
where
    S: DependencyScanner + ?Sized,
    P: Fn(&Scanner) -> Result<Vec<NodeRef>> + Sync,
{
    roots
        .par_iter()
        .map(|root| implicit_deps(root, env, scanner, &path_fn))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use crate::node::FileSystem;
    use crate::scanner::builtin::{c_scanner, default_selector};
    use crate::scanner::{Recursion, Scanner};
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn write(top: &Path, rel: &str, content: &str) {
        let path = top.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn names(env: &Environment, deps: &[NodeRef]) -> Vec<String> {
        deps.iter()
            .map(|d| {
                d.path()
                    .strip_prefix(env.fs().top())
                    .unwrap()
                    .display()
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn test_include_cycle_terminates() {
        let dir = tempdir().unwrap();
        write(dir.path(), "main.c", "#include \"a.h\"\n");
        write(dir.path(), "a.h", "#include \"b.h\"\n");
        write(dir.path(), "b.h", "#include \"a.h\"\n#include \"main.c\"\n");

        let env = Environment::new(FileSystem::new(dir.path()));
        let root: NodeRef = env.fs().file("main.c", None).unwrap();
        let scanner = c_scanner();

        let deps = implicit_deps(&root, &env, &scanner, search_path(&env)).unwrap();
        assert_eq!(names(&env, &deps), vec!["a.h", "b.h"]);
    }

    #[test]
    fn test_breadth_first_order() {
        let dir = tempdir().unwrap();
        write(dir.path(), "main.c", "#include \"x.h\"\n#include \"y.h\"\n");
        write(dir.path(), "x.h", "#include \"deep.h\"\n");
        write(dir.path(), "y.h", "");
        write(dir.path(), "deep.h", "");

        let env = Environment::new(FileSystem::new(dir.path()));
        let root: NodeRef = env.fs().file("main.c", None).unwrap();

        let deps = implicit_deps(&root, &env, &c_scanner(), search_path(&env)).unwrap();
        assert_eq!(names(&env, &deps), vec!["x.h", "y.h", "deep.h"]);
    }

    #[test]
    fn test_unknown_key_falls_back_to_root_scanner() {
        let dir = tempdir().unwrap();
        write(dir.path(), "main.c", "#include \"table.inc\"\n");
        write(dir.path(), "table.inc", "#include \"row.h\"\n");
        write(dir.path(), "row.h", "");

        let env = Environment::new(FileSystem::new(dir.path()));
        let root: NodeRef = env.fs().file("main.c", None).unwrap();
        let selector = default_selector();

        let deps = implicit_deps(&root, &env, &selector, search_path(&env)).unwrap();
        assert_eq!(names(&env, &deps), vec!["table.inc", "row.h"]);
    }

    #[test]
    fn test_root_without_scanner_is_an_error() {
        let dir = tempdir().unwrap();
        write(dir.path(), "notes.txt", "#include \"a.h\"\n");
        write(dir.path(), "a.h", "");

        let env = Environment::new(FileSystem::new(dir.path()));
        let root: NodeRef = env.fs().file("notes.txt", None).unwrap();
        let selector = default_selector();

        let err = implicit_deps(&root, &env, &selector, search_path(&env)).unwrap_err();
        assert!(matches!(err, ScanError::NoScanner { ref key, .. } if key == ".txt"));

        let results = scan_many(&[root], &env, &selector, search_path(&env));
        assert!(results[0].is_err());
    }

    #[test]
    fn test_self_referencing_search_path() {
        let dir = tempdir().unwrap();
        write(dir.path(), "main.c", "#include \"api.h\"\n");
        write(dir.path(), "include/api.h", "");

        let mut env = Environment::new(FileSystem::new(dir.path()));
        env.set("CPPPATH", vec!["$CPPPATH", "#/include"]);
        let root: NodeRef = env.fs().file("main.c", None).unwrap();

        let deps = implicit_deps(&root, &env, &default_selector(), search_path(&env)).unwrap();
        assert_eq!(names(&env, &deps), vec!["include/api.h"]);
    }

    #[test]
    fn test_recursion_policy_limits_descent() {
        let dir = tempdir().unwrap();
        write(dir.path(), "main.c", "#include \"a.h\"\n");
        write(dir.path(), "a.h", "#include \"b.h\"\n");
        write(dir.path(), "b.h", "");

        let env = Environment::new(FileSystem::new(dir.path()));
        let root: NodeRef = env.fs().file("main.c", None).unwrap();
        let flat = c_scanner().with_recursion(Recursion::None);

        let deps = implicit_deps(&root, &env, &flat, search_path(&env)).unwrap();
        assert_eq!(names(&env, &deps), vec!["a.h"]);
    }

    #[test]
    fn test_path_is_computed_once_per_scanner() {
        let dir = tempdir().unwrap();
        write(dir.path(), "main.c", "#include \"a.h\"\n");
        write(dir.path(), "a.h", "#include \"b.h\"\n");
        write(dir.path(), "b.h", "");

        let env = Environment::new(FileSystem::new(dir.path()));
        let root: NodeRef = env.fs().file("main.c", None).unwrap();
        let calls = AtomicUsize::new(0);
        let path_fn = |scanner: &Scanner| {
            calls.fetch_add(1, Ordering::SeqCst);
            scanner.path(&env, None, &[], &[])
        };

        implicit_deps(&root, &env, &default_selector(), path_fn).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_walk_reports_direct_edges() {
        let dir = tempdir().unwrap();
        write(dir.path(), "main.c", "#include \"a.h\"\n");
        write(dir.path(), "a.h", "#include \"main.c\"\n");

        let env = Environment::new(FileSystem::new(dir.path()));
        let root: NodeRef = env.fs().file("main.c", None).unwrap();
        let mut edges = Vec::new();

        walk(&root, &env, &c_scanner(), search_path(&env), |node, deps| {
            edges.push((names(&env, &[node.clone()])[0].clone(), names(&env, deps)));
        })
        .unwrap();

        assert_eq!(
            edges,
            vec![
                ("main.c".to_string(), vec!["a.h".to_string()]),
                ("a.h".to_string(), vec!["main.c".to_string()]),
            ]
        );
    }

    #[test]
    fn test_scan_many_parses_shared_header_once() {
        let dir = tempdir().unwrap();
        write(dir.path(), "common.h", "");
        for i in 0..8 {
            write(dir.path(), &format!("unit{i}.c"), "#include \"common.h\"\n");
        }

        let env = Environment::new(FileSystem::new(dir.path()));
        let roots: Vec<NodeRef> = (0..8)
            .map(|i| {
                let node: NodeRef = env.fs().file(&format!("unit{i}.c"), None).unwrap();
                node
            })
            .collect();
        let scanner: Scanner = c_scanner();

        let results = scan_many(&roots, &env, &scanner, search_path(&env));
        assert_eq!(results.len(), 8);
        for deps in results {
            assert_eq!(names(&env, &deps.unwrap()), vec!["common.h"]);
        }
        assert_eq!(scanner.include_scanner().unwrap().parses(), 9);
    }
}
