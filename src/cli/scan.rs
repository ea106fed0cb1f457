//! Scan operations: scan, tree, keys

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Cli, Session};
use crate::graph::DependencyGraph;
use crate::node::{self, NodeRef};
use crate::walk;
use crate::warnings::{CollectingSink, DependencyWarning, WarningSink};

#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    dependencies: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ScanOutput {
    files: Vec<FileReport>,
    warnings: Vec<DependencyWarning>,
}

/// Print the dependencies of every file; directories contribute every file
/// with a known scanner key.
pub fn scan(cli: &Cli, files: &[PathBuf], recursive: bool, json: bool) -> Result<()> {
    let sink = Arc::new(CollectingSink::new());
    let session = if json {
        cli.session(Some(sink.clone() as Arc<dyn WarningSink>))?
    } else {
        cli.session(None)?
    };
    let env = &session.env;

    let roots = collect_roots(&session, files)?;
    let path_fn = walk::search_path(env);

    let results: Vec<Result<Vec<NodeRef>>> = if recursive {
        walk::scan_many(&roots, env, &session.selector, &path_fn)
            .into_iter()
            .map(|r| r.map_err(anyhow::Error::from))
            .collect()
    } else {
        roots
            .iter()
            .map(|root| {
                let scanner = session.selector.select(root)?;
                let path = path_fn(scanner)?;
                Ok(session.selector.scan(root, env, &path)?)
            })
            .collect()
    };

    let mut reports = Vec::with_capacity(roots.len());
    for (root, deps) in roots.iter().zip(results) {
        let deps =
            deps.with_context(|| format!("failed to scan {}", display(&session, root.path())))?;
        reports.push(FileReport {
            file: display(&session, root.path()),
            dependencies: deps.iter().map(|d| display(&session, d.path())).collect(),
        });
    }

    if json {
        let output = ScanOutput {
            files: reports,
            warnings: sink.events(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for report in &reports {
        println!("{}:", report.file);
        for dep in &report.dependencies {
            println!("  {}", dep);
        }
    }
    Ok(())
}

/// Print the include tree of `file`, then any include cycles.
pub fn tree(cli: &Cli, file: &Path, json: bool) -> Result<()> {
    let session = cli.session(None)?;
    let env = &session.env;
    let root: NodeRef = env.fs().file(&file.to_string_lossy(), None)?;

    let graph = DependencyGraph::build(
        std::slice::from_ref(&root),
        env,
        &session.selector,
        walk::search_path(env),
    )
    .with_context(|| format!("failed to scan {}", file.display()))?;
    let lines = graph.tree(root.path());

    if json {
        println!("{}", serde_json::to_string_pretty(&lines)?);
        return Ok(());
    }

    for line in &lines {
        let marker = if line.cycle {
            " (cycle)"
        } else if line.repeated {
            " (*)"
        } else {
            ""
        };
        println!(
            "{}{}{}",
            "  ".repeat(line.depth),
            display(&session, &line.path),
            marker
        );
    }

    let cycles = graph.cycles();
    if !cycles.is_empty() {
        println!();
        println!("Include cycles ({}):", cycles.len());
        for cycle in cycles {
            let members: Vec<_> = cycle.iter().map(|p| display(&session, p)).collect();
            println!("  - {}", members.join(" <-> "));
        }
    }
    Ok(())
}

/// Print every scanner key with the scanner it selects.
pub fn keys(session: &Session) -> Result<()> {
    for (key, scanner) in session.selector.scanners() {
        let key = if key.is_empty() { "(none)" } else { key.as_str() };
        println!("{:<8} {}", key, scanner.name());
    }
    Ok(())
}

fn collect_roots(session: &Session, files: &[PathBuf]) -> Result<Vec<NodeRef>> {
    let fs = session.env.fs();
    let keys = session.selector.skeys();
    let mut roots = Vec::new();

    for file in files {
        let full = if file.is_absolute() {
            file.clone()
        } else {
            fs.top().join(file)
        };

        if !full.is_dir() {
            let node: NodeRef = fs.file(&file.to_string_lossy(), None)?;
            roots.push(node);
            continue;
        }

        let mut found: Vec<PathBuf> = WalkBuilder::new(&full)
            .hidden(true)
            .git_ignore(true)
            .git_exclude(true)
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .map(|entry| entry.into_path())
            .filter(|path| keys.contains(&node::suffix_of(path)))
            .collect();
        found.sort();

        for path in found {
            let node: NodeRef = fs.file(&path.to_string_lossy(), None)?;
            roots.push(node);
        }
    }
    Ok(roots)
}

/// Path relative to the project top when it lies inside it.
fn display(session: &Session, path: &Path) -> String {
    path.strip_prefix(session.env.fs().top())
        .unwrap_or(path)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_directories_expand_to_scannable_files() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        fs::write(dir.path().join("src/b.c"), "").unwrap();
        fs::write(dir.path().join("src/nested/a.h"), "").unwrap();
        fs::write(dir.path().join("src/notes.txt"), "").unwrap();
        fs::write(dir.path().join("main.f90"), "").unwrap();

        let root = dir.path().to_string_lossy().into_owned();
        let cli = Cli::try_parse_from(["depscan", "--root", root.as_str(), "keys"]).unwrap();
        let session = cli.session(None).unwrap();

        let roots =
            collect_roots(&session, &[PathBuf::from("src"), PathBuf::from("main.f90")]).unwrap();
        let names: Vec<_> = roots.iter().map(|r| display(&session, r.path())).collect();
        assert_eq!(names, vec!["src/b.c", "src/nested/a.h", "main.f90"]);
    }
}
