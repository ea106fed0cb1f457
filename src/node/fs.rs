//
//  fs.rs
//  Depscan
//
//  Created by hak (tharun)
//

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use tracing::debug;

use super::{IncludeCache, Node, NodeKind, NodeRef};
use crate::error::{Result, ScanError};

/// Node registry backed by the real file system.
///
/// Nodes are interned by absolute path, so every lookup of the same path
/// returns the same `Arc` and shares one include cache. The local tree
/// lives under `top`; repositories are read-only mirrors of that tree
/// searched, in registration order, for anything missing locally.
#[derive(Clone)]
pub struct FileSystem {
    inner: Arc<FsInner>,
}

struct FsInner {
    top: PathBuf,
    repositories: RwLock<Vec<PathBuf>>,
    cwd: RwLock<PathBuf>,
    nodes: Mutex<HashMap<PathBuf, Arc<FsNode>>>,
}

impl FileSystem {
    /// Create a registry rooted at `top`.
    pub fn new<P: Into<PathBuf>>(top: P) -> Self {
        let top = canonical(top.into());
        Self {
            inner: Arc::new(FsInner {
                cwd: RwLock::new(top.clone()),
                top,
                repositories: RwLock::new(Vec::new()),
                nodes: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register a repository mirror. Setup-time only.
    pub fn add_repository<P: Into<PathBuf>>(&self, path: P) {
        let path = canonical(path.into());
        debug!(repository = %path.display(), "adding repository");
        self.inner.repositories.write().unwrap().push(path);
    }

    pub fn repositories(&self) -> Vec<PathBuf> {
        self.inner.repositories.read().unwrap().clone()
    }

    pub fn top(&self) -> &Path {
        &self.inner.top
    }

    /// Change the directory relative names are looked up from.
    pub fn chdir<P: AsRef<Path>>(&self, dir: P) {
        let dir = self.inner.resolve(&dir.as_ref().to_string_lossy(), None);
        *self.inner.cwd.write().unwrap() = dir;
    }

    pub fn cwd(&self) -> PathBuf {
        self.inner.cwd.read().unwrap().clone()
    }

    /// Node for the current working directory.
    pub fn cwd_dir(&self) -> Result<Arc<FsNode>> {
        let cwd = self.cwd();
        self.inner.intern(cwd, NodeKind::Dir)
    }

    /// Look up a file node. `name` may be relative to `dir` (default: the
    /// working directory), absolute, or `#`-prefixed for top-relative.
    pub fn file(&self, name: &str, dir: Option<&Path>) -> Result<Arc<FsNode>> {
        self.lookup(name, dir, NodeKind::File)
    }

    pub fn dir(&self, name: &str, dir: Option<&Path>) -> Result<Arc<FsNode>> {
        self.lookup(name, dir, NodeKind::Dir)
    }

    pub fn entry(&self, name: &str, dir: Option<&Path>) -> Result<Arc<FsNode>> {
        self.lookup(name, dir, NodeKind::Entry)
    }

    pub fn lookup(&self, name: &str, dir: Option<&Path>, kind: NodeKind) -> Result<Arc<FsNode>> {
        let path = self.inner.resolve(name, dir);
        self.inner.intern(path, kind)
    }

    /// Number of interned nodes.
    pub fn node_count(&self) -> usize {
        self.inner.nodes.lock().unwrap().len()
    }
}

impl fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystem")
            .field("top", &self.inner.top)
            .field("repositories", &self.repositories())
            .finish()
    }
}

impl FsInner {
    fn resolve(&self, name: &str, dir: Option<&Path>) -> PathBuf {
        if let Some(rest) = name.strip_prefix('#') {
            let rest = rest.trim_start_matches(['/', '\\']);
            return normalize(&self.top.join(rest));
        }
        let path = Path::new(name);
        if path.is_absolute() {
            return normalize(path);
        }
        let base = match dir {
            Some(d) => d.to_path_buf(),
            None => self.cwd.read().unwrap().clone(),
        };
        normalize(&base.join(path))
    }

    fn intern(self: &Arc<Self>, path: PathBuf, kind: NodeKind) -> Result<Arc<FsNode>> {
        let mut nodes = self.nodes.lock().unwrap();
        if let Some(existing) = nodes.get(&path) {
            existing.disambiguate(kind)?;
            return Ok(Arc::clone(existing));
        }
        let node = Arc::new(FsNode {
            path: path.clone(),
            kind: RwLock::new(kind),
            fs: Arc::downgrade(self),
            builder: AtomicBool::new(false),
            up_to_date: AtomicBool::new(false),
            includes: IncludeCache::new(),
        });
        nodes.insert(path, Arc::clone(&node));
        Ok(node)
    }

    fn registered(&self, path: &Path) -> Option<Arc<FsNode>> {
        self.nodes.lock().unwrap().get(path).cloned()
    }

    /// The same location inside every repository, in search order.
    fn mirrors(&self, path: &Path) -> Vec<PathBuf> {
        let Ok(rel) = path.strip_prefix(&self.top) else {
            return Vec::new();
        };
        self.repositories
            .read()
            .unwrap()
            .iter()
            .filter(|repo| !path.starts_with(repo))
            .map(|repo| repo.join(rel))
            .collect()
    }
}

/// A file, directory or undetermined entry on disk.
pub struct FsNode {
    path: PathBuf,
    kind: RwLock<NodeKind>,
    fs: Weak<FsInner>,
    builder: AtomicBool,
    up_to_date: AtomicBool,
    includes: IncludeCache,
}

impl FsNode {
    /// Mark the node as generated by a build action.
    pub fn set_builder(&self, has_builder: bool) {
        self.builder.store(has_builder, Ordering::SeqCst);
    }

    pub fn set_up_to_date(&self, up_to_date: bool) {
        self.up_to_date.store(up_to_date, Ordering::SeqCst);
    }

    /// Settle an entry into a file or directory, rejecting file/dir clashes.
    fn disambiguate(&self, requested: NodeKind) -> Result<()> {
        let mut kind = self.kind.write().unwrap();
        match (*kind, requested) {
            (_, NodeKind::Entry) => Ok(()),
            (NodeKind::Entry, k) => {
                *kind = k;
                Ok(())
            }
            (a, b) if a == b => Ok(()),
            (a, b) => Err(ScanError::NodeConflict {
                path: self.path.clone(),
                existing: a.as_str(),
                requested: b.as_str(),
            }),
        }
    }

    fn fs(&self) -> Option<Arc<FsInner>> {
        self.fs.upgrade()
    }
}

impl fmt::Debug for FsNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsNode")
            .field("path", &self.path)
            .field("kind", &self.kind())
            .finish()
    }
}

impl Node for FsNode {
    fn path(&self) -> &Path {
        &self.path
    }

    fn kind(&self) -> NodeKind {
        *self.kind.read().unwrap()
    }

    fn exists(&self) -> bool {
        match self.kind() {
            NodeKind::File => self.path.is_file(),
            NodeKind::Dir => self.path.is_dir(),
            NodeKind::Entry => self.path.exists(),
        }
    }

    fn text_contents(&self) -> Result<String> {
        let bytes = fs::read(&self.path)?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(text.trim_start_matches('\u{feff}').to_string())
    }

    fn dir(&self) -> Option<NodeRef> {
        let parent = self.path.parent()?.to_path_buf();
        let node: NodeRef = self.fs()?.intern(parent, NodeKind::Dir).ok()?;
        Some(node)
    }

    fn has_builder(&self) -> bool {
        self.builder.load(Ordering::SeqCst)
    }

    fn is_up_to_date(&self) -> bool {
        self.up_to_date.load(Ordering::SeqCst)
    }

    fn repository_copy(&self) -> Option<NodeRef> {
        if self.exists() {
            return None;
        }
        let fs = self.fs()?;
        let kind = self.kind();
        let found = fs.mirrors(&self.path).into_iter().find(|m| match kind {
            NodeKind::File => m.is_file(),
            NodeKind::Dir => m.is_dir(),
            NodeKind::Entry => m.exists(),
        })?;
        let node: NodeRef = fs.intern(found, kind).ok()?;
        Some(node)
    }

    fn includes(&self) -> &IncludeCache {
        &self.includes
    }

    fn find_file(&self, name: &str) -> Option<NodeRef> {
        if self.kind() == NodeKind::File {
            return None;
        }
        let fs = self.fs()?;
        let candidates = std::iter::once(self.path.clone())
            .chain(fs.mirrors(&self.path))
            .map(|dir| normalize(&dir.join(name)));

        for candidate in candidates {
            if let Some(node) = fs.registered(&candidate) {
                if node.kind() != NodeKind::Dir && (node.has_builder() || node.exists()) {
                    return Some(node as NodeRef);
                }
            }
            if candidate.is_file() {
                if let Ok(node) = fs.intern(candidate, NodeKind::File) {
                    return Some(node as NodeRef);
                }
            }
        }
        None
    }

    fn find_all_dirs(&self, path: &str) -> Vec<NodeRef> {
        let Some(fs) = self.fs() else {
            return Vec::new();
        };
        let local = fs.resolve(path, Some(&self.path));
        let mut dirs: Vec<NodeRef> = Vec::new();
        if let Ok(node) = fs.intern(local.clone(), NodeKind::Dir) {
            dirs.push(node);
        }
        for mirror in fs.mirrors(&local) {
            if mirror.is_dir() {
                if let Ok(node) = fs.intern(mirror, NodeKind::Dir) {
                    dirs.push(node);
                }
            }
        }
        dirs
    }
}

/// Lexically remove `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn canonical(path: PathBuf) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| normalize(&path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_nodes_are_interned() {
        let dir = tempdir().unwrap();
        let fs = FileSystem::new(dir.path());

        let a = fs.file("src/main.c", None).unwrap();
        let b = fs.file("#/src/./main.c", None).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(fs.node_count(), 1);
    }

    #[test]
    fn test_entry_settles_and_conflicts() {
        let dir = tempdir().unwrap();
        let fs = FileSystem::new(dir.path());

        let e = fs.entry("thing", None).unwrap();
        assert_eq!(e.kind(), NodeKind::Entry);
        fs.file("thing", None).unwrap();
        assert_eq!(e.kind(), NodeKind::File);

        let err = fs.dir("thing", None).unwrap_err();
        assert!(matches!(err, ScanError::NodeConflict { .. }));
    }

    #[test]
    fn test_repository_copy() {
        let local = tempdir().unwrap();
        let repo = tempdir().unwrap();
        write(&repo.path().join("src/util.h"), "// repo copy\n");

        let fs = FileSystem::new(local.path());
        fs.add_repository(repo.path());

        let node = fs.file("src/util.h", None).unwrap();
        assert!(!node.exists());
        let copy = node.repository_copy().unwrap();
        assert!(copy.path().starts_with(repo.path().canonicalize().unwrap()));
        assert_eq!(copy.text_contents().unwrap(), "// repo copy\n");

        write(&local.path().join("src/util.h"), "// local\n");
        assert!(node.repository_copy().is_none());
    }

    #[test]
    fn test_find_file_prefers_local_then_mirror() {
        let local = tempdir().unwrap();
        let repo = tempdir().unwrap();
        write(&repo.path().join("inc/a.h"), "");
        write(&repo.path().join("inc/b.h"), "");
        write(&local.path().join("inc/b.h"), "");

        let fs = FileSystem::new(local.path());
        fs.add_repository(repo.path());
        let inc = fs.dir("inc", None).unwrap();

        let a = inc.find_file("a.h").unwrap();
        assert!(a.path().starts_with(repo.path().canonicalize().unwrap()));
        let b = inc.find_file("b.h").unwrap();
        assert!(b.path().starts_with(fs.top()));
        assert!(inc.find_file("c.h").is_none());
    }

    #[test]
    fn test_find_file_sees_derived_nodes() {
        let dir = tempdir().unwrap();
        let fs = FileSystem::new(dir.path());
        let generated = fs.file("gen/config.h", None).unwrap();
        generated.set_builder(true);

        let gen_dir = fs.dir("gen", None).unwrap();
        let found = gen_dir.find_file("config.h").unwrap();
        assert_eq!(found.path(), generated.path());
    }

    #[test]
    fn test_find_all_dirs_includes_mirrors() {
        let local = tempdir().unwrap();
        let repo = tempdir().unwrap();
        fs::create_dir_all(repo.path().join("include")).unwrap();

        let fs = FileSystem::new(local.path());
        fs.add_repository(repo.path());
        let top = fs.cwd_dir().unwrap();

        let dirs = top.find_all_dirs("include");
        assert_eq!(dirs.len(), 2);
        assert_eq!(dirs[0].path(), fs.top().join("include"));
        assert!(dirs[1].path().starts_with(repo.path().canonicalize().unwrap()));
    }
}
