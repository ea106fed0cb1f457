//! Scanner engine: maps one node to its direct dependencies.
//!
//! A [`Scanner`] carries a scan function (or a dispatch table of other
//! scanners), the keys it applies to, an optional search-path function, the
//! node conversion rules for raw results, an optional [`ScanGate`] and a
//! recursion policy for the build driver. [`Selector`] is the pure
//! dispatcher variant, [`IncludeScanner`] the include-directive extractor.

pub mod builtin;
pub mod classic;
pub mod selector;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::env::{Environment, NodeFactory};
use crate::error::{Result, ScanError};
use crate::gate::{self, ScanGate};
use crate::node::{NodeKind, NodeRef};
use crate::path::PathResolver;

pub use classic::{IncludeScanner, IncludeStyle};
pub use selector::Selector;

/// One raw result of a scan function.
#[derive(Debug, Clone)]
pub enum ScanItem {
    Node(NodeRef),
    /// A name still to be turned into a node by the scanner's factory.
    Name(String),
}

impl From<NodeRef> for ScanItem {
    fn from(node: NodeRef) -> Self {
        ScanItem::Node(node)
    }
}

impl From<String> for ScanItem {
    fn from(name: String) -> Self {
        ScanItem::Name(name)
    }
}

impl From<&str> for ScanItem {
    fn from(name: &str) -> Self {
        ScanItem::Name(name.to_string())
    }
}

type PlainFn = dyn Fn(&NodeRef, &Environment, &[NodeRef]) -> Result<Vec<ScanItem>> + Send + Sync;
type ArgumentFn =
    dyn Fn(&NodeRef, &Environment, &[NodeRef], &str) -> Result<Vec<ScanItem>> + Send + Sync;
type PathFn = dyn Fn(
        &Environment,
        Option<&NodeRef>,
        &[NodeRef],
        &[NodeRef],
        Option<&str>,
    ) -> Result<Vec<NodeRef>>
    + Send
    + Sync;
type RecurseFn = dyn Fn(&[NodeRef]) -> Vec<NodeRef> + Send + Sync;

/// What a scanner runs on a node.
#[derive(Clone)]
pub enum ScanFunction {
    /// Called with `(node, env, path)`.
    Plain(Arc<PlainFn>),
    /// Called with `(node, env, path, argument)`; the scanner must carry an
    /// argument.
    WithArgument(Arc<ArgumentFn>),
    /// Include-directive extraction.
    Include(Arc<IncludeScanner>),
    /// Delegate by the node's scanner key.
    Dispatch(BTreeMap<String, Arc<Scanner>>),
}

impl PartialEq for ScanFunction {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ScanFunction::Plain(a), ScanFunction::Plain(b)) => Arc::ptr_eq(a, b),
            (ScanFunction::WithArgument(a), ScanFunction::WithArgument(b)) => Arc::ptr_eq(a, b),
            (ScanFunction::Include(a), ScanFunction::Include(b)) => a == b,
            (ScanFunction::Dispatch(a), ScanFunction::Dispatch(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for ScanFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanFunction::Plain(_) => f.write_str("Plain(..)"),
            ScanFunction::WithArgument(_) => f.write_str("WithArgument(..)"),
            ScanFunction::Include(inc) => f.debug_tuple("Include").field(inc).finish(),
            ScanFunction::Dispatch(map) => f
                .debug_tuple("Dispatch")
                .field(&map.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

/// Where a scanner's search path comes from.
#[derive(Clone)]
pub enum PathFunction {
    Variable(PathResolver),
    Custom(Arc<PathFn>),
}

impl PartialEq for PathFunction {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PathFunction::Variable(a), PathFunction::Variable(b)) => a == b,
            (PathFunction::Custom(a), PathFunction::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for PathFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathFunction::Variable(r) => f.debug_tuple("Variable").field(&r.variable()).finish(),
            PathFunction::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Which of a scan's results the build driver should scan in turn.
#[derive(Clone, Default)]
pub enum Recursion {
    #[default]
    None,
    All,
    Custom(Arc<RecurseFn>),
}

impl Recursion {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[NodeRef]) -> Vec<NodeRef> + Send + Sync + 'static,
    {
        Recursion::Custom(Arc::new(f))
    }

    /// Recurse into directories only, so a directory scan does not
    /// descend into the files it lists.
    pub fn only_dirs() -> Self {
        Recursion::custom(|nodes| {
            nodes
                .iter()
                .filter(|n| n.kind() == NodeKind::Dir)
                .cloned()
                .collect()
        })
    }

    pub fn filter(&self, nodes: &[NodeRef]) -> Vec<NodeRef> {
        match self {
            Recursion::None => Vec::new(),
            Recursion::All => nodes.to_vec(),
            Recursion::Custom(f) => f(nodes),
        }
    }
}

impl PartialEq for Recursion {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Recursion::None, Recursion::None) | (Recursion::All, Recursion::All) => true,
            (Recursion::Custom(a), Recursion::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Recursion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recursion::None => f.write_str("None"),
            Recursion::All => f.write_str("All"),
            Recursion::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Node kinds a scanner returns without conversion.
///
/// The check is by [`NodeKind`], not by concrete type: any [`Node`]
/// implementation of an accepted kind passes through unchanged.
///
/// [`Node`]: crate::node::Node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeClass {
    /// Files, directories and entries.
    #[default]
    Any,
    File,
    Dir,
    /// Never convert nodes. Raw names are still made into nodes.
    Unchecked,
}

impl NodeClass {
    pub fn accepts(&self, kind: NodeKind) -> bool {
        match self {
            NodeClass::Any | NodeClass::Unchecked => true,
            NodeClass::File => kind == NodeKind::File,
            NodeClass::Dir => kind == NodeKind::Dir,
        }
    }
}

/// Applicability keys: a literal list, or a string expanded through the
/// environment on request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skeys {
    List(Vec<String>),
    Pattern(String),
}

impl Default for Skeys {
    fn default() -> Self {
        Skeys::List(Vec::new())
    }
}

/// A configured dependency scanner.
///
/// Built once during environment setup and shared for the whole build.
/// Only the dispatch table and the key list change after construction,
/// and only through `&mut self` registration calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Scanner {
    name: String,
    function: ScanFunction,
    argument: Option<String>,
    skeys: Skeys,
    path_function: Option<PathFunction>,
    node_class: NodeClass,
    node_factory: Option<NodeFactory>,
    gate: Option<ScanGate>,
    recursion: Recursion,
}

impl Scanner {
    /// Create a scanner around `function`. A dispatch table contributes its
    /// keys as the initial applicability keys.
    pub fn new(function: ScanFunction) -> Self {
        let skeys = match &function {
            ScanFunction::Dispatch(map) => Skeys::List(map.keys().cloned().collect()),
            _ => Skeys::default(),
        };
        Self {
            name: "NONE".to_string(),
            function,
            argument: None,
            skeys,
            path_function: None,
            node_class: NodeClass::default(),
            node_factory: None,
            gate: None,
            recursion: Recursion::default(),
        }
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&NodeRef, &Environment, &[NodeRef]) -> Result<Vec<ScanItem>> + Send + Sync + 'static,
    {
        Self::new(ScanFunction::Plain(Arc::new(f)))
    }

    pub fn from_fn_with_argument<F>(f: F) -> Self
    where
        F: Fn(&NodeRef, &Environment, &[NodeRef], &str) -> Result<Vec<ScanItem>>
            + Send
            + Sync
            + 'static,
    {
        Self::new(ScanFunction::WithArgument(Arc::new(f)))
    }

    /// A scanner that delegates to `mapping` by scanner key.
    pub fn dispatch(mapping: BTreeMap<String, Arc<Scanner>>) -> Self {
        Self::new(ScanFunction::Dispatch(mapping))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Fixed argument passed to both the scan and the path function.
    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.argument = Some(argument.into());
        self
    }

    pub fn with_skeys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skeys = Skeys::List(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Keys given as a string such as `"$CPPSUFFIXES"`, expanded by
    /// [`Scanner::skeys`] when an environment is supplied.
    pub fn with_skeys_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.skeys = Skeys::Pattern(pattern.into());
        self
    }

    pub fn with_path_variable(mut self, variable: impl Into<String>) -> Self {
        self.path_function = Some(PathFunction::Variable(PathResolver::new(variable)));
        self
    }

    pub fn with_path_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(
                &Environment,
                Option<&NodeRef>,
                &[NodeRef],
                &[NodeRef],
                Option<&str>,
            ) -> Result<Vec<NodeRef>>
            + Send
            + Sync
            + 'static,
    {
        self.path_function = Some(PathFunction::Custom(Arc::new(f)));
        self
    }

    pub fn with_node_class(mut self, class: NodeClass) -> Self {
        self.node_class = class;
        self
    }

    pub fn with_node_factory(mut self, factory: NodeFactory) -> Self {
        self.node_factory = Some(factory);
        self
    }

    pub fn with_gate(mut self, gate: ScanGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_recursion(mut self, recursion: Recursion) -> Self {
        self.recursion = recursion;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self) -> &ScanFunction {
        &self.function
    }

    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    pub fn gate(&self) -> Option<&ScanGate> {
        self.gate.as_ref()
    }

    pub fn recursion(&self) -> &Recursion {
        &self.recursion
    }

    pub fn node_class(&self) -> NodeClass {
        self.node_class
    }

    /// The include extractor, when this scanner is one.
    pub fn include_scanner(&self) -> Option<&IncludeScanner> {
        match &self.function {
            ScanFunction::Include(inc) => Some(inc.as_ref()),
            _ => None,
        }
    }

    pub fn is_dispatcher(&self) -> bool {
        matches!(self.function, ScanFunction::Dispatch(_))
    }

    /// Directories to search for this scanner's dependencies.
    pub fn path(
        &self,
        env: &Environment,
        dir: Option<&NodeRef>,
        target: &[NodeRef],
        source: &[NodeRef],
    ) -> Result<Vec<NodeRef>> {
        match &self.path_function {
            None => Ok(Vec::new()),
            Some(PathFunction::Variable(resolver)) => resolver.resolve(env, dir, target, source),
            Some(PathFunction::Custom(f)) => f(env, dir, target, source, self.argument()),
        }
    }

    /// Scan `node` and return its direct dependencies, in order.
    ///
    /// A gate that rejects the node yields an empty list. A dispatching
    /// scanner first selects the sub-scanner for the node's key and fails
    /// with [`ScanError::NoScanner`] when there is none.
    pub fn scan(
        &self,
        node: &NodeRef,
        env: &Environment,
        path: &[NodeRef],
    ) -> Result<Vec<NodeRef>> {
        if !gate::should_scan(self.gate.as_ref(), node, env) {
            debug!(scanner = %self.name, node = %node.path().display(), "scan gate skipped node");
            return Ok(Vec::new());
        }

        let engine = self.select(node)?;
        let raw = engine.invoke(node, env, path)?;
        engine.convert(raw, node, env)
    }

    /// The scanner that actually handles `node`: a dispatch table entry,
    /// or this scanner itself.
    pub fn select(&self, node: &NodeRef) -> Result<&Scanner> {
        match &self.function {
            ScanFunction::Dispatch(map) => lookup(map, node),
            _ => Ok(self),
        }
    }

    /// Subset of `nodes` the build driver should scan next.
    pub fn recurse_nodes(&self, nodes: &[NodeRef]) -> Vec<NodeRef> {
        self.recursion.filter(nodes)
    }

    /// Applicability keys, expanded through `env` when given as a pattern.
    pub fn skeys(&self, env: Option<&Environment>) -> Result<Vec<String>> {
        match (&self.skeys, env) {
            (Skeys::List(keys), _) => Ok(keys.clone()),
            (Skeys::Pattern(p), Some(env)) => env.subst_list(p, &[], &[]),
            (Skeys::Pattern(p), None) => Ok(vec![p.clone()]),
        }
    }

    pub fn add_skey(&mut self, key: impl Into<String>) {
        let key = key.into();
        match &mut self.skeys {
            Skeys::List(keys) => keys.push(key),
            Skeys::Pattern(p) => {
                p.push(' ');
                p.push_str(&key);
            }
        }
    }

    /// Bind `key` to `scanner` in the dispatch table and register the key.
    pub fn add_scanner(
        &mut self,
        key: impl Into<String>,
        scanner: impl Into<Arc<Scanner>>,
    ) -> Result<()> {
        let key = key.into();
        let ScanFunction::Dispatch(map) = &mut self.function else {
            return Err(ScanError::NotADispatcher {
                scanner: self.name.clone(),
            });
        };
        map.insert(key.clone(), scanner.into());
        self.add_skey(key);
        Ok(())
    }

    fn invoke(&self, node: &NodeRef, env: &Environment, path: &[NodeRef]) -> Result<Vec<ScanItem>> {
        match &self.function {
            ScanFunction::Plain(f) => f(node, env, path),
            ScanFunction::WithArgument(f) => {
                let argument = self.argument().ok_or_else(|| ScanError::MissingArgument {
                    scanner: self.name.clone(),
                })?;
                f(node, env, path, argument)
            }
            ScanFunction::Include(inc) => Ok(inc
                .scan(node, env, path)?
                .into_iter()
                .map(ScanItem::Node)
                .collect()),
            ScanFunction::Dispatch(map) => lookup(map, node)?.invoke(node, env, path),
        }
    }

    /// Turn raw results into nodes of an accepted kind, resolving names
    /// relative to the scanned node's directory.
    fn convert(
        &self,
        raw: Vec<ScanItem>,
        node: &NodeRef,
        env: &Environment,
    ) -> Result<Vec<NodeRef>> {
        let directory = node.dir();
        let factory = self.node_factory.as_ref();
        raw.into_iter()
            .map(|item| match item {
                ScanItem::Node(n) if self.node_class.accepts(n.kind()) => Ok(n),
                ScanItem::Node(n) => {
                    env.make_node(factory, &n.path().to_string_lossy(), directory.as_ref())
                }
                ScanItem::Name(name) => env.make_node(factory, &name, directory.as_ref()),
            })
            .collect()
    }
}

impl fmt::Display for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn lookup<'a>(map: &'a BTreeMap<String, Arc<Scanner>>, node: &NodeRef) -> Result<&'a Scanner> {
    let key = node.scanner_key();
    match map.get(&key) {
        Some(scanner) => Ok(scanner.as_ref()),
        None => Err(ScanError::NoScanner {
            key,
            node: node.path().to_path_buf(),
        }),
    }
}

/// Common surface of [`Scanner`] and [`Selector`] used by build drivers.
pub trait DependencyScanner: Send + Sync {
    fn name(&self) -> &str;

    fn scan(&self, node: &NodeRef, env: &Environment, path: &[NodeRef]) -> Result<Vec<NodeRef>>;

    fn path(
        &self,
        env: &Environment,
        dir: Option<&NodeRef>,
        target: &[NodeRef],
        source: &[NodeRef],
    ) -> Result<Vec<NodeRef>>;

    fn select(&self, node: &NodeRef) -> Result<&Scanner>;

    fn skeys(&self, env: Option<&Environment>) -> Result<Vec<String>>;

    fn recurse_nodes(&self, nodes: &[NodeRef]) -> Vec<NodeRef>;
}

impl DependencyScanner for Scanner {
    fn name(&self) -> &str {
        Scanner::name(self)
    }

    fn scan(&self, node: &NodeRef, env: &Environment, path: &[NodeRef]) -> Result<Vec<NodeRef>> {
        Scanner::scan(self, node, env, path)
    }

    fn path(
        &self,
        env: &Environment,
        dir: Option<&NodeRef>,
        target: &[NodeRef],
        source: &[NodeRef],
    ) -> Result<Vec<NodeRef>> {
        Scanner::path(self, env, dir, target, source)
    }

    fn select(&self, node: &NodeRef) -> Result<&Scanner> {
        Scanner::select(self, node)
    }

    fn skeys(&self, env: Option<&Environment>) -> Result<Vec<String>> {
        Scanner::skeys(self, env)
    }

    fn recurse_nodes(&self, nodes: &[NodeRef]) -> Vec<NodeRef> {
        Scanner::recurse_nodes(self, nodes)
    }
}
