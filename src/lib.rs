//! # depscan
//!
//! Implicit dependency scanning for build systems.
//!
//! A build driver hands a node (usually a source file) to a scanner and
//! gets back the files it depends on without those being declared.
//!
//! ## Key Features
//!
//! - **Suffix dispatch**: a [`Selector`] routes each node to the scanner
//!   registered for its key
//! - **Include-aware search**: quoted includes look next to the including
//!   file first, bracketed includes search the path first
//! - **Repository mirrors**: missing local files are found in read-only
//!   mirrors without changing the result order
//! - **Parse once**: include names are cached on the node
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use depscan::{builtin, walk, Environment, FileSystem, NodeRef};
//!
//! let mut env = Environment::new(FileSystem::new("."));
//! env.set("CPPPATH", vec!["include"]);
//!
//! let selector = builtin::default_selector();
//! let main: NodeRef = env.fs().file("src/main.c", None).unwrap();
//!
//! let deps = walk::implicit_deps(&main, &env, &selector, walk::search_path(&env)).unwrap();
//! for dep in deps {
//!     println!("{}", dep.path().display());
//! }
//! ```

pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod gate;
pub mod graph;
pub mod node;
pub mod path;
pub mod scanner;
pub mod subst;
pub mod walk;
pub mod warnings;

// Re-exports for convenience
pub use config::Config;
pub use env::{Environment, NodeFactory, Value};
pub use error::{Result, ScanError};
pub use gate::ScanGate;
pub use graph::DependencyGraph;
pub use node::{FileSystem, FsNode, Node, NodeKind, NodeRef};
pub use path::PathResolver;
pub use scanner::builtin;
pub use scanner::{
    DependencyScanner, IncludeScanner, IncludeStyle, NodeClass, Recursion, ScanItem, Scanner,
    Selector,
};
pub use warnings::{CollectingSink, DependencyWarning, TracingSink, WarningSink};
