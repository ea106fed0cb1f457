//! CLI module for depscan.
//!
//! Commands:
//! - scan: direct or recursive dependencies of files and directories
//! - tree: indented include tree with cycle markers
//! - keys: scanner keys the configured selector handles

pub mod scan;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, CONFIG_FILE};
use crate::env::Environment;
use crate::scanner::Selector;
use crate::warnings::WarningSink;

#[derive(Parser)]
#[command(name = "depscan")]
#[command(about = "depscan - implicit dependency scanner for build trees", long_about = None)]
pub struct Cli {
    /// Project root directory; `[project].root` resolves against it
    /// (default: the config file's directory, else the current directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Config file (default: <root>/depscan.toml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Extra include directory, appended to CPPPATH and FORTRANPATH
    #[arg(short = 'I', long = "include")]
    pub include: Vec<String>,

    /// Repository mirror of the project tree (repeatable, searched in order)
    #[arg(long)]
    pub repository: Vec<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the dependencies of files (directories are walked)
    Scan {
        /// Files or directories, relative to the project root
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Follow dependencies of dependencies
        #[arg(short = 'R', long)]
        recursive: bool,

        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// Print the include tree of one file
    Tree {
        /// File, relative to the project root
        file: PathBuf,

        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// List scanner keys and the scanner bound to each
    Keys,
}

/// Everything a command needs: the environment and the selector.
pub struct Session {
    pub env: Environment,
    pub selector: Selector,
}

impl Cli {
    /// Load the config and apply command line overrides.
    pub fn session(&self, warnings: Option<Arc<dyn WarningSink>>) -> Result<Session> {
        let (config, base) = match &self.config {
            Some(path) => {
                let config = Config::load(path)
                    .with_context(|| format!("failed to load config {}", path.display()))?;
                let base = match &self.root {
                    Some(root) => root.clone(),
                    None => path.parent().unwrap_or(Path::new(".")).to_path_buf(),
                };
                (config, base)
            }
            None => {
                let root = self.root.clone().unwrap_or_else(|| PathBuf::from("."));
                let path = root.join(CONFIG_FILE);
                let config = Config::load_or_default(&path)
                    .with_context(|| format!("failed to load config {}", path.display()))?;
                (config, root)
            }
        };

        let mut env = config.environment(&base);
        for repository in &self.repository {
            env.fs().add_repository(repository.clone());
        }
        for dir in &self.include {
            env.append("CPPPATH", dir.as_str());
            env.append("FORTRANPATH", dir.as_str());
        }
        if let Some(sink) = warnings {
            env = env.with_warnings(sink);
        }

        let selector = config.selector().context("invalid scanner in config")?;
        Ok(Session { env, selector })
    }
}

/// Run a parsed command line.
pub fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Scan {
            files,
            recursive,
            json,
        } => scan::scan(cli, files, *recursive, *json),
        Commands::Tree { file, json } => scan::tree(cli, file, *json),
        Commands::Keys => scan::keys(&cli.session(None)?),
    }
}
