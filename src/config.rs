//
//  config.rs
//  Depscan
//
//  Created by hak (tharun)
//

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::env::{Environment, Value};
use crate::error::Result;
use crate::node::FileSystem;
use crate::scanner::builtin::default_selector;
use crate::scanner::{IncludeStyle, Recursion, Scanner, Selector};

/// Default configuration file name, looked up in the project root.
pub const CONFIG_FILE: &str = "depscan.toml";

/// Top-level depscan configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    /// Construction variables, e.g. `CPPPATH = ["include", "#/gen"]`.
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    /// Extra include scanners, registered after the stock ones.
    #[serde(default, rename = "scanner")]
    pub scanners: Vec<ScannerConfig>,
}

/// Project-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Top of the local tree (relative to the config file).
    #[serde(default = "default_root")]
    pub root: String,
    /// Repository mirrors, searched in order for anything missing locally.
    #[serde(default)]
    pub repositories: Vec<String>,
}

/// A pattern-driven include scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    pub name: String,
    pub suffixes: Vec<String>,
    pub path_variable: String,
    pub pattern: String,
    #[serde(default)]
    pub style: IncludeStyle,
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

fn default_root() -> String {
    ".".to_string()
}

fn default_recursive() -> bool {
    true
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            repositories: Vec::new(),
        }
    }
}

impl ScannerConfig {
    pub fn build(&self) -> Result<Scanner> {
        let scanner = match self.style {
            IncludeStyle::Classic => {
                Scanner::classic(&self.name, &self.suffixes, &self.path_variable, &self.pattern)?
            }
            IncludeStyle::Cpp => Scanner::classic_cpp(
                &self.name,
                &self.suffixes,
                &self.path_variable,
                &self.pattern,
            )?,
        };
        let recursion = if self.recursive {
            Recursion::All
        } else {
            Recursion::None
        };
        Ok(scanner.with_recursion(recursion))
    }
}

impl Config {
    /// Parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Like [`Config::load`], but an absent file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the project root relative to the directory holding the config.
    pub fn resolve_root(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(&self.project.root)
    }

    /// Environment over the configured tree, repositories and variables.
    pub fn environment(&self, config_dir: &Path) -> Environment {
        let fs = FileSystem::new(self.resolve_root(config_dir));
        for repository in &self.project.repositories {
            fs.add_repository(config_dir.join(repository));
        }
        let mut env = Environment::new(fs);
        for (name, value) in &self.variables {
            env.set(name.clone(), value.clone());
        }
        env
    }

    /// The stock selector with every configured scanner registered on top;
    /// a configured suffix replaces the stock binding.
    pub fn selector(&self) -> Result<Selector> {
        let mut selector = default_selector();
        for config in &self.scanners {
            let scanner = Arc::new(config.build()?);
            for suffix in &config.suffixes {
                selector.add_scanner(suffix.clone(), Arc::clone(&scanner));
            }
        }
        Ok(selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use crate::node::NodeRef;
    use std::fs;
    use tempfile::tempdir;

    const SAMPLE: &str = r##"
[project]
root = "src"
repositories = ["../mirror"]

[variables]
CPPPATH = ["include", "#/gen"]
CC = "gcc"

[[scanner]]
name = "ProtoScan"
suffixes = [".proto"]
path_variable = "PROTOPATH"
pattern = '^import\s+"([^"]+)"'
recursive = false
"##;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.project.root, ".");
        assert!(config.project.repositories.is_empty());
        assert!(config.scanners.is_empty());
    }

    #[test]
    fn test_load_sample() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, SAMPLE).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.project.root, "src");
        assert_eq!(
            config.variables.get("CPPPATH"),
            Some(&Value::from(vec!["include", "#/gen"]))
        );
        assert_eq!(config.variables.get("CC"), Some(&Value::from("gcc")));
        assert_eq!(config.scanners.len(), 1);
        assert_eq!(config.scanners[0].style, IncludeStyle::Classic);
        assert!(!config.scanners[0].recursive);
    }

    #[test]
    fn test_missing_file_is_default_but_bad_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        assert!(Config::load_or_default(&path).unwrap().variables.is_empty());

        fs::write(&path, "[project\nroot = ").unwrap();
        assert!(matches!(Config::load(&path), Err(ScanError::Config(_))));
        assert!(Config::load_or_default(&path).is_err());
    }

    #[test]
    fn test_environment_and_selector() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/protos")).unwrap();
        fs::create_dir_all(dir.path().join("mirror")).unwrap();
        fs::write(dir.path().join("src/api.proto"), "import \"types.proto\"\n").unwrap();
        fs::write(dir.path().join("src/protos/types.proto"), "").unwrap();

        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.project.repositories = vec!["mirror".to_string()];
        config
            .variables
            .insert("PROTOPATH".to_string(), Value::from("protos"));

        let env = config.environment(dir.path());
        assert_eq!(env.fs().top(), dir.path().join("src").canonicalize().unwrap());
        assert_eq!(env.fs().repositories().len(), 1);

        let selector = config.selector().unwrap();
        assert!(selector.skeys().contains(&".proto".to_string()));
        assert!(selector.skeys().contains(&".c".to_string()));

        let node: NodeRef = env.fs().file("api.proto", None).unwrap();
        let scanner = selector.select(&node).unwrap();
        assert_eq!(scanner.name(), "ProtoScan");
        assert_eq!(*scanner.recursion(), Recursion::None);

        let path = scanner.path(&env, None, &[], &[]).unwrap();
        let deps = selector.scan(&node, &env, &path).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].path(), env.fs().top().join("protos/types.proto"));
    }

    #[test]
    fn test_invalid_scanner_pattern() {
        let config = Config {
            scanners: vec![ScannerConfig {
                name: "Broken".to_string(),
                suffixes: vec![".x".to_string()],
                path_variable: "XPATH".to_string(),
                pattern: "(unclosed".to_string(),
                style: IncludeStyle::Cpp,
                recursive: true,
            }],
            ..Config::default()
        };
        assert!(matches!(config.selector(), Err(ScanError::InvalidPattern(_))));
    }
}
