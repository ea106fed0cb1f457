//! Search-path resolution.

use crate::env::{Environment, Value};
use crate::error::Result;
use crate::node::NodeRef;
use crate::subst::Substituter;

/// Separator between entries of a path variable given as one string.
pub const PATH_LIST_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

/// Binds a path variable name (e.g. `CPPPATH`) to the directories it
/// names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathResolver {
    variable: String,
}

impl PathResolver {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Every directory the variable names, in search order.
    ///
    /// An unset variable yields no directories. Entries are resolved from
    /// `dir` (default: the working directory); each entry contributes its
    /// local directory followed by its repository mirrors.
    pub fn resolve(
        &self,
        env: &Environment,
        dir: Option<&NodeRef>,
        target: &[NodeRef],
        source: &[NodeRef],
    ) -> Result<Vec<NodeRef>> {
        let Some(value) = env.get(&self.variable) else {
            return Ok(Vec::new());
        };

        let dir: NodeRef = match dir {
            Some(d) => d.clone(),
            None => env.fs().cwd_dir()?,
        };

        let mut sub = Substituter::new(env, target, source).within(&self.variable);
        let mut dirs = Vec::new();
        for entry in path_list(value) {
            for expanded in sub.expand_path_element(&entry)? {
                dirs.extend(dir.find_all_dirs(&expanded));
            }
        }
        Ok(dirs)
    }
}

/// Split a path variable into unexpanded entries.
pub fn path_list(value: &Value) -> Vec<String> {
    match value {
        Value::Str(s) => s
            .split(PATH_LIST_SEPARATOR)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect(),
        Value::List(items) => items.clone(),
    }
}
