//
//  classic.rs
//  Depscan
//
//  Created by hak (tharun)
//

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Recursion, ScanFunction, Scanner};
use crate::env::Environment;
use crate::error::{Result, ScanError};
use crate::gate::ScanGate;
use crate::node::{self, Delimiter, IncludeName, NodeRef};
use crate::warnings::DependencyWarning;

/// How include names are searched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncludeStyle {
    /// Group 1 (or the whole match) is the name; the containing directory
    /// is searched before the search path.
    #[default]
    Classic,
    /// Group 1 is the opening bracket, group 2 the name. Quoted names
    /// search the containing directory first, bracketed names last.
    Cpp,
}

impl IncludeStyle {
    fn required_groups(&self) -> usize {
        match self {
            IncludeStyle::Classic => 0,
            IncludeStyle::Cpp => 2,
        }
    }
}

/// Where the containing directory goes relative to the search path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchOrder {
    DirFirst,
    PathFirst,
}

/// Pattern-driven include extractor.
///
/// Include names are parsed once per node and cached on the node. Results
/// are ordered by the include text as written, so the order never depends
/// on which directory (local or repository) a name resolved in.
pub struct IncludeScanner {
    pattern: Regex,
    style: IncludeStyle,
    parses: AtomicUsize,
}

impl IncludeScanner {
    /// Compile `pattern` in multi-line mode.
    pub fn new(pattern: &str, style: IncludeStyle) -> Result<Self> {
        let regex = RegexBuilder::new(pattern).multi_line(true).build()?;
        let groups = regex.captures_len() - 1;
        if groups < style.required_groups() {
            return Err(ScanError::PatternGroups {
                pattern: pattern.to_string(),
                required: style.required_groups(),
            });
        }
        Ok(Self::compiled(regex, style))
    }

    /// Wrap a pattern already known to have the groups `style` needs.
    pub(crate) fn compiled(pattern: Regex, style: IncludeStyle) -> Self {
        Self {
            pattern,
            style,
            parses: AtomicUsize::new(0),
        }
    }

    pub fn classic(pattern: &str) -> Result<Self> {
        Self::new(pattern, IncludeStyle::Classic)
    }

    pub fn cpp(pattern: &str) -> Result<Self> {
        Self::new(pattern, IncludeStyle::Cpp)
    }

    pub fn style(&self) -> IncludeStyle {
        self.style
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// How many times node text has been parsed by this extractor.
    pub fn parses(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }

    /// Every include directive in `text`, in order of appearance.
    pub fn find_include_names(&self, text: &str) -> Vec<IncludeName> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| match self.style {
                IncludeStyle::Classic => {
                    let m = caps.get(1).or_else(|| caps.get(0))?;
                    Some(IncludeName::plain(m.as_str()))
                }
                IncludeStyle::Cpp => {
                    let delimiter = Delimiter::from_opening(caps.get(1)?.as_str())?;
                    Some(IncludeName::bracketed(delimiter, caps.get(2)?.as_str()))
                }
            })
            .collect()
    }

    /// Direct include dependencies of `node`.
    ///
    /// A node that does not exist (locally or in a repository) has none.
    /// Names that resolve nowhere are reported to the environment's
    /// warning sink and left out.
    pub fn scan(
        &self,
        node: &NodeRef,
        env: &Environment,
        path: &[NodeRef],
    ) -> Result<Vec<NodeRef>> {
        let node = node::rfile(node);
        if !node.exists() {
            debug!(node = %node.path().display(), "skipping missing node");
            return Ok(Vec::new());
        }

        let includes = node.includes().get_or_try_init(|| {
            self.parses.fetch_add(1, Ordering::SeqCst);
            let text = node.text_contents()?;
            Ok(self.find_include_names(&text))
        })?;

        let source_dir = node.dir();
        let mut found: Vec<(String, NodeRef)> = Vec::with_capacity(includes.len());
        for include in includes {
            match self.find_include(include, source_dir.as_ref(), path) {
                Some(dep) => found.push((self.sort_key(include), dep)),
                None => env.warn(DependencyWarning {
                    include: include.name.clone(),
                    from: node.path().to_path_buf(),
                }),
            }
        }

        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found.into_iter().map(|(_, dep)| dep).collect())
    }

    fn search_order(&self, include: &IncludeName) -> SearchOrder {
        match (self.style, include.delimiter) {
            (IncludeStyle::Cpp, Some(Delimiter::Angle)) => SearchOrder::PathFirst,
            _ => SearchOrder::DirFirst,
        }
    }

    fn find_include(
        &self,
        include: &IncludeName,
        source_dir: Option<&NodeRef>,
        path: &[NodeRef],
    ) -> Option<NodeRef> {
        let mut dirs: Vec<NodeRef> = Vec::with_capacity(path.len() + 1);
        match self.search_order(include) {
            SearchOrder::DirFirst => {
                dirs.extend(source_dir.cloned());
                dirs.extend_from_slice(path);
            }
            SearchOrder::PathFirst => {
                dirs.extend_from_slice(path);
                dirs.extend(source_dir.cloned());
            }
        }
        node::find_file(&include.name, &dirs)
    }

    /// Sort by the include text; CPP style keeps the bracket in the key so
    /// `"x.h"` and `<x.h>` stay distinct edges.
    fn sort_key(&self, include: &IncludeName) -> String {
        match (self.style, include.delimiter) {
            (IncludeStyle::Cpp, Some(d)) => {
                node::normcase(&format!("{} {}", d.opening(), include.name))
            }
            _ => node::normcase(&include.name),
        }
    }
}

impl PartialEq for IncludeScanner {
    fn eq(&self, other: &Self) -> bool {
        self.style == other.style && self.pattern.as_str() == other.pattern.as_str()
    }
}

impl fmt::Debug for IncludeScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncludeScanner")
            .field("pattern", &self.pattern.as_str())
            .field("style", &self.style)
            .finish()
    }
}

impl Scanner {
    /// Include scanner with classic search order: containing directory,
    /// then the directories in `path_variable`.
    ///
    /// Gated on [`ScanGate::Current`] and recursing into every result.
    pub fn classic<I, S>(
        name: &str,
        suffixes: I,
        path_variable: &str,
        pattern: &str,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let extractor = IncludeScanner::classic(pattern)?;
        Ok(Self::from_include(name, suffixes, path_variable, extractor))
    }

    /// Include scanner with CPP bracket rules.
    pub fn classic_cpp<I, S>(
        name: &str,
        suffixes: I,
        path_variable: &str,
        pattern: &str,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let extractor = IncludeScanner::cpp(pattern)?;
        Ok(Self::from_include(name, suffixes, path_variable, extractor))
    }

    pub fn from_include<I, S>(
        name: &str,
        suffixes: I,
        path_variable: &str,
        extractor: IncludeScanner,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Scanner::new(ScanFunction::Include(Arc::new(extractor)))
            .with_name(name)
            .with_skeys(suffixes)
            .with_path_variable(path_variable)
            .with_gate(ScanGate::Current)
            .with_recursion(Recursion::All)
    }
}
