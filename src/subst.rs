//! Construction-variable substitution.
//!
//! Supports `$NAME`, `${NAME}`, `$$` (a literal dollar), and the
//! per-call `TARGET`/`TARGETS`/`SOURCE`/`SOURCES` variables with the
//! `dir`, `file` and `abspath` attributes. Undefined variables expand to
//! nothing. Variables may reference other variables to any depth; a
//! reference to a variable that is already being expanded expands to
//! nothing, so `CPPPATH = ["$CPPPATH", "include"]` is well defined.

use crate::env::{Environment, Value};
use crate::error::Result;
use crate::node::NodeRef;

/// One substitution pass over an environment with target/source context.
pub struct Substituter<'a> {
    env: &'a Environment,
    target: &'a [NodeRef],
    source: &'a [NodeRef],
    stack: Vec<String>,
}

impl<'a> Substituter<'a> {
    pub fn new(env: &'a Environment, target: &'a [NodeRef], source: &'a [NodeRef]) -> Self {
        Self {
            env,
            target,
            source,
            stack: Vec::new(),
        }
    }

    /// Treat `name` as under expansion, so references back to it inside
    /// its own value expand to nothing.
    pub fn within(mut self, name: &str) -> Self {
        self.stack.push(name.to_string());
        self
    }

    /// Expand to a single string. List values join with spaces.
    pub fn expand(&mut self, text: &str) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            if let Some(tail) = after.strip_prefix('$') {
                out.push('$');
                rest = tail;
            } else if let Some(braced) = after.strip_prefix('{') {
                match braced.find('}') {
                    Some(end) => {
                        out.push_str(&self.expand_reference(&braced[..end])?);
                        rest = &braced[end + 1..];
                    }
                    None => {
                        out.push('$');
                        rest = after;
                    }
                }
            } else {
                let len = identifier_len(after);
                if len == 0 {
                    out.push('$');
                    rest = after;
                } else {
                    out.push_str(&self.expand_reference(&after[..len])?);
                    rest = &after[len..];
                }
            }
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Expand in list context: whitespace separates words, and a word that
    /// is exactly a reference to a list variable yields one word per element.
    pub fn expand_words(&mut self, text: &str) -> Result<Vec<String>> {
        let mut words = Vec::new();
        for token in text.split_whitespace() {
            if let Some(Value::List(items)) = self.whole_list_reference(token) {
                let name = whole_reference(token).unwrap_or_default().to_string();
                if !self.enter(&name) {
                    continue;
                }
                let expanded = items
                    .iter()
                    .map(|item| self.expand_words(item))
                    .collect::<Result<Vec<_>>>();
                self.leave();
                words.extend(expanded?.into_iter().flatten());
            } else {
                words.extend(self.expand(token)?.split_whitespace().map(str::to_string));
            }
        }
        Ok(words)
    }

    /// Expand one search-path element. Whitespace is preserved; a reference
    /// to a list variable flattens into several elements.
    pub fn expand_path_element(&mut self, element: &str) -> Result<Vec<String>> {
        if let Some(Value::List(items)) = self.whole_list_reference(element) {
            let name = whole_reference(element).unwrap_or_default().to_string();
            if !self.enter(&name) {
                return Ok(Vec::new());
            }
            let expanded = items
                .iter()
                .map(|item| self.expand_path_element(item))
                .collect::<Result<Vec<_>>>();
            self.leave();
            return Ok(expanded?.into_iter().flatten().collect());
        }
        let expanded = self.expand(element)?;
        let trimmed = expanded.trim();
        if trimmed.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![trimmed.to_string()])
        }
    }

    fn whole_list_reference(&self, token: &str) -> Option<Value> {
        let name = whole_reference(token)?;
        match self.env.get(name) {
            Some(value @ Value::List(_)) => Some(value.clone()),
            _ => None,
        }
    }

    fn expand_reference(&mut self, expr: &str) -> Result<String> {
        let (name, attr) = match expr.split_once('.') {
            Some((name, attr)) => (name, Some(attr)),
            None => (expr, None),
        };

        match name {
            "TARGET" => return Ok(node_attr(self.target.first(), attr)),
            "SOURCE" => return Ok(node_attr(self.source.first(), attr)),
            "TARGETS" => return Ok(join_nodes(self.target, attr)),
            "SOURCES" => return Ok(join_nodes(self.source, attr)),
            _ => {}
        }

        let Some(value) = self.env.get(name).cloned() else {
            return Ok(String::new());
        };

        if !self.enter(name) {
            return Ok(String::new());
        }
        let expanded = match value {
            Value::Str(s) => self.expand(&s),
            Value::List(items) => items
                .iter()
                .map(|item| self.expand(item))
                .collect::<Result<Vec<_>>>()
                .map(|parts| parts.join(" ")),
        };
        self.leave();
        expanded
    }

    /// Push `name`; false when it is already being expanded.
    fn enter(&mut self, name: &str) -> bool {
        if self.stack.iter().any(|n| n == name) {
            tracing::trace!(variable = name, "recursive reference expands to nothing");
            return false;
        }
        self.stack.push(name.to_string());
        true
    }

    fn leave(&mut self) {
        self.stack.pop();
    }
}

/// `$NAME` or `${NAME}` spanning the whole token.
fn whole_reference(token: &str) -> Option<&str> {
    let body = token.strip_prefix('$')?;
    let name = match body.strip_prefix('{') {
        Some(inner) => inner.strip_suffix('}')?,
        None => body,
    };
    (!name.is_empty() && identifier_len(name) == name.len()).then_some(name)
}

fn identifier_len(s: &str) -> usize {
    s.char_indices()
        .take_while(|&(i, c)| c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit()))
        .count()
}

fn node_attr(node: Option<&NodeRef>, attr: Option<&str>) -> String {
    let Some(node) = node else {
        return String::new();
    };
    let path = node.path();
    match attr {
        Some("dir") => path
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        Some("file") => path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default(),
        _ => path.display().to_string(),
    }
}

fn join_nodes(nodes: &[NodeRef], attr: Option<&str>) -> String {
    nodes
        .iter()
        .map(|n| node_attr(Some(n), attr))
        .collect::<Vec<_>>()
        .join(" ")
}
