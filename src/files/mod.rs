// src/files/mod.rs

pub mod layout;

pub use layout::Layout;

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_yaml::Value;
use std::{fmt, str::FromStr};
use tracing::trace;

use crate::error::{Error, Result};

/// Loadable datasets with right-hand column bounds, organized by category.
static FILE_DICT: Lazy<FileTree> = Lazy::new(FileTree::default_layout);

/// The process-wide default lookup table.
pub fn file_dict() -> &'static FileTree {
    &FILE_DICT
}

/// A value in the lookup table: either another table or a column bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Table(FileTree),
    /// Zero-based exclusive index of the rightmost column to load.
    Bound(usize),
}

/// Ordered, nested mapping of category → … → (file name → column bound).
///
/// Keys are unique at each level and keep insertion order. Trees built through
/// [`FileTree::insert_at`], [`FileTree::from_entries`] or [`FileTree::from_yaml`]
/// additionally keep leaf names unique across the whole tree, since files are
/// resolved by bare name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTree {
    entries: Vec<(String, Node)>,
}

/// Which part of each leaf [`FileTree::get`] returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InfoMode {
    Names,
    Bounds,
    Both,
}

impl InfoMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfoMode::Names => "names",
            InfoMode::Bounds => "bounds",
            InfoMode::Both => "both",
        }
    }
}

impl FromStr for InfoMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "names" => Ok(InfoMode::Names),
            "bounds" => Ok(InfoMode::Bounds),
            "both" => Ok(InfoMode::Both),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for InfoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flattened leaf information, in depth-first insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FileInfo {
    Names(Vec<String>),
    Bounds(Vec<usize>),
    Both(Vec<(String, usize)>),
}

impl FileInfo {
    pub fn len(&self) -> usize {
        match self {
            FileInfo::Names(v) => v.len(),
            FileInfo::Bounds(v) => v.len(),
            FileInfo::Both(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in table of every dataset shipped under the resource root.
    pub fn default_layout() -> Self {
        let entries: [(&[&str], &str, usize); 10] = [
            (&["non-data"], "attendance", 1),
            (&["non-data"], "demographics", 8),
            (&["non-data"], "strata", 1),
            (&["behavior"], "coparenting", 14),
            (&["behavior"], "involvement", 42),
            (&["behavior"], "self-efficacy", 20),
            (&["behavior"], "stress", 37),
            (&["self-appraisal"], "follow-up", 26),
            (&["self-appraisal"], "primiparous", 26),
            (&["self-appraisal"], "multiparous", 26),
        ];
        // names above are unique
        Self::from_entries(entries).unwrap_or_default()
    }

    /// Build a tree eagerly from a flat `(category path, name, bound)` list.
    pub fn from_entries<'a, I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a [&'a str], &'a str, usize)>,
    {
        let mut tree = FileTree::new();
        for (path, name, bound) in entries {
            tree.insert_at(path, name, bound)?;
        }
        Ok(tree)
    }

    /// Build a tree from an ordered YAML mapping, e.g.
    ///
    /// ```yaml
    /// behavior:
    ///   coparenting: 14
    ///   stress: 37
    /// ```
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(contents)?;
        let mut tree = FileTree::new();
        tree.extend_from_value(&mut Vec::new(), &value)?;
        Ok(tree)
    }

    fn extend_from_value(&mut self, path: &mut Vec<String>, value: &Value) -> Result<()> {
        let mapping = value.as_mapping().ok_or_else(|| {
            Error::InvalidInput(format!("expected a mapping at '{}'", path.join("/")))
        })?;
        for (key, child) in mapping {
            let key = match key {
                Value::String(s) => s.clone(),
                other => serde_yaml::to_string(other)?.trim().to_string(),
            };
            match child {
                Value::Mapping(_) => {
                    path.push(key);
                    // register the table even if it ends up empty
                    self.entry_path(path.as_slice())?;
                    self.extend_from_value(path, child)?;
                    path.pop();
                }
                Value::Number(n) => {
                    let bound = n.as_u64().ok_or_else(|| {
                        Error::InvalidInput(format!(
                            "bound for '{}' must be a non-negative integer, got {}",
                            key, n
                        ))
                    })?;
                    let segments: Vec<&str> = path.iter().map(String::as_str).collect();
                    self.insert_at(&segments, &key, bound as usize)?;
                }
                other => {
                    return Err(Error::InvalidInput(format!(
                        "unexpected value for '{}': {:?}",
                        key, other
                    )))
                }
            }
        }
        Ok(())
    }

    /// Nested table under `key`, created empty if missing.
    pub fn entry(&mut self, key: &str) -> Result<&mut FileTree> {
        let idx = match self.entries.iter().position(|(k, _)| k == key) {
            Some(idx) => idx,
            None => {
                trace!(key, "creating nested table");
                self.entries
                    .push((key.to_string(), Node::Table(FileTree::new())));
                self.entries.len() - 1
            }
        };
        match &mut self.entries[idx].1 {
            Node::Table(table) => Ok(table),
            Node::Bound(_) => Err(Error::LeafCollision(key.to_string())),
        }
    }

    fn entry_path<S: AsRef<str>>(&mut self, path: &[S]) -> Result<&mut FileTree> {
        let mut table = self;
        for segment in path {
            table = table.entry(segment.as_ref())?;
        }
        Ok(table)
    }

    /// Insert a leaf at this level. Only this level is checked for collisions.
    pub fn insert(&mut self, name: &str, bound: usize) -> Result<()> {
        match self.entries.iter().find(|(k, _)| k == name) {
            Some((_, Node::Table(_))) => Err(Error::LeafCollision(name.to_string())),
            Some((_, Node::Bound(_))) => Err(Error::DuplicateName(name.to_string())),
            None => {
                self.entries.push((name.to_string(), Node::Bound(bound)));
                Ok(())
            }
        }
    }

    /// Insert a leaf under `path`, creating intermediate tables. Fails if
    /// `name` is already a leaf anywhere in the tree.
    pub fn insert_at(&mut self, path: &[&str], name: &str, bound: usize) -> Result<()> {
        if self.contains(name) {
            return Err(Error::DuplicateName(name.to_string()));
        }
        self.entry_path(path)?.insert(name, bound)
    }

    /// Nested table directly under `key`, if any.
    pub fn table(&self, key: &str) -> Option<&FileTree> {
        self.entries.iter().find_map(|(k, node)| match node {
            Node::Table(table) if k == key => Some(table),
            _ => None,
        })
    }

    /// Keys at this level, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Every leaf reachable from here, depth-first in insertion order.
    pub fn leaves(&self) -> Vec<(&str, usize)> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<(&'a str, usize)>) {
        for (key, node) in &self.entries {
            match node {
                Node::Table(table) => table.collect_leaves(out),
                Node::Bound(bound) => out.push((key.as_str(), *bound)),
            }
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.entries
            .iter()
            .map(|(_, node)| match node {
                Node::Table(table) => table.leaf_count(),
                Node::Bound(_) => 1,
            })
            .sum()
    }

    pub fn get(&self, mode: InfoMode) -> FileInfo {
        let leaves = self.leaves().into_iter();
        match mode {
            InfoMode::Names => FileInfo::Names(leaves.map(|(n, _)| n.to_string()).collect()),
            InfoMode::Bounds => FileInfo::Bounds(leaves.map(|(_, b)| b).collect()),
            InfoMode::Both => FileInfo::Both(leaves.map(|(n, b)| (n.to_string(), b)).collect()),
        }
    }

    /// [`FileTree::get`] with the mode given as text.
    pub fn get_str(&self, mode: &str) -> Result<FileInfo> {
        Ok(self.get(mode.parse()?))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bound_of(name).is_some()
    }

    pub fn bound_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().find_map(|(key, node)| match node {
            Node::Table(table) => table.bound_of(name),
            Node::Bound(bound) if key == name => Some(*bound),
            Node::Bound(_) => None,
        })
    }

    /// Top-level key whose subtree holds `name`. `None` for unknown names and
    /// for leaves sitting directly at the root.
    pub fn category_of(&self, name: &str) -> Option<&str> {
        self.entries.iter().find_map(|(key, node)| match node {
            Node::Table(table) if table.contains(name) => Some(key.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> FileTree {
        FileTree::from_entries([(&["a"][..], "x", 3)]).unwrap()
    }

    #[test]
    fn test_small_tree_modes() {
        let tree = small();
        assert_eq!(
            tree.get_str("names").unwrap(),
            FileInfo::Names(vec!["x".to_string()])
        );
        assert_eq!(tree.get_str("bounds").unwrap(), FileInfo::Bounds(vec![3]));
        assert_eq!(
            tree.get_str("both").unwrap(),
            FileInfo::Both(vec![("x".to_string(), 3)])
        );
    }

    #[test]
    fn test_every_mode_matches_leaf_count() {
        let tree = FileTree::default_layout();
        assert_eq!(tree.leaf_count(), 10);
        for mode in [InfoMode::Names, InfoMode::Bounds, InfoMode::Both] {
            assert_eq!(tree.get(mode).len(), tree.leaf_count(), "mode {}", mode);
        }
    }

    #[test]
    fn test_unsupported_mode_is_invalid() {
        let tree = FileTree::default_layout();
        for mode in ["name", "", "BOTH", "leaves"] {
            assert!(matches!(tree.get_str(mode), Err(Error::InvalidMode(m)) if m == mode));
        }
    }

    #[test]
    fn test_default_layout_order() {
        let tree = file_dict();
        let FileInfo::Both(both) = tree.get(InfoMode::Both) else {
            panic!("expected pairs");
        };
        assert_eq!(both[0], ("attendance".to_string(), 1));
        assert_eq!(both[4], ("involvement".to_string(), 42));
        assert_eq!(both[9], ("multiparous".to_string(), 26));
        assert_eq!(
            tree.keys().collect::<Vec<_>>(),
            vec!["non-data", "behavior", "self-appraisal"]
        );
    }

    #[test]
    fn test_entry_autovivifies() {
        let mut tree = FileTree::new();
        tree.entry("outer").unwrap().entry("inner").unwrap().insert("f", 2).unwrap();
        assert_eq!(tree.bound_of("f"), Some(2));
        assert_eq!(tree.category_of("f"), Some("outer"));
        assert!(tree.table("outer").unwrap().table("inner").is_some());

        // an empty table adds no leaves
        tree.entry("empty").unwrap();
        assert_eq!(tree.leaf_count(), 1);
    }

    #[test]
    fn test_entry_on_leaf_fails() {
        let mut tree = small();
        let table = tree.entry("a").unwrap();
        assert!(matches!(table.entry("x"), Err(Error::LeafCollision(_))));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut tree = small();
        let err = tree.insert_at(&["b"], "x", 5).unwrap_err();
        assert!(matches!(err, Error::DuplicateName(n) if n == "x"));
    }

    #[test]
    fn test_from_yaml_keeps_order() {
        let yaml = r#"
zeta:
  late: 4
  early: 2
alpha:
  nested:
    deep: 7
"#;
        let tree = FileTree::from_yaml(yaml).unwrap();
        assert_eq!(
            tree.get(InfoMode::Names),
            FileInfo::Names(vec!["late".into(), "early".into(), "deep".into()])
        );
        assert_eq!(tree.category_of("deep"), Some("alpha"));
    }

    #[test]
    fn test_from_yaml_rejects_negative_bound() {
        let err = FileTree::from_yaml("a:\n  x: -1\n").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_unknown_names() {
        let tree = FileTree::default_layout();
        assert!(!tree.contains("nope"));
        assert_eq!(tree.bound_of("nope"), None);
        assert_eq!(tree.category_of("nope"), None);
    }
}
