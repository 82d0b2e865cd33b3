// src/files/layout.rs

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use super::FileTree;
use crate::error::{Error, Result};

pub const DEFAULT_RESOURCES: &str = "resources/raw";

/// On-disk placement rules for the files named in a [`FileTree`].
///
/// A file lives in `<root>/<dirs[category]>/<extra[name]>/<name>.csv`, where
/// categories without a `dirs` entry load straight from `root`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub root: PathBuf,
    /// Category key → directory relative to `root`.
    pub dirs: BTreeMap<String, PathBuf>,
    /// File name → extra segment appended after its category directory.
    pub extra: BTreeMap<String, PathBuf>,
}

impl Default for Layout {
    fn default() -> Self {
        let dirs = BTreeMap::from([
            ("behavior".to_string(), PathBuf::from("data/behavior")),
            (
                "self-appraisal".to_string(),
                PathBuf::from("data/self_appraisal"),
            ),
        ]);
        let extra = BTreeMap::from([("follow-up".to_string(), PathBuf::from("baseline"))]);
        Self {
            root: PathBuf::from(DEFAULT_RESOURCES),
            dirs,
            extra,
        }
    }
}

impl Layout {
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding `name`, or `NotFound` if the tree doesn't know it.
    pub fn resolve_dir(&self, tree: &FileTree, name: &str) -> Result<PathBuf> {
        if !tree.contains(name) {
            return Err(Error::NotFound(name.to_string()));
        }
        let mut dir = self.root.clone();
        if let Some(sub) = tree.category_of(name).and_then(|c| self.dirs.get(c)) {
            dir.push(sub);
        }
        if let Some(segment) = self.extra.get(name) {
            dir.push(segment);
        }
        Ok(dir)
    }
}
