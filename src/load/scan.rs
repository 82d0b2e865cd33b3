use glob::{glob, Pattern};
use serde::Serialize;
use std::{collections::HashSet, path::PathBuf};
use tracing::{instrument, warn};

use super::Loader;
use crate::error::{Error, Result};

/// Differences between the lookup table and what is on disk.
#[derive(Debug, Default, Serialize)]
pub struct ScanReport {
    /// Configured files found at their resolved path.
    pub present: Vec<String>,
    /// Configured names whose resolved path does not exist.
    pub missing: Vec<(String, PathBuf)>,
    /// CSV files under the root that no configured name resolves to.
    pub unconfigured: Vec<PathBuf>,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.unconfigured.is_empty()
    }
}

/// Compare every configured file against the CSVs found under the resource root.
#[instrument(level = "info", skip(loader), fields(root = %loader.layout().root().display()))]
pub fn scan(loader: &Loader) -> Result<ScanReport> {
    let mut report = ScanReport::default();
    let mut expected = HashSet::new();

    for (name, _) in loader.tree().leaves() {
        let path = loader.resolve(name, None)?.path();
        if path.is_file() {
            report.present.push(name.to_string());
        } else {
            warn!(name, path = %path.display(), "configured file missing");
            report.missing.push((name.to_string(), path.clone()));
        }
        expected.insert(path);
    }

    let root = loader.layout().root().to_string_lossy();
    let pattern = format!("{}/**/*.csv", Pattern::escape(&root));
    for entry in glob(&pattern)? {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            Error::io(path, e.into_error())
        })?;
        if !expected.contains(&path) {
            report.unconfigured.push(path);
        }
    }
    report.unconfigured.sort();

    Ok(report)
}
