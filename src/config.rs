// src/config.rs

use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::analysis::Settings;
use crate::error::{Error, Result};
use crate::files::{file_dict, layout::DEFAULT_RESOURCES, FileTree, Layout};
use crate::load::Loader;

/// Environment variable overriding the resource root.
pub const RESOURCES_ENV: &str = "PARENTLAB_RESOURCES";

/// Resource root from `PARENTLAB_RESOURCES`, falling back to `resources/raw`.
pub fn resources_from_env() -> PathBuf {
    env::var_os(RESOURCES_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RESOURCES))
}

/// Everything the CLI can be told through `--config <yaml>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Resource root. Falls back to the environment, then `resources/raw`.
    pub resources: Option<PathBuf>,
    /// Replacement lookup table, as an ordered YAML mapping.
    pub files: Option<serde_yaml::Value>,
    /// Directory rules; `root` is overwritten by `resources`.
    pub layout: Layout,
    pub analysis: Settings,
}

impl Config {
    pub fn from_yaml(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config = Self::from_yaml(&contents)?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Resource root: CLI override, then the config file, then the environment.
    pub fn resources(&self, cli: Option<&Path>) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or_else(|| self.resources.clone())
            .unwrap_or_else(resources_from_env)
    }

    pub fn file_tree(&self) -> Result<FileTree> {
        match &self.files {
            Some(value) => FileTree::from_yaml(&serde_yaml::to_string(value)?),
            None => Ok(file_dict().clone()),
        }
    }

    pub fn loader(&self, cli_resources: Option<&Path>) -> Result<Loader> {
        let layout = self.layout.clone().with_root(self.resources(cli_resources));
        Ok(Loader::new(self.file_tree()?, layout))
    }
}
