// src/load/mod.rs

pub mod raw_table;
pub mod scan;
pub mod utils;

pub use raw_table::RawTable;
pub use scan::{scan, ScanReport};

use arrow::record_batch::RecordBatch;
use std::{fs::File, io::BufReader, path::PathBuf};
use tracing::{debug, info, instrument};

use crate::config;
use crate::error::{Error, Result};
use crate::files::{file_dict, FileTree, Layout};

/// One CSV file to be loaded, resolved against a [`FileTree`] and [`Layout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvFile {
    /// Name of the file without directory or `.csv` extension.
    pub name: String,
    /// Row holding the column labels, if the file has one.
    pub header: Option<usize>,
    pub dir: PathBuf,
    /// Number of leading columns to load.
    pub bound: usize,
}

impl CsvFile {
    pub fn new(
        tree: &FileTree,
        layout: &Layout,
        name: &str,
        header: Option<usize>,
    ) -> Result<Self> {
        let bound = tree
            .bound_of(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        let dir = layout.resolve_dir(tree, name)?;
        Ok(CsvFile {
            name: name.to_string(),
            header,
            dir,
            bound,
        })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.csv", self.name))
    }

    /// Load the first `bound` columns into a record batch.
    #[instrument(level = "debug", skip(self), fields(name = %self.name, bound = self.bound))]
    pub fn read(&self) -> Result<RecordBatch> {
        let path = self.path();
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        let table = RawTable::read(BufReader::new(file), &path, self.bound, self.header)?;
        table.into_record_batch()
    }
}

/// A lookup table plus the placement rules for its files.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    tree: FileTree,
    layout: Layout,
}

impl Loader {
    pub fn new(tree: FileTree, layout: Layout) -> Self {
        Self { tree, layout }
    }

    /// Default lookup table, resource root taken from the environment.
    pub fn from_env() -> Self {
        let layout = Layout::default().with_root(config::resources_from_env());
        Self::new(file_dict().clone(), layout)
    }

    pub fn tree(&self) -> &FileTree {
        &self.tree
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn resolve(&self, name: &str, header: Option<usize>) -> Result<CsvFile> {
        CsvFile::new(&self.tree, &self.layout, name, header)
    }

    /// Batch-load `names` in order. `headers`, when given, pairs one header
    /// row (or `None`) with each name. Any failing file aborts the batch.
    #[instrument(level = "info", skip_all, fields(files = names.len()))]
    pub fn load<S: AsRef<str>>(
        &self,
        names: &[S],
        headers: Option<&[Option<usize>]>,
    ) -> Result<Vec<RecordBatch>> {
        if let Some(headers) = headers {
            if headers.len() != names.len() {
                return Err(Error::HeaderMismatch {
                    names: names.len(),
                    headers: headers.len(),
                });
            }
        }

        // resolve everything first so a bad name fails before any I/O
        let files = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let header = headers.and_then(|h| h[i]);
                self.resolve(name.as_ref(), header)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut frames = Vec::with_capacity(files.len());
        for file in &files {
            let batch = file.read()?;
            debug!(
                name = %file.name,
                rows = batch.num_rows(),
                columns = batch.num_columns(),
                "loaded"
            );
            frames.push(batch);
        }
        info!(tables = frames.len(), "batch loaded");
        Ok(frames)
    }
}

/// Batch-convert configured CSV files into record batches, using the default
/// lookup table and the resource root from the environment.
pub fn load_csv<S: AsRef<str>>(
    names: &[S],
    headers: Option<&[Option<usize>]>,
) -> Result<Vec<RecordBatch>> {
    Loader::from_env().load(names, headers)
}
