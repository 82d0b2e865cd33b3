// src/analysis/dataset.rs

use arrow::{
    array::{Array, ArrayRef, Float64Array, StringArray},
    datatypes::DataType,
    record_batch::RecordBatch,
    util::display::array_value_to_string,
};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Which columns of a loaded table make up a [`Dataset`].
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Column holding the treatment-group label of each row.
    pub group: String,
    /// Keep only rows whose `column` reads as `value`; the column is then dropped.
    pub filter: Option<(String, String)>,
    /// Columns that are neither group nor measure (ids, timestamps, ...).
    pub exclude: Vec<String>,
}

impl Selection {
    pub fn group(column: impl Into<String>) -> Self {
        Self {
            group: column.into(),
            ..Default::default()
        }
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter = Some((column.into(), value.into()));
        self
    }

    pub fn exclude(mut self, column: impl Into<String>) -> Self {
        self.exclude.push(column.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Rows labelled by treatment group, with one numeric column per measure.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    groups: Vec<String>,
    measures: Vec<Measure>,
}

impl Dataset {
    pub fn new(groups: Vec<String>, measures: Vec<Measure>) -> Result<Self> {
        if let Some(m) = measures.iter().find(|m| m.values.len() != groups.len()) {
            return Err(Error::InvalidInput(format!(
                "measure '{}' has {} values for {} rows",
                m.name,
                m.values.len(),
                groups.len()
            )));
        }
        Ok(Self { groups, measures })
    }

    /// Read a loaded table. Rows with no group label are dropped.
    pub fn from_batch(batch: &RecordBatch, selection: &Selection) -> Result<Self> {
        let schema = batch.schema();
        let column = |name: &str| -> Result<ArrayRef> {
            let idx = schema
                .index_of(name)
                .map_err(|_| Error::InvalidInput(format!("no column named '{}'", name)))?;
            Ok(batch.column(idx).clone())
        };

        let group_col = column(&selection.group)?;
        let filter = match &selection.filter {
            Some((name, value)) => Some((column(name)?, value.as_str())),
            None => None,
        };

        let keep: Vec<usize> = (0..batch.num_rows())
            .filter(|&row| match &filter {
                Some((col, value)) => cell_label(col, row).as_deref() == Some(*value),
                None => true,
            })
            .filter(|&row| {
                let present = group_col.is_valid(row);
                if !present {
                    warn!(row, "dropping row without group label");
                }
                present
            })
            .collect();

        let groups = keep
            .iter()
            .filter_map(|&row| cell_label(&group_col, row))
            .collect();

        let skip = |name: &str| {
            name == selection.group
                || selection.filter.as_ref().is_some_and(|(f, _)| f == name)
                || selection.exclude.iter().any(|e| e == name)
        };

        let mut measures = Vec::new();
        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            if skip(field.name()) {
                continue;
            }
            let values = match field.data_type() {
                DataType::Float64 => {
                    let arr = array
                        .as_any()
                        .downcast_ref::<Float64Array>()
                        .ok_or_else(|| {
                            Error::InvalidInput(format!("column '{}' is not f64", field.name()))
                        })?;
                    keep.iter()
                        .map(|&row| arr.is_valid(row).then(|| arr.value(row)))
                        .collect()
                }
                other => {
                    return Err(Error::InvalidInput(format!(
                        "measure column '{}' must be numeric, found {}",
                        field.name(),
                        other
                    )))
                }
            };
            measures.push(Measure {
                name: field.name().clone(),
                values,
            });
        }

        debug!(
            rows = keep.len(),
            measures = measures.len(),
            "dataset selected"
        );
        Dataset::new(groups, measures)
    }

    pub fn num_rows(&self) -> usize {
        self.groups.len()
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    /// Distinct group labels in order of first appearance.
    pub fn group_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for g in &self.groups {
            if !labels.contains(&g.as_str()) {
                labels.push(g);
            }
        }
        labels
    }

    /// Values of `measure` binned by group (in [`Dataset::group_labels`] order),
    /// with nulls and NaNs dropped.
    pub fn group_measure(&self, measure: &Measure) -> Vec<Vec<f64>> {
        let labels = self.group_labels();
        let mut bins = vec![Vec::new(); labels.len()];
        for (group, value) in self.groups.iter().zip(&measure.values) {
            let Some(v) = value.filter(|v| !v.is_nan()) else {
                continue;
            };
            if let Some(idx) = labels.iter().position(|l| *l == group.as_str()) {
                bins[idx].push(v);
            }
        }
        bins
    }
}

/// Text form of one cell, integral floats without the trailing `.0`.
fn cell_label(array: &ArrayRef, row: usize) -> Option<String> {
    if array.is_null(row) {
        return None;
    }
    if let Some(arr) = array.as_any().downcast_ref::<StringArray>() {
        return Some(arr.value(row).to_string());
    }
    if let Some(arr) = array.as_any().downcast_ref::<Float64Array>() {
        let v = arr.value(row);
        return Some(if v.fract() == 0.0 && v.abs() < 1e15 {
            format!("{}", v as i64)
        } else {
            v.to_string()
        });
    }
    array_value_to_string(array, row).ok()
}
