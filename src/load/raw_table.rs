use arrow::{
    array::{ArrayRef, Float64Builder, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use csv::ReaderBuilder;
use std::{io::Read, path::Path, sync::Arc};
use tracing::{debug, trace};

use super::utils::{clean_cell, infer_column_dtype, parse_number, positional_label};
use crate::error::{Error, Result};

#[derive(Debug)]
pub struct RawTable {
    /// Column labels, from the header row when one was requested.
    pub headers: Vec<String>,
    /// Each data row, one cleaned cell per kept column.
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Read at most `bound` leading columns from CSV `reader`.
    ///
    /// With `header = Some(h)`, records before `h` are skipped and record `h`
    /// supplies the labels. Blank lines don't count as records. `path` is only
    /// used for error reporting.
    pub fn read<R: Read>(
        reader: R,
        path: &Path,
        bound: usize,
        header: Option<usize>,
    ) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // ragged rows are padded / cut below
            .from_reader(reader);

        let mut labels: Option<Vec<Option<String>>> = None;
        let mut records: Vec<Vec<Option<String>>> = Vec::new();
        let mut width = 0;

        for (idx, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| Error::csv(path, e))?;
            let cells: Vec<Option<String>> =
                record.iter().take(bound).map(clean_cell).collect();
            match header {
                Some(h) if idx < h => {
                    trace!(idx, "skipping row above header");
                    continue;
                }
                Some(h) if idx == h => {
                    width = width.max(cells.len());
                    labels = Some(cells);
                }
                _ => {
                    width = width.max(cells.len());
                    records.push(cells);
                }
            }
        }

        if let Some(row) = header {
            if labels.is_none() {
                return Err(Error::MissingHeader {
                    row,
                    path: path.to_path_buf(),
                });
            }
        }

        let headers = match labels {
            Some(cells) => (0..width)
                .map(|i| {
                    cells
                        .get(i)
                        .cloned()
                        .flatten()
                        .unwrap_or_else(|| positional_label(i, true))
                })
                .collect(),
            None => (0..width).map(|i| positional_label(i, false)).collect(),
        };

        for row in records.iter_mut() {
            row.resize(width, None);
        }

        debug!(
            path = %path.display(),
            columns = width,
            rows = records.len(),
            "parsed csv"
        );
        Ok(RawTable {
            headers,
            rows: records,
        })
    }

    pub fn num_columns(&self) -> usize {
        self.headers.len()
    }

    fn column(&self, idx: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows.iter().map(move |row| row[idx].as_deref())
    }

    /// Convert string cells into typed Arrow columns.
    pub fn into_record_batch(self) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(self.num_columns());
        let mut columns = Vec::with_capacity(self.num_columns());

        for (idx, name) in self.headers.iter().enumerate() {
            let dtype = infer_column_dtype(self.column(idx));
            let array: ArrayRef = match dtype {
                DataType::Float64 => {
                    let mut b = Float64Builder::with_capacity(self.rows.len());
                    for cell in self.column(idx) {
                        b.append_option(cell.and_then(parse_number));
                    }
                    Arc::new(b.finish())
                }
                _ => Arc::new(self.column(idx).collect::<StringArray>()),
            };
            fields.push(Field::new(name, dtype, true));
            columns.push(array);
        }

        let schema = Arc::new(Schema::new(fields));
        // keeps the row count when there are no columns at all
        let options = RecordBatchOptions::new().with_row_count(Some(self.rows.len()));
        RecordBatch::try_new_with_options(schema, columns, &options).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Float64Array};

    fn read(content: &str, bound: usize, header: Option<usize>) -> Result<RawTable> {
        RawTable::read(content.as_bytes(), Path::new("test.csv"), bound, header)
    }

    #[test]
    fn test_positional_labels_without_header() {
        let table = read("1,2,3\n4,5,6\n", 2, None).unwrap();
        assert_eq!(table.headers, vec!["0", "1"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec![Some("4".into()), Some("5".into())]);
    }

    #[test]
    fn test_header_row_skips_preamble() {
        let content = "survey export\nid,score,note\n1,3.5,ok\n2,,late\n";
        let table = read(content, 10, Some(1)).unwrap();
        assert_eq!(table.headers, vec!["id", "score", "note"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1][1], None);
    }

    #[test]
    fn test_ragged_rows_are_padded() {
        let table = read("a,b,c\n1\n1,2,3,4\n", 3, Some(0)).unwrap();
        assert_eq!(table.num_columns(), 3);
        assert_eq!(table.rows[0], vec![Some("1".into()), None, None]);
        assert_eq!(table.rows[1].len(), 3);
    }

    #[test]
    fn test_missing_header_row() {
        let err = read("a,b\n", 2, Some(3)).unwrap_err();
        assert!(matches!(err, Error::MissingHeader { row: 3, .. }));
    }

    #[test]
    fn test_blank_header_cell_gets_label() {
        let table = read(",score\n1,2\n", 2, Some(0)).unwrap();
        assert_eq!(table.headers, vec!["Unnamed: 0", "score"]);
    }

    #[test]
    fn test_record_batch_types() {
        let table = read("group,score\nA,1\nB,\nA,2.5\n", 2, Some(0)).unwrap();
        let batch = table.into_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.schema().field(0).data_type(), &DataType::Utf8);
        assert_eq!(batch.schema().field(1).data_type(), &DataType::Float64);

        let scores = batch
            .column(1)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(scores.value(0), 1.0);
        assert!(scores.is_null(1));
        assert_eq!(scores.value(2), 2.5);
    }

    #[test]
    fn test_cells_keep_quotes_and_spaces() {
        let content = "note,label,score\n\"\"\"quoted\"\"\",\" padded \", 7 \n";
        let table = read(content, 3, Some(0)).unwrap();
        assert_eq!(
            table.rows[0],
            vec![
                Some("\"quoted\"".to_string()),
                Some(" padded ".to_string()),
                Some(" 7 ".to_string())
            ]
        );

        let batch = table.into_record_batch().unwrap();
        let notes = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(notes.value(0), "\"quoted\"");
        let scores = batch
            .column(2)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(scores.value(0), 7.0);
    }

    #[test]
    fn test_zero_bound_keeps_rows() {
        let batch = read("1,2\n3,4\n", 0, None)
            .unwrap()
            .into_record_batch()
            .unwrap();
        assert_eq!(batch.num_columns(), 0);
        assert_eq!(batch.num_rows(), 2);
    }
}
