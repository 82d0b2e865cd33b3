// src/analysis/export.rs

use arrow::{
    array::{ArrayRef, Float64Array, StringArray, UInt64Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::{fs::File, path::Path, sync::Arc};
use tracing::info;

use super::{MeasureStats, PairwiseStats};
use crate::error::{Error, Result};

fn schema() -> Schema {
    Schema::new(vec![
        Field::new("measure", DataType::Utf8, false),
        Field::new("comparison", DataType::Utf8, false),
        Field::new("group_x", DataType::Utf8, false),
        Field::new("group_y", DataType::Utf8, false),
        Field::new("n_x", DataType::UInt64, false),
        Field::new("n_y", DataType::UInt64, false),
        Field::new("delta", DataType::Float64, true),
        Field::new("ci_low", DataType::Float64, true),
        Field::new("ci_high", DataType::Float64, true),
        Field::new("magnitude", DataType::Utf8, true),
        Field::new("statistic", DataType::Float64, true),
        Field::new("p_value", DataType::Float64, true),
        Field::new("df", DataType::Float64, true),
        Field::new("alternative", DataType::Utf8, true),
        Field::new("method", DataType::Utf8, true),
    ])
}

type Row<'a> = (&'a str, &'a PairwiseStats);

fn text(rows: &[Row<'_>], f: impl Fn(&PairwiseStats) -> Option<String>) -> ArrayRef {
    Arc::new(rows.iter().map(|(_, p)| f(*p)).collect::<StringArray>())
}

fn float(rows: &[Row<'_>], f: impl Fn(&PairwiseStats) -> Option<f64>) -> ArrayRef {
    Arc::new(rows.iter().map(|(_, p)| f(*p)).collect::<Float64Array>())
}

fn count(rows: &[Row<'_>], f: impl Fn(&PairwiseStats) -> usize) -> ArrayRef {
    Arc::new(UInt64Array::from_iter_values(
        rows.iter().map(|(_, p)| f(*p) as u64),
    ))
}

/// One row per (measure, comparison).
pub fn to_record_batch(results: &[MeasureStats]) -> Result<RecordBatch> {
    let rows: Vec<Row<'_>> = results
        .iter()
        .flat_map(|m| m.pairs.iter().map(move |p| (m.measure.as_str(), p)))
        .collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(rows.iter().map(|(m, _)| *m))),
        text(&rows, |p| Some(p.comparison.clone())),
        text(&rows, |p| Some(p.group_x.clone())),
        text(&rows, |p| Some(p.group_y.clone())),
        count(&rows, |p| p.n_x),
        count(&rows, |p| p.n_y),
        float(&rows, |p| p.effect.map(|e| e.estimate)),
        float(&rows, |p| p.effect.map(|e| e.ci.0)),
        float(&rows, |p| p.effect.map(|e| e.ci.1)),
        text(&rows, |p| p.effect.map(|e| e.magnitude.to_string())),
        float(&rows, |p| p.significance.map(|s| s.statistic)),
        float(&rows, |p| p.significance.map(|s| s.p_value)),
        float(&rows, |p| p.significance.and_then(|s| s.df)),
        text(&rows, |p| p.significance.map(|s| s.alternative.to_string())),
        text(&rows, |p| p.significance.map(|s| s.method.as_str().to_string())),
    ];

    RecordBatch::try_new(Arc::new(schema()), columns).map_err(Into::into)
}

/// Write `results` as a single Snappy-compressed Parquet file.
pub fn write_parquet(path: &Path, results: &[MeasureStats]) -> Result<()> {
    let batch = to_record_batch(results)?;
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    info!(path = %path.display(), rows = batch.num_rows(), "wrote results");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze, Dataset, Measure, Settings};
    use arrow::array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::tempdir;

    fn results() -> Vec<MeasureStats> {
        let groups: Vec<String> = ["a", "b", "c"]
            .iter()
            .flat_map(|g| std::iter::repeat(g.to_string()).take(4))
            .chain(std::iter::once("c".to_string()))
            .collect();
        let values = (0..13).map(|i| Some(i as f64)).collect();
        let ds = Dataset::new(
            groups,
            vec![Measure {
                name: "score".into(),
                values,
            }],
        )
        .unwrap();
        analyze(&ds, &Settings::default()).unwrap()
    }

    #[test]
    fn test_record_batch_layout() {
        let batch = to_record_batch(&results()).unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.num_columns(), 15);

        let comparison = batch
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(comparison.value(2), "a v.s. c");

        let n_y = batch
            .column(5)
            .as_any()
            .downcast_ref::<UInt64Array>()
            .unwrap();
        assert_eq!(n_y.value(2), 5);

        // permutation tests carry no degrees of freedom
        let df = batch.column(12);
        assert_eq!(df.null_count(), 3);
    }

    #[test]
    fn test_parquet_round_trip() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("results.parquet");
        write_parquet(&path, &results()).unwrap();

        let file = File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let rows: usize = reader.map(|b| b.unwrap().num_rows()).sum();
        assert_eq!(rows, 3);
    }
}
