use arrow::datatypes::DataType;

/// Cell as read, or `None` when the field is empty (pandas reads those as NaN).
///
/// The `csv` reader has already unquoted the field; nothing else is stripped.
pub fn clean_cell(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Numeric value of a cell, ignoring surrounding whitespace.
pub fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse().ok()
}

/// Infer the Arrow dtype of a whole column of cleaned cells.
///
/// Float64 when every present cell parses as a number (an all-empty column
/// counts), Utf8 otherwise.
pub fn infer_column_dtype<'a, I>(cells: I) -> DataType
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let numeric = cells
        .into_iter()
        .flatten()
        .all(|s| parse_number(s).is_some());
    if numeric {
        DataType::Float64
    } else {
        DataType::Utf8
    }
}

/// Label for column `idx` when no header row is given, or the header cell is blank.
pub fn positional_label(idx: usize, from_header: bool) -> String {
    if from_header {
        format!("Unnamed: {}", idx)
    } else {
        idx.to_string()
    }
}
