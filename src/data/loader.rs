use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Column, DType, Table, Value};

// ---------------------------------------------------------------------------
// Import options
// ---------------------------------------------------------------------------

/// How raw rows are cut out of a measurement file.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Field separator for delimited text. Defaults to `,`.
    pub separator: Option<u8>,
    /// Rows skipped at the top of the file (headers, instrument preamble).
    pub start_row: usize,
    /// Rows dropped from the bottom of the file.
    pub end_row: usize,
    /// Raw column numbers to keep, in order. `None` keeps everything.
    pub column_numbers: Option<Vec<usize>>,
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load one entry table from a file. Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` – delimited text, no header row required
/// * `.json`         – `{"columns": [[...], [...]]}`, a bare array of columns, or
///   `[{"name": ..., "values": [...]}, ...]`
/// * `.parquet`      – flat numeric/text/bool columns
pub fn load_entry(path: &Path, options: &ImportOptions) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let columns = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path)?,
        "csv" | "txt" => load_delimited(path, options.separator.unwrap_or(b','))?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    let columns = cut_rows(columns, options.start_row, options.end_row);
    let table = select_columns(columns, options.column_numbers.as_deref())
        .with_context(|| format!("selecting columns from {}", path.display()))?;

    log::debug!(
        "loaded {}: {} columns x {} rows",
        path.display(),
        table.width(),
        table.rows()
    );
    Ok(table)
}

fn cut_rows(columns: Vec<Vec<Value>>, start_row: usize, end_row: usize) -> Vec<Vec<Value>> {
    columns
        .into_iter()
        .map(|mut values| {
            let end = values.len().saturating_sub(end_row);
            if start_row >= end {
                return Vec::new();
            }
            values.truncate(end);
            values.drain(..start_row);
            values
        })
        .collect()
}

fn select_columns(columns: Vec<Vec<Value>>, numbers: Option<&[usize]>) -> Result<Table> {
    let Some(numbers) = numbers else {
        return Ok(Table::new(columns.into_iter().map(infer_column).collect()));
    };

    let mut selected = Vec::with_capacity(numbers.len());
    for &n in numbers {
        let values = columns
            .get(n)
            .with_context(|| format!("column {n} requested but only {} present", columns.len()))?
            .clone();
        selected.push(infer_column(values));
    }
    Ok(Table::new(selected))
}

/// Pick the narrowest dtype that holds every parsed value.
pub fn infer_column(values: Vec<Value>) -> Column {
    let present = || values.iter().filter(|v| !matches!(v, Value::Null));

    let dtype = if present().all(|v| matches!(v, Value::Integer(_))) && present().count() > 0 {
        DType::Int64
    } else if present().all(|v| matches!(v, Value::Integer(_) | Value::Float(_))) {
        DType::Float64
    } else if present().all(|v| matches!(v, Value::Bool(_))) {
        DType::Bool
    } else {
        DType::Text
    };
    Column::new(dtype, values)
}

// ---------------------------------------------------------------------------
// Delimited text loader
// ---------------------------------------------------------------------------

/// Every row is split on `separator`; ragged rows leave `Null` in missing cells.
fn load_delimited(path: &Path, separator: u8) -> Result<Vec<Vec<Value>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(separator)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut columns: Vec<Vec<Value>> = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("{} row {row_no}", path.display()))?;
        if record.len() > columns.len() {
            columns.resize(record.len(), vec![Value::Null; row_no]);
        }
        for (col_idx, column) in columns.iter_mut().enumerate() {
            column.push(record.get(col_idx).map(Value::parse).unwrap_or(Value::Null));
        }
    }

    Ok(columns)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON layout (column-major):
///
/// ```json
/// { "columns": [[10.0, 10.5, 11.0], [120, 135, 128]] }
/// ```
///
/// A bare top-level array of columns is accepted as well, and any column may be a
/// `{"name": ..., "values": [...]}` object instead. Names are not used; columns are
/// addressed by position.
fn load_json(path: &Path) -> Result<Vec<Vec<Value>>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let columns = match &root {
        JsonValue::Array(columns) => columns,
        JsonValue::Object(obj) => obj
            .get("columns")
            .and_then(|c| c.as_array())
            .context("Expected a \"columns\" array")?,
        _ => bail!("Expected a top-level JSON array or object"),
    };

    columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let values = match col {
                JsonValue::Object(named) => named.get("values").and_then(|v| v.as_array()),
                other => other.as_array(),
            }
            .with_context(|| format!("Column {i} is neither an array nor a values object"))?;
            Ok(values.iter().map(json_to_value).collect())
        })
        .collect()
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::String(s) => Value::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Null,
        other => Value::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file whose top-level columns are the entry's columns.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`), as long as the columns are flat.
fn load_parquet(path: &Path) -> Result<Vec<Vec<Value>>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: Vec<Vec<Value>> = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        if columns.is_empty() {
            columns = vec![Vec::new(); batch.num_columns()];
        }
        for (col_idx, column) in columns.iter_mut().enumerate() {
            let array = batch.column(col_idx);
            for row in 0..batch.num_rows() {
                column.push(extract_value(array, row)?);
            }
        }
    }

    Ok(columns)
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_value(col: &Arc<dyn Array>, row: usize) -> Result<Value> {
    if col.is_null(row) {
        return Ok(Value::Null);
    }
    let value = match col.data_type() {
        DataType::Utf8 => Value::Text(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::Text(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => Value::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => Value::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => Value::Float(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => Value::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => Value::Bool(col.as_boolean().value(row)),
        other => bail!("Unsupported parquet column type {other:?}"),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(ext: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(ext)
            .tempfile()
            .unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_csv_with_preamble_and_column_selection() {
        let file = write_temp(
            ".csv",
            "instrument,xrd\n2theta,counts,notes\n10,100,a\n11,150,b\n12,120,c\nend\n",
        );
        let options = ImportOptions {
            separator: None,
            start_row: 2,
            end_row: 1,
            column_numbers: Some(vec![0, 1]),
        };
        let table = load_entry(file.path(), &options).unwrap();
        assert_eq!(table.width(), 2);
        assert_eq!(table.rows(), 3);
        assert_eq!(table.column(0).dtype, DType::Int64);
        assert_eq!(table.column(1).values[1], Value::Integer(150));
    }

    #[test]
    fn test_tab_separated_floats() {
        let file = write_temp(".txt", "1.5\t2\n2.5\t3\n");
        let options = ImportOptions {
            separator: Some(b'\t'),
            ..Default::default()
        };
        let table = load_entry(file.path(), &options).unwrap();
        assert_eq!(table.column(0).dtype, DType::Float64);
        assert_eq!(table.column(1).dtype, DType::Int64);
    }

    #[test]
    fn test_json_columns() {
        let file = write_temp(".json", r#"{"columns": [[1, 2], [0.5, null], ["a", "b"]]}"#);
        let table = load_entry(file.path(), &ImportOptions::default()).unwrap();
        assert_eq!(table.dtypes(), vec![DType::Int64, DType::Float64, DType::Text]);
        assert_eq!(table.column(1).values[1], Value::Null);
    }

    #[test]
    fn test_json_named_columns() {
        let file = write_temp(
            ".json",
            r#"[{"name": "x", "values": [1, 2]}, {"name": "y", "values": [3.5, 4.5]}]"#,
        );
        let table = load_entry(file.path(), &ImportOptions::default()).unwrap();
        assert_eq!(table.dtypes(), vec![DType::Int64, DType::Float64]);
        assert_eq!(table.column(1).values[0], Value::Float(3.5));

        let file = write_temp(".json", r#"[{"name": "x"}]"#);
        assert!(load_entry(file.path(), &ImportOptions::default()).is_err());
    }

    fn write_parquet(batch: &arrow::record_batch::RecordBatch) -> tempfile::NamedTempFile {
        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer =
            parquet::arrow::ArrowWriter::try_new(file.reopen().unwrap(), batch.schema(), None)
                .unwrap();
        writer.write(batch).unwrap();
        writer.close().unwrap();
        file
    }

    #[test]
    fn test_parquet_columns() {
        use arrow::array::{Float64Array, Int64Array, StringArray};
        use arrow::datatypes::{Field, Schema};
        use arrow::record_batch::RecordBatch;

        let schema = Arc::new(Schema::new(vec![
            Field::new("segment", DataType::Int64, false),
            Field::new("mass", DataType::Float64, true),
            Field::new("note", DataType::Utf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 1, 2])),
                Arc::new(Float64Array::from(vec![Some(99.5), None, Some(97.25)])),
                Arc::new(StringArray::from(vec!["ramp", "ramp", "hold"])),
            ],
        )
        .unwrap();
        let file = write_parquet(&batch);

        let table = load_entry(file.path(), &ImportOptions::default()).unwrap();
        assert_eq!(table.dtypes(), vec![DType::Int64, DType::Float64, DType::Text]);
        assert_eq!(table.rows(), 3);
        assert_eq!(table.column(0).values[2], Value::Integer(2));
        assert_eq!(table.column(1).values[1], Value::Null);
        assert_eq!(table.column(1).values[2], Value::Float(97.25));
        assert_eq!(table.column(2).values[2], Value::Text("hold".into()));
    }

    #[test]
    fn test_parquet_unsupported_type() {
        use arrow::array::Date32Array;
        use arrow::datatypes::{Field, Schema};
        use arrow::record_batch::RecordBatch;

        let schema = Arc::new(Schema::new(vec![Field::new("day", DataType::Date32, false)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Date32Array::from(vec![19_000]))]).unwrap();
        let file = write_parquet(&batch);

        assert!(load_entry(file.path(), &ImportOptions::default()).is_err());
    }

    #[test]
    fn test_missing_column_number_is_an_error() {
        let file = write_temp(".csv", "1,2\n3,4\n");
        let options = ImportOptions {
            column_numbers: Some(vec![0, 5]),
            ..Default::default()
        };
        assert!(load_entry(file.path(), &options).is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        let file = write_temp(".xyz", "");
        assert!(load_entry(file.path(), &ImportOptions::default()).is_err());
    }
}
