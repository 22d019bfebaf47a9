//! Shared helpers for integration tests

#![allow(dead_code)]

use anyhow::Result;
use rusty_etl::data::model::{Column, DType, DatasetImports, ImportIndices, Table, Value};
use rusty_etl::source::Call;

/// Entry of `width` columns and `rows` rows; even columns are integers, odd ones floats.
pub fn entry(width: usize, rows: usize) -> Table {
    Table::new(
        (0..width)
            .map(|c| {
                let values = (0..rows).map(|r| Value::Integer((c * 100 + r) as i64)).collect();
                let dtype = if c % 2 == 0 { DType::Int64 } else { DType::Float64 };
                Column::new(dtype, values)
            })
            .collect(),
    )
}

/// Entry with an `x` ramp in column 0 and `y = scale * x` in column 1.
pub fn xy_entry(rows: usize, scale: f64) -> Table {
    let x: Vec<f64> = (0..rows).map(|r| r as f64).collect();
    let y: Vec<f64> = x.iter().map(|v| v * scale).collect();
    Table::new(vec![Column::from_f64(x), Column::from_f64(y)])
}

/// `x` at column 0 and `y` at column 1 for every entry; `shape[j]` entries in sample `j`.
pub fn xy_imports(shape: &[usize]) -> DatasetImports {
    let indices = ImportIndices::from([("x".to_string(), 0), ("y".to_string(), 1)]);
    shape.iter().map(|&n| vec![indices.clone(); n]).collect()
}

pub fn noop(table: Table, _call: &Call<'_>) -> Result<Table> {
    Ok(table)
}
