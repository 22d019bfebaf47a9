use super::model::{Column, DType, Table, Value};

/// Shrink column dtypes after computations have run.
///
/// * text columns whose every present value parses as a number become `Float64`
///   (formula text never parses, so formula columns stay text)
/// * integer columns downcast to the smallest integer dtype that holds their range
/// * `Float64` columns downcast to `Float32` when no value changes
pub fn optimize_memory(table: Table) -> Table {
    Table::new(table.columns.into_iter().map(optimize_column).collect())
}

fn optimize_column(column: Column) -> Column {
    match column.dtype {
        DType::Text => {
            let mut present = column.values.iter().filter(|v| !v.is_missing()).peekable();
            let numeric = present.peek().is_some()
                && present.all(|v| match v {
                    Value::Text(s) => s.trim().parse::<f64>().is_ok(),
                    other => other.as_f64().is_some(),
                });
            if numeric {
                downcast_float(column.cast(DType::Float64))
            } else {
                column
            }
        }
        dtype if dtype.is_integer() => downcast_integer(column),
        DType::Float64 => downcast_float(column),
        _ => column,
    }
}

fn downcast_integer(column: Column) -> Column {
    let (min, max) = column
        .values
        .iter()
        .filter_map(|v| match v {
            Value::Integer(i) => Some(*i),
            _ => None,
        })
        .fold((0i64, 0i64), |(lo, hi), i| (lo.min(i), hi.max(i)));

    let target = [DType::Int8, DType::Int16, DType::Int32, DType::Int64]
        .into_iter()
        .find(|dtype| {
            let (lo, hi) = dtype.integer_range();
            min >= lo && max <= hi
        })
        .unwrap_or(DType::Int64);

    if target == column.dtype {
        column
    } else {
        column.cast(target)
    }
}

fn downcast_float(column: Column) -> Column {
    let lossless = column.values.iter().all(|v| match v {
        Value::Float(f) => f.is_nan() || (*f as f32 as f64) == *f,
        _ => true,
    });
    if lossless {
        column.cast(DType::Float32)
    } else {
        column
    }
}
