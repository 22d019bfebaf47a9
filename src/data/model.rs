use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Value – a single cell in a column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(f64),
    Integer(i64),
    Text(String),
    Bool(bool),
    Null,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) if v.is_nan() => Ok(()),
            Value::Float(v) => write!(f, "{v}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => Ok(()),
        }
    }
}

impl Value {
    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// `Null` and NaN both count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Parse a raw text cell, preferring integers, then floats, then booleans.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return Value::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return Value::Float(f);
        }
        if s == "true" || s == "false" {
            return Value::Bool(s == "true");
        }
        Value::Text(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// DType – the storage type a column is cast to
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Float32,
    Float64,
    Int8,
    Int16,
    Int32,
    Int64,
    Bool,
    Text,
}

impl DType {
    pub fn is_integer(self) -> bool {
        matches!(self, DType::Int8 | DType::Int16 | DType::Int32 | DType::Int64)
    }

    /// Coerce a value into this dtype. Values that cannot be represented become `Null`.
    pub fn coerce(self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (DType::Text, Value::Text(s)) => Value::Text(s),
            (DType::Text, Value::Float(v)) if v.is_nan() => Value::Null,
            (DType::Text, other) => Value::Text(other.to_string()),
            (DType::Bool, Value::Bool(b)) => Value::Bool(b),
            (DType::Bool, other) => match other.as_f64() {
                Some(v) if !v.is_nan() => Value::Bool(v != 0.0),
                _ => Value::Null,
            },
            (DType::Float32, other) => match numeric(&other) {
                Some(v) => Value::Float(v as f32 as f64),
                None => Value::Null,
            },
            (DType::Float64, other) => match numeric(&other) {
                Some(v) => Value::Float(v),
                None => Value::Null,
            },
            (int_type, other) => match numeric(&other) {
                Some(v) if v.is_finite() => {
                    let (min, max) = int_type.integer_range();
                    let v = v.trunc() as i64;
                    if v < min || v > max {
                        Value::Null
                    } else {
                        Value::Integer(v)
                    }
                }
                _ => Value::Null,
            },
        }
    }

    /// Inclusive range representable by an integer dtype.
    pub fn integer_range(self) -> (i64, i64) {
        match self {
            DType::Int8 => (i8::MIN as i64, i8::MAX as i64),
            DType::Int16 => (i16::MIN as i64, i16::MAX as i64),
            DType::Int32 => (i32::MIN as i64, i32::MAX as i64),
            _ => (i64::MIN, i64::MAX),
        }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Text(s) => s.trim().parse::<f64>().ok(),
        other => other.as_f64(),
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Bool => "bool",
            DType::Text => "text",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Column / Table
// ---------------------------------------------------------------------------

/// One column: its dtype travels with its values through merge and split.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub dtype: DType,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(dtype: DType, values: Vec<Value>) -> Self {
        let values = values.into_iter().map(|v| dtype.coerce(v)).collect();
        Column { dtype, values }
    }

    pub fn from_f64(values: impl IntoIterator<Item = f64>) -> Self {
        Column {
            dtype: DType::Float64,
            values: values.into_iter().map(Value::Float).collect(),
        }
    }

    /// A placeholder column for computed results: `Float32`, NaN filled.
    pub fn placeholder(rows: usize) -> Self {
        Column {
            dtype: DType::Float32,
            values: vec![Value::Float(f64::NAN); rows],
        }
    }

    /// A blank presentation column.
    pub fn blank(rows: usize) -> Self {
        Column {
            dtype: DType::Float32,
            values: vec![Value::Null; rows],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, row: usize) -> &Value {
        self.values.get(row).unwrap_or(&Value::Null)
    }

    /// Cast every value to `dtype`.
    pub fn cast(self, dtype: DType) -> Self {
        Column::new(dtype, self.values)
    }

    /// Numeric view of the column; non-numeric cells become NaN.
    pub fn to_f64(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|v| v.as_f64().unwrap_or(f64::NAN))
            .collect()
    }

    /// Pad with `Null` up to `rows`.
    pub fn pad_to(&mut self, rows: usize) {
        if self.values.len() < rows {
            self.values.resize(rows, Value::Null);
        }
    }
}

/// One entry: ordered columns addressed by position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Table { columns }
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows (longest column).
    pub fn rows(&self) -> usize {
        self.columns.iter().map(Column::len).max().unwrap_or(0)
    }

    pub fn column(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    /// Replace the column at `index`, keeping the table's row count.
    pub fn set_column(&mut self, index: usize, mut column: Column) {
        column.pad_to(self.rows());
        self.columns[index] = column;
    }

    pub fn push(&mut self, column: Column) {
        self.columns.push(column);
    }

    pub fn dtypes(&self) -> Vec<DType> {
        self.columns.iter().map(|c| c.dtype).collect()
    }

    /// Rows `[start, end)` of every column.
    pub fn slice_rows(&self, start: usize, end: usize) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let end = end.min(c.len());
                let start = start.min(end);
                Column {
                    dtype: c.dtype,
                    values: c.values[start..end].to_vec(),
                }
            })
            .collect();
        Table { columns }
    }

    /// Index of the last row with any non-missing cell, if any.
    pub fn last_filled_row(&self) -> Option<usize> {
        self.columns
            .iter()
            .filter_map(|c| c.values.iter().rposition(|v| !matches!(v, Value::Null)))
            .max()
    }

    /// Truncate every column to `rows`.
    pub fn truncate_rows(&mut self, rows: usize) {
        for column in &mut self.columns {
            column.values.truncate(rows);
        }
    }
}

// ---------------------------------------------------------------------------
// Nested hierarchy
// ---------------------------------------------------------------------------

/// Entries sharing a specimen; a synthetic sample-summary entry may come last.
pub type Sample = Vec<Table>;

/// Samples sharing a processing run; a synthetic dataset-summary sample may come last.
pub type Dataset = Vec<Sample>;

/// Unique-variable name → raw column index, supplied per entry by the importer.
pub type ImportIndices = BTreeMap<String, usize>;

/// Import metadata mirroring a dataset's nesting.
pub type DatasetImports = Vec<Vec<ImportIndices>>;
