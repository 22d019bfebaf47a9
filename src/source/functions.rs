use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;

use crate::data::model::Table;

/// Free-form keyword options handed to a function's routine.
pub type Options = serde_json::Map<String, serde_json::Value>;

/// Read a numeric option, falling back to `default` when absent or not a number.
pub fn option_f64(options: &Options, key: &str, default: f64) -> f64 {
    options.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// When a function runs, and which table its columns live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    /// Splits or trims imported entries before any references exist.
    Preprocess,
    /// Runs on every entry.
    Calculation,
    /// Runs once per sample, writing into the sample-summary entry.
    SampleSummary,
    /// Runs once per dataset, writing into the dataset-summary sample.
    DatasetSummary,
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FunctionKind::Preprocess => "PreprocessFunction",
            FunctionKind::Calculation => "CalculationFunction",
            FunctionKind::SampleSummary => "SampleSummaryFunction",
            FunctionKind::DatasetSummary => "DatasetSummaryFunction",
        };
        f.write_str(name)
    }
}

/// Columns a computing function writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddedColumns {
    /// `n` brand-new columns appended after the table's current end.
    FixedCount(usize),
    /// Reuses the columns already recorded for these names.
    AliasOf(Vec<String>),
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// How a computing function should produce its results.
#[derive(Debug, Clone, Copy)]
pub enum Mode<'a> {
    /// Emit spreadsheet formulas. `columns[i]` is the sheet letter of table column `i`,
    /// `first_row` the 1-based sheet row of table row 0.
    Formula { columns: &'a [String], first_row: usize },
    /// Compute values directly.
    Numeric,
}

impl Mode<'_> {
    /// Sheet reference such as `B7` for a table cell, or `None` in numeric mode.
    pub fn cell(&self, column: usize, row: usize) -> Option<String> {
        match self {
            Mode::Formula { columns, first_row } => {
                Some(format!("{}{}", columns[column], row + first_row))
            }
            Mode::Numeric => None,
        }
    }
}

/// Everything a routine needs besides the table itself.
///
/// Index lists are per sample: `targets[t][sample]` holds the flat-table columns of the
/// `t`-th target name inside that sample, `destinations[sample]` the function's own.
pub struct Call<'a> {
    pub targets: Vec<&'a [Vec<usize>]>,
    pub destinations: &'a [Vec<usize>],
    pub mode: Mode<'a>,
    pub options: &'a Options,
}

/// A routine that fills destination columns of the flat dataset table.
pub trait Compute: Send + Sync {
    fn compute(&self, table: Table, call: &Call<'_>) -> Result<Table>;
}

impl<F> Compute for F
where
    F: Fn(Table, &Call<'_>) -> Result<Table> + Send + Sync,
{
    fn compute(&self, table: Table, call: &Call<'_>) -> Result<Table> {
        self(table, call)
    }
}

/// A routine that splits one imported entry into several.
pub trait Separate: Send + Sync {
    fn separate(&self, table: Table, targets: &[usize], options: &Options) -> Result<Vec<Table>>;
}

impl<F> Separate for F
where
    F: Fn(Table, &[usize], &Options) -> Result<Vec<Table>> + Send + Sync,
{
    fn separate(&self, table: Table, targets: &[usize], options: &Options) -> Result<Vec<Table>> {
        self(table, targets, options)
    }
}

#[derive(Clone)]
enum Routine {
    Separate {
        routine: Arc<dyn Separate>,
        deleted_columns: Vec<String>,
    },
    Compute {
        routine: Arc<dyn Compute>,
        added_columns: AddedColumns,
    },
}

// ---------------------------------------------------------------------------
// Function
// ---------------------------------------------------------------------------

/// A named, ordered processing step of a data source.
#[derive(Clone)]
pub struct Function {
    name: String,
    kind: FunctionKind,
    target_columns: Vec<String>,
    routine: Routine,
    options: Options,
}

impl Function {
    /// A function that splits entries. It never owns columns.
    pub fn preprocess(
        name: impl Into<String>,
        target_columns: Vec<String>,
        routine: impl Separate + 'static,
    ) -> Self {
        Function {
            name: name.into(),
            kind: FunctionKind::Preprocess,
            target_columns,
            routine: Routine::Separate {
                routine: Arc::new(routine),
                deleted_columns: Vec::new(),
            },
            options: Options::new(),
        }
    }

    pub fn calculation(
        name: impl Into<String>,
        target_columns: Vec<String>,
        added_columns: AddedColumns,
        routine: impl Compute + 'static,
    ) -> Self {
        Self::computing(name, FunctionKind::Calculation, target_columns, added_columns, routine)
    }

    pub fn sample_summary(
        name: impl Into<String>,
        target_columns: Vec<String>,
        added_columns: AddedColumns,
        routine: impl Compute + 'static,
    ) -> Self {
        Self::computing(name, FunctionKind::SampleSummary, target_columns, added_columns, routine)
    }

    pub fn dataset_summary(
        name: impl Into<String>,
        target_columns: Vec<String>,
        added_columns: AddedColumns,
        routine: impl Compute + 'static,
    ) -> Self {
        Self::computing(name, FunctionKind::DatasetSummary, target_columns, added_columns, routine)
    }

    /// Build a computing function from an already shared routine.
    pub fn computing(
        name: impl Into<String>,
        kind: FunctionKind,
        target_columns: Vec<String>,
        added_columns: AddedColumns,
        routine: impl Compute + 'static,
    ) -> Self {
        Self::from_shared(name, kind, target_columns, added_columns, Arc::new(routine))
    }

    pub(crate) fn from_shared(
        name: impl Into<String>,
        kind: FunctionKind,
        target_columns: Vec<String>,
        added_columns: AddedColumns,
        routine: Arc<dyn Compute>,
    ) -> Self {
        Function {
            name: name.into(),
            kind,
            target_columns,
            routine: Routine::Compute {
                routine,
                added_columns,
            },
            options: Options::new(),
        }
    }

    pub(crate) fn preprocess_shared(
        name: impl Into<String>,
        target_columns: Vec<String>,
        routine: Arc<dyn Separate>,
    ) -> Self {
        Function {
            name: name.into(),
            kind: FunctionKind::Preprocess,
            target_columns,
            routine: Routine::Separate {
                routine,
                deleted_columns: Vec::new(),
            },
            options: Options::new(),
        }
    }

    /// Unique variables a preprocess function removes from every entry it produces.
    /// Ignored for computing functions.
    pub fn deleting(mut self, columns: Vec<String>) -> Self {
        if let Routine::Separate { deleted_columns, .. } = &mut self.routine {
            *deleted_columns = columns;
        }
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    pub fn target_columns(&self) -> &[String] {
        &self.target_columns
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// `None` for preprocess functions.
    pub fn added_columns(&self) -> Option<&AddedColumns> {
        match &self.routine {
            Routine::Compute { added_columns, .. } => Some(added_columns),
            Routine::Separate { .. } => None,
        }
    }

    pub fn deleted_columns(&self) -> &[String] {
        match &self.routine {
            Routine::Separate { deleted_columns, .. } => deleted_columns,
            Routine::Compute { .. } => &[],
        }
    }

    /// Run the computing routine. Preprocess functions return the table untouched.
    pub fn compute(&self, table: Table, call: &Call<'_>) -> Result<Table> {
        match &self.routine {
            Routine::Compute { routine, .. } => routine.compute(table, call),
            Routine::Separate { .. } => Ok(table),
        }
    }

    /// Run the separation routine. Computing functions return the entry as is.
    pub fn separate(&self, table: Table, targets: &[usize]) -> Result<Vec<Table>> {
        match &self.routine {
            Routine::Separate { routine, .. } => routine.separate(table, targets, &self.options),
            Routine::Compute { .. } => Ok(vec![table]),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("target_columns", &self.target_columns)
            .field("added_columns", &self.added_columns())
            .field("deleted_columns", &self.deleted_columns())
            .finish()
    }
}
