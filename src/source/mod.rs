//! Data sources: what gets imported, which functions run on it, and how it is laid out.
//!
//! A [`DataSource`] is immutable once built. Everything derived from a processing run
//! (references, length record) is returned to the caller as a
//! [`crate::layout::RunLayout`] instead of being stored here, so one source can drive
//! any number of runs.

pub mod builtin;
pub mod functions;

use std::collections::BTreeSet;
use std::fmt;

use crate::data::loader::ImportOptions;
use crate::data::model::ImportIndices;
use crate::error::ConfigError;
use crate::styles::Styles;

pub use functions::{AddedColumns, Call, Compute, Function, FunctionKind, Mode, Options, Separate};

/// Blank columns appended after entries and samples when laying out a sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Separation {
    /// After every entry except the last of its sample.
    pub entry: usize,
    /// After the last entry of every sample.
    pub sample: usize,
}

#[derive(Debug, Clone)]
pub struct DataSource {
    name: String,
    unique_variables: Vec<String>,
    unique_variable_indices: Vec<usize>,
    column_numbers: Vec<usize>,
    column_labels: Vec<String>,
    start_row: usize,
    end_row: usize,
    separator: Option<u8>,
    xy_plot_indices: (usize, usize),
    excel_row_offset: usize,
    excel_column_offset: usize,
    separation: Separation,
    label_entries: bool,
    styles: Styles,
    preprocess_functions: Vec<Function>,
    calculation_functions: Vec<Function>,
    sample_summary_functions: Vec<Function>,
    dataset_summary_functions: Vec<Function>,
}

impl DataSource {
    pub fn builder(name: impl Into<String>) -> DataSourceBuilder {
        DataSourceBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unique variables as imported, before any preprocess function deletes some.
    pub fn unique_variables(&self) -> &[String] {
        &self.unique_variables
    }

    /// Unique variables that survive preprocessing and get references.
    pub fn processing_variables(&self) -> Vec<String> {
        let deleted: BTreeSet<&str> = self
            .preprocess_functions
            .iter()
            .flat_map(|f| f.deleted_columns())
            .map(String::as_str)
            .collect();
        self.unique_variables
            .iter()
            .filter(|v| !deleted.contains(v.as_str()))
            .cloned()
            .collect()
    }

    /// Where each unique variable sits in a freshly imported entry.
    pub fn import_indices(&self) -> ImportIndices {
        self.unique_variables
            .iter()
            .cloned()
            .zip(self.unique_variable_indices.iter().copied())
            .collect()
    }

    pub fn column_numbers(&self) -> &[usize] {
        &self.column_numbers
    }

    pub fn column_labels(&self) -> &[String] {
        &self.column_labels
    }

    /// Options handed to the importer for every entry file.
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            separator: self.separator,
            start_row: self.start_row,
            end_row: self.end_row,
            column_numbers: Some(self.column_numbers.clone()),
        }
    }

    /// Columns plotted as x and y for each entry.
    pub fn xy_plot_indices(&self) -> (usize, usize) {
        self.xy_plot_indices
    }

    /// `(row, column)` offset of the data block on a sheet.
    pub fn excel_offsets(&self) -> (usize, usize) {
        (self.excel_row_offset, self.excel_column_offset)
    }

    pub fn separation(&self) -> Separation {
        self.separation
    }

    pub fn label_entries(&self) -> bool {
        self.label_entries
    }

    pub fn styles(&self) -> &Styles {
        &self.styles
    }

    pub fn functions(&self, kind: FunctionKind) -> &[Function] {
        match kind {
            FunctionKind::Preprocess => &self.preprocess_functions,
            FunctionKind::Calculation => &self.calculation_functions,
            FunctionKind::SampleSummary => &self.sample_summary_functions,
            FunctionKind::DatasetSummary => &self.dataset_summary_functions,
        }
    }

    /// Calculation, sample-summary and dataset-summary functions, in run order.
    pub fn computing_functions(&self) -> impl Iterator<Item = &Function> {
        self.calculation_functions
            .iter()
            .chain(&self.sample_summary_functions)
            .chain(&self.dataset_summary_functions)
    }

    /// Every name that receives a column reference.
    pub fn reference_names(&self) -> Vec<String> {
        let mut names = self.processing_variables();
        names.extend(self.computing_functions().map(|f| f.name().to_string()));
        names
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataSource(name={})", self.name)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DataSourceBuilder {
    name: String,
    unique_variables: Vec<String>,
    unique_variable_indices: Vec<usize>,
    column_numbers: Option<Vec<usize>>,
    column_labels: Vec<String>,
    start_row: usize,
    end_row: usize,
    separator: Option<u8>,
    xy_plot_indices: (usize, usize),
    excel_row_offset: usize,
    excel_column_offset: usize,
    separation: Separation,
    label_entries: bool,
    styles: Styles,
    functions: Vec<Function>,
}

impl DataSourceBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique_variables: Vec::new(),
            unique_variable_indices: Vec::new(),
            column_numbers: None,
            column_labels: Vec::new(),
            start_row: 0,
            end_row: 0,
            separator: None,
            xy_plot_indices: (0, 1),
            excel_row_offset: 0,
            excel_column_offset: 0,
            separation: Separation::default(),
            label_entries: true,
            styles: Styles::default(),
            functions: Vec::new(),
        }
    }

    pub fn unique_variables<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.unique_variables = names.into_iter().map(Into::into).collect();
        self
    }

    /// Column of each unique variable within an imported entry. Missing trailing
    /// indices are filled with the lowest unused ones.
    pub fn unique_variable_indices(mut self, indices: Vec<usize>) -> Self {
        self.unique_variable_indices = indices;
        self
    }

    /// Raw file columns to import. Defaults to one per unique variable.
    pub fn column_numbers(mut self, numbers: Vec<usize>) -> Self {
        self.column_numbers = Some(numbers);
        self
    }

    pub fn column_labels<S: Into<String>>(mut self, labels: impl IntoIterator<Item = S>) -> Self {
        self.column_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn rows(mut self, start_row: usize, end_row: usize) -> Self {
        self.start_row = start_row;
        self.end_row = end_row;
        self
    }

    pub fn separator(mut self, separator: u8) -> Self {
        self.separator = Some(separator);
        self
    }

    pub fn xy_plot_indices(mut self, x: usize, y: usize) -> Self {
        self.xy_plot_indices = (x, y);
        self
    }

    pub fn excel_offsets(mut self, row: usize, column: usize) -> Self {
        self.excel_row_offset = row;
        self.excel_column_offset = column;
        self
    }

    pub fn entry_separation(mut self, columns: usize) -> Self {
        self.separation.entry = columns;
        self
    }

    pub fn sample_separation(mut self, columns: usize) -> Self {
        self.separation.sample = columns;
        self
    }

    pub fn label_entries(mut self, label_entries: bool) -> Self {
        self.label_entries = label_entries;
        self
    }

    pub fn styles(mut self, styles: Styles) -> Self {
        self.styles = styles;
        self
    }

    pub fn function(mut self, function: Function) -> Self {
        self.functions.push(function);
        self
    }

    pub fn functions(mut self, functions: impl IntoIterator<Item = Function>) -> Self {
        self.functions.extend(functions);
        self
    }

    /// Validate everything and produce the immutable source.
    pub fn build(self) -> Result<DataSource, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::BlankSourceName);
        }

        let variables = self.unique_variables.len();
        let column_numbers = self
            .column_numbers
            .unwrap_or_else(|| (0..variables).collect());
        if column_numbers.len() < variables {
            return Err(ConfigError::TooFewColumns {
                source_name: self.name,
                columns: column_numbers.len(),
                variables,
            });
        }

        let mut unique_variable_indices = self.unique_variable_indices;
        unique_variable_indices.truncate(variables);
        let mut unused =
            (0..variables).filter(|i| !unique_variable_indices.contains(i)).collect::<Vec<_>>().into_iter();
        while unique_variable_indices.len() < variables {
            match unused.next() {
                Some(index) => unique_variable_indices.push(index),
                None => break,
            }
        }

        let mut preprocess_functions = Vec::new();
        let mut calculation_functions = Vec::new();
        let mut sample_summary_functions = Vec::new();
        let mut dataset_summary_functions = Vec::new();
        for function in self.functions {
            match function.kind() {
                FunctionKind::Preprocess => preprocess_functions.push(function),
                FunctionKind::Calculation => calculation_functions.push(function),
                FunctionKind::SampleSummary => sample_summary_functions.push(function),
                FunctionKind::DatasetSummary => dataset_summary_functions.push(function),
            }
        }

        let source = DataSource {
            name: self.name,
            unique_variables: self.unique_variables,
            unique_variable_indices,
            column_numbers,
            column_labels: self.column_labels,
            start_row: self.start_row,
            end_row: self.end_row,
            separator: self.separator,
            xy_plot_indices: self.xy_plot_indices,
            excel_row_offset: self.excel_row_offset,
            excel_column_offset: self.excel_column_offset,
            separation: self.separation,
            label_entries: self.label_entries,
            styles: self.styles,
            preprocess_functions,
            calculation_functions,
            sample_summary_functions,
            dataset_summary_functions,
        };
        validate_functions(&source)?;

        log::debug!(
            "built {source}: {} unique variables, {} functions",
            source.unique_variables.len(),
            source.preprocess_functions.len() + source.computing_functions().count()
        );
        Ok(source)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Walk the functions in run order, tracking which names are available at each step.
fn validate_functions(source: &DataSource) -> Result<(), ConfigError> {
    let source_name = || source.name.clone();
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut available: BTreeSet<&str> = BTreeSet::new();

    for variable in &source.unique_variables {
        if !seen.insert(variable) {
            return Err(ConfigError::DuplicateName {
                name: variable.clone(),
                source_name: source_name(),
            });
        }
        available.insert(variable);
    }

    let unknown = |target: &str, function: &Function| ConfigError::UnknownTarget {
        target: target.to_string(),
        function: function.to_string(),
        source_name: source.name.clone(),
    };

    let ordered = source
        .preprocess_functions
        .iter()
        .chain(source.computing_functions());
    for function in ordered {
        if function.name().trim().is_empty() {
            return Err(ConfigError::BlankFunctionName {
                source_name: source_name(),
            });
        }
        if !seen.insert(function.name()) {
            return Err(ConfigError::DuplicateName {
                name: function.name().to_string(),
                source_name: source_name(),
            });
        }

        for target in function.target_columns() {
            if !available.contains(target.as_str()) {
                return Err(unknown(target, function));
            }
        }

        match function.added_columns() {
            None => {
                for deleted in function.deleted_columns() {
                    if !available.remove(deleted.as_str()) {
                        return Err(unknown(deleted, function));
                    }
                }
                // Preprocess functions own no columns, so nothing may target them.
                continue;
            }
            Some(AddedColumns::FixedCount(0)) => {
                return Err(ConfigError::ZeroAddedColumns {
                    function: function.to_string(),
                });
            }
            Some(AddedColumns::FixedCount(_)) => {}
            Some(AddedColumns::AliasOf(names)) => {
                for name in names {
                    if !available.contains(name.as_str()) {
                        return Err(unknown(name, function));
                    }
                }
                let scope = match function.kind() {
                    FunctionKind::SampleSummary => Some(("sample", FunctionKind::SampleSummary)),
                    FunctionKind::DatasetSummary => Some(("dataset", FunctionKind::DatasetSummary)),
                    _ => None,
                };
                if let Some((scope, kind)) = scope {
                    let peers = source.functions(kind);
                    if let Some(name) = names
                        .iter()
                        .find(|name| !peers.iter().any(|f| f.name() == name.as_str()))
                    {
                        return Err(ConfigError::SummaryAliasScope {
                            function: function.to_string(),
                            target: name.clone(),
                            scope,
                        });
                    }
                }
            }
        }

        available.insert(function.name());
    }

    Ok(())
}
