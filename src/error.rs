use thiserror::Error;

/// Problems found while building a [`crate::source::DataSource`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("data source name cannot be blank")]
    BlankSourceName,

    #[error("function name cannot be blank in \"{source_name}\"")]
    BlankFunctionName { source_name: String },

    #[error("the name \"{name}\" is used twice in the data source \"{source_name}\"")]
    DuplicateName { name: String, source_name: String },

    #[error(
        "\"{target}\" is not an available column for {function} to use in \"{source_name}\"; \
         check the function order and the unique variables"
    )]
    UnknownTarget {
        target: String,
        function: String,
        source_name: String,
    },

    #[error(
        "{function} can only alias columns of other {scope} summary functions, \
         but \"{target}\" is not one"
    )]
    SummaryAliasScope {
        function: String,
        target: String,
        scope: &'static str,
    },

    #[error("{function} must add at least one column")]
    ZeroAddedColumns { function: String },

    #[error(
        "\"{source_name}\" imports {columns} columns, fewer than its {variables} unique variables"
    )]
    TooFewColumns {
        source_name: String,
        columns: usize,
        variables: usize,
    },

    #[error("unknown style \"{0}\"")]
    UnknownStyle(String),

    #[error("invalid color \"{0}\", expected six hex digits")]
    InvalidColor(String),

    #[error("unknown function routine \"{0}\"")]
    UnknownRoutine(String),
}

/// Violations of the merge/split layout detected while processing.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("dataset {dataset}: length record covers {expected} columns but the table has {actual}")]
    WidthMismatch {
        dataset: usize,
        expected: usize,
        actual: usize,
    },

    #[error("dataset {dataset}: no column reference for \"{name}\"")]
    MissingReference { dataset: usize, name: String },

    #[error("entry has no imported column for unique variable \"{0}\"")]
    MissingImport(String),

    #[error("expected layout for {expected} datasets but got {actual} tables")]
    DatasetCount { expected: usize, actual: usize },
}

/// Failures while writing workbooks or exported entries.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XLSX write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("sheet \"{sheet}\" needs column {column}, past the last spreadsheet column")]
    TooWide { sheet: String, column: usize },
}
