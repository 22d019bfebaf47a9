//! Job files in TOML.
//!
//! Lookup order:
//! 1. `--config` on the command line
//! 2. `$RUSTY_ETL_CONFIG` environment variable
//!
//! Entry file paths are resolved relative to the job file's directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::data::loader::load_entry;
use crate::data::model::Dataset;
use crate::error::ConfigError;
use crate::source::builtin::{compute_routine, separate_routine};
use crate::source::{AddedColumns, DataSource, Function, FunctionKind, Options};
use crate::styles::{StyleOverrides, Styles};

pub const CONFIG_ENV: &str = "RUSTY_ETL_CONFIG";

/// Top-level job description.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    #[serde(rename = "source")]
    pub sources: Vec<SourceConfig>,
}

/// One data source plus the datasets to run through it.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub name: String,
    pub unique_variables: Vec<String>,
    pub unique_variable_indices: Vec<usize>,
    /// Raw file columns to import. Default: one per unique variable.
    pub column_numbers: Option<Vec<usize>>,
    pub column_labels: Vec<String>,
    pub start_row: usize,
    pub end_row: usize,
    /// Single-character field separator for delimited files.
    pub separator: Option<char>,
    pub xy_plot_indices: [usize; 2],
    pub excel_row_offset: usize,
    pub excel_column_offset: usize,
    pub entry_separation: usize,
    pub sample_separation: usize,
    pub label_entries: bool,
    pub styles: StyleOverrides,
    #[serde(rename = "function")]
    pub functions: Vec<FunctionConfig>,
    #[serde(rename = "dataset")]
    pub datasets: Vec<DatasetConfig>,
}

/// A function picked from the built-in routines.
#[derive(Debug, Deserialize)]
pub struct FunctionConfig {
    pub name: String,
    pub kind: FunctionKind,
    pub routine: String,
    #[serde(default)]
    pub target_columns: Vec<String>,
    /// A column count, or the name(s) whose columns are reused.
    #[serde(default)]
    pub added_columns: Option<AddedColumnsConfig>,
    #[serde(default)]
    pub deleted_columns: Vec<String>,
    #[serde(default)]
    pub options: Options,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AddedColumnsConfig {
    Count(usize),
    Name(String),
    Names(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Worksheet name. Default: `<source> <n>`.
    pub sheet_name: Option<String>,
    #[serde(rename = "sample")]
    pub samples: Vec<SampleConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    pub name: Option<String>,
    pub entries: Vec<PathBuf>,
}

// --- Defaults ---

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            unique_variables: Vec::new(),
            unique_variable_indices: Vec::new(),
            column_numbers: None,
            column_labels: Vec::new(),
            start_row: 0,
            end_row: 0,
            separator: None,
            xy_plot_indices: [0, 1],
            excel_row_offset: 0,
            excel_column_offset: 0,
            entry_separation: 0,
            sample_separation: 0,
            label_entries: true,
            styles: StyleOverrides::new(),
            functions: Vec::new(),
            datasets: Vec::new(),
        }
    }
}

impl From<AddedColumnsConfig> for AddedColumns {
    fn from(value: AddedColumnsConfig) -> Self {
        match value {
            AddedColumnsConfig::Count(count) => AddedColumns::FixedCount(count),
            AddedColumnsConfig::Name(name) => AddedColumns::AliasOf(vec![name]),
            AddedColumnsConfig::Names(names) => AddedColumns::AliasOf(names),
        }
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

impl FunctionConfig {
    pub fn build(&self) -> Result<Function> {
        let function = match self.kind {
            FunctionKind::Preprocess => {
                let routine = separate_routine(&self.routine)
                    .ok_or_else(|| ConfigError::UnknownRoutine(self.routine.clone()))?;
                Function::preprocess_shared(&self.name, self.target_columns.clone(), routine)
                    .deleting(self.deleted_columns.clone())
            }
            kind => {
                let routine = compute_routine(&self.routine)
                    .ok_or_else(|| ConfigError::UnknownRoutine(self.routine.clone()))?;
                let Some(added) = self.added_columns.clone() else {
                    bail!("{kind} {} needs added_columns", self.name);
                };
                Function::from_shared(
                    &self.name,
                    kind,
                    self.target_columns.clone(),
                    added.into(),
                    routine,
                )
            }
        };
        Ok(function.with_options(self.options.clone()))
    }
}

impl SourceConfig {
    /// Validate and build the data source.
    pub fn build_source(&self) -> Result<DataSource> {
        let functions = self
            .functions
            .iter()
            .map(FunctionConfig::build)
            .collect::<Result<Vec<_>>>()?;
        let styles = Styles::default().merged(&self.styles)?;

        let mut builder = DataSource::builder(&self.name)
            .unique_variables(self.unique_variables.iter().cloned())
            .unique_variable_indices(self.unique_variable_indices.clone())
            .column_labels(self.column_labels.iter().cloned())
            .rows(self.start_row, self.end_row)
            .xy_plot_indices(self.xy_plot_indices[0], self.xy_plot_indices[1])
            .excel_offsets(self.excel_row_offset, self.excel_column_offset)
            .entry_separation(self.entry_separation)
            .sample_separation(self.sample_separation)
            .label_entries(self.label_entries)
            .styles(styles)
            .functions(functions);
        if let Some(numbers) = &self.column_numbers {
            builder = builder.column_numbers(numbers.clone());
        }
        if let Some(separator) = self.separator {
            let Ok(byte) = u8::try_from(separator) else {
                bail!("separator {separator:?} of \"{}\" is not a single byte", self.name);
            };
            builder = builder.separator(byte);
        }

        Ok(builder.build()?)
    }

    /// Load every entry file of every dataset with the source's import options.
    pub fn load_datasets(&self, source: &DataSource) -> Result<Vec<Dataset>> {
        let options = source.import_options();
        self.datasets
            .iter()
            .map(|dataset| {
                dataset
                    .samples
                    .iter()
                    .map(|sample| {
                        sample
                            .entries
                            .iter()
                            .map(|path| {
                                load_entry(path, &options)
                                    .with_context(|| format!("loading {}", path.display()))
                            })
                            .collect::<Result<Vec<_>>>()
                    })
                    .collect::<Result<Dataset>>()
            })
            .collect()
    }

    /// Sample names of dataset `index`, unnamed samples left out of the tail.
    pub fn sample_names(&self, index: usize) -> Vec<String> {
        self.datasets
            .get(index)
            .map(|dataset| {
                dataset
                    .samples
                    .iter()
                    .enumerate()
                    .map(|(j, s)| s.name.clone().unwrap_or_else(|| format!("Sample {}", j + 1)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn sheet_name(&self, index: usize) -> String {
        self.datasets
            .get(index)
            .and_then(|d| d.sheet_name.clone())
            .unwrap_or_else(|| format!("{} {}", self.name, index + 1))
    }

    fn resolve_paths(&mut self, base: &Path) {
        for dataset in &mut self.datasets {
            for sample in &mut dataset.samples {
                for entry in &mut sample.entries {
                    if entry.is_relative() {
                        *entry = base.join(&*entry);
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Resolve the job file path from the command line or the environment.
pub fn config_path(cli: Option<PathBuf>) -> Option<PathBuf> {
    cli.or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
}

/// Parse a job file and resolve its entry paths.
pub fn load_config(cli: Option<PathBuf>) -> Result<JobConfig> {
    let Some(path) = config_path(cli) else {
        bail!("no job file given; pass --config or set ${CONFIG_ENV}");
    };
    let content =
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let mut config = parse_config(&content).with_context(|| format!("parsing {}", path.display()))?;

    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    for source in &mut config.sources {
        source.resolve_paths(&base);
    }

    log::info!("loaded {} with {} data sources", path.display(), config.sources.len());
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<JobConfig> {
    Ok(toml::from_str(content)?)
}
