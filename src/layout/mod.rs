/// Column layout engine: references, summaries, spacers, merge and split.
///
/// ```text
///  Vec<Dataset> + imports
///        │
///        ▼
///   references ─► summary ─► spacer      per dataset, per entry
///        │
///        ▼
///     merge  ──► LengthRecord             one flat table per dataset
///        │
///        ▼
///     unify  ──► References               global column indices
///        │
///        ▼
///   (dispatch)                            computations on flat tables
///        │
///        ▼
///     split  ──► Vec<Dataset>             entries again, spacers stripped
/// ```

pub mod merge;
pub mod references;
pub mod spacer;
pub mod split;
pub mod summary;
pub mod unify;

use crate::data::model::{Dataset, DatasetImports, Table};
use crate::error::LayoutError;
use crate::source::{DataSource, FunctionKind};

pub use merge::{EntryExtent, LengthRecord};
pub use references::{EntryReferences, References};

/// Everything one processing run learned about where columns live.
///
/// Produced fresh by [`lay_out`] or [`merge_only`] and replaced wholesale on the next run.
#[derive(Debug, Clone, Default)]
pub struct RunLayout {
    /// Unified references, one per dataset.
    pub references: Vec<References>,
    pub lengths: LengthRecord,
    /// Spacer widths to strip on split, when spacers were injected.
    pub separators: Option<crate::source::Separation>,
    /// Whether function columns and summary tables were laid out.
    pub functions_applied: bool,
    /// Every sample ends with a synthetic sample-summary entry.
    pub sample_summary: bool,
    /// Every dataset ends with a synthetic dataset-summary sample.
    pub dataset_summary: bool,
}

impl RunLayout {
    /// Unified references for dataset `index`.
    pub fn references(&self, index: usize) -> Option<&References> {
        self.references.get(index)
    }

    /// Split merged tables back into entries using this layout.
    pub fn split(&self, tables: Vec<Table>) -> Result<Vec<Dataset>, LayoutError> {
        split::split_into_entries(tables, &self.lengths, self.separators)
    }
}

/// Lay out every dataset for `source` and merge each into one flat table.
///
/// `imports[i]` mirrors `datasets[i]` and holds each entry's unique-variable indices.
pub fn lay_out(
    source: &DataSource,
    datasets: Vec<Dataset>,
    imports: &[DatasetImports],
) -> (Vec<Table>, RunLayout) {
    let calculations = source.functions(FunctionKind::Calculation);
    let sample_functions = source.functions(FunctionKind::SampleSummary);
    let dataset_functions = source.functions(FunctionKind::DatasetSummary);
    let separation = source.separation();

    let mut local = Vec::with_capacity(datasets.len());
    let mut prepared = Vec::with_capacity(datasets.len());
    for (i, dataset) in datasets.into_iter().enumerate() {
        let empty = DatasetImports::new();
        let dataset_imports = imports.get(i).unwrap_or(&empty);

        let (dataset, references) =
            references::create_references(dataset, dataset_imports, calculations);
        let (dataset, references) = summary::add_summary_tables(
            dataset,
            references,
            sample_functions,
            dataset_functions,
        );
        prepared.push(spacer::inject_spacers(dataset, separation));
        local.push(references);
    }

    let (tables, lengths) = merge::merge_datasets(prepared);

    let names = source.reference_names();
    let references = local
        .iter()
        .enumerate()
        .map(|(i, dataset_refs)| unify::unify_references(dataset_refs, lengths.dataset(i), &names))
        .collect();

    log::info!(
        "{source}: laid out {} datasets ({} named columns)",
        tables.len(),
        names.len()
    );

    let layout = RunLayout {
        references,
        lengths,
        separators: Some(separation),
        functions_applied: true,
        sample_summary: !sample_functions.is_empty(),
        dataset_summary: !dataset_functions.is_empty(),
    };
    (tables, layout)
}

/// Merge datasets without adding function columns, summaries or spacers.
pub fn merge_only(datasets: Vec<Dataset>) -> (Vec<Table>, RunLayout) {
    let (tables, lengths) = merge::merge_datasets(datasets);
    let layout = RunLayout {
        lengths,
        ..RunLayout::default()
    };
    (tables, layout)
}
