use crate::data::model::{Column, Dataset, Table};
use crate::source::Function;

use super::references::{DatasetReferences, EntryReferences, assign_columns};

/// A one-row table holding the columns of `functions`, indexed from 0.
fn summary_entry(functions: &[Function]) -> (Table, EntryReferences) {
    let mut reference = EntryReferences::new();
    let width = assign_columns(&mut reference, 0, functions);
    let table = Table::new((0..width).map(|_| Column::placeholder(1)).collect());
    (table, reference)
}

/// Append the synthetic summary tables.
///
/// Every sample gains a trailing sample-summary entry when `sample_functions` is not
/// empty; the dataset gains a trailing sample holding one dataset-summary entry when
/// `dataset_functions` is not empty.
pub fn add_summary_tables(
    mut dataset: Dataset,
    mut references: DatasetReferences,
    sample_functions: &[Function],
    dataset_functions: &[Function],
) -> (Dataset, DatasetReferences) {
    if !sample_functions.is_empty() {
        for (sample, sample_refs) in dataset.iter_mut().zip(references.iter_mut()) {
            let (table, reference) = summary_entry(sample_functions);
            sample.push(table);
            sample_refs.push(reference);
        }
    }

    if !dataset_functions.is_empty() {
        let (table, reference) = summary_entry(dataset_functions);
        dataset.push(vec![table]);
        references.push(vec![reference]);
    }

    (dataset, references)
}
