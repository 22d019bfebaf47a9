use crate::data::model::{Dataset, Table};
use crate::error::LayoutError;
use crate::source::Separation;

use super::merge::LengthRecord;

/// Cut merged dataset tables back into their entries.
///
/// Column dtypes are whatever the merged table holds after computations, since every
/// column carries its own. When `separators` is set, the injected spacer columns are
/// dropped from each entry's tail. Rows are trimmed back to the entry's own length
/// unless computations filled cells further down.
pub fn split_into_entries(
    tables: Vec<Table>,
    lengths: &LengthRecord,
    separators: Option<Separation>,
) -> Result<Vec<Dataset>, LayoutError> {
    if tables.len() != lengths.len() {
        return Err(LayoutError::DatasetCount {
            expected: lengths.len(),
            actual: tables.len(),
        });
    }

    tables
        .into_iter()
        .enumerate()
        .map(|(i, table)| split_dataset(i, table, lengths, separators))
        .collect()
}

fn split_dataset(
    index: usize,
    table: Table,
    lengths: &LengthRecord,
    separators: Option<Separation>,
) -> Result<Dataset, LayoutError> {
    let expected = lengths.dataset_width(index);
    if expected != table.width() {
        return Err(LayoutError::WidthMismatch {
            dataset: index,
            expected,
            actual: table.width(),
        });
    }

    let mut columns = table.columns.into_iter();
    let mut dataset = Vec::new();
    for sample_extents in lengths.dataset(index) {
        let last = sample_extents.len().saturating_sub(1);
        let mut sample = Vec::with_capacity(sample_extents.len());
        for (k, extent) in sample_extents.iter().enumerate() {
            let mut entry = Table::new(columns.by_ref().take(extent.columns).collect());

            if let Some(separation) = separators {
                let spacers = if k == last {
                    separation.sample
                } else {
                    separation.entry
                };
                entry.columns.truncate(entry.width().saturating_sub(spacers));
            }

            let filled = entry.last_filled_row().map_or(0, |row| row + 1);
            entry.truncate_rows(extent.rows.max(filled));
            sample.push(entry);
        }
        dataset.push(sample);
    }

    Ok(dataset)
}
