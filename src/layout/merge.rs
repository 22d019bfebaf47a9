use crate::data::model::{Dataset, Table};

/// Shape of one entry at the moment it was merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryExtent {
    pub columns: usize,
    pub rows: usize,
}

/// Per dataset, per sample, per entry extents captured by [`merge_datasets`].
///
/// It is the only thing [`super::split::split_into_entries`] needs to find entry
/// boundaries again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LengthRecord {
    datasets: Vec<Vec<Vec<EntryExtent>>>,
}

impl LengthRecord {
    pub fn new(datasets: Vec<Vec<Vec<EntryExtent>>>) -> Self {
        LengthRecord { datasets }
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn dataset(&self, index: usize) -> &[Vec<EntryExtent>] {
        &self.datasets[index]
    }

    /// Column counts only, nested like the datasets.
    pub fn column_counts(&self) -> Vec<Vec<Vec<usize>>> {
        self.datasets
            .iter()
            .map(|samples| {
                samples
                    .iter()
                    .map(|entries| entries.iter().map(|e| e.columns).collect())
                    .collect()
            })
            .collect()
    }

    /// Total width of every sample block of a dataset.
    pub fn sample_widths(&self, dataset: usize) -> Vec<usize> {
        self.datasets[dataset]
            .iter()
            .map(|entries| entries.iter().map(|e| e.columns).sum())
            .collect()
    }

    /// Width of the merged table of a dataset.
    pub fn dataset_width(&self, dataset: usize) -> usize {
        self.sample_widths(dataset).iter().sum()
    }
}

/// Concatenate one dataset's entries (entry-major, then sample-major) into a flat table.
///
/// Columns shorter than the longest one are padded with `Null`.
pub fn merge_dataset(dataset: Dataset) -> (Table, Vec<Vec<EntryExtent>>) {
    let extents: Vec<Vec<EntryExtent>> = dataset
        .iter()
        .map(|sample| {
            sample
                .iter()
                .map(|entry| EntryExtent {
                    columns: entry.width(),
                    rows: entry.rows(),
                })
                .collect()
        })
        .collect();

    let rows = extents.iter().flatten().map(|e| e.rows).max().unwrap_or(0);

    let mut merged = Table::default();
    for sample in dataset {
        for entry in sample {
            for mut column in entry.columns {
                column.pad_to(rows);
                merged.push(column);
            }
        }
    }

    (merged, extents)
}

/// Merge every dataset into a single table and record how to undo it.
pub fn merge_datasets(datasets: Vec<Dataset>) -> (Vec<Table>, LengthRecord) {
    let (tables, extents): (Vec<_>, Vec<_>) = datasets.into_iter().map(merge_dataset).unzip();
    for (i, table) in tables.iter().enumerate() {
        log::debug!("merged dataset {i}: {} columns x {} rows", table.width(), table.rows());
    }
    (tables, LengthRecord::new(extents))
}
