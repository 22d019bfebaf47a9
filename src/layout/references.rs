use std::collections::BTreeMap;

use crate::data::model::{Column, Dataset, DatasetImports, ImportIndices, Table};
use crate::source::{AddedColumns, Function};

/// Name → column indices inside a single entry table.
pub type EntryReferences = BTreeMap<String, Vec<usize>>;

/// Per-entry references mirroring a dataset's nesting.
pub type DatasetReferences = Vec<Vec<EntryReferences>>;

/// Name → per-sample column indices inside one merged dataset table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    map: BTreeMap<String, Vec<Vec<usize>>>,
}

impl References {
    pub(crate) fn new(map: BTreeMap<String, Vec<Vec<usize>>>) -> Self {
        References { map }
    }

    /// Per-sample index lists for `name`.
    pub fn get(&self, name: &str) -> Option<&[Vec<usize>]> {
        self.map.get(name).map(Vec::as_slice)
    }

    /// Indices of `name` within one sample.
    pub fn sample(&self, name: &str, sample: usize) -> Option<&[usize]> {
        self.map
            .get(name)
            .and_then(|samples| samples.get(sample))
            .map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    /// Every recorded index across all names and samples.
    pub fn all_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.map.values().flatten().flatten().copied()
    }
}

/// Record `functions`' columns in `reference`, allocating fresh indices from `next`.
///
/// Returns the end of the allocated range; the caller appends that many columns.
pub(crate) fn assign_columns<'a>(
    reference: &mut EntryReferences,
    mut next: usize,
    functions: impl IntoIterator<Item = &'a Function>,
) -> usize {
    for function in functions {
        let indices = match function.added_columns() {
            Some(AddedColumns::FixedCount(count)) => {
                let indices: Vec<usize> = (next..next + count).collect();
                next += count;
                indices
            }
            Some(AddedColumns::AliasOf(names)) => names
                .iter()
                .flat_map(|name| reference.get(name).cloned().unwrap_or_default())
                .collect(),
            None => continue,
        };
        reference.insert(function.name().to_string(), indices);
    }
    next
}

/// References for one entry: imported variables first, then calculation columns,
/// which are appended to the entry as NaN placeholders.
pub fn build_entry_references(
    mut entry: Table,
    imports: &ImportIndices,
    calculations: &[Function],
) -> (Table, EntryReferences) {
    let mut reference: EntryReferences = imports
        .iter()
        .map(|(name, &index)| (name.clone(), vec![index]))
        .collect();

    let start = entry.width();
    let end = assign_columns(&mut reference, start, calculations);
    let rows = entry.rows();
    for _ in start..end {
        entry.push(Column::placeholder(rows));
    }

    (entry, reference)
}

/// Build references for every entry of a dataset.
pub fn create_references(
    dataset: Dataset,
    imports: &DatasetImports,
    calculations: &[Function],
) -> (Dataset, DatasetReferences) {
    let mut references = Vec::with_capacity(dataset.len());
    let dataset = dataset
        .into_iter()
        .enumerate()
        .map(|(i, sample)| {
            let mut sample_refs = Vec::with_capacity(sample.len());
            let sample = sample
                .into_iter()
                .enumerate()
                .map(|(j, entry)| {
                    let empty = ImportIndices::new();
                    let entry_imports = imports
                        .get(i)
                        .and_then(|s| s.get(j))
                        .unwrap_or(&empty);
                    let (entry, reference) =
                        build_entry_references(entry, entry_imports, calculations);
                    sample_refs.push(reference);
                    entry
                })
                .collect();
            references.push(sample_refs);
            sample
        })
        .collect();
    (dataset, references)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Column;
    use crate::source::Call;
    use anyhow::Result;

    fn noop(table: Table, _call: &Call<'_>) -> Result<Table> {
        Ok(table)
    }

    fn entry(width: usize, rows: usize) -> Table {
        Table::new(
            (0..width)
                .map(|c| Column::from_f64((0..rows).map(|r| (c * 10 + r) as f64)))
                .collect(),
        )
    }

    #[test]
    fn test_fixed_count_appends_after_entry() {
        let calc = Function::calculation(
            "calc",
            vec!["x".into()],
            AddedColumns::FixedCount(2),
            noop,
        );
        let imports = ImportIndices::from([("x".to_string(), 0)]);
        let (table, reference) = build_entry_references(entry(3, 4), &imports, &[calc]);

        assert_eq!(reference["calc"], vec![3, 4]);
        assert_eq!(reference["x"], vec![0]);
        assert_eq!(table.width(), 5);
        assert_eq!(table.column(4).len(), 4);
        assert!(table.column(3).to_f64().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_alias_concatenates_earlier_names() {
        let functions = vec![
            Function::calculation("a", vec!["x".into()], AddedColumns::FixedCount(1), noop),
            Function::calculation("b", vec!["x".into()], AddedColumns::FixedCount(2), noop),
            Function::calculation(
                "ab",
                vec!["x".into()],
                AddedColumns::AliasOf(vec!["a".into(), "b".into(), "y".into()]),
                noop,
            ),
        ];
        let imports = ImportIndices::from([("x".to_string(), 0), ("y".to_string(), 1)]);
        let (table, reference) = build_entry_references(entry(2, 1), &imports, &functions);

        assert_eq!(reference["ab"], vec![2, 3, 4, 1]);
        assert_eq!(table.width(), 5);
    }

    #[test]
    fn test_create_references_per_entry() {
        let calc = Function::calculation("c", vec!["x".into()], AddedColumns::FixedCount(1), noop);
        let dataset = vec![vec![entry(2, 3), entry(4, 3)], vec![entry(1, 2)]];
        let imports = vec![
            vec![
                ImportIndices::from([("x".to_string(), 1)]),
                ImportIndices::from([("x".to_string(), 3)]),
            ],
            vec![ImportIndices::from([("x".to_string(), 0)])],
        ];
        let (dataset, references) = create_references(dataset, &imports, &[calc]);

        assert_eq!(references[0][0]["c"], vec![2]);
        assert_eq!(references[0][1]["c"], vec![4]);
        assert_eq!(references[1][0]["c"], vec![1]);
        assert_eq!(references[0][1]["x"], vec![3]);
        assert_eq!(dataset[1][0].width(), 2);
    }
}
