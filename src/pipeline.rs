use anyhow::{Context, Result};

use crate::data::model::{Dataset, DatasetImports, ImportIndices, Table};
use crate::dispatch::{ComputeMode, do_functions};
use crate::error::LayoutError;
use crate::layout::{RunLayout, lay_out};
use crate::source::{DataSource, Function, FunctionKind};

/// Output of one full processing run of a data source.
#[derive(Debug, Clone)]
pub struct Processed {
    /// Merged dataset tables holding spreadsheet formulas, ready to write.
    pub formula_tables: Vec<Table>,
    /// Numeric results split back into entries, spacers removed.
    pub entries: Vec<Dataset>,
    pub layout: RunLayout,
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Remove `deleted` variables from an entry, shifting the indices of later columns down.
fn remove_deleted(
    mut entry: Table,
    mut imports: ImportIndices,
    deleted: &[String],
) -> (Table, ImportIndices) {
    for name in deleted {
        let Some(index) = imports.remove(name) else {
            continue;
        };
        if index < entry.width() {
            entry.columns.remove(index);
            for other in imports.values_mut() {
                if *other > index {
                    *other -= 1;
                }
            }
        }
    }
    (entry, imports)
}

fn preprocess_entry(
    function: &Function,
    entry: Table,
    imports: ImportIndices,
) -> Result<Vec<(Table, ImportIndices)>> {
    let targets = function
        .target_columns()
        .iter()
        .map(|name| {
            imports
                .get(name)
                .copied()
                .ok_or_else(|| LayoutError::MissingImport(name.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let pieces = function
        .separate(entry, &targets)
        .with_context(|| format!("{function} failed"))?;

    Ok(pieces
        .into_iter()
        .map(|piece| remove_deleted(piece, imports.clone(), function.deleted_columns()))
        .collect())
}

/// Run every preprocess function of `source` on every entry, in declaration order.
///
/// An entry may come back as several entries of the same sample; each piece inherits
/// its parent's import indices, minus the function's deleted columns.
pub fn preprocess(
    source: &DataSource,
    datasets: Vec<Dataset>,
    imports: Vec<DatasetImports>,
) -> Result<(Vec<Dataset>, Vec<DatasetImports>)> {
    let functions = source.functions(FunctionKind::Preprocess);
    if functions.is_empty() {
        return Ok((datasets, imports));
    }

    let mut out_datasets = Vec::with_capacity(datasets.len());
    let mut out_imports = Vec::with_capacity(datasets.len());
    for (dataset, dataset_imports) in datasets.into_iter().zip(imports) {
        let mut new_dataset = Vec::with_capacity(dataset.len());
        let mut new_imports = Vec::with_capacity(dataset.len());
        for (sample, sample_imports) in dataset.into_iter().zip(dataset_imports) {
            let mut pairs: Vec<(Table, ImportIndices)> =
                sample.into_iter().zip(sample_imports).collect();
            for function in functions {
                let mut next = Vec::with_capacity(pairs.len());
                for (entry, entry_imports) in pairs {
                    next.extend(preprocess_entry(function, entry, entry_imports)?);
                }
                pairs = next;
            }
            let (entries, indices): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
            new_dataset.push(entries);
            new_imports.push(indices);
        }
        out_datasets.push(new_dataset);
        out_imports.push(new_imports);
    }

    log::info!(
        "{source}: preprocessed into {} entries",
        out_datasets.iter().flatten().map(Vec::len).sum::<usize>()
    );
    Ok((out_datasets, out_imports))
}

// ---------------------------------------------------------------------------
// Full run
// ---------------------------------------------------------------------------

/// Preprocess, lay out and merge the datasets, then run the functions twice: once for
/// formulas on the merged tables, once for numbers that get split back into entries.
pub fn process(
    source: &DataSource,
    datasets: Vec<Dataset>,
    imports: Vec<DatasetImports>,
) -> Result<Processed> {
    let (datasets, imports) = preprocess(source, datasets, imports)?;
    let (merged, layout) = lay_out(source, datasets, &imports);

    let formula_tables = do_functions(source, merged.clone(), &layout, ComputeMode::Formula)?;
    let numeric_tables = do_functions(source, merged, &layout, ComputeMode::Numeric)?;
    let entries = layout.split(numeric_tables)?;

    log::info!(
        "{source}: processed {} datasets, {} columns written",
        formula_tables.len(),
        formula_tables.iter().map(Table::width).sum::<usize>()
    );

    Ok(Processed {
        formula_tables,
        entries,
        layout,
    })
}

/// Per-entry import indices for freshly loaded datasets, all taken from the source.
pub fn default_imports(source: &DataSource, datasets: &[Dataset]) -> Vec<DatasetImports> {
    let indices = source.import_indices();
    datasets
        .iter()
        .map(|dataset| {
            dataset
                .iter()
                .map(|sample| vec![indices.clone(); sample.len()])
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Column, DType, Value};
    use crate::source::{AddedColumns, Options, builtin};

    fn segments(table: Table, targets: &[usize], options: &Options) -> Result<Vec<Table>> {
        builtin::split_segments(table, targets, options)
    }

    fn tga_entry() -> Table {
        Table::new(vec![
            Column::from_f64([0.0, 1.0, 2.0, 3.0]),
            Column::new(DType::Int64, [1, 1, 2, 2].into_iter().map(Value::Integer).collect()),
            Column::from_f64([10.0, 9.0, 8.0, 7.0]),
        ])
    }

    #[test]
    fn test_remove_deleted_shifts_indices() {
        let imports = ImportIndices::from([
            ("time".to_string(), 0),
            ("segment".to_string(), 1),
            ("mass".to_string(), 2),
        ]);
        let (entry, imports) = remove_deleted(tga_entry(), imports, &["segment".into()]);

        assert_eq!(entry.width(), 2);
        assert_eq!(imports.get("segment"), None);
        assert_eq!(imports["mass"], 1);
        assert_eq!(imports["time"], 0);
    }

    #[test]
    fn test_preprocess_splits_and_deletes() {
        let source = DataSource::builder("tga")
            .unique_variables(["time", "segment", "mass"])
            .function(
                Function::preprocess("segments", vec!["segment".into()], segments)
                    .deleting(vec!["segment".into()]),
            )
            .build()
            .unwrap();
        let datasets = vec![vec![vec![tga_entry()]]];
        let imports = default_imports(&source, &datasets);

        let (datasets, imports) = preprocess(&source, datasets, imports).unwrap();

        assert_eq!(datasets[0][0].len(), 2);
        assert_eq!(datasets[0][0][1].column(1).to_f64(), vec![8.0, 7.0]);
        assert_eq!(imports[0][0][1]["mass"], 1);
    }

    #[test]
    fn test_missing_import_for_target() {
        let source = DataSource::builder("tga")
            .unique_variables(["time", "segment"])
            .function(Function::preprocess("segments", vec!["segment".into()], segments))
            .build()
            .unwrap();
        let datasets = vec![vec![vec![tga_entry()]]];
        let imports = vec![vec![vec![ImportIndices::new()]]];

        let err = preprocess(&source, datasets, imports).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LayoutError>(),
            Some(LayoutError::MissingImport(name)) if name == "segment"
        ));
    }

    #[test]
    fn test_process_runs_both_modes() {
        let source = DataSource::builder("xrd")
            .unique_variables(["x", "y"])
            .entry_separation(1)
            .sample_separation(2)
            .function(Function::sample_summary(
                "total",
                vec!["y".into()],
                AddedColumns::FixedCount(1),
                builtin::sample_sum,
            ))
            .build()
            .unwrap();
        let entry = |scale: f64| {
            Table::new(vec![
                Column::from_f64([1.0, 2.0]),
                Column::from_f64([scale, 2.0 * scale]),
            ])
        };
        let datasets = vec![vec![vec![entry(1.0), entry(10.0)]]];
        let imports = default_imports(&source, &datasets);

        let processed = process(&source, datasets, imports).unwrap();

        // entry 2+1, entry 2+1, summary 1+2
        let formulas = &processed.formula_tables[0];
        assert_eq!(formulas.width(), 9);
        assert_eq!(formulas.column(6).values[0], Value::Text("=SUM(B3, E3)".into()));

        let sample = &processed.entries[0][0];
        assert_eq!(sample.len(), 3);
        assert_eq!(sample[0].width(), 2);
        assert_eq!(sample[2].column(0).to_f64(), vec![11.0, 22.0]);
    }
}
