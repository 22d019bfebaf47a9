use anyhow::{Context, Result};

use crate::data::model::Table;
use crate::data::optimize::optimize_memory;
use crate::error::LayoutError;
use crate::layout::{References, RunLayout};
use crate::source::{Call, DataSource, Function, Mode};

/// Which kind of output the computing functions should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeMode {
    /// Spreadsheet formulas referencing the written sheet.
    Formula,
    /// Plain numbers.
    Numeric,
}

// ---------------------------------------------------------------------------
// Column letters
// ---------------------------------------------------------------------------

/// Spreadsheet column name of a 0-based index: 0 → `A`, 25 → `Z`, 26 → `AA`.
pub fn column_letter(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        n -= 1;
        letters.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}

/// Letters for `count` table columns written starting at sheet column `offset`.
pub fn column_letters(count: usize, offset: usize) -> Vec<String> {
    (offset..offset + count).map(column_letter).collect()
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run every calculation, sample-summary and dataset-summary function of `source`
/// over the merged dataset tables, in that order.
///
/// In formula mode the first data row handed to functions is `row_offset + 3`: one row for
/// the sample header, one for the column labels and one to go from 0- to 1-based rows.
/// Columns are shrunk with [`optimize_memory`] once a dataset's functions have run.
pub fn do_functions(
    source: &DataSource,
    tables: Vec<Table>,
    layout: &RunLayout,
    mode: ComputeMode,
) -> Result<Vec<Table>> {
    if tables.len() != layout.references.len() {
        return Err(LayoutError::DatasetCount {
            expected: layout.references.len(),
            actual: tables.len(),
        }
        .into());
    }

    let (row_offset, column_offset) = source.excel_offsets();
    let first_row = row_offset + 3;

    let mut output = Vec::with_capacity(tables.len());
    for (i, (mut table, references)) in tables.into_iter().zip(&layout.references).enumerate() {
        for function in source.computing_functions() {
            let letters = match mode {
                ComputeMode::Formula => column_letters(table.width(), column_offset),
                ComputeMode::Numeric => Vec::new(),
            };
            let mode = match mode {
                ComputeMode::Formula => Mode::Formula {
                    columns: &letters,
                    first_row,
                },
                ComputeMode::Numeric => Mode::Numeric,
            };

            table = run_function(function, table, references, i, mode)
                .with_context(|| format!("{function} failed on dataset {i} of {source}"))?;
        }
        log::debug!("{source}: ran functions on dataset {i} ({mode:?})");
        output.push(optimize_memory(table));
    }

    Ok(output)
}

fn run_function(
    function: &Function,
    table: Table,
    references: &References,
    dataset: usize,
    mode: Mode<'_>,
) -> Result<Table> {
    let lookup = |name: &str| {
        references.get(name).ok_or_else(|| LayoutError::MissingReference {
            dataset,
            name: name.to_string(),
        })
    };

    let targets = function
        .target_columns()
        .iter()
        .map(|name| lookup(name))
        .collect::<Result<Vec<_>, _>>()?;
    let destinations = lookup(function.name())?;

    let call = Call {
        targets,
        destinations,
        mode,
        options: function.options(),
    };
    function.compute(table, &call)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Column, DatasetImports, ImportIndices, Value};
    use crate::layout::lay_out;
    use crate::source::AddedColumns;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
        assert_eq!(column_letters(3, 1), vec!["B", "C", "D"]);
    }

    /// Writes `=<x cell>` in formula mode and `x * 2` in numeric mode into its own columns.
    fn double(mut table: Table, call: &Call<'_>) -> Result<Table> {
        for (sources, destinations) in call.targets[0].iter().zip(call.destinations) {
            for (&source, &destination) in sources.iter().zip(destinations) {
                let rows = table.column(source).len();
                let values = (0..rows)
                    .map(|row| match call.mode.cell(source, row) {
                        Some(cell) => Value::Text(format!("={cell}*2")),
                        None => match table.column(source).get(row).as_f64() {
                            Some(v) => Value::Float(v * 2.0),
                            None => Value::Null,
                        },
                    })
                    .collect();
                let dtype = match call.mode {
                    Mode::Formula { .. } => crate::data::model::DType::Text,
                    Mode::Numeric => crate::data::model::DType::Float64,
                };
                table.set_column(destination, Column::new(dtype, values));
            }
        }
        Ok(table)
    }

    fn source() -> DataSource {
        DataSource::builder("xrd")
            .unique_variables(["x"])
            .excel_offsets(2, 1)
            .function(Function::calculation(
                "double",
                vec!["x".into()],
                AddedColumns::FixedCount(1),
                double,
            ))
            .build()
            .unwrap()
    }

    fn prepared() -> (Vec<Table>, RunLayout) {
        let entry = Table::new(vec![Column::from_f64([1.0, 2.5])]);
        let imports: DatasetImports = vec![vec![ImportIndices::from([("x".to_string(), 0)])]];
        lay_out(&source(), vec![vec![vec![entry]]], &[imports])
    }

    #[test]
    fn test_formula_mode_uses_offsets() {
        let (tables, layout) = prepared();
        let tables = do_functions(&source(), tables, &layout, ComputeMode::Formula).unwrap();
        // table column 0 lands on sheet column B, first data row is 2 + 3
        assert_eq!(tables[0].column(1).values[0], Value::Text("=B5*2".into()));
        assert_eq!(tables[0].column(1).values[1], Value::Text("=B6*2".into()));
    }

    #[test]
    fn test_numeric_mode_computes_values() {
        let (tables, layout) = prepared();
        let tables = do_functions(&source(), tables, &layout, ComputeMode::Numeric).unwrap();
        assert_eq!(tables[0].column(1).to_f64(), vec![2.0, 5.0]);
    }

    #[test]
    fn test_missing_reference_is_an_error() {
        let (tables, mut layout) = prepared();
        layout.references[0] = References::default();
        let err = do_functions(&source(), tables, &layout, ComputeMode::Numeric).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LayoutError>(),
            Some(LayoutError::MissingReference { .. })
        ));
    }
}
