//! Ready-made routines selectable by name from a job file.
//!
//! Computing routines follow one convention: `call.targets[t][sample]` lists the target
//! columns of every entry in a sample, `call.destinations[sample]` the function's own
//! columns in the same entry order. Cells whose inputs are missing stay empty.

use std::sync::Arc;

use anyhow::{Context, Result, bail};

use crate::data::model::{Column, DType, Table, Value};

use super::functions::{Call, Compute, Mode, Options, Separate, option_f64};

/// Names accepted by [`compute_routine`].
pub const COMPUTE_ROUTINES: &[&str] = &["offset", "normalize", "sample_sum", "dataset_sum"];

/// Names accepted by [`separate_routine`].
pub const SEPARATE_ROUTINES: &[&str] = &["split_on_direction", "split_segments"];

pub fn compute_routine(name: &str) -> Option<Arc<dyn Compute>> {
    let routine: Arc<dyn Compute> = match name {
        "offset" => Arc::new(offset),
        "normalize" => Arc::new(normalize),
        "sample_sum" => Arc::new(sample_sum),
        "dataset_sum" => Arc::new(dataset_sum),
        _ => return None,
    };
    Some(routine)
}

pub fn separate_routine(name: &str) -> Option<Arc<dyn Separate>> {
    let routine: Arc<dyn Separate> = match name {
        "split_on_direction" => Arc::new(split_on_direction),
        "split_segments" => Arc::new(split_segments),
        _ => return None,
    };
    Some(routine)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn column_of<'t>(table: &'t Table, index: usize) -> Result<&'t Column> {
    table
        .columns
        .get(index)
        .with_context(|| format!("column {index} is outside a table of width {}", table.width()))
}

fn write_column(table: &mut Table, index: usize, values: Vec<Value>, mode: &Mode<'_>) -> Result<()> {
    column_of(table, index)?;
    let dtype = match mode {
        Mode::Formula { .. } => DType::Text,
        Mode::Numeric => DType::Float64,
    };
    table.set_column(index, Column::new(dtype, values));
    Ok(())
}

/// Per-row sums over `sources`; rows where every source is missing stay empty.
fn row_sums(table: &Table, sources: &[usize], mode: &Mode<'_>) -> Result<Vec<Value>> {
    let columns = sources
        .iter()
        .map(|&s| column_of(table, s))
        .collect::<Result<Vec<_>>>()?;

    let values = (0..table.rows())
        .map(|row| {
            let present: Vec<usize> = sources
                .iter()
                .zip(&columns)
                .filter(|(_, c)| !c.get(row).is_missing())
                .map(|(&s, _)| s)
                .collect();
            if present.is_empty() {
                return Value::Null;
            }
            match mode {
                Mode::Formula { .. } => {
                    let cells: Vec<String> = present
                        .iter()
                        .filter_map(|&s| mode.cell(s, row))
                        .collect();
                    Value::Text(format!("=SUM({})", cells.join(", ")))
                }
                Mode::Numeric => Value::Float(
                    columns
                        .iter()
                        .filter_map(|c| c.get(row).as_f64())
                        .filter(|v| !v.is_nan())
                        .sum(),
                ),
            }
        })
        .collect();
    Ok(values)
}

// ---------------------------------------------------------------------------
// Computing routines
// ---------------------------------------------------------------------------

/// Stagger every entry of the first target: the `n`-th entry overall is shifted by
/// `n * offset`.
pub fn offset(mut table: Table, call: &Call<'_>) -> Result<Table> {
    let step = option_f64(call.options, "offset", 0.0);
    let Some(targets) = call.targets.first() else {
        bail!("offset needs one target column");
    };

    let mut count = 0.0;
    for (sources, destinations) in targets.iter().zip(call.destinations) {
        for (&source, &destination) in sources.iter().zip(destinations) {
            let shift = step * count;
            let column = column_of(&table, source)?;
            let values = column
                .values
                .iter()
                .enumerate()
                .map(|(row, value)| {
                    if value.is_missing() {
                        return Value::Null;
                    }
                    match call.mode.cell(source, row) {
                        Some(cell) => Value::Text(format!("={cell} + {shift}")),
                        None => value.as_f64().map_or(Value::Null, |v| Value::Float(v + shift)),
                    }
                })
                .collect();
            write_column(&mut table, destination, values, &call.mode)?;
            count += 1.0;
        }
    }
    Ok(table)
}

/// Min-max normalization of every entry of the first target to `[0, 1]`. A constant
/// entry normalizes to 0.
pub fn normalize(mut table: Table, call: &Call<'_>) -> Result<Table> {
    let Some(targets) = call.targets.first() else {
        bail!("normalize needs one target column");
    };

    for (sources, destinations) in targets.iter().zip(call.destinations) {
        for (&source, &destination) in sources.iter().zip(destinations) {
            let column = column_of(&table, source)?;
            let present: Vec<(usize, f64)> = column
                .values
                .iter()
                .enumerate()
                .filter(|(_, v)| !v.is_missing())
                .filter_map(|(row, v)| v.as_f64().map(|f| (row, f)))
                .collect();
            let Some(&(last_row, _)) = present.last() else {
                continue;
            };
            let (min, max) = present
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, v)| {
                    (lo.min(v), hi.max(v))
                });

            let values = match call.mode {
                _ if max == min => {
                    let zero = match call.mode {
                        Mode::Formula { .. } => Value::Text("=0".into()),
                        Mode::Numeric => Value::Float(0.0),
                    };
                    let mut values = vec![Value::Null; column.len()];
                    for &(row, _) in &present {
                        values[row] = zero.clone();
                    }
                    values
                }
                Mode::Formula { columns, first_row } => {
                    let letter = &columns[source];
                    let range = format!(
                        "{letter}${}:{letter}${}",
                        first_row,
                        first_row + last_row
                    );
                    let mut values = vec![Value::Null; column.len()];
                    for &(row, _) in &present {
                        values[row] = Value::Text(format!(
                            "=({letter}{r} - MIN({range})) / (MAX({range}) - MIN({range}))",
                            r = row + first_row
                        ));
                    }
                    values
                }
                Mode::Numeric => {
                    let mut values = vec![Value::Null; column.len()];
                    for &(row, v) in &present {
                        values[row] = Value::Float((v - min) / (max - min));
                    }
                    values
                }
            };
            write_column(&mut table, destination, values, &call.mode)?;
        }
    }
    Ok(table)
}

/// Row-wise sum of the first target across the entries of each sample, written to every
/// column the function owns in that sample.
pub fn sample_sum(mut table: Table, call: &Call<'_>) -> Result<Table> {
    let Some(targets) = call.targets.first() else {
        bail!("sample_sum needs one target column");
    };

    for (sources, destinations) in targets.iter().zip(call.destinations) {
        if destinations.is_empty() {
            continue;
        }
        let values = row_sums(&table, sources, &call.mode)?;
        for &destination in destinations {
            write_column(&mut table, destination, values.clone(), &call.mode)?;
        }
    }
    Ok(table)
}

/// Row-wise sum of the first target across every sample of the dataset, written to the
/// columns of the dataset-summary sample.
pub fn dataset_sum(mut table: Table, call: &Call<'_>) -> Result<Table> {
    let Some(targets) = call.targets.first() else {
        bail!("dataset_sum needs one target column");
    };
    let Some(destinations) = call.destinations.last() else {
        return Ok(table);
    };

    let sources: Vec<usize> = targets.iter().flatten().copied().collect();
    let values = row_sums(&table, &sources, &call.mode)?;
    for &destination in destinations {
        write_column(&mut table, destination, values.clone(), &call.mode)?;
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Separating routines
// ---------------------------------------------------------------------------

fn split_at(table: &Table, cuts: &[usize]) -> Vec<Table> {
    let mut pieces = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for &cut in cuts.iter().chain(std::iter::once(&table.rows())) {
        pieces.push(table.slice_rows(start, cut));
        start = cut;
    }
    pieces
}

fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

/// Split an entry wherever the first target column changes direction, for example the
/// up and down sweeps of a scan.
pub fn split_on_direction(table: Table, targets: &[usize], _options: &Options) -> Result<Vec<Table>> {
    let Some(&target) = targets.first() else {
        bail!("split_on_direction needs one target column");
    };
    let x = column_of(&table, target)?.to_f64();
    let deltas: Vec<i8> = x.windows(2).map(|w| sign(w[1] - w[0])).collect();

    let mut cuts = Vec::new();
    let mut previous: Option<usize> = None;
    for (k, pair) in deltas.windows(2).enumerate() {
        if pair[0] == pair[1] {
            continue;
        }
        let cut = k + 2;
        // a flat step between sweeps reports two turns in a row; keep the first
        if previous != Some(cut - 1) {
            cuts.push(cut);
        }
        previous = Some(cut);
    }

    Ok(split_at(&table, &cuts))
}

/// Split an entry into runs of equal values in the first target column, such as the
/// numbered segments of a thermal program.
pub fn split_segments(table: Table, targets: &[usize], _options: &Options) -> Result<Vec<Table>> {
    let Some(&target) = targets.first() else {
        bail!("split_segments needs one target column");
    };
    let segment = column_of(&table, target)?;
    let cuts: Vec<usize> = segment
        .values
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[0] != pair[1])
        .map(|(k, _)| k + 1)
        .collect();

    Ok(split_at(&table, &cuts))
}
