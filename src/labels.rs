use std::fmt;

use crate::layout::RunLayout;
use crate::source::{AddedColumns, DataSource, FunctionKind};

/// Labels for the columns added by each group of computing functions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationLabels {
    pub calculation: Vec<String>,
    pub sample_summary: Vec<String>,
    pub dataset_summary: Vec<String>,
}

/// Every label a source's `column_labels` is expected to provide, grouped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTemplate {
    pub source: String,
    pub imported: Vec<String>,
    pub calculations: CalculationLabels,
}

impl LabelTemplate {
    /// All labels in sheet order.
    pub fn combined(&self) -> Vec<String> {
        self.imported
            .iter()
            .chain(&self.calculations.calculation)
            .chain(&self.calculations.sample_summary)
            .chain(&self.calculations.dataset_summary)
            .cloned()
            .collect()
    }
}

impl fmt::Display for LabelTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Imported data labels: {}", self.imported.len())?;
        writeln!(f, "Calculation labels: {}", self.calculations.calculation.len())?;
        writeln!(f, "Sample summary labels: {}", self.calculations.sample_summary.len())?;
        writeln!(f, "Dataset summary labels: {}", self.calculations.dataset_summary.len())?;
        writeln!(f)?;
        write!(f, "column_labels template for {} = {:?}", self.source, self.combined())
    }
}

/// Sample name spanning a block of sheet columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleHeader {
    pub name: String,
    /// First column of the block, relative to the data block's first column.
    pub start: usize,
    /// Columns covered, trailing sample spacers excluded.
    pub width: usize,
}

// ---------------------------------------------------------------------------
// Label groups
// ---------------------------------------------------------------------------

/// `column_labels` followed by an endless run of blanks.
fn label_stream(source: &DataSource) -> impl Iterator<Item = String> + '_ {
    source
        .column_labels()
        .iter()
        .cloned()
        .chain(std::iter::repeat(String::new()))
}

fn imported_count(source: &DataSource) -> usize {
    let deleted: usize = source
        .functions(FunctionKind::Preprocess)
        .iter()
        .map(|f| f.deleted_columns().len())
        .sum();
    source.column_numbers().len().saturating_sub(deleted)
}

/// Labels for an entry's imported columns, truncated or blank-padded to `width` if given.
pub fn imported_labels(source: &DataSource, width: Option<usize>) -> Vec<String> {
    let mut labels: Vec<String> = label_stream(source).take(imported_count(source)).collect();
    if let Some(width) = width {
        labels.resize(width, String::new());
    }
    labels
}

/// Labels for function columns, taken from `column_labels` after the imported ones.
///
/// Only fixed-count functions add columns and consume labels.
pub fn calculation_labels(source: &DataSource) -> CalculationLabels {
    let mut stream = label_stream(source).skip(imported_count(source));
    let mut group = |kind: FunctionKind| -> Vec<String> {
        source
            .functions(kind)
            .iter()
            .filter_map(|f| match f.added_columns() {
                Some(AddedColumns::FixedCount(count)) => Some(*count),
                _ => None,
            })
            .flat_map(|count| (0..count).map(|_| stream.next().unwrap_or_default()).collect::<Vec<_>>())
            .collect()
    };

    let calculation = group(FunctionKind::Calculation);
    let sample_summary = group(FunctionKind::SampleSummary);
    let dataset_summary = group(FunctionKind::DatasetSummary);
    CalculationLabels {
        calculation,
        sample_summary,
        dataset_summary,
    }
}

pub fn label_template(source: &DataSource) -> LabelTemplate {
    LabelTemplate {
        source: source.to_string(),
        imported: imported_labels(source, None),
        calculations: calculation_labels(source),
    }
}

// ---------------------------------------------------------------------------
// Sheet headers
// ---------------------------------------------------------------------------

fn spacer_width(layout: &RunLayout, last_in_sample: bool) -> usize {
    match layout.separators {
        Some(separation) if last_in_sample => separation.sample,
        Some(separation) => separation.entry,
        None => 0,
    }
}

/// One label per column of merged dataset `dataset`, spacers blank.
///
/// When the source labels entries and a sample holds more than one real entry, every
/// non-blank label gets the entry's 1-based number appended.
pub fn column_headers(source: &DataSource, layout: &RunLayout, dataset: usize) -> Vec<String> {
    let calculations = if layout.functions_applied {
        calculation_labels(source)
    } else {
        CalculationLabels::default()
    };

    let samples = layout.lengths.dataset(dataset);
    let mut headers = Vec::new();
    for (j, sample) in samples.iter().enumerate() {
        let is_dataset_summary = layout.dataset_summary && j + 1 == samples.len();
        let real_entries = if is_dataset_summary {
            0
        } else if layout.sample_summary {
            sample.len().saturating_sub(1)
        } else {
            sample.len()
        };

        for (k, extent) in sample.iter().enumerate() {
            let spacers = spacer_width(layout, k + 1 == sample.len());
            let width = extent.columns.saturating_sub(spacers);

            let mut labels = if is_dataset_summary {
                calculations.dataset_summary.clone()
            } else if k >= real_entries {
                calculations.sample_summary.clone()
            } else {
                let imported = width.saturating_sub(calculations.calculation.len());
                let mut labels = imported_labels(source, Some(imported));
                labels.extend(calculations.calculation.iter().cloned());
                if source.label_entries() && real_entries > 1 {
                    for label in labels.iter_mut().filter(|l| !l.is_empty()) {
                        *label = format!("{label}, {}", k + 1);
                    }
                }
                labels
            };

            labels.resize(width, String::new());
            labels.resize(extent.columns, String::new());
            headers.extend(labels);
        }
    }
    headers
}

/// Header blocks for each sample of merged dataset `dataset`.
///
/// Missing names default to `Sample n`; the dataset-summary sample is called `Summary`.
pub fn sample_headers(names: &[String], layout: &RunLayout, dataset: usize) -> Vec<SampleHeader> {
    let widths = layout.lengths.sample_widths(dataset);
    let count = widths.len();
    let trailing = spacer_width(layout, true);

    let mut start = 0;
    widths
        .into_iter()
        .enumerate()
        .map(|(j, width)| {
            let name = match names.get(j) {
                Some(name) => name.clone(),
                None if layout.dataset_summary && j + 1 == count => "Summary".to_string(),
                None => format!("Sample {}", j + 1),
            };
            let header = SampleHeader {
                name,
                start,
                width: width.saturating_sub(trailing).max(1),
            };
            start += width;
            header
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Column, DatasetImports, ImportIndices, Table};
    use crate::layout::lay_out;
    use crate::source::{Call, Function, Options};
    use anyhow::Result;

    fn noop(table: Table, _call: &Call<'_>) -> Result<Table> {
        Ok(table)
    }

    fn keep(table: Table, _targets: &[usize], _options: &Options) -> Result<Vec<Table>> {
        Ok(vec![table])
    }

    fn source() -> DataSource {
        DataSource::builder("xrd")
            .unique_variables(["x", "y"])
            .column_labels(["2θ", "Intensity", "Offset", "", "Total"])
            .entry_separation(1)
            .sample_separation(2)
            .function(Function::calculation(
                "offset",
                vec!["y".into()],
                AddedColumns::FixedCount(2),
                noop,
            ))
            .function(Function::sample_summary(
                "total",
                vec!["y".into()],
                AddedColumns::FixedCount(1),
                noop,
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn test_label_groups() {
        let source = source();
        assert_eq!(imported_labels(&source, None), vec!["2θ", "Intensity"]);
        assert_eq!(imported_labels(&source, Some(1)), vec!["2θ"]);
        assert_eq!(imported_labels(&source, Some(3)), vec!["2θ", "Intensity", ""]);

        let calculations = calculation_labels(&source);
        assert_eq!(calculations.calculation, vec!["Offset", ""]);
        assert_eq!(calculations.sample_summary, vec!["Total"]);
        assert!(calculations.dataset_summary.is_empty());
    }

    #[test]
    fn test_deleted_columns_shrink_imported_labels() {
        let source = DataSource::builder("tga")
            .unique_variables(["time", "mass", "segment"])
            .column_labels(["Time", "Mass", "Derivative"])
            .function(
                Function::preprocess("segments", vec!["segment".into()], keep)
                    .deleting(vec!["segment".into()]),
            )
            .build()
            .unwrap();
        assert_eq!(imported_labels(&source, None), vec!["Time", "Mass"]);
    }

    #[test]
    fn test_template_report() {
        let template = label_template(&source());
        let report = template.to_string();
        assert!(report.contains("Calculation labels: 2"));
        assert!(report.contains("Sample summary labels: 1"));
        assert!(report.contains("DataSource(name=xrd)"));
        assert_eq!(template.combined().len(), 5);
    }

    #[test]
    fn test_column_headers_follow_layout() {
        let source = source();
        let entry = || Table::new(vec![Column::from_f64([1.0]), Column::from_f64([2.0])]);
        let imports: DatasetImports = vec![vec![
            ImportIndices::from([("x".to_string(), 0), ("y".to_string(), 1)]);
            2
        ]];
        let (tables, layout) = lay_out(&source, vec![vec![vec![entry(), entry()]]], &[imports]);

        let headers = column_headers(&source, &layout, 0);
        assert_eq!(headers.len(), tables[0].width());
        assert_eq!(
            headers,
            vec![
                "2θ, 1", "Intensity, 1", "Offset, 1", "", "",
                "2θ, 2", "Intensity, 2", "Offset, 2", "", "",
                "Total", "", "",
            ]
        );

        let samples = sample_headers(&[], &layout, 0);
        assert_eq!(
            samples,
            vec![SampleHeader {
                name: "Sample 1".into(),
                start: 0,
                width: 11
            }]
        );
    }
}
