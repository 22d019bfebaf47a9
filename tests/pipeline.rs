//! End-to-end tests: job file → loaded entries → formulas, numbers and written output

mod common;

use common::{xy_entry, xy_imports};
use rusty_etl::config::load_config;
use rusty_etl::data::model::{Table, Value};
use rusty_etl::labels::{column_headers, sample_headers};
use rusty_etl::pipeline::{default_imports, process};
use rusty_etl::source::{AddedColumns, DataSource, Function, builtin};
use rusty_etl::writer::{Sheet, export_entries, write_workbook};

fn floats(table: &Table, column: usize) -> Vec<f64> {
    table.column(column).to_f64()
}

#[test]
fn test_formulas_and_numbers_agree() {
    let options = serde_json::json!({ "offset": 10.0 });
    let source = DataSource::builder("xrd")
        .unique_variables(["x", "y"])
        .function(
            Function::calculation("offset", vec!["y".into()], AddedColumns::FixedCount(1), builtin::offset)
                .with_options(options.as_object().cloned().unwrap_or_default()),
        )
        .function(Function::sample_summary(
            "total",
            vec!["y".into()],
            AddedColumns::FixedCount(1),
            builtin::sample_sum,
        ))
        .build()
        .unwrap();

    let datasets = vec![vec![vec![xy_entry(3, 1.0), xy_entry(3, 2.0)]]];
    let processed = process(&source, datasets, vec![xy_imports(&[2])]).unwrap();

    // A B C | D E F | G
    let formulas = &processed.formula_tables[0];
    assert_eq!(formulas.width(), 7);
    assert_eq!(formulas.column(2).get(0), &Value::Text("=B3 + 0".into()));
    assert_eq!(formulas.column(5).get(1), &Value::Text("=E4 + 10".into()));
    assert_eq!(formulas.column(6).get(2), &Value::Text("=SUM(B5, E5)".into()));

    let sample = &processed.entries[0][0];
    assert_eq!(sample.len(), 3);
    assert_eq!(floats(&sample[0], 2), vec![0.0, 1.0, 2.0]);
    assert_eq!(floats(&sample[1], 2), vec![10.0, 12.0, 14.0]);
    assert_eq!(floats(&sample[2], 0), vec![0.0, 3.0, 6.0]);
}

#[test]
fn test_default_imports_follow_unique_variables() {
    let source = DataSource::builder("xrd")
        .unique_variables(["x", "y"])
        .build()
        .unwrap();
    let datasets = vec![vec![vec![xy_entry(2, 1.0)], vec![xy_entry(2, 1.0), xy_entry(2, 1.0)]]];

    assert_eq!(default_imports(&source, &datasets), vec![xy_imports(&[1, 2])]);
}

const JOB: &str = r#"
[[source]]
name = "tga"
unique_variables = ["time", "mass", "segment"]
column_labels = ["Time", "Mass", "Offset Mass", "Sample Total", "Dataset Total"]
entry_separation = 1
excel_row_offset = 1
excel_column_offset = 1

[[source.function]]
name = "segments"
kind = "preprocess"
routine = "split_segments"
target_columns = ["segment"]
deleted_columns = ["segment"]

[[source.function]]
name = "offset_mass"
kind = "calculation"
routine = "offset"
target_columns = ["mass"]
added_columns = 1
options = { offset = 1.0 }

[[source.function]]
name = "sample_total"
kind = "sample_summary"
routine = "sample_sum"
target_columns = ["mass"]
added_columns = 1

[[source.function]]
name = "dataset_total"
kind = "dataset_summary"
routine = "dataset_sum"
target_columns = ["sample_total"]
added_columns = 1

[[source.dataset]]
sheet_name = "TGA"

[[source.dataset.sample]]
name = "Kaolinite"
entries = ["kaolinite.csv"]
"#;

#[test]
fn test_job_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("kaolinite.csv"), "0,1,1\n1,2,1\n2,3,2\n3,4,2\n").unwrap();
    let path = dir.path().join("job.toml");
    std::fs::write(&path, JOB).unwrap();

    let config = load_config(Some(path)).unwrap();
    let source_config = &config.sources[0];
    let source = source_config.build_source().unwrap();
    let datasets = source_config.load_datasets(&source).unwrap();
    let imports = default_imports(&source, &datasets);
    let processed = process(&source, datasets, imports).unwrap();

    // two segments of two rows, then the sample and dataset summaries
    let entries = &processed.entries[0];
    let widths: Vec<Vec<usize>> = entries
        .iter()
        .map(|sample| sample.iter().map(Table::width).collect())
        .collect();
    assert_eq!(widths, vec![vec![3, 3, 1], vec![1]]);
    assert_eq!(floats(&entries[0][0], 2), vec![1.0, 2.0]);
    assert_eq!(floats(&entries[0][1], 2), vec![4.0, 5.0]);
    assert_eq!(floats(&entries[0][2], 0), vec![4.0, 6.0]);
    assert_eq!(floats(&entries[1][0], 0), vec![4.0, 6.0]);

    let layout = &processed.layout;
    let labels = column_headers(&source, layout, 0);
    assert_eq!(labels.len(), processed.formula_tables[0].width());
    assert_eq!(labels[0], "Time, 1");

    let (row_offset, column_offset) = source.excel_offsets();
    let sheets: Vec<Sheet> = processed
        .formula_tables
        .iter()
        .enumerate()
        .map(|(i, table)| Sheet {
            name: source_config.sheet_name(i),
            samples: sample_headers(&source_config.sample_names(i), layout, i),
            column_labels: column_headers(&source, layout, i),
            table: table.clone(),
            row_offset,
            column_offset,
            styles: source.styles().clone(),
        })
        .collect();
    assert_eq!(sheets[0].samples[0].name, "Kaolinite");
    assert_eq!(sheets[0].samples[1].name, "Summary");

    let workbook = dir.path().join("out.xlsx");
    write_workbook(&workbook, &sheets).unwrap();
    assert!(workbook.metadata().unwrap().len() > 0);

    let written = export_entries(&dir.path().join("csv"), source.name(), &processed.entries).unwrap();
    assert_eq!(written.len(), 4);
    assert!(written[0].ends_with("tga_1_1_1.csv"));
}
