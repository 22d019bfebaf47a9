use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};

use crate::data::model::{Dataset, Table, Value};
use crate::error::WriteError;
use crate::labels::SampleHeader;
use crate::styles::{CellStyle, Styles};

/// Last column index a worksheet accepts.
const MAX_COLUMN: usize = 16_383;

/// Everything needed to lay one merged dataset onto a worksheet.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub table: Table,
    pub samples: Vec<SampleHeader>,
    /// One label per table column.
    pub column_labels: Vec<String>,
    pub row_offset: usize,
    pub column_offset: usize,
    pub styles: Styles,
}

// ---------------------------------------------------------------------------
// Workbook
// ---------------------------------------------------------------------------

/// Make sheet names unique, case-insensitively, by appending `_1`, `_2`, …
pub fn unique_sheet_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut taken: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let base = name.as_ref();
        let mut candidate = base.to_string();
        let mut n = 1;
        while taken.iter().any(|t| t.eq_ignore_ascii_case(&candidate)) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        taken.push(candidate);
    }
    taken
}

fn format_for(style: &CellStyle) -> Format {
    let mut format = Format::new();
    if style.bold == Some(true) {
        format = format.set_bold();
    }
    if let Some(size) = style.font_size {
        format = format.set_font_size(size);
    }
    if let Some(rgb) = style.fill_rgb() {
        format = format.set_background_color(rgb);
    }
    if style.center == Some(true) {
        format = format
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);
    }
    if style.wrap_text == Some(true) {
        format = format.set_text_wrap();
    }
    if style.bottom_border == Some(true) {
        format = format.set_border_bottom(FormatBorder::Thin);
    }
    if let Some(num_format) = &style.num_format {
        format = format.set_num_format(num_format);
    }
    format
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &Value,
    format: &Format,
) -> Result<(), WriteError> {
    match value {
        Value::Null => {}
        Value::Float(v) if v.is_nan() => {}
        Value::Float(v) => {
            worksheet.write_number_with_format(row, col, *v, format)?;
        }
        Value::Integer(i) => {
            worksheet.write_number_with_format(row, col, *i as f64, format)?;
        }
        Value::Bool(b) => {
            worksheet.write_boolean_with_format(row, col, *b, format)?;
        }
        Value::Text(s) => match s.strip_prefix('=') {
            Some(formula) => {
                worksheet.write_formula_with_format(row, col, formula.trim_start(), format)?;
            }
            None => {
                worksheet.write_string_with_format(row, col, s, format)?;
            }
        },
    }
    Ok(())
}

/// Sample index owning each table column.
fn column_samples(samples: &[SampleHeader], width: usize) -> Vec<usize> {
    let mut owners = vec![0; width];
    for (j, sample) in samples.iter().enumerate() {
        let end = samples.get(j + 1).map_or(width, |next| next.start);
        for owner in owners.iter_mut().take(end.min(width)).skip(sample.start) {
            *owner = j;
        }
    }
    owners
}

fn write_sheet(worksheet: &mut Worksheet, sheet: &Sheet) -> Result<(), WriteError> {
    let width = sheet.table.width();
    if sheet.column_offset + width > MAX_COLUMN + 1 {
        return Err(WriteError::TooWide {
            sheet: sheet.name.clone(),
            column: sheet.column_offset + width - 1,
        });
    }
    let col = |c: usize| (sheet.column_offset + c) as u16;
    let header_row = sheet.row_offset as u32;

    for (j, sample) in sheet.samples.iter().enumerate() {
        let (header, subheader, _) = sheet.styles.for_sample(j);
        let header = format_for(header);
        let first = col(sample.start);
        if sample.width > 1 {
            let last = col(sample.start + sample.width - 1);
            worksheet.merge_range(header_row, first, header_row, last, &sample.name, &header)?;
        } else {
            worksheet.write_string_with_format(header_row, first, &sample.name, &header)?;
        }

        let subheader = format_for(subheader);
        for c in sample.start..sample.start + sample.width {
            let label = sheet.column_labels.get(c).map_or("", String::as_str);
            worksheet.write_string_with_format(header_row + 1, col(c), label, &subheader)?;
        }
    }

    let owners = column_samples(&sheet.samples, width);
    let formats: Vec<Format> = (0..sheet.samples.len().max(1))
        .map(|j| format_for(sheet.styles.for_sample(j).2))
        .collect();
    let first_data_row = header_row + 2;
    for (c, column) in sheet.table.columns.iter().enumerate() {
        let format = &formats[owners[c].min(formats.len() - 1)];
        worksheet.set_column_width(col(c), 12.5)?;
        for (r, value) in column.values.iter().enumerate() {
            write_cell(worksheet, first_data_row + r as u32, col(c), value, format)?;
        }
    }

    worksheet.set_row_height(header_row, 18)?;
    worksheet.set_row_height(header_row + 1, 44)?;
    Ok(())
}

/// Write each sheet to its own worksheet and save the workbook at `path`.
pub fn write_workbook(path: &Path, sheets: &[Sheet]) -> Result<(), WriteError> {
    let names = unique_sheet_names(&sheets.iter().map(|s| s.name.as_str()).collect::<Vec<_>>());
    let mut workbook = Workbook::new();
    for (sheet, name) in sheets.iter().zip(&names) {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name)?;
        write_sheet(worksheet, sheet)?;
        log::debug!("sheet {name}: {} columns", sheet.table.width());
    }
    workbook.save(path)?;
    log::info!("wrote {} sheets to {}", sheets.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

/// Write one entry table as CSV; missing cells are left empty.
pub fn write_entry_csv(path: &Path, table: &Table) -> Result<(), WriteError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in 0..table.rows() {
        writer.write_record(table.columns.iter().map(|c| c.get(row).to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Export every split entry to `dir` as `<prefix>_<dataset>_<sample>_<entry>.csv`, 1-based.
pub fn export_entries(dir: &Path, prefix: &str, datasets: &[Dataset]) -> Result<Vec<PathBuf>, WriteError> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for (i, dataset) in datasets.iter().enumerate() {
        for (j, sample) in dataset.iter().enumerate() {
            for (k, entry) in sample.iter().enumerate() {
                let path = dir.join(format!("{prefix}_{}_{}_{}.csv", i + 1, j + 1, k + 1));
                write_entry_csv(&path, entry)?;
                written.push(path);
            }
        }
    }
    log::info!("exported {} entries to {}", written.len(), dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Column, DType};

    #[test]
    fn test_unique_sheet_names() {
        let names = unique_sheet_names(&["XRD", "xrd", "Raman", "XRD"]);
        assert_eq!(names, vec!["XRD", "xrd_1", "Raman", "XRD_2"]);
    }

    #[test]
    fn test_column_samples() {
        let samples = vec![
            SampleHeader { name: "a".into(), start: 0, width: 2 },
            SampleHeader { name: "b".into(), start: 3, width: 1 },
        ];
        assert_eq!(column_samples(&samples, 5), vec![0, 0, 0, 1, 1]);
    }

    fn sheet(name: &str) -> Sheet {
        Sheet {
            name: name.to_string(),
            table: Table::new(vec![
                Column::from_f64([1.0, f64::NAN]),
                Column::new(DType::Text, vec![Value::Text("=A3*2".into()), Value::Null]),
                Column::new(DType::Bool, vec![Value::Bool(true)]),
            ]),
            samples: vec![SampleHeader { name: "quartz".into(), start: 0, width: 3 }],
            column_labels: vec!["x".into(), "2x".into(), "ok".into()],
            row_offset: 0,
            column_offset: 0,
            styles: Styles::default(),
        }
    }

    #[test]
    fn test_write_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        write_workbook(&path, &[sheet("xrd"), sheet("XRD")]).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_too_wide_sheet() {
        let mut wide = sheet("xrd");
        wide.column_offset = MAX_COLUMN;
        let dir = tempfile::tempdir().unwrap();
        let err = write_workbook(&dir.path().join("out.xlsx"), &[wide]).unwrap_err();
        assert!(matches!(err, WriteError::TooWide { .. }));
    }

    #[test]
    fn test_export_entries() {
        let dir = tempfile::tempdir().unwrap();
        let entry = Table::new(vec![
            Column::from_f64([1.5, 2.0]),
            Column::new(DType::Float64, vec![Value::Null, Value::Float(3.0)]),
        ]);
        let written = export_entries(dir.path(), "xrd", &[vec![vec![entry]]]).unwrap();

        assert_eq!(written, vec![dir.path().join("xrd_1_1_1.csv")]);
        let content = std::fs::read_to_string(&written[0]).unwrap();
        assert_eq!(content, "1.5,\n2,3\n");
    }
}
