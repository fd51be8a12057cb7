// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Spreadsheet files in and out of the import pipeline.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use calamine::{Data, Reader, open_workbook_auto};
use evadmin_app::import::{MappedRecord, USER_IMPORT_COLUMNS, validate_import_file_name};
use rust_xlsxwriter::{Format, Workbook};

pub const TEMPLATE_SHEET_NAME: &str = "Danh sách người dùng";
pub const TEMPLATE_FILE_NAME: &str = "mau_danh_sach_nguoi_dung.xlsx";
pub const TEMPLATE_COLUMN_WIDTHS: [f64; 4] = [20.0, 30.0, 15.0, 50.0];

const TEMPLATE_ROWS: [[&str; 4]; 2] = [
    [
        "Nguyễn Văn A",
        "nguyenvana@example.com",
        "Nhân viên",
        "https://drive.google.com/file/d/1234567890/view?usp=sharing",
    ],
    [
        "Trần Thị B",
        "tranthib@example.com",
        "Quản lý",
        "https://drive.google.com/file/d/0987654321/view?usp=sharing",
    ],
];

/// Reads the first worksheet of `path` and maps each data row through
/// `mapping` (header text to field name).
///
/// The first non-blank row is the header row. Blank rows are skipped.
/// Every mapped field is present on every record, as `""` when the cell is
/// missing.
pub fn read_and_map(path: &Path, mapping: &[(&str, &str)]) -> Result<Vec<MappedRecord>> {
    validate_import_file_name(path)?;
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("open spreadsheet {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("{} has no worksheets", path.display()))?
        .with_context(|| format!("read first worksheet of {}", path.display()))?;

    let Some((first_row, _)) = range.start() else {
        return Ok(Vec::new());
    };

    let mut rows = range
        .rows()
        .enumerate()
        .map(|(offset, cells)| (first_row as usize + offset + 1, cells))
        .filter(|(_, cells)| !is_blank_row(cells));

    let Some((header_row, header_cells)) = rows.next() else {
        return Ok(Vec::new());
    };
    let columns = map_header(header_cells, mapping);
    if columns.is_empty() {
        let expected: Vec<&str> = mapping.iter().map(|(header, _)| *header).collect();
        bail!(
            "row {header_row} has none of the expected column headers ({})",
            expected.join(", ")
        );
    }
    tracing::debug!(header_row, mapped = columns.len(), "spreadsheet header read");

    let records = rows
        .map(|(row, cells)| {
            let mut fields: BTreeMap<String, String> = mapping
                .iter()
                .map(|(_, field)| ((*field).to_owned(), String::new()))
                .collect();
            for (index, field) in &columns {
                if let Some(cell) = cells.get(*index) {
                    fields.insert((*field).to_owned(), cell_text(cell));
                }
            }
            MappedRecord { row, fields }
        })
        .collect();
    Ok(records)
}

/// Reads `path` with the user import headers.
pub fn read_user_records(path: &Path) -> Result<Vec<MappedRecord>> {
    read_and_map(path, &USER_IMPORT_COLUMNS)
}

/// Writes the user import template: header row plus two sample rows.
pub fn write_user_template(path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(TEMPLATE_SHEET_NAME)?;

    for (col, ((header, _), width)) in USER_IMPORT_COLUMNS
        .iter()
        .zip(TEMPLATE_COLUMN_WIDTHS)
        .enumerate()
    {
        let col = u16::try_from(col)?;
        worksheet.set_column_width(col, width)?;
        worksheet.write_string_with_format(0, col, *header, &header_format)?;
    }
    for (row, values) in TEMPLATE_ROWS.iter().enumerate() {
        let row = u32::try_from(row + 1)?;
        for (col, value) in values.iter().enumerate() {
            worksheet.write_string(row, u16::try_from(col)?, *value)?;
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("write template {}", path.display()))?;
    tracing::info!(path = %path.display(), "import template written");
    Ok(())
}

fn map_header<'a>(cells: &[Data], mapping: &[(&str, &'a str)]) -> Vec<(usize, &'a str)> {
    cells
        .iter()
        .enumerate()
        .filter_map(|(index, cell)| {
            let header = cell_text(cell);
            mapping
                .iter()
                .find(|(name, _)| *name == header.trim())
                .map(|(_, field)| (index, *field))
        })
        .collect()
}

fn is_blank_row(cells: &[Data]) -> bool {
    cells.iter().all(|cell| cell_text(cell).trim().is_empty())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(value) => value.clone(),
        Data::Int(value) => value.to_string(),
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{}", *value as i64)
        }
        Data::Bool(value) => value.to_string(),
        other => other.to_string(),
    }
}
