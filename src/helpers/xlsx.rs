use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{error, info};

use crate::{
    error::ScrapeError,
    models::schedule::{ScheduleMode, ShiftRecord},
};

pub const SHEET_NAME: &str = "Sheet1";
pub const HOURS_FORMAT: &str = "#,##0.00";
pub const HOURS_HEADER: &str = "Liczba godzin";

const COMMON_HEADERS: [&str; 7] = [
    "Data",
    "Tytuł programu",
    "Opis",
    "Czynność",
    HOURS_HEADER,
    "Od",
    "Do",
];
const EDITOR_HEADER: &str = "Montażysta";

/// A single spreadsheet cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Hours(f64),
}

impl CellValue {
    /// Text as it shows up in the sheet, used for sizing columns.
    pub fn rendered(&self) -> String {
        match self {
            CellValue::Text(text) => text.clone(),
            CellValue::Hours(hours) => format!("{:.2}", hours),
        }
    }
}

pub fn column_headers(mode: ScheduleMode) -> Vec<&'static str> {
    let mut headers = COMMON_HEADERS.to_vec();
    if mode == ScheduleMode::General {
        headers.push(EDITOR_HEADER);
    }
    headers
}

pub fn row_cells(record: &ShiftRecord, mode: ScheduleMode) -> Vec<CellValue> {
    let mut cells = vec![
        CellValue::Text(record.date.clone()),
        CellValue::Text(record.program_title.clone()),
        CellValue::Text(record.description.clone()),
        CellValue::Text(record.activity.clone()),
        CellValue::Hours(record.duration),
        CellValue::Text(record.start_time.clone()),
        CellValue::Text(record.end_time.clone()),
    ];
    if mode == ScheduleMode::General {
        cells.push(CellValue::Text(record.editor.clone().unwrap_or_default()));
    }
    cells
}

/// Longest rendered value per column plus two characters of padding.
pub fn column_widths(headers: &[&str], rows: &[Vec<CellValue>]) -> Vec<f64> {
    headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            let longest = rows
                .iter()
                .filter_map(|row| row.get(col))
                .map(|cell| cell.rendered().chars().count())
                .fold(header.chars().count(), usize::max);
            (longest + 2) as f64
        })
        .collect()
}

fn build_workbook(records: &[ShiftRecord], mode: ScheduleMode) -> Result<Workbook, XlsxError> {
    let headers = column_headers(mode);
    let rows: Vec<Vec<CellValue>> = records.iter().map(|r| row_cells(r, mode)).collect();

    let header_format = Format::new().set_bold();
    let hours_format = Format::new().set_num_format(HOURS_FORMAT);

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (index, cells) in rows.iter().enumerate() {
        let row = index as u32 + 1;
        for (col, cell) in cells.iter().enumerate() {
            match cell {
                CellValue::Text(text) => {
                    sheet.write_string(row, col as u16, text)?;
                }
                CellValue::Hours(hours) => {
                    sheet.write_number_with_format(row, col as u16, *hours, &hours_format)?;
                }
            }
        }
    }

    for (col, width) in column_widths(&headers, &rows).into_iter().enumerate() {
        sheet.set_column_width(col as u16, width)?;
    }

    Ok(workbook)
}

fn classify_io_error(err: &io::Error, path: &Path) -> ScrapeError {
    if err.kind() == io::ErrorKind::PermissionDenied {
        error!("Permission denied when saving to {}", path.display());
        ScrapeError::write_denied(path)
    } else {
        error!("Error saving Excel file {}: {}", path.display(), err);
        ScrapeError::write_unknown()
    }
}

fn classify_write_error(err: &XlsxError, path: &Path) -> ScrapeError {
    match err {
        XlsxError::IoError(io_err) => classify_io_error(io_err, path),
        other => {
            error!("Error saving Excel file {}: {}", path.display(), other);
            ScrapeError::write_unknown()
        }
    }
}

/// Writes the records to an `.xlsx` file, creating the parent directory.
pub fn save_schedule(
    records: &[ShiftRecord],
    mode: ScheduleMode,
    path: &Path,
) -> Result<(), ScrapeError> {
    info!(
        "Saving {} record(s) to {}",
        records.len(),
        path.display()
    );

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| classify_io_error(&e, path))?;
    }

    let mut workbook =
        build_workbook(records, mode).map_err(|e| classify_write_error(&e, path))?;
    workbook
        .save(path)
        .map_err(|e| classify_write_error(&e, path))?;

    info!("Schedule saved successfully to {}", path.display());
    Ok(())
}
