use chrono::{Duration, NaiveDate, NaiveTime};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::schedule::{ScheduleMode, ShiftRecord};

// Current known layout of the general schedule: positions count every `td`
// below the row in document order, nested tables included.
pub const GENERAL_TIME_CELL: usize = 4;
pub const GENERAL_EDITOR_CELL: usize = 11;

const POLISH_MONTHS: [(&str, u32); 12] = [
    ("stycznia", 1),
    ("lutego", 2),
    ("marca", 3),
    ("kwietnia", 4),
    ("maja", 5),
    ("czerwca", 6),
    ("lipca", 7),
    ("sierpnia", 8),
    ("września", 9),
    ("października", 10),
    ("listopada", 11),
    ("grudnia", 12),
];

static ROW: LazyLock<Selector> = LazyLock::new(|| selector("tr"));
static CELL: LazyLock<Selector> = LazyLock::new(|| selector("td"));
static SPAN: LazyLock<Selector> = LazyLock::new(|| selector("span"));
static TABLE: LazyLock<Selector> = LazyLock::new(|| selector("table"));
static SECTION_HEADER: LazyLock<Selector> =
    LazyLock::new(|| selector("th.gpt-table-section-header"));
static BOLD_ROW: LazyLock<Selector> = LazyLock::new(|| selector("tr.text-bold"));
static BOLD_SPAN: LazyLock<Selector> = LazyLock::new(|| selector("span.text-bold"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css}: {e}"))
}

#[derive(Error, Debug)]
enum RowError {
    #[error("unexpected time format '{0}'")]
    TimeFormat(String),
    #[error("invalid time: {0}")]
    Time(#[from] chrono::ParseError),
}

/// Hours between two `HH:MM` times, rounded to two decimals.
///
/// An end before the start is taken to be on the next day.
pub fn calculate_duration(start_time: &str, end_time: &str) -> Result<f64, chrono::ParseError> {
    let start = NaiveTime::parse_from_str(start_time.trim(), "%H:%M")?;
    let end = NaiveTime::parse_from_str(end_time.trim(), "%H:%M")?;

    let mut elapsed = end - start;
    if end < start {
        elapsed += Duration::days(1);
    }

    let hours = elapsed.num_seconds() as f64 / 3600.0;
    Ok((hours * 100.0).round() / 100.0)
}

/// Turns a header like `poniedziałek, 1 stycznia 2025` into `01.01.2025`.
pub fn convert_long_date(text: &str) -> Option<String> {
    let (_weekday, rest) = text.split_once(',')?;
    let mut parts = rest.split_whitespace();

    let day: u32 = parts.next()?.parse().ok()?;
    let month_name = parts.next()?.to_lowercase();
    let year: i32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let month = POLISH_MONTHS
        .iter()
        .find(|(name, _)| *name == month_name)
        .map(|(_, number)| *number)?;

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.format("%d.%m.%Y").to_string())
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn parse_general_row(row: ElementRef<'_>, date: &str) -> Result<Option<ShiftRecord>, RowError> {
    let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
    if cells.is_empty() {
        return Ok(None);
    }

    let Some(program) = row.select(&SPAN).next() else {
        return Ok(None);
    };

    let Some(time_row) = cells
        .get(GENERAL_TIME_CELL)
        .and_then(|cell| cell.select(&BOLD_ROW).next())
    else {
        return Ok(None);
    };

    let Some(editor_cell) = cells.get(GENERAL_EDITOR_CELL) else {
        debug!("Row has only {} cells, no editor column", cells.len());
        return Ok(None);
    };

    let time_text = element_text(time_row).replace('\u{a0}', " ");
    let tokens: Vec<&str> = time_text.split_whitespace().collect();
    let (Some(start_time), Some(end_time)) = (tokens.first(), tokens.get(2)) else {
        return Err(RowError::TimeFormat(time_text.clone()));
    };

    let duration = calculate_duration(start_time, end_time)?;

    Ok(Some(ShiftRecord {
        date: date.to_string(),
        program_title: String::new(),
        description: element_text(program),
        activity: String::new(),
        duration,
        start_time: start_time.to_string(),
        end_time: end_time.to_string(),
        editor: Some(element_text(*editor_cell)),
    }))
}

fn parse_personal_row(row: ElementRef<'_>, date: &str) -> Result<Option<ShiftRecord>, RowError> {
    let Some(program) = row
        .select(&CELL)
        .next()
        .and_then(|cell| cell.select(&TABLE).next())
        .and_then(|table| table.select(&SPAN).next())
    else {
        return Ok(None);
    };

    let Some(time_span) = row.select(&BOLD_SPAN).next() else {
        return Ok(None);
    };

    let time_text = element_text(time_span);
    let times: Vec<&str> = time_text.split('-').collect();
    if times.len() != 2 {
        debug!("Skipping row with time '{}'", time_text);
        return Ok(None);
    }

    let start_time = times[0].trim().replace('\u{a0}', "");
    let end_time = times[1].trim().replace('\u{a0}', "");
    let duration = calculate_duration(&start_time, &end_time)?;

    Ok(Some(ShiftRecord {
        date: date.to_string(),
        program_title: String::new(),
        description: element_text(program),
        activity: String::new(),
        duration,
        start_time,
        end_time,
        editor: None,
    }))
}

/// A parsed schedule page for one week
pub struct ScheduleParser {
    document: Html,
}

impl ScheduleParser {
    pub fn new(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    /// Walks every table row in document order.
    ///
    /// Section header rows set the date for the rows that follow them; rows
    /// seen before any header have no date and are dropped. Rows that do not
    /// look like shifts are skipped without failing the page.
    pub fn records(&self, mode: ScheduleMode) -> impl Iterator<Item = ShiftRecord> + '_ {
        self.document
            .select(&ROW)
            .scan(None::<String>, move |current_date, row| {
                if let Some(header) = row.select(&SECTION_HEADER).next() {
                    let text = element_text(header);
                    *current_date = convert_long_date(&text);
                    if current_date.is_none() {
                        warn!("Unrecognized date header '{}', skipping its rows", text);
                    }
                    return Some(None);
                }

                let Some(date) = current_date.as_deref() else {
                    return Some(None);
                };

                let parsed = match mode {
                    ScheduleMode::General => parse_general_row(row, date),
                    ScheduleMode::Personal => parse_personal_row(row, date),
                };

                match parsed {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!("Error parsing row: {}", e);
                        Some(None)
                    }
                }
            })
            .flatten()
    }
}

/// Extracts all shifts from one week's page.
pub fn extract_week(html: &str, mode: ScheduleMode) -> Vec<ShiftRecord> {
    let parser = ScheduleParser::new(html);
    let records: Vec<ShiftRecord> = parser.records(mode).collect();
    info!("Parsed {} shift record(s) from page", records.len());
    records
}
