use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File name used for the spreadsheet inside the request's working directory.
pub const OUTPUT_FILENAME: &str = "schedule.xlsx";

/// Body of a `POST /schedule` request.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub username: String,
    pub password: String,
    pub start_date: String,
    pub end_date: String,
    pub is_personal: bool,
}

impl ScheduleRequest {
    pub const REQUIRED_FIELDS: [&'static str; 5] =
        ["username", "password", "startDate", "endDate", "isPersonal"];
}

/// Which portal page, and therefore which table layout, is scraped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    General,
    Personal,
}

impl From<bool> for ScheduleMode {
    fn from(is_personal: bool) -> Self {
        if is_personal {
            ScheduleMode::Personal
        } else {
            ScheduleMode::General
        }
    }
}

/// Everything one scrape-and-export run needs.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub username: String,
    pub password: String,
    pub output_dir: PathBuf,
    pub output_filename: String,
    pub start_date: String,
    pub end_date: String,
    pub is_personal: bool,
}

impl ScheduleConfig {
    pub fn from_request(request: ScheduleRequest, output_dir: &Path) -> Self {
        Self {
            username: request.username,
            password: request.password,
            output_dir: output_dir.to_path_buf(),
            output_filename: OUTPUT_FILENAME.to_string(),
            start_date: request.start_date,
            end_date: request.end_date,
            is_personal: request.is_personal,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_filename)
    }

    pub fn mode(&self) -> ScheduleMode {
        ScheduleMode::from(self.is_personal)
    }
}

/// One parsed schedule entry.
///
/// `program_title` and `activity` are always empty: the people using the
/// export fill those columns in by hand.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftRecord {
    pub date: String,
    pub program_title: String,
    pub description: String,
    pub activity: String,
    pub duration: f64,
    pub start_time: String,
    pub end_time: String,
    pub editor: Option<String>,
}
