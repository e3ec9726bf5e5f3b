use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{Path as UrlPath, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::{fmt, path::PathBuf, sync::Arc, time::Duration};
use tracing::{error, info, warn};

use crate::{
    error::ScrapeError,
    helpers::{
        parser, portal,
        portal::{utils, PortalConfig},
        titles::TitleCache,
        xlsx,
    },
    models::schedule::{ScheduleConfig, ScheduleRequest, ShiftRecord},
};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const DOWNLOAD_FILENAME: &str = "grafik.xlsx";
pub const DEFAULT_TITLES_PATH: &str = "data/program_titles.csv";
pub const DEFAULT_PORT: u16 = 5000;

/// Configuration for the schedule service
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub portal: PortalConfig,
    pub titles_path: PathBuf,
    /// Directory under which each request gets its own scratch directory.
    pub temp_root: PathBuf,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            portal: PortalConfig::default(),
            titles_path: PathBuf::from(DEFAULT_TITLES_PATH),
            temp_root: std::env::temp_dir(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServiceConfig {
    /// Reads `GRAFIK_PORTAL_URL`, `GRAFIK_TITLES_CSV`, `GRAFIK_TEMP_DIR`,
    /// `GRAFIK_TIMEOUT_SECS` and `PORT`, keeping defaults for anything unset.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(base_url) = std::env::var("GRAFIK_PORTAL_URL") {
            config.portal = PortalConfig::with_base_url(&base_url);
        }
        if let Ok(path) = std::env::var("GRAFIK_TITLES_CSV") {
            config.titles_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("GRAFIK_TEMP_DIR") {
            config.temp_root = PathBuf::from(path);
        }
        if let Ok(secs) = std::env::var("GRAFIK_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("GRAFIK_TIMEOUT_SECS is not a number: {secs}"))?;
            config.portal.timeout = Duration::from_secs(secs);
        }
        if let Ok(port) = std::env::var("PORT") {
            config.port = port
                .parse()
                .with_context(|| format!("PORT is not a valid port: {port}"))?;
        }

        info!("Service configured for portal {}", config.portal.login_url);
        Ok(config)
    }
}

/// Where a scrape currently is; logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeStage {
    Authenticating,
    Fetching { week: usize, of: usize },
    Extracting { week: usize, of: usize },
    Exporting,
    Done,
}

impl fmt::Display for ScrapeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrapeStage::Authenticating => write!(f, "authenticating"),
            ScrapeStage::Fetching { week, of } => write!(f, "fetching week {}/{}", week, of),
            ScrapeStage::Extracting { week, of } => write!(f, "extracting week {}/{}", week, of),
            ScrapeStage::Exporting => write!(f, "exporting"),
            ScrapeStage::Done => write!(f, "done"),
        }
    }
}

/// Logs into the portal, scrapes schedule pages and exports them to a
/// spreadsheet
#[derive(Clone)]
pub struct ScheduleService {
    pub config: ServiceConfig,
    pub titles: Arc<TitleCache>,
}

impl ScheduleService {
    /// Create a new schedule service instance
    pub fn new(config: ServiceConfig, titles: Arc<TitleCache>) -> Self {
        info!("Creating new ScheduleService instance");
        Self { config, titles }
    }

    /// Create an Axum router for the schedule service
    pub fn router(self) -> Router {
        info!("Creating schedule service router");
        let shared_state = Arc::new(self);

        Router::new()
            .route("/health", get(health_check))
            .route("/schedule", post(schedule_download))
            .route("/titles/{key}", get(program_title))
            .with_state(shared_state)
    }

    /// Runs one full scrape and writes the spreadsheet to
    /// `config.output_path()`. Returns the number of exported records.
    pub async fn scrape_schedule(&self, config: &ScheduleConfig) -> Result<usize, ScrapeError> {
        let portal_config = &self.config.portal;
        let mode = config.mode();

        let start = utils::parse_iso_date(&config.start_date)?;
        let end = utils::parse_iso_date(&config.end_date)?;

        let anchors = utils::week_anchors(start, end);
        if anchors.is_empty() {
            error!("No representable week in range {} to {}", start, end);
            return Err(ScrapeError::invalid_date(&config.start_date));
        }

        info!("Scrape stage: {}", ScrapeStage::Authenticating);
        let client = portal::portal_client_init(portal_config)?;
        if let Err(e) =
            portal::login(&client, portal_config, &config.username, &config.password).await
        {
            error!("Login failed: {}", e);
            return Err(e);
        }

        let total = anchors.len();
        let mut all_records: Vec<ShiftRecord> = Vec::new();

        for (index, anchor) in anchors.into_iter().enumerate() {
            let week = index + 1;
            info!(
                "Scrape stage: {} (week starting {})",
                ScrapeStage::Fetching { week, of: total },
                utils::display_date(anchor)
            );

            let html = match portal::fetch_week(&client, portal_config, anchor, mode).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Skipping week starting {}: {}", utils::display_date(anchor), e);
                    continue;
                }
            };

            info!("Scrape stage: {}", ScrapeStage::Extracting { week, of: total });
            all_records.extend(parser::extract_week(&html, mode));
        }

        if all_records.is_empty() {
            error!("No schedule data was fetched");
            return Err(ScrapeError::no_data());
        }

        info!("Scrape stage: {}", ScrapeStage::Exporting);
        xlsx::save_schedule(&all_records, mode, &config.output_path())?;

        info!(
            "Scrape stage: {} ({} records saved to {})",
            ScrapeStage::Done,
            all_records.len(),
            config.output_filename
        );
        Ok(all_records.len())
    }

    /// Validates a raw request body, scrapes into a temporary directory and
    /// returns the spreadsheet bytes. The directory is removed on return.
    pub async fn export_schedule(&self, body: &[u8]) -> Result<Vec<u8>, ScrapeError> {
        let request = parse_request(body)?;

        let temp_dir = tempfile::Builder::new()
            .prefix("grafik-")
            .tempdir_in(&self.config.temp_root)
            .map_err(ScrapeError::unexpected)?;
        let config = ScheduleConfig::from_request(request, temp_dir.path());

        self.scrape_schedule(&config).await?;

        let output_path = config.output_path();
        if !output_path.exists() {
            error!("Expected output file missing: {}", output_path.display());
            return Err(ScrapeError::missing_output());
        }

        let bytes = tokio::fs::read(&output_path)
            .await
            .map_err(ScrapeError::unexpected)?;
        info!("Prepared spreadsheet download, size: {} bytes", bytes.len());
        Ok(bytes)
    }
}

/// Checks for every required field before deserializing, so the caller
/// learns about all missing fields at once.
pub fn parse_request(body: &[u8]) -> Result<ScheduleRequest, ScrapeError> {
    let value: Value = match serde_json::from_slice(body) {
        Ok(Value::Null) | Err(_) => return Err(ScrapeError::empty_body()),
        Ok(value) => value,
    };

    let Some(object) = value.as_object() else {
        return Err(ScrapeError::empty_body());
    };
    if object.is_empty() {
        return Err(ScrapeError::empty_body());
    }

    let missing: Vec<&str> = ScheduleRequest::REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !object.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        warn!("Rejecting request with missing fields: {:?}", missing);
        return Err(ScrapeError::missing_fields(&missing));
    }

    serde_json::from_value(value).map_err(ScrapeError::invalid_field)
}

// Route handlers
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn schedule_download(State(service): State<Arc<ScheduleService>>, body: Bytes) -> Response {
    info!("Received schedule download request");

    match service.export_schedule(&body).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", DOWNLOAD_FILENAME),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to export schedule: {}", e);
            e.into_response()
        }
    }
}

async fn program_title(
    State(service): State<Arc<ScheduleService>>,
    UrlPath(key): UrlPath<String>,
) -> Response {
    match service.titles.title(&service.config.titles_path, &key) {
        Some(title) => Json(json!({ "key": key, "title": title })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "title": "Nie znaleziono",
                "message": format!("Brak tytułu dla {}", key),
            })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_or_invalid_body_is_rejected() {
        for body in [&b""[..], b"null", b"not json", b"{}", b"[1,2]"] {
            let err = parse_request(body).unwrap_err();
            assert_eq!(err.message(), "Nie przesłano żadnych danych");
        }
    }

    #[test]
    fn reports_every_missing_field() {
        let err = parse_request(br#"{"username":"jan","endDate":"2025-01-10"}"#).unwrap_err();
        assert_eq!(err.title(), "Brak wymaganych pól");
        assert_eq!(
            err.message(),
            "Brakujące pola: password, startDate, isPersonal"
        );
    }

    #[test]
    fn wrong_types_are_validation_errors() {
        let body = br#"{"username":"jan","password":"x","startDate":"2025-01-01",
            "endDate":"2025-01-10","isPersonal":"tak"}"#;
        assert!(matches!(
            parse_request(body),
            Err(ScrapeError::Validation { .. })
        ));
    }

    #[test]
    fn accepts_complete_request() {
        let body = br#"{"username":"jan","password":"x","startDate":"2025-01-01",
            "endDate":"2025-01-10","isPersonal":true}"#;
        let request = parse_request(body).unwrap();
        assert_eq!(request.start_date, "2025-01-01");
        assert!(request.is_personal);
    }

    #[test]
    fn stages_render_progress() {
        assert_eq!(
            ScrapeStage::Fetching { week: 2, of: 5 }.to_string(),
            "fetching week 2/5"
        );
    }
}
