use chrono::NaiveDate;
use reqwest::Client;
use std::time::Duration;
use tracing::{error, info};

use crate::{error::ScrapeError, models::schedule::ScheduleMode};

pub const DEFAULT_BASE_URL: &str = "https://gpt.canalplus.pl";

/// Phrase the login page shows when the credentials are rejected.
pub const LOGIN_FAILURE_MARKER: &str = "Niepoprawny identyfikator lub hasło.";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoints and limits of the scheduling portal
#[derive(Clone, Debug)]
pub struct PortalConfig {
    pub login_url: String,
    pub general_schedule_url: String,
    pub personal_schedule_url: String,
    pub failure_marker: String,
    pub timeout: Duration,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }
}

impl PortalConfig {
    /// Same paths as the production portal, rooted at `base_url`.
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            login_url: format!("{base}/Account/Login"),
            general_schedule_url: format!("{base}/Schedule/Editing"),
            personal_schedule_url: format!("{base}/User/Schedule"),
            failure_marker: LOGIN_FAILURE_MARKER.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn schedule_url(&self, mode: ScheduleMode) -> &str {
        match mode {
            ScheduleMode::General => &self.general_schedule_url,
            ScheduleMode::Personal => &self.personal_schedule_url,
        }
    }
}

/// Builds a client with its own cookie jar, so every scrape gets a fresh session.
pub fn portal_client_init(config: &PortalConfig) -> Result<Client, ScrapeError> {
    info!("Initializing portal client");

    match Client::builder()
        .cookie_store(true)
        .timeout(config.timeout)
        .build()
    {
        Ok(client) => Ok(client),
        Err(e) => {
            error!("Failed to build portal client: {}", e);
            Err(ScrapeError::unexpected(e))
        }
    }
}

/// Posts the credentials; on success the session cookie stays in `client`.
pub async fn login(
    client: &Client,
    config: &PortalConfig,
    username: &str,
    password: &str,
) -> Result<(), ScrapeError> {
    info!("Logging in to portal as {}", username);

    let form = [("username", username), ("password", password)];

    let response = match client.post(&config.login_url).form(&form).send().await {
        Ok(resp) => {
            if !resp.status().is_success() {
                let status = resp.status();
                error!("Portal login returned error status {}", status);
                return Err(ScrapeError::login_failed(format!("status {}", status)));
            }
            resp
        }
        Err(e) => {
            error!("Failed to send login request: {}", e);
            return Err(ScrapeError::login_failed(e));
        }
    };

    let body = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to read login response body: {}", e);
            return Err(ScrapeError::login_failed(e));
        }
    };

    if body.contains(&config.failure_marker) {
        error!("Invalid credentials");
        return Err(ScrapeError::invalid_credentials());
    }

    info!("Login successful");
    Ok(())
}

/// Downloads the rendered schedule page for the week starting at `anchor`.
pub async fn fetch_week(
    client: &Client,
    config: &PortalConfig,
    anchor: NaiveDate,
    mode: ScheduleMode,
) -> Result<String, ScrapeError> {
    let week = utils::display_date(anchor);
    let url = format!(
        "{}?date={}",
        config.schedule_url(mode),
        utils::url_date(anchor)
    );
    info!("Fetching schedule page: {}", url);

    let response = match client.get(&url).send().await {
        Ok(resp) => {
            if !resp.status().is_success() {
                let status = resp.status();
                error!("Portal returned error status {} for week {}", status, week);
                return Err(ScrapeError::fetch_failed(&week, format!("status {}", status)));
            }
            resp
        }
        Err(e) => {
            error!("Error fetching schedule for week {}: {}", week, e);
            return Err(ScrapeError::fetch_failed(&week, e));
        }
    };

    match response.text().await {
        Ok(text) => {
            info!(
                "Received schedule page for week {}, length: {} chars",
                week,
                text.len()
            );
            Ok(text)
        }
        Err(e) => {
            error!("Failed to read schedule body for week {}: {}", week, e);
            Err(ScrapeError::fetch_failed(&week, e))
        }
    }
}

pub mod utils {
    use chrono::{Datelike, Days, NaiveDate};
    use tracing::info;

    use crate::error::ScrapeError;

    /// Parses the `YYYY-MM-DD` dates sent by the front-end.
    pub fn parse_iso_date(value: &str) -> Result<NaiveDate, ScrapeError> {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map_err(|_| ScrapeError::invalid_date(value))
    }

    /// `None` when that Monday falls before the earliest representable date.
    pub fn monday_of(date: NaiveDate) -> Option<NaiveDate> {
        date.checked_sub_days(Days::new(date.weekday().num_days_from_monday() as u64))
    }

    /// Mondays of every week touching the range, in ascending order.
    ///
    /// The bounds may be given in either order. Weeks whose Monday lies
    /// outside chrono's date range are left out.
    pub fn week_anchors(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let (start, end) = if end < start { (end, start) } else { (start, end) };

        let mut anchors = Vec::new();
        let mut next = monday_of(start);
        while let Some(current) = next.filter(|monday| *monday <= end) {
            anchors.push(current);
            next = current.checked_add_days(Days::new(7));
        }

        info!(
            "Range {} to {} spans {} week(s)",
            start,
            end,
            anchors.len()
        );
        anchors
    }

    /// `MM/DD/YYYY 00:00:00`, percent-encoded for the `date` query parameter.
    pub fn url_date(anchor: NaiveDate) -> String {
        anchor
            .format("%m%%2F%d%%2F%Y%%2000%%3A00%%3A00")
            .to_string()
    }

    pub fn display_date(date: NaiveDate) -> String {
        date.format("%d.%m.%Y").to_string()
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::Weekday;

        fn date(y: i32, m: u32, d: u32) -> NaiveDate {
            NaiveDate::from_ymd_opt(y, m, d).unwrap()
        }

        #[test]
        fn single_day_yields_its_monday() {
            // Wednesday
            let anchors = week_anchors(date(2025, 1, 1), date(2025, 1, 1));
            assert_eq!(anchors, vec![date(2024, 12, 30)]);

            let monday = date(2025, 1, 6);
            assert_eq!(week_anchors(monday, monday), vec![monday]);
        }

        #[test]
        fn reversed_bounds_are_normalized() {
            let forward = week_anchors(date(2025, 1, 3), date(2025, 1, 20));
            let backward = week_anchors(date(2025, 1, 20), date(2025, 1, 3));
            assert_eq!(forward, backward);
            assert_eq!(
                forward,
                vec![date(2024, 12, 30), date(2025, 1, 6), date(2025, 1, 13), date(2025, 1, 20)]
            );
        }

        #[test]
        fn anchors_are_sorted_unique_mondays() {
            let start = date(2024, 2, 1);
            for offset in 0..120 {
                let end = start + Days::new(offset);
                let anchors = week_anchors(start, end);
                assert!(!anchors.is_empty());
                assert!(anchors.windows(2).all(|w| w[0] < w[1]));
                assert!(anchors.iter().all(|a| a.weekday() == Weekday::Mon));
                assert!(anchors[0] <= start);
                assert!(*anchors.last().unwrap() <= end);
                assert!(*anchors.last().unwrap() + Days::new(6) >= end);
            }
        }

        #[test]
        fn range_at_calendar_limits_does_not_overflow() {
            let late = parse_iso_date("+262142-12-20").unwrap();
            let anchors = week_anchors(late, NaiveDate::MAX);
            assert!(!anchors.is_empty());
            assert!(anchors.iter().all(|a| a.weekday() == Weekday::Mon));
            assert!(anchors.windows(2).all(|w| w[0] < w[1]));

            assert_eq!(week_anchors(NaiveDate::MAX, NaiveDate::MAX).len(), 1);

            let earliest = week_anchors(NaiveDate::MIN, NaiveDate::MIN);
            assert!(earliest.len() <= 1);
            assert!(earliest.iter().all(|a| a.weekday() == Weekday::Mon));
        }

        #[test]
        fn url_date_is_percent_encoded() {
            assert_eq!(url_date(date(2025, 1, 6)), "01%2F06%2F2025%2000%3A00%3A00");
        }

        #[test]
        fn malformed_dates_are_parse_errors() {
            assert_eq!(parse_iso_date("2025-03-07").unwrap(), date(2025, 3, 7));
            assert!(matches!(
                parse_iso_date("07.03.2025"),
                Err(ScrapeError::Parse { .. })
            ));
            assert!(parse_iso_date("").is_err());
        }
    }
}
