use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::error;

/// Who is to blame for a failed request, used to pick the response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Client,
    Server,
    Unexpected,
}

/// Why logging in to the portal failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailure {
    InvalidCredentials,
    /// Portal unreachable, timed out or answered with an error status.
    Transport,
}

/// Why the spreadsheet could not be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFailure {
    /// Target is read-only or locked by another program.
    PermissionDenied,
    Unknown,
}

/// Every failure the scrape pipeline can report to a user.
///
/// Each variant carries the title/message pair shown in the front-end.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("{title}: {message}")]
    Validation { title: String, message: String },

    #[error("{title}: {message}")]
    Parse { title: String, message: String },

    #[error("{title}: {message}")]
    Login {
        kind: LoginFailure,
        title: String,
        message: String,
    },

    #[error("{title}: {message}")]
    Fetch { title: String, message: String },

    #[error("{title}: {message}")]
    NoData { title: String, message: String },

    #[error("{title}: {message}")]
    Write {
        kind: WriteFailure,
        title: String,
        message: String,
    },

    #[error("{title}: {message}")]
    Unexpected { title: String, message: String },
}

impl ScrapeError {
    pub fn empty_body() -> Self {
        ScrapeError::Validation {
            title: "Błąd danych".to_string(),
            message: "Nie przesłano żadnych danych".to_string(),
        }
    }

    pub fn missing_fields(fields: &[&str]) -> Self {
        ScrapeError::Validation {
            title: "Brak wymaganych pól".to_string(),
            message: format!("Brakujące pola: {}", fields.join(", ")),
        }
    }

    pub fn invalid_field(detail: impl std::fmt::Display) -> Self {
        ScrapeError::Validation {
            title: "Błąd danych".to_string(),
            message: format!("Niepoprawne dane: {}", detail),
        }
    }

    pub fn invalid_date(value: &str) -> Self {
        ScrapeError::Parse {
            title: "Błąd danych".to_string(),
            message: format!("Niepoprawny format daty: {}", value),
        }
    }

    pub fn invalid_credentials() -> Self {
        ScrapeError::Login {
            kind: LoginFailure::InvalidCredentials,
            title: "Błąd uwierzytelniania".to_string(),
            message: "Niepoprawny identyfikator lub hasło.".to_string(),
        }
    }

    pub fn login_failed(detail: impl std::fmt::Display) -> Self {
        ScrapeError::Login {
            kind: LoginFailure::Transport,
            title: "Błąd uwierzytelniania".to_string(),
            message: format!("Nie udało się zalogować do portalu: {}", detail),
        }
    }

    pub fn fetch_failed(week: &str, detail: impl std::fmt::Display) -> Self {
        ScrapeError::Fetch {
            title: "Błąd pobierania grafiku".to_string(),
            message: format!("Nie udało się pobrać grafiku dla tygodnia {}: {}", week, detail),
        }
    }

    pub fn no_data() -> Self {
        ScrapeError::NoData {
            title: "Błąd pobierania grafiku".to_string(),
            message: "Z jakiegoś powodu nie udało się pobrać planu. :(".to_string(),
        }
    }

    pub fn write_denied(path: &Path) -> Self {
        ScrapeError::Write {
            kind: WriteFailure::PermissionDenied,
            title: "Błąd w dostępie do pliku!".to_string(),
            message: format!(
                "Brak uprawnień do zapisu pliku: \nSprawdź, czy {} nie jest otwarty w innym \
                 programie.",
                path.display()
            ),
        }
    }

    pub fn write_unknown() -> Self {
        ScrapeError::Write {
            kind: WriteFailure::Unknown,
            title: "Nieznany błąd zapisu pliku!".to_string(),
            message: "Coś poszło nie tak podczas zapisu pliku. Spróbuj ponownie.".to_string(),
        }
    }

    pub fn missing_output() -> Self {
        ScrapeError::Write {
            kind: WriteFailure::Unknown,
            title: "Błąd generowania pliku".to_string(),
            message: "Nie udało się wygenerować pliku grafiku".to_string(),
        }
    }

    /// Logs the full detail and hides it from the caller.
    pub fn unexpected(detail: impl std::fmt::Display) -> Self {
        error!("Unexpected error: {}", detail);
        ScrapeError::Unexpected {
            title: "Nieoczekiwany błąd".to_string(),
            message: "Wystąpił nieoczekiwany błąd. Spróbuj ponownie później.".to_string(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ScrapeError::Validation { title, .. }
            | ScrapeError::Parse { title, .. }
            | ScrapeError::Login { title, .. }
            | ScrapeError::Fetch { title, .. }
            | ScrapeError::NoData { title, .. }
            | ScrapeError::Write { title, .. }
            | ScrapeError::Unexpected { title, .. } => title,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ScrapeError::Validation { message, .. }
            | ScrapeError::Parse { message, .. }
            | ScrapeError::Login { message, .. }
            | ScrapeError::Fetch { message, .. }
            | ScrapeError::NoData { message, .. }
            | ScrapeError::Write { message, .. }
            | ScrapeError::Unexpected { message, .. } => message,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ScrapeError::Validation { .. }
            | ScrapeError::Parse { .. }
            | ScrapeError::Login {
                kind: LoginFailure::InvalidCredentials,
                ..
            } => ErrorClass::Client,
            ScrapeError::Login {
                kind: LoginFailure::Transport,
                ..
            }
            | ScrapeError::Fetch { .. }
            | ScrapeError::NoData { .. }
            | ScrapeError::Write { .. } => ErrorClass::Server,
            ScrapeError::Unexpected { .. } => ErrorClass::Unexpected,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.class() {
            ErrorClass::Client => StatusCode::BAD_REQUEST,
            ErrorClass::Server | ErrorClass::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON shape of every failed response.
#[derive(Serialize, Debug)]
pub struct ErrorBody<'a> {
    pub title: &'a str,
    pub message: &'a str,
}

impl IntoResponse for ScrapeError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            title: self.title(),
            message: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}
