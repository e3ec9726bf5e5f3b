//! Grafik Scraper Library
//!
//! This library logs into the scheduling portal, scrapes weekly schedule
//! pages into shift records, and exports them as an `.xlsx` spreadsheet.

pub mod error;
pub mod helpers;
pub mod models;
pub mod service;

pub use error::{ErrorClass, LoginFailure, ScrapeError, WriteFailure};
pub use service::{ScheduleService, ServiceConfig};

// Re-export key types for convenience
pub use helpers::portal::PortalConfig;
pub use helpers::titles::TitleCache;
pub use models::schedule::{ScheduleConfig, ScheduleMode, ScheduleRequest, ShiftRecord};
