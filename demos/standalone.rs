use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use grafik_scraper::{ScheduleService, ServiceConfig, TitleCache};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Grafik Scraper service example");

    let config = ServiceConfig::from_env()?;
    let port = config.port;

    let schedule_service = ScheduleService::new(config, Arc::new(TitleCache::new()));

    let app = Router::new()
        .nest("/api", schedule_service.router())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

/*
Example usage of the service:

1. POST /api/schedule
   - Body: {"username", "password", "startDate", "endDate", "isPersonal"}
   - Returns grafik.xlsx, or {"title", "message"} on failure

2. GET /api/health
   - Liveness check

3. GET /api/titles/{key}
   - Looks up a program title in GRAFIK_TITLES_CSV
*/
