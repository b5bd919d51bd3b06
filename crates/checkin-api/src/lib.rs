pub mod admin;
pub mod checkin;
pub mod commands;
pub mod config;
pub mod error;
pub mod export;
pub mod group;
pub mod history;
pub mod notify;
pub mod reminders;
pub mod state;
pub mod vocabulary;
pub mod webhook;

pub use config::AppConfig;
pub use error::ApiError;
pub use state::{AppState, AppStateInner};

use axum::{
    Router,
    routing::{get, post},
};

/// All HTTP routes. Layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/checkin", post(checkin::checkin))
        .route("/api/checkin/status", get(checkin::status))
        .route("/webhook", post(webhook::webhook))
        .route("/api/group/messages", get(group::messages))
        .route("/api/group/send", post(group::send))
        .route("/api/history", get(history::history))
        .route("/api/statistics", get(history::statistics))
        .route(
            "/api/reminder/settings",
            get(reminders::get_settings).post(reminders::update_settings),
        )
        .route("/api/reminder/test", post(reminders::test_reminder))
        .route("/api/vocabulary/today", get(vocabulary::today))
        .route("/export/checkin-records", get(export::checkin_records))
        .route("/api/admin/system-info", get(admin::system_info))
        .route("/api/admin/broadcast", post(admin::broadcast))
        .route("/api/admin/rich-menu", post(admin::rich_menu))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
