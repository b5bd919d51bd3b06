mod scheduler;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use checkin_api::config::env_opt;
use checkin_api::{AppConfig, AppStateInner};
use checkin_line::LineClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "checkin=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = env_opt("CHECKIN_DB_PATH").unwrap_or_else(|| "checkin.db".into());
    let host = env_opt("CHECKIN_HOST").unwrap_or_else(|| "0.0.0.0".into());
    let port: u16 = env_opt("CHECKIN_PORT")
        .or_else(|| env_opt("PORT"))
        .unwrap_or_else(|| "5000".into())
        .parse()?;
    let reminders_enabled = env_opt("CHECKIN_REMINDERS").is_none_or(|v| v != "off");

    let token = env_opt("MESSAGING_CHANNEL_ACCESS_TOKEN");
    if token.is_none() {
        warn!("MESSAGING_CHANNEL_ACCESS_TOKEN is not set, LINE messages will not be sent");
    }
    let config = AppConfig::from_env()?;
    if config.channel_secret.is_none() {
        warn!("MESSAGING_CHANNEL_SECRET is not set, webhook signatures are not checked");
    }

    // Init database
    let db = checkin_db::Database::open(&PathBuf::from(&db_path))?;
    let messenger = Arc::new(LineClient::new(token)?);
    let state = AppStateInner::new(db, messenger, config);

    if reminders_enabled {
        tokio::spawn(scheduler::run_reminder_loop(state.clone()));
    } else {
        info!("Reminder scheduler disabled");
    }

    let app = checkin_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Check-in server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Check-in server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
