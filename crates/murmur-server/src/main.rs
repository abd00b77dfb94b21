use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use murmur_api::{AppState, AppStateInner, ContentLimits};
use murmur_db::Database;
use murmur_mailer::{HttpMailer, Mailer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("MURMUR_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("MURMUR_DB_PATH").unwrap_or_else(|_| "murmur.db".into());
    let host = std::env::var("MURMUR_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("MURMUR_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let content_limits = ContentLimits {
        min: env_usize("MURMUR_MESSAGE_MIN_LEN", 10)?,
        max: env_usize("MURMUR_MESSAGE_MAX_LEN", 300)?,
    };
    anyhow::ensure!(
        content_limits.min <= content_limits.max,
        "MURMUR_MESSAGE_MIN_LEN exceeds MURMUR_MESSAGE_MAX_LEN"
    );

    // Init database (the single shared handle, opened exactly once)
    let db = Database::open(&PathBuf::from(&db_path))?;

    // Mailer: HTTP dispatch with an API key, log-only without one
    let mailer = match std::env::var("MURMUR_MAIL_API_KEY") {
        Ok(api_key) if !api_key.is_empty() => {
            let api_url = std::env::var("MURMUR_MAIL_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com/emails".into());
            let from = std::env::var("MURMUR_MAIL_FROM")
                .unwrap_or_else(|_| "Murmur <onboarding@resend.dev>".into());
            Mailer::Http(HttpMailer::new(api_url, api_key, from))
        }
        _ => {
            warn!("MURMUR_MAIL_API_KEY not set; verification codes will be logged, not emailed");
            Mailer::Log
        }
    };

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        mailer,
        jwt_secret,
        content_limits,
    });

    let app = murmur_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Murmur server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn env_usize(name: &str, default: usize) -> anyhow::Result<usize> {
    match std::env::var(name) {
        Ok(v) => Ok(v.parse()?),
        Err(_) => Ok(default),
    }
}
