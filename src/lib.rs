pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod password;
pub mod rate_limit;
pub mod token;

use api::create_api_router;
use auth::IpExtractor;
use axum::Router;
use chrono::Duration;
use db::Database;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use token::{Authenticator, PasetoAuthenticator, TokenError};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Symmetric key for sealing tokens, exactly 32 bytes
    pub token_key: Vec<u8>,
    /// Lifetime of access tokens
    pub access_token_duration: Duration,
    /// Lifetime of refresh tokens and the sessions that track them
    pub refresh_token_duration: Duration,
    /// Whether new user signups are disabled
    pub no_signup: bool,
    /// Per-IP limits for login and signup
    pub rate_limits: RateLimitConfig,
    /// Header set by a trusted reverse proxy. None uses the peer address
    /// and ignores proxy headers.
    pub ip_extractor: Option<IpExtractor>,
}

/// Create the application router with the given configuration.
/// Fails if the token key has the wrong size.
pub fn create_app(config: &ServerConfig) -> Result<Router, TokenError> {
    let authenticator: Arc<dyn Authenticator> =
        Arc::new(PasetoAuthenticator::new(&config.token_key)?);

    let api_router = create_api_router(
        config.db.clone(),
        authenticator,
        config.access_token_duration,
        config.refresh_token_duration,
        config.no_signup,
        Arc::new(config.rate_limits.clone().with_ip_extractor(config.ip_extractor)),
        config.ip_extractor,
    );

    Ok(Router::new()
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http()))
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    // Run cleanup tasks on startup
    init_cleanup(&config.db).await;

    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
