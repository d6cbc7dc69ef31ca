//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::IpExtractor;
use crate::db::Database;
use crate::rate_limit::RateLimitConfig;
use crate::token::KEY_SIZE;
use chrono::Duration;
use clap::Parser;
use tracing::{error, info};

const TOKEN_KEY_ENV: &str = "TOKEN_SYMMETRIC_KEY";

/// Longest accepted token lifetime, in days.
const MAX_DURATION_DAYS: i64 = 3650;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "Quillnest",
    about = "Blogging backend with token authentication"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7291")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "quillnest.db")]
    pub database: String,

    /// Path to file containing the 32 byte token key. Prefer using TOKEN_SYMMETRIC_KEY env var instead
    #[arg(long)]
    pub token_key_file: Option<String>,

    /// Lifetime of access tokens (e.g. 90s, 15m, 2h, 1d)
    #[arg(long, env = "ACCESS_TOKEN_DURATION", default_value = "15m", value_parser = parse_duration)]
    pub access_token_duration: Duration,

    /// Lifetime of refresh tokens and their sessions
    #[arg(long, env = "REFRESH_TOKEN_DURATION", default_value = "24h", value_parser = parse_duration)]
    pub refresh_token_duration: Duration,

    /// Disable new user signups
    #[arg(long)]
    pub no_signup: bool,

    /// Read the client IP from this header. Only set this behind a reverse proxy that overwrites it
    #[arg(long, env = "CLIENT_IP_HEADER")]
    pub client_ip_header: Option<IpExtractor>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Parse a positive duration with an `s`, `m`, `h` or `d` suffix.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let Some(unit) = s.chars().last() else {
        return Err("Duration cannot be empty".to_string());
    };

    let value: i64 = s[..s.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| format!("Invalid duration: {}", s))?;
    if value <= 0 {
        return Err(format!("Duration must be positive: {}", s));
    }

    let duration = match unit {
        's' => Duration::try_seconds(value),
        'm' => Duration::try_minutes(value),
        'h' => Duration::try_hours(value),
        'd' => Duration::try_days(value),
        _ => {
            return Err(format!(
                "Duration must end with s, m, h or d: {}",
                s
            ));
        }
    };

    match duration {
        Some(duration) if duration <= Duration::days(MAX_DURATION_DAYS) => Ok(duration),
        _ => Err(format!(
            "Duration is too large (max {}d): {}",
            MAX_DURATION_DAYS, s
        )),
    }
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load the token key from environment variable or file.
/// Returns None and logs an error if the key cannot be loaded.
pub fn load_token_key(token_key_file: Option<&str>) -> Option<Vec<u8>> {
    let key = if let Ok(key) = std::env::var(TOKEN_KEY_ENV) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(TOKEN_KEY_ENV) };
        key
    } else if let Some(path) = token_key_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read token key file");
                return None;
            }
        }
    } else {
        error!(
            "Token key is required. Set TOKEN_SYMMETRIC_KEY environment variable (recommended) or use --token-key-file"
        );
        return None;
    };

    if key.len() != KEY_SIZE {
        error!(
            length = key.len(),
            "Token key must be exactly {} bytes", KEY_SIZE
        );
        return None;
    }

    Some(key.into_bytes())
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    db: Database,
    token_key: Vec<u8>,
    access_token_duration: Duration,
    refresh_token_duration: Duration,
    no_signup: bool,
    ip_extractor: Option<IpExtractor>,
) -> ServerConfig {
    ServerConfig {
        db,
        token_key,
        access_token_duration,
        refresh_token_duration,
        no_signup,
        rate_limits: RateLimitConfig::new(),
        ip_extractor,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
