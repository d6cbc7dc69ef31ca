use clap::Parser;
use quillnest::cli::{Args, build_config, init_logging, load_token_key, open_database};
use quillnest::{init_cleanup, run_server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(token_key) = load_token_key(args.token_key_file.as_deref()) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let config = build_config(
        db,
        token_key,
        args.access_token_duration,
        args.refresh_token_duration,
        args.no_signup,
        args.client_ip_header,
    );

    init_cleanup(&config.db).await;

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap_or_else(|e| {
        error!(error = %e, "Failed to get local address");
        std::process::exit(1);
    });

    info!(address = %local_addr, "Listening");
    if let Some(header) = config.ip_extractor {
        info!(header = header.header_name(), "Reading client IP from proxy header");
    }

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
