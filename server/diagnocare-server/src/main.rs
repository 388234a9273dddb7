use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use database_layer::DatabasePool;
use diagnocare_server::{
    config::AppConfig, create_app, openapi, storage::uploader_from_config, DiagnoCareServer,
};
use logger_redacted::{init_tracing, mask_email, LogFormat, LoggerConfig};
use std::net::SocketAddr;
use tracing::{info, warn};

/// DiagnoCare HTTP server
#[derive(Parser, Debug)]
#[command(name = "diagnocare-server")]
#[command(about = "Diagnostic appointment booking HTTP API server")]
struct Args {
    /// Server bind address, overrides `server.host`
    #[arg(long, env = "DIAGNOCARE_HOST")]
    host: Option<String>,

    /// Server port, overrides `server.port`
    #[arg(short, long, env = "DIAGNOCARE_PORT")]
    port: Option<u16>,

    /// Configuration file path, extension optional
    #[arg(short, long, default_value = "config/diagnocare")]
    config: String,

    /// Log output: auto, pretty or json
    #[arg(long, default_value = "auto")]
    log_format: LogFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Apply database migrations before serving
    #[arg(long)]
    migrate: bool,

    /// Run without PostgreSQL; all data is lost on exit
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    init_tracing(&LoggerConfig {
        format: args.log_format,
        verbose: args.verbose,
        ..LoggerConfig::default()
    })
    .map_err(anyhow::Error::msg)?;

    let mut config = AppConfig::load(&args.config)?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;
    if config.auth.jwt_secret == auth_identity::IdentityConfig::default().jwt_secret {
        warn!("{}", "Using the default JWT secret; set DIAGNOCARE__AUTH__JWT_SECRET".yellow());
    }

    info!("{}", "Starting DiagnoCare server".bright_cyan());
    info!("Version: {}", env!("CARGO_PKG_VERSION").bright_white());

    let sender = email_service::sender_from_config(&config.email_config())
        .context("building email sender")?;
    let uploader = uploader_from_config(&config.storage)
        .await
        .context("building report storage")?;

    let server = if args.in_memory {
        warn!("{}", "In-memory mode: data is not persisted".yellow());
        DiagnoCareServer::in_memory(sender, uploader, config.auth.clone())
    } else {
        let database = DatabasePool::connect(&config.database)
            .await
            .context("connecting to PostgreSQL")?;
        if args.migrate {
            database.run_migrations().await.context("running migrations")?;
        }
        DiagnoCareServer::with_database(database, sender, uploader, config.auth.clone())
    };

    bootstrap_admin(&server, &config).await?;

    let app = create_app(server.clone(), &config);
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.server.host, config.server.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!("{}", format!("DiagnoCare server running on http://{addr}").bright_green());
    info!("{}", format!("Health check: http://{addr}/health").bright_blue());
    info!("{}", format!("API v1: http://{addr}/api/v1").bright_blue());
    info!(
        "{}",
        format!("API docs: http://{addr}{}", openapi::SWAGGER_UI_PATH).bright_blue()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    if let Some(database) = &server.database {
        database.close().await;
    }
    info!("Server stopped");
    Ok(())
}

/// Create the configured admin account on first start
async fn bootstrap_admin(server: &DiagnoCareServer, config: &AppConfig) -> anyhow::Result<()> {
    let bootstrap = &config.bootstrap;
    let (Some(email), Some(password)) = (&bootstrap.admin_email, &bootstrap.admin_password) else {
        return Ok(());
    };
    let name = bootstrap.admin_name.as_deref().unwrap_or("Administrator");
    let admin_id = server
        .identity
        .ensure_admin(name, email, password)
        .await
        .context("creating bootstrap admin")?;
    info!(%admin_id, email = %mask_email(email), "Bootstrap admin available");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
