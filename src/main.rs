//! Portfolio Worker - Backend service for the portfolio site
//!
//! Connects to NATS and serves contact-inbox and analytics requests
//! published by the site frontend and the admin dashboard.

mod auth;
mod cli;
mod config;
mod db;
mod handlers;
mod services;
mod types;

use anyhow::Result;
use clap::Parser;
use once_cell::sync::Lazy;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs directory - use LOGS_DIR env var or default to ./logs
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "./logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "worker.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,portfolio_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer()) // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .init();

    // Stamp process start so ping uptime covers initialization
    Lazy::force(&handlers::ping::START_TIME);

    let args = cli::Cli::parse();

    match args.command {
        Some(cli::Command::Migrate) => run_migrate().await,
        Some(cli::Command::CreateAdmin { email, name }) => run_create_admin(&email, &name).await,
        Some(cli::Command::Serve) | None => run_serve().await,
    }
}

async fn run_serve() -> Result<()> {
    info!("Starting Portfolio Worker...");

    let config = config::Config::from_env()?;
    info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    db::run_migrations(&pool).await?;
    info!("Database migrations complete");

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match (std::env::var("NATS_USER"), std::env::var("NATS_PASSWORD")) {
        (Ok(user), Ok(password)) if !user.is_empty() => {
            async_nats::ConnectOptions::new()
                .user_and_password(user, password)
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    if let Err(e) = handlers::start_handlers(nats_client, pool, &config).await {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}

async fn run_migrate() -> Result<()> {
    let config = config::Config::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database migrations complete");
    Ok(())
}

async fn run_create_admin(email: &str, name: &str) -> Result<()> {
    let config = config::Config::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let password = rpassword::prompt_password("Password for the admin operator: ")?;
    if password.len() < 8 {
        anyhow::bail!("Password must be at least 8 characters");
    }
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }

    let hash = auth::hash_password(&password)?;
    let operator = db::queries::operator::upsert_admin(&pool, email, name, &hash).await?;
    info!("Admin operator ready: {} ({})", operator.email, operator.id);
    println!("Admin operator ready: {}", operator.email);

    Ok(())
}
