use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use torgate::auth::{CredentialStore, TokenService};
use torgate::cli::{self, Cli, Commands};
use torgate::config::{self, Config};
use torgate::ip;
use torgate::sources::SourceAggregator;
use torgate::store::memory::MemoryStore;
use torgate::store::postgres::PgStore;
use torgate::store::ExclusionStore;
use torgate::telemetry::LogSettings;
use torgate::{api, telemetry, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // loads .env first so RUST_LOG and the other logging variables can live there
    telemetry::init(&LogSettings::from_env())?;

    let args = Cli::parse();
    let cfg = config::load()?;

    let result = match args.command {
        Some(Commands::Serve { port, in_memory }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port, in_memory).await
        }
        Some(Commands::Exclusions { command }) => {
            let db = PgStore::connect(&cfg.database).await?;
            db.migrate().await?;
            handle_exclusion_command(&db, command).await
        }
        Some(Commands::Token { command }) => handle_token_command(&cfg, command),
        Some(Commands::Sources { command }) => handle_source_command(&cfg, command).await,
        None => {
            let port = cfg.port;
            run_server(cfg, port, false).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    telemetry::shutdown();
    result
}

async fn run_server(cfg: Config, port: u16, in_memory: bool) -> anyhow::Result<()> {
    let store: Arc<dyn ExclusionStore> = if in_memory {
        tracing::warn!("Using in-memory exclusion list; contents are lost on restart");
        Arc::new(MemoryStore::new())
    } else {
        tracing::info!("Connecting to database...");
        let db = PgStore::connect(&cfg.database).await?;

        tracing::info!("Running migrations...");
        db.migrate().await?;
        Arc::new(db)
    };

    let sources = SourceAggregator::new(cfg.sources.clone(), cfg.fetch_timeout)?;
    tracing::info!(
        sources = sources.sources().len(),
        timeout_secs = cfg.fetch_timeout.as_secs(),
        users = cfg.credentials.len(),
        "Configuration loaded"
    );

    let state = Arc::new(AppState {
        store,
        tokens: TokenService::new(&cfg.jwt_secret),
        credentials: Arc::new(cfg.credentials),
        sources,
    });

    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("torgate listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("torgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

async fn handle_exclusion_command(
    db: &PgStore,
    cmd: cli::ExclusionCommands,
) -> anyhow::Result<()> {
    match cmd {
        cli::ExclusionCommands::Add { ips } => {
            for raw in ips {
                let Some(canonical) = ip::canonicalize(&raw) else {
                    println!("{:<40} invalid IP address", raw);
                    continue;
                };
                match db.insert(&canonical).await {
                    Ok(()) => println!("{:<40} added", canonical),
                    Err(e) => println!("{:<40} {}", canonical, e),
                }
            }
        }
        cli::ExclusionCommands::List => {
            let rows = db.entries().await?;
            if rows.is_empty() {
                println!("No excluded IPs.");
                return Ok(());
            }

            println!("{:<40} ADDED", "IP");
            for r in rows {
                println!("{:<40} {}", r.ip, r.created_at.format("%Y-%m-%d %H:%M:%S"));
            }
        }
        cli::ExclusionCommands::Remove { ip: raw } => {
            let key = ip::canonicalize(&raw).unwrap_or(raw);
            db.delete(&key)
                .await
                .with_context(|| format!("could not remove {}", key))?;
            println!("Removed {}.", key);
        }
    }
    Ok(())
}

fn handle_token_command(cfg: &Config, cmd: cli::TokenCommands) -> anyhow::Result<()> {
    match cmd {
        cli::TokenCommands::Issue { username, password } => {
            let tokens = TokenService::new(&cfg.jwt_secret);
            let credentials: &dyn CredentialStore = &cfg.credentials;
            let token = tokens
                .issue(credentials, &username, &password)
                .context("could not issue token")?;
            println!("Token issued for {} (valid 1h):", username);
            println!("  Authorization: Bearer {}", token);
        }
    }
    Ok(())
}

async fn handle_source_command(cfg: &Config, cmd: cli::SourceCommands) -> anyhow::Result<()> {
    match cmd {
        cli::SourceCommands::Fetch => {
            let aggregator = SourceAggregator::new(cfg.sources.clone(), cfg.fetch_timeout)?;
            let reports = aggregator.fetch_each().await;

            let mut all = std::collections::BTreeSet::new();
            for report in reports {
                match report.result {
                    Ok(ips) => {
                        println!("{:<60} {} IPs", report.url, ips.len());
                        all.extend(ips);
                    }
                    Err(e) => println!("{:<60} FAILED: {}", report.url, e),
                }
            }

            println!();
            for ip in &all {
                println!("{}", ip);
            }
            println!("{} unique IPs", all.len());
        }
    }
    Ok(())
}
