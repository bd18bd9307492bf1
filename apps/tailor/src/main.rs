mod cli;
mod config;
mod document;
mod errors;
mod llm_client;
mod routes;
mod state;
mod tailoring;

use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::llm_client::HttpGeneratorFactory;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first; malformed values stop startup
    let config = Config::from_env()?;

    // Initialize structured logging
    let level = if cli.verbose { "debug" } else { config.log_level.as_str() };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), level))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => serve(config, port).await,
        Commands::Tailor(args) => {
            let generators = HttpGeneratorFactory::new(config.providers.clone());
            cli::run_tailor(&args, &config, &generators).await.map(|_| ())
        }
        Commands::CheckParser { resume } => cli::run_check_parser(&resume, &config).map(|_| ()),
        Commands::CheckLlm { model } => {
            let generators = HttpGeneratorFactory::new(config.providers.clone());
            cli::run_check_llm(model.as_deref(), &config, &generators).await
        }
    }
}

async fn serve(config: Config, port: Option<u16>) -> Result<()> {
    info!("Starting resume tailor v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Default model: {} ({:?})",
        config.default_model, config.providers
    );

    let port = port.unwrap_or(config.port);
    let state = AppState::new(config);

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
