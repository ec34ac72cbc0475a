//! Context server - visitor context resolution for personalized web pages
//!
//! Serves `/context.js`, which resolves the visiting profile (or an
//! impersonated persona), bootstraps sessions and evaluates caller filters.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use context_server::{
    api::build_app,
    condition::BuiltinEvaluator,
    config::ContextServerConfig,
    context::{ContextPipeline, ContextState, ResponseAssembler},
    events::{EventLog, EventService, EventsState, TracingListener},
    identity::{IdentityState, IdentityStore, MemoryIdentityStore},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "context-server")]
#[command(version)]
#[command(about = "Visitor context resolution server")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CONTEXT_SERVER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Keep identities in memory only
        #[arg(long)]
        no_persist: bool,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("context_server={},tower_http=debug", log_level).into());
    tracing_subscriber::registry()
        .with(filter)
        .with(cli.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!cli.log_json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    // Load configuration
    let config = match &cli.config {
        Some(path) => ContextServerConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ContextServerConfig::default(),
    };

    match cli.command {
        Commands::Serve {
            host,
            port,
            no_persist,
        } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if no_persist {
                config.storage.persist = false;
            }
            run_server(config).await?;
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

async fn run_server(config: ContextServerConfig) -> Result<()> {
    tracing::info!("Starting context server");

    let store = if config.storage.persist {
        MemoryIdentityStore::with_snapshots(config.storage.base_dir.clone())
            .await
            .with_context(|| format!("opening store at {}", config.storage.base_dir.display()))?
    } else {
        tracing::info!("Persistence disabled, identities are kept in memory only");
        MemoryIdentityStore::new()
    };
    let store: Arc<dyn IdentityStore> = Arc::new(store);

    let event_log = Arc::new(EventLog::new(config.events.log_capacity));
    let events = EventService::new(config.events.bus_capacity);
    events.register(event_log.clone()).await;
    events.register(Arc::new(TracingListener)).await;
    tracing::info!(listeners = events.listener_count().await, "Event dispatch ready");

    let pipeline = ContextPipeline::new(
        store.clone(),
        Arc::new(events),
        Arc::new(BuiltinEvaluator::new()),
    );
    let assembler = ResponseAssembler::from_config(&config.scripts)?;

    let app = build_app(
        ContextState {
            pipeline: Arc::new(pipeline),
            assembler: Arc::new(assembler),
            cookies: Arc::new(config.cookies.clone()),
        },
        IdentityState { store },
        EventsState { log: event_log },
        &config.server.cors_origins,
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!("Context server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Context server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received terminate signal, shutting down"),
    }
}

fn show_config(config: Option<&ContextServerConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    println!("{}", config.to_toml()?);
    Ok(())
}
