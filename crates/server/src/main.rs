use std::io::Write;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qbfleet_core::{load_config, validate_config, CategoryReconciler, Config, InstanceRegistry};
use qbfleet_server::api::create_router;
use qbfleet_server::cli::{self, Cli, Command};
use qbfleet_server::output;
use qbfleet_server::state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cli: &Cli) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.command.default_log_filter().into());
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so listings on stdout stay clean.
    if cli.log_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    info!("Loading configuration from {:?}", cli.config);
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

    validate_config(&config).context("Configuration validation failed")?;
    info!(endpoints = config.endpoints.len(), "Configuration loaded successfully");

    let registry = Arc::new(InstanceRegistry::new(config.endpoints.clone()));

    if cli.command == Command::Serve {
        serve(config, registry).await?;
        return Ok(ExitCode::SUCCESS);
    }

    // Ctrl+C cancels in-flight queries; partial results are still printed.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let reconciler = CategoryReconciler::new(Arc::clone(&registry));
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let failures = match cli.command {
        Command::List => cli::list(&registry, &mut out, cli.output, &cancel).await?,
        Command::Abandoned => cli::abandoned(&registry, &mut out, cli.output, &cancel).await?,
        Command::Categories => {
            cli::categories(&reconciler, &mut out, cli.output, &cancel).await?
        }
        Command::SyncCategories => {
            cli::sync_categories(&reconciler, &mut out, cli.output, &cancel).await?
        }
        Command::Serve => Vec::new(),
    };
    out.flush().context("Failed to flush output")?;

    if failures.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        output::write_failures(&mut std::io::stderr(), &failures)
            .context("Failed to write errors")?;
        Ok(ExitCode::FAILURE)
    }
}

async fn serve(config: Config, registry: Arc<InstanceRegistry>) -> Result<()> {
    // Connect up front so the first request does not pay for it.
    let live = registry.len().await;
    info!(instances = live, "Instance registry ready");

    let state = Arc::new(AppState::new(config.clone(), registry));

    if config.liveness.enabled {
        state.liveness().start();
    } else {
        info!("Liveness probe disabled in config");
    }

    // Create router
    let app = create_router(Arc::clone(&state));

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    if state.liveness().is_running() {
        state.liveness().stop();
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
}
