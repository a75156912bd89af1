//! mailstep callback server and CLI entry point.
//!
//! Binary name: `mailstep`
//!
//! Loads `.env` and the TOML config, installs tracing, then either serves
//! orchestrator callbacks or runs a one-shot credential check.

mod cli;
mod http;
mod service;
mod state;

use std::path::Path;

use clap::Parser;

use mailstep_core::credential::CredentialCache;
use mailstep_infra::config::{check_required, load_with_env};
use mailstep_infra::mail::OAuthTokenExchanger;
use mailstep_observe::tracing_setup::{init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal in production
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let directives = cli.log_directives();

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            otel,
        } => {
            init_tracing(otel, directives)?;
            let result = serve(&config, host, port).await;
            shutdown_tracing();
            result
        }
        Commands::Check { config } => {
            init_tracing(false, directives)?;
            check(&config).await
        }
    }
}

async fn serve(config_path: &Path, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = load_with_env(config_path).await?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let state = AppState::build(&config)?;
    let router = http::router::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "mailstep listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// Exchange client credentials once and report the result.
async fn check(config_path: &Path) -> anyhow::Result<()> {
    let config = load_with_env(config_path).await?;
    check_required(&config)?;

    let credentials = CredentialCache::new(
        OAuthTokenExchanger::from_config(&config.mail)?,
        config.credentials.refresh_margin(),
    );
    match credentials.status().await {
        Ok(status) => {
            println!(
                "credentials ok: {} token, expires in {}s",
                status.token_type,
                status.expires_in.as_secs()
            );
            Ok(())
        }
        Err(err) => anyhow::bail!("credential exchange failed: {err}"),
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
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

    tracing::info!("shutdown signal received");
}
