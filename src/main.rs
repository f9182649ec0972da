mod routes;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use rag::{Config as RagConfig, Service, StoreBackend};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Befiler tax assistant: answers tax questions from a curated knowledge base.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Address to listen on (overrides BIND_ADDR).
    #[arg(long)]
    bind: Option<String>,

    /// Keep knowledge in process memory instead of Qdrant.
    #[arg(long)]
    memory_store: bool,

    /// Skip loading the built-in tax knowledge at startup.
    #[arg(long)]
    no_seed: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "befiler_assistant=debug,rag=debug,tower_http=debug"
    } else {
        "befiler_assistant=info,rag=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = format!("{err:#}"), "assistant stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut cfg = RagConfig::from_env()?;
    if let Some(bind) = cli.bind {
        cfg.bind_addr = bind;
    }
    if cli.memory_store {
        cfg.store = StoreBackend::Memory;
    }
    if cli.no_seed {
        cfg.seed_knowledge = false;
    }

    let service = Service::from_config(&cfg)?;
    tracing::info!(
        store = ?cfg.store,
        chat_model = %cfg.chat_model,
        embed_model = %cfg.embed_model,
        top_k = cfg.top_k,
        "starting tax assistant"
    );
    service.seed(&cfg).await.context("failed to load tax knowledge")?;

    let listener = TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr))?;
    tracing::info!("listening on {}", cfg.bind_addr);

    axum::serve(listener, routes::router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
