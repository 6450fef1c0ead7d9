use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;

use scripnav::api::ApiClient;
use scripnav::config::ApiConfig;
use scripnav::server::{AppState, router};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// API base URL (default: $SCRIPNAV_API_BASE, then the public endpoint).
    #[arg(long)]
    api_base: Option<String>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    scripnav::logging::init(scripnav::logging::APP_DEFAULT_FILTER)?;

    let args = AppArgs::parse();
    tracing::info!(?args, "starting scripnav-app");

    let config = ApiConfig::resolve(args.api_base.as_deref())?;
    let client = Arc::new(ApiClient::new(config)?);
    let state = AppState::new(client.clone());

    let loader = state.clone();
    tokio::spawn(async move {
        loader.load(&client).await;
    });

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await
        .context("serve")?;
    Ok(())
}
