mod api;
mod config;
mod connection;
mod console;
mod dispatch;
mod simulator;
mod state;

use anyhow::Result;
use clap::Parser;
use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging();
    let config = config::Config::load(config::Args::parse())?;
    info!(ws = %config.ws_url, api = %config.api_url, "starting payops console");

    let shared = state::OpsState::shared();
    let ops = api::OpsApi::new(config.api_url.clone(), config.operator.clone());
    ops.hydrate(&shared).await;

    let (manager, state_rx) = connection::ConnectionManager::new(config.ws_url.clone());
    let connection_task = tokio::spawn(manager.run(shared.clone()));
    let simulator_task = config.simulator_enabled.then(|| {
        tokio::spawn(simulator::run(shared.clone(), state_rx.clone()))
    });
    let console_task = tokio::spawn(console::run(ops, shared.clone(), state_rx.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
        }
        _ = console_task => {
            info!("console closed, shutting down");
        }
    }

    connection_task.abort();
    if let Some(task) = simulator_task {
        task.abort();
    }
    Ok(())
}

fn init_logging() {
    let level = env::var("PAYOPS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
