#![warn(missing_docs)]

//! Ranked tracker service: keeps tracked players' solo queue standing current and serves it
//! over HTTP.

use tokio::net::TcpListener;

use crate::error::LtError;
use crate::pg::PgStore;
use crate::riot::RiotClient;
use crate::schedule::Scheduler;
use crate::util::{AppStateOwned, Config};

pub mod db;
pub mod error;
pub mod pg;
pub mod rank;
pub mod retry;
pub mod riot;
pub mod routes;
pub mod schedule;
pub mod store;
pub mod util;
pub mod webjob;

#[cfg(test)]
pub mod fake;

/// Boot: read config, connect, start the scheduler, and serve until Ctrl+C.
pub async fn run() -> Result<(), LtError> {
    util::init_logging();

    let config = Config::from_env()?;
    let store = PgStore::connect(&config.database_url)?;
    store.ping().await?;
    let api = RiotClient::new(
        config.rgapi_key,
        config.platform,
        config.region,
        config.rgapi_base_url,
    )?;

    let state: &'static AppStateOwned<PgStore, RiotClient> = Box::leak(Box::new(AppStateOwned {
        scheduler: Scheduler::new(store, api, config.scheduler),
        games_count: config.games_count,
    }));
    let scheduler_task = state.scheduler.start();

    let listener = TcpListener::bind(config.bind_address).await?;
    log::info!("Listening on {}.", config.bind_address);
    let served = axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    scheduler_task.abort();
    log::info!("Server shutting down.");
    served?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Received Ctrl+C, shutting down."),
        Err(e) => {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await
        }
    }
}
