use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;

use crate::api::server::{AppState, RouteError};
use crate::db::prelude::DbError;
use crate::util::env::{Env, EnvErr};
use crate::util::telemetry;

mod api;
mod args;
mod campaign;
mod compose;
mod constants;
mod db;
mod nft;
mod util;

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Env(#[from] EnvErr),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Std(#[from] Box<dyn std::error::Error>),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = args::parse_cli_args();
    let mut env = Env::new()?;
    cli.apply(&mut env);

    let telemetry_registry = telemetry::Telemetry::new(&env)?.register();

    tracing::info!("starting main application");

    let pool = db::connect(&env.database_path).await?;
    let state = Arc::new(AppState::from_env(pool, &env)?);

    let mut handles = Vec::new();

    if env.campaign_poll_secs > 0 {
        tracing::info!(every_secs = env.campaign_poll_secs, "scheduling campaign refresh");
        handles.push(
            state
                .campaign
                .clone()
                .spawn_poller(Duration::from_secs(env.campaign_poll_secs)),
        );
    }

    let server_handles =
        api::server::start_server(state, env.server_api_port, &env.cors_allow_origins).await?;
    handles.extend(server_handles);

    _ = join_all(handles).await;

    telemetry_registry.shutdown();
    Ok(())
}
