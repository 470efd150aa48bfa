//! Serve command implementation

use crate::announce::create_announcer;
use crate::config::Config;
use crate::error::Result;
use crate::random::thread_random;
use crate::server::{serve, spawn_announce_scheduler, AppState};
use crate::store::Store;
use std::sync::Arc;
use tracing::info;

/// Run the HTTP API with the announce scheduler alongside it
pub async fn cmd_serve(config: Config, store: Store, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());

    store.init_schema().await?;
    let state = AppState::new(config, store, thread_random())?;

    let announcer = Arc::from(create_announcer(
        &state.config.bluesky,
        state.fetcher.client().clone(),
    )?);
    let scheduler = spawn_announce_scheduler(state.clone(), announcer);
    info!(
        "Announce cycle every {} hours",
        state.config.sync.announce_interval_hours
    );

    let result = serve(state, &bind).await;
    scheduler.abort();
    result
}
