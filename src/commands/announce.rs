//! Announce command implementation

use crate::announce::{create_announcer, run_announce_cycle, AnnounceOutcome};
use crate::config::Config;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::random::thread_random;
use crate::store::Store;
use crate::sync::{ExoplanetSync, SyncController};
use chrono::Utc;
use std::sync::Arc;

/// Run one announce cycle now
pub async fn cmd_announce(config: &Config, store: &Store) -> Result<AnnounceOutcome> {
    let fetcher = Fetcher::new(&config.http)?;
    let rng = thread_random();
    let announcer = create_announcer(&config.bluesky, fetcher.client().clone())?;
    let exoplanets = SyncController::new(
        ExoplanetSync::new(fetcher, config.providers.clone(), Arc::clone(&rng)),
        store.clone(),
    );

    run_announce_cycle(
        &exoplanets,
        store,
        announcer.as_ref(),
        rng.as_ref(),
        Utc::now(),
    )
    .await
}

pub fn print_announce_outcome(outcome: &AnnounceOutcome) {
    match outcome {
        AnnounceOutcome::RecentlyAnnounced { at } => {
            println!("Nothing posted: last announcement was at {}", at.to_rfc3339());
        }
        AnnounceOutcome::NothingNew => println!("Nothing posted: every system is announced"),
        AnnounceOutcome::Announced { host, planets } => {
            println!("✓ Announced {} ({} planets)", host, planets);
        }
    }
}
