//! Sync command implementation

use crate::astro::start_of_day;
use crate::config::Config;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::random::thread_random;
use crate::store::Store;
use crate::sync::{CmeSync, ExoplanetSync, SyncController, SyncOutcome};
use chrono::{NaiveDate, Utc};
use clap::ValueEnum;
use tracing::info;

/// Domains that can be synced from the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SyncTarget {
    Cme,
    Exoplanets,
}

/// Sync one domain now. `since` replaces the stored watermark, so the
/// sync runs unless `since` is today.
pub async fn cmd_sync(
    config: &Config,
    store: &Store,
    target: SyncTarget,
    since: Option<NaiveDate>,
) -> Result<SyncOutcome> {
    let fetcher = Fetcher::new(&config.http)?;
    let since = since.map(start_of_day);
    let now = Utc::now();
    info!("Syncing {:?}", target);

    match target {
        SyncTarget::Cme => {
            let domain = CmeSync::new(fetcher, config.providers.clone(), &config.sync)?;
            SyncController::new(domain, store.clone())
                .sync_since(now, since)
                .await
        }
        SyncTarget::Exoplanets => {
            let domain = ExoplanetSync::new(fetcher, config.providers.clone(), thread_random());
            SyncController::new(domain, store.clone())
                .sync_since(now, since)
                .await
        }
    }
}

pub fn print_sync_outcome(target: SyncTarget, outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Skipped { watermark } => {
            let at = watermark
                .map(|w| w.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            println!("✓ {:?} already synced today (last update {})", target, at);
        }
        SyncOutcome::Synced { fetched, merged } => {
            println!("✓ {:?} sync complete", target);
            println!("  Records fetched: {}", fetched);
            println!("  Records merged: {}", merged);
        }
    }
}
