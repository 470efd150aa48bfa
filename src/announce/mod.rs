//! Posting newly discovered exoplanet systems
//!
//! An [`Announcer`] publishes one rendered system. The announce cycle picks
//! a host that has never been announced, hands its render to the announcer
//! and stamps the host's planets so it is not picked again.

mod bluesky;

pub use bluesky::BlueskyAnnouncer;

use crate::astro::{overview_link, render_system};
use crate::config::BlueskyConfig;
use crate::error::Result;
use crate::random::{choose, RandomSource};
use crate::store::Store;
use crate::sync::{ExoplanetSync, SyncController};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Minimum gap between two announcements
pub const ANNOUNCE_COOLDOWN_HOURS: i64 = 24;

/// Trait for announcement targets
#[async_trait]
pub trait Announcer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Publish `body` under a heading of `host` linked to `link`
    async fn announce(&self, host: &str, link: &str, body: &str) -> Result<()>;
}

/// Writes announcements to the log instead of posting them
pub struct LogAnnouncer;

#[async_trait]
impl Announcer for LogAnnouncer {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn announce(&self, host: &str, link: &str, body: &str) -> Result<()> {
        info!("Announcement for {} ({}):\n{}", host, link, body);
        Ok(())
    }
}

/// Bluesky when credentials are in the environment, the log otherwise
pub fn create_announcer(
    config: &BlueskyConfig,
    client: reqwest::Client,
) -> Result<Box<dyn Announcer>> {
    match config.credentials() {
        Some((account, key)) => Ok(Box::new(BlueskyAnnouncer::new(
            client,
            &config.service_url,
            account,
            key,
        )?)),
        None => {
            warn!(
                "{} / {} not set, announcements go to the log",
                config.account_env, config.key_env
            );
            Ok(Box::new(LogAnnouncer))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnnounceOutcome {
    /// Another system went out within the cooldown
    RecentlyAnnounced { at: DateTime<Utc> },
    /// Every stored system has been announced
    NothingNew,
    Announced { host: String, planets: u64 },
}

/// Announce one random unannounced system unless the cooldown is running
pub async fn announce_next_system(
    store: &Store,
    announcer: &dyn Announcer,
    rng: &dyn RandomSource,
    now: DateTime<Utc>,
) -> Result<AnnounceOutcome> {
    if let Some(at) = store.latest_announcement().await? {
        if at >= now - Duration::hours(ANNOUNCE_COOLDOWN_HOURS) {
            info!("Last announcement at {}, waiting", at);
            return Ok(AnnounceOutcome::RecentlyAnnounced { at });
        }
    }

    let hosts = store.unannounced_hosts().await?;
    let Some(host) = choose(rng, &hosts) else {
        info!("No unannounced exoplanet systems");
        return Ok(AnnounceOutcome::NothingNew);
    };

    let system = store.get_system(host).await?;
    let body = render_system(&system, rng);
    let link = overview_link(host);

    announcer.announce(host, &link, &body).await?;
    let planets = store.mark_system_announced(host, now).await?;
    info!("Announced {} via {} ({} planets)", host, announcer.name(), planets);

    Ok(AnnounceOutcome::Announced {
        host: host.clone(),
        planets,
    })
}

/// Refresh exoplanets, then announce. A failed refresh is logged and the
/// systems already stored are still eligible.
pub async fn run_announce_cycle(
    exoplanets: &SyncController<ExoplanetSync>,
    store: &Store,
    announcer: &dyn Announcer,
    rng: &dyn RandomSource,
    now: DateTime<Utc>,
) -> Result<AnnounceOutcome> {
    if let Err(e) = exoplanets.sync_if_stale(now).await {
        warn!("Exoplanet sync before announce failed: {}", e);
    }
    announce_next_system(store, announcer, rng, now).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::exoplanet::tests::planet;
    use crate::error::Error;
    use crate::random::ScriptedRandom;
    use crate::store::tests::setup_test_store;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingAnnouncer {
        sent: Mutex<Vec<(String, String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Announcer for RecordingAnnouncer {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn announce(&self, host: &str, link: &str, body: &str) -> Result<()> {
            if self.fail {
                return Err(Error::Announce("offline".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((host.to_string(), link.to_string(), body.to_string()));
            Ok(())
        }
    }

    async fn seeded_store() -> (Store, tempfile::TempDir) {
        let (store, tmp) = setup_test_store().await;
        store
            .merge_exoplanets(&[
                planet("Kepler-16", "Kepler-16 b", 8.0, "🪐"),
                planet("TOI-700", "TOI-700 b", 1.0, "🌍"),
                planet("TOI-700", "TOI-700 d", 1.2, "🌒"),
            ])
            .await
            .unwrap();
        (store, tmp)
    }

    #[tokio::test]
    async fn test_second_cycle_same_day_does_not_announce() {
        let (store, _tmp) = seeded_store().await;
        let announcer = RecordingAnnouncer::default();
        let rng = ScriptedRandom::constant(1);
        let morning = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

        let first = announce_next_system(&store, &announcer, &rng, morning)
            .await
            .unwrap();
        assert_eq!(
            first,
            AnnounceOutcome::Announced {
                host: "TOI-700".to_string(),
                planets: 2
            }
        );

        let evening = morning + Duration::hours(10);
        let second = announce_next_system(&store, &announcer, &rng, evening)
            .await
            .unwrap();
        assert_eq!(second, AnnounceOutcome::RecentlyAnnounced { at: morning });

        let sent = announcer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "TOI-700");
        assert_eq!(
            sent[0].1,
            "https://exoplanetarchive.ipac.caltech.edu/overview/TOI-700"
        );
        assert!(sent[0].2.contains("🌍"));
    }

    #[tokio::test]
    async fn test_cycle_runs_out_of_systems() {
        let (store, _tmp) = seeded_store().await;
        let announcer = RecordingAnnouncer::default();
        let rng = ScriptedRandom::constant(0);
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

        for day in [0, 2] {
            let outcome =
                announce_next_system(&store, &announcer, &rng, start + Duration::days(day))
                    .await
                    .unwrap();
            assert!(matches!(outcome, AnnounceOutcome::Announced { .. }));
        }

        let outcome = announce_next_system(&store, &announcer, &rng, start + Duration::days(4))
            .await
            .unwrap();
        assert_eq!(outcome, AnnounceOutcome::NothingNew);
        assert_eq!(announcer.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_post_leaves_system_unannounced() {
        let (store, _tmp) = seeded_store().await;
        let announcer = RecordingAnnouncer {
            fail: true,
            ..Default::default()
        };
        let rng = ScriptedRandom::constant(0);

        let err = announce_next_system(&store, &announcer, &rng, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Announce(_)));
        assert_eq!(store.unannounced_hosts().await.unwrap().len(), 2);
        assert!(store.latest_announcement().await.unwrap().is_none());
    }
}
