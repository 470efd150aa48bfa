//! Staleness-gated sync of external feeds into the store
//!
//! A [`SyncDomain`] knows how to read its watermark, pick a fetch window,
//! fetch records and merge them. [`SyncController`] wraps one domain with
//! the day-granularity gate and the `Fresh`/`Syncing` state.
//!
//! Concurrent syncs of the same domain are not prevented. They repeat
//! work, and the upserts make the outcome the same.

mod cme;
mod exoplanet;

pub use cme::CmeSync;
pub use exoplanet::ExoplanetSync;

use crate::error::Result;
use crate::store::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[async_trait]
pub trait SyncDomain: Send + Sync + 'static {
    type Record: Send + Sync;
    type Window: Debug + Send + Sync;

    fn name(&self) -> &'static str;

    /// Most recent `updated_at` in the store for this domain
    async fn watermark(&self, store: &Store) -> Result<Option<DateTime<Utc>>>;

    /// Full backfill when `watermark` is `None`, incremental otherwise
    fn window(&self, watermark: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self::Window;

    async fn fetch(&self, window: &Self::Window, now: DateTime<Utc>) -> Result<Vec<Self::Record>>;

    async fn merge(&self, store: &Store, records: &[Self::Record]) -> Result<usize>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Fresh,
    Syncing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum SyncOutcome {
    /// The watermark already falls on today
    Skipped { watermark: Option<DateTime<Utc>> },
    Synced { fetched: usize, merged: usize },
}

/// True unless the watermark falls on or after the UTC day of `now`
pub fn is_stale(watermark: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match watermark {
        Some(w) => w.date_naive() < now.date_naive(),
        None => true,
    }
}

/// Resets the in-flight count however the sync ends
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct SyncController<D: SyncDomain> {
    domain: D,
    store: Store,
    in_flight: AtomicUsize,
}

impl<D: SyncDomain> SyncController<D> {
    pub fn new(domain: D, store: Store) -> Self {
        Self {
            domain,
            store,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn domain(&self) -> &D {
        &self.domain
    }

    pub fn state(&self) -> SyncState {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            SyncState::Syncing
        } else {
            SyncState::Fresh
        }
    }

    /// Sync unless already done today
    pub async fn sync_if_stale(&self, now: DateTime<Utc>) -> Result<SyncOutcome> {
        let watermark = self.domain.watermark(&self.store).await?;
        self.sync_from(watermark, now).await
    }

    /// Like [`Self::sync_if_stale`], with `since` standing in for the stored
    /// watermark when given
    pub async fn sync_since(
        &self,
        now: DateTime<Utc>,
        since: Option<DateTime<Utc>>,
    ) -> Result<SyncOutcome> {
        let watermark = match since {
            Some(since) => Some(since),
            None => self.domain.watermark(&self.store).await?,
        };
        self.sync_from(watermark, now).await
    }

    async fn sync_from(
        &self,
        watermark: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome> {
        let name = self.domain.name();

        if !is_stale(watermark, now) {
            debug!("{} already synced today (watermark {:?})", name, watermark);
            return Ok(SyncOutcome::Skipped { watermark });
        }

        let _guard = InFlight::enter(&self.in_flight);
        let window = self.domain.window(watermark, now);
        info!("Syncing {} over {:?}", name, window);

        let records = self.domain.fetch(&window, now).await?;
        let fetched = records.len();
        let merged = if records.is_empty() {
            0
        } else {
            self.domain.merge(&self.store, &records).await?
        };

        info!("Synced {}: {} fetched, {} merged", name, fetched, merged);
        Ok(SyncOutcome::Synced { fetched, merged })
    }

    /// Fire-and-forget sync for read paths. Failures are logged, never
    /// returned.
    pub fn spawn_background(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = controller.sync_if_stale(Utc::now()).await {
                warn!("Background {} sync failed: {}", controller.domain.name(), e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::setup_test_store;
    use chrono::TimeZone;
    use std::sync::Mutex;

    /// Hands out a fixed batch and records the windows it was asked for
    struct FakeDomain {
        batch: Vec<i64>,
        fail: bool,
        windows: Mutex<Vec<Option<DateTime<Utc>>>>,
        merged: Mutex<Vec<i64>>,
        watermark: Mutex<Option<DateTime<Utc>>>,
    }

    impl FakeDomain {
        fn new(batch: Vec<i64>) -> Self {
            Self {
                batch,
                fail: false,
                windows: Mutex::new(Vec::new()),
                merged: Mutex::new(Vec::new()),
                watermark: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl SyncDomain for FakeDomain {
        type Record = i64;
        type Window = Option<DateTime<Utc>>;

        fn name(&self) -> &'static str {
            "fake"
        }

        async fn watermark(&self, _store: &Store) -> Result<Option<DateTime<Utc>>> {
            Ok(*self.watermark.lock().unwrap())
        }

        fn window(&self, watermark: Option<DateTime<Utc>>, _now: DateTime<Utc>) -> Self::Window {
            watermark
        }

        async fn fetch(&self, window: &Self::Window, _now: DateTime<Utc>) -> Result<Vec<i64>> {
            self.windows.lock().unwrap().push(*window);
            if self.fail {
                return Err(crate::error::Error::Transport("down".to_string()));
            }
            Ok(self.batch.clone())
        }

        async fn merge(&self, _store: &Store, records: &[i64]) -> Result<usize> {
            self.merged.lock().unwrap().extend_from_slice(records);
            Ok(records.len())
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_staleness_is_by_utc_day() {
        assert!(is_stale(None, at(5, 12)));
        assert!(is_stale(Some(at(4, 23)), at(5, 0)));
        assert!(!is_stale(Some(at(5, 0)), at(5, 23)));
        assert!(!is_stale(Some(at(6, 0)), at(5, 23)));
    }

    #[tokio::test]
    async fn test_empty_store_backfills_then_same_day_skips() {
        let (store, _tmp) = setup_test_store().await;
        let controller = SyncController::new(FakeDomain::new(vec![1, 2, 3]), store);

        let outcome = controller.sync_if_stale(at(5, 8)).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Synced { fetched: 3, merged: 3 });
        assert_eq!(controller.domain().windows.lock().unwrap().as_slice(), &[None]);

        *controller.domain().watermark.lock().unwrap() = Some(at(5, 8));
        let outcome = controller.sync_if_stale(at(5, 20)).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Skipped { watermark: Some(at(5, 8)) });
        assert_eq!(controller.domain().windows.lock().unwrap().len(), 1);
        assert_eq!(controller.state(), SyncState::Fresh);
    }

    #[tokio::test]
    async fn test_since_overrides_watermark() {
        let (store, _tmp) = setup_test_store().await;
        let controller = SyncController::new(FakeDomain::new(vec![7]), store);
        *controller.domain().watermark.lock().unwrap() = Some(at(5, 1));

        let skipped = controller.sync_since(at(5, 9), None).await.unwrap();
        assert!(matches!(skipped, SyncOutcome::Skipped { .. }));

        let synced = controller.sync_since(at(5, 9), Some(at(1, 0))).await.unwrap();
        assert_eq!(synced, SyncOutcome::Synced { fetched: 1, merged: 1 });
        assert_eq!(
            controller.domain().windows.lock().unwrap().as_slice(),
            &[Some(at(1, 0))]
        );
    }

    #[tokio::test]
    async fn test_failure_returns_to_fresh() {
        let (store, _tmp) = setup_test_store().await;
        let mut domain = FakeDomain::new(vec![1]);
        domain.fail = true;
        let controller = Arc::new(SyncController::new(domain, store));

        assert!(controller.sync_if_stale(at(5, 8)).await.is_err());
        assert_eq!(controller.state(), SyncState::Fresh);

        // The background entry point swallows the same failure
        controller.spawn_background().await.unwrap();
        assert!(controller.domain().merged.lock().unwrap().is_empty());
    }
}
