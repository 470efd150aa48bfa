use super::SyncDomain;
use crate::astro::{parse_cme_feed, query_cme_activity, CoronalMassEjection};
use crate::config::{ProvidersConfig, SyncConfig};
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::store::Store;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Inclusive day range requested from DONKI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// DONKI CMEs: a fixed lookback when caught up, the full history otherwise
pub struct CmeSync {
    fetcher: Fetcher,
    providers: ProvidersConfig,
    lookback: Duration,
    backfill_start: NaiveDate,
}

impl CmeSync {
    pub fn new(fetcher: Fetcher, providers: ProvidersConfig, sync: &SyncConfig) -> Result<Self> {
        Ok(Self {
            fetcher,
            providers,
            lookback: Duration::try_days(sync.cme_lookback_days).ok_or_else(|| {
                Error::Config(format!(
                    "sync.cme_lookback_days {} is out of range",
                    sync.cme_lookback_days
                ))
            })?,
            backfill_start: sync.cme_backfill_date()?,
        })
    }
}

#[async_trait]
impl SyncDomain for CmeSync {
    type Record = CoronalMassEjection;
    type Window = DayRange;

    fn name(&self) -> &'static str {
        "cme"
    }

    async fn watermark(&self, store: &Store) -> Result<Option<DateTime<Utc>>> {
        store.latest_cme_update().await
    }

    fn window(&self, watermark: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DayRange {
        let start = match watermark {
            Some(_) => now
                .checked_sub_signed(self.lookback)
                .map_or(self.backfill_start, |start| start.date_naive()),
            None => self.backfill_start,
        };
        DayRange {
            start,
            end: now.date_naive(),
        }
    }

    async fn fetch(&self, window: &DayRange, now: DateTime<Utc>) -> Result<Vec<CoronalMassEjection>> {
        let entries =
            query_cme_activity(&self.fetcher, &self.providers, window.start, window.end).await?;
        Ok(parse_cme_feed(&entries, now))
    }

    async fn merge(&self, store: &Store, records: &[CoronalMassEjection]) -> Result<usize> {
        store.merge_cmes(records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::{range_ceiling, range_floor};
    use crate::config::HttpConfig;
    use crate::store::tests::setup_test_store;
    use crate::sync::{SyncController, SyncOutcome};
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn domain(server: &MockServer) -> CmeSync {
        let providers = ProvidersConfig {
            nasa_api_url: server.uri(),
            ..Default::default()
        };
        let fetcher = Fetcher::new(&HttpConfig::default()).unwrap();
        CmeSync::new(fetcher, providers, &SyncConfig::default()).unwrap()
    }

    fn donki_entry(id: &str, speed: f64) -> serde_json::Value {
        json!({
            "activityID": id,
            "link": format!("https://kauai.ccmc.gsfc.nasa.gov/DONKI/view/CME/{}", id),
            "cmeAnalyses": [{
                "isMostAccurate": true,
                "time21_5": "2024-05-03T06:30Z",
                "speed": speed,
                "type": "C",
                "submissionTime": "2024-05-03T08:00Z"
            }]
        })
    }

    #[test]
    fn test_windows() {
        let cme_sync = CmeSync {
            fetcher: Fetcher::new(&HttpConfig::default()).unwrap(),
            providers: ProvidersConfig::default(),
            lookback: Duration::days(10),
            backfill_start: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
        };
        let now = Utc.with_ymd_and_hms(2024, 5, 20, 15, 0, 0).unwrap();

        let backfill = cme_sync.window(None, now);
        assert_eq!(backfill.start, NaiveDate::from_ymd_opt(2010, 1, 1).unwrap());
        assert_eq!(backfill.end, NaiveDate::from_ymd_opt(2024, 5, 20).unwrap());

        let incremental = cme_sync.window(Some(now - Duration::days(3)), now);
        assert_eq!(incremental.start, NaiveDate::from_ymd_opt(2024, 5, 10).unwrap());
    }

    #[test]
    fn test_unrepresentable_lookback_is_config_error() {
        let sync = SyncConfig {
            cme_lookback_days: i64::MAX,
            ..Default::default()
        };
        let result = CmeSync::new(
            Fetcher::new(&HttpConfig::default()).unwrap(),
            ProvidersConfig::default(),
            &sync,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_sync_merges_then_skips_same_day() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/DONKI/CME"))
            .and(query_param("startDate", "2010-01-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                donki_entry("2024-05-03T06:00:00-CME-001", 800.0),
                {"activityID": "no-analysis", "link": "x", "cmeAnalyses": null}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let (store, _tmp) = setup_test_store().await;
        let controller = SyncController::new(domain(&server), store.clone());

        let now = Utc::now();
        let outcome = controller.sync_if_stale(now).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Synced { fetched: 1, merged: 1 });

        let again = controller.sync_if_stale(now).await.unwrap();
        assert!(matches!(again, SyncOutcome::Skipped { .. }));

        let stored = store.cmes_between(range_floor(), range_ceiling()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].speed_km_s, 800.0);
    }

    #[tokio::test]
    async fn test_wrong_shape_is_bad_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/DONKI/CME"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": {"code": "OVER_RATE_LIMIT"}})))
            .mount(&server)
            .await;

        let (store, _tmp) = setup_test_store().await;
        let controller = SyncController::new(domain(&server), store);

        let err = controller.sync_if_stale(Utc::now()).await.unwrap_err();
        assert!(matches!(err, Error::BadUpstreamResponse { .. }));
    }
}
