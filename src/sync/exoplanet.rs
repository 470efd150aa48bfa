use super::SyncDomain;
use crate::astro::{fetch_system_data, ExoPlanet, ARCHIVE_BACKFILL_START};
use crate::config::ProvidersConfig;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::random::SharedRandom;
use crate::store::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Exoplanet archive rows updated on or after the watermark day
pub struct ExoplanetSync {
    fetcher: Fetcher,
    providers: ProvidersConfig,
    rng: SharedRandom,
}

impl ExoplanetSync {
    pub fn new(fetcher: Fetcher, providers: ProvidersConfig, rng: SharedRandom) -> Self {
        Self {
            fetcher,
            providers,
            rng,
        }
    }
}

#[async_trait]
impl SyncDomain for ExoplanetSync {
    type Record = ExoPlanet;
    /// `rowupdate` lower bound, YYYY-MM-DD
    type Window = String;

    fn name(&self) -> &'static str {
        "exoplanets"
    }

    async fn watermark(&self, store: &Store) -> Result<Option<DateTime<Utc>>> {
        store.latest_exoplanet_update().await
    }

    fn window(&self, watermark: Option<DateTime<Utc>>, _now: DateTime<Utc>) -> String {
        watermark
            .map(|w| w.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| ARCHIVE_BACKFILL_START.to_string())
    }

    async fn fetch(&self, min_date: &String, now: DateTime<Utc>) -> Result<Vec<ExoPlanet>> {
        fetch_system_data(
            &self.fetcher,
            &self.providers,
            min_date,
            self.rng.as_ref(),
            now,
        )
        .await
    }

    async fn merge(&self, store: &Store, records: &[ExoPlanet]) -> Result<usize> {
        store.merge_exoplanets(records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::random::ScriptedRandom;
    use crate::store::tests::setup_test_store;
    use crate::sync::{SyncController, SyncOutcome};
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param_contains};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn domain(server: &MockServer) -> ExoplanetSync {
        let providers = ProvidersConfig {
            exoplanet_archive_url: server.uri(),
            ..Default::default()
        };
        ExoplanetSync::new(
            Fetcher::new(&HttpConfig::default()).unwrap(),
            providers,
            Arc::new(ScriptedRandom::constant(0)),
        )
    }

    fn row(host: &str, planet: &str) -> serde_json::Value {
        json!({
            "host_name": host,
            "planet_name": planet,
            "radius_in_earths": 1.0,
            "mass_in_earths": 1.0,
            "density_g_cm3": 5.5,
            "discovery_publication_date": "2016-08",
            "is_circumbinary": 0,
            "n_stars_in_system": 3,
            "n_planets_in_system": 1,
            "publication_update_date": "2024-05-01"
        })
    }

    #[test]
    fn test_window_uses_watermark_day() {
        let server_uri = "http://unused";
        let sync = ExoplanetSync::new(
            Fetcher::new(&HttpConfig::default()).unwrap(),
            ProvidersConfig {
                exoplanet_archive_url: server_uri.to_string(),
                ..Default::default()
            },
            Arc::new(ScriptedRandom::constant(0)),
        );
        let now = Utc.with_ymd_and_hms(2024, 5, 20, 0, 0, 0).unwrap();

        assert_eq!(sync.window(None, now), "1608-01-01");
        assert_eq!(sync.window(Some(now - Duration::days(2)), now), "2024-05-18");
    }

    #[tokio::test]
    async fn test_backfill_then_incremental() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/TAP/sync"))
            .and(query_param_contains("query", "ps.rowupdate >= '1608-01-01'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                row("Proxima Cen", "Proxima Cen b"),
                {"host_name": null, "planet_name": "orphan"}
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/TAP/sync"))
            .and(query_param_contains("query", "ps.rowupdate >= '2024-05-01'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let (store, _tmp) = setup_test_store().await;
        let controller = SyncController::new(domain(&server), store.clone());

        let outcome = controller
            .sync_if_stale(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Synced { fetched: 1, merged: 1 });

        let system = store.get_system("proxima cen").await.unwrap();
        assert_eq!(system.len(), 1);
        assert_eq!(system[0].planet_emoji, "🌎");
        assert_eq!(system[0].n_stars_in_system, 3);

        let outcome = controller
            .sync_if_stale(Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap())
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Synced { fetched: 0, merged: 0 });
    }
}
