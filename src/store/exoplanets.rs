//! Exoplanet persistence and announcement bookkeeping

use super::Store;
use crate::astro::ExoPlanet;
use crate::error::Result;
use chrono::{DateTime, Utc};
use tracing::debug;

impl Store {
    /// Upsert planets in one transaction. An existing `posted_to_bsky_at`
    /// is never replaced.
    pub async fn merge_exoplanets(&self, planets: &[ExoPlanet]) -> Result<usize> {
        self.retrying("merge exoplanets", || self.merge_exoplanets_once(planets))
            .await
    }

    async fn merge_exoplanets_once(&self, planets: &[ExoPlanet]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        for planet in planets {
            sqlx::query(
                r#"
                INSERT INTO exoplanets
                    (host_name, planet_name, radius_in_earths, mass_in_earths, density_g_cm3,
                     planet_emoji, publication_update_date, discovery_publication_date,
                     is_circumbinary, n_stars_in_system, n_planets_in_system, updated_at,
                     posted_to_bsky_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(host_name, planet_name) DO UPDATE SET
                    radius_in_earths = excluded.radius_in_earths,
                    mass_in_earths = excluded.mass_in_earths,
                    density_g_cm3 = excluded.density_g_cm3,
                    planet_emoji = excluded.planet_emoji,
                    publication_update_date = excluded.publication_update_date,
                    discovery_publication_date = excluded.discovery_publication_date,
                    is_circumbinary = excluded.is_circumbinary,
                    n_stars_in_system = excluded.n_stars_in_system,
                    n_planets_in_system = excluded.n_planets_in_system,
                    updated_at = excluded.updated_at,
                    posted_to_bsky_at = COALESCE(exoplanets.posted_to_bsky_at, excluded.posted_to_bsky_at)
                "#,
            )
            .bind(&planet.host_name)
            .bind(&planet.planet_name)
            .bind(planet.radius_in_earths)
            .bind(planet.mass_in_earths)
            .bind(planet.density_g_cm3)
            .bind(&planet.planet_emoji)
            .bind(planet.publication_update_date)
            .bind(planet.discovery_publication_date)
            .bind(planet.is_circumbinary)
            .bind(planet.n_stars_in_system)
            .bind(planet.n_planets_in_system)
            .bind(planet.updated_at)
            .bind(planet.posted_to_bsky_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Merged {} exoplanets", planets.len());
        Ok(planets.len())
    }

    pub async fn latest_exoplanet_update(&self) -> Result<Option<DateTime<Utc>>> {
        self.retrying("latest exoplanet update", || async move {
            let latest = sqlx::query_scalar(
                "SELECT updated_at FROM exoplanets ORDER BY updated_at DESC LIMIT 1",
            )
            .fetch_optional(&self.pool)
            .await?;
            Ok(latest)
        })
        .await
    }

    /// Distinct host names, alphabetical
    pub async fn system_names(&self) -> Result<Vec<String>> {
        self.retrying("system names", || async move {
            let names = sqlx::query_scalar("SELECT DISTINCT host_name FROM exoplanets ORDER BY host_name")
                .fetch_all(&self.pool)
                .await?;
            Ok(names)
        })
        .await
    }

    /// Every planet of a host, matched case-insensitively
    pub async fn get_system(&self, host_name: &str) -> Result<Vec<ExoPlanet>> {
        self.retrying("get system", || async move {
            let planets = sqlx::query_as::<_, ExoPlanet>(
                "SELECT * FROM exoplanets WHERE lower(host_name) = lower(?) ORDER BY planet_name",
            )
            .bind(host_name)
            .fetch_all(&self.pool)
            .await?;
            Ok(planets)
        })
        .await
    }

    /// Hosts with at least one planet not yet announced
    pub async fn unannounced_hosts(&self) -> Result<Vec<String>> {
        self.retrying("unannounced hosts", || async move {
            let hosts = sqlx::query_scalar(
                "SELECT DISTINCT host_name FROM exoplanets WHERE posted_to_bsky_at IS NULL ORDER BY host_name",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(hosts)
        })
        .await
    }

    pub async fn latest_announcement(&self) -> Result<Option<DateTime<Utc>>> {
        self.retrying("latest announcement", || async move {
            let latest = sqlx::query_scalar(
                r#"
                SELECT posted_to_bsky_at FROM exoplanets
                WHERE posted_to_bsky_at IS NOT NULL
                ORDER BY posted_to_bsky_at DESC
                LIMIT 1
                "#,
            )
            .fetch_optional(&self.pool)
            .await?;
            Ok(latest)
        })
        .await
    }

    /// Stamp every unstamped planet of a host in one statement
    pub async fn mark_system_announced(&self, host_name: &str, at: DateTime<Utc>) -> Result<u64> {
        self.retrying("mark system announced", || async move {
            let result = sqlx::query(
                "UPDATE exoplanets SET posted_to_bsky_at = ? WHERE host_name = ? AND posted_to_bsky_at IS NULL",
            )
            .bind(at)
            .bind(host_name)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::astro::exoplanet::tests::planet;
    use crate::store::tests::setup_test_store;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_system_lookup_is_case_insensitive() {
        let (store, _tmp) = setup_test_store().await;
        store
            .merge_exoplanets(&[
                planet("TRAPPIST-1", "TRAPPIST-1 b", 1.1, "🌍"),
                planet("TRAPPIST-1", "TRAPPIST-1 c", 1.0, "🌎"),
                planet("Kepler-16", "Kepler-16 b", 8.0, "🪐"),
            ])
            .await
            .unwrap();

        let system = store.get_system("trappist-1").await.unwrap();
        assert_eq!(system.len(), 2);
        assert_eq!(
            store.system_names().await.unwrap(),
            vec!["Kepler-16".to_string(), "TRAPPIST-1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_no_rows() {
        let (store, _tmp) = setup_test_store().await;
        let mut broken = planet("TOI-700", "TOI-700 d", 1.2, "🌒");
        broken.mass_in_earths = f64::NAN;

        let result = store
            .merge_exoplanets(&[planet("TOI-700", "TOI-700 b", 1.0, "🌍"), broken])
            .await;
        assert!(result.is_err());
        assert!(store.system_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_announcement_survives_upsert() {
        let (store, _tmp) = setup_test_store().await;
        let b = planet("TOI-700", "TOI-700 b", 1.0, "🌍");
        let d = planet("TOI-700", "TOI-700 d", 1.2, "🌒");
        store.merge_exoplanets(&[b.clone(), d.clone()]).await.unwrap();

        let at = Utc::now() - Duration::hours(1);
        assert_eq!(store.mark_system_announced("TOI-700", at).await.unwrap(), 2);
        assert!(store.unannounced_hosts().await.unwrap().is_empty());

        // The next sync brings the same rows back with no announcement
        let mut refreshed = b.clone();
        refreshed.radius_in_earths = 1.05;
        store.merge_exoplanets(&[refreshed]).await.unwrap();

        let system = store.get_system("TOI-700").await.unwrap();
        assert!(system.iter().all(|p| p.posted_to_bsky_at == Some(at)));
        assert_eq!(system[0].radius_in_earths, 1.05);
        assert_eq!(store.latest_announcement().await.unwrap(), Some(at));

        // Already stamped rows are left alone
        assert_eq!(store.mark_system_announced("TOI-700", Utc::now()).await.unwrap(), 0);
    }
}
