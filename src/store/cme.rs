//! CME persistence

use super::Store;
use crate::astro::CoronalMassEjection;
use crate::error::Result;
use chrono::{DateTime, Utc};
use tracing::debug;

impl Store {
    /// Upsert a batch of CMEs in one transaction. Later records win over
    /// earlier ones with the same `activity_id`.
    pub async fn merge_cmes(&self, cmes: &[CoronalMassEjection]) -> Result<usize> {
        self.retrying("merge cmes", || self.merge_cmes_once(cmes))
            .await
    }

    async fn merge_cmes_once(&self, cmes: &[CoronalMassEjection]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        for cme in cmes {
            sqlx::query(
                r#"
                INSERT INTO coronal_mass_ejections
                    (activity_id, link, timestamp, updated_at, speed_km_s, cme_type,
                     n_analyses, analysis_submission_time)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(activity_id) DO UPDATE SET
                    link = excluded.link,
                    timestamp = excluded.timestamp,
                    updated_at = excluded.updated_at,
                    speed_km_s = excluded.speed_km_s,
                    cme_type = excluded.cme_type,
                    n_analyses = excluded.n_analyses,
                    analysis_submission_time = excluded.analysis_submission_time
                "#,
            )
            .bind(&cme.activity_id)
            .bind(&cme.link)
            .bind(cme.timestamp)
            .bind(cme.updated_at)
            .bind(cme.speed_km_s)
            .bind(&cme.cme_type)
            .bind(cme.n_analyses)
            .bind(cme.analysis_submission_time)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Merged {} CMEs", cmes.len());
        Ok(cmes.len())
    }

    /// Most recent `updated_at`, if any CME has been stored
    pub async fn latest_cme_update(&self) -> Result<Option<DateTime<Utc>>> {
        self.retrying("latest cme update", || async move {
            let latest = sqlx::query_scalar(
                "SELECT updated_at FROM coronal_mass_ejections ORDER BY updated_at DESC LIMIT 1",
            )
            .fetch_optional(&self.pool)
            .await?;
            Ok(latest)
        })
        .await
    }

    /// CMEs with `start <= timestamp < end`, oldest first
    pub async fn cmes_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CoronalMassEjection>> {
        if start > end {
            return Ok(Vec::new());
        }
        self.retrying("cmes between", || async move {
            let cmes = sqlx::query_as::<_, CoronalMassEjection>(
                r#"
                SELECT * FROM coronal_mass_ejections
                WHERE timestamp >= ? AND timestamp < ?
                ORDER BY timestamp
                "#,
            )
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
            Ok(cmes)
        })
        .await
    }
}
