//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::store::{Store, StoreStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub bind: String,
    pub initialized: bool,
    pub db_stats: Option<StoreStats>,
    pub cme_watermark: Option<DateTime<Utc>>,
    pub exoplanet_watermark: Option<DateTime<Utc>>,
    pub latest_announcement: Option<DateTime<Utc>>,
    pub bluesky_configured: bool,
}

/// Get system status
pub async fn cmd_status(config: &Config, store: &Store) -> Result<StatusInfo> {
    info!("Getting status");

    let initialized = store.is_initialized().await?;
    let (db_stats, cme_watermark, exoplanet_watermark, latest_announcement) = if initialized {
        (
            Some(store.stats().await?),
            store.latest_cme_update().await?,
            store.latest_exoplanet_update().await?,
            store.latest_announcement().await?,
        )
    } else {
        (None, None, None, None)
    };

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        bind: config.server.bind.clone(),
        initialized,
        db_stats,
        cme_watermark,
        exoplanet_watermark,
        latest_announcement,
        bluesky_configured: config.bluesky.credentials().is_some(),
    })
}

fn show(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string())
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 orrery Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("API bind: {}", status.bind);

    let Some(stats) = &status.db_stats else {
        println!("\n⚠ Database not initialized - run 'orrery init'");
        return;
    };

    println!("\nSync:");
    println!("  CMEs: {} (last update {})", stats.cme_count, show(status.cme_watermark));
    println!(
        "  Exoplanets: {} in {} systems (last update {})",
        stats.exoplanet_count,
        stats.system_count,
        show(status.exoplanet_watermark)
    );
    println!("\nAnnouncements:");
    println!(
        "  Systems announced: {} of {}",
        stats.announced_system_count, stats.system_count
    );
    println!("  Last announcement: {}", show(status.latest_announcement));
    let target = if status.bluesky_configured {
        "✓ Bluesky"
    } else {
        "⚠ log only (Bluesky credentials not set)"
    };
    println!("  Target: {}", target);
    println!("\nPosts:");
    println!("  Titles: {}", stats.post_count);
    println!("  Published: {}", stats.published_post_count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::exoplanet::tests::planet;
    use crate::store::tests::setup_test_store;

    #[tokio::test]
    async fn test_status_reports_counts() {
        let (store, tmp) = setup_test_store().await;
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));

        store
            .merge_exoplanets(&[
                planet("TOI-700", "TOI-700 b", 1.0, "🌍"),
                planet("TOI-700", "TOI-700 d", 1.2, "🌒"),
            ])
            .await
            .unwrap();

        let status = cmd_status(&config, &store).await.unwrap();
        assert!(status.initialized);
        let stats = status.db_stats.unwrap();
        assert_eq!(stats.exoplanet_count, 2);
        assert_eq!(stats.system_count, 1);
        assert_eq!(stats.announced_system_count, 0);
        assert!(status.exoplanet_watermark.is_some());
        assert!(status.cme_watermark.is_none());
        assert!(status.latest_announcement.is_none());
    }
}
