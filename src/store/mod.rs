//! SQLite storage for synced domains and posts
//!
//! One [`Store`] is built at startup and shared by reference. Each domain
//! adds its own methods in a sibling file:
//! - CMEs (`cme.rs`)
//! - Exoplanets (`exoplanets.rs`)
//! - Posts and the search index (`posts.rs`)
//!
//! Merges run in a single transaction per call. Calls that touch the
//! database are wrapped in the storage retry policy.

mod cme;
mod exoplanets;
mod posts;
mod schema;

pub use schema::*;

use crate::config::{Config, DatabaseConfig};
use crate::error::Result;
use crate::retry::{retry_storage, RetryPolicy};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::path::Path;
use tracing::{debug, info};

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl Store {
    /// Connect to the database named in config
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::open(&config.paths.db_file, &config.database).await
    }

    /// Connect to a database file directly
    pub async fn open(db_path: &Path, database: &DatabaseConfig) -> Result<Self> {
        // Create parent directory if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(database.max_connections)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            retry: RetryPolicy::storage(database),
        })
    }

    /// Run a storage call under the retry policy
    pub(crate) async fn retrying<F, Fut, T>(&self, name: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry_storage(name, &self.retry, operation).await
    }

    /// Create tables and indexes, then rebuild the search index
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        self.retrying("create schema", || async {
            sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
            Ok(())
        })
        .await?;
        self.rebuild_search_index().await
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        self.retrying("is initialized", || async move {
            let result: Option<(i32,)> =
                sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='posts'")
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(result.is_some())
        })
        .await
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.retrying("stats", || async move {
            let cmes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM coronal_mass_ejections")
                .fetch_one(&self.pool)
                .await?;
            let exoplanets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exoplanets")
                .fetch_one(&self.pool)
                .await?;
            let systems: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT host_name) FROM exoplanets")
                .fetch_one(&self.pool)
                .await?;
            let announced: i64 = sqlx::query_scalar(
                "SELECT COUNT(DISTINCT host_name) FROM exoplanets WHERE posted_to_bsky_at IS NOT NULL",
            )
            .fetch_one(&self.pool)
            .await?;
            let posts: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT immutable_title) FROM posts")
                .fetch_one(&self.pool)
                .await?;
            let published: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE is_draft = 0")
                    .fetch_one(&self.pool)
                    .await?;

            Ok(StoreStats {
                cme_count: cmes as usize,
                exoplanet_count: exoplanets as usize,
                system_count: systems as usize,
                announced_system_count: announced as usize,
                post_count: posts as usize,
                published_post_count: published as usize,
            })
        })
        .await
    }
}

/// Row counts for `status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub cme_count: usize,
    pub exoplanet_count: usize,
    pub system_count: usize,
    pub announced_system_count: usize,
    /// Distinct immutable titles
    pub post_count: usize,
    pub published_post_count: usize,
}
