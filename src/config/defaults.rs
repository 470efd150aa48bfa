//! Default values for configuration

/// Default HTTP bind address
pub fn default_bind_addr() -> String {
    std::env::var("ORRERY_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string())
}

/// Default maximum SQLite pool connections
pub fn default_max_connections() -> u32 {
    5
}

/// Default attempts for transient storage faults
pub fn default_retry_attempts() -> u32 {
    10
}

/// Default wait between storage retries (seconds)
pub fn default_retry_delay_secs() -> u64 {
    10
}

/// Default user agent
pub fn default_user_agent() -> String {
    format!("orrery/{} (personal blog backend)", env!("CARGO_PKG_VERSION"))
}

/// Default request timeout in seconds
pub fn default_http_timeout() -> u64 {
    30
}

/// NASA open API root (NEO feed, DONKI)
pub fn default_nasa_api_url() -> String {
    "https://api.nasa.gov".to_string()
}

/// Environment variable holding the NASA API key
pub fn default_nasa_api_key_env() -> String {
    "NASA_API_KEY".to_string()
}

/// NASA image library root
pub fn default_nasa_images_url() -> String {
    "https://images-api.nasa.gov".to_string()
}

/// Met Museum collection API root
pub fn default_met_api_url() -> String {
    "https://collectionapi.metmuseum.org".to_string()
}

/// NASA Exoplanet Archive root
pub fn default_exoplanet_archive_url() -> String {
    "https://exoplanetarchive.ipac.caltech.edu".to_string()
}

/// Days of DONKI history refetched on each incremental CME sync
pub fn default_cme_lookback_days() -> i64 {
    10
}

/// First day fetched when the CME table is empty
pub fn default_cme_backfill_start() -> String {
    "2010-01-01".to_string()
}

/// Hours between announce cycles
pub fn default_announce_interval_hours() -> u64 {
    6
}

/// Default TTL for the published post list (5 minutes)
pub fn default_posts_ttl() -> u64 {
    60 * 5
}

/// Default TTL for provider searches and single objects (24 hours)
pub fn default_search_ttl() -> u64 {
    60 * 60 * 24
}

/// Default TTL for random picks (5 minutes)
pub fn default_random_ttl() -> u64 {
    60 * 5
}

/// Default TTL for asteroid and exoplanet views (12 hours)
pub fn default_astro_ttl() -> u64 {
    60 * 60 * 12
}

/// Default cap on cached views
pub fn default_cache_max_entries() -> usize {
    1024
}

/// Default Bluesky PDS
pub fn default_bluesky_service() -> String {
    "https://bsky.social".to_string()
}

/// Environment variable holding the Bluesky handle
pub fn default_bluesky_account_env() -> String {
    "EXOPLANET_ACCOUNT_NAME".to_string()
}

/// Environment variable holding the Bluesky app password
pub fn default_bluesky_key_env() -> String {
    "EXOPLANET_ACCOUNT_KEY".to_string()
}
