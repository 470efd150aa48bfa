//! SQLite schema definition

/// Tables and indexes for the synced domains and posts
pub const SCHEMA_SQL: &str = r#"
-- CMEs: one row per DONKI activity
CREATE TABLE IF NOT EXISTS coronal_mass_ejections (
    activity_id TEXT PRIMARY KEY,
    link TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    speed_km_s REAL NOT NULL,
    cme_type TEXT NOT NULL,
    n_analyses INTEGER NOT NULL,
    analysis_submission_time TEXT NOT NULL
);

-- Exoplanets: one row per planet, grouped into systems by host
CREATE TABLE IF NOT EXISTS exoplanets (
    host_name TEXT NOT NULL,
    planet_name TEXT NOT NULL,
    radius_in_earths REAL NOT NULL,
    mass_in_earths REAL NOT NULL,
    density_g_cm3 REAL NOT NULL,
    planet_emoji TEXT NOT NULL,
    publication_update_date TEXT NOT NULL,
    discovery_publication_date TEXT NOT NULL,
    is_circumbinary INTEGER NOT NULL,
    n_stars_in_system INTEGER NOT NULL,
    n_planets_in_system INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    posted_to_bsky_at TEXT,
    PRIMARY KEY (host_name, planet_name)
);

-- Posts: every revision is a row; at most one per title is published
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    immutable_title TEXT NOT NULL,
    title TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    keywords TEXT NOT NULL,
    is_draft INTEGER NOT NULL,
    preview TEXT NOT NULL,
    posted_at TEXT,
    content_html TEXT,
    scripts_html TEXT,
    content_md TEXT,
    searchable_text TEXT NOT NULL,
    formatted_date TEXT
);

CREATE INDEX IF NOT EXISTS idx_cme_timestamp ON coronal_mass_ejections(timestamp);
CREATE INDEX IF NOT EXISTS idx_cme_updated ON coronal_mass_ejections(updated_at);
CREATE INDEX IF NOT EXISTS idx_exoplanets_updated ON exoplanets(updated_at);
CREATE INDEX IF NOT EXISTS idx_posts_title ON posts(immutable_title, updated_at);
"#;

/// Rebuild the full-text index from the latest published revision of
/// each post
pub const SEARCH_INDEX_SQL: &str = r#"
DROP TABLE IF EXISTS post_search;

CREATE VIRTUAL TABLE post_search USING fts5 (immutable_title, title, keywords, searchable_text);

INSERT INTO post_search (immutable_title, title, keywords, searchable_text)
SELECT immutable_title, title, keywords, searchable_text
FROM (
    SELECT
        *,
        ROW_NUMBER() OVER (PARTITION BY immutable_title ORDER BY updated_at DESC) AS revision
    FROM posts
    WHERE is_draft = 0
)
WHERE revision = 1;
"#;
