//! orrery: astronomy and art feeds for a personal blog
//!
//! Syncs NASA DONKI coronal mass ejections and NASA Exoplanet Archive
//! systems into SQLite, proxies NEO, Met Museum and NASA image searches,
//! stores blog posts with full-text search, and announces new exoplanet
//! systems on Bluesky.

pub mod announce;
pub mod art;
pub mod astro;
pub mod cache;
pub mod commands;
pub mod config;
pub mod error;
pub mod fetch;
pub mod posts;
pub mod random;
pub mod retry;
pub mod server;
pub mod store;
pub mod sync;
