//! Near-earth objects from the NASA NEO feed

use crate::config::ProvidersConfig;
use crate::error::{Error, Result};
use crate::fetch::{expect_object, lenient_f64, Fetcher};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// The feed refuses windows longer than a week
pub const MAX_FEED_DAYS: i64 = 6;

/// One upcoming close approach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asteroid {
    pub link: String,
    pub name: String,
    pub width_m: f64,
    pub velocity_km_s: f64,
    pub approach_date: DateTime<Utc>,
    pub potentially_hazardous: bool,
    pub miss_distance_km: f64,
}

/// Parse a NEO feed body.
///
/// The body must carry a `near_earth_objects` object mapping days to lists
/// of objects. Individual objects that don't have the expected structure
/// are skipped. The result is sorted by approach date.
pub fn parse_asteroid_feed(feed: &Value) -> Result<Vec<Asteroid>> {
    let Some(days) = feed.get("near_earth_objects").and_then(Value::as_object) else {
        return Err(Error::bad_upstream("neo feed", feed.clone()));
    };

    let mut asteroids: Vec<Asteroid> = days
        .values()
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(|rock| {
            let parsed = parse_asteroid(rock);
            if parsed.is_none() {
                debug!("Skipping malformed NEO record: {}", rock);
            }
            parsed
        })
        .collect();

    asteroids.sort_by_key(|a| a.approach_date);
    Ok(asteroids)
}

/// Only the first close approach of each object is used
fn parse_asteroid(rock: &Value) -> Option<Asteroid> {
    let link = rock.get("nasa_jpl_url")?.as_str()?;
    let name = rock.get("name")?.as_str()?;
    let hazardous = rock.get("is_potentially_hazardous_asteroid")?.as_bool()?;

    let meters = rock.pointer("/estimated_diameter/meters")?;
    let min = lenient_f64(meters.get("estimated_diameter_min")?)?;
    let max = lenient_f64(meters.get("estimated_diameter_max")?)?;

    let approach = rock.get("close_approach_data")?.as_array()?.first()?;
    let epoch_ms = lenient_f64(approach.get("epoch_date_close_approach")?)?;
    let velocity = lenient_f64(approach.pointer("/relative_velocity/kilometers_per_second")?)?;
    let miss = lenient_f64(approach.pointer("/miss_distance/kilometers")?)?;

    Some(Asteroid {
        link: link.to_string(),
        name: name.trim_matches(|c| c == '(' || c == ')').to_string(),
        width_m: (min + max) / 2.0,
        velocity_km_s: velocity,
        approach_date: DateTime::from_timestamp_millis(epoch_ms as i64)?,
        potentially_hazardous: hazardous,
        miss_distance_km: miss,
    })
}

/// Fetch approaches from `now` through `now + n_days` (capped at a week)
pub async fn fetch_incoming_asteroids(
    fetcher: &Fetcher,
    providers: &ProvidersConfig,
    n_days: i64,
    now: DateTime<Utc>,
) -> Result<Vec<Asteroid>> {
    let n_days = n_days.clamp(0, MAX_FEED_DAYS);
    let start = now.format("%Y-%m-%d").to_string();
    let end = (now + Duration::days(n_days)).format("%Y-%m-%d").to_string();
    let api_key = providers.nasa_api_key();

    let url = format!("{}/neo/rest/v1/feed", providers.nasa_api_url);
    let body = fetcher
        .get_json(
            &url,
            &[
                ("api_key", api_key.as_str()),
                ("start_date", start.as_str()),
                ("end_date", end.as_str()),
            ],
        )
        .await?;

    let body = Value::Object(expect_object("neo feed", body)?);
    parse_asteroid_feed(&body)
}

/// One scatter point for the approach chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotPoint {
    /// Approach time, unix seconds
    pub x: i64,
    /// Miss distance, km
    pub y: f64,
    pub width: f64,
    pub name: String,
    pub speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotDataset {
    pub label: String,
    pub data: Vec<PlotPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsteroidPlotData {
    pub datasets: Vec<PlotDataset>,
}

/// Split asteroids into hazardous / safe chart datasets
pub fn plot_data(asteroids: &[Asteroid]) -> AsteroidPlotData {
    let mut hazardous = Vec::new();
    let mut safe = Vec::new();

    for rock in asteroids {
        let point = PlotPoint {
            x: rock.approach_date.timestamp(),
            y: rock.miss_distance_km,
            width: rock.width_m,
            name: rock.name.clone(),
            speed: rock.velocity_km_s,
        };
        if rock.potentially_hazardous {
            hazardous.push(point);
        } else {
            safe.push(point);
        }
    }

    AsteroidPlotData {
        datasets: vec![
            PlotDataset {
                label: "potentially_hazardous".to_string(),
                data: hazardous,
            },
            PlotDataset {
                label: "safe".to_string(),
                data: safe,
            },
        ],
    }
}
