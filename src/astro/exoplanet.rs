//! Exoplanets from the NASA Exoplanet Archive TAP service

use crate::config::ProvidersConfig;
use crate::error::Result;
use crate::fetch::{expect_array, lenient_f64, Fetcher};
use crate::random::{choose, RandomSource};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use tracing::debug;

use super::start_of_day;

/// Watermark used when nothing has been synced yet
pub const ARCHIVE_BACKFILL_START: &str = "1608-01-01";

const EARTHS: [&str; 3] = ["🌎", "🌍", "🌏"];

/// One planet, keyed by `(host_name, planet_name)`
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ExoPlanet {
    pub host_name: String,
    pub planet_name: String,
    pub radius_in_earths: f64,
    pub mass_in_earths: f64,
    pub density_g_cm3: f64,
    pub planet_emoji: String,
    pub publication_update_date: DateTime<Utc>,
    pub discovery_publication_date: DateTime<Utc>,
    pub is_circumbinary: bool,
    pub n_stars_in_system: i64,
    pub n_planets_in_system: i64,
    pub updated_at: DateTime<Utc>,
    /// Set once the host system has been announced, never cleared
    pub posted_to_bsky_at: Option<DateTime<Utc>>,
}

impl ExoPlanet {
    /// Archive overview page for the host system
    pub fn overview_link(&self) -> String {
        overview_link(&self.host_name)
    }
}

pub fn overview_link(host_name: &str) -> String {
    format!(
        "https://exoplanetarchive.ipac.caltech.edu/overview/{}",
        urlencoding::encode(host_name)
    )
}

/// Emoji by mass in earth masses. Earth-like masses get one of the three
/// globes at random.
pub fn planet_emoji(mass_in_earths: f64, rng: &dyn RandomSource) -> String {
    let emoji = if mass_in_earths < 0.5 {
        "🌖"
    } else if mass_in_earths < 0.9 {
        "🌗"
    } else if mass_in_earths < 1.1 {
        choose(rng, &EARTHS).copied().unwrap_or("🌎")
    } else if mass_in_earths < 1.5 {
        "🌒"
    } else if mass_in_earths < 2.0 {
        "🌑"
    } else {
        "🪐"
    };
    emoji.to_string()
}

fn fallback_date() -> DateTime<Utc> {
    start_of_day(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default())
}

/// Archive dates come as `YYYY-MM` or `YYYY-MM-DD`, sometimes with a `00`
/// month or day. Anything else becomes 2000-01-01.
pub fn parse_archive_date(raw: &Value) -> DateTime<Utc> {
    let Some(text) = raw.as_str() else {
        return fallback_date();
    };

    let parts: Vec<&str> = text.trim().split('-').collect();
    let numbers: Option<Vec<u32>> = parts.iter().map(|p| p.parse().ok()).collect();
    let Some(numbers) = numbers else {
        return fallback_date();
    };

    let (year, month, day) = match numbers.as_slice() {
        [year, month] => (*year, *month, 1),
        [year, month, day] => (*year, *month, *day),
        _ => return fallback_date(),
    };

    NaiveDate::from_ymd_opt(year as i32, month.max(1), day.max(1))
        .map(start_of_day)
        .unwrap_or_else(fallback_date)
}

fn number_or_zero(row: &Value, key: &str) -> f64 {
    row.get(key).and_then(lenient_f64).unwrap_or(0.0)
}

/// One TAP row. Rows without a host or planet name are skipped.
pub fn parse_exoplanet_row(
    row: &Value,
    rng: &dyn RandomSource,
    merged_at: DateTime<Utc>,
) -> Option<ExoPlanet> {
    let host_name = row.get("host_name")?.as_str()?;
    let planet_name = row.get("planet_name")?.as_str()?;
    let mass = number_or_zero(row, "mass_in_earths");

    let is_circumbinary = match row.get("is_circumbinary") {
        Some(Value::Bool(flag)) => *flag,
        Some(other) => lenient_f64(other).unwrap_or(0.0) != 0.0,
        None => false,
    };

    Some(ExoPlanet {
        host_name: host_name.to_string(),
        planet_name: planet_name.to_string(),
        radius_in_earths: number_or_zero(row, "radius_in_earths"),
        mass_in_earths: mass,
        density_g_cm3: number_or_zero(row, "density_g_cm3"),
        planet_emoji: planet_emoji(mass, rng),
        publication_update_date: parse_archive_date(
            row.get("publication_update_date").unwrap_or(&Value::Null),
        ),
        discovery_publication_date: parse_archive_date(
            row.get("discovery_publication_date").unwrap_or(&Value::Null),
        ),
        is_circumbinary,
        n_stars_in_system: number_or_zero(row, "n_stars_in_system") as i64,
        n_planets_in_system: number_or_zero(row, "n_planets_in_system") as i64,
        updated_at: merged_at,
        posted_to_bsky_at: None,
    })
}

/// ADQL for every planet whose host had a row updated on or after `min_date`
pub fn system_query(min_date: &str) -> String {
    format!(
        "select \
            psc.hostname as host_name, \
            psc.pl_name as planet_name, \
            psc.pl_rade as radius_in_earths, \
            psc.pl_bmasse as mass_in_earths, \
            psc.pl_dens as density_g_cm3, \
            psc.disc_pubdate as discovery_publication_date, \
            psc.cb_flag as is_circumbinary, \
            psc.sy_snum as n_stars_in_system, \
            psc.sy_pnum as n_planets_in_system, \
            max(ps.rowupdate) as publication_update_date \
        from pscomppars psc join ps on psc.hostname = ps.hostname \
        where ps.rowupdate >= '{}' \
        group by \
            psc.hostname, psc.cb_flag, psc.sy_snum, psc.sy_pnum, psc.pl_name, \
            psc.disc_pubdate, psc.pl_rade, psc.pl_bmasse, psc.pl_dens",
        min_date.replace('\'', "")
    )
}

/// Query the archive for systems updated since `min_date` (YYYY-MM-DD)
pub async fn fetch_system_data(
    fetcher: &Fetcher,
    providers: &ProvidersConfig,
    min_date: &str,
    rng: &dyn RandomSource,
    merged_at: DateTime<Utc>,
) -> Result<Vec<ExoPlanet>> {
    let url = format!("{}/TAP/sync", providers.exoplanet_archive_url);
    let query = system_query(min_date);

    let body = fetcher
        .get_json(&url, &[("query", query.as_str()), ("format", "json")])
        .await?;
    let rows = expect_array("exoplanet archive", body)?;

    let planets: Vec<ExoPlanet> = rows
        .iter()
        .filter_map(|row| {
            let parsed = parse_exoplanet_row(row, rng, merged_at);
            if parsed.is_none() {
                debug!("Skipping archive row without host/planet name: {}", row);
            }
            parsed
        })
        .collect();

    debug!("{} planets from archive since {}", planets.len(), min_date);
    Ok(planets)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::random::ScriptedRandom;
    use chrono::Datelike;
    use serde_json::json;

    pub(crate) fn planet(host: &str, name: &str, radius: f64, emoji: &str) -> ExoPlanet {
        ExoPlanet {
            host_name: host.to_string(),
            planet_name: name.to_string(),
            radius_in_earths: radius,
            mass_in_earths: 1.0,
            density_g_cm3: 5.5,
            planet_emoji: emoji.to_string(),
            publication_update_date: fallback_date(),
            discovery_publication_date: fallback_date(),
            is_circumbinary: false,
            n_stars_in_system: 1,
            n_planets_in_system: 1,
            updated_at: Utc::now(),
            posted_to_bsky_at: None,
        }
    }

    #[test]
    fn test_emoji_thresholds() {
        let rng = ScriptedRandom::constant(1);
        assert_eq!(planet_emoji(0.1, &rng), "🌖");
        assert_eq!(planet_emoji(0.6, &rng), "🌗");
        assert_eq!(planet_emoji(1.0, &rng), "🌍");
        assert_eq!(planet_emoji(1.2, &rng), "🌒");
        assert_eq!(planet_emoji(1.9, &rng), "🌑");
        assert_eq!(planet_emoji(300.0, &rng), "🪐");
    }

    #[test]
    fn test_archive_dates() {
        let d = parse_archive_date(&json!("2014-05"));
        assert_eq!((d.year(), d.month(), d.day()), (2014, 5, 1));

        let d = parse_archive_date(&json!("2014-00-00"));
        assert_eq!((d.year(), d.month(), d.day()), (2014, 1, 1));

        let d = parse_archive_date(&json!("2019-11-21"));
        assert_eq!((d.year(), d.month(), d.day()), (2019, 11, 21));

        assert_eq!(parse_archive_date(&json!("2014")), fallback_date());
        assert_eq!(parse_archive_date(&json!(null)), fallback_date());
        assert_eq!(parse_archive_date(&json!("20xx-01")), fallback_date());
    }

    #[test]
    fn test_row_defaults_nulls_to_zero() {
        let rng = ScriptedRandom::constant(0);
        let row = json!({
            "host_name": "Kepler-11",
            "planet_name": "Kepler-11 b",
            "radius_in_earths": null,
            "mass_in_earths": null,
            "density_g_cm3": 2.1,
            "discovery_publication_date": "2011-02",
            "is_circumbinary": 1,
            "n_stars_in_system": 1,
            "n_planets_in_system": 6,
            "publication_update_date": "2023-01-09"
        });

        let planet = parse_exoplanet_row(&row, &rng, Utc::now()).unwrap();
        assert_eq!(planet.radius_in_earths, 0.0);
        assert_eq!(planet.mass_in_earths, 0.0);
        assert_eq!(planet.planet_emoji, "🌖");
        assert!(planet.is_circumbinary);
        assert_eq!(planet.n_planets_in_system, 6);
        assert!(planet.posted_to_bsky_at.is_none());

        assert!(parse_exoplanet_row(&json!({"host_name": "x"}), &rng, Utc::now()).is_none());
    }

    #[test]
    fn test_system_query_uses_min_date() {
        let query = system_query("2024-05-01");
        assert!(query.contains("where ps.rowupdate >= '2024-05-01'"));
        assert!(query.contains("from pscomppars psc join ps"));
    }
}
