//! Astronomy feeds: near-earth asteroids, coronal mass ejections and
//! exoplanets, plus the derived views built on top of them.

pub mod asteroid;
pub mod cme;
pub mod exoplanet;
pub mod orbits;

pub use asteroid::*;
pub use cme::*;
pub use exoplanet::*;
pub use orbits::*;

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Midnight UTC on the given day
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM[:SS]` (UTC) or a bare `YYYY-MM-DD`
pub fn parse_datetime_param(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(start_of_day)
        .map_err(|_| Error::InvalidQuery(format!("not a date: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_datetime_param_formats() {
        let d = parse_datetime_param("2024-05-05").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2024, 5, 5));

        let t = parse_datetime_param("2024-05-05T10:30").unwrap();
        assert_eq!(t.timestamp() - d.timestamp(), 10 * 3600 + 30 * 60);

        let z = parse_datetime_param("2024-05-05T10:30:00+02:00").unwrap();
        assert_eq!(z.timestamp() - d.timestamp(), 8 * 3600 + 30 * 60);

        assert!(parse_datetime_param("yesterday").is_err());
    }
}
