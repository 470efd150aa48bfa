//! Coronal mass ejections from the DONKI feed

use crate::config::ProvidersConfig;
use crate::error::{Error, Result};
use crate::fetch::{expect_array, lenient_f64, Fetcher};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::str::FromStr;
use tracing::debug;

use super::start_of_day;

const DONKI_TIME_FORMAT: &str = "%Y-%m-%dT%H:%MZ";

/// Speed classes, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmeType {
    S,
    C,
    O,
    R,
    ER,
}

impl CmeType {
    pub const DISPLAY_ORDER: [CmeType; 5] =
        [CmeType::S, CmeType::C, CmeType::O, CmeType::R, CmeType::ER];

    pub fn as_str(&self) -> &'static str {
        match self {
            CmeType::S => "S",
            CmeType::C => "C",
            CmeType::O => "O",
            CmeType::R => "R",
            CmeType::ER => "ER",
        }
    }
}

impl std::fmt::Display for CmeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CmeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "S" => Ok(CmeType::S),
            "C" => Ok(CmeType::C),
            "O" => Ok(CmeType::O),
            "R" => Ok(CmeType::R),
            "ER" => Ok(CmeType::ER),
            _ => Err(Error::Other(format!("Unknown CME type: {}", s))),
        }
    }
}

/// A stored CME, keyed by `activity_id`
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CoronalMassEjection {
    pub activity_id: String,
    pub link: String,
    pub timestamp: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub speed_km_s: f64,
    pub cme_type: String,
    pub n_analyses: i64,
    pub analysis_submission_time: DateTime<Utc>,
}

impl CoronalMassEjection {
    pub fn get_type(&self) -> Result<CmeType> {
        self.cme_type.parse()
    }
}

fn parse_donki_time(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, DONKI_TIME_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Build a CME from one DONKI entry.
///
/// The analysis used is the last one flagged `isMostAccurate`, in feed
/// order. Entries without such an analysis yield `None`.
pub fn parse_cme(raw: &Value, merged_at: DateTime<Utc>) -> Option<CoronalMassEjection> {
    let activity_id = raw.get("activityID")?.as_str()?;
    let link = raw.get("link")?.as_str()?;
    let analyses = raw.get("cmeAnalyses")?.as_array()?;

    let best = analyses
        .iter()
        .rev()
        .find(|a| a.get("isMostAccurate").and_then(Value::as_bool) == Some(true))?;

    let timestamp = parse_donki_time(best.get("time21_5")?.as_str()?)?;
    let speed = lenient_f64(best.get("speed")?)?;
    let cme_type: CmeType = best.get("type")?.as_str()?.parse().ok()?;
    let submitted = parse_donki_time(best.get("submissionTime")?.as_str()?)?;

    Some(CoronalMassEjection {
        activity_id: activity_id.to_string(),
        link: link.to_string(),
        timestamp,
        updated_at: merged_at,
        speed_km_s: speed,
        cme_type: cme_type.to_string(),
        n_analyses: analyses.len() as i64,
        analysis_submission_time: submitted,
    })
}

/// Parse a whole DONKI response, dropping entries that don't qualify
pub fn parse_cme_feed(entries: &[Value], merged_at: DateTime<Utc>) -> Vec<CoronalMassEjection> {
    entries
        .iter()
        .filter_map(|entry| {
            let parsed = parse_cme(entry, merged_at);
            if parsed.is_none() {
                let id = entry.get("activityID").unwrap_or(&Value::Null);
                debug!("Skipping CME entry without a usable analysis: {}", id);
            }
            parsed
        })
        .collect()
}

/// Query DONKI for CMEs between two days (inclusive)
pub async fn query_cme_activity(
    fetcher: &Fetcher,
    providers: &ProvidersConfig,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Value>> {
    let url = format!("{}/DONKI/CME", providers.nasa_api_url);
    let start = start.format("%Y-%m-%d").to_string();
    let end = end.format("%Y-%m-%d").to_string();
    let api_key = providers.nasa_api_key();

    let body = fetcher
        .get_json(
            &url,
            &[
                ("startDate", start.as_str()),
                ("endDate", end.as_str()),
                ("api_key", api_key.as_str()),
            ],
        )
        .await?;

    expect_array("DONKI CME feed", body)
}

/// Default lower bound for unbounded range queries
pub fn range_floor() -> DateTime<Utc> {
    start_of_day(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or_default())
}

/// Default upper bound for unbounded range queries
pub fn range_ceiling() -> DateTime<Utc> {
    start_of_day(NaiveDate::from_ymd_opt(3000, 1, 1).unwrap_or_default())
}

/// `[start, end)` for a summary: the last `n_days` if positive, otherwise
/// the explicit bounds, each defaulting to the open range. A lookback that
/// reaches past the representable range starts at `range_floor()`.
pub fn summary_window(
    n_days: Option<i64>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    match n_days {
        Some(days) if days > 0 => {
            let start = Duration::try_days(days)
                .and_then(|lookback| now.checked_sub_signed(lookback))
                .map_or_else(range_floor, |start| start.max(range_floor()));
            (start, now)
        }
        _ => (start.unwrap_or_else(range_floor), end.unwrap_or_else(range_ceiling)),
    }
}

/// Per-class aggregate row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmeClassSummary {
    pub cme_type: CmeType,
    pub count: usize,
    pub slowest: Option<f64>,
    pub average: Option<f64>,
    pub fastest: Option<f64>,
    /// `(seconds since window_start, speed)` in time order
    pub speeds: Vec<(i64, f64)>,
}

/// Summary table across all five speed classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmeSummary {
    pub rows: Vec<CmeClassSummary>,
    /// Earliest event in the window
    pub window_start: Option<DateTime<Utc>>,
    /// Latest event in the window
    pub window_end: Option<DateTime<Utc>>,
    /// Calendar days covered, inclusive
    pub span_days: Option<i64>,
}

/// Group CMEs into the five speed classes. Always returns one row per
/// class in display order; empty classes have no aggregates.
pub fn summarize_cmes(cmes: &[CoronalMassEjection]) -> CmeSummary {
    let window_start = cmes.iter().map(|c| c.timestamp).min();
    let window_end = cmes.iter().map(|c| c.timestamp).max();

    let mut sorted: Vec<&CoronalMassEjection> = cmes.iter().collect();
    sorted.sort_by_key(|c| c.timestamp);

    let rows = CmeType::DISPLAY_ORDER
        .iter()
        .map(|kind| {
            let members: Vec<&CoronalMassEjection> = sorted
                .iter()
                .copied()
                .filter(|c| c.get_type().ok() == Some(*kind))
                .collect();

            if members.is_empty() {
                return CmeClassSummary {
                    cme_type: *kind,
                    count: 0,
                    slowest: None,
                    average: None,
                    fastest: None,
                    speeds: Vec::new(),
                };
            }

            let speeds: Vec<f64> = members.iter().map(|c| c.speed_km_s).collect();
            let origin = window_start.unwrap_or(members[0].timestamp);

            CmeClassSummary {
                cme_type: *kind,
                count: members.len(),
                slowest: speeds.iter().copied().reduce(f64::min),
                average: Some(speeds.iter().sum::<f64>() / speeds.len() as f64),
                fastest: speeds.iter().copied().reduce(f64::max),
                speeds: members
                    .iter()
                    .map(|c| ((c.timestamp - origin).num_seconds(), c.speed_km_s))
                    .collect(),
            }
        })
        .collect();

    let span_days = match (window_start, window_end) {
        (Some(s), Some(e)) => Some((e - s).num_days() + 1),
        _ => None,
    };

    CmeSummary {
        rows,
        window_start,
        window_end,
        span_days,
    }
}
