//! Route handlers and query validation

use super::{ApiResult, AppState};
use crate::art::{self, ArtObject, DEFAULT_MET_ART_TYPE, DEFAULT_NASA_SEARCH_TERM};
use crate::astro::{
    fetch_incoming_asteroids, parse_datetime_param, plot_data, range_ceiling, range_floor,
    render_system, summarize_cmes, summary_window, Asteroid, MAX_FEED_DAYS,
};
use crate::error::{Error, Result};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Longest accepted free-text parameter
pub const MAX_PARAM_LEN: usize = 200;

fn check_length(name: &str, value: &str) -> Result<()> {
    if value.chars().count() > MAX_PARAM_LEN {
        return Err(Error::InvalidQuery(format!(
            "{} is longer than {} characters",
            name, MAX_PARAM_LEN
        )));
    }
    Ok(())
}

/// Lowercase ASCII letters only, at most [`MAX_PARAM_LEN`] of them
fn check_word(name: &str, value: &str) -> Result<()> {
    check_length(name, value)?;
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_lowercase()) {
        return Err(Error::InvalidQuery(format!(
            "{} must be lowercase letters a-z",
            name
        )));
    }
    Ok(())
}

fn word_param<'a>(name: &str, value: Option<&'a str>, default: &'a str) -> Result<&'a str> {
    match value {
        Some(value) => {
            check_word(name, value)?;
            Ok(value)
        }
        None => Ok(default),
    }
}

fn date_param(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(parse_datetime_param)
        .transpose()
}

fn ttl(secs: u64) -> Duration {
    Duration::from_secs(secs)
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Random picks that came up empty are served as `{}`
fn pick_json(pick: Option<ArtObject>) -> Result<Value> {
    match pick {
        Some(object) => to_json(&object),
        None => Ok(json!({})),
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArtTypeParams {
    pub art_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ObjectParams {
    pub object_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SearchTermParams {
    pub search_term: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DaysFromNowParams {
    pub n_days_from_now: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RangeParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CmeTableParams {
    pub n_days: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HostParams {
    pub host_star: String,
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sync": {
            "cme": state.cmes.state(),
            "exoplanets": state.exoplanets.state(),
        },
    }))
}

// Posts

pub async fn all_posts(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let value = state
        .cache
        .get_or_try_insert("all_posts", ttl(state.config.cache.posts_ttl_secs), || async {
            to_json(&state.store.published_posts().await?)
        })
        .await?;
    Ok(Json(value))
}

pub async fn post(
    State(state): State<AppState>,
    Path(immutable_title): Path<String>,
) -> ApiResult<Json<Value>> {
    let post = state
        .store
        .get_published_post(&immutable_title)
        .await?
        .ok_or_else(|| Error::NotFound(format!("post {}", immutable_title)))?;
    Ok(Json(to_json(&post)?))
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Value>> {
    let Some(query) = params.query.filter(|q| !q.trim().is_empty()) else {
        return Ok(Json(json!([])));
    };
    check_length("query", &query)?;
    let hits = state.store.search_posts(&query).await?;
    Ok(Json(to_json(&hits)?))
}

// Art

pub async fn met_object_search(
    State(state): State<AppState>,
    Query(params): Query<ArtTypeParams>,
) -> ApiResult<Json<Value>> {
    let art_type = word_param("art_type", params.art_type.as_deref(), DEFAULT_MET_ART_TYPE)?;
    let key = format!("met_object_search:{}", art_type);
    let value = state
        .cache
        .get_or_try_insert(&key, ttl(state.config.cache.search_ttl_secs), || async {
            let ids =
                art::met_object_search(&state.fetcher, &state.config.providers, art_type).await?;
            to_json(&ids)
        })
        .await?;
    Ok(Json(value))
}

pub async fn met_object(
    State(state): State<AppState>,
    Query(params): Query<ObjectParams>,
) -> ApiResult<Json<Value>> {
    let key = format!("met_object:{}", params.object_id);
    let value = state
        .cache
        .get_or_try_insert(&key, ttl(state.config.cache.search_ttl_secs), || async {
            let object =
                art::met_object(&state.fetcher, &state.config.providers, params.object_id).await?;
            to_json(&object)
        })
        .await?;
    Ok(Json(value))
}

pub async fn random_met_object(
    State(state): State<AppState>,
    Query(params): Query<ArtTypeParams>,
) -> ApiResult<Json<Value>> {
    let art_type = word_param("art_type", params.art_type.as_deref(), DEFAULT_MET_ART_TYPE)?;
    let key = format!("random_met_object:{}", art_type);
    let value = state
        .cache
        .get_or_try_insert(&key, ttl(state.config.cache.random_ttl_secs), || async {
            let pick = art::random_met_object(
                &state.fetcher,
                &state.config.providers,
                Some(art_type),
                state.rng.as_ref(),
            )
            .await?;
            pick_json(pick)
        })
        .await?;
    Ok(Json(value))
}

pub async fn nasa_image_search(
    State(state): State<AppState>,
    Query(params): Query<SearchTermParams>,
) -> ApiResult<Json<Value>> {
    let term = word_param(
        "search_term",
        params.search_term.as_deref(),
        DEFAULT_NASA_SEARCH_TERM,
    )?;
    let key = format!("nasa_image_search:{}", term);
    let value = state
        .cache
        .get_or_try_insert(&key, ttl(state.config.cache.search_ttl_secs), || async {
            let items =
                art::nasa_image_search(&state.fetcher, &state.config.providers, term).await?;
            Ok(Value::Array(items))
        })
        .await?;
    Ok(Json(value))
}

pub async fn random_nasa_image(
    State(state): State<AppState>,
    Query(params): Query<SearchTermParams>,
) -> ApiResult<Json<Value>> {
    let term = word_param(
        "search_term",
        params.search_term.as_deref(),
        DEFAULT_NASA_SEARCH_TERM,
    )?;
    let key = format!("random_nasa_image:{}", term);
    let value = state
        .cache
        .get_or_try_insert(&key, ttl(state.config.cache.random_ttl_secs), || async {
            let pick = art::random_nasa_image(
                &state.fetcher,
                &state.config.providers,
                Some(term),
                state.rng.as_ref(),
            )
            .await?;
            pick_json(pick)
        })
        .await?;
    Ok(Json(value))
}

// Asteroids

async fn cached_asteroids(state: &AppState, n_days: i64) -> Result<Value> {
    let n_days = n_days.clamp(0, MAX_FEED_DAYS);
    let key = format!("incoming_asteroids:{}", n_days);
    state
        .cache
        .get_or_try_insert(&key, ttl(state.config.cache.astro_ttl_secs), || async {
            let rocks = fetch_incoming_asteroids(
                &state.fetcher,
                &state.config.providers,
                n_days,
                Utc::now(),
            )
            .await?;
            to_json(&rocks)
        })
        .await
}

pub async fn incoming_asteroids(
    State(state): State<AppState>,
    Query(params): Query<DaysFromNowParams>,
) -> ApiResult<Json<Value>> {
    let n_days = params.n_days_from_now.unwrap_or(MAX_FEED_DAYS);
    Ok(Json(cached_asteroids(&state, n_days).await?))
}

pub async fn asteroid_plot_data(
    State(state): State<AppState>,
    Query(params): Query<DaysFromNowParams>,
) -> ApiResult<Json<Value>> {
    let n_days = params.n_days_from_now.unwrap_or(MAX_FEED_DAYS).clamp(0, MAX_FEED_DAYS);
    let key = format!("asteroid_plot_data:{}", n_days);
    let value = state
        .cache
        .get_or_try_insert(&key, ttl(state.config.cache.astro_ttl_secs), || async {
            let rocks: Vec<Asteroid> =
                serde_json::from_value(cached_asteroids(&state, n_days).await?)?;
            to_json(&plot_data(&rocks))
        })
        .await?;
    Ok(Json(value))
}

// Coronal mass ejections

pub async fn coronal_mass_ejections(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> ApiResult<Json<Value>> {
    let start = date_param(params.start_date.as_deref())?.unwrap_or_else(range_floor);
    let end = date_param(params.end_date.as_deref())?.unwrap_or_else(range_ceiling);

    state.cmes.spawn_background();
    let cmes = state.store.cmes_between(start, end).await?;
    Ok(Json(to_json(&cmes)?))
}

pub async fn cme_table(
    State(state): State<AppState>,
    Query(params): Query<CmeTableParams>,
) -> ApiResult<Json<Value>> {
    let start = date_param(params.start_date.as_deref())?;
    let end = date_param(params.end_date.as_deref())?;
    let (start, end) = summary_window(params.n_days, start, end, Utc::now());

    state.cmes.spawn_background();
    let cmes = state.store.cmes_between(start, end).await?;
    Ok(Json(to_json(&summarize_cmes(&cmes))?))
}

// Exoplanets

pub async fn all_exoplanet_system_names(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.exoplanets.spawn_background();
    let value = state
        .cache
        .get_or_try_insert(
            "all_exoplanet_system_names",
            ttl(state.config.cache.astro_ttl_secs),
            || async { to_json(&state.store.system_names().await?) },
        )
        .await?;
    Ok(Json(value))
}

pub async fn exoplanetary_system(
    State(state): State<AppState>,
    Query(params): Query<HostParams>,
) -> ApiResult<Json<Value>> {
    check_length("host_star", &params.host_star)?;
    state.exoplanets.spawn_background();

    let key = format!("exoplanetary_system:{}", params.host_star.to_lowercase());
    let value = state
        .cache
        .get_or_try_insert(&key, ttl(state.config.cache.astro_ttl_secs), || async {
            to_json(&state.store.get_system(&params.host_star).await?)
        })
        .await?;
    Ok(Json(value))
}

pub async fn exoplanetary_system_render(
    State(state): State<AppState>,
    Query(params): Query<HostParams>,
) -> ApiResult<Json<Value>> {
    check_length("host_star", &params.host_star)?;

    let system = state.store.get_system(&params.host_star).await?;
    let Some(first) = system.first() else {
        return Err(Error::NotFound(format!("exoplanet system {}", params.host_star)).into());
    };

    Ok(Json(json!({
        "host_star": first.host_name,
        "link": first.overview_link(),
        "render": render_system(&system, state.rng.as_ref()),
    })))
}
