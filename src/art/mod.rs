//! Art objects from the Met Museum collection and the NASA image library
//!
//! Both providers are mapped onto [`ArtObject`]. Nothing here is persisted;
//! results are cached at the read view layer.

use crate::config::ProvidersConfig;
use crate::error::{Error, Result};
use crate::fetch::{expect_object, lenient_f64, Fetcher};
use crate::random::{choose, RandomSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// Picks made by the random views before giving up
pub const RANDOM_PICK_ATTEMPTS: usize = 10;

pub const DEFAULT_MET_ART_TYPE: &str = "landscape";
pub const DEFAULT_NASA_SEARCH_TERM: &str = "nebula";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtObject {
    pub id: String,
    pub attribution: Option<String>,
    pub attribution_quoted: Option<String>,
    pub secondary_attribution: String,
    pub secondary_attribution_quoted: String,
    pub title: String,
    pub title_quoted: String,
    pub description: Option<String>,
    pub raw_creation_date: String,
    pub structured_creation_date: Option<DateTime<Utc>>,
    pub thumbnail_image_url: Option<String>,
    pub small_image_url: Option<String>,
    pub large_image_url: Option<String>,
    pub largest_image_url: Option<String>,
    pub smallest_image_url: Option<String>,
    pub has_image: bool,
    /// Raw provider payload
    pub meta: Value,
}

/// Image URL slots before the derived largest/smallest fields
#[derive(Debug, Default, Clone, PartialEq)]
struct ImageSlots {
    thumbnail: Option<String>,
    small: Option<String>,
    large: Option<String>,
}

impl ImageSlots {
    fn largest(&self) -> Option<String> {
        self.large.clone().or_else(|| self.small.clone())
    }

    fn smallest(&self) -> Option<String> {
        self.small.clone().or_else(|| self.large.clone())
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn quote(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

/// Parse one Met collection object.
///
/// `{"message": "Not a valid object"}` is [`Error::NotFound`]; any other
/// body without the expected fields is a bad upstream response.
pub fn parse_met_art_object(raw: &Value) -> Result<ArtObject> {
    const REQUIRED: [&str; 7] = [
        "objectID",
        "artistDisplayName",
        "culture",
        "title",
        "objectDate",
        "primaryImageSmall",
        "primaryImage",
    ];

    let Some(fields) = raw.as_object() else {
        return Err(Error::bad_upstream("met object", raw.clone()));
    };

    if !REQUIRED.iter().all(|k| fields.contains_key(*k)) {
        if raw.get("message").and_then(Value::as_str) == Some("Not a valid object") {
            return Err(Error::NotFound("met object".to_string()));
        }
        return Err(Error::bad_upstream("met object", raw.clone()));
    }

    let attribution = text(&fields["artistDisplayName"]);
    let secondary = text(&fields["culture"]);
    let title = text(&fields["title"]);
    let slots = ImageSlots {
        thumbnail: None,
        small: non_empty(fields.get("primaryImageSmall")),
        large: non_empty(fields.get("primaryImage")),
    };

    Ok(ArtObject {
        id: text(&fields["objectID"]),
        attribution_quoted: Some(quote(&attribution)),
        attribution: Some(attribution),
        secondary_attribution_quoted: quote(&secondary),
        secondary_attribution: secondary,
        title_quoted: quote(&title),
        title,
        description: None,
        raw_creation_date: text(&fields["objectDate"]),
        structured_creation_date: None,
        has_image: slots.small.is_some() || slots.large.is_some(),
        largest_image_url: slots.largest(),
        smallest_image_url: slots.smallest(),
        thumbnail_image_url: slots.thumbnail,
        small_image_url: slots.small,
        large_image_url: slots.large,
        meta: raw.clone(),
    })
}

/// Slot assignment over image links sorted by size.
/// One link is the large image; two are small and large; with three or
/// more the first is the thumbnail, the second small and the last large.
fn assign_slots(links: &[&Value]) -> ImageSlots {
    let href = |link: &Value| link.get("href").and_then(Value::as_str).map(str::to_string);

    let filled = match links {
        [] => None,
        [only] => href(only).map(|large| ImageSlots {
            large: Some(large),
            ..Default::default()
        }),
        [small, large] => match (href(small), href(large)) {
            (Some(small), Some(large)) => Some(ImageSlots {
                thumbnail: None,
                small: Some(small),
                large: Some(large),
            }),
            _ => None,
        },
        [thumb, small, .., last] => match (href(thumb), href(small), href(last)) {
            (Some(thumb), Some(small), Some(large)) => Some(ImageSlots {
                thumbnail: Some(thumb),
                small: Some(small),
                large: Some(large),
            }),
            _ => None,
        },
    };

    filled.unwrap_or_default()
}

/// Parse one NASA image library search item
pub fn parse_nasa_image(raw: &Value) -> Result<ArtObject> {
    let bad = || Error::bad_upstream("nasa image", raw.clone());

    let data = match raw.get("data").and_then(Value::as_array).map(Vec::as_slice) {
        Some([data]) => data,
        _ => return Err(bad()),
    };
    let links = raw.get("links").and_then(Value::as_array).ok_or_else(bad)?;

    for key in ["date_created", "description", "title", "nasa_id"] {
        if data.get(key).is_none() {
            return Err(bad());
        }
    }

    let mut images: Vec<&Value> = links
        .iter()
        .filter(|l| l.get("render").and_then(Value::as_str) == Some("image"))
        .collect();
    let size = |l: &Value| l.get("size").and_then(lenient_f64).unwrap_or(f64::INFINITY);
    images.sort_by(|a, b| size(a).total_cmp(&size(b)));

    let slots = assign_slots(&images);

    let field = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);
    let attribution = field("photographer")
        .or_else(|| field("secondary_creator"))
        .or_else(|| field("center"))
        .unwrap_or_else(|| "Unknown".to_string());
    let secondary = field("center").unwrap_or_else(|| "Unknown".to_string());
    let title = text(&data["title"]);

    Ok(ArtObject {
        id: text(&data["nasa_id"]),
        attribution_quoted: Some(quote(&attribution)),
        attribution: Some(attribution),
        secondary_attribution_quoted: quote(&secondary),
        secondary_attribution: secondary,
        title_quoted: quote(&title),
        title,
        description: Some(text(&data["description"])),
        raw_creation_date: text(&data["date_created"]),
        structured_creation_date: None,
        has_image: slots.small.is_some() || slots.large.is_some() || slots.thumbnail.is_some(),
        largest_image_url: slots.largest(),
        smallest_image_url: slots.smallest(),
        thumbnail_image_url: slots.thumbnail,
        small_image_url: slots.small,
        large_image_url: slots.large,
        meta: raw.clone(),
    })
}

/// Met object ids with images matching `art_type`
pub async fn met_object_search(
    fetcher: &Fetcher,
    providers: &ProvidersConfig,
    art_type: &str,
) -> Result<Vec<i64>> {
    let url = format!("{}/public/collection/v1/search", providers.met_api_url);
    let body = fetcher
        .get_json(&url, &[("hasImages", "true"), ("q", art_type)])
        .await?;
    let body = expect_object("met search", body)?;

    Ok(body
        .get("objectIDs")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default())
}

pub async fn met_object(
    fetcher: &Fetcher,
    providers: &ProvidersConfig,
    object_id: i64,
) -> Result<ArtObject> {
    let url = format!(
        "{}/public/collection/v1/objects/{}",
        providers.met_api_url, object_id
    );
    let body = match fetcher.get_json(&url, &[]).await {
        Err(Error::NotFound(_)) => {
            return Err(Error::NotFound(format!("met object {}", object_id)))
        }
        other => other?,
    };
    let body = Value::Object(expect_object("met object", body)?);
    parse_met_art_object(&body)
}

/// A random Met object with an image, or `None` after
/// [`RANDOM_PICK_ATTEMPTS`] misses
pub async fn random_met_object(
    fetcher: &Fetcher,
    providers: &ProvidersConfig,
    art_type: Option<&str>,
    rng: &dyn RandomSource,
) -> Result<Option<ArtObject>> {
    let art_type = art_type.unwrap_or(DEFAULT_MET_ART_TYPE);
    let ids = met_object_search(fetcher, providers, art_type).await?;

    for _ in 0..RANDOM_PICK_ATTEMPTS {
        let Some(pick) = choose(rng, &ids) else {
            return Ok(None);
        };
        match met_object(fetcher, providers, *pick).await {
            Ok(object) if object.has_image => return Ok(Some(object)),
            Ok(_) => debug!("Met object {} has no image, picking again", pick),
            Err(Error::NotFound(_)) => debug!("Met object {} not found, picking again", pick),
            Err(e) => return Err(e),
        }
    }

    info!(
        "No Met object with an image for '{}' after {} picks",
        art_type, RANDOM_PICK_ATTEMPTS
    );
    Ok(None)
}

/// Raw NASA image library items for `search_term`; empty when the body
/// has no `collection.items` list
pub async fn nasa_image_search(
    fetcher: &Fetcher,
    providers: &ProvidersConfig,
    search_term: &str,
) -> Result<Vec<Value>> {
    let url = format!("{}/search", providers.nasa_images_url);
    let body = fetcher.get_json(&url, &[("q", search_term)]).await?;

    Ok(body
        .pointer("/collection/items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default())
}

/// A random NASA image with at least one image link
pub async fn random_nasa_image(
    fetcher: &Fetcher,
    providers: &ProvidersConfig,
    search_term: Option<&str>,
    rng: &dyn RandomSource,
) -> Result<Option<ArtObject>> {
    let search_term = search_term.unwrap_or(DEFAULT_NASA_SEARCH_TERM);
    let items = nasa_image_search(fetcher, providers, search_term).await?;

    for _ in 0..RANDOM_PICK_ATTEMPTS {
        let Some(pick) = choose(rng, &items) else {
            return Ok(None);
        };
        let object = parse_nasa_image(pick)?;
        if object.has_image {
            return Ok(Some(object));
        }
    }

    info!(
        "No NASA image for '{}' after {} picks",
        search_term, RANDOM_PICK_ATTEMPTS
    );
    Ok(None)
}
