//! Bluesky posting over the AT protocol XRPC endpoints

use super::Announcer;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

const CREATE_SESSION: &str = "xrpc/com.atproto.server.createSession";
const CREATE_RECORD: &str = "xrpc/com.atproto.repo.createRecord";
const POST_COLLECTION: &str = "app.bsky.feed.post";

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
}

#[derive(Debug, Serialize)]
struct CreateRecordRequest<'a> {
    repo: &'a str,
    collection: &'a str,
    record: Value,
}

pub struct BlueskyAnnouncer {
    client: Client,
    service_url: Url,
    identifier: String,
    password: String,
}

impl BlueskyAnnouncer {
    pub fn new(
        client: Client,
        service_url: &str,
        identifier: String,
        password: String,
    ) -> Result<Self> {
        // Joined paths must land under the service path, not replace it
        let mut base = service_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            client,
            service_url: Url::parse(&base)?,
            identifier,
            password,
        })
    }

    fn endpoint(&self, method: &str) -> Result<Url> {
        self.service_url
            .join(method)
            .map_err(|e| Error::Config(format!("Invalid Bluesky service URL: {}", e)))
    }

    async fn login(&self) -> Result<Session> {
        let request = CreateSessionRequest {
            identifier: &self.identifier,
            password: &self.password,
        };
        let response = self
            .client
            .post(self.endpoint(CREATE_SESSION)?)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Announce(format!("Bluesky login failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Announce(format!(
                "Bluesky login rejected with status {}",
                response.status()
            )));
        }

        response
            .json::<Session>()
            .await
            .map_err(|e| Error::Announce(format!("Unreadable Bluesky session: {}", e)))
    }
}

/// Post record with `host` on the first line, linked to `link`, and the
/// render below it. Facet offsets are UTF-8 byte offsets.
fn post_record(host: &str, link: &str, body: &str) -> Value {
    json!({
        "$type": POST_COLLECTION,
        "text": format!("{}\n{}", host, body),
        "createdAt": Utc::now().to_rfc3339(),
        "facets": [{
            "index": {"byteStart": 0, "byteEnd": host.len()},
            "features": [{
                "$type": "app.bsky.richtext.facet#link",
                "uri": link
            }]
        }]
    })
}

#[async_trait]
impl Announcer for BlueskyAnnouncer {
    fn name(&self) -> &'static str {
        "bluesky"
    }

    async fn announce(&self, host: &str, link: &str, body: &str) -> Result<()> {
        let session = self.login().await?;
        debug!("Bluesky session opened for {}", session.did);

        let request = CreateRecordRequest {
            repo: &session.did,
            collection: POST_COLLECTION,
            record: post_record(host, link, body),
        };
        let response = self
            .client
            .post(self.endpoint(CREATE_RECORD)?)
            .bearer_auth(&session.access_jwt)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Announce(format!("Bluesky post failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Announce(format!(
                "Bluesky post rejected with status {}: {}",
                status, detail
            )));
        }
        Ok(())
    }
}
