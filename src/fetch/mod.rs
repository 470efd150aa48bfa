//! JSON fetching from external providers
//!
//! A 404 is reported as [`Error::NotFound`]. Other transport failures
//! (unreachable host, non-2xx, body that is not JSON)
//! are reported separately from a well-formed body of the wrong shape,
//! which callers reject with [`expect_object`] / [`expect_array`].

use crate::config::HttpConfig;
use crate::error::{Error, Result};
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

/// Shared HTTP client for provider reads
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// The underlying client, for callers that need to POST
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// `GET url?params` and decode the body as JSON
    pub async fn get_json(&self, url: &str, params: &[(&str, &str)]) -> Result<Value> {
        debug!("Fetching: {}", url);

        let response = self.client.get(url).query(params).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(Error::Transport(format!("HTTP {}: {}", status, url)));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| Error::Transport(format!("Non-JSON body from {}: {}", url, e)))
    }
}

/// Require a top-level JSON object
pub fn expect_object(context: &str, value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::bad_upstream(
            format!("{} (expected object)", context),
            other,
        )),
    }
}

/// Require a top-level JSON array
pub fn expect_array(context: &str, value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(Error::bad_upstream(
            format!("{} (expected array)", context),
            other,
        )),
    }
}

/// Read a number that some providers send as a string
pub fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        Fetcher::new(&HttpConfig::default()).expect("client should build")
    }

    #[tokio::test]
    async fn test_get_json_passes_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .and(query_param("api_key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let value = fetcher()
            .get_json(&format!("{}/feed", server.uri()), &[("api_key", "k")])
            .await
            .unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_non_success_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = fetcher().get_json(&server.uri(), &[]).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_non_json_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let err = fetcher().get_json(&server.uri(), &[]).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_missing_resource_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "Not a valid object"})),
            )
            .mount(&server)
            .await;

        let err = fetcher().get_json(&server.uri(), &[]).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_shape_checks_keep_payload() {
        let err = expect_array("cme feed", json!({"error": "rate limited"})).unwrap_err();
        match err {
            Error::BadUpstreamResponse { payload, .. } => {
                assert_eq!(payload, json!({"error": "rate limited"}))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(expect_object("met", json!({"a": 1})).is_ok());
    }

    #[test]
    fn test_lenient_f64() {
        assert_eq!(lenient_f64(&json!("12.5")), Some(12.5));
        assert_eq!(lenient_f64(&json!(3)), Some(3.0));
        assert_eq!(lenient_f64(&json!(null)), None);
        assert_eq!(lenient_f64(&json!("fast")), None);
    }
}
