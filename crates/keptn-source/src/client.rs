//! Keptn datastore API client.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::errors::ApiError;
use crate::event::Event;

const EVENTS_PATH: [&str; 2] = ["mongodb-datastore", "event"];
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Parameters of a single "list events" call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventsRequest {
    /// Project filter; omitted from the query when empty.
    pub project: String,
    /// Service filter; omitted from the query when empty.
    pub service: String,
    /// Only events created after this instant are returned.
    pub from_time: DateTime<Utc>,
}

/// Event listing abstraction used by the poll loop.
#[async_trait::async_trait]
pub trait EventsApi: Send + Sync {
    async fn events(&self, request: &EventsRequest) -> Result<Vec<Event>, ApiError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsResponse {
    #[serde(default)]
    events: Vec<Event>,
    #[serde(default)]
    next_page_key: Option<String>,
}

/// `EventsApi` backed by the Keptn HTTP API.
pub struct KeptnClient {
    client: reqwest::Client,
    base_url: Url,
    token: String,
}

impl KeptnClient {
    /// Creates a client for `url`, authenticating with `token` when it is non-empty.
    pub fn new(url: &str, token: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(url, token, DEFAULT_TIMEOUT)
    }

    /// Like [`KeptnClient::new`] with an explicit request timeout.
    pub fn with_timeout(
        url: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ApiError::Construction("Keptn API url must not be empty".into()));
        }
        let base_url = Url::parse(url)
            .map_err(|e| ApiError::Construction(format!("invalid Keptn API url {url:?}: {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ApiError::Construction(format!(
                "unsupported Keptn API url scheme {:?}",
                base_url.scheme()
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Construction(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    /// Creates a client from a merged [`Config`].
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(&config.url, config.token.clone())
    }

    pub(crate) fn events_url(&self, request: &EventsRequest) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Construction("Keptn API url cannot be a base".into()))?
            .pop_if_empty()
            .extend(EVENTS_PATH);
        {
            let mut query = url.query_pairs_mut();
            if !request.project.is_empty() {
                query.append_pair("project", &request.project);
            }
            if !request.service.is_empty() {
                query.append_pair("service", &request.service);
            }
            query.append_pair("fromTime", &format_from_time(request.from_time));
        }
        Ok(url)
    }
}

#[async_trait::async_trait]
impl EventsApi for KeptnClient {
    async fn events(&self, request: &EventsRequest) -> Result<Vec<Event>, ApiError> {
        let url = self.events_url(request)?;
        debug!(event = "keptn.request", url = %url, "listing Keptn events");

        let mut http_req = self.client.get(url);
        if !self.token.is_empty() {
            http_req = http_req.bearer_auth(&self.token);
        }
        let response = http_req
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read response body: {e}")))?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        decode_events(&body)
    }
}

/// Keptn expects millisecond precision with a literal `Z` suffix.
pub(crate) fn format_from_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

pub(crate) fn decode_events(body: &str) -> Result<Vec<Event>, ApiError> {
    let response: EventsResponse =
        serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))?;
    if let Some(key) = response.next_page_key.as_deref()
        && !key.is_empty()
        && key != "0"
    {
        debug!(
            event = "keptn.page_truncated",
            next_page_key = key,
            returned = response.events.len(),
            "ignoring further result pages"
        );
    }
    Ok(response.events)
}
