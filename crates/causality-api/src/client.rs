//! Event index REST client
//!
//! Every request goes through [`EventApiClient::fetch_with_retry`]: non-2xx responses and
//! transport failures are retried after a fixed delay, up to `max_retries` times. Query
//! operations first confirm the index is healthy.

use causality_core::{Event, SubspaceDetails, UserInvites, UserStats};
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::ApiConfig;
use crate::error::{ApiError, Result};

/// Criteria for `POST /events/query`; unset fields are omitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(rename = "#parent", skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(rename = "#proposal_id", skip_serializing_if = "Option::is_none")]
    pub proposal_id: Option<String>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: u16) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn pubkey(mut self, pubkey: impl Into<String>) -> Self {
        self.pubkey = Some(pubkey.into());
        self
    }

    pub fn subspace(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn proposal(mut self, proposal_id: impl Into<String>) -> Self {
        self.proposal_id = Some(proposal_id.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct EventApiClient {
    config: ApiConfig,
    http: Client,
}

impl EventApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        Url::parse(&config.base_url)?;
        let http = Client::builder().timeout(config.request_timeout).build()?;
        info!("EventApiClient initialized with base URL: {}", config.base_url);
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    // ---- Transport ----

    /// Whether `GET /health` answers with a 2xx status. Failures are logged, never raised.
    pub async fn check_server_status(&self) -> bool {
        match self.http.get(self.url("/health")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                error!("Server health check failed: {}", e);
                false
            }
        }
    }

    async fn ensure_healthy(&self) -> Result<()> {
        if self.check_server_status().await {
            Ok(())
        } else {
            Err(ApiError::ServerUnavailable)
        }
    }

    async fn fetch_once(
        &self,
        method: &Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Response> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("HTTP error! status: {} body: {}", status.as_u16(), body);
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Request with the configured retry budget
    pub async fn fetch_with_retry(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Response> {
        self.fetch_with_retries(method, url, body, self.config.max_retries)
            .await
    }

    /// Request, retrying up to `retries` times with the configured fixed delay
    pub async fn fetch_with_retries(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        retries: u32,
    ) -> Result<Response> {
        let mut remaining = retries;
        loop {
            debug!("Attempting to fetch: {} {}", method, url);
            match self.fetch_once(&method, url, body).await {
                Ok(response) => return Ok(response),
                Err(e) if remaining == 0 => return Err(e),
                Err(e) => {
                    warn!(
                        "Fetch attempt failed: {}. Retrying... {} attempts left",
                        e, remaining
                    );
                    remaining -= 1;
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let response = self.fetch_with_retry(method, &self.url(path), body).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn query(&self, criteria: &Value) -> Result<Vec<Event>> {
        self.ensure_healthy().await?;
        let events: Vec<Event> = self
            .fetch_json(Method::POST, "/events/query", Some(criteria))
            .await?;
        debug!("Fetched {} events", events.len());
        Ok(events)
    }

    // ---- Operations ----

    async fn submit(&self, event: &Event) -> Result<Value> {
        self.ensure_healthy().await?;
        info!("Publishing event {}", event.id);
        let body = serde_json::to_value(event).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.fetch_json(Method::POST, "/events", Some(&body)).await
    }

    /// Submit a signed event; returns the index's acknowledgement body
    pub async fn publish_event(&self, event: &Event) -> Result<Value> {
        self.submit(event)
            .await
            .map_err(|e| e.context("Failed to publish event"))
    }

    pub async fn get_all_events(&self) -> Result<Vec<Event>> {
        self.query(&json!({}))
            .await
            .map_err(|e| e.context("Failed to fetch events"))
    }

    pub async fn get_events_by_kind(&self, kind: u16) -> Result<Vec<Event>> {
        self.query(&json!({ "kind": kind }))
            .await
            .map_err(|e| e.context(format!("Failed to fetch events of kind {}", kind)))
    }

    pub async fn get_events_by_pubkey(&self, pubkey: &str) -> Result<Vec<Event>> {
        self.query(&json!({ "pubkey": pubkey }))
            .await
            .map_err(|e| e.context(format!("Failed to fetch events by {}", pubkey)))
    }

    pub async fn query_events(&self, criteria: &EventQuery) -> Result<Vec<Event>> {
        let action = "Failed to query events";
        let body = serde_json::to_value(criteria)
            .map_err(|e| ApiError::Decode(e.to_string()).context(action))?;
        self.query(&body).await.map_err(|e| e.context(action))
    }

    pub async fn get_subspace_details(&self, sid: &str) -> Result<SubspaceDetails> {
        self.fetch_json(Method::GET, &format!("/subspaces/{}", sid), None)
            .await
            .map_err(|e| e.context(format!("Failed to fetch subspace details ({})", sid)))
    }

    pub async fn get_user_invites(&self, user_id: &str) -> Result<UserInvites> {
        self.fetch_json(Method::GET, &format!("/users/{}/invites", user_id), None)
            .await
            .map_err(|e| e.context(format!("Failed to fetch user invites ({})", user_id)))
    }

    pub async fn get_user_stats(&self, user_id: &str) -> Result<UserStats> {
        self.fetch_json(Method::GET, &format!("/users/{}/stats", user_id), None)
            .await
            .map_err(|e| e.context(format!("Failed to fetch user stats ({})", user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_query_serialization() {
        let query = EventQuery::new()
            .kind(30302)
            .subspace("0x1")
            .proposal("abc");
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({"kind": 30302, "sid": "0x1", "#proposal_id": "abc"})
        );
        assert_eq!(serde_json::to_value(EventQuery::new()).unwrap(), json!({}));
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(matches!(
            EventApiClient::new(ApiConfig::new("not a url")),
            Err(ApiError::Url(_))
        ));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = EventApiClient::new(ApiConfig::new("http://localhost:8080/api/")).unwrap();
        assert_eq!(client.url("/health"), "http://localhost:8080/api/health");
    }
}
