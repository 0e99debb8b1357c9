use std::env;

use async_trait::async_trait;
use quiz_core::model::{SyncDelta, SyncState};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::warn;

use crate::error::TransportError;

/// Header carrying the caller's sync key on state reads.
pub const SYNC_KEY_HEADER: &str = "x-sync-key";
/// Echoes the authenticated user on init responses.
pub const SYNC_USER_HEADER: &str = "x-sync-user";

/// Header the access layer uses to pass the authenticated email.
pub const ACCESS_EMAIL_HEADER: &str = "cf-access-authenticated-user-email";

/// Client view of the sync endpoints.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Ask the server for this user's sync key.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the request fails or is rejected.
    async fn init(&self) -> Result<String, TransportError>;

    /// Send a delta and receive the merged record.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the request fails or is rejected.
    async fn push(&self, delta: &SyncDelta) -> Result<SyncState, TransportError>;

    /// Fetch the current record.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the request fails or is rejected.
    async fn pull(&self, sync_key: &str) -> Result<SyncState, TransportError>;
}

#[derive(Clone, Debug)]
pub struct HttpSyncConfig {
    pub base_url: String,
    /// Identity to assert when the server is reached without the access layer
    /// in front of it (local development).
    pub access_email: Option<String>,
}

impl HttpSyncConfig {
    /// Validate `base_url` as an absolute http(s) URL.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidEndpoint` for anything else.
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let parsed =
            Url::parse(base_url).map_err(|err| TransportError::InvalidEndpoint(err.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TransportError::InvalidEndpoint(base_url.to_owned()));
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            access_email: None,
        })
    }

    #[must_use]
    pub fn with_access_email(mut self, email: impl Into<String>) -> Self {
        self.access_email = Some(email.into());
        self
    }

    /// Reads `QUIZ_SYNC_ENDPOINT` and `QUIZ_SYNC_ACCESS_EMAIL`.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("QUIZ_SYNC_ENDPOINT").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let config = match Self::new(base_url.trim()) {
            Ok(config) => config,
            Err(err) => {
                warn!("ignoring QUIZ_SYNC_ENDPOINT: {err}");
                return None;
            }
        };
        Some(match env::var("QUIZ_SYNC_ACCESS_EMAIL") {
            Ok(email) if !email.trim().is_empty() => config.with_access_email(email.trim()),
            _ => config,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/sync/{path}", self.base_url)
    }
}

#[derive(Clone)]
pub struct HttpSyncTransport {
    client: Client,
    config: HttpSyncConfig,
}

impl HttpSyncTransport {
    #[must_use]
    pub fn new(config: HttpSyncConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn with_identity(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.access_email {
            Some(email) => request.header(ACCESS_EMAIL_HEADER, email),
            None => request,
        }
    }

    async fn read<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, TransportError> {
        if !response.status().is_success() {
            return Err(TransportError::HttpStatus(response.status()));
        }
        Ok(response.json().await?)
    }
}

#[derive(Debug, Deserialize)]
struct InitResponse {
    key: String,
}

#[async_trait]
impl SyncTransport for HttpSyncTransport {
    async fn init(&self) -> Result<String, TransportError> {
        let request = self.client.post(self.config.endpoint("init"));
        let response = self.with_identity(request).send().await?;
        let body: InitResponse = Self::read(response).await?;
        Ok(body.key)
    }

    async fn push(&self, delta: &SyncDelta) -> Result<SyncState, TransportError> {
        let request = self.client.post(self.config.endpoint("merge")).json(delta);
        let response = self.with_identity(request).send().await?;
        Self::read(response).await
    }

    async fn pull(&self, sync_key: &str) -> Result<SyncState, TransportError> {
        let request = self
            .client
            .get(self.config.endpoint("state"))
            .header(SYNC_KEY_HEADER, sync_key);
        let response = self.with_identity(request).send().await?;
        Self::read(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_requires_http_url() {
        assert!(HttpSyncConfig::new("ftp://example.com").is_err());
        assert!(HttpSyncConfig::new("not a url").is_err());
        let config = HttpSyncConfig::new("https://quiz.example.com/").unwrap();
        assert_eq!(config.endpoint("merge"), "https://quiz.example.com/api/sync/merge");
    }
}
