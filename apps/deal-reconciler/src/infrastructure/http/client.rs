//! HTTP client wrapper shared by the REST adapters.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::application::ports::FetchError;

/// Default request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin JSON client bound to one base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport {
                endpoint: base_url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self { client, base_url })
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and return the body text of a successful response.
    pub async fn get_text(&self, path: &str, query: &[(&str, String)]) -> Result<String, FetchError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(url = %url, params = query.len(), "GET");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| transport(path, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(path, status));
        }

        response.text().await.map_err(|e| transport(path, &e))
    }

    /// GET `path` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let text = self.get_text(path, query).await?;
        serde_json::from_str(&text).map_err(|e| FetchError::Decode {
            endpoint: path.to_string(),
            message: e.to_string(),
        })
    }

    /// POST a JSON body to `path`, ignoring the response body.
    pub async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(), FetchError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(url = %url, "POST");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| transport(path, &e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(status_error(path, status))
        }
    }
}

fn transport(path: &str, error: &reqwest::Error) -> FetchError {
    FetchError::Transport {
        endpoint: path.to_string(),
        message: error.to_string(),
    }
}

fn status_error(path: &str, status: StatusCode) -> FetchError {
    FetchError::Status {
        endpoint: path.to_string(),
        status: status.as_u16(),
    }
}
