//! Cloud control-plane REST client.
//!
//! This module provides the HTTP client for the provider's resource API.
//! The client owns transport-level policy: authentication, request
//! correlation, and bounded retry with linear backoff for transient
//! failures. Callers above this boundary never retry.

use reqwest::{Client, Response, StatusCode, header};
use std::time::Duration;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{ProviderError, Result, StratusError};

use super::types::{CreateResourceRequest, ResourceKind, ResourceRecord};

/// Default control-plane API base URL.
pub const DEFAULT_API_URL: &str = "https://api.stratus-cloud.io";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Control-plane API client.
#[derive(Debug, Clone)]
pub struct CloudClient {
    /// HTTP client.
    client: Client,
    /// API base URL.
    base_url: String,
    /// API key.
    api_key: String,
}

impl CloudClient {
    /// Creates a new control-plane client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: &str, base_url: &str) -> Result<Self> {
        Self::with_timeout(api_key, base_url, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(api_key: &str, base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProviderError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn resource_url(&self, kind: ResourceKind, name: &str) -> String {
        format!("{}/v1/{}/{name}", self.base_url, kind.api_segment())
    }

    /// Creates or updates a resource and returns the provider record.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails after retries.
    pub async fn put_resource(
        &self,
        kind: ResourceKind,
        name: &str,
        properties: &serde_json::Value,
    ) -> Result<ResourceRecord> {
        let url = self.resource_url(kind, name);
        let body = CreateResourceRequest {
            name: name.to_string(),
            properties: properties.clone(),
        };
        debug!("PUT {url}");

        let response = self
            .send_with_retry(|| self.client.put(&url).json(&body))
            .await?;
        let response = Self::check_status(response, kind, name).await?;
        Self::parse_record(response).await
    }

    /// Reads a resource record.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource does not exist or the call fails.
    pub async fn get_resource(&self, kind: ResourceKind, name: &str) -> Result<ResourceRecord> {
        let url = self.resource_url(kind, name);
        debug!("GET {url}");

        let response = self.send_with_retry(|| self.client.get(&url)).await?;
        let response = Self::check_status(response, kind, name).await?;
        Self::parse_record(response).await
    }

    /// Deletes a resource.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotFound`] if the resource does not exist,
    /// or another error if the call fails.
    pub async fn delete_resource(&self, kind: ResourceKind, name: &str) -> Result<()> {
        let url = self.resource_url(kind, name);
        debug!("DELETE {url}");

        let response = self.send_with_retry(|| self.client.delete(&url)).await?;
        Self::check_status(response, kind, name).await?;
        Ok(())
    }

    /// Sends a request, retrying transient failures with linear backoff.
    async fn send_with_retry(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<Response> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {MAX_RETRIES}");
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt)))
                    .await;
            }

            let correlation_id = Uuid::new_v4();
            trace!("Sending request (correlation id {correlation_id})");

            let outcome = build()
                .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
                .header("x-correlation-id", correlation_id.to_string())
                .send()
                .await;

            match outcome {
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = response
                        .headers()
                        .get(header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse().ok())
                        .unwrap_or_default();
                    let retry_after = if retry_after == 0 { 60 } else { retry_after };
                    last_error = Some(StratusError::Provider(ProviderError::RateLimited {
                        retry_after_secs: retry_after,
                    }));
                }
                Ok(response) => return Ok(response),
                Err(e) => {
                    last_error = Some(StratusError::Provider(ProviderError::network(format!(
                        "Request failed: {e}"
                    ))));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            StratusError::Provider(ProviderError::network("Max retries exceeded"))
        }))
    }

    /// Maps non-success statuses to provider errors.
    async fn check_status(response: Response, kind: ResourceKind, name: &str) -> Result<Response> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(StratusError::Provider(ProviderError::AuthenticationFailed {
                message: String::from("Invalid API key"),
            }));
        }

        if status == StatusCode::NOT_FOUND {
            return Err(StratusError::Provider(ProviderError::NotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            }));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StratusError::Provider(ProviderError::api_error(
                status.as_u16(),
                body,
            )));
        }

        Ok(response)
    }

    /// Parses a resource record from a response body.
    async fn parse_record(response: Response) -> Result<ResourceRecord> {
        response.json().await.map_err(|e| {
            StratusError::Provider(ProviderError::InvalidResponse {
                message: format!("Failed to parse response: {e}"),
            })
        })
    }
}
