//! HTTP client for the NASA open-data APIs.
//!
//! Requests are retried only on 429, waiting for the `Retry-After` the
//! upstream names. Everything else fails on the first attempt.

use std::time::{Duration, Instant};

use apogee_core::{
    ApodRecord, ApogeeError, ApogeeResult, ConfigError, NeoRecord, PeriodKey, Rover, RoverPhoto,
    UpstreamError,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{header::RETRY_AFTER, StatusCode};
use serde::de::DeserializeOwned;

use super::models::{
    ApodResponse, ManifestPayload, ManifestResponse, NeoFeedResponse, PhotosResponse,
};
use super::source::{ApodQuery, UpstreamSource};
use crate::config::NasaConfig;
use crate::constants::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_AFTER_SECS};
use crate::telemetry::metrics::with_metrics;

/// Upstream error bodies are logged and returned; keep them short.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// How rate-limited requests are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Wait used when a 429 carries no integer `Retry-After`.
    pub default_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            default_retry_after: Duration::from_secs(DEFAULT_RETRY_AFTER_SECS),
        }
    }
}

impl RetryPolicy {
    /// Wait named by a `Retry-After` header value in whole seconds.
    /// HTTP-date values are not understood and fall back to the default.
    pub fn retry_after(&self, header: Option<&str>) -> Duration {
        header
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.default_retry_after)
    }
}

/// Which metric label a request counts under.
#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Manifest,
    Photos,
    Apod,
    NeoFeed,
}

impl Endpoint {
    fn label(self) -> &'static str {
        match self {
            Endpoint::Manifest => "manifest",
            Endpoint::Photos => "photos",
            Endpoint::Apod => "apod",
            Endpoint::NeoFeed => "neo_feed",
        }
    }
}

fn outcome_label(result: &ApogeeResult<impl Sized>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(ApogeeError::Upstream(UpstreamError::RateLimited { .. })) => "rate_limited",
        Err(ApogeeError::Upstream(UpstreamError::RequestFailed { .. })) => "failed",
        Err(ApogeeError::Upstream(UpstreamError::Transport { .. })) => "transport",
        Err(ApogeeError::Upstream(UpstreamError::InvalidResponse { .. })) => "invalid",
        Err(ApogeeError::Config(_)) => "unconfigured",
        Err(_) => "error",
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        body.to_string()
    } else {
        let mut short: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        short.push('…');
        short
    }
}

/// reqwest-backed [`UpstreamSource`].
#[derive(Clone)]
pub struct NasaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for NasaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NasaClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("retry", &self.retry)
            .finish()
    }
}

impl NasaClient {
    pub fn new(config: &NasaConfig) -> ApogeeResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("apogee/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "http_client".to_string(),
                value: String::new(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            retry: RetryPolicy {
                max_attempts: config.max_attempts.max(1),
                default_retry_after: config.default_retry_after,
            },
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// GET `path` and decode the body as `T`, retrying on 429.
    ///
    /// `path` doubles as the error `endpoint`; the API key never appears in it.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        path: &str,
        params: &[(&'static str, String)],
    ) -> ApogeeResult<T> {
        let start = Instant::now();
        let result = self.get_json_inner(endpoint, path, params).await;
        let outcome = outcome_label(&result);
        with_metrics(|m| {
            m.record_upstream_request(endpoint.label(), outcome, start.elapsed().as_secs_f64())
        });
        result
    }

    async fn get_json_inner<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        path: &str,
        params: &[(&'static str, String)],
    ) -> ApogeeResult<T> {
        let api_key = self.api_key.as_deref().ok_or_else(|| ConfigError::MissingRequired {
            field: "NASA_API_KEY".to_string(),
        })?;
        let url = format!("{}{}", self.base_url, path);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = self
                .http
                .get(&url)
                .query(params)
                .query(&[("api_key", api_key)])
                .send()
                .await
                .map_err(|e| UpstreamError::Transport {
                    endpoint: path.to_string(),
                    reason: e.to_string(),
                })?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                let header = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok());
                let wait = self.retry.retry_after(header);

                if attempt >= self.retry.max_attempts {
                    tracing::error!(
                        endpoint = %path,
                        attempts = attempt,
                        "Upstream still rate limiting after all attempts"
                    );
                    return Err(UpstreamError::RateLimited {
                        endpoint: path.to_string(),
                        attempts: attempt,
                        retry_after_secs: wait.as_secs(),
                    }
                    .into());
                }

                tracing::warn!(
                    endpoint = %path,
                    attempt = attempt,
                    max_attempts = self.retry.max_attempts,
                    retry_after_secs = wait.as_secs(),
                    "Rate limited by upstream, waiting before retry"
                );
                with_metrics(|m| m.record_upstream_retry(endpoint.label()));
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(
                    endpoint = %path,
                    status = status.as_u16(),
                    attempt = attempt,
                    "Upstream request failed"
                );
                return Err(UpstreamError::RequestFailed {
                    endpoint: path.to_string(),
                    status: status.as_u16(),
                    body: truncate(&body),
                }
                .into());
            }

            let bytes = response.bytes().await.map_err(|e| UpstreamError::Transport {
                endpoint: path.to_string(),
                reason: e.to_string(),
            })?;

            tracing::debug!(endpoint = %path, attempt = attempt, bytes = bytes.len(), "Upstream request succeeded");

            return serde_json::from_slice::<T>(&bytes).map_err(|e| {
                UpstreamError::InvalidResponse {
                    endpoint: path.to_string(),
                    reason: e.to_string(),
                }
                .into()
            });
        }
    }
}

#[async_trait]
impl UpstreamSource for NasaClient {
    async fn fetch_manifest(&self, rover: Rover) -> ApogeeResult<ManifestPayload> {
        let path = format!("/mars-photos/api/v1/manifests/{}", rover);
        let raw: serde_json::Value = self.get_json(Endpoint::Manifest, &path, &[]).await?;
        let response: ManifestResponse =
            serde_json::from_value(raw.clone()).map_err(|e| UpstreamError::InvalidResponse {
                endpoint: path.clone(),
                reason: e.to_string(),
            })?;
        tracing::debug!(
            rover = %rover,
            manifest_rover = %response.photo_manifest.name,
            sols = response.photo_manifest.photos.len(),
            max_sol = ?response.photo_manifest.max_sol,
            "Fetched rover manifest"
        );
        Ok(ManifestPayload::from_response(&response, raw))
    }

    async fn fetch_items(
        &self,
        rover: Rover,
        period_key: PeriodKey,
        category: Option<&str>,
    ) -> ApogeeResult<Vec<RoverPhoto>> {
        let path = format!("/mars-photos/api/v1/rovers/{}/photos", rover);
        let mut params = vec![("sol", period_key.to_string())];
        if let Some(camera) = category {
            params.push(("camera", camera.to_string()));
        }
        let response: PhotosResponse = self.get_json(Endpoint::Photos, &path, &params).await?;
        Ok(response
            .photos
            .into_iter()
            .map(|p| p.into_photo(rover))
            .collect())
    }

    async fn fetch_apod_range(&self, query: ApodQuery) -> ApogeeResult<Vec<ApodRecord>> {
        let response: ApodResponse = self
            .get_json(Endpoint::Apod, "/planetary/apod", &query.to_params())
            .await?;
        Ok(response
            .into_vec()
            .into_iter()
            .map(ApodRecord::from)
            .filter(ApodRecord::is_image)
            .collect())
    }

    async fn fetch_apod(&self, date: NaiveDate) -> ApogeeResult<Option<ApodRecord>> {
        let params = [("date", date.format("%Y-%m-%d").to_string())];
        let response: ApodResponse = self
            .get_json(Endpoint::Apod, "/planetary/apod", &params)
            .await?;
        Ok(response
            .into_vec()
            .into_iter()
            .map(ApodRecord::from)
            .find(|r| r.date == date)
            .filter(ApodRecord::is_image))
    }

    async fn fetch_neo_feed(&self, start: NaiveDate, end: NaiveDate) -> ApogeeResult<Vec<NeoRecord>> {
        let params = [
            ("start_date", start.format("%Y-%m-%d").to_string()),
            ("end_date", end.format("%Y-%m-%d").to_string()),
        ];
        let response: NeoFeedResponse = self
            .get_json(Endpoint::NeoFeed, "/neo/rest/v1/feed", &params)
            .await?;
        tracing::debug!(element_count = ?response.element_count, "Fetched NEO feed");
        Ok(response.into_records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_parsing() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retry_after(Some("2")), Duration::from_secs(2));
        assert_eq!(policy.retry_after(Some(" 15 ")), Duration::from_secs(15));
        assert_eq!(policy.retry_after(Some("soon")), Duration::from_secs(60));
        assert_eq!(
            policy.retry_after(Some("Wed, 21 Oct 2015 07:28:00 GMT")),
            Duration::from_secs(60)
        );
        assert_eq!(policy.retry_after(None), Duration::from_secs(60));
    }

    #[test]
    fn test_debug_redacts_key() -> ApogeeResult<()> {
        let client = NasaClient::new(&NasaConfig {
            api_key: Some("super-secret".to_string()),
            ..NasaConfig::default()
        })?;
        let debug = format!("{:?}", client);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_io() -> ApogeeResult<()> {
        let client = NasaClient::new(&NasaConfig {
            api_key: None,
            // Unroutable: a request attempt would surface as a transport error.
            base_url: "http://127.0.0.1:9".to_string(),
            ..NasaConfig::default()
        })?;
        let err = client.fetch_manifest(Rover::Spirit).await.err();
        assert!(matches!(err, Some(ApogeeError::Config(ConfigError::MissingRequired { .. }))));
        Ok(())
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(MAX_ERROR_BODY_CHARS + 10);
        assert_eq!(truncate(&body).chars().count(), MAX_ERROR_BODY_CHARS + 1);
        assert_eq!(truncate("short"), "short");
    }
}
