use async_trait::async_trait;
use intel_core::{IntelError, IntelResult, IntelligenceFetcher, RiskProfile};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::AgenticConfig;

#[derive(Debug, Clone, Serialize)]
struct QueryRequest<'a> {
    ticker: String,
    subscriber_risk_profile: &'a str,
}

/// HTTP client for the agentic AI market intelligence service
#[derive(Clone)]
pub struct AgenticClient {
    client: Client,
    base_url: String,
}

impl AgenticClient {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &AgenticConfig) -> Self {
        Self::new(config.base_url.clone(), config.timeout)
    }

    pub fn with_defaults() -> Self {
        Self::from_config(&AgenticConfig::default())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Query market intelligence for a ticker. Returns the raw wrapper payload.
    pub async fn query(&self, ticker: &str, profile: RiskProfile) -> IntelResult<Value> {
        let ticker = ticker.trim();
        if ticker.is_empty() {
            return Err(IntelError::InvalidRequest("Ticker is required".to_string()));
        }

        let request = QueryRequest {
            ticker: ticker.to_uppercase(),
            subscriber_risk_profile: profile.as_str(),
        };

        let response = self
            .client
            .post(format!("{}/api/v1/query", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = upstream_message(&body)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| "Unknown error".to_string());

            tracing::error!(
                "[AgenticAI] Error fetching market intelligence for {}: HTTP {} - {}",
                request.ticker,
                status,
                message
            );
            return Err(IntelError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                IntelError::Timeout
            } else {
                tracing::error!("[AgenticAI] Undecodable response body: {}", e);
                IntelError::InvalidUpstreamFormat
            }
        })
    }

    /// Check service health
    pub async fn health(&self) -> IntelResult<bool> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(classify_transport_error)?;

        Ok(response.status().is_success())
    }
}

#[async_trait]
impl IntelligenceFetcher for AgenticClient {
    async fn fetch(&self, ticker: &str, profile: RiskProfile) -> IntelResult<Value> {
        self.query(ticker, profile).await
    }
}

fn classify_transport_error(e: reqwest::Error) -> IntelError {
    if e.is_timeout() {
        tracing::error!("[AgenticAI] Request timed out: {}", e);
        IntelError::Timeout
    } else if e.is_connect() || e.is_request() {
        tracing::error!("[AgenticAI] No response: {}", e);
        IntelError::NoResponse
    } else {
        IntelError::Request(e.to_string())
    }
}

/// Error message from a JSON error body (`{"message": ...}`), if any
fn upstream_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}
