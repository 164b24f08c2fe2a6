use async_trait::async_trait;
use serde_json::Value;

use crate::{IntelResult, RiskProfile};

/// Source of raw market intelligence payloads (the agentic AI service)
#[async_trait]
pub trait IntelligenceFetcher: Send + Sync {
    /// Fetch the raw wrapper payload for a ticker and subscriber risk profile
    async fn fetch(&self, ticker: &str, profile: RiskProfile) -> IntelResult<Value>;
}
