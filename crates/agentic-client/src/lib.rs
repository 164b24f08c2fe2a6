pub mod client;

pub use client::AgenticClient;

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8005";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the agentic AI market intelligence service
#[derive(Debug, Clone)]
pub struct AgenticConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for AgenticConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("AGENTIC_AI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}
