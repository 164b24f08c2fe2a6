use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntelError {
    #[error("Invalid response format from agentic AI service")]
    InvalidUpstreamFormat,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Agentic AI service error: {status} - {message}")]
    Upstream { status: u16, message: String },

    #[error("No response from agentic AI service. Please try again later.")]
    NoResponse,

    #[error("Agentic AI service timed out")]
    Timeout,

    #[error("Failed to fetch market intelligence: {0}")]
    Request(String),
}

pub type IntelResult<T> = Result<T, IntelError>;
