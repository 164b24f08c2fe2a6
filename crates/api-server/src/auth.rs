use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::AppState;

/// Keys are stored and compared as SHA-256 hex digests.
pub(crate) fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod auth_tests;

/// Role hierarchy for API keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    Viewer = 0,
    Admin = 1,
}

impl Role {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "viewer" => Some(Role::Viewer),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Viewer => write!(f, "viewer"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// API key authentication middleware.
///
/// Accepts the key from `X-API-Key` or `Authorization: Bearer <token>`.
/// With no keys configured every request passes (development mode).
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if state.api_keys.is_empty() {
        return Ok(next.run(request).await);
    }

    let api_key = extract_api_key(&headers)?;

    let role = match state.api_keys.get(&hash_key(&api_key)) {
        Some(role) => *role,
        None => {
            tracing::warn!("Invalid API key attempted: {}", mask_api_key(&api_key));
            return Err(AuthError::InvalidApiKey);
        }
    };

    tracing::debug!("Valid API key: {} (role: {})", mask_api_key(&api_key), role);

    request
        .extensions_mut()
        .insert(ValidatedApiKey { role });

    Ok(next.run(request).await)
}

pub(crate) fn extract_api_key(headers: &HeaderMap) -> Result<String, AuthError> {
    if let Some(key) = headers
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .filter(|k| !k.is_empty())
    {
        return Ok(key.to_string());
    }

    if let Some(token) = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
    {
        return Ok(token.to_string());
    }

    Err(AuthError::MissingApiKey)
}

/// Parse `API_KEYS` into hashed keys with roles.
///
/// Format: `key1:admin,key2:viewer,key3`. A key without a role (or with an
/// unknown one) is an admin key.
pub fn parse_api_keys(raw: &str) -> HashMap<String, Role> {
    raw.split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }

            match entry.split_once(':') {
                Some((key, role)) => Some((
                    hash_key(key.trim()),
                    Role::from_str(role.trim()).unwrap_or(Role::Admin),
                )),
                None => Some((hash_key(entry), Role::Admin)),
            }
        })
        .collect()
}

/// Mask API key for logging (first and last 4 characters)
pub(crate) fn mask_api_key(key: &str) -> String {
    if key.len() <= 8 || !key.is_ascii() {
        return "****".to_string();
    }
    format!("{}...{}", &key[..4], &key[key.len() - 4..])
}

/// Role of the key that authenticated the request
#[derive(Clone, Debug)]
pub struct ValidatedApiKey {
    pub role: Role,
}

#[derive(Debug)]
pub enum AuthError {
    MissingApiKey,
    InvalidApiKey,
    InsufficientRole(Role),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingApiKey => write!(f, "Missing API key"),
            AuthError::InvalidApiKey => write!(f, "Invalid API key"),
            AuthError::InsufficientRole(role) => {
                write!(f, "Insufficient permissions. Required role: {}", role)
            }
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingApiKey => (
                StatusCode::UNAUTHORIZED,
                "Missing API key. Provide via X-API-Key header or Authorization: Bearer header."
                    .to_string(),
            ),
            AuthError::InvalidApiKey => (StatusCode::FORBIDDEN, "Invalid API key.".to_string()),
            AuthError::InsufficientRole(required_role) => (
                StatusCode::FORBIDDEN,
                format!("Insufficient permissions. Required role: {}", required_role),
            ),
        };

        (
            status,
            Json(json!({
                "success": false,
                "error": message,
            })),
        )
            .into_response()
    }
}

fn check_role(required: Role, request: &Request) -> Result<(), AuthError> {
    match request.extensions().get::<ValidatedApiKey>() {
        Some(key) if key.role >= required => Ok(()),
        Some(_) => Err(AuthError::InsufficientRole(required)),
        None => Ok(()), // development mode
    }
}

/// Middleware to require the admin role (cache maintenance)
pub async fn require_admin_middleware(request: Request, next: Next) -> Result<Response, AuthError> {
    check_role(Role::Admin, &request)?;
    Ok(next.run(request).await)
}
