//! Market Intelligence Routes
//!
//! Cached, normalized access to the agentic AI market intelligence service.

use axum::{
    extract::State,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use intel_cache::CacheStats;
use intel_core::{IntelError, IntelligenceNormalizer, NormalizedIntelligenceRecord, RiskProfile};
use serde::{Deserialize, Serialize};

use crate::{auth, ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct MarketIntelligenceRequest {
    #[serde(default)]
    pub ticker: Option<String>,
    /// Subscriber setting ("Low", "Medium", "High"); defaults to moderate
    #[serde(default)]
    pub risk_profile: Option<String>,
}

#[derive(Serialize)]
pub struct MarketIntelligenceResponse {
    pub status: &'static str,
    pub data: NormalizedIntelligenceRecord,
    pub cached: bool,
}

pub fn intelligence_routes() -> Router<AppState> {
    Router::new()
        .route("/api/market-intelligence", post(get_market_intelligence))
        .route("/api/market-intelligence/cache/stats", get(get_cache_stats))
        .route(
            "/api/market-intelligence/cache",
            delete(clear_cache).layer(middleware::from_fn(auth::require_admin_middleware)),
        )
}

async fn get_market_intelligence(
    State(state): State<AppState>,
    Json(request): Json<MarketIntelligenceRequest>,
) -> Result<Json<MarketIntelligenceResponse>, AppError> {
    let ticker = request
        .ticker
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| IntelError::InvalidRequest("Ticker is required".to_string()))?
        .to_uppercase();

    let profile = request
        .risk_profile
        .as_deref()
        .map(RiskProfile::from_user_setting)
        .unwrap_or_default();

    tracing::info!(
        "[MarketIntelligence] Request for {} with risk profile: {}",
        ticker,
        profile
    );

    let (data, cached) = fetch_intelligence(&state, &ticker, profile, Utc::now().date_naive()).await?;

    Ok(Json(MarketIntelligenceResponse {
        status: "success",
        data,
        cached,
    }))
}

/// Serve from cache, or fetch, normalize and cache.
///
/// The lookup uses `today`, the insert uses the record's own analysis date,
/// so an upstream analysis dated differently is not served from cache on the
/// next request for today.
pub async fn fetch_intelligence(
    state: &AppState,
    ticker: &str,
    profile: RiskProfile,
    today: NaiveDate,
) -> Result<(NormalizedIntelligenceRecord, bool), IntelError> {
    let analysis_date = today.format("%Y-%m-%d").to_string();

    if let Some(cached) = state.intel_cache.get(ticker, &analysis_date, profile.as_str()) {
        tracing::info!("[MarketIntelligence] Cache hit for {} on {}", ticker, analysis_date);
        return Ok((cached, true));
    }

    tracing::info!("[MarketIntelligence] Fetching from agentic AI service for {}...", ticker);
    let raw = state.fetcher.fetch(ticker, profile).await?;

    let record = IntelligenceNormalizer::new(profile)
        .with_fallback_date(today)
        .normalize(&raw)?;

    state.intel_cache.set(
        ticker,
        &record.analysis_date,
        profile.as_str(),
        record.clone(),
    );
    tracing::info!(
        "[MarketIntelligence] Successfully fetched and cached intelligence for {}",
        ticker
    );

    Ok((record, false))
}

async fn get_cache_stats(State(state): State<AppState>) -> Json<ApiResponse<CacheStats>> {
    Json(ApiResponse::success(state.intel_cache.stats()))
}

async fn clear_cache(State(state): State<AppState>) -> Json<ApiResponse<String>> {
    let removed = state.intel_cache.len();
    state.intel_cache.clear();
    tracing::info!("[MarketIntelligence] Cache cleared ({} entries)", removed);
    Json(ApiResponse::success(format!("Cleared {} cache entries", removed)))
}
