//! Normalization of agentic AI market intelligence payloads
//!
//! The upstream fields are LLM-generated and inconsistently typed: `bull_case`
//! and `bear_case` arrive sometimes as JSON text and sometimes already decoded,
//! and most other fields may be missing. Everything below the top-level `data`
//! field degrades to a default instead of failing.

use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};

use crate::{
    BearCase, BullCase, DataQuality, IntelError, IntelResult, IntelligenceMetadata,
    NormalizedIntelligenceRecord, RiskAssessment, RiskProfile, Sentiment, Suitability,
};

const NO_BULL_CASE: &str = "No bull case data available";
const NO_BEAR_CASE: &str = "No bear case data available";
const NO_CHATTER_SUMMARY: &str = "No market chatter summary available";
const UNKNOWN_FINANCIALS: &str = "Financial data status unknown";

/// A `bull_case` / `bear_case` sub-payload as received from upstream
#[derive(Debug, Clone, PartialEq)]
pub enum CasePayload {
    Absent,
    Text(String),
    Structured(Map<String, Value>),
}

/// Decoded case fields: summary, signal/risk list, data quality
struct CaseFields {
    summary: String,
    items: Vec<Value>,
    data_quality: Value,
}

impl CasePayload {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Object(map)) => CasePayload::Structured(map.clone()),
            Some(Value::String(text)) if !text.trim().is_empty() => {
                CasePayload::Text(text.clone())
            }
            _ => CasePayload::Absent,
        }
    }

    fn decode(self, field: &str, default_summary: &str, items_key: &str) -> CaseFields {
        let map = match self {
            CasePayload::Absent => Map::new(),
            CasePayload::Structured(map) => map,
            CasePayload::Text(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    tracing::warn!("[Normalize] {} is not a JSON object, keeping raw text", field);
                    return CaseFields::degraded(text);
                }
                Err(e) => {
                    tracing::warn!("[Normalize] Failed to parse {}: {}", field, e);
                    return CaseFields::degraded(text);
                }
            },
        };

        CaseFields {
            summary: non_empty_str(&map, "summary")
                .unwrap_or(default_summary)
                .to_string(),
            items: list_field(&map, items_key),
            data_quality: map
                .get("data_quality")
                .filter(|v| !v.is_null())
                .cloned()
                .unwrap_or_else(empty_object),
        }
    }
}

impl CaseFields {
    fn degraded(raw: String) -> Self {
        Self {
            summary: raw,
            items: Vec::new(),
            data_quality: empty_object(),
        }
    }
}

/// Converts raw upstream payloads into [`NormalizedIntelligenceRecord`]s.
///
/// The risk profile selects which per-profile suitability view is read from
/// `risk_assessment`; the fallback date fills `analysisDate` when upstream
/// omits `analysis_date`.
#[derive(Debug, Clone)]
pub struct IntelligenceNormalizer {
    profile: RiskProfile,
    fallback_date: NaiveDate,
}

impl IntelligenceNormalizer {
    pub fn new(profile: RiskProfile) -> Self {
        Self {
            profile,
            fallback_date: Utc::now().date_naive(),
        }
    }

    pub fn with_fallback_date(mut self, date: NaiveDate) -> Self {
        self.fallback_date = date;
        self
    }

    pub fn normalize(&self, raw: &Value) -> IntelResult<NormalizedIntelligenceRecord> {
        let data = match raw.get("data") {
            None | Some(Value::Null) => return Err(IntelError::InvalidUpstreamFormat),
            Some(data) => data,
        };

        let empty = Map::new();
        let data = data.as_object().unwrap_or(&empty);

        let bull = CasePayload::from_value(data.get("bull_case")).decode(
            "bull_case",
            NO_BULL_CASE,
            "key_signals",
        );
        let bear = CasePayload::from_value(data.get("bear_case")).decode(
            "bear_case",
            NO_BEAR_CASE,
            "key_risks",
        );

        Ok(NormalizedIntelligenceRecord {
            ticker: non_empty_str(data, "ticker").unwrap_or_default().to_string(),
            analysis_date: non_empty_str(data, "analysis_date")
                .map(str::to_string)
                .unwrap_or_else(|| self.fallback_date.format("%Y-%m-%d").to_string()),
            sentiment: Sentiment {
                score: number_field(data, "sentiment_score"),
                label: non_empty_str(data, "sentiment_label")
                    .unwrap_or("neutral")
                    .to_string(),
                summary: non_empty_str(data, "market_chatter_summary")
                    .unwrap_or(NO_CHATTER_SUMMARY)
                    .to_string(),
            },
            bull_case: BullCase {
                summary: bull.summary,
                signals: bull.items,
                data_quality: bull.data_quality,
            },
            bear_case: BearCase {
                summary: bear.summary,
                risks: bear.items,
                data_quality: bear.data_quality,
            },
            risk_assessment: self.risk_assessment(data),
            data_quality: data_quality(data),
            metadata: IntelligenceMetadata {
                processing_time_ms: number_field(data, "processing_time_ms"),
                ingestion_triggered: data.get("ingestion_triggered") == Some(&Value::Bool(true)),
            },
        })
    }

    fn risk_assessment(&self, data: &Map<String, Value>) -> RiskAssessment {
        let full = data
            .get("risk_assessment")
            .filter(|v| v.is_object())
            .cloned()
            .unwrap_or_else(empty_object);

        let empty = Map::new();
        let assessment = full.as_object().unwrap_or(&empty);

        let suitability = match assessment
            .get(self.profile.view_key())
            .and_then(Value::as_object)
        {
            Some(view) => Suitability {
                is_match: view.get("is_match") != Some(&Value::Bool(false)),
                explanation: non_empty_str(view, "explanation")
                    .unwrap_or_default()
                    .to_string(),
                warning: non_empty_str(view, "warning").map(str::to_string),
            },
            None => Suitability::default(),
        };

        RiskAssessment {
            overall_risk: non_empty_str(assessment, "overall_risk")
                .unwrap_or("UNKNOWN")
                .to_string(),
            suitability,
            full_assessment: full.clone(),
        }
    }
}

/// Normalize a payload using the moderate-risk suitability view and today's
/// date as the fallback analysis date.
pub fn normalize_market_intelligence(raw: &Value) -> IntelResult<NormalizedIntelligenceRecord> {
    IntelligenceNormalizer::new(RiskProfile::Moderate).normalize(raw)
}

fn data_quality(data: &Map<String, Value>) -> DataQuality {
    let empty = Map::new();
    let metrics = ["latest_financial_metrics", "financial_metrics"]
        .iter()
        .find_map(|key| data.get(*key).and_then(Value::as_object))
        .unwrap_or(&empty);

    DataQuality {
        financials_available: metrics.get("available") == Some(&Value::Bool(true)),
        reason: non_empty_str(metrics, "reason")
            .unwrap_or(UNKNOWN_FINANCIALS)
            .to_string(),
        details: non_empty_str(metrics, "details")
            .unwrap_or_default()
            .to_string(),
        suggestions: list_field(metrics, "suggestions"),
    }
}

fn non_empty_str<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn list_field(map: &Map<String, Value>, key: &str) -> Vec<Value> {
    map.get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Numbers may arrive as JSON numbers or numeric strings
fn number_field(map: &Map<String, Value>, key: &str) -> f64 {
    match map.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
