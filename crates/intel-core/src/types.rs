use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Subscriber risk profile, as understood by the agentic AI service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskProfile {
    Low,
    #[default]
    Moderate,
    High,
}

impl RiskProfile {
    /// Map a stored user/subscriber setting ("Low", "Medium", "High") to the
    /// upstream profile. Unknown or empty values fall back to Moderate.
    pub fn from_user_setting(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "LOW" => RiskProfile::Low,
            "MEDIUM" | "MODERATE" => RiskProfile::Moderate,
            "HIGH" => RiskProfile::High,
            _ => RiskProfile::Moderate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskProfile::Low => "LOW",
            RiskProfile::Moderate => "MODERATE",
            RiskProfile::High => "HIGH",
        }
    }

    /// Key of the per-profile suitability view inside `risk_assessment`
    pub fn view_key(&self) -> &'static str {
        match self {
            RiskProfile::Low => "low_risk_subscriber_view",
            RiskProfile::Moderate => "moderate_risk_subscriber_view",
            RiskProfile::High => "high_risk_subscriber_view",
        }
    }
}

impl std::fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market chatter sentiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub score: f64,
    pub label: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BullCase {
    pub summary: String,
    pub signals: Vec<Value>,
    pub data_quality: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BearCase {
    pub summary: String,
    pub risks: Vec<Value>,
    pub data_quality: Value,
}

/// Whether the analysis suits the subscriber's risk profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suitability {
    pub is_match: bool,
    pub explanation: String,
    pub warning: Option<String>,
}

impl Default for Suitability {
    fn default() -> Self {
        Self {
            is_match: true,
            explanation: "Risk assessment completed".to_string(),
            warning: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub overall_risk: String,
    pub suitability: Suitability,
    /// Raw upstream risk assessment, kept for fields not modeled here
    pub full_assessment: Value,
}

/// Availability of the financial statements behind the analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuality {
    pub financials_available: bool,
    pub reason: String,
    pub details: String,
    pub suggestions: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntelligenceMetadata {
    pub processing_time_ms: f64,
    pub ingestion_triggered: bool,
}

/// Stable, fully-populated shape of one market intelligence analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedIntelligenceRecord {
    pub ticker: String,
    pub analysis_date: String,
    pub sentiment: Sentiment,
    pub bull_case: BullCase,
    pub bear_case: BearCase,
    pub risk_assessment: RiskAssessment,
    pub data_quality: DataQuality,
    pub metadata: IntelligenceMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_profile_from_user_setting() {
        assert_eq!(RiskProfile::from_user_setting("Low"), RiskProfile::Low);
        assert_eq!(RiskProfile::from_user_setting("Medium"), RiskProfile::Moderate);
        assert_eq!(RiskProfile::from_user_setting("moderate"), RiskProfile::Moderate);
        assert_eq!(RiskProfile::from_user_setting("HIGH"), RiskProfile::High);
        assert_eq!(RiskProfile::from_user_setting(""), RiskProfile::Moderate);
        assert_eq!(RiskProfile::from_user_setting("yolo"), RiskProfile::Moderate);
    }

    #[test]
    fn test_risk_profile_wire_names() {
        assert_eq!(RiskProfile::High.as_str(), "HIGH");
        assert_eq!(RiskProfile::Low.view_key(), "low_risk_subscriber_view");
        assert_eq!(
            serde_json::to_value(RiskProfile::Moderate).unwrap(),
            serde_json::json!("MODERATE")
        );
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let suitability = serde_json::to_value(Suitability::default()).unwrap();
        assert_eq!(suitability["isMatch"], true);
        assert_eq!(suitability["explanation"], "Risk assessment completed");
        assert!(suitability["warning"].is_null());
    }
}
