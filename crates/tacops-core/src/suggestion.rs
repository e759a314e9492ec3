use crate::documents::DocumentKind;
use crate::ids::{ReportId, SuggestionId, UnitId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestionType {
    Casevac,
    Eoincrep,
    EoincrepEod,
}

impl SuggestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Casevac => "CASEVAC",
            Self::Eoincrep => "EOINCREP",
            Self::EoincrepEod => "EOINCREP_EOD",
        }
    }

    /// Form builder a suggestion of this type routes into.
    pub fn document_kind(self) -> DocumentKind {
        match self {
            Self::Casevac => DocumentKind::Casevac,
            Self::Eoincrep | Self::EoincrepEod => DocumentKind::Eoincrep,
        }
    }

    pub fn label(self) -> String {
        self.as_str().replacen('_', " ", 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    Urgent,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    DraftCreated,
    Approved,
    Dismissed,
    #[serde(other)]
    Unknown,
}

impl Default for SuggestionStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Backend-proposed recommendation to draft a specific report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub suggestion_id: SuggestionId,
    pub suggestion_type: SuggestionType,
    pub urgency: Urgency,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub source_reports: Vec<ReportId>,
    #[serde(default)]
    pub status: SuggestionStatus,
    #[serde(default)]
    pub created_at: Option<String>,
    pub unit_id: UnitId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fields: Option<Value>,
}

impl Suggestion {
    pub fn alert_title(&self) -> String {
        format!("{} RECOMMENDED", self.suggestion_type.as_str())
    }

    pub fn confidence_percent(&self) -> u32 {
        (self.confidence.clamp(0.0, 1.0) * 100.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_backend_suggestion_row() {
        let suggestion: Suggestion = serde_json::from_value(json!({
            "suggestion_id": "sg-1",
            "suggestion_type": "EOINCREP_EOD",
            "urgency": "URGENT",
            "reason": "IED reported on MSR",
            "confidence": 0.9,
            "source_reports": ["R1", "R2"],
            "status": "pending",
            "created_at": "2025-01-01T10:00:00",
            "unit_id": "C1",
            "dismissed_at": null
        }))
        .unwrap();
        assert_eq!(suggestion.suggestion_type.document_kind(), DocumentKind::Eoincrep);
        assert_eq!(suggestion.suggestion_type.label(), "EOINCREP EOD");
        assert_eq!(suggestion.alert_title(), "EOINCREP_EOD RECOMMENDED");
        assert_eq!(suggestion.source_reports.len(), 2);
        assert_eq!(suggestion.status, SuggestionStatus::Pending);
    }
}
