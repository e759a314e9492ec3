use crate::error::{TacopsError, TacopsResult};
use crate::ids::{ReportId, SoldierId, UnitId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Report type tag. The set is open: unrecognised tags are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReportType {
    Sitrep,
    Casevac,
    Eoincrep,
    Frago,
    Spotrep,
    Intrep,
    Intelligence,
    Medevac,
    Contact,
    Logstat,
    Opord,
    Other(String),
}

impl ReportType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Sitrep => "SITREP",
            Self::Casevac => "CASEVAC",
            Self::Eoincrep => "EOINCREP",
            Self::Frago => "FRAGO",
            Self::Spotrep => "SPOTREP",
            Self::Intrep => "INTREP",
            Self::Intelligence => "INTELLIGENCE",
            Self::Medevac => "MEDEVAC",
            Self::Contact => "CONTACT",
            Self::Logstat => "LOGSTAT",
            Self::Opord => "OPORD",
            Self::Other(value) => value,
        }
    }

    pub fn category(&self) -> ReportCategory {
        match self {
            Self::Casevac | Self::Medevac => ReportCategory::Medical,
            Self::Eoincrep | Self::Spotrep | Self::Contact => ReportCategory::Threat,
            Self::Intrep | Self::Intelligence => ReportCategory::Intel,
            Self::Sitrep | Self::Logstat => ReportCategory::Status,
            Self::Frago | Self::Opord | Self::Other(_) => ReportCategory::Other,
        }
    }
}

impl From<String> for ReportType {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "SITREP" => Self::Sitrep,
            "CASEVAC" => Self::Casevac,
            "EOINCREP" => Self::Eoincrep,
            "FRAGO" => Self::Frago,
            "SPOTREP" => Self::Spotrep,
            "INTREP" => Self::Intrep,
            "INTELLIGENCE" => Self::Intelligence,
            "MEDEVAC" => Self::Medevac,
            "CONTACT" => Self::Contact,
            "LOGSTAT" => Self::Logstat,
            "OPORD" => Self::Opord,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for ReportType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ReportType> for String {
    fn from(value: ReportType) -> Self {
        match value {
            ReportType::Other(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse grouping used by the dashboard to badge report rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportCategory {
    Medical,
    Threat,
    Intel,
    Status,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub report_id: ReportId,
    pub soldier_id: SoldierId,
    pub unit_id: UnitId,
    pub timestamp: String,
    pub report_type: ReportType,
    /// Type-specific payload; the backend serves it either as an embedded
    /// JSON string or as an object.
    #[serde(default)]
    pub structured_json: Value,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soldier_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_name: Option<String>,
}

impl Report {
    pub fn payload(&self) -> TacopsResult<Value> {
        match &self.structured_json {
            Value::String(raw) => serde_json::from_str(raw).map_err(|err| {
                TacopsError::parse(format!(
                    "report {} carries malformed structured_json: {err}",
                    self.report_id
                ))
            }),
            other => Ok(other.clone()),
        }
    }

    /// One-line human readable summary of the payload.
    pub fn summary(&self) -> String {
        const SUMMARY_KEYS: [&str; 4] =
            ["description", "status", "observation", "engagement_status"];

        let fallback = || format!("{} report", self.report_type);
        let Ok(payload) = self.payload() else {
            return fallback();
        };
        SUMMARY_KEYS
            .iter()
            .find_map(|key| match payload.get(key) {
                Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
                Some(Value::Null | Value::String(_)) | None => None,
                Some(Value::Bool(false)) => None,
                Some(other) => Some(other.to_string()),
            })
            .unwrap_or_else(fallback)
    }

    pub fn confidence_percent(&self) -> u32 {
        (self.confidence.clamp(0.0, 1.0) * 100.0).round() as u32
    }

    pub fn author_name(&self) -> &str {
        self.soldier_name.as_deref().unwrap_or("Unknown")
    }
}

/// New report submitted on behalf of a soldier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReport {
    pub report_type: ReportType,
    pub structured_json: Value,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportTypeCount {
    pub report_type: ReportType,
    pub count: usize,
}

/// Counts per report type, in the order each type first appears.
pub fn count_by_type(reports: &[Report]) -> Vec<ReportTypeCount> {
    let mut counts: Vec<ReportTypeCount> = Vec::new();
    for report in reports {
        match counts
            .iter_mut()
            .find(|entry| entry.report_type == report.report_type)
        {
            Some(entry) => entry.count += 1,
            None => counts.push(ReportTypeCount {
                report_type: report.report_type.clone(),
                count: 1,
            }),
        }
    }
    counts
}
