//! Request and response bodies exchanged with the report backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tacops_core::{
    DocumentKind, RawInput, Report, ReportId, ReportType, Soldier, SoldierId, Suggestion,
    SuggestionId, TreeNode, UnitId, UnitRecord,
};

#[derive(Debug, Deserialize)]
pub(crate) struct HierarchyEnvelope {
    #[serde(default)]
    pub hierarchy: Vec<UnitRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SoldiersEnvelope {
    #[serde(default)]
    pub soldiers: Vec<Soldier>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawInputsEnvelope {
    #[serde(default)]
    pub raw_inputs: Vec<RawInput>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReportsEnvelope {
    #[serde(default)]
    pub reports: Vec<Report>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SuggestionsEnvelope {
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReanalyzeSummary {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reports_analyzed: usize,
    #[serde(default)]
    pub suggestions_created: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedReport {
    pub report_id: ReportId,
    #[serde(default)]
    pub message: String,
}

/// Context a form builder sends when asking the backend to pre-fill fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormContext {
    pub unit_id: UnitId,
    pub unit_name: String,
    pub soldier_ids: Vec<SoldierId>,
    pub reports: Vec<Report>,
    pub suggestion_id: Option<SuggestionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSuggestion {
    pub suggested_fields: Value,
    #[serde(default)]
    pub reports_analyzed: usize,
    #[serde(default)]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub unit_id: UnitId,
    pub unit_name: String,
    pub fields: Value,
    pub source_report_ids: Vec<ReportId>,
}

impl GenerateRequest {
    /// JSON body; the field set travels under `{kind}_fields`.
    pub fn body(&self, kind: DocumentKind) -> Value {
        let mut body = Map::new();
        body.insert("unit_id".to_string(), Value::from(self.unit_id.as_str()));
        body.insert("unit_name".to_string(), Value::from(self.unit_name.as_str()));
        body.insert(format!("{}_fields", kind.slug()), self.fields.clone());
        body.insert(
            "source_report_ids".to_string(),
            Value::from(
                self.source_report_ids
                    .iter()
                    .map(|report_id| Value::from(report_id.as_str()))
                    .collect::<Vec<_>>(),
            ),
        );
        Value::Object(body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub formatted_document: String,
    #[serde(alias = "frago_number", alias = "casevac_number", alias = "eoincrep_number")]
    pub number: u32,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReportContext {
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub time: String,
    pub from: String,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatContext {
    pub node: TreeNode,
    pub reports: Vec<ChatReportContext>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub context: ChatContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub reports_analyzed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generate_body_keys_fields_by_kind() {
        let request = GenerateRequest {
            unit_id: UnitId::new("C1"),
            unit_name: "Alpha Co".to_string(),
            fields: json!({"location": "38SMB1234"}),
            source_report_ids: vec![ReportId::new("R1")],
        };
        let body = request.body(DocumentKind::Casevac);
        assert_eq!(body["casevac_fields"]["location"], "38SMB1234");
        assert_eq!(body["source_report_ids"], json!(["R1"]));
        assert!(body.get("frago_fields").is_none());
    }

    #[test]
    fn generate_response_accepts_any_sequence_key() {
        let frago: GenerateResponse = serde_json::from_value(json!({
            "frago_id": "f-1",
            "frago_number": 7,
            "formatted_document": "FRAGMENTARY ORDER 0007"
        }))
        .unwrap();
        assert_eq!(frago.number, 7);
        let eoincrep: GenerateResponse = serde_json::from_value(json!({
            "eoincrep_number": 3,
            "formatted_document": "EOINCREP 0003"
        }))
        .unwrap();
        assert_eq!(eoincrep.number, 3);
    }
}
