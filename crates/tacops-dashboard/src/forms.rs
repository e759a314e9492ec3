use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tacops_client::{ApiError, BackendApi, FieldSuggestion, FormContext, GenerateRequest};
use tacops_core::{
    now_rfc3339, DocumentKind, ErrorCode, GeneratedDocument, Report, ReportId, ReportType,
    SoldierId, SuggestionId, TreeNode, UnitId,
};
use thiserror::Error;
use tracing::{info, warn};

const UNKNOWN_ERROR: &str = "Unknown error";
const NO_REPORTS: &str = "No reports available for analysis";
const EOINCREP_SOURCE_LIMIT: usize = 10;

/// Failure of a user-triggered form action. `Display` is the alert text.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("Failed to get AI suggestions: {detail}")]
    Suggest { code: ErrorCode, detail: String },
    #[error("Failed to generate {kind}: {detail}")]
    Generate {
        kind: DocumentKind,
        code: ErrorCode,
        detail: String,
    },
}

impl FormError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Suggest { code, .. } | Self::Generate { code, .. } => *code,
        }
    }

    fn suggest(err: &ApiError) -> Self {
        Self::Suggest {
            code: err.code(),
            detail: err.detail_or(UNKNOWN_ERROR),
        }
    }

    fn generate(kind: DocumentKind, err: &ApiError) -> Self {
        Self::Generate {
            kind,
            code: err.code(),
            detail: err.detail_or(UNKNOWN_ERROR),
        }
    }
}

macro_rules! form_fields {
    ($name:ident { $($field:ident),+ $(,)? }) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $name {
            $(pub $field: String,)+
        }

        impl $name {
            pub const FIELDS: &'static [&'static str] = &[$(stringify!($field)),+];

            pub fn get(&self, field: &str) -> Option<&str> {
                match field {
                    $(stringify!($field) => Some(self.$field.as_str()),)+
                    _ => None,
                }
            }

            pub fn get_mut(&mut self, field: &str) -> Option<&mut String> {
                match field {
                    $(stringify!($field) => Some(&mut self.$field),)+
                    _ => None,
                }
            }
        }
    };
}

form_fields!(FragoFields {
    situation,
    mission,
    execution,
    service_support,
    command_signal,
});

form_fields!(CasevacFields {
    location,
    callsign_frequency,
    precedence,
    special_equipment,
    patients,
    security,
    marking_method,
    nationality,
    nbc_contamination,
});

form_fields!(EoincrepFields {
    dtg,
    location,
    observer_id,
    enemy_type,
    enemy_count,
    vehicle_count,
    direction,
    equipment,
    activity,
    threat_level,
    recommended_action,
});

impl CasevacFields {
    pub fn defaults() -> Self {
        Self {
            precedence: "A".to_string(),
            special_equipment: "A".to_string(),
            security: "N".to_string(),
            marking_method: "D".to_string(),
            nationality: "A".to_string(),
            nbc_contamination: "N".to_string(),
            ..Self::default()
        }
    }
}

impl EoincrepFields {
    pub fn defaults() -> Self {
        Self {
            dtg: now_rfc3339(),
            enemy_type: "INFANTRY".to_string(),
            vehicle_count: "0".to_string(),
            direction: "N".to_string(),
            threat_level: "MEDIUM".to_string(),
            ..Self::default()
        }
    }
}

/// Editable field set of one form builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FormFields {
    Frago(FragoFields),
    Casevac(CasevacFields),
    Eoincrep(EoincrepFields),
}

impl FormFields {
    pub fn defaults(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Frago => Self::Frago(FragoFields::default()),
            DocumentKind::Casevac => Self::Casevac(CasevacFields::defaults()),
            DocumentKind::Eoincrep => Self::Eoincrep(EoincrepFields::defaults()),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Frago(_) => DocumentKind::Frago,
            Self::Casevac(_) => DocumentKind::Casevac,
            Self::Eoincrep(_) => DocumentKind::Eoincrep,
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        match self {
            Self::Frago(fields) => fields.get(field),
            Self::Casevac(fields) => fields.get(field),
            Self::Eoincrep(fields) => fields.get(field),
        }
    }

    fn get_mut(&mut self, field: &str) -> Option<&mut String> {
        match self {
            Self::Frago(fields) => fields.get_mut(field),
            Self::Casevac(fields) => fields.get_mut(field),
            Self::Eoincrep(fields) => fields.get_mut(field),
        }
    }

    /// Field names in form order.
    pub fn names(&self) -> &'static [&'static str] {
        match self {
            Self::Frago(_) => FragoFields::FIELDS,
            Self::Casevac(_) => CasevacFields::FIELDS,
            Self::Eoincrep(_) => EoincrepFields::FIELDS,
        }
    }

    /// Applies operator edits. Unknown field names are rejected before any
    /// field is changed.
    pub fn update(&mut self, edits: &Map<String, Value>) -> Result<(), Vec<String>> {
        let unknown: Vec<String> = edits
            .keys()
            .filter(|name| self.get(name).is_none())
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(unknown);
        }
        for (name, value) in edits {
            if let Some(slot) = self.get_mut(name) {
                *slot = value_text(value).unwrap_or_default();
            }
        }
        Ok(())
    }

    /// Folds backend-suggested values into the form.
    ///
    /// FRAGO takes the suggestion wholesale. CASEVAC starts again from its
    /// defaults and keeps every non-empty suggested value. EOINCREP overlays
    /// every suggested key onto the current values.
    pub fn apply_suggestion(&mut self, suggested: &Value) {
        let empty = Map::new();
        let suggested = suggested.as_object().unwrap_or(&empty);
        let kind = self.kind();
        let keep_empty = match kind {
            DocumentKind::Frago | DocumentKind::Casevac => {
                *self = Self::defaults(kind);
                kind == DocumentKind::Frago
            }
            DocumentKind::Eoincrep => true,
        };
        for name in self.names() {
            let Some(value) = suggested.get(*name) else {
                continue;
            };
            let text = value_text(value).unwrap_or_default();
            if text.is_empty() && !keep_empty {
                continue;
            }
            if let Some(slot) = self.get_mut(name) {
                *slot = text;
            }
        }
    }

    pub fn required(&self) -> &'static [&'static str] {
        match self {
            Self::Frago(_) => &["mission"],
            Self::Casevac(_) => &["location", "patients"],
            Self::Eoincrep(_) => &["location"],
        }
    }

    pub fn missing_required(&self) -> Vec<&'static str> {
        self.required()
            .iter()
            .copied()
            .filter(|name| self.get(name).is_none_or(|value| value.trim().is_empty()))
            .collect()
    }

    pub fn can_generate(&self) -> bool {
        self.missing_required().is_empty()
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for name in self.names() {
            if let Some(value) = self.get(name) {
                map.insert((*name).to_string(), Value::from(value));
            }
        }
        Value::Object(map)
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// What a builder is bound to: the selected node, its soldiers, the
/// aggregated reports, and the suggestion it was opened from, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct FormTarget {
    pub unit_id: UnitId,
    pub unit_name: String,
    pub soldier_ids: Vec<SoldierId>,
    pub reports: Vec<Report>,
    pub suggestion_id: Option<SuggestionId>,
}

impl FormTarget {
    pub fn new(node: &TreeNode, reports: Vec<Report>, suggestion_id: Option<SuggestionId>) -> Self {
        Self {
            unit_id: node.unit_id().clone(),
            unit_name: node.name().to_string(),
            soldier_ids: node.collect_soldier_ids(),
            reports,
            suggestion_id,
        }
    }

    pub fn context(&self) -> FormContext {
        FormContext {
            unit_id: self.unit_id.clone(),
            unit_name: self.unit_name.clone(),
            soldier_ids: self.soldier_ids.clone(),
            reports: self.reports.clone(),
            suggestion_id: self.suggestion_id.clone(),
        }
    }

    /// Reports cited as sources of a generated document.
    pub fn source_report_ids(&self, kind: DocumentKind) -> Vec<ReportId> {
        match kind {
            DocumentKind::Frago | DocumentKind::Casevac => self
                .reports
                .iter()
                .map(|report| report.report_id.clone())
                .collect(),
            DocumentKind::Eoincrep => self
                .reports
                .iter()
                .filter(|report| {
                    matches!(
                        report.report_type,
                        ReportType::Contact | ReportType::Intelligence | ReportType::Sitrep
                    )
                })
                .take(EOINCREP_SOURCE_LIMIT)
                .map(|report| report.report_id.clone())
                .collect(),
        }
    }
}

/// Asks the backend to pre-fill a form. Requires at least one report.
pub async fn request_suggestion(
    backend: &dyn BackendApi,
    kind: DocumentKind,
    target: &FormTarget,
) -> Result<FieldSuggestion, FormError> {
    if target.reports.is_empty() {
        return Err(FormError::Suggest {
            code: ErrorCode::InvalidInput,
            detail: NO_REPORTS.to_string(),
        });
    }
    let suggestion = backend
        .suggest_fields(kind, &target.context())
        .await
        .map_err(|err| {
            warn!(kind = %kind, unit_id = %target.unit_id, error = %err, "Field suggestion failed");
            FormError::suggest(&err)
        })?;
    if let Some(warning) = &suggestion.warning {
        warn!(kind = %kind, unit_id = %target.unit_id, warning = %warning, "Field suggestion degraded");
    }
    Ok(suggestion)
}

/// Has the backend generate the document. Required fields are checked
/// locally first.
pub async fn generate_document(
    backend: &dyn BackendApi,
    fields: &FormFields,
    target: &FormTarget,
) -> Result<GeneratedDocument, FormError> {
    let kind = fields.kind();
    let missing = fields.missing_required();
    if !missing.is_empty() {
        return Err(FormError::Generate {
            kind,
            code: ErrorCode::InvalidInput,
            detail: format!("missing required fields: {}", missing.join(", ")),
        });
    }
    let request = GenerateRequest {
        unit_id: target.unit_id.clone(),
        unit_name: target.unit_name.clone(),
        fields: fields.to_value(),
        source_report_ids: target.source_report_ids(kind),
    };
    let response = backend
        .generate_document(kind, &request)
        .await
        .map_err(|err| {
            warn!(kind = %kind, unit_id = %target.unit_id, error = %err, "Document generation failed");
            FormError::generate(kind, &err)
        })?;
    let document = GeneratedDocument {
        kind,
        sequence: response.number,
        unit_name: target.unit_name.clone(),
        formatted_document: response.formatted_document,
        timestamp: response.timestamp,
    };
    info!(
        kind = %kind,
        sequence = document.sequence,
        unit_id = %target.unit_id,
        "Document generated"
    );
    Ok(document)
}
