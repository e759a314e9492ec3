//! In-memory backend for exercising the dashboard without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tacops_core::{
    now_rfc3339, DocumentKind, NewReport, RawInput, Report, ReportId, Soldier, SoldierId,
    Suggestion, SuggestionId, SuggestionStatus, UnitId, UnitRecord,
};

use crate::backend::BackendApi;
use crate::error::ApiError;
use crate::wire::{
    ChatReply, ChatRequest, FieldSuggestion, FormContext, GenerateRequest, GenerateResponse,
    ReanalyzeSummary, SubmittedReport,
};

#[derive(Default)]
struct MockState {
    hierarchy: Vec<UnitRecord>,
    soldiers: Vec<Soldier>,
    raw_inputs: HashMap<SoldierId, Vec<RawInput>>,
    reports: Vec<Report>,
    suggestions: Vec<Suggestion>,
    field_suggestions: HashMap<DocumentKind, Value>,
    sequences: HashMap<DocumentKind, u32>,
    chat_reply: Option<String>,
    failing: HashMap<&'static str, Option<String>>,
    soldier_delays: HashMap<SoldierId, Duration>,
    page_delays: VecDeque<Duration>,
    form_delays: VecDeque<Duration>,
    calls: Vec<String>,
    next_report: u64,
}

/// Scriptable [`BackendApi`] whose endpoints can be told to fail or stall.
///
/// Failure switches use the same endpoint names the HTTP client reports in
/// its metrics (`reports`, `soldier_reports`, `frago_generate`, ...).
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_hierarchy(self, records: Vec<UnitRecord>) -> Self {
        self.state().hierarchy = records;
        self
    }

    pub fn with_soldiers(self, soldiers: Vec<Soldier>) -> Self {
        self.state().soldiers = soldiers;
        self
    }

    pub fn with_reports(self, reports: Vec<Report>) -> Self {
        self.state().reports = reports;
        self
    }

    pub fn with_raw_inputs(self, soldier_id: impl Into<SoldierId>, inputs: Vec<RawInput>) -> Self {
        self.state().raw_inputs.insert(soldier_id.into(), inputs);
        self
    }

    pub fn with_suggestions(self, suggestions: Vec<Suggestion>) -> Self {
        self.state().suggestions = suggestions;
        self
    }

    pub fn with_field_suggestion(self, kind: DocumentKind, fields: Value) -> Self {
        self.state().field_suggestions.insert(kind, fields);
        self
    }

    pub fn with_chat_reply(self, reply: impl Into<String>) -> Self {
        self.state().chat_reply = Some(reply.into());
        self
    }

    pub fn set_hierarchy(&self, records: Vec<UnitRecord>) {
        self.state().hierarchy = records;
    }

    pub fn set_suggestions(&self, suggestions: Vec<Suggestion>) {
        self.state().suggestions = suggestions;
    }

    pub fn push_report(&self, report: Report) {
        self.state().reports.insert(0, report);
    }

    /// Makes `endpoint` answer with a 500 carrying `detail`.
    pub fn fail(&self, endpoint: &'static str, detail: Option<&str>) {
        self.state()
            .failing
            .insert(endpoint, detail.map(str::to_string));
    }

    pub fn recover(&self, endpoint: &'static str) {
        self.state().failing.remove(endpoint);
    }

    /// Delays every per-soldier report fetch for `soldier_id`.
    pub fn delay_soldier(&self, soldier_id: impl Into<SoldierId>, delay: Duration) {
        self.state().soldier_delays.insert(soldier_id.into(), delay);
    }

    /// Queues a delay for the next call to the paged report listing.
    pub fn delay_next_page(&self, delay: Duration) {
        self.state().page_delays.push_back(delay);
    }

    /// Queues a delay for the next field-suggest or generate call.
    pub fn delay_next_form(&self, delay: Duration) {
        self.state().form_delays.push_back(delay);
    }

    async fn form_delay(&self) {
        let delay = self.state().form_delays.pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn suggestion_status(&self, suggestion_id: &SuggestionId) -> Option<SuggestionStatus> {
        self.state()
            .suggestions
            .iter()
            .find(|suggestion| &suggestion.suggestion_id == suggestion_id)
            .map(|suggestion| suggestion.status)
    }

    fn enter(&self, endpoint: &'static str, call: String) -> Result<(), ApiError> {
        let mut state = self.state();
        state.calls.push(call);
        match state.failing.get(endpoint) {
            Some(detail) => Err(ApiError::Status {
                endpoint,
                status: 500,
                detail: detail.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BackendApi for MockBackend {
    async fn hierarchy(&self) -> Result<Vec<UnitRecord>, ApiError> {
        self.enter("hierarchy", "hierarchy".to_string())?;
        Ok(self.state().hierarchy.clone())
    }

    async fn soldiers(&self) -> Result<Vec<Soldier>, ApiError> {
        self.enter("soldiers", "soldiers".to_string())?;
        Ok(self.state().soldiers.clone())
    }

    async fn soldier_raw_inputs(&self, soldier_id: &SoldierId) -> Result<Vec<RawInput>, ApiError> {
        self.enter("raw_inputs", format!("raw_inputs:{soldier_id}"))?;
        Ok(self
            .state()
            .raw_inputs
            .get(soldier_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn soldier_reports(&self, soldier_id: &SoldierId) -> Result<Vec<Report>, ApiError> {
        self.enter("soldier_reports", format!("soldier_reports:{soldier_id}"))?;
        let delay = self.state().soldier_delays.get(soldier_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .state()
            .reports
            .iter()
            .filter(|report| &report.soldier_id == soldier_id)
            .cloned()
            .collect())
    }

    async fn reports(&self, limit: usize) -> Result<Vec<Report>, ApiError> {
        self.enter("reports", format!("reports:{limit}"))?;
        let delay = self.state().page_delays.pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.state().reports.iter().take(limit).cloned().collect())
    }

    async fn submit_report(
        &self,
        soldier_id: &SoldierId,
        report: &NewReport,
    ) -> Result<SubmittedReport, ApiError> {
        self.enter("submit_report", format!("submit_report:{soldier_id}"))?;
        let mut state = self.state();
        let unit_id = state
            .soldiers
            .iter()
            .find(|soldier| &soldier.soldier_id == soldier_id)
            .map(|soldier| soldier.unit_id.clone())
            .unwrap_or_else(|| UnitId::new(""));
        state.next_report += 1;
        let report_id = ReportId::new(format!("mock-report-{}", state.next_report));
        state.reports.insert(
            0,
            Report {
                report_id: report_id.clone(),
                soldier_id: soldier_id.clone(),
                unit_id,
                timestamp: now_rfc3339(),
                report_type: report.report_type.clone(),
                structured_json: report.structured_json.clone(),
                confidence: report.confidence,
                soldier_name: None,
                unit_name: None,
            },
        );
        Ok(SubmittedReport {
            report_id,
            message: "Report created successfully".to_string(),
        })
    }

    async fn pending_suggestions(
        &self,
        unit_id: Option<&UnitId>,
    ) -> Result<Vec<Suggestion>, ApiError> {
        let call = match unit_id {
            Some(unit_id) => format!("suggestions:{unit_id}"),
            None => "suggestions".to_string(),
        };
        self.enter("suggestions", call)?;
        Ok(self
            .state()
            .suggestions
            .iter()
            .filter(|suggestion| suggestion.status == SuggestionStatus::Pending)
            .filter(|suggestion| unit_id.is_none_or(|unit_id| &suggestion.unit_id == unit_id))
            .cloned()
            .collect())
    }

    async fn reanalyze_suggestions(&self) -> Result<ReanalyzeSummary, ApiError> {
        self.enter("reanalyze", "reanalyze".to_string())?;
        let state = self.state();
        Ok(ReanalyzeSummary {
            message: "Reanalysis complete".to_string(),
            reports_analyzed: state.reports.len(),
            suggestions_created: 0,
        })
    }

    async fn create_suggestion_draft(&self, suggestion_id: &SuggestionId) -> Result<(), ApiError> {
        self.enter("create_draft", format!("create_draft:{suggestion_id}"))?;
        set_status(&mut self.state(), suggestion_id, SuggestionStatus::DraftCreated)
    }

    async fn dismiss_suggestion(&self, suggestion_id: &SuggestionId) -> Result<(), ApiError> {
        self.enter("dismiss", format!("dismiss:{suggestion_id}"))?;
        set_status(&mut self.state(), suggestion_id, SuggestionStatus::Dismissed)
    }

    async fn suggest_fields(
        &self,
        kind: DocumentKind,
        context: &FormContext,
    ) -> Result<FieldSuggestion, ApiError> {
        let endpoint = match kind {
            DocumentKind::Frago => "frago_suggest",
            DocumentKind::Casevac => "casevac_suggest",
            DocumentKind::Eoincrep => "eoincrep_suggest",
        };
        self.enter(endpoint, format!("{endpoint}:{}", context.unit_id))?;
        self.form_delay().await;
        let fields = self
            .state()
            .field_suggestions
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| json!({}));
        Ok(FieldSuggestion {
            suggested_fields: fields,
            reports_analyzed: context.reports.len(),
            warning: None,
        })
    }

    async fn generate_document(
        &self,
        kind: DocumentKind,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ApiError> {
        let endpoint = match kind {
            DocumentKind::Frago => "frago_generate",
            DocumentKind::Casevac => "casevac_generate",
            DocumentKind::Eoincrep => "eoincrep_generate",
        };
        self.enter(endpoint, format!("{endpoint}:{}", request.unit_id))?;
        self.form_delay().await;
        let mut state = self.state();
        let sequence = state.sequences.entry(kind).or_insert(0);
        *sequence += 1;
        let number = *sequence;
        Ok(GenerateResponse {
            formatted_document: format!(
                "{} {number:04}\nUNIT: {}\n{}",
                kind.as_str(),
                request.unit_name,
                request.fields
            ),
            number,
            timestamp: Some(now_rfc3339()),
        })
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ApiError> {
        self.enter("chat", format!("chat:{}", request.context.node.id()))?;
        let reply = self.state().chat_reply.clone().unwrap_or_default();
        Ok(ChatReply {
            response: reply,
            timestamp: Some(now_rfc3339()),
            reports_analyzed: request.context.reports.len(),
        })
    }
}

fn set_status(
    state: &mut MockState,
    suggestion_id: &SuggestionId,
    status: SuggestionStatus,
) -> Result<(), ApiError> {
    match state
        .suggestions
        .iter_mut()
        .find(|suggestion| &suggestion.suggestion_id == suggestion_id)
    {
        Some(suggestion) => {
            suggestion.status = status;
            Ok(())
        }
        None => Err(ApiError::Status {
            endpoint: "suggestions",
            status: 404,
            detail: Some("Suggestion not found".to_string()),
        }),
    }
}
