use async_trait::async_trait;
use tacops_core::{
    DocumentKind, NewReport, RawInput, Report, Soldier, SoldierId, Suggestion, SuggestionId,
    UnitId, UnitRecord,
};

use crate::error::ApiError;
use crate::wire::{
    ChatReply, ChatRequest, FieldSuggestion, FormContext, GenerateRequest, GenerateResponse,
    ReanalyzeSummary, SubmittedReport,
};

/// Everything the dashboard asks of the external report backend.
///
/// Unit and soldier data is read-only from this side; reports can only be
/// appended; document generation and field suggestions happen remotely.
#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn hierarchy(&self) -> Result<Vec<UnitRecord>, ApiError>;

    async fn soldiers(&self) -> Result<Vec<Soldier>, ApiError>;

    async fn soldier_raw_inputs(&self, soldier_id: &SoldierId) -> Result<Vec<RawInput>, ApiError>;

    async fn soldier_reports(&self, soldier_id: &SoldierId) -> Result<Vec<Report>, ApiError>;

    /// Most recent reports across all soldiers, at most `limit`.
    async fn reports(&self, limit: usize) -> Result<Vec<Report>, ApiError>;

    async fn submit_report(
        &self,
        soldier_id: &SoldierId,
        report: &NewReport,
    ) -> Result<SubmittedReport, ApiError>;

    async fn pending_suggestions(
        &self,
        unit_id: Option<&UnitId>,
    ) -> Result<Vec<Suggestion>, ApiError>;

    async fn reanalyze_suggestions(&self) -> Result<ReanalyzeSummary, ApiError>;

    async fn create_suggestion_draft(&self, suggestion_id: &SuggestionId) -> Result<(), ApiError>;

    async fn dismiss_suggestion(&self, suggestion_id: &SuggestionId) -> Result<(), ApiError>;

    async fn suggest_fields(
        &self,
        kind: DocumentKind,
        context: &FormContext,
    ) -> Result<FieldSuggestion, ApiError>;

    async fn generate_document(
        &self,
        kind: DocumentKind,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ApiError>;

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ApiError>;
}
