use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tacops_client::{ApiError, BackendApi, FieldSuggestion, SubmittedReport};
use tacops_config::BackendConfig;
use tacops_core::{
    build_hierarchy, count_units, DocumentKind, ErrorCode, GeneratedDocument, NewReport, NodeRef,
    RawInput, Report, Soldier, SoldierId, Suggestion, TacopsError, TacopsResult, TreeNode, Unit,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::aggregator::ReportAggregator;
use crate::chat::{self, ChatMessage, ChatRole, ChatSession};
use crate::controller::{SelectionController, SelectionSnapshot, SelectionTicket, ViewMode};
use crate::forms::{self, FormError, FormFields, FormTarget};

/// Form builder state for one document kind.
#[derive(Debug, Clone, Serialize)]
pub struct FormDraft {
    pub kind: DocumentKind,
    pub fields: FormFields,
    pub missing_required: Vec<&'static str>,
    pub can_generate: bool,
    pub last_warning: Option<String>,
    pub generated: Option<GeneratedDocument>,
}

impl FormDraft {
    fn new(kind: DocumentKind) -> Self {
        Self::from_fields(FormFields::defaults(kind))
    }

    fn from_fields(fields: FormFields) -> Self {
        let missing_required = fields.missing_required();
        Self {
            kind: fields.kind(),
            can_generate: missing_required.is_empty(),
            missing_required,
            fields,
            last_warning: None,
            generated: None,
        }
    }

    fn set_fields(&mut self, fields: FormFields) {
        self.missing_required = fields.missing_required();
        self.can_generate = self.missing_required.is_empty();
        self.fields = fields;
    }
}

#[derive(Debug)]
struct SessionState {
    controller: SelectionController,
    chat: ChatSession,
    drafts: HashMap<DocumentKind, FormDraft>,
    // Bumped whenever the drafts are reset for a new selection.
    draft_epoch: u64,
}

impl SessionState {
    fn new() -> Self {
        Self {
            controller: SelectionController::new(),
            chat: ChatSession::new(),
            drafts: fresh_drafts(),
            draft_epoch: 0,
        }
    }

    fn reset_drafts(&mut self) {
        self.drafts = fresh_drafts();
        self.draft_epoch += 1;
    }

    fn draft_mut(&mut self, kind: DocumentKind) -> &mut FormDraft {
        self.drafts
            .entry(kind)
            .or_insert_with(|| FormDraft::new(kind))
    }

    fn form_target(&self) -> TacopsResult<(FormTarget, u64)> {
        let node = self.controller.selected().ok_or_else(|| {
            TacopsError::new(ErrorCode::InvalidInput, "no node is selected")
        })?;
        let suggestion_id = self
            .controller
            .suggestion_context()
            .map(|context| context.suggestion_id.clone());
        let target = FormTarget::new(node, self.controller.reports().to_vec(), suggestion_id);
        Ok((target, self.draft_epoch))
    }
}

const SELECTION_CHANGED: &str = "the selection changed before the backend answered";

/// Fetches unit records and assembles the forest, logging records that
/// could not be placed.
pub(crate) async fn fetch_hierarchy(backend: &dyn BackendApi) -> Result<Vec<Unit>, ApiError> {
    let records = backend.hierarchy().await.map_err(|err| {
        warn!(error = %err, "Hierarchy refresh failed, keeping previous snapshot");
        err
    })?;
    let record_count = records.len();
    let forest = build_hierarchy(records);
    let unit_count = count_units(&forest);
    if unit_count < record_count {
        warn!(
            records = record_count,
            units = unit_count,
            "Some unit records were left out of the hierarchy"
        );
    }
    Ok(forest)
}

fn fresh_drafts() -> HashMap<DocumentKind, FormDraft> {
    DocumentKind::ALL
        .into_iter()
        .map(|kind| (kind, FormDraft::new(kind)))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct HierarchySnapshot {
    pub units: Vec<Unit>,
    pub unit_count: usize,
}

/// One operator's dashboard: hierarchy snapshot, selection, chat transcript
/// and form drafts.
///
/// State sits behind an async mutex that is never held across a backend
/// call; a selection's reports are applied only if no later selection
/// superseded it.
pub struct Dashboard {
    backend: Arc<dyn BackendApi>,
    aggregator: ReportAggregator,
    state: Mutex<SessionState>,
}

impl Dashboard {
    pub fn new(backend: Arc<dyn BackendApi>, config: &BackendConfig) -> Self {
        let aggregator = ReportAggregator::new(Arc::clone(&backend), config);
        Self::with_aggregator(backend, aggregator)
    }

    pub fn with_aggregator(backend: Arc<dyn BackendApi>, aggregator: ReportAggregator) -> Self {
        Self {
            backend,
            aggregator,
            state: Mutex::new(SessionState::new()),
        }
    }

    /// Seeds the hierarchy snapshot before the dashboard is shared.
    pub fn with_hierarchy(mut self, units: Vec<Unit>) -> Self {
        self.state.get_mut().controller.set_hierarchy(units);
        self
    }

    /// Refetches the unit list and rebuilds the forest. On failure the
    /// previous snapshot stays in place.
    pub async fn refresh_hierarchy(&self) -> Result<usize, ApiError> {
        let forest = fetch_hierarchy(self.backend.as_ref()).await?;
        let unit_count = count_units(&forest);
        self.apply_hierarchy(forest).await;
        info!(units = unit_count, "Hierarchy refreshed");
        Ok(unit_count)
    }

    /// Installs a new forest. A selection whose subtree membership changed
    /// gets its reports aggregated again; a selection that vanished takes
    /// its chat transcript with it.
    pub async fn apply_hierarchy(&self, forest: Vec<Unit>) {
        let ticket = {
            let mut state = self.state.lock().await;
            let ticket = state.controller.set_hierarchy(forest);
            if state.controller.selected().is_none() {
                state.chat.clear();
            }
            ticket
        };
        if let Some(ticket) = ticket {
            self.aggregate(ticket).await;
        }
    }

    pub async fn hierarchy(&self) -> HierarchySnapshot {
        let state = self.state.lock().await;
        let units = state.controller.hierarchy().to_vec();
        HierarchySnapshot {
            unit_count: count_units(&units),
            units,
        }
    }

    pub async fn selection(&self) -> SelectionSnapshot {
        self.state.lock().await.controller.snapshot()
    }

    /// Selects a node from the current snapshot and aggregates its reports.
    /// Returns the selection state once this selection's reports have been
    /// applied or superseded.
    pub async fn select(&self, node_ref: &NodeRef) -> TacopsResult<SelectionSnapshot> {
        let ticket = {
            let mut state = self.state.lock().await;
            let node = node_ref
                .resolve(state.controller.hierarchy())
                .ok_or_else(|| {
                    TacopsError::not_found(format!(
                        "{} {} is not in the hierarchy",
                        node_ref.kind, node_ref.id
                    ))
                })?;
            let ticket = state.controller.begin_select(node);
            state.reset_drafts();
            ticket
        };
        self.aggregate(ticket).await;
        Ok(self.selection().await)
    }

    async fn aggregate(&self, ticket: SelectionTicket) {
        let reports = self.aggregator.reports_for(&ticket.node).await;
        let mut state = self.state.lock().await;
        let report_count = reports.len();
        if state.controller.complete_select(ticket.generation, reports) {
            state.chat.focus(&ticket.node, report_count);
        }
    }

    pub async fn show(&self, view: ViewMode) -> SelectionSnapshot {
        let mut state = self.state.lock().await;
        state.controller.show(view);
        state.controller.snapshot()
    }

    /// Opens the builder a suggestion asks for, on the suggestion's unit.
    pub async fn activate_suggestion(
        &self,
        suggestion: &Suggestion,
    ) -> TacopsResult<SelectionSnapshot> {
        let ticket = {
            let mut state = self.state.lock().await;
            let ticket = state
                .controller
                .activate_suggestion(
                    suggestion.suggestion_type,
                    suggestion.suggestion_id.clone(),
                    suggestion.unit_id.clone(),
                )
                .ok_or_else(|| {
                    TacopsError::not_found(format!(
                        "unit {} is not in the hierarchy",
                        suggestion.unit_id
                    ))
                })?;
            state.reset_drafts();
            ticket
        };
        self.aggregate(ticket).await;
        Ok(self.selection().await)
    }

    pub async fn soldiers(&self) -> Result<Vec<Soldier>, ApiError> {
        self.backend.soldiers().await
    }

    /// Raw inputs for a soldier; fail-soft.
    pub async fn raw_inputs(&self, soldier_id: &SoldierId) -> Vec<RawInput> {
        match self.backend.soldier_raw_inputs(soldier_id).await {
            Ok(inputs) => inputs,
            Err(err) => {
                warn!(soldier_id = %soldier_id, error = %err, "Raw input fetch failed");
                Vec::new()
            }
        }
    }

    pub async fn submit_report(
        &self,
        soldier_id: &SoldierId,
        report: &NewReport,
    ) -> Result<SubmittedReport, ApiError> {
        let submitted = self.backend.submit_report(soldier_id, report).await?;
        info!(
            soldier_id = %soldier_id,
            report_id = %submitted.report_id,
            report_type = %report.report_type,
            "Report submitted"
        );
        Ok(submitted)
    }

    pub async fn reports(&self) -> Vec<Report> {
        self.state.lock().await.controller.reports().to_vec()
    }

    pub async fn draft(&self, kind: DocumentKind) -> FormDraft {
        self.state.lock().await.draft_mut(kind).clone()
    }

    pub async fn edit_draft(
        &self,
        kind: DocumentKind,
        edits: &Map<String, Value>,
    ) -> TacopsResult<FormDraft> {
        let mut state = self.state.lock().await;
        let draft = state.draft_mut(kind);
        let mut fields = draft.fields.clone();
        fields.update(edits).map_err(|unknown| {
            TacopsError::new(
                ErrorCode::InvalidInput,
                format!("unknown {kind} fields: {}", unknown.join(", ")),
            )
        })?;
        draft.set_fields(fields);
        Ok(draft.clone())
    }

    /// Runs AI suggest for `kind` against the current selection and merges
    /// the result into the draft. A result that arrives after the selection
    /// moved on is dropped with a `Conflict`.
    pub async fn suggest_fields(&self, kind: DocumentKind) -> Result<FormDraft, FormError> {
        let suggest_error = |code, detail| FormError::Suggest { code, detail };
        let (target, epoch) = self.form_target(suggest_error).await?;
        let FieldSuggestion {
            suggested_fields,
            warning,
            ..
        } = forms::request_suggestion(self.backend.as_ref(), kind, &target).await?;
        let mut state = self.state.lock().await;
        if state.draft_epoch != epoch {
            warn!(
                kind = %kind,
                unit_id = %target.unit_id,
                "Discarding field suggestion for superseded selection"
            );
            return Err(suggest_error(ErrorCode::Conflict, SELECTION_CHANGED.to_string()));
        }
        let draft = state.draft_mut(kind);
        let mut fields = draft.fields.clone();
        fields.apply_suggestion(&suggested_fields);
        draft.set_fields(fields);
        draft.last_warning = warning;
        Ok(draft.clone())
    }

    /// Has the backend generate `kind` from the current draft. The document
    /// is stored only if the selection it was generated for is still current.
    pub async fn generate(&self, kind: DocumentKind) -> Result<GeneratedDocument, FormError> {
        let generate_error = |code, detail| FormError::Generate { kind, code, detail };
        let (target, epoch) = self.form_target(generate_error).await?;
        let fields = self.state.lock().await.draft_mut(kind).fields.clone();
        let document = forms::generate_document(self.backend.as_ref(), &fields, &target).await?;
        let mut state = self.state.lock().await;
        if state.draft_epoch != epoch {
            warn!(
                kind = %kind,
                unit_id = %target.unit_id,
                sequence = document.sequence,
                "Discarding generated document for superseded selection"
            );
            return Err(generate_error(ErrorCode::Conflict, SELECTION_CHANGED.to_string()));
        }
        state.draft_mut(kind).generated = Some(document.clone());
        Ok(document)
    }

    pub async fn generated(&self, kind: DocumentKind) -> Option<GeneratedDocument> {
        self.state.lock().await.draft_mut(kind).generated.clone()
    }

    async fn form_target(
        &self,
        on_missing: impl FnOnce(ErrorCode, String) -> FormError,
    ) -> Result<(FormTarget, u64), FormError> {
        self.state
            .lock()
            .await
            .form_target()
            .map_err(|err| on_missing(err.code, err.message))
    }

    pub async fn chat_transcript(&self) -> Vec<ChatMessage> {
        self.state.lock().await.chat.messages().to_vec()
    }

    /// Sends a chat message about the selected node. Blank input and an
    /// empty selection are ignored.
    pub async fn send_chat(&self, message: &str) -> Vec<ChatMessage> {
        let (node, reports) = {
            let mut state = self.state.lock().await;
            let Some(node) = state.controller.selected().cloned() else {
                return state.chat.messages().to_vec();
            };
            if message.trim().is_empty() {
                return state.chat.messages().to_vec();
            }
            let reports = state.controller.reports().to_vec();
            state.chat.focus(&node, reports.len());
            state.chat.push(ChatRole::User, message);
            (node, reports)
        };
        let reply = chat::ask(self.backend.as_ref(), &node, &reports, message).await;
        let mut state = self.state.lock().await;
        if let Some(reply) = reply {
            if state.chat.node() == Some(&NodeRef::from(&node)) {
                state.chat.push(ChatRole::Assistant, reply);
            }
        }
        state.chat.messages().to_vec()
    }

    /// The selected node, if any.
    pub async fn selected(&self) -> Option<TreeNode> {
        self.state.lock().await.controller.selected().cloned()
    }
}
