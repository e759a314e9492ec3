use serde::Serialize;
use tacops_core::{Report, ReportCategory, ReportTypeCount, Suggestion, TreeNode, Unit, Urgency};
use tacops_dashboard::{
    ChatMessage, FormDraft, HierarchySnapshot, SelectionSnapshot, SuggestionAlert, SuggestionFeed,
    ViewMode,
};
use tera::Context;

use crate::state::AppState;

const SUMMARY_STRIP_TYPES: usize = 3;

/// One line of the flattened hierarchy tree.
#[derive(Debug, Clone, Serialize)]
pub struct TreeRow {
    pub kind: String,
    pub id: String,
    pub name: String,
    pub detail: String,
    pub depth: usize,
    pub selected: bool,
    pub has_children: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub report_id: String,
    pub report_type: String,
    pub category: ReportCategory,
    pub timestamp: String,
    pub author: String,
    pub summary: String,
    pub confidence: u32,
}

impl From<&Report> for ReportRow {
    fn from(report: &Report) -> Self {
        Self {
            report_id: report.report_id.to_string(),
            report_type: report.report_type.as_str().to_string(),
            category: report.report_type.category(),
            timestamp: report.timestamp.clone(),
            author: report.author_name().to_string(),
            summary: report.summary(),
            confidence: report.confidence_percent(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestionRow {
    pub suggestion_id: String,
    pub title: String,
    pub label: String,
    pub urgency: Urgency,
    pub reason: String,
    pub confidence: u32,
    pub unit_id: String,
}

impl From<&Suggestion> for SuggestionRow {
    fn from(suggestion: &Suggestion) -> Self {
        Self {
            suggestion_id: suggestion.suggestion_id.to_string(),
            title: suggestion.alert_title(),
            label: suggestion.suggestion_type.label(),
            urgency: suggestion.urgency,
            reason: suggestion.reason.clone(),
            confidence: suggestion.confidence_percent(),
            unit_id: suggestion.unit_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldRow {
    pub name: &'static str,
    pub value: String,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuilderView {
    pub kind: String,
    pub slug: String,
    pub fields: Vec<FieldRow>,
    pub missing_required: Vec<&'static str>,
    pub can_generate: bool,
    pub warning: Option<String>,
    pub generated: Option<String>,
    pub filename: Option<String>,
}

impl From<&FormDraft> for BuilderView {
    fn from(draft: &FormDraft) -> Self {
        let required = draft.fields.required();
        let fields = draft
            .fields
            .names()
            .iter()
            .map(|&name| FieldRow {
                name,
                value: draft.fields.get(name).unwrap_or_default().to_string(),
                required: required.contains(&name),
            })
            .collect();
        Self {
            kind: draft.kind.as_str().to_string(),
            slug: draft.kind.slug().to_string(),
            fields,
            missing_required: draft.missing_required.clone(),
            can_generate: draft.can_generate,
            warning: draft.last_warning.clone(),
            generated: draft
                .generated
                .as_ref()
                .map(|document| document.formatted_document.clone()),
            filename: draft.generated.as_ref().map(|document| document.filename()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UiTemplateData {
    pub service_name: String,
    pub environment: String,
    pub poll_interval_ms: u64,
    pub unit_count: usize,
    pub tree: Vec<TreeRow>,
    pub selection: SelectionSnapshot,
    pub reports: Vec<ReportRow>,
    pub summary_counts: Vec<ReportTypeCount>,
    pub suggestions: Vec<SuggestionRow>,
    pub alert: Option<SuggestionAlert>,
    pub chat: Vec<ChatMessage>,
    pub builder: Option<BuilderView>,
}

impl UiTemplateData {
    pub fn from_state(
        state: &AppState,
        hierarchy: &HierarchySnapshot,
        selection: SelectionSnapshot,
        feed: &SuggestionFeed,
        chat: Vec<ChatMessage>,
        draft: Option<&FormDraft>,
    ) -> Self {
        let selected = selection.selected.as_ref();
        let reports = selection.reports.iter().map(ReportRow::from).collect();
        let summary_counts = selection
            .report_counts
            .iter()
            .take(SUMMARY_STRIP_TYPES)
            .cloned()
            .collect();
        Self {
            service_name: state.config.service_name.clone(),
            environment: state.config.environment.to_string(),
            poll_interval_ms: state.backend_config.suggestion_poll_interval.as_millis() as u64,
            unit_count: hierarchy.unit_count,
            tree: tree_rows(&hierarchy.units, selected),
            reports,
            summary_counts,
            suggestions: feed.suggestions.iter().map(SuggestionRow::from).collect(),
            alert: feed.alert.clone(),
            chat: if selection.view == ViewMode::Chat {
                chat
            } else {
                Vec::new()
            },
            builder: draft.map(BuilderView::from),
            selection,
        }
    }
}

pub fn build_context(data: &UiTemplateData) -> Context {
    let mut context = Context::new();
    context.insert("service_name", &data.service_name);
    context.insert("environment", &data.environment);
    context.insert("poll_interval_ms", &data.poll_interval_ms);
    context.insert("unit_count", &data.unit_count);
    context.insert("tree", &data.tree);
    context.insert("selected", &data.selection.selected);
    context.insert("view", data.selection.view.as_str());
    context.insert("flags", &data.selection.flags);
    context.insert("loading", &data.selection.loading);
    context.insert("reports", &data.reports);
    context.insert("summary_counts", &data.summary_counts);
    context.insert("suggestions", &data.suggestions);
    context.insert("alert", &data.alert);
    context.insert("chat", &data.chat);
    context.insert("builder", &data.builder);
    context
}

/// Depth-first rows for the whole forest, soldiers before subunits.
pub fn tree_rows(roots: &[Unit], selected: Option<&TreeNode>) -> Vec<TreeRow> {
    let mut rows = Vec::new();
    for root in roots {
        push_node(&TreeNode::Unit(root.clone()), 0, selected, &mut rows);
    }
    rows
}

fn push_node(node: &TreeNode, depth: usize, selected: Option<&TreeNode>, rows: &mut Vec<TreeRow>) {
    let children = node.children();
    let detail = match node {
        TreeNode::Unit(unit) => unit.level.clone(),
        TreeNode::Soldier(soldier) => soldier.rank.clone(),
    };
    rows.push(TreeRow {
        kind: node.kind().to_string(),
        id: node.id().to_string(),
        name: node.name().to_string(),
        detail,
        depth,
        selected: selected
            .is_some_and(|current| current.kind() == node.kind() && current.id() == node.id()),
        has_children: !children.is_empty(),
    });
    for child in &children {
        push_node(child, depth + 1, selected, rows);
    }
}
