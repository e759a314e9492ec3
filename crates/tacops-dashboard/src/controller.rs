use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tacops_core::{
    count_by_type, find_unit, DocumentKind, NodeRef, Report, ReportTypeCount, SuggestionId,
    SuggestionType, TreeNode, Unit, UnitId,
};
use tacops_observability::record_stale_selection;
use tracing::{debug, warn};

/// Panel shown beside the hierarchy. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Reports,
    Chat,
    FragoBuilder,
    CasevacBuilder,
    EoincrepBuilder,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reports => "reports",
            Self::Chat => "chat",
            Self::FragoBuilder => "frago_builder",
            Self::CasevacBuilder => "casevac_builder",
            Self::EoincrepBuilder => "eoincrep_builder",
        }
    }

    pub fn builder_for(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Frago => Self::FragoBuilder,
            DocumentKind::Casevac => Self::CasevacBuilder,
            DocumentKind::Eoincrep => Self::EoincrepBuilder,
        }
    }

    pub fn document_kind(self) -> Option<DocumentKind> {
        match self {
            Self::FragoBuilder => Some(DocumentKind::Frago),
            Self::CasevacBuilder => Some(DocumentKind::Casevac),
            Self::EoincrepBuilder => Some(DocumentKind::Eoincrep),
            Self::Reports | Self::Chat => None,
        }
    }

    pub fn flags(self) -> ViewFlags {
        ViewFlags {
            show_reports: self == Self::Reports,
            show_chat: self == Self::Chat,
            show_frago_builder: self == Self::FragoBuilder,
            show_casevac_builder: self == Self::CasevacBuilder,
            show_eoincrep_builder: self == Self::EoincrepBuilder,
        }
    }
}

impl FromStr for ViewMode {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "reports" => Ok(Self::Reports),
            "chat" => Ok(Self::Chat),
            "frago" | "frago_builder" => Ok(Self::FragoBuilder),
            "casevac" | "casevac_builder" => Ok(Self::CasevacBuilder),
            "eoincrep" | "eoincrep_builder" => Ok(Self::EoincrepBuilder),
            _ => Err(()),
        }
    }
}

/// Boolean projection of [`ViewMode`] for templates and clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewFlags {
    pub show_reports: bool,
    pub show_chat: bool,
    pub show_frago_builder: bool,
    pub show_casevac_builder: bool,
    pub show_eoincrep_builder: bool,
}

impl ViewFlags {
    pub fn active_count(&self) -> usize {
        [
            self.show_reports,
            self.show_chat,
            self.show_frago_builder,
            self.show_casevac_builder,
            self.show_eoincrep_builder,
        ]
        .into_iter()
        .filter(|flag| *flag)
        .count()
    }
}

/// The suggestion a form builder was opened from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionContext {
    pub suggestion_id: SuggestionId,
    pub suggestion_type: SuggestionType,
    pub unit_id: UnitId,
}

/// Handle for one in-flight aggregation. Completing with a ticket that is
/// no longer current discards the result.
#[derive(Debug, Clone)]
pub struct SelectionTicket {
    pub generation: u64,
    pub node: TreeNode,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionSnapshot {
    pub selected: Option<TreeNode>,
    pub view: ViewMode,
    pub flags: ViewFlags,
    pub loading: bool,
    pub generation: u64,
    pub reports: Vec<Report>,
    pub report_counts: Vec<ReportTypeCount>,
    pub suggestion_context: Option<SuggestionContext>,
}

/// Selection and view state for one dashboard session.
///
/// Purely synchronous: callers fetch reports between [`begin_select`] and
/// [`complete_select`] without holding any lock on the controller.
///
/// [`begin_select`]: SelectionController::begin_select
/// [`complete_select`]: SelectionController::complete_select
#[derive(Debug, Default)]
pub struct SelectionController {
    hierarchy: Vec<Unit>,
    selected: Option<TreeNode>,
    view: ViewMode,
    suggestion_context: Option<SuggestionContext>,
    reports: Vec<Report>,
    loading: bool,
    generation: u64,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hierarchy(&self) -> &[Unit] {
        &self.hierarchy
    }

    pub fn selected(&self) -> Option<&TreeNode> {
        self.selected.as_ref()
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn suggestion_context(&self) -> Option<&SuggestionContext> {
        self.suggestion_context.as_ref()
    }

    /// Replaces the hierarchy snapshot. A current selection is re-resolved
    /// against the new snapshot; if it disappeared, the selection is cleared
    /// and any in-flight aggregation is superseded.
    ///
    /// Returns a fresh ticket when the selected subtree gained or lost
    /// soldiers, since its report list no longer matches the membership.
    pub fn set_hierarchy(&mut self, hierarchy: Vec<Unit>) -> Option<SelectionTicket> {
        self.hierarchy = hierarchy;
        let selected = self.selected.as_ref()?;
        let node_ref = NodeRef::from(selected);
        match node_ref.resolve(&self.hierarchy) {
            Some(node) => {
                if node.collect_soldier_ids() == selected.collect_soldier_ids() {
                    self.selected = Some(node);
                    return None;
                }
                debug!(
                    node_kind = %node_ref.kind,
                    node_id = %node_ref.id,
                    "Selected subtree membership changed, refetching reports"
                );
                Some(self.begin_select(node))
            }
            None => {
                warn!(
                    node_kind = %node_ref.kind,
                    node_id = %node_ref.id,
                    "Selected node left the hierarchy, clearing selection"
                );
                self.selected = None;
                self.reports.clear();
                self.loading = false;
                self.suggestion_context = None;
                self.generation += 1;
                None
            }
        }
    }

    /// Selects `node` and starts a new aggregation generation. The active
    /// view is left untouched.
    pub fn begin_select(&mut self, node: TreeNode) -> SelectionTicket {
        self.generation += 1;
        self.selected = Some(node.clone());
        self.reports.clear();
        self.loading = true;
        debug!(
            node_kind = %node.kind(),
            node_id = node.id(),
            generation = self.generation,
            "Selection changed"
        );
        SelectionTicket {
            generation: self.generation,
            node,
        }
    }

    /// Applies an aggregation result. Returns false, and drops `reports`,
    /// when a later selection superseded `generation`.
    pub fn complete_select(&mut self, generation: u64, reports: Vec<Report>) -> bool {
        if generation != self.generation {
            debug!(
                generation,
                current = self.generation,
                "Discarding reports for superseded selection"
            );
            record_stale_selection();
            return false;
        }
        self.reports = reports;
        self.loading = false;
        true
    }

    /// Switches the active panel. Leaving the builder a suggestion opened
    /// drops that suggestion's context.
    pub fn show(&mut self, view: ViewMode) {
        let keeps_context = self
            .suggestion_context
            .as_ref()
            .is_some_and(|context| {
                ViewMode::builder_for(context.suggestion_type.document_kind()) == view
            });
        if !keeps_context {
            self.suggestion_context = None;
        }
        self.view = view;
    }

    /// Routes into the form builder for `suggestion_type`, selecting the
    /// suggestion's unit first. Returns `None` without changing any state
    /// when the unit is not in the current hierarchy.
    pub fn activate_suggestion(
        &mut self,
        suggestion_type: SuggestionType,
        suggestion_id: SuggestionId,
        unit_id: UnitId,
    ) -> Option<SelectionTicket> {
        let Some(unit) = find_unit(&self.hierarchy, &unit_id) else {
            warn!(
                unit_id = %unit_id,
                suggestion_id = %suggestion_id,
                "Suggestion targets a unit missing from the hierarchy"
            );
            return None;
        };
        let ticket = self.begin_select(TreeNode::Unit(unit.clone()));
        self.view = ViewMode::builder_for(suggestion_type.document_kind());
        self.suggestion_context = Some(SuggestionContext {
            suggestion_id,
            suggestion_type,
            unit_id,
        });
        Some(ticket)
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            selected: self.selected.clone(),
            view: self.view,
            flags: self.view.flags(),
            loading: self.loading,
            generation: self.generation,
            reports: self.reports.clone(),
            report_counts: count_by_type(&self.reports),
            suggestion_context: self.suggestion_context.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tacops_core::{build_hierarchy, NodeKind, ReportId, ReportType, SoldierId};

    fn hierarchy() -> Vec<Unit> {
        build_hierarchy(
            serde_json::from_value(json!([
                {"unit_id": "B1", "name": "1st Bn", "parent_unit_id": null, "level": "battalion"},
                {"unit_id": "C1", "name": "Alpha Co", "parent_unit_id": "B1", "level": "company",
                 "soldiers": [{"soldier_id": "S1", "name": "Doe", "rank": "SGT", "unit_id": "C1"}]}
            ]))
            .unwrap(),
        )
    }

    fn node(roots: &[Unit], kind: NodeKind, id: &str) -> TreeNode {
        NodeRef {
            kind,
            id: id.to_string(),
        }
        .resolve(roots)
        .unwrap()
    }

    fn report(report_id: &str) -> Report {
        Report {
            report_id: ReportId::new(report_id),
            soldier_id: SoldierId::new("S1"),
            unit_id: UnitId::new("C1"),
            timestamp: "2025-01-01T00:00:00Z".to_string(),
            report_type: ReportType::Contact,
            structured_json: json!({}),
            confidence: 0.5,
            soldier_name: None,
            unit_name: None,
        }
    }

    const ALL_VIEWS: [ViewMode; 5] = [
        ViewMode::Reports,
        ViewMode::Chat,
        ViewMode::FragoBuilder,
        ViewMode::CasevacBuilder,
        ViewMode::EoincrepBuilder,
    ];

    #[test]
    fn exactly_one_view_flag_after_any_switch() {
        let mut controller = SelectionController::new();
        assert_eq!(controller.view().flags().active_count(), 1);
        for from in ALL_VIEWS {
            for to in ALL_VIEWS {
                controller.show(from);
                controller.show(to);
                let flags = controller.view().flags();
                assert_eq!(flags.active_count(), 1);
                assert_eq!(controller.view(), to);
            }
        }
    }

    #[test]
    fn selecting_never_changes_view() {
        let roots = hierarchy();
        let mut controller = SelectionController::new();
        controller.set_hierarchy(roots.clone());
        controller.show(ViewMode::Chat);
        let ticket = controller.begin_select(node(&roots, NodeKind::Unit, "B1"));
        assert_eq!(controller.view(), ViewMode::Chat);
        assert!(controller.is_loading());
        assert!(controller.complete_select(ticket.generation, vec![report("R1")]));
        assert_eq!(controller.view(), ViewMode::Chat);
        assert!(!controller.is_loading());
        assert_eq!(controller.reports().len(), 1);
    }

    #[test]
    fn superseded_result_is_discarded() {
        let roots = hierarchy();
        let mut controller = SelectionController::new();
        controller.set_hierarchy(roots.clone());
        let first = controller.begin_select(node(&roots, NodeKind::Unit, "B1"));
        let second = controller.begin_select(node(&roots, NodeKind::Soldier, "S1"));

        assert!(controller.complete_select(second.generation, vec![report("R-S1")]));
        assert!(!controller.complete_select(first.generation, vec![report("R-B1")]));

        assert_eq!(controller.selected().map(TreeNode::id), Some("S1"));
        assert_eq!(controller.reports()[0].report_id.as_str(), "R-S1");
        assert!(!controller.is_loading());
    }

    #[test]
    fn stale_result_keeps_loading_until_current_arrives() {
        let roots = hierarchy();
        let mut controller = SelectionController::new();
        controller.set_hierarchy(roots.clone());
        let first = controller.begin_select(node(&roots, NodeKind::Unit, "B1"));
        let second = controller.begin_select(node(&roots, NodeKind::Unit, "C1"));
        assert!(!controller.complete_select(first.generation, vec![report("R1")]));
        assert!(controller.is_loading());
        assert!(controller.reports().is_empty());
        assert!(controller.complete_select(second.generation, Vec::new()));
        assert!(!controller.is_loading());
    }

    #[test]
    fn activate_suggestion_selects_unit_and_opens_builder() {
        let mut controller = SelectionController::new();
        controller.set_hierarchy(hierarchy());
        let ticket = controller
            .activate_suggestion(
                SuggestionType::EoincrepEod,
                SuggestionId::new("sg-1"),
                UnitId::new("C1"),
            )
            .unwrap();
        assert_eq!(ticket.node.id(), "C1");
        assert_eq!(controller.view(), ViewMode::EoincrepBuilder);
        let context = controller.suggestion_context().unwrap();
        assert_eq!(context.suggestion_id.as_str(), "sg-1");

        controller.show(ViewMode::EoincrepBuilder);
        assert!(controller.suggestion_context().is_some());
        controller.show(ViewMode::Reports);
        assert!(controller.suggestion_context().is_none());
    }

    #[test]
    fn activate_suggestion_for_unknown_unit_is_noop() {
        let roots = hierarchy();
        let mut controller = SelectionController::new();
        controller.set_hierarchy(roots.clone());
        controller.show(ViewMode::Chat);
        let ticket = controller.begin_select(node(&roots, NodeKind::Unit, "B1"));
        controller.complete_select(ticket.generation, vec![report("R1")]);

        let result = controller.activate_suggestion(
            SuggestionType::Casevac,
            SuggestionId::new("sg-2"),
            UnitId::new("C9"),
        );
        assert!(result.is_none());
        assert_eq!(controller.view(), ViewMode::Chat);
        assert_eq!(controller.selected().map(TreeNode::id), Some("B1"));
        assert_eq!(controller.generation(), ticket.generation);
        assert_eq!(controller.reports().len(), 1);
    }

    #[test]
    fn refresh_reresolves_or_clears_selection() {
        let roots = hierarchy();
        let mut controller = SelectionController::new();
        controller.set_hierarchy(roots.clone());
        let ticket = controller.begin_select(node(&roots, NodeKind::Unit, "C1"));
        controller.complete_select(ticket.generation, vec![report("R1")]);

        let renamed = build_hierarchy(
            serde_json::from_value(json!([
                {"unit_id": "C1", "name": "Alpha Company", "parent_unit_id": null, "level": "company",
                 "soldiers": [{"soldier_id": "S1", "name": "Doe", "rank": "SGT", "unit_id": "C1"}]}
            ]))
            .unwrap(),
        );
        assert!(controller.set_hierarchy(renamed).is_none());
        assert_eq!(controller.selected().map(TreeNode::name), Some("Alpha Company"));
        assert_eq!(controller.reports().len(), 1);

        controller.set_hierarchy(Vec::new());
        assert!(controller.selected().is_none());
        assert!(controller.reports().is_empty());
        assert!(!controller.complete_select(ticket.generation, vec![report("R2")]));
    }

    #[test]
    fn membership_change_on_refresh_starts_a_new_aggregation() {
        let roots = hierarchy();
        let mut controller = SelectionController::new();
        controller.set_hierarchy(roots.clone());
        let first = controller.begin_select(node(&roots, NodeKind::Unit, "C1"));
        controller.complete_select(first.generation, vec![report("R1")]);

        let reinforced = build_hierarchy(
            serde_json::from_value(json!([
                {"unit_id": "B1", "name": "1st Bn", "parent_unit_id": null, "level": "battalion"},
                {"unit_id": "C1", "name": "Alpha Co", "parent_unit_id": "B1", "level": "company",
                 "soldiers": [
                    {"soldier_id": "S1", "name": "Doe", "rank": "SGT", "unit_id": "C1"},
                    {"soldier_id": "S4", "name": "Moe", "rank": "PFC", "unit_id": "C1"}
                 ]}
            ]))
            .unwrap(),
        );
        let ticket = controller.set_hierarchy(reinforced).unwrap();
        assert_eq!(ticket.node.collect_soldier_ids().len(), 2);
        assert!(ticket.generation > first.generation);
        assert!(controller.is_loading());
        assert!(controller.reports().is_empty());
        assert!(!controller.complete_select(first.generation, vec![report("R1")]));
        assert!(controller.complete_select(ticket.generation, vec![report("R1"), report("R5")]));
        assert_eq!(controller.reports().len(), 2);
    }

    #[test]
    fn view_mode_parses_client_names() {
        assert_eq!("frago".parse::<ViewMode>(), Ok(ViewMode::FragoBuilder));
        assert_eq!("casevac-builder".parse::<ViewMode>(), Ok(ViewMode::CasevacBuilder));
        assert_eq!("Reports".parse::<ViewMode>(), Ok(ViewMode::Reports));
        assert!("map".parse::<ViewMode>().is_err());
    }
}
