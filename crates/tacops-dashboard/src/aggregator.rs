use std::collections::HashSet;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use tacops_client::{ApiError, BackendApi};
use tacops_config::{BackendConfig, UnitReportStrategy};
use tacops_core::{Report, SoldierId, TreeNode};
use tracing::{debug, warn};

/// Gathers the reports relevant to a selected node.
///
/// A soldier node passes the backend's per-soldier listing through as-is.
/// A unit node collects its subtree membership and then either filters one
/// bounded page of recent reports, or fetches each member's reports with a
/// bounded number of requests in flight.
#[derive(Clone)]
pub struct ReportAggregator {
    backend: Arc<dyn BackendApi>,
    strategy: UnitReportStrategy,
    page_limit: usize,
}

impl ReportAggregator {
    pub fn new(backend: Arc<dyn BackendApi>, config: &BackendConfig) -> Self {
        Self {
            backend,
            strategy: config.unit_report_strategy,
            page_limit: config.report_page_limit.max(1),
        }
    }

    pub fn with_strategy(mut self, strategy: UnitReportStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Fail-soft aggregation: any backend failure yields an empty list.
    pub async fn reports_for(&self, node: &TreeNode) -> Vec<Report> {
        match self.try_reports_for(node).await {
            Ok(reports) => reports,
            Err(err) => {
                warn!(
                    node_kind = %node.kind(),
                    node_id = node.id(),
                    error = %err,
                    "Report aggregation failed, showing no reports"
                );
                Vec::new()
            }
        }
    }

    pub async fn try_reports_for(&self, node: &TreeNode) -> Result<Vec<Report>, ApiError> {
        match node {
            TreeNode::Soldier(soldier) => self.backend.soldier_reports(&soldier.soldier_id).await,
            TreeNode::Unit(_) => {
                let members = node.collect_soldier_ids();
                match self.strategy {
                    UnitReportStrategy::Page => self.page_filtered(&members).await,
                    UnitReportStrategy::FanOut { concurrency } => {
                        self.fan_out(&members, concurrency).await
                    }
                }
            }
        }
    }

    async fn page_filtered(&self, members: &[SoldierId]) -> Result<Vec<Report>, ApiError> {
        let page = self.backend.reports(self.page_limit).await?;
        if page.len() >= self.page_limit {
            warn!(
                page_limit = self.page_limit,
                "Report page is full; older reports from unit members may be missing"
            );
        }
        Ok(filter_by_members(page, members))
    }

    async fn fan_out(
        &self,
        members: &[SoldierId],
        concurrency: usize,
    ) -> Result<Vec<Report>, ApiError> {
        let mut seen = HashSet::new();
        let unique: Vec<SoldierId> = members
            .iter()
            .filter(|soldier_id| seen.insert(*soldier_id))
            .cloned()
            .collect();
        debug!(
            members = unique.len(),
            concurrency, "Fetching unit reports per member"
        );
        // Owned ids keep each fetch future 'static and Send.
        let batches: Vec<Vec<Report>> = stream::iter(unique)
            .map(|soldier_id| {
                let backend = Arc::clone(&self.backend);
                async move { backend.soldier_reports(&soldier_id).await }
            })
            .buffer_unordered(concurrency.max(1))
            .try_collect()
            .await?;
        let mut reports: Vec<Report> = batches.into_iter().flatten().collect();
        sort_newest_first(&mut reports);
        Ok(reports)
    }
}

/// Keeps the reports authored by a member, in backend order.
pub fn filter_by_members(reports: Vec<Report>, members: &[SoldierId]) -> Vec<Report> {
    let members: HashSet<&SoldierId> = members.iter().collect();
    reports
        .into_iter()
        .filter(|report| members.contains(&report.soldier_id))
        .collect()
}

// Backend timestamps share one ISO 8601 layout, so the text order is the
// time order. The sort is stable for equal stamps.
fn sort_newest_first(reports: &mut [Report]) {
    reports.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
