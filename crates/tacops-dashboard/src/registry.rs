use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tacops_client::{ApiError, BackendApi};
use tacops_config::BackendConfig;
use tacops_core::{count_units, Unit};
use tracing::{debug, info};
use uuid::Uuid;

use crate::session::{fetch_hierarchy, Dashboard, HierarchySnapshot};

struct SessionEntry {
    dashboard: Arc<Dashboard>,
    last_seen: Instant,
}

/// One [`Dashboard`] per operator, keyed by an opaque session id.
///
/// The hierarchy is fetched once per refresh and pushed into every live
/// session; new sessions start from the latest snapshot.
pub struct SessionRegistry {
    backend: Arc<dyn BackendApi>,
    config: BackendConfig,
    hierarchy: Mutex<Vec<Unit>>,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new(backend: Arc<dyn BackendApi>, config: &BackendConfig) -> Self {
        Self {
            backend,
            config: config.clone(),
            hierarchy: Mutex::new(Vec::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn units(&self) -> MutexGuard<'_, Vec<Unit>> {
        self.hierarchy.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a session with a fresh id.
    pub fn open(&self) -> (String, Arc<Dashboard>) {
        let session_id = Uuid::new_v4().to_string();
        let units = self.units().clone();
        let dashboard = Arc::new(
            Dashboard::new(Arc::clone(&self.backend), &self.config).with_hierarchy(units),
        );
        self.sessions().insert(
            session_id.clone(),
            SessionEntry {
                dashboard: Arc::clone(&dashboard),
                last_seen: Instant::now(),
            },
        );
        debug!(session_id = %session_id, "Operator session opened");
        (session_id, dashboard)
    }

    /// Looks up a live session and marks it as seen.
    pub fn get(&self, session_id: &str) -> Option<Arc<Dashboard>> {
        let mut sessions = self.sessions();
        let entry = sessions.get_mut(session_id)?;
        entry.last_seen = Instant::now();
        Some(Arc::clone(&entry.dashboard))
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    pub fn hierarchy(&self) -> HierarchySnapshot {
        let units = self.units().clone();
        HierarchySnapshot {
            unit_count: count_units(&units),
            units,
        }
    }

    /// Refetches the forest and installs it in every session. On failure
    /// all sessions keep their previous snapshot.
    pub async fn refresh_hierarchy(&self) -> Result<usize, ApiError> {
        let forest = fetch_hierarchy(self.backend.as_ref()).await?;
        let unit_count = count_units(&forest);
        *self.units() = forest.clone();
        let dashboards: Vec<Arc<Dashboard>> = self
            .sessions()
            .values()
            .map(|entry| Arc::clone(&entry.dashboard))
            .collect();
        for dashboard in &dashboards {
            dashboard.apply_hierarchy(forest.clone()).await;
        }
        info!(
            units = unit_count,
            sessions = dashboards.len(),
            "Hierarchy refreshed"
        );
        Ok(unit_count)
    }

    /// Drops sessions not seen for `idle`. Returns how many were dropped.
    pub fn evict_idle(&self, idle: Duration) -> usize {
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() < idle);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Evicted idle operator sessions");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tacops_client::MockBackend;
    use tacops_core::{NodeKind, NodeRef, TreeNode};

    fn backend() -> Arc<MockBackend> {
        Arc::new(
            MockBackend::new().with_hierarchy(
                serde_json::from_value(json!([
                    {"unit_id": "B1", "name": "1st Bn", "parent_unit_id": null, "level": "battalion"},
                    {"unit_id": "C1", "name": "Alpha Company", "parent_unit_id": "B1", "level": "company"},
                    {"unit_id": "C2", "name": "Bravo Company", "parent_unit_id": "B1", "level": "company"}
                ]))
                .unwrap(),
            ),
        )
    }

    fn unit(id: &str) -> NodeRef {
        NodeRef {
            kind: NodeKind::Unit,
            id: id.to_string(),
        }
    }

    #[tokio::test]
    async fn operators_keep_separate_selections() {
        let registry = SessionRegistry::new(backend(), &BackendConfig::default());
        registry.refresh_hierarchy().await.unwrap();
        let (first_id, first) = registry.open();
        let (second_id, second) = registry.open();
        assert_ne!(first_id, second_id);
        assert_eq!(registry.len(), 2);

        first.select(&unit("C1")).await.unwrap();
        let snapshot = second.select(&unit("C2")).await.unwrap();
        assert_eq!(snapshot.selected.as_ref().map(TreeNode::id), Some("C2"));

        let first_again = registry.get(&first_id).unwrap();
        let current = first_again.selection().await;
        assert_eq!(current.selected.as_ref().map(TreeNode::id), Some("C1"));
        assert!(registry.get("no-such-session").is_none());
    }

    #[tokio::test]
    async fn refresh_fetches_once_and_reaches_every_session() {
        let backend = backend();
        let registry = SessionRegistry::new(backend.clone(), &BackendConfig::default());
        let (_, early) = registry.open();
        assert_eq!(early.hierarchy().await.unit_count, 0);

        assert_eq!(registry.refresh_hierarchy().await.unwrap(), 3);
        assert_eq!(backend.call_count("hierarchy"), 1);
        assert_eq!(early.hierarchy().await.unit_count, 3);

        let (_, late) = registry.open();
        assert_eq!(late.hierarchy().await.unit_count, 3);
        assert_eq!(registry.hierarchy().unit_count, 3);

        backend.fail("hierarchy", None);
        assert!(registry.refresh_hierarchy().await.is_err());
        assert_eq!(late.hierarchy().await.unit_count, 3);
    }

    #[test]
    fn idle_sessions_are_evicted() {
        let registry = SessionRegistry::new(backend(), &BackendConfig::default());
        registry.open();
        registry.open();
        assert_eq!(registry.evict_idle(Duration::from_secs(3600)), 0);
        assert_eq!(registry.evict_idle(Duration::ZERO), 2);
        assert!(registry.is_empty());
    }
}
