use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tacops_client::{ApiError, BackendApi, ReanalyzeSummary};
use tacops_core::{
    now_rfc3339, Suggestion, SuggestionId, SuggestionType, TacopsError, UnitId, Urgency,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// A repeating background job with explicit start and stop.
///
/// The first run happens immediately. Dropping the handle aborts the task.
pub struct PeriodicTask {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut run: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, mut stopped) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stopped.changed() => break,
                    _ = ticker.tick() => run().await,
                }
            }
            debug!(task = name, "Periodic task stopped");
        });
        info!(task = name, period_ms = period.as_millis() as u64, "Periodic task started");
        Self {
            name,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signals the loop and waits for the current run to finish.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                warn!(task = self.name, error = %err, "Periodic task ended abnormally");
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionAlert {
    pub suggestion_id: SuggestionId,
    pub suggestion_type: SuggestionType,
    pub urgency: Urgency,
    pub title: String,
    pub reason: String,
    pub raised_at: String,
}

impl SuggestionAlert {
    fn from_suggestion(suggestion: &Suggestion) -> Self {
        Self {
            suggestion_id: suggestion.suggestion_id.clone(),
            suggestion_type: suggestion.suggestion_type,
            urgency: suggestion.urgency,
            title: suggestion.alert_title(),
            reason: suggestion.reason.clone(),
            raised_at: now_rfc3339(),
        }
    }
}

/// Latest view of the pending suggestions, published to subscribers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuggestionFeed {
    pub suggestions: Vec<Suggestion>,
    pub alert: Option<SuggestionAlert>,
    pub revision: u64,
    pub updated_at: Option<String>,
    /// Count seen at the last successful poll; local removals do not
    /// change it.
    #[serde(skip)]
    last_polled_count: usize,
}

impl SuggestionFeed {
    pub fn count(&self) -> usize {
        self.suggestions.len()
    }

    /// Returns true when this poll raised a new alert.
    fn apply_poll(&mut self, suggestions: Vec<Suggestion>) -> bool {
        let previous = self.last_polled_count;
        let count = suggestions.len();
        let mut raised = false;
        if count > previous && previous > 0 {
            if let Some(newest) = suggestions.first() {
                self.alert = Some(SuggestionAlert::from_suggestion(newest));
                raised = true;
            }
        }
        self.last_polled_count = count;
        self.suggestions = suggestions;
        self.touch();
        raised
    }

    fn remove(&mut self, suggestion_id: &SuggestionId) -> Option<Suggestion> {
        let index = self
            .suggestions
            .iter()
            .position(|suggestion| &suggestion.suggestion_id == suggestion_id)?;
        let removed = self.suggestions.remove(index);
        if self
            .alert
            .as_ref()
            .is_some_and(|alert| &alert.suggestion_id == suggestion_id)
        {
            self.alert = None;
        }
        self.touch();
        Some(removed)
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.updated_at = Some(now_rfc3339());
    }
}

/// Polls the backend for pending suggestions and publishes them over a
/// `watch` channel.
pub struct SuggestionPoller {
    backend: Arc<dyn BackendApi>,
    unit_filter: Option<UnitId>,
    feed: watch::Sender<SuggestionFeed>,
}

impl SuggestionPoller {
    pub fn new(backend: Arc<dyn BackendApi>, unit_filter: Option<UnitId>) -> Self {
        let (feed, _) = watch::channel(SuggestionFeed::default());
        Self {
            backend,
            unit_filter,
            feed,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SuggestionFeed> {
        self.feed.subscribe()
    }

    pub fn feed(&self) -> SuggestionFeed {
        self.feed.borrow().clone()
    }

    /// Fetches pending suggestions once. A failed poll keeps the previous
    /// list and returns false.
    pub async fn poll_once(&self) -> bool {
        match self
            .backend
            .pending_suggestions(self.unit_filter.as_ref())
            .await
        {
            Ok(suggestions) => {
                let mut raised = false;
                self.feed
                    .send_modify(|feed| raised = feed.apply_poll(suggestions));
                if raised {
                    if let Some(alert) = &self.feed.borrow().alert {
                        info!(
                            suggestion_id = %alert.suggestion_id,
                            urgency = ?alert.urgency,
                            title = %alert.title,
                            "New suggestion"
                        );
                    }
                }
                true
            }
            Err(err) => {
                warn!(error = %err, "Suggestion poll failed, keeping previous list");
                false
            }
        }
    }

    pub async fn reanalyze(&self) -> Result<ReanalyzeSummary, ApiError> {
        let summary = self.backend.reanalyze_suggestions().await?;
        info!(
            reports_analyzed = summary.reports_analyzed,
            suggestions_created = summary.suggestions_created,
            "Reports reanalyzed for suggestions"
        );
        Ok(summary)
    }

    /// Asks for a reanalysis once, then polls every `period` until the
    /// returned task is stopped or dropped.
    pub fn start(self: &Arc<Self>, period: Duration) -> PeriodicTask {
        let poller = Arc::clone(self);
        let mut reanalyze_pending = true;
        PeriodicTask::spawn("suggestion_poll", period, move || {
            let poller = Arc::clone(&poller);
            let reanalyze = std::mem::take(&mut reanalyze_pending);
            async move {
                if reanalyze {
                    if let Err(err) = poller.reanalyze().await {
                        warn!(error = %err, "Suggestion reanalysis failed");
                    }
                }
                poller.poll_once().await;
            }
        })
    }

    /// Deletes the suggestion remotely, then drops it from the feed.
    pub async fn dismiss(&self, suggestion_id: &SuggestionId) -> Result<(), ApiError> {
        self.backend.dismiss_suggestion(suggestion_id).await?;
        self.feed.send_modify(|feed| {
            feed.remove(suggestion_id);
        });
        info!(suggestion_id = %suggestion_id, "Suggestion dismissed");
        Ok(())
    }

    /// Marks the suggestion as drafted remotely and removes it from the
    /// feed, returning it so the caller can open the matching builder.
    pub async fn take_for_draft(&self, suggestion_id: &SuggestionId) -> Result<Suggestion, TacopsError> {
        let known = self
            .feed
            .borrow()
            .suggestions
            .iter()
            .find(|suggestion| &suggestion.suggestion_id == suggestion_id)
            .cloned();
        let Some(suggestion) = known else {
            return Err(TacopsError::not_found(format!(
                "suggestion {suggestion_id} is not pending"
            )));
        };
        self.backend
            .create_suggestion_draft(suggestion_id)
            .await
            .map_err(|err| TacopsError::new(err.code(), err.detail_or("Unknown error")))?;
        self.feed.send_modify(|feed| {
            feed.remove(suggestion_id);
        });
        info!(
            suggestion_id = %suggestion_id,
            suggestion_type = suggestion.suggestion_type.as_str(),
            "Suggestion promoted to draft"
        );
        Ok(suggestion)
    }

    pub fn clear_alert(&self) {
        self.feed.send_if_modified(|feed| feed.alert.take().is_some());
    }
}
