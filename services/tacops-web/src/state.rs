use std::sync::Arc;

use tacops_config::{BackendConfig, ServiceConfig};
use tacops_dashboard::{SessionRegistry, SuggestionPoller};
use tera::Tera;

pub struct AppState {
    pub config: ServiceConfig,
    pub backend_config: BackendConfig,
    pub tera: Tera,
    pub sessions: Arc<SessionRegistry>,
    pub poller: Arc<SuggestionPoller>,
}
