mod render;
mod routes;
mod session;
mod state;

use actix_web::{web, App, HttpServer};
use state::AppState;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tacops_client::{BackendApi, HttpBackend};
use tacops_config::{BackendConfig, ServiceConfig};
use tacops_dashboard::{PeriodicTask, SessionRegistry, SuggestionPoller};
use tacops_observability::{init, log_startup, ObservabilityConfig};
use tera::Tera;
use tracing::{info, warn};

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = ServiceConfig::from_env("tacops-web");
    let backend_config = BackendConfig::from_env();
    let obs_config = ObservabilityConfig {
        service_name: config.service_name.clone(),
        environment: config.environment.to_string(),
        log_level: config.log_level.clone(),
        metrics_addr: config.metrics_addr.clone(),
    };
    let handle = init(&obs_config);
    log_startup(&handle, &obs_config.environment);

    let template_root = if Path::new(&config.templates_dir).exists() {
        config.templates_dir.clone()
    } else {
        "services/tacops-web/templates".to_string()
    };
    let template_glob = format!("{}/**/*", template_root);
    let tera = Tera::new(&template_glob).map_err(|err| io::Error::other(err.to_string()))?;
    let backend: Arc<dyn BackendApi> = Arc::new(
        HttpBackend::new(&backend_config).map_err(|err| io::Error::other(err.to_string()))?,
    );
    info!(
        backend_url = %backend_config.base_url,
        strategy = ?backend_config.unit_report_strategy,
        "Report backend configured"
    );

    let sessions = Arc::new(SessionRegistry::new(Arc::clone(&backend), &backend_config));
    let poller = Arc::new(SuggestionPoller::new(backend, None));
    let suggestion_task = poller.start(backend_config.suggestion_poll_interval);
    let refresh_task = {
        let sessions = Arc::clone(&sessions);
        let idle_timeout = config.session_idle_timeout;
        PeriodicTask::spawn(
            "hierarchy_refresh",
            backend_config.hierarchy_refresh_interval,
            move || {
                let sessions = Arc::clone(&sessions);
                async move {
                    sessions.evict_idle(idle_timeout);
                    if let Err(err) = sessions.refresh_hierarchy().await {
                        warn!(error = %err, "Scheduled hierarchy refresh failed");
                    }
                }
            },
        )
    };

    let bind_addr = config.bind_addr.clone();
    let state = web::Data::new(AppState {
        config,
        backend_config,
        tera,
        sessions,
        poller,
    });

    let served = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .bind(bind_addr)?
    .run()
    .await;

    suggestion_task.stop().await;
    refresh_task.stop().await;
    served
}
