use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{env, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Local,
    Dev,
    Test,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_env(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "local" => Self::Local,
            "dev" | "development" => Self::Dev,
            "test" | "testing" => Self::Test,
            "staging" => Self::Staging,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Local => "local",
            Self::Dev => "dev",
            Self::Test => "test",
            Self::Staging => "staging",
            Self::Prod => "prod",
        };
        write!(f, "{}", value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
    pub environment: Environment,
    pub bind_addr: String,
    pub metrics_addr: Option<String>,
    pub log_level: String,
    pub templates_dir: String,
    /// Operator sessions unseen for this long are dropped.
    pub session_idle_timeout: Duration,
}

impl ServiceConfig {
    pub fn from_env(default_service_name: &str) -> Self {
        let service_name = env_var("TACOPS_SERVICE_NAME", default_service_name.to_string());
        let environment = Environment::from_env(&env_var("TACOPS_ENV", "local".to_string()));
        let bind_addr = env_var("TACOPS_BIND_ADDR", "0.0.0.0:8080".to_string());
        let metrics_addr = env::var("TACOPS_METRICS_ADDR").ok();
        let log_level = env_var("TACOPS_LOG_LEVEL", "info".to_string());
        let templates_dir = env_var("TACOPS_TEMPLATES_DIR", "templates".to_string());
        let session_idle_secs = env_var_u64("TACOPS_SESSION_IDLE_SECS", 3600);

        Self {
            service_name,
            environment,
            bind_addr,
            metrics_addr,
            log_level,
            templates_dir,
            session_idle_timeout: session_idle_timeout(session_idle_secs),
        }
    }
}

fn session_idle_timeout(secs: u64) -> Duration {
    Duration::from_secs(secs.max(60))
}

/// How reports for a unit subtree are gathered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum UnitReportStrategy {
    /// One bounded `GET /reports?limit=N` page, filtered by subtree membership.
    Page,
    /// One `GET /soldiers/{id}/reports` per member, at most `concurrency` in flight.
    FanOut { concurrency: usize },
}

impl UnitReportStrategy {
    pub fn parse(mode: Option<&str>, concurrency: usize) -> Self {
        match mode.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("fanout" | "fan-out" | "fan_out") => Self::FanOut {
                concurrency: concurrency.max(1),
            },
            _ => Self::Page,
        }
    }
}

/// Connection and polling settings for the external report backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub report_page_limit: usize,
    pub suggestion_poll_interval: Duration,
    pub hierarchy_refresh_interval: Duration,
    pub request_timeout: Option<Duration>,
    pub unit_report_strategy: UnitReportStrategy,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            report_page_limit: 500,
            suggestion_poll_interval: Duration::from_millis(5000),
            hierarchy_refresh_interval: Duration::from_millis(30_000),
            request_timeout: None,
            unit_report_strategy: UnitReportStrategy::Page,
        }
    }
}

impl BackendConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_url = env_var("TACOPS_BACKEND_URL", defaults.base_url);
        let report_page_limit = env_var_usize("TACOPS_REPORT_PAGE_LIMIT", defaults.report_page_limit);
        let poll_ms = env_var_u64("TACOPS_SUGGESTION_POLL_MS", 5000);
        let refresh_ms = env_var_u64("TACOPS_HIERARCHY_REFRESH_MS", 30_000);
        let request_timeout = env::var("TACOPS_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .map(Duration::from_millis);
        let concurrency = env_var_usize("TACOPS_FANOUT_CONCURRENCY", 4);
        let unit_report_strategy = UnitReportStrategy::parse(
            env::var("TACOPS_UNIT_REPORT_STRATEGY").ok().as_deref(),
            concurrency,
        );

        Self {
            base_url,
            report_page_limit: report_page_limit.max(1),
            suggestion_poll_interval: Duration::from_millis(poll_ms.max(100)),
            hierarchy_refresh_interval: Duration::from_millis(refresh_ms.max(1000)),
            request_timeout,
            unit_report_strategy,
        }
    }
}

fn env_var(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn env_var_u64(key: &str, default: u64) -> u64 {
    parse_or(env::var(key).ok(), default)
}

fn env_var_usize(key: &str, default: usize) -> usize {
    parse_or(env::var(key).ok(), default)
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}
