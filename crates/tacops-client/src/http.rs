use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::{DeserializeOwned, IgnoredAny};
use tacops_config::BackendConfig;
use tacops_core::{
    DocumentKind, NewReport, RawInput, Report, Soldier, SoldierId, Suggestion, SuggestionId,
    UnitId, UnitRecord,
};
use tacops_observability::{record_backend_request, RequestOutcome};

use crate::backend::BackendApi;
use crate::error::{extract_detail, ApiError};
use crate::wire::{
    ChatReply, ChatRequest, FieldSuggestion, FormContext, GenerateRequest, GenerateResponse,
    HierarchyEnvelope, RawInputsEnvelope, ReanalyzeSummary, ReportsEnvelope, SoldiersEnvelope,
    SubmittedReport, SuggestionsEnvelope,
};

/// reqwest client for the report backend. The base URL is injected at
/// construction so tests and deployments can point it anywhere.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, ApiError> {
        let base_url = parse_base_url(&config.base_url)?;
        let mut builder =
            Client::builder().user_agent(format!("tacops-web/{}", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        endpoint_url(&self.base_url, segments)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                record_backend_request(endpoint, RequestOutcome::Transport);
                return Err(err.into());
            }
        };
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            record_backend_request(endpoint, RequestOutcome::Status);
            return Err(ApiError::Status {
                endpoint,
                status: status.as_u16(),
                detail: extract_detail(&body),
            });
        }
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                record_backend_request(endpoint, RequestOutcome::Transport);
                return Err(err.into());
            }
        };
        match serde_json::from_slice::<T>(&bytes) {
            Ok(value) => {
                record_backend_request(endpoint, RequestOutcome::Ok);
                Ok(value)
            }
            Err(err) => {
                record_backend_request(endpoint, RequestOutcome::Decode);
                Err(ApiError::Decode {
                    endpoint,
                    message: err.to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn hierarchy(&self) -> Result<Vec<UnitRecord>, ApiError> {
        let url = self.url(&["hierarchy"])?;
        let envelope: HierarchyEnvelope =
            self.send_json("hierarchy", self.client.get(url)).await?;
        Ok(envelope.hierarchy)
    }

    async fn soldiers(&self) -> Result<Vec<Soldier>, ApiError> {
        let url = self.url(&["soldiers"])?;
        let envelope: SoldiersEnvelope = self.send_json("soldiers", self.client.get(url)).await?;
        Ok(envelope.soldiers)
    }

    async fn soldier_raw_inputs(&self, soldier_id: &SoldierId) -> Result<Vec<RawInput>, ApiError> {
        let url = self.url(&["soldiers", soldier_id.as_str(), "raw_inputs"])?;
        let envelope: RawInputsEnvelope =
            self.send_json("raw_inputs", self.client.get(url)).await?;
        Ok(envelope.raw_inputs)
    }

    async fn soldier_reports(&self, soldier_id: &SoldierId) -> Result<Vec<Report>, ApiError> {
        let url = self.url(&["soldiers", soldier_id.as_str(), "reports"])?;
        let envelope: ReportsEnvelope =
            self.send_json("soldier_reports", self.client.get(url)).await?;
        Ok(envelope.reports)
    }

    async fn reports(&self, limit: usize) -> Result<Vec<Report>, ApiError> {
        let url = self.url(&["reports"])?;
        let request = self.client.get(url).query(&[("limit", limit)]);
        let envelope: ReportsEnvelope = self.send_json("reports", request).await?;
        Ok(envelope.reports)
    }

    async fn submit_report(
        &self,
        soldier_id: &SoldierId,
        report: &NewReport,
    ) -> Result<SubmittedReport, ApiError> {
        let url = self.url(&["soldiers", soldier_id.as_str(), "reports"])?;
        self.send_json("submit_report", self.client.post(url).json(report))
            .await
    }

    async fn pending_suggestions(
        &self,
        unit_id: Option<&UnitId>,
    ) -> Result<Vec<Suggestion>, ApiError> {
        let url = self.url(&["api", "suggestions"])?;
        let mut query = vec![("status", "pending")];
        if let Some(unit_id) = unit_id {
            query.push(("unit_id", unit_id.as_str()));
        }
        let request = self.client.get(url).query(&query);
        let envelope: SuggestionsEnvelope = self.send_json("suggestions", request).await?;
        Ok(envelope.suggestions)
    }

    async fn reanalyze_suggestions(&self) -> Result<ReanalyzeSummary, ApiError> {
        let url = self.url(&["api", "suggestions", "reanalyze"])?;
        self.send_json("reanalyze", self.client.post(url)).await
    }

    async fn create_suggestion_draft(&self, suggestion_id: &SuggestionId) -> Result<(), ApiError> {
        let url = self.url(&["api", "suggestions", suggestion_id.as_str(), "create-draft"])?;
        let _: IgnoredAny = self.send_json("create_draft", self.client.post(url)).await?;
        Ok(())
    }

    async fn dismiss_suggestion(&self, suggestion_id: &SuggestionId) -> Result<(), ApiError> {
        let url = self.url(&["api", "suggestions", suggestion_id.as_str()])?;
        let _: IgnoredAny = self.send_json("dismiss", self.client.delete(url)).await?;
        Ok(())
    }

    async fn suggest_fields(
        &self,
        kind: DocumentKind,
        context: &FormContext,
    ) -> Result<FieldSuggestion, ApiError> {
        let url = self.url(&[kind.slug(), "suggest"])?;
        self.send_json(suggest_endpoint(kind), self.client.post(url).json(context))
            .await
    }

    async fn generate_document(
        &self,
        kind: DocumentKind,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ApiError> {
        let url = self.url(&[kind.slug(), "generate"])?;
        let body = request.body(kind);
        self.send_json(generate_endpoint(kind), self.client.post(url).json(&body))
            .await
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ApiError> {
        let url = self.url(&["ai", "chat"])?;
        self.send_json("chat", self.client.post(url).json(request))
            .await
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let base = format!("{}/", raw.trim().trim_end_matches('/'));
    let url = Url::parse(&base).map_err(|err| ApiError::Url(err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ApiError::Url(format!("{raw} cannot be used as a base url")));
    }
    Ok(url)
}

// Identifiers are pushed as encoded path segments, never spliced into the
// path string.
fn endpoint_url(base: &Url, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ApiError::Url(format!("{base} cannot be used as a base url")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn suggest_endpoint(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Frago => "frago_suggest",
        DocumentKind::Casevac => "casevac_suggest",
        DocumentKind::Eoincrep => "eoincrep_suggest",
    }
}

fn generate_endpoint(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Frago => "frago_generate",
        DocumentKind::Casevac => "casevac_generate",
        DocumentKind::Eoincrep => "eoincrep_generate",
    }
}
