use actix_web::{get, post, web, HttpResponse};
use serde::Serialize;
use tacops_core::{Suggestion, SuggestionId};
use tacops_dashboard::SelectionSnapshot;

use crate::routes::common::{api_error, tacops_error};
use crate::session::OperatorSession;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct DraftResponse {
    suggestion: Suggestion,
    selection: SelectionSnapshot,
}

#[get("/ui/suggestions")]
pub async fn list_suggestions(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.poller.feed())
}

#[post("/ui/suggestions/reanalyze")]
pub async fn reanalyze(state: web::Data<AppState>) -> HttpResponse {
    match state.poller.reanalyze().await {
        Ok(summary) => {
            state.poller.poll_once().await;
            HttpResponse::Ok().json(summary)
        }
        Err(err) => api_error(&err),
    }
}

#[post("/ui/suggestions/alert/clear")]
pub async fn clear_alert(state: web::Data<AppState>) -> HttpResponse {
    state.poller.clear_alert();
    HttpResponse::Ok().json(state.poller.feed())
}

#[post("/ui/suggestions/{id}/dismiss")]
pub async fn dismiss(state: web::Data<AppState>, id: web::Path<String>) -> HttpResponse {
    let suggestion_id = SuggestionId::new(id.into_inner());
    match state.poller.dismiss(&suggestion_id).await {
        Ok(()) => HttpResponse::Ok().json(state.poller.feed()),
        Err(err) => api_error(&err),
    }
}

/// Promotes a suggestion to a draft and opens its builder on the
/// suggestion's unit.
#[post("/ui/suggestions/{id}/draft")]
pub async fn create_draft(
    state: web::Data<AppState>,
    OperatorSession(dashboard): OperatorSession,
    id: web::Path<String>,
) -> HttpResponse {
    let suggestion_id = SuggestionId::new(id.into_inner());
    let suggestion = match state.poller.take_for_draft(&suggestion_id).await {
        Ok(suggestion) => suggestion,
        Err(err) => return tacops_error(&err),
    };
    match dashboard.activate_suggestion(&suggestion).await {
        Ok(selection) => HttpResponse::Ok().json(DraftResponse {
            suggestion,
            selection,
        }),
        Err(err) => tacops_error(&err),
    }
}
