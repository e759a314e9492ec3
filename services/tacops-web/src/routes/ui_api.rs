use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use tacops_core::NodeRef;
use tacops_dashboard::ViewMode;

use crate::routes::common::{api_error, bad_request, tacops_error};
use crate::session::OperatorSession;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ViewRequest {
    pub mode: String,
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    unit_count: usize,
}

#[get("/ui/hierarchy")]
pub async fn hierarchy(OperatorSession(dashboard): OperatorSession) -> HttpResponse {
    HttpResponse::Ok().json(dashboard.hierarchy().await)
}

#[post("/ui/hierarchy/refresh")]
pub async fn refresh_hierarchy(state: web::Data<AppState>) -> HttpResponse {
    match state.sessions.refresh_hierarchy().await {
        Ok(unit_count) => HttpResponse::Ok().json(RefreshResponse { unit_count }),
        Err(err) => api_error(&err),
    }
}

#[get("/ui/selection")]
pub async fn selection(OperatorSession(dashboard): OperatorSession) -> HttpResponse {
    HttpResponse::Ok().json(dashboard.selection().await)
}

#[post("/ui/select")]
pub async fn select(
    OperatorSession(dashboard): OperatorSession,
    payload: web::Json<NodeRef>,
) -> HttpResponse {
    match dashboard.select(&payload).await {
        Ok(snapshot) => HttpResponse::Ok().json(snapshot),
        Err(err) => tacops_error(&err),
    }
}

#[post("/ui/view")]
pub async fn view(
    OperatorSession(dashboard): OperatorSession,
    payload: web::Json<ViewRequest>,
) -> HttpResponse {
    let Ok(mode) = payload.mode.parse::<ViewMode>() else {
        return bad_request(format!("unknown view mode: {}", payload.mode));
    };
    HttpResponse::Ok().json(dashboard.show(mode).await)
}
