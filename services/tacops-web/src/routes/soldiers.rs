use actix_web::{get, post, web, HttpResponse};
use serde::Serialize;
use tacops_core::{NewReport, RawInput, SoldierId};

use crate::routes::common::{api_error, bad_request};
use crate::session::OperatorSession;

#[derive(Debug, Serialize)]
struct RawInputsResponse {
    soldier_id: SoldierId,
    raw_inputs: Vec<RawInput>,
}

#[get("/ui/soldiers")]
pub async fn list_soldiers(OperatorSession(dashboard): OperatorSession) -> HttpResponse {
    match dashboard.soldiers().await {
        Ok(soldiers) => HttpResponse::Ok().json(soldiers),
        Err(err) => api_error(&err),
    }
}

#[get("/ui/soldiers/{id}/raw-inputs")]
pub async fn raw_inputs(
    OperatorSession(dashboard): OperatorSession,
    id: web::Path<String>,
) -> HttpResponse {
    let soldier_id = SoldierId::new(id.into_inner());
    let raw_inputs = dashboard.raw_inputs(&soldier_id).await;
    HttpResponse::Ok().json(RawInputsResponse {
        soldier_id,
        raw_inputs,
    })
}

#[post("/ui/soldiers/{id}/reports")]
pub async fn submit_report(
    OperatorSession(dashboard): OperatorSession,
    id: web::Path<String>,
    payload: web::Json<NewReport>,
) -> HttpResponse {
    let soldier_id = SoldierId::new(id.into_inner());
    if soldier_id.is_blank() {
        return bad_request("soldier id is required");
    }
    match dashboard.submit_report(&soldier_id, &payload).await {
        Ok(submitted) => HttpResponse::Created().json(submitted),
        Err(err) => api_error(&err),
    }
}
