use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{get, post, put, web, HttpResponse};
use serde_json::{Map, Value};

use crate::routes::common::{form_error, not_found, parse_document_kind, tacops_error};
use crate::session::OperatorSession;

#[get("/ui/forms/{kind}")]
pub async fn get_draft(
    OperatorSession(dashboard): OperatorSession,
    kind: web::Path<String>,
) -> HttpResponse {
    let kind = match parse_document_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    HttpResponse::Ok().json(dashboard.draft(kind).await)
}

#[put("/ui/forms/{kind}")]
pub async fn edit_draft(
    OperatorSession(dashboard): OperatorSession,
    kind: web::Path<String>,
    payload: web::Json<Map<String, Value>>,
) -> HttpResponse {
    let kind = match parse_document_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    match dashboard.edit_draft(kind, &payload).await {
        Ok(draft) => HttpResponse::Ok().json(draft),
        Err(err) => tacops_error(&err),
    }
}

#[post("/ui/forms/{kind}/suggest")]
pub async fn suggest(
    OperatorSession(dashboard): OperatorSession,
    kind: web::Path<String>,
) -> HttpResponse {
    let kind = match parse_document_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    match dashboard.suggest_fields(kind).await {
        Ok(draft) => HttpResponse::Ok().json(draft),
        Err(err) => form_error(&err),
    }
}

#[post("/ui/forms/{kind}/generate")]
pub async fn generate(
    OperatorSession(dashboard): OperatorSession,
    kind: web::Path<String>,
) -> HttpResponse {
    let kind = match parse_document_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    match dashboard.generate(kind).await {
        Ok(document) => HttpResponse::Ok().json(document),
        Err(err) => form_error(&err),
    }
}

/// The last generated document of `kind`, as a plain-text attachment.
#[get("/ui/forms/{kind}/download")]
pub async fn download(
    OperatorSession(dashboard): OperatorSession,
    kind: web::Path<String>,
) -> HttpResponse {
    let kind = match parse_document_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    let Some(document) = dashboard.generated(kind).await else {
        return not_found(format!("no {kind} has been generated"));
    };
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(document.filename())],
        })
        .body(document.formatted_document)
}
