use actix_web::{error::ErrorInternalServerError, get, web, Error, HttpResponse};

use crate::render::{build_context, UiTemplateData};
use crate::session::OperatorSession;
use crate::state::AppState;

#[get("/")]
pub async fn index(
    state: web::Data<AppState>,
    OperatorSession(dashboard): OperatorSession,
) -> Result<HttpResponse, Error> {
    let hierarchy = dashboard.hierarchy().await;
    let selection = dashboard.selection().await;
    let draft = match selection.view.document_kind() {
        Some(kind) => Some(dashboard.draft(kind).await),
        None => None,
    };
    let chat = dashboard.chat_transcript().await;
    let feed = state.poller.feed();

    let data = UiTemplateData::from_state(&state, &hierarchy, selection, &feed, chat, draft.as_ref());
    let body = state
        .tera
        .render("index.html", &build_context(&data))
        .map_err(ErrorInternalServerError)?;

    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body))
}
