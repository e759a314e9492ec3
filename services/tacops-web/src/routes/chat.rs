use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;

use crate::routes::common::bad_request;
use crate::session::OperatorSession;

#[derive(Debug, Deserialize)]
pub struct ChatPayload {
    pub message: String,
}

#[get("/ui/chat")]
pub async fn transcript(OperatorSession(dashboard): OperatorSession) -> HttpResponse {
    HttpResponse::Ok().json(dashboard.chat_transcript().await)
}

#[post("/ui/chat")]
pub async fn send(
    OperatorSession(dashboard): OperatorSession,
    payload: web::Json<ChatPayload>,
) -> HttpResponse {
    if dashboard.selected().await.is_none() {
        return bad_request("select a unit or soldier first");
    }
    HttpResponse::Ok().json(dashboard.send_chat(&payload.message).await)
}
