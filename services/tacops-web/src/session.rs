use std::future::{ready, Ready};
use std::sync::Arc;

use actix_web::body::MessageBody;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::error::ErrorInternalServerError;
use actix_web::middleware::Next;
use actix_web::{web, Error, FromRequest, HttpMessage, HttpRequest};
use tacops_dashboard::Dashboard;
use tracing::debug;

use crate::state::AppState;

pub const SESSION_COOKIE: &str = "tacops_session";

#[derive(Debug, Clone)]
struct OpenedSession(String);

/// The calling operator's dashboard, looked up by session cookie.
///
/// A request without a live session opens a new one and
/// [`issue_session_cookie`] hands its id back on the response.
pub struct OperatorSession(pub Arc<Dashboard>);

impl FromRequest for OperatorSession {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(resolve(req))
    }
}

fn resolve(req: &HttpRequest) -> Result<OperatorSession, Error> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ErrorInternalServerError("application state is not configured"))?;
    let known = req
        .cookie(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.get(cookie.value()));
    if let Some(dashboard) = known {
        return Ok(OperatorSession(dashboard));
    }
    let (session_id, dashboard) = state.sessions.open();
    debug!(path = %req.path(), sessions = state.sessions.len(), "Issuing operator session");
    req.extensions_mut().insert(OpenedSession(session_id));
    Ok(OperatorSession(dashboard))
}

pub async fn issue_session_cookie(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let mut response = next.call(req).await?;
    let opened = response
        .request()
        .extensions()
        .get::<OpenedSession>()
        .cloned();
    if let Some(OpenedSession(session_id)) = opened {
        response
            .response_mut()
            .add_cookie(&session_cookie(session_id))?;
    }
    Ok(response)
}

pub fn session_cookie(session_id: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, session_id)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .finish()
}
