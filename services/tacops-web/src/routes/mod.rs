pub mod chat;
pub mod common;
pub mod forms;
pub mod health;
pub mod soldiers;
pub mod stream;
pub mod suggestions;
pub mod ui;
pub mod ui_api;

use actix_web::middleware::from_fn;
use actix_web::web;

use crate::session::issue_session_cookie;

/// Health stays outside the session scope; every operator-facing route
/// sits behind the session cookie middleware.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health).service(
        web::scope("")
            .wrap(from_fn(issue_session_cookie))
            .service(ui::index)
            .service(ui_api::hierarchy)
            .service(ui_api::refresh_hierarchy)
            .service(ui_api::selection)
            .service(ui_api::select)
            .service(ui_api::view)
            .service(soldiers::list_soldiers)
            .service(soldiers::raw_inputs)
            .service(soldiers::submit_report)
            .service(suggestions::list_suggestions)
            .service(suggestions::reanalyze)
            .service(suggestions::clear_alert)
            .service(suggestions::dismiss)
            .service(suggestions::create_draft)
            .service(forms::get_draft)
            .service(forms::edit_draft)
            .service(forms::suggest)
            .service(forms::generate)
            .service(forms::download)
            .service(chat::transcript)
            .service(chat::send)
            .service(stream::sse)
            .service(stream::ws_route),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tacops_client::{BackendApi, MockBackend};
    use tacops_config::{BackendConfig, ServiceConfig};
    use tacops_core::{DocumentKind, NodeKind, NodeRef};
    use tacops_dashboard::{Dashboard, SessionRegistry, SuggestionPoller, ViewMode};
    use tera::Tera;

    use crate::session::{session_cookie, SESSION_COOKIE};
    use crate::state::AppState;

    fn hierarchy_records() -> Value {
        json!([
            {"unit_id": "B1", "name": "1st Battalion", "parent_unit_id": null, "level": "battalion"},
            {"unit_id": "C1", "name": "Alpha Company", "parent_unit_id": "B1", "level": "company",
             "soldiers": [{"soldier_id": "S1", "name": "Doe", "rank": "SGT", "unit_id": "C1"}]},
            {"unit_id": "C2", "name": "Bravo Company", "parent_unit_id": "B1", "level": "company",
             "soldiers": [{"soldier_id": "S2", "name": "Roe", "rank": "CPL", "unit_id": "C2"}]}
        ])
    }

    fn backend() -> MockBackend {
        MockBackend::new()
            .with_hierarchy(serde_json::from_value(hierarchy_records()).unwrap())
            .with_reports(
                serde_json::from_value(json!([
                    {"report_id": "R1", "soldier_id": "S1", "unit_id": "C1", "timestamp": "2025-01-01T10:00:00Z",
                     "report_type": "CONTACT", "structured_json": "{\"description\": \"Enemy squad east\"}", "confidence": 0.8},
                    {"report_id": "R2", "soldier_id": "S2", "unit_id": "C2", "timestamp": "2025-01-01T09:00:00Z",
                     "report_type": "SITREP", "structured_json": {"status": "holding"}, "confidence": 0.9}
                ]))
                .unwrap(),
            )
            .with_suggestions(
                serde_json::from_value(json!([
                    {"suggestion_id": "G1", "suggestion_type": "CASEVAC", "urgency": "URGENT",
                     "reason": "Casualty reported", "confidence": 0.9, "unit_id": "C1", "status": "pending"}
                ]))
                .unwrap(),
            )
    }

    async fn app_state(backend: Arc<MockBackend>) -> web::Data<AppState> {
        let backend_config = BackendConfig::default();
        let api: Arc<dyn BackendApi> = backend;
        let sessions = Arc::new(SessionRegistry::new(Arc::clone(&api), &backend_config));
        sessions.refresh_hierarchy().await.unwrap();
        let poller = Arc::new(SuggestionPoller::new(api, None));
        let tera = Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*")).unwrap();
        web::Data::new(AppState {
            config: ServiceConfig::from_env("tacops-web"),
            backend_config,
            tera,
            sessions,
            poller,
        })
    }

    /// Opens a session directly and returns the cookie addressing it.
    fn operator(state: &web::Data<AppState>) -> (Cookie<'static>, Arc<Dashboard>) {
        let (session_id, dashboard) = state.sessions.open();
        (session_cookie(session_id), dashboard)
    }

    macro_rules! post_json {
        ($app:expr, $cookie:expr, $uri:expr, $body:expr) => {{
            let response = test::call_service(
                &$app,
                test::TestRequest::post()
                    .uri($uri)
                    .cookie($cookie.clone())
                    .set_json($body)
                    .to_request(),
            )
            .await;
            let status = response.status();
            let body: Value = test::read_body_json(response).await;
            (status, body)
        }};
    }

    macro_rules! get_json {
        ($app:expr, $cookie:expr, $uri:expr) => {{
            let response = test::call_service(
                &$app,
                test::TestRequest::get()
                    .uri($uri)
                    .cookie($cookie.clone())
                    .to_request(),
            )
            .await;
            let status = response.status();
            let body: Value = test::read_body_json(response).await;
            (status, body)
        }};
    }

    #[actix_web::test]
    async fn health_reports_ok() {
        let state = app_state(Arc::new(backend())).await;
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;
        let response =
            test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let body: Value = test::read_body_json(response).await;
        assert_eq!(body, json!({"status": "ok"}));
        assert!(state.sessions.is_empty());
    }

    #[actix_web::test]
    async fn first_request_opens_a_session_and_operators_stay_apart() {
        let state = app_state(Arc::new(backend())).await;
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let response = test::call_service(
            &app,
            test::TestRequest::get().uri("/ui/selection").to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let alpha = response
            .response()
            .cookies()
            .find(|cookie| cookie.name() == SESSION_COOKIE)
            .map(|cookie| cookie.into_owned())
            .unwrap();
        assert_eq!(alpha.http_only(), Some(true));

        let (bravo, _) = operator(&state);
        post_json!(app, alpha, "/ui/select", json!({"type": "unit", "id": "C1"}));
        post_json!(app, bravo, "/ui/select", json!({"type": "unit", "id": "C2"}));
        post_json!(app, bravo, "/ui/view", json!({"mode": "chat"}));

        let response = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/ui/selection")
                .cookie(alpha.clone())
                .to_request(),
        )
        .await;
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["selected"]["unit_id"], "C1");
        assert_eq!(body["view"], "reports");
        assert_eq!(state.sessions.len(), 2);

        let stale = Cookie::new(SESSION_COOKIE, "expired-session");
        let response = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/ui/selection")
                .cookie(stale)
                .to_request(),
        )
        .await;
        assert!(response.headers().get(header::SET_COOKIE).is_some());
        assert_eq!(state.sessions.len(), 3);
    }

    #[actix_web::test]
    async fn selecting_a_unit_aggregates_member_reports() {
        let state = app_state(Arc::new(backend())).await;
        let (cookie, _) = operator(&state);
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let (status, body) = post_json!(app, cookie, "/ui/select", json!({"type": "unit", "id": "C1"}));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["selected"]["unit_id"], "C1");
        assert_eq!(body["view"], "reports");
        assert_eq!(body["loading"], false);
        let ids: Vec<&str> = body["reports"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|report| report["report_id"].as_str())
            .collect();
        assert_eq!(ids, vec!["R1"]);

        let (status, body) =
            post_json!(app, cookie, "/ui/select", json!({"type": "soldier", "id": "S9"}));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "soldier S9 is not in the hierarchy");
    }

    #[actix_web::test]
    async fn view_switch_keeps_exactly_one_panel() {
        let state = app_state(Arc::new(backend())).await;
        let (cookie, _) = operator(&state);
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let (status, body) = post_json!(app, cookie, "/ui/view", json!({"mode": "chat"}));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["flags"]["show_chat"], true);
        assert_eq!(body["flags"]["show_reports"], false);

        let (status, body) = post_json!(app, cookie, "/ui/view", json!({"mode": "map"}));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "unknown view mode: map");
    }

    #[actix_web::test]
    async fn builder_generates_and_downloads_named_document() {
        let state = app_state(Arc::new(backend())).await;
        let (cookie, _) = operator(&state);
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;
        post_json!(app, cookie, "/ui/select", json!({"type": "unit", "id": "C1"}));

        let (status, body) = post_json!(app, cookie, "/ui/forms/casevac/generate", json!({}));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to generate CASEVAC:"));

        let response = test::call_service(
            &app,
            test::TestRequest::put()
                .uri("/ui/forms/casevac")
                .cookie(cookie.clone())
                .set_json(json!({"location": "38SMB4484", "patients": "2 urgent"}))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let draft: Value = test::read_body_json(response).await;
        assert_eq!(draft["can_generate"], true);
        assert_eq!(draft["fields"]["precedence"], "A");

        let (status, body) = post_json!(app, cookie, "/ui/forms/casevac/generate", json!({}));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sequence"], 1);

        let response = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/ui/forms/casevac/download")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .unwrap()
            .to_string();
        assert!(disposition.contains("CASEVAC_0001_Alpha_Company.txt"));
        let text = test::read_body(response).await;
        assert!(String::from_utf8_lossy(&text).starts_with("CASEVAC 0001"));
    }

    #[actix_web::test]
    async fn unknown_fields_and_kinds_are_rejected() {
        let state = app_state(Arc::new(backend())).await;
        let (cookie, _) = operator(&state);
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let response = test::call_service(
            &app,
            test::TestRequest::put()
                .uri("/ui/forms/frago")
                .cookie(cookie.clone())
                .set_json(json!({"weather": "clear"}))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let (status, _) = get_json!(app, cookie, "/ui/forms/opord/download");
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get_json!(app, cookie, "/ui/forms/frago/download");
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn suggest_failure_surfaces_backend_detail() {
        let backend = Arc::new(backend());
        let state = app_state(Arc::clone(&backend)).await;
        let (cookie, _) = operator(&state);
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;
        post_json!(app, cookie, "/ui/select", json!({"type": "unit", "id": "C1"}));

        backend.fail("eoincrep_suggest", Some("model offline"));
        let (status, body) = post_json!(app, cookie, "/ui/forms/eoincrep/suggest", json!({}));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Failed to get AI suggestions: model offline");
    }

    #[actix_web::test]
    async fn drafting_a_suggestion_opens_its_builder() {
        let backend = Arc::new(backend());
        let state = app_state(Arc::clone(&backend)).await;
        state.poller.poll_once().await;
        let (cookie, _) = operator(&state);
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let (status, body) = post_json!(app, cookie, "/ui/suggestions/G1/draft", json!({}));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["selection"]["view"], "casevac_builder");
        assert_eq!(body["selection"]["selected"]["unit_id"], "C1");
        assert_eq!(body["selection"]["suggestion_context"]["suggestion_id"], "G1");
        assert_eq!(state.poller.feed().count(), 0);
        assert_eq!(backend.call_count("create_draft:G1"), 1);

        let (status, _) = post_json!(app, cookie, "/ui/suggestions/G9/dismiss", json!({}));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn chat_requires_a_selection() {
        let state = app_state(Arc::new(backend().with_chat_reply("Hold position."))).await;
        let (cookie, _) = operator(&state);
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let (status, _) = post_json!(app, cookie, "/ui/chat", json!({"message": "status?"}));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        post_json!(app, cookie, "/ui/select", json!({"type": "soldier", "id": "S1"}));
        let (status, body) = post_json!(app, cookie, "/ui/chat", json!({"message": "status?"}));
        assert_eq!(status, StatusCode::OK);
        let transcript = body.as_array().unwrap();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[1]["role"], "user");
        assert_eq!(transcript[2]["content"], "Hold position.");
    }

    #[actix_web::test]
    async fn soldier_endpoints_list_detail_and_submit() {
        let backend = Arc::new(
            backend()
                .with_soldiers(
                    serde_json::from_value(json!([
                        {"soldier_id": "S1", "name": "Doe", "rank": "SGT", "unit_id": "C1", "status": "active"},
                        {"soldier_id": "S2", "name": "Roe", "rank": "CPL", "unit_id": "C2", "status": "injured"}
                    ]))
                    .unwrap(),
                )
                .with_raw_inputs(
                    "S1",
                    serde_json::from_value(json!([
                        {"input_id": "I1", "soldier_id": "S1", "timestamp": "2025-01-01T10:00:00Z",
                         "raw_text": "Taking fire from the treeline"}
                    ]))
                    .unwrap(),
                ),
        );
        let state = app_state(Arc::clone(&backend)).await;
        let (cookie, _) = operator(&state);
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let (status, body) = get_json!(app, cookie, "/ui/soldiers");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[1]["status"], "injured");

        let (status, body) = get_json!(app, cookie, "/ui/soldiers/S1/raw-inputs");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["soldier_id"], "S1");
        assert_eq!(body["raw_inputs"][0]["raw_text"], "Taking fire from the treeline");

        backend.fail("raw_inputs", Some("database offline"));
        let (status, body) = get_json!(app, cookie, "/ui/soldiers/S1/raw-inputs");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["raw_inputs"], json!([]));

        let report = json!({"report_type": "SPOTREP", "structured_json": {"size": "squad"}, "confidence": 0.7});
        let (status, body) = post_json!(app, cookie, "/ui/soldiers/S1/reports", report.clone());
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["report_id"].as_str().unwrap().starts_with("mock-report-"));
        assert_eq!(backend.call_count("submit_report:S1"), 1);

        let (status, body) = post_json!(app, cookie, "/ui/soldiers/%20/reports", report);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "soldier id is required");

        backend.fail("soldiers", Some("database offline"));
        let (status, body) = get_json!(app, cookie, "/ui/soldiers");
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "database offline");
    }

    #[actix_web::test]
    async fn dashboard_page_renders_hierarchy_and_reports() {
        let state = app_state(Arc::new(backend())).await;
        let (cookie, dashboard) = operator(&state);
        dashboard
            .select(&NodeRef {
                kind: NodeKind::Unit,
                id: "C1".to_string(),
            })
            .await
            .unwrap();
        dashboard.show(ViewMode::builder_for(DocumentKind::Frago)).await;
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let response = test::call_service(
            &app,
            test::TestRequest::get().uri("/").cookie(cookie).to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let page = String::from_utf8_lossy(&test::read_body(response).await).to_string();
        assert!(page.contains("1st Battalion"));
        assert!(page.contains("Bravo Company"));
        assert!(page.contains("FRAGO"));
        assert!(page.contains("name=\"mission\""));
        assert!(page.contains("data-select-id=\"C1\""));
    }

    #[actix_web::test]
    async fn backend_ids_never_reach_inline_script() {
        let backend = MockBackend::new().with_hierarchy(
            serde_json::from_value(json!([
                {"unit_id": "X');alert(1);//", "name": "Odd Unit", "parent_unit_id": null, "level": "company"}
            ]))
            .unwrap(),
        );
        let state = app_state(Arc::new(backend)).await;
        let (cookie, _) = operator(&state);
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let response = test::call_service(
            &app,
            test::TestRequest::get().uri("/").cookie(cookie).to_request(),
        )
        .await;
        let page = String::from_utf8_lossy(&test::read_body(response).await).to_string();
        assert!(page.contains("Odd Unit"));
        assert!(page.contains("data-select-id=\"X&#x27;);alert(1);&#x2F;&#x2F;\""));
        assert!(!page.contains("onclick=\"select("));
        assert!(!page.contains("alert(1);//"));
    }
}
