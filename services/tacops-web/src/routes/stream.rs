use actix::{Actor, ActorContext, AsyncContext, StreamHandler};
use actix_web::web::Bytes;
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use futures_util::stream::unfold;
use serde::Serialize;
use std::time::{Duration, Instant};
use tacops_dashboard::SuggestionFeed;
use tokio::sync::watch;

use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(15);
const FEED_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Pushes the suggestion feed once on connect and again on every change.
#[get("/ui/stream/sse")]
pub async fn sse(state: web::Data<AppState>) -> HttpResponse {
    let feed = state.poller.subscribe();
    let stream = unfold((feed, true), |(mut feed, first)| async move {
        if !first && feed.changed().await.is_err() {
            return None;
        }
        let snapshot = feed.borrow_and_update().clone();
        let payload = build_sse_event("suggestions", &snapshot);
        Some((Ok::<Bytes, actix_web::Error>(Bytes::from(payload)), (feed, false)))
    });

    HttpResponse::Ok()
        .insert_header(("Content-Type", "text/event-stream"))
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("Connection", "keep-alive"))
        .streaming(stream)
}

#[get("/ui/stream/ws")]
pub async fn ws_route(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = SuggestionWsSession::new(state.poller.subscribe());
    ws::start(session, &req, stream)
}

fn build_sse_event<T: Serialize>(event: &str, payload: &T) -> String {
    let data = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
    format!("event: {event}\ndata: {data}\n\n")
}

#[derive(Debug, Serialize)]
struct WsEnvelope<'a, T: Serialize> {
    kind: &'a str,
    payload: T,
}

struct SuggestionWsSession {
    feed: watch::Receiver<SuggestionFeed>,
    last_heartbeat: Instant,
}

impl SuggestionWsSession {
    fn new(feed: watch::Receiver<SuggestionFeed>) -> Self {
        Self {
            feed,
            last_heartbeat: Instant::now(),
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |actor, ctx| {
            if Instant::now().duration_since(actor.last_heartbeat) > CLIENT_TIMEOUT {
                ctx.stop();
                return;
            }
            ctx.ping(b"ping");
        });
    }

    fn push_feed(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let snapshot = self.feed.borrow_and_update().clone();
        let envelope = WsEnvelope {
            kind: "suggestions",
            payload: snapshot,
        };
        if let Ok(text) = serde_json::to_string(&envelope) {
            ctx.text(text);
        }
    }

    fn start_updates(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        self.push_feed(ctx);
        ctx.run_interval(FEED_CHECK_INTERVAL, |actor, ctx| match actor.feed.has_changed() {
            Ok(true) => actor.push_feed(ctx),
            Ok(false) => {}
            Err(_) => ctx.stop(),
        });
    }
}

impl Actor for SuggestionWsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.start_heartbeat(ctx);
        self.start_updates(ctx);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for SuggestionWsSession {
    fn handle(&mut self, item: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match item {
            Ok(ws::Message::Ping(message)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&message);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                if text.trim().eq_ignore_ascii_case("ping") {
                    ctx.text("pong");
                }
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            _ => {}
        }
    }
}
