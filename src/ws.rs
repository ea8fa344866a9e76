//! Echo websocket with a ping/pong heartbeat.

use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Peers silent for this long are dropped.
pub const PONG_WAIT: Duration = Duration::from_secs(30);
pub const PING_INTERVAL: Duration = Duration::from_secs(27);

pub async fn echo(req: HttpRequest, stream: web::Payload) -> Result<HttpResponse, Error> {
    let peer_addr = req
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    ws::start(EchoSession::new(peer_addr), &req, stream)
}

pub struct EchoSession {
    id: Uuid,
    peer_addr: String,
    last_seen: Instant,
}

impl EchoSession {
    pub fn new(peer_addr: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer_addr,
            last_seen: Instant::now(),
        }
    }

    fn reply(text: &str) -> String {
        format!("Echo: {}", text)
    }

    fn start_heartbeat(&self, ctx: &mut <Self as Actor>::Context) {
        ctx.run_interval(PING_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_seen) > PONG_WAIT {
                warn!(id = %act.id, peer = %act.peer_addr, "websocket heartbeat timed out");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for EchoSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(id = %self.id, peer = %self.peer_addr, "websocket connected");
        self.start_heartbeat(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!(id = %self.id, peer = %self.peer_addr, "websocket closed");
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for EchoSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.last_seen = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_seen = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.last_seen = Instant::now();
                debug!(id = %self.id, len = text.len(), "websocket text");
                ctx.text(Self::reply(&text));
            }
            Ok(ws::Message::Binary(bin)) => {
                self.last_seen = Instant::now();
                ctx.binary(bin);
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(e) => {
                warn!(id = %self.id, error = %e, "websocket protocol error");
                ctx.stop();
            }
        }
    }
}
