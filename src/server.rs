//! WebSocket transport and health endpoint
//!
//! Clients connect to `/ws` and exchange one JSON message per WebSocket
//! message in both directions. Messages that do not decode to a known event
//! are logged and dropped; the connection stays open. Closing the socket is
//! the disconnect. `GET /health` answers with the session's health report.

use axum::{
    Json, Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::Response,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tokio::{net::TcpListener, sync::mpsc};

use crate::{
    SyncMessage, UpdateMessage,
    constants::server::MAX_MESSAGE_SIZE,
    game::{HealthReport, IncomingMessage},
    hub::HubHandle,
    session::Tunnel,
};

/// Tunnel that queues encoded messages for a connection's writer task
#[derive(Debug, Clone)]
pub struct ChannelTunnel(mpsc::UnboundedSender<String>);

impl ChannelTunnel {
    /// Creates a tunnel and the receiver its messages come out of
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self(sender), receiver)
    }
}

impl Tunnel for ChannelTunnel {
    fn send_message(&self, message: &UpdateMessage) {
        let _ = self.0.send(message.to_message());
    }

    fn send_state(&self, state: &SyncMessage) {
        let _ = self.0.send(state.to_message());
    }

    fn close(self) {}
}

type HubState = HubHandle<ChannelTunnel>;

/// Builds the HTTP routes of the server
pub fn router(hub: HubState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(hub)
}

/// Serves the session on `listener` until `shutdown` completes
///
/// Failing to accept a single connection is not fatal; the server keeps
/// listening.
///
/// # Errors
///
/// Returns an error if the listener itself fails.
pub async fn serve<S>(listener: TcpListener, hub: HubState, shutdown: S) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(hub))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health(State(hub): State<HubState>) -> Result<Json<HealthReport>, StatusCode> {
    hub.health().await.map(Json).map_err(|e| {
        log::error!("health query failed: {e}");
        StatusCode::SERVICE_UNAVAILABLE
    })
}

async fn ws_handler(State(hub): State<HubState>, ws: WebSocketUpgrade) -> Response {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .max_frame_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Decodes a client message, or `None` for frames that carry no event
fn decode(frame: &Message) -> Option<Result<IncomingMessage, serde_json::Error>> {
    match frame {
        Message::Text(text) => Some(IncomingMessage::from_json(text.as_str())),
        Message::Binary(bytes) => Some(serde_json::from_slice(bytes)),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) => None,
    }
}

async fn handle_socket(socket: WebSocket, hub: HubState) {
    let (tunnel, mut outgoing) = ChannelTunnel::new();

    let id = match hub.connect(tunnel).await {
        Ok(id) => id,
        Err(e) => {
            log::warn!("refusing websocket: {e}");
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(text) = outgoing.recv().await {
            if let Err(e) = sink.send(Message::Text(text.into())).await {
                log::debug!("websocket write failed: {e}");
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("websocket read for {id} failed: {e}");
                break;
            }
        };

        if matches!(frame, Message::Close(_)) {
            break;
        }

        match decode(&frame) {
            Some(Ok(message)) => {
                if let Err(e) = hub.send(id, message).await {
                    log::warn!("dropping connection {id}: {e}");
                    break;
                }
            }
            Some(Err(e)) => log::debug!("dropping malformed message from {id}: {e}"),
            None => {}
        }
    }

    if let Err(e) = hub.disconnect(id).await {
        log::warn!("failed to disconnect {id}: {e}");
    }
    writer.abort();
}
