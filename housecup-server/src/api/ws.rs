use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use housecup_core::processors::SubscriberHub;
use housecup_sdk::objects::ControlReply;

use crate::state::AppState;

/// `GET /ws` – control channel and live update stream.
///
/// Upgrades the connection and registers it with the hub. Client text frames
/// carry control commands, each answered with one reply frame; stream
/// updates are pushed as they are recorded.
pub(super) async fn stream_ws(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_stream_ws(socket, state.hub))
}

/// Drives a single WebSocket session until either side goes away.
async fn handle_stream_ws(mut socket: WebSocket, hub: SubscriberHub) {
    let mut session = hub.register().await;
    let session_id = session.id();
    tracing::info!(session = %session_id, "WS: session opened");

    loop {
        tokio::select! {
            update = session.recv() => {
                match update {
                    Some(update) => {
                        if send_json(&mut socket, &*update).await.is_err() {
                            break;
                        }
                    }
                    // The hub dropped this session, e.g. on shutdown.
                    None => {
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            msg = socket.recv() => {
                let reply = match msg {
                    Some(Ok(Message::Text(text))) => {
                        hub.handle_message(session_id, text.as_str()).await
                    }
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => hub.handle_message(session_id, text).await,
                        Err(_) => ControlReply::error("control frames must be UTF-8 JSON"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::debug!(session = %session_id, error = %e, "WS: receive failed");
                        break;
                    }
                };
                if send_json(&mut socket, &reply).await.is_err() {
                    break;
                }
            }
        }
    }

    hub.unregister(session_id).await;
    tracing::info!(session = %session_id, "WS: session closed");
}

/// Serialize `value` as JSON and send it as a text WebSocket frame.
///
/// Returns `Err(())` if the send fails (client disconnected).
async fn send_json<T: serde::Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), ()> {
    let json = serde_json::to_string(value).map_err(|_| ())?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}
