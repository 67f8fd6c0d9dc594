//! WebSocket client for the `/ws` control and update channel.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::ClientError;
use crate::objects::{ControlCommand, ServerMessage};

/// A single session on the server's `/ws` endpoint.
///
/// Replies to [`send`](StreamClient::send) and pushed stream updates arrive
/// interleaved through [`next_message`](StreamClient::next_message).
pub struct StreamClient {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl StreamClient {
    /// Open a session. `url` is the full WebSocket URL, e.g.
    /// `ws://localhost:8000/ws`.
    pub async fn connect(url: &Url) -> Result<Self, ClientError> {
        let (socket, _response) = connect_async(url.as_str()).await?;
        Ok(Self { socket })
    }

    /// Send a control command.
    pub async fn send(&mut self, command: &ControlCommand) -> Result<(), ClientError> {
        let json = serde_json::to_string(command)?;
        self.socket.send(Message::Text(json)).await?;
        Ok(())
    }

    /// Wait for the next reply or update.
    ///
    /// Returns `Ok(None)` once the server closes the session.
    pub async fn next_message(&mut self) -> Result<Option<ServerMessage>, ClientError> {
        while let Some(frame) = self.socket.next().await {
            match frame? {
                Message::Text(text) => return Ok(Some(serde_json::from_str(&text)?)),
                Message::Binary(bytes) => return Ok(Some(serde_json::from_slice(&bytes)?)),
                Message::Close(_) => return Ok(None),
                _ => continue,
            }
        }
        Ok(None)
    }

    /// Close the session.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.socket.close(None).await?;
        Ok(())
    }
}
