//! WebSocket event stream from the backend.
//!
//! [`ComfyClient`] holds the connection configuration; calling
//! [`ComfyClient::connect`] opens a [`ComfySocket`] scoped to one
//! client id, over which the backend pushes progress events for jobs
//! submitted with that id.

use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::api::BackendError;
use crate::messages::{parse_message, preview_payload, ComfyMessage};

/// Configuration handle for the backend's WebSocket endpoint.
pub struct ComfyClient {
    ws_url: String,
}

/// A decoded frame from the backend event stream.
#[derive(Debug)]
pub enum BackendFrame {
    /// A parsed text message.
    Message(ComfyMessage),
    /// The image bytes of a binary preview frame.
    Preview(Vec<u8>),
}

/// A live event stream scoped to one client id.
pub struct ComfySocket {
    client_id: String,
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl ComfyClient {
    /// Create a client targeting `ws_url` (e.g. `ws://127.0.0.1:8188`).
    pub fn new(ws_url: String) -> Self {
        Self { ws_url }
    }

    /// WebSocket base URL.
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Open the backend event stream for one client id.
    ///
    /// The id is passed as the `clientId` query parameter so the
    /// backend addresses progress for this client's jobs to this
    /// socket.
    pub async fn connect(&self, client_id: &str) -> Result<ComfySocket, BackendError> {
        let url = format!("{}/ws?clientId={}", self.ws_url, client_id);

        let (stream, _response) = connect_async(&url).await.map_err(|e| {
            BackendError::Unavailable(format!("connect to {}: {e}", self.ws_url))
        })?;

        tracing::info!(client_id, url = %self.ws_url, "Backend event stream opened");

        Ok(ComfySocket {
            client_id: client_id.to_string(),
            stream,
        })
    }
}

impl ComfySocket {
    /// Client id this stream is scoped to.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Receive the next decoded frame.
    ///
    /// Returns `Ok(None)` when the backend closes the stream cleanly.
    /// Unknown message types and non-preview binary frames are logged
    /// and skipped rather than surfaced.
    pub async fn recv(&mut self) -> Result<Option<BackendFrame>, BackendError> {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(Message::Text(text)) => match parse_message(&text) {
                    Ok(msg) => return Ok(Some(BackendFrame::Message(msg))),
                    Err(e) => {
                        tracing::warn!(
                            client_id = %self.client_id,
                            error = %e,
                            raw_message = %text,
                            "Skipping unparsable backend message",
                        );
                    }
                },
                Ok(Message::Binary(bytes)) => {
                    if let Some(payload) = preview_payload(&bytes) {
                        return Ok(Some(BackendFrame::Preview(payload.to_vec())));
                    }
                    tracing::trace!(client_id = %self.client_id, "Skipping non-preview binary frame");
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {
                    // Keepalive; handled by tungstenite.
                }
                Ok(Message::Close(frame)) => {
                    tracing::info!(client_id = %self.client_id, ?frame, "Backend closed event stream");
                    return Ok(None);
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    return Err(BackendError::Unavailable(format!(
                        "event stream receive: {e}"
                    )));
                }
            }
        }
        Ok(None)
    }
}
