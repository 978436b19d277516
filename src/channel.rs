//! Streaming chat channel over WebSocket
//!
//! One socket per channel instance. Unexpected closes trigger bounded
//! reconnection (fixed delay, capped attempts); a manual disconnect
//! suppresses reconnection entirely.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::config::ChannelConfig;
use crate::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No socket; reconnection exhausted or never connected
    #[default]
    Disconnected,
    /// Connect or reconnect in progress
    Connecting,
    /// Socket open
    Connected,
}

/// Inbound events (closed set; unknown types are logged and ignored)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ChannelEvent {
    /// Server acknowledged the connection
    #[serde(rename = "connected")]
    Connected,
    /// Transcription of buffered audio; the server is now processing
    #[serde(rename = "asr_result")]
    AsrResult {
        /// Transcribed text
        text: String,
    },
    /// Assistant reply, ending the processing state
    #[serde(rename = "llm_response")]
    LlmResponse {
        /// Reply text
        text: String,
        /// Locator of a playable reply clip
        #[serde(default)]
        audio_url: Option<String>,
    },
    /// Server-side failure, ending the processing state
    #[serde(rename = "error")]
    Error {
        /// Failure description
        message: String,
    },
}

/// Outbound messages
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OutboundMessage {
    Audio { data: String },
    Text { text: String },
    Process,
}

/// Parse one inbound frame; unknown message types yield `None`
#[must_use]
pub fn parse_event(raw: &str) -> Option<ChannelEvent> {
    match serde_json::from_str(raw) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(error = %e, raw, "unknown channel message ignored");
            None
        }
    }
}

/// WebSocket chat channel client
pub struct ChatChannel {
    url: String,
    state: ConnectionState,
    socket: Option<WsStream>,
    max_reconnect_attempts: u32,
    reconnect_delay: Duration,
    manual_close: bool,
}

impl ChatChannel {
    /// Create a disconnected channel for the given URL
    #[must_use]
    pub fn new(url: impl Into<String>, policy: ChannelConfig) -> Self {
        Self {
            url: url.into(),
            state: ConnectionState::Disconnected,
            socket: None,
            max_reconnect_attempts: policy.max_reconnect_attempts,
            reconnect_delay: policy.reconnect_delay,
            manual_close: false,
        }
    }

    /// Current connection state
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Open the socket (single attempt; reconnection applies only to
    /// unexpected closes after a successful connect)
    ///
    /// # Errors
    ///
    /// Returns `Error::Channel` if the handshake fails; state is left
    /// `Disconnected`
    pub async fn connect(&mut self) -> Result<()> {
        self.manual_close = false;
        self.state = ConnectionState::Connecting;

        match connect_async(&self.url).await {
            Ok((socket, _)) => {
                self.socket = Some(socket);
                self.state = ConnectionState::Connected;
                tracing::info!(url = %self.url, "channel connected");
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                Err(Error::Channel(format!("connect failed: {e}")))
            }
        }
    }

    /// Close the socket and suppress automatic reconnection
    pub async fn disconnect(&mut self) {
        self.manual_close = true;
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None).await;
        }
        self.state = ConnectionState::Disconnected;
        tracing::debug!("channel disconnected");
    }

    /// Receive the next event, reconnecting across unexpected closes
    ///
    /// Returns `None` once the channel is terminally disconnected (manual
    /// close, or reconnect attempts exhausted).
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        loop {
            let socket = self.socket.as_mut()?;

            match socket.next().await {
                Some(Ok(Message::Text(raw))) => {
                    if let Some(event) = parse_event(&raw) {
                        return Some(event);
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    if !self.handle_close("closed by peer").await {
                        return None;
                    }
                }
                Some(Ok(_)) => {} // ping/pong/binary frames
                Some(Err(e)) => {
                    let reason = e.to_string();
                    if !self.handle_close(&reason).await {
                        return None;
                    }
                }
            }
        }
    }

    /// Send raw audio as a base64-encoded frame
    ///
    /// No-op returning `false` when not connected.
    pub async fn send_audio(&mut self, audio: &[u8]) -> bool {
        let message = OutboundMessage::Audio {
            data: BASE64.encode(audio),
        };
        self.send(&message).await
    }

    /// Send a text utterance
    ///
    /// No-op returning `false` when not connected.
    pub async fn send_text(&mut self, text: &str) -> bool {
        let message = OutboundMessage::Text {
            text: text.to_string(),
        };
        self.send(&message).await
    }

    /// Ask the server to process buffered audio
    ///
    /// No-op returning `false` when not connected.
    pub async fn request_process(&mut self) -> bool {
        self.send(&OutboundMessage::Process).await
    }

    async fn send(&mut self, message: &OutboundMessage) -> bool {
        if self.state != ConnectionState::Connected {
            tracing::warn!("channel not connected, message dropped");
            return false;
        }

        let Some(socket) = self.socket.as_mut() else {
            return false;
        };

        let Ok(json) = serde_json::to_string(message) else {
            return false;
        };

        match socket.send(Message::Text(json)).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "channel send failed");
                self.socket = None;
                self.state = ConnectionState::Disconnected;
                false
            }
        }
    }

    /// Handle an unexpected close; returns true if reconnected
    async fn handle_close(&mut self, reason: &str) -> bool {
        self.socket = None;
        self.state = ConnectionState::Disconnected;

        if self.manual_close {
            return false;
        }

        tracing::warn!(reason, "channel closed unexpectedly");

        for attempt in 1..=self.max_reconnect_attempts {
            self.state = ConnectionState::Connecting;
            tokio::time::sleep(self.reconnect_delay).await;

            tracing::info!(
                attempt,
                max = self.max_reconnect_attempts,
                "reconnecting"
            );

            match connect_async(&self.url).await {
                Ok((socket, _)) => {
                    self.socket = Some(socket);
                    self.state = ConnectionState::Connected;
                    tracing::info!("channel reconnected");
                    return true;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "reconnect attempt failed");
                }
            }
        }

        self.state = ConnectionState::Disconnected;
        tracing::error!(
            attempts = self.max_reconnect_attempts,
            "reconnect attempts exhausted, channel disconnected"
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_audio_shape() {
        let message = OutboundMessage::Audio {
            data: BASE64.encode(b"pcm"),
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&message).unwrap()).unwrap();
        assert_eq!(json["type"], "audio");
        assert_eq!(json["data"], BASE64.encode(b"pcm"));
    }

    #[test]
    fn outbound_text_and_process_shapes() {
        let text = serde_json::to_string(&OutboundMessage::Text {
            text: "hello".to_string(),
        })
        .unwrap();
        assert_eq!(text, r#"{"type":"text","text":"hello"}"#);

        let process = serde_json::to_string(&OutboundMessage::Process).unwrap();
        assert_eq!(process, r#"{"type":"process"}"#);
    }

    #[test]
    fn inbound_closed_set_parses() {
        assert_eq!(
            parse_event(r#"{"type":"connected"}"#),
            Some(ChannelEvent::Connected)
        );
        assert_eq!(
            parse_event(r#"{"type":"asr_result","text":"hello"}"#),
            Some(ChannelEvent::AsrResult {
                text: "hello".to_string()
            })
        );
        assert_eq!(
            parse_event(r#"{"type":"llm_response","text":"hi","audio_url":"/a.mp3"}"#),
            Some(ChannelEvent::LlmResponse {
                text: "hi".to_string(),
                audio_url: Some("/a.mp3".to_string())
            })
        );
        assert_eq!(
            parse_event(r#"{"type":"error","message":"boom"}"#),
            Some(ChannelEvent::Error {
                message: "boom".to_string()
            })
        );
    }

    #[test]
    fn unknown_inbound_type_ignored() {
        assert_eq!(parse_event(r#"{"type":"server_stats","load":1}"#), None);
        assert_eq!(parse_event("not json"), None);
    }

    #[test]
    fn llm_response_audio_url_optional() {
        assert_eq!(
            parse_event(r#"{"type":"llm_response","text":"hi"}"#),
            Some(ChannelEvent::LlmResponse {
                text: "hi".to_string(),
                audio_url: None
            })
        );
    }
}
