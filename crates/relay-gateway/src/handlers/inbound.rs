//! Inbound path
//!
//! One reader loop per connection. Each text frame becomes a [`ChatMessage`]
//! tagged with the connection's identity and is published on the channel. The
//! loop is sequential, so one client's messages reach the channel in order.

use super::{HandlerError, HandlerResult};
use crate::broadcast::ChannelPublisher;
use crate::connection::Connection;
use crate::lifecycle::DisconnectCause;
use axum::extract::ws::Message;
use futures_util::{Stream, StreamExt};
use relay_core::ChatMessage;

/// Publishes what a client sends
#[derive(Debug, Clone)]
pub struct InboundPath {
    publisher: ChannelPublisher,
    max_frame_bytes: usize,
}

impl InboundPath {
    /// Create an inbound path
    pub fn new(publisher: ChannelPublisher, max_frame_bytes: usize) -> Self {
        Self {
            publisher,
            max_frame_bytes,
        }
    }

    /// Read frames until the client goes away
    pub async fn run<S>(&self, connection: &Connection, mut frames: S) -> DisconnectCause
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        while let Some(frame) = frames.next().await {
            let result = match frame {
                Ok(Message::Text(text)) => self.handle_text(connection, &text).await,
                Ok(Message::Binary(bytes)) => self.handle_binary(connection, bytes).await,
                Ok(Message::Ping(_) | Message::Pong(_)) => {
                    tracing::trace!(connection_id = %connection.id(), "Control frame received");
                    continue;
                }
                Ok(Message::Close(frame)) => {
                    tracing::debug!(
                        connection_id = %connection.id(),
                        code = ?frame.as_ref().map(|f| f.code),
                        "Client closed connection"
                    );
                    return DisconnectCause::ClientClosed;
                }
                Err(e) => {
                    tracing::warn!(
                        connection_id = %connection.id(),
                        error = %e,
                        "WebSocket receive error"
                    );
                    return DisconnectCause::ReceiveError(e.to_string());
                }
            };

            if let Err(e) = result {
                tracing::warn!(
                    connection_id = %connection.id(),
                    error = %e,
                    code = e.code(),
                    "Dropping client frame"
                );
            }
        }

        DisconnectCause::StreamEnded
    }

    /// Publish one text frame as the connection's identity
    pub async fn handle_text(&self, connection: &Connection, text: &str) -> HandlerResult<u32> {
        if text.len() > self.max_frame_bytes {
            return Err(HandlerError::FrameTooLarge {
                size: text.len(),
                max: self.max_frame_bytes,
            });
        }

        let message = ChatMessage::new(connection.identity(), text);
        let receivers = self.publisher.publish(&message).await?;

        tracing::trace!(
            connection_id = %connection.id(),
            len = text.len(),
            receivers = receivers,
            "Client message published"
        );

        Ok(receivers)
    }

    async fn handle_binary(&self, connection: &Connection, bytes: Vec<u8>) -> HandlerResult<u32> {
        if bytes.len() > self.max_frame_bytes {
            return Err(HandlerError::FrameTooLarge {
                size: bytes.len(),
                max: self.max_frame_bytes,
            });
        }

        let text = String::from_utf8(bytes).map_err(|_| HandlerError::InvalidUtf8)?;
        self.handle_text(connection, &text).await
    }
}
