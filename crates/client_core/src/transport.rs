use std::sync::Arc;

use async_trait::async_trait;
use futures::{stream::SplitSink, SinkExt, StreamExt};
use thiserror::Error;
use tokio::{net::TcpStream, sync::Mutex, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use shared::{
    domain::SessionKey,
    protocol::{PlayerCommand, PushEvent},
};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("server url must start with http:// or https://: {0}")]
    InvalidUrl(String),
    #[error("failed to connect push channel: {0}")]
    Connect(String),
    #[error("failed to encode command: {0}")]
    Encode(String),
    #[error("failed to send command: {0}")]
    Send(String),
    #[error("push channel is closed")]
    Closed,
}

/// Receives everything the live connection produces, in arrival order.
#[async_trait]
pub trait PushHandler: Send + Sync {
    /// Called for every frame that decodes as a push event.
    async fn on_push(&self, event: PushEvent);
    /// Called once if the socket fails mid-read; the reader stops after.
    async fn on_transport_error(&self, message: String);
}

type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Handle over the live push connection for one session.
///
/// Frames are decoded on a reader task and handed to the registered
/// handler; undecodable frames are logged and dropped. Dropping the handle
/// stops the reader; [`Connection::close`] also sends a close frame first.
pub struct Connection {
    writer: Mutex<WsWriter>,
    reader_task: JoinHandle<()>,
}

impl Connection {
    /// Opens the push channel for `key` against an http(s) base URL.
    pub async fn open(
        server_url: &str,
        key: &SessionKey,
        handler: Arc<dyn PushHandler>,
    ) -> Result<Self, TransportError> {
        let ws_url = push_url(server_url, key)?;
        let (ws_stream, _) = connect_async(ws_url.as_str())
            .await
            .map_err(|err| TransportError::Connect(err.to_string()))?;
        let (writer, mut reader) = ws_stream.split();

        let reader_task = tokio::spawn(async move {
            while let Some(msg) = reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<PushEvent>(&text) {
                        Ok(event) => handler.on_push(event).await,
                        Err(err) => {
                            warn!(%err, raw = %text, "dropping undecodable push frame");
                        }
                    },
                    Ok(Message::Close(_)) => {
                        debug!("push channel closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        handler.on_transport_error(err.to_string()).await;
                        break;
                    }
                }
            }
        });

        Ok(Self {
            writer: Mutex::new(writer),
            reader_task,
        })
    }

    /// Serializes and transmits one player command.
    pub async fn send(&self, command: &PlayerCommand) -> Result<(), TransportError> {
        let text =
            serde_json::to_string(command).map_err(|err| TransportError::Encode(err.to_string()))?;
        let mut writer = self.writer.lock().await;
        writer
            .send(Message::Text(text))
            .await
            .map_err(|err| TransportError::Send(err.to_string()))
    }

    /// Sends a close frame and stops the reader.
    pub async fn close(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.send(Message::Close(None)).await;
        self.reader_task.abort();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

fn push_url(server_url: &str, key: &SessionKey) -> Result<String, TransportError> {
    let ws_base = if server_url.starts_with("https://") {
        server_url.replacen("https://", "wss://", 1)
    } else if server_url.starts_with("http://") {
        server_url.replacen("http://", "ws://", 1)
    } else {
        return Err(TransportError::InvalidUrl(server_url.to_string()));
    };
    let mut url = Url::parse(&format!("{}/ws", ws_base.trim_end_matches('/')))
        .map_err(|err| TransportError::InvalidUrl(err.to_string()))?;
    url.query_pairs_mut().append_pair("key", &key.0);
    Ok(url.into())
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
