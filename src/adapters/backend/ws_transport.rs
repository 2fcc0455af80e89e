//! tokio-tungstenite adapter. Implements TransportConnector for the chat socket.

use crate::domain::DomainError;
use crate::ports::{FrameSink, FrameStream, TransportConnector};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket connections. Resolves after the HTTP upgrade completes.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait::async_trait]
impl TransportConnector for WsConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), DomainError> {
        let (socket, response) = connect_async(url)
            .await
            .map_err(|e| DomainError::Connection(format!("websocket connect to {} failed: {}", url, e)))?;
        debug!(url, status = %response.status(), "websocket handshake complete");
        let (sink, stream) = socket.split();
        Ok((Box::new(WsSink { inner: sink }), Box::new(WsFrames { inner: stream })))
    }
}

struct WsSink {
    inner: SplitSink<Socket, Message>,
}

#[async_trait::async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), DomainError> {
        self.inner
            .send(Message::Text(text))
            .await
            .map_err(|e| DomainError::Connection(format!("websocket send failed: {}", e)))
    }

    async fn close(&mut self) {
        if let Err(e) = self.inner.close().await {
            debug!(error = %e, "websocket close ignored");
        }
    }
}

struct WsFrames {
    inner: SplitStream<Socket>,
}

#[async_trait::async_trait]
impl FrameStream for WsFrames {
    async fn next_frame(&mut self) -> Option<Result<String, DomainError>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => {
                    return Some(String::from_utf8(bytes).map_err(|e| {
                        DomainError::Protocol(format!("binary frame is not UTF-8: {}", e))
                    }));
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "websocket closed by peer");
                    return None;
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(e) => {
                    return Some(Err(DomainError::Connection(format!(
                        "websocket read failed: {}",
                        e
                    ))));
                }
            }
        }
    }
}
