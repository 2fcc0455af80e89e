//! Streaming chat session over a persistent connection.
//!
//! States: Disconnected -> Connecting -> Open -> (per query) Awaiting -> Open,
//! plus terminal Closed. One query may be in flight at a time; a second one is
//! rejected rather than queued. A reader task owns the read half and forwards
//! frames to the query registered under the current correlation id.
//!
//! Disconnects (explicit or by the transport) reject the pending query.

use crate::domain::{ChatQuery, ConnectionState, DomainError, StatusUpdate, StreamEvent};
use crate::ports::{FrameSink, FrameStream, TransportConnector};
use crate::shared::endpoints::chat_socket_url;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Receives one query's stream. Exactly one of `on_complete` / `on_error` is
/// called per sent query, and nothing after it.
pub trait StreamObserver: Send {
    fn on_chunk(&mut self, content: &str);

    /// Backend progress notice. Not part of the answer text.
    fn on_status(&mut self, status: &StatusUpdate) {
        let _ = status;
    }

    fn on_complete(&mut self);

    fn on_error(&mut self, error: &DomainError);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionTimeouts {
    /// Bound on the transport handshake. `None` waits for the transport.
    pub connect: Option<Duration>,
    /// Bound on the silence between two frames of one query.
    pub query: Option<Duration>,
}

enum Inbound {
    Frame(String),
    Invalid(String),
    Closed(&'static str),
}

/// State shared with the reader task.
struct Shared {
    state: watch::Sender<ConnectionState>,
    /// (correlation id, channel) of the query in flight.
    pending: Mutex<Option<(u64, mpsc::UnboundedSender<Inbound>)>>,
    /// Bumped on every connect/disconnect so a stale reader cannot touch state.
    epoch: AtomicU64,
    next_query_id: AtomicU64,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, Option<(u64, mpsc::UnboundedSender<Inbound>)>> {
        self.pending.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn dispatch(&self, inbound: Inbound) {
        match self.pending().as_ref() {
            Some((id, tx)) => {
                if tx.send(inbound).is_err() {
                    debug!(query_id = id, "query already settled; frame dropped");
                }
            }
            None => debug!("frame received with no query in flight; dropped"),
        }
    }

    fn reject_pending(&self, reason: &'static str) {
        if let Some((id, tx)) = self.pending().take() {
            debug!(query_id = id, reason, "rejecting pending query");
            let _ = tx.send(Inbound::Closed(reason));
        }
    }

    /// Silent transition to Disconnected, observable via the state channel only.
    fn transport_lost(&self, epoch: u64) {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        // Held across the state change so `begin_query` sees either the old
        // state with no loss yet or Disconnected.
        let pending = self.pending();
        let changed = self.state.send_if_modified(|s| {
            if matches!(s, ConnectionState::Open | ConnectionState::Awaiting) {
                *s = ConnectionState::Disconnected;
                true
            } else {
                false
            }
        });
        if changed {
            info!("chat connection closed by transport");
        }
        drop(pending);
        self.reject_pending("connection closed");
    }
}

pub struct ChatSession {
    connector: Arc<dyn TransportConnector>,
    backend_url: String,
    timeouts: SessionTimeouts,
    shared: Arc<Shared>,
    sink: tokio::sync::Mutex<Option<Box<dyn FrameSink>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    course_id: Mutex<Option<String>>,
}

impl ChatSession {
    pub fn new(
        connector: Arc<dyn TransportConnector>,
        backend_url: impl Into<String>,
        timeouts: SessionTimeouts,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            backend_url: backend_url.into(),
            timeouts,
            shared: Arc::new(Shared {
                state,
                pending: Mutex::new(None),
                epoch: AtomicU64::new(0),
                next_query_id: AtomicU64::new(1),
            }),
            sink: tokio::sync::Mutex::new(None),
            reader: Mutex::new(None),
            course_id: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// True only once a connection attempt completed and the transport is open.
    pub fn is_ready(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Open | ConnectionState::Awaiting
        )
    }

    /// State-change notifications, including silent transport closure.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn course_id(&self) -> Option<String> {
        self.course_id
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Opens the connection for one course. An open session is disconnected first.
    pub async fn connect(&self, course_id: &str) -> Result<(), DomainError> {
        match self.state() {
            ConnectionState::Closed => {
                return Err(DomainError::Connection("session is closed".into()));
            }
            ConnectionState::Disconnected => {}
            _ => self.disconnect().await,
        }

        let url = chat_socket_url(&self.backend_url, course_id)?;
        self.shared.state.send_replace(ConnectionState::Connecting);
        info!(course_id, url = %url, "connecting chat session");

        let attempt = self.connector.connect(&url);
        let result = match self.timeouts.connect {
            Some(limit) => match tokio::time::timeout(limit, attempt).await {
                Ok(r) => r,
                Err(_) => Err(DomainError::Timeout {
                    millis: timeout_millis(limit),
                }),
            },
            None => attempt.await,
        };

        let (mut sink, stream) = match result {
            Ok(halves) => halves,
            Err(e) => {
                self.shared.state.send_if_modified(|s| {
                    if *s == ConnectionState::Connecting {
                        *s = ConnectionState::Disconnected;
                        true
                    } else {
                        false
                    }
                });
                warn!(course_id, error = %e, "chat connect failed");
                return Err(e);
            }
        };

        if self.state() != ConnectionState::Connecting {
            // Shut down or disconnected while the handshake was running.
            sink.close().await;
            return Err(DomainError::Connection("connect aborted".into()));
        }

        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        *self.sink.lock().await = Some(sink);
        let handle = tokio::spawn(read_frames(Arc::clone(&self.shared), stream, epoch));
        if let Some(old) = self
            .reader
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .replace(handle)
        {
            old.abort();
        }
        *self.course_id.lock().unwrap_or_else(|p| p.into_inner()) = Some(course_id.to_string());
        self.shared.state.send_replace(ConnectionState::Open);
        info!(course_id, "chat session open");
        Ok(())
    }

    /// Sends one query and streams the answer into `observer`.
    ///
    /// Resolves with the accumulated answer text on `done`. Fails immediately,
    /// without touching the transport or the observer, when the session is
    /// not open or another query is in flight.
    pub async fn send_query(
        &self,
        query: &ChatQuery,
        observer: &mut dyn StreamObserver,
    ) -> Result<String, DomainError> {
        let (query_id, mut rx) = self.begin_query()?;
        let result = self.exchange(query, observer, &mut rx).await;
        self.finish_query(query_id);
        if matches!(result, Err(DomainError::Timeout { .. })) {
            // Late frames of the abandoned answer cannot be told apart from the next one.
            self.disconnect().await;
        }

        match &result {
            Ok(answer) => {
                debug!(query_id, len = answer.len(), "query complete");
                observer.on_complete();
            }
            Err(e) => {
                warn!(query_id, error = %e, "query failed");
                observer.on_error(e);
            }
        }
        result
    }

    fn begin_query(&self) -> Result<(u64, mpsc::UnboundedReceiver<Inbound>), DomainError> {
        let mut pending = self.shared.pending();
        match self.state() {
            ConnectionState::Open if pending.is_none() => {}
            ConnectionState::Awaiting | ConnectionState::Open => {
                return Err(DomainError::QueryInFlight);
            }
            _ => return Err(DomainError::Connection("not connected".into())),
        }
        // disconnect() changes the state without the pending lock.
        let claimed = self.shared.state.send_if_modified(|s| {
            if *s == ConnectionState::Open {
                *s = ConnectionState::Awaiting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(DomainError::Connection("not connected".into()));
        }
        let query_id = self.shared.next_query_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        *pending = Some((query_id, tx));
        Ok((query_id, rx))
    }

    fn finish_query(&self, query_id: u64) {
        let mut pending = self.shared.pending();
        if pending.as_ref().is_some_and(|(id, _)| *id == query_id) {
            pending.take();
        }
        drop(pending);
        self.shared.state.send_if_modified(|s| {
            if *s == ConnectionState::Awaiting {
                *s = ConnectionState::Open;
                true
            } else {
                false
            }
        });
    }

    async fn exchange(
        &self,
        query: &ChatQuery,
        observer: &mut dyn StreamObserver,
        rx: &mut mpsc::UnboundedReceiver<Inbound>,
    ) -> Result<String, DomainError> {
        let frame = serde_json::to_string(query)
            .map_err(|e| DomainError::Protocol(format!("cannot encode query: {}", e)))?;
        {
            let mut sink = self.sink.lock().await;
            let sink = sink
                .as_mut()
                .ok_or_else(|| DomainError::Connection("not connected".into()))?;
            sink.send_text(frame).await?;
        }

        let mut answer = String::new();
        loop {
            let next = match self.timeouts.query {
                Some(limit) => tokio::time::timeout(limit, rx.recv())
                    .await
                    .map_err(|_| DomainError::Timeout {
                        millis: timeout_millis(limit),
                    })?,
                None => rx.recv().await,
            };
            let text = match next {
                Some(Inbound::Frame(text)) => text,
                Some(Inbound::Invalid(msg)) => return Err(DomainError::Protocol(msg)),
                Some(Inbound::Closed(reason)) => {
                    return Err(DomainError::Connection(reason.to_string()));
                }
                None => return Err(DomainError::Connection("connection closed".into())),
            };
            match StreamEvent::parse(&text)? {
                StreamEvent::Chunk { content } => match StatusUpdate::parse(&content) {
                    Some(status) => observer.on_status(&status),
                    None => {
                        answer.push_str(&content);
                        observer.on_chunk(&content);
                    }
                },
                StreamEvent::Done => return Ok(answer),
                StreamEvent::Error { message } => return Err(DomainError::Remote(message)),
            }
        }
    }

    /// Closes the transport and goes to Disconnected. A pending query is rejected.
    pub async fn disconnect(&self) {
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self
            .reader
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            handle.abort();
        }
        if let Some(mut sink) = self.sink.lock().await.take() {
            sink.close().await;
        }
        self.shared.state.send_if_modified(|s| {
            if matches!(s, ConnectionState::Closed | ConnectionState::Disconnected) {
                false
            } else {
                *s = ConnectionState::Disconnected;
                true
            }
        });
        self.shared.reject_pending("disconnected");
        info!("chat session disconnected");
    }

    /// Disconnects and enters the terminal Closed state.
    pub async fn shutdown(&self) {
        self.disconnect().await;
        self.shared.state.send_replace(ConnectionState::Closed);
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(handle) = self
            .reader
            .get_mut()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}

fn timeout_millis(limit: Duration) -> u64 {
    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX)
}

async fn read_frames(shared: Arc<Shared>, mut stream: Box<dyn FrameStream>, epoch: u64) {
    loop {
        match stream.next_frame().await {
            Some(Ok(text)) => shared.dispatch(Inbound::Frame(text)),
            Some(Err(DomainError::Protocol(msg))) => shared.dispatch(Inbound::Invalid(msg)),
            Some(Err(e)) => {
                warn!(error = %e, "chat transport read failed");
                break;
            }
            None => break,
        }
    }
    shared.transport_lost(epoch);
}
