//! Chat transport port. A bidirectional text-frame connection.
//!
//! The connection is split so that one task can read while another writes.

use crate::domain::DomainError;

/// Write half.
#[async_trait::async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), DomainError>;

    /// Best effort; errors on an already-dead transport are ignored.
    async fn close(&mut self);
}

/// Read half.
#[async_trait::async_trait]
pub trait FrameStream: Send {
    /// Next text frame. `None` once the transport is closed.
    async fn next_frame(&mut self) -> Option<Result<String, DomainError>>;
}

/// Opens connections to a URL. Resolves once the transport is ready.
#[async_trait::async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), DomainError>;
}
