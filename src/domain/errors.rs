//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// Transport-level failure: connect failed, socket dropped, or a query was
    /// attempted while the session was not open.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Frame that does not match any known stream event shape.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Error frame reported by the backend during a query.
    #[error("Backend reported error: {0}")]
    Remote(String),

    /// Non-2xx HTTP response.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Timed out after {millis} ms")]
    Timeout { millis: u64 },

    /// A second query was sent while the first one is still streaming.
    #[error("A query is already in flight on this session")]
    QueryInFlight,

    #[error("UI error: {0}")]
    Ui(String),
}
