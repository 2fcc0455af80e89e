//! Port traits. API boundaries for the hexagon.
//!
//! - Inbound: Called by UI/adapter into the application
//! - Outbound: Called by application into infrastructure
//! - Transport: Streaming chat connection

pub mod inbound;
pub mod outbound;
pub mod transport;

pub use inbound::InputPort;
pub use outbound::{BackendPort, FileFetcher, MaterialStore, SettingsStore};
pub use transport::{FrameSink, FrameStream, TransportConnector};
