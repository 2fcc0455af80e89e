//! Backend adapters: HTTP API, chat WebSocket, LMS file downloads.

pub mod file_fetcher;
pub mod http_client;
pub mod ws_transport;

pub use file_fetcher::HttpFileFetcher;
pub use http_client::HttpBackendClient;
pub use ws_transport::WsConnector;
