//! Application configuration. Backend address, paths, timeouts.

use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CHAT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Base URL of the RAG backend. Read from COURSE_COMPANION_BACKEND_URL.
    #[serde(default)]
    pub backend_url: Option<String>,

    /// Directory holding the material database and settings file.
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Per-request timeout for HTTP calls and file downloads.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Chat WebSocket handshake timeout.
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,

    /// Maximum silence between two frames of a chat query. 0 disables the limit.
    #[serde(default)]
    pub query_timeout_secs: Option<u64>,

    /// Number of saved chats fetched per listing.
    #[serde(default)]
    pub chat_history_limit: Option<usize>,

    /// Bearer token for LMS file downloads. Read from COURSE_COMPANION_LMS_TOKEN.
    #[serde(default)]
    pub lms_token: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("COURSE_COMPANION"));
        if let Ok(path) = std::env::var("COURSE_COMPANION_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        c.build()?.try_deserialize()
    }

    pub fn backend_url_or_default(&self) -> String {
        self.backend_url
            .as_deref()
            .map(|u| u.trim().trim_end_matches('/'))
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_BACKEND_URL)
            .to_string()
    }

    pub fn data_dir_or_default(&self) -> String {
        self.data_dir
            .clone()
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    /// `None` when the query timeout is disabled.
    pub fn query_timeout(&self) -> Option<Duration> {
        match self.query_timeout_secs.unwrap_or(DEFAULT_QUERY_TIMEOUT_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn chat_history_limit_or_default(&self) -> usize {
        self.chat_history_limit
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_CHAT_HISTORY_LIMIT)
    }

    /// Returns the LMS token, ignoring blank values.
    pub fn lms_token(&self) -> Option<String> {
        self.lms_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }
}
