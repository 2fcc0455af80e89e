//! Downloads course files from the learning-management system. Implements FileFetcher.

use crate::domain::{DomainError, FileRef};
use crate::ports::FileFetcher;
use std::time::Duration;
use tracing::debug;

pub struct HttpFileFetcher {
    client: reqwest::Client,
    /// LMS access token, sent as a bearer token when present.
    token: Option<String>,
}

impl HttpFileFetcher {
    pub fn new(token: Option<String>, timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Network(format!("HTTP client init failed: {}", e)))?;
        Ok(Self { client, token })
    }
}

#[async_trait::async_trait]
impl FileFetcher for HttpFileFetcher {
    async fn fetch(&self, file: &FileRef) -> Result<Vec<u8>, DomainError> {
        if file.url.is_empty() {
            return Err(DomainError::Validation(format!("{} has no download url", file.name)));
        }
        let mut request = self.client.get(&file.url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| DomainError::Network(format!("download {} failed: {}", file.name, e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::Http {
                status: status.as_u16(),
                message: format!("download {} failed", file.name),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| DomainError::Network(format!("read {} failed: {}", file.name, e)))?;
        debug!(file = %file.name, len = bytes.len(), "file downloaded");
        Ok(bytes.to_vec())
    }
}
