//! reqwest adapter for the RAG backend HTTP API. Implements BackendPort.
//!
//! One request/response round trip per call. No retries.

use crate::domain::{
    Attachment, ChatSessionDetail, ChatSessionSummary, CollectionStatus, DomainError,
    UploadReceipt,
};
use crate::ports::BackendPort;
use crate::shared::endpoints::{endpoint, parse_backend_url};
use reqwest::{Response, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest error body echoed into `DomainError::Http`.
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Deserialize)]
struct HealthBody {
    status: String,
}

/// The chat list endpoint answers either `{"chats": [...]}` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ChatListBody {
    Wrapped { chats: Vec<ChatSessionSummary> },
    Bare(Vec<ChatSessionSummary>),
}

pub struct HttpBackendClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpBackendClient {
    /// # Arguments
    /// * `backend_url` - Base URL, e.g. "http://localhost:8000"
    /// * `timeout` - Whole-request timeout applied to every call
    pub fn new(backend_url: &str, timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Network(format!("HTTP client init failed: {}", e)))?;
        Ok(Self {
            client,
            base_url: parse_backend_url(backend_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Url {
        endpoint(&self.base_url, segments)
    }

    /// Non-2xx -> `DomainError::Http` carrying a truncated body.
    async fn ensure_success(response: Response) -> Result<Response, DomainError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        warn!(status = %status, body = %text, "backend returned error");
        let message = if text.is_empty() {
            status.canonical_reason().unwrap_or("Unknown").to_string()
        } else {
            text.chars().take(ERROR_BODY_LIMIT).collect()
        };
        Err(DomainError::Http {
            status: status.as_u16(),
            message,
        })
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, DomainError> {
        response
            .json()
            .await
            .map_err(|e| DomainError::Protocol(format!("Failed to parse backend response: {}", e)))
    }
}

fn network_err(e: reqwest::Error) -> DomainError {
    DomainError::Network(format!("HTTP request failed: {}", e))
}

#[async_trait::async_trait]
impl BackendPort for HttpBackendClient {
    async fn upload_materials(
        &self,
        course_id: &str,
        attachments: Vec<Attachment>,
    ) -> Result<UploadReceipt, DomainError> {
        let count = attachments.len();
        let total_bytes: usize = attachments.iter().map(|a| a.bytes.len()).sum();
        let mut form = reqwest::multipart::Form::new();
        for attachment in attachments {
            let part = reqwest::multipart::Part::bytes(attachment.bytes)
                .file_name(attachment.file_name)
                .mime_str(&attachment.mime_type)
                .map_err(|e| DomainError::Validation(format!("bad MIME type: {}", e)))?;
            form = form.part("files", part);
        }

        info!(course_id, count, total_bytes, "uploading course materials");
        let response = self
            .client
            .post(self.url(&["upload_pdfs"]))
            .query(&[("course_id", course_id)])
            .multipart(form)
            .send()
            .await
            .map_err(network_err)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "upload rejected");
            return Err(DomainError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }
        let receipt: UploadReceipt = Self::parse(response).await?;
        info!(course_id, count, "upload accepted");
        Ok(receipt)
    }

    async fn collection_status(&self, course_id: &str) -> Result<CollectionStatus, DomainError> {
        let response = self
            .client
            .get(self.url(&["collections", course_id, "status"]))
            .send()
            .await
            .map_err(network_err)?;
        Self::parse(Self::ensure_success(response).await?).await
    }

    async fn health_check(&self) -> bool {
        let response = match self.client.get(self.base_url.clone()).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "health check: backend unreachable");
                return false;
            }
        };
        if !response.status().is_success() {
            debug!(status = %response.status(), "health check: non-ok status");
            return false;
        }
        match response.json::<HealthBody>().await {
            Ok(body) => body.status == "ok",
            Err(e) => {
                debug!(error = %e, "health check: unexpected body");
                false
            }
        }
    }

    async fn list_chats(
        &self,
        course_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatSessionSummary>, DomainError> {
        let response = self
            .client
            .get(self.url(&["chats", course_id]))
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(network_err)?;
        let body: ChatListBody = Self::parse(Self::ensure_success(response).await?).await?;
        Ok(match body {
            ChatListBody::Wrapped { chats } => chats,
            ChatListBody::Bare(chats) => chats,
        })
    }

    async fn get_chat(
        &self,
        course_id: &str,
        session_id: &str,
    ) -> Result<ChatSessionDetail, DomainError> {
        let response = self
            .client
            .get(self.url(&["chats", course_id, session_id]))
            .send()
            .await
            .map_err(network_err)?;
        Self::parse(Self::ensure_success(response).await?).await
    }

    async fn delete_chat(&self, course_id: &str, session_id: &str) -> Result<(), DomainError> {
        let response = self
            .client
            .delete(self.url(&["chats", course_id, session_id]))
            .send()
            .await
            .map_err(network_err)?;
        Self::ensure_success(response).await?;
        info!(course_id, session_id, "chat deleted");
        Ok(())
    }

    async fn rename_chat(
        &self,
        course_id: &str,
        session_id: &str,
        title: &str,
    ) -> Result<(), DomainError> {
        let response = self
            .client
            .patch(self.url(&["chats", course_id, session_id, "title"]))
            .json(&serde_json::json!({ "title": title }))
            .send()
            .await
            .map_err(network_err)?;
        Self::ensure_success(response).await?;
        Ok(())
    }
}
