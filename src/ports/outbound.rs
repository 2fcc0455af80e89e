//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{
    Attachment, ChatSessionDetail, ChatSessionSummary, CollectionStatus, DomainError, FileRef,
    StoredCourseRecord, UploadReceipt,
};

/// Local object store for course materials, keyed by course id.
#[async_trait::async_trait]
pub trait MaterialStore: Send + Sync {
    /// Open (or create and migrate) the store. Idempotent; other operations
    /// call it lazily.
    async fn open(&self) -> Result<(), DomainError>;

    /// Overwrite the record for `record.course_id`.
    async fn save(&self, record: &StoredCourseRecord) -> Result<(), DomainError>;

    /// `Ok(None)` when the course was never saved.
    async fn load(&self, course_id: &str) -> Result<Option<StoredCourseRecord>, DomainError>;

    async fn delete(&self, course_id: &str) -> Result<(), DomainError>;

    async fn list_keys(&self) -> Result<Vec<String>, DomainError>;
}

/// RAG backend HTTP API. One round trip per call, no retries.
#[async_trait::async_trait]
pub trait BackendPort: Send + Sync {
    /// Multipart upload, one `files` part per attachment.
    async fn upload_materials(
        &self,
        course_id: &str,
        attachments: Vec<Attachment>,
    ) -> Result<UploadReceipt, DomainError>;

    async fn collection_status(&self, course_id: &str) -> Result<CollectionStatus, DomainError>;

    /// Advisory: every failure collapses to `false`.
    async fn health_check(&self) -> bool;

    async fn list_chats(
        &self,
        course_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatSessionSummary>, DomainError>;

    async fn get_chat(
        &self,
        course_id: &str,
        session_id: &str,
    ) -> Result<ChatSessionDetail, DomainError>;

    async fn delete_chat(&self, course_id: &str, session_id: &str) -> Result<(), DomainError>;

    async fn rename_chat(
        &self,
        course_id: &str,
        session_id: &str,
        title: &str,
    ) -> Result<(), DomainError>;
}

/// Downloads file bytes from the learning-management system.
#[async_trait::async_trait]
pub trait FileFetcher: Send + Sync {
    async fn fetch(&self, file: &FileRef) -> Result<Vec<u8>, DomainError>;
}

/// Key-value settings storage. Values are read and written individually.
#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_string(&self, key: &str) -> Result<Option<String>, DomainError>;
    async fn set_string(&self, key: &str, value: &str) -> Result<(), DomainError>;
    async fn get_bool(&self, key: &str) -> Result<Option<bool>, DomainError>;
    async fn set_bool(&self, key: &str, value: bool) -> Result<(), DomainError>;
    async fn delete(&self, key: &str) -> Result<(), DomainError>;
}
