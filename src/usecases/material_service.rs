//! Material pipeline: classify -> download -> upload -> persist locally.
//!
//! Coordinates the classifier (domain), FileFetcher, BackendPort and MaterialStore.

use crate::domain::classifier::{self, ClassifyPreferences};
use crate::domain::documents;
use crate::domain::{
    Attachment, CourseMaterialBundle, DomainError, RawMaterials, StoredCourseRecord, UploadReceipt,
};
use crate::ports::{BackendPort, FileFetcher, MaterialStore};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Progress of `sync_course`, reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncProgress {
    Classified { files: usize },
    Downloaded { name: String, done: usize, total: usize },
    Uploading { files: usize },
    Saved,
}

#[derive(Debug)]
pub struct SyncOutcome {
    pub record: StoredCourseRecord,
    /// `None` when there was nothing to upload.
    pub receipt: Option<UploadReceipt>,
    /// Files whose download failed, with the reason.
    pub skipped: Vec<(String, String)>,
}

pub struct MaterialService {
    backend: Arc<dyn BackendPort>,
    store: Arc<dyn MaterialStore>,
    fetcher: Arc<dyn FileFetcher>,
}

impl MaterialService {
    pub fn new(
        backend: Arc<dyn BackendPort>,
        store: Arc<dyn MaterialStore>,
        fetcher: Arc<dyn FileFetcher>,
    ) -> Self {
        Self {
            backend,
            store,
            fetcher,
        }
    }

    /// Classify raw materials and log the resulting counts.
    pub fn prepare(&self, raw: &RawMaterials, prefs: &ClassifyPreferences) -> CourseMaterialBundle {
        let bundle = classifier::classify(raw, prefs);
        let summary = classifier::summarize(&bundle);
        info!(
            modules = summary.modules,
            module_files = summary.module_files,
            files = summary.files,
            pages = summary.pages,
            assignments = summary.assignments,
            size = %classifier::format_size(classifier::total_size(&bundle)),
            "classified course materials"
        );
        bundle
    }

    /// Full pipeline for one course. Nothing is persisted when the upload fails.
    pub async fn sync_course(
        &self,
        course_id: &str,
        course_name: &Value,
        raw: &RawMaterials,
        prefs: &ClassifyPreferences,
        progress: &mut (dyn FnMut(SyncProgress) + Send),
    ) -> Result<SyncOutcome, DomainError> {
        let bundle = self.prepare(raw, prefs);
        let record = StoredCourseRecord::new(course_id, course_name, bundle)?;
        let files = documents::uploadable_files(&record.materials);
        progress(SyncProgress::Classified { files: files.len() });

        let mut attachments = Vec::with_capacity(files.len());
        let mut skipped = Vec::new();
        for (i, file) in files.iter().enumerate() {
            match self.fetcher.fetch(file).await {
                Ok(bytes) => attachments.push(Attachment {
                    file_name: documents::upload_name(file),
                    mime_type: file.mime_type.clone(),
                    bytes,
                }),
                Err(e) => {
                    warn!(course_id, file = %file.name, error = %e, "download failed; skipping file");
                    skipped.push((file.name.clone(), e.to_string()));
                }
            }
            progress(SyncProgress::Downloaded {
                name: file.name.clone(),
                done: i + 1,
                total: files.len(),
            });
        }

        let receipt = if attachments.is_empty() {
            info!(course_id, "no files to upload");
            None
        } else {
            progress(SyncProgress::Uploading {
                files: attachments.len(),
            });
            Some(
                self.backend
                    .upload_materials(&record.course_id, attachments)
                    .await?,
            )
        };

        self.store.save(&record).await?;
        progress(SyncProgress::Saved);
        info!(
            course_id = %record.course_id,
            course_name = %record.course_name,
            skipped = skipped.len(),
            "course synced"
        );
        Ok(SyncOutcome {
            record,
            receipt,
            skipped,
        })
    }

    pub async fn load_course(
        &self,
        course_id: &str,
    ) -> Result<Option<StoredCourseRecord>, DomainError> {
        self.store.load(course_id).await
    }

    pub async fn forget_course(&self, course_id: &str) -> Result<(), DomainError> {
        self.store.delete(course_id).await
    }

    /// All stored records, ordered by course id.
    pub async fn stored_courses(&self) -> Result<Vec<StoredCourseRecord>, DomainError> {
        let mut records = Vec::new();
        for key in self.store.list_keys().await? {
            if let Some(record) = self.store.load(&key).await? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatSessionDetail, ChatSessionSummary, CollectionStatus, FileRef};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<HashMap<String, StoredCourseRecord>>,
    }

    #[async_trait::async_trait]
    impl MaterialStore for MemoryStore {
        async fn open(&self) -> Result<(), DomainError> {
            Ok(())
        }
        async fn save(&self, record: &StoredCourseRecord) -> Result<(), DomainError> {
            self.records
                .lock()
                .unwrap()
                .insert(record.course_id.clone(), record.clone());
            Ok(())
        }
        async fn load(&self, course_id: &str) -> Result<Option<StoredCourseRecord>, DomainError> {
            Ok(self.records.lock().unwrap().get(course_id).cloned())
        }
        async fn delete(&self, course_id: &str) -> Result<(), DomainError> {
            self.records.lock().unwrap().remove(course_id);
            Ok(())
        }
        async fn list_keys(&self) -> Result<Vec<String>, DomainError> {
            let mut keys: Vec<_> = self.records.lock().unwrap().keys().cloned().collect();
            keys.sort();
            Ok(keys)
        }
    }

    /// Records uploads; fails every upload when `reject` is set.
    #[derive(Default)]
    struct RecordingBackend {
        uploads: Mutex<Vec<(String, Vec<String>)>>,
        reject: bool,
    }

    #[async_trait::async_trait]
    impl BackendPort for RecordingBackend {
        async fn upload_materials(
            &self,
            course_id: &str,
            attachments: Vec<Attachment>,
        ) -> Result<UploadReceipt, DomainError> {
            if self.reject {
                return Err(DomainError::Http {
                    status: 500,
                    message: "Internal Server Error".into(),
                });
            }
            self.uploads.lock().unwrap().push((
                course_id.to_string(),
                attachments.into_iter().map(|a| a.file_name).collect(),
            ));
            Ok(UploadReceipt::default())
        }
        async fn collection_status(&self, _: &str) -> Result<CollectionStatus, DomainError> {
            Ok(CollectionStatus::default())
        }
        async fn health_check(&self) -> bool {
            true
        }
        async fn list_chats(&self, _: &str, _: usize) -> Result<Vec<ChatSessionSummary>, DomainError> {
            Ok(Vec::new())
        }
        async fn get_chat(&self, _: &str, s: &str) -> Result<ChatSessionDetail, DomainError> {
            Err(DomainError::Http {
                status: 404,
                message: s.to_string(),
            })
        }
        async fn delete_chat(&self, _: &str, _: &str) -> Result<(), DomainError> {
            Ok(())
        }
        async fn rename_chat(&self, _: &str, _: &str, _: &str) -> Result<(), DomainError> {
            Ok(())
        }
    }

    /// Serves file bytes, failing for names containing "broken".
    struct StubFetcher;

    #[async_trait::async_trait]
    impl FileFetcher for StubFetcher {
        async fn fetch(&self, file: &FileRef) -> Result<Vec<u8>, DomainError> {
            if file.name.contains("broken") {
                Err(DomainError::Network("connection reset".into()))
            } else {
                Ok(file.name.as_bytes().to_vec())
            }
        }
    }

    fn raw() -> RawMaterials {
        serde_json::from_value(json!({
            "modules": [{"id": 1, "name": "Unit 1", "position": 1, "items": [
                {"id": 1, "title": "Week 1 notes.pdf", "type": "File", "content_id": 11},
                {"id": 2, "title": "gradebook_export.xlsx", "type": "File", "content_id": 12},
                {"id": 3, "title": "syllabus.pdf", "type": "File", "content_id": 5}
            ]}],
            "files": [
                {"id": 5, "display_name": "syllabus.pdf", "url": "https://lms/5", "size": 10},
                {"id": 6, "display_name": "broken.pdf", "url": "https://lms/6", "size": 10}
            ],
            "pages": [{"page_id": 9, "url": "grades", "title": "Grades Overview"}]
        }))
        .unwrap()
    }

    fn service(backend: Arc<RecordingBackend>, store: Arc<MemoryStore>) -> MaterialService {
        MaterialService::new(backend, store, Arc::new(StubFetcher))
    }

    #[tokio::test]
    async fn test_sync_uploads_then_persists() {
        let backend = Arc::new(RecordingBackend::default());
        let store = Arc::new(MemoryStore::default());
        let svc = service(Arc::clone(&backend), Arc::clone(&store));
        let mut events = Vec::new();

        let outcome = svc
            .sync_course(
                "42",
                &json!({"name": "Biology"}),
                &raw(),
                &ClassifyPreferences::default(),
                &mut |p: SyncProgress| events.push(p),
            )
            .await
            .unwrap();

        let uploads = backend.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "42");
        assert_eq!(uploads[0].1, ["syllabus.pdf", "Week_1_notes.pdf"]);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].0, "broken.pdf");

        let stored = store.records.lock().unwrap().get("42").cloned().unwrap();
        assert_eq!(stored.course_name, "Biology");
        assert_eq!(stored, outcome.record);
        assert!(stored.materials.pages.is_empty());
        assert_eq!(events.first(), Some(&SyncProgress::Classified { files: 3 }));
        assert_eq!(events.last(), Some(&SyncProgress::Saved));
    }

    #[tokio::test]
    async fn test_selected_documents_match_uploaded_names() {
        let backend = Arc::new(RecordingBackend::default());
        let store = Arc::new(MemoryStore::default());
        let svc = service(Arc::clone(&backend), Arc::clone(&store));
        let raw: RawMaterials = serde_json::from_value(json!({
            "modules": [{"id": 1, "name": "Unit 1", "position": 1, "items": [
                {"id": 1, "title": "Week 1 notes.pdf", "type": "File", "content_id": 11},
                {"id": 2, "title": "Course Syllabus (Fall).pdf", "type": "File", "content_id": 5}
            ]}],
            "files": [
                {"id": 5, "display_name": "Course Syllabus (Fall).pdf", "url": "https://lms/5", "size": 10}
            ]
        }))
        .unwrap();

        let outcome = svc
            .sync_course("42", &json!("Bio"), &raw, &ClassifyPreferences::default(), &mut |_: SyncProgress| {})
            .await
            .unwrap();

        let uploaded: Vec<String> = backend.uploads.lock().unwrap()[0]
            .1
            .iter()
            .map(|name| documents::document_id("42", name))
            .collect();
        let selected = documents::document_ids(&outcome.record.materials, "42");
        assert_eq!(selected, uploaded);
        assert_eq!(selected, ["42_Course_Syllabus__Fall_.pdf", "42_Week_1_notes.pdf"]);
        let syllabus = documents::syllabus_document(&outcome.record.materials, "42").unwrap();
        assert!(uploaded.contains(&syllabus));
    }

    #[tokio::test]
    async fn test_failed_upload_persists_nothing() {
        let backend = Arc::new(RecordingBackend {
            reject: true,
            ..Default::default()
        });
        let store = Arc::new(MemoryStore::default());
        let svc = service(backend, Arc::clone(&store));

        let result = svc
            .sync_course("42", &json!("Bio"), &raw(), &ClassifyPreferences::default(), &mut |_: SyncProgress| {})
            .await;
        assert!(matches!(result, Err(DomainError::Http { status: 500, .. })));
        assert!(svc.load_course("42").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_nothing_to_upload_still_saves() {
        let backend = Arc::new(RecordingBackend::default());
        let store = Arc::new(MemoryStore::default());
        let svc = service(Arc::clone(&backend), Arc::clone(&store));
        let raw: RawMaterials = serde_json::from_value(json!({
            "assignments": [{"id": 1, "name": "Essay", "html_url": "a"}]
        }))
        .unwrap();

        let outcome = svc
            .sync_course("7", &json!(null), &raw, &ClassifyPreferences::default(), &mut |_: SyncProgress| {})
            .await
            .unwrap();
        assert!(outcome.receipt.is_none());
        assert!(backend.uploads.lock().unwrap().is_empty());
        let courses = svc.stored_courses().await.unwrap();
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].course_name, crate::domain::CourseName::PLACEHOLDER);

        svc.forget_course("7").await.unwrap();
        assert!(svc.stored_courses().await.unwrap().is_empty());
    }
}
