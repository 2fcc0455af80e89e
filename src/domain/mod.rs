//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod classifier;
pub mod documents;
pub mod entities;
pub mod errors;
pub mod raw;

pub use classifier::{ClassifyPreferences, MaterialSummary};
pub use entities::{
    AssignmentRef, Attachment, ChatQuery, ChatSessionDetail, ChatSessionSummary, ChatTurn,
    CollectionStatus, ConnectionState, CourseMaterialBundle, CourseName, FileRef, Module, PageRef,
    StatusUpdate, StoredCourseRecord, StreamEvent, UploadReceipt,
};
pub use errors::DomainError;
pub use raw::{RawCourseExport, RawMaterials};
