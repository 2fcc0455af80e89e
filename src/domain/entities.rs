//! Domain entities. Pure data structures for the core business.
//!
//! No HTTP/WebSocket/SQL types here. Adapters map into these.

use crate::domain::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Filtered, upload-ready materials of one course. Produced by the classifier
/// and persisted verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseMaterialBundle {
    pub modules: Vec<Module>,
    pub files: Vec<FileRef>,
    pub pages: Vec<PageRef>,
    pub assignments: Vec<AssignmentRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    pub name: String,
    pub position: i64,
    /// Only allow-listed file entries.
    pub items: Vec<FileRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub id: String,
    pub name: String,
    pub url: String,
    /// Bytes. Module-embedded files are not sized and carry 0.
    pub size: u64,
    pub mime_type: String,
}

/// Wiki page. Contextual content only, no binary payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRef {
    pub id: String,
    pub title: String,
    pub url: String,
    pub body: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRef {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub due_at: Option<String>,
    pub points_possible: Option<f64>,
    pub url: String,
}

/// Binary payload sent to the backend upload endpoint.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Display name of a course, validated at the storage boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseName(String);

impl CourseName {
    pub const PLACEHOLDER: &'static str = "Unknown Course";

    /// Strings are taken as-is. Objects are checked for `name`, `courseName`,
    /// then `course_name`. Anything else becomes the placeholder.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self(s.clone()),
            Value::Object(map) => {
                let found = ["name", "courseName", "course_name"]
                    .iter()
                    .find_map(|k| map.get(*k).and_then(Value::as_str));
                match found {
                    Some(name) => {
                        warn!(name, "course name given as object; extracted name field");
                        Self(name.to_string())
                    }
                    None => {
                        warn!("course name object has no name field; using placeholder");
                        Self(Self::PLACEHOLDER.to_string())
                    }
                }
            }
            other => {
                warn!(value = %other, "course name is not a string; using placeholder");
                Self(Self::PLACEHOLDER.to_string())
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// One record per course. Overwritten wholesale on every save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCourseRecord {
    pub course_id: String,
    pub course_name: String,
    pub materials: CourseMaterialBundle,
    pub last_updated: DateTime<Utc>,
}

impl StoredCourseRecord {
    /// Validated constructor. Rejects an empty course id; coerces the name.
    pub fn new(
        course_id: &str,
        course_name: &Value,
        materials: CourseMaterialBundle,
    ) -> Result<Self, DomainError> {
        let course_id = course_id.trim();
        if course_id.is_empty() {
            return Err(DomainError::Validation("course id must not be empty".into()));
        }
        Ok(Self {
            course_id: course_id.to_string(),
            course_name: CourseName::from_value(course_name).into_string(),
            materials,
            last_updated: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// One user submission. Serializes to the outbound WebSocket frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatQuery {
    pub message: String,
    pub history: Vec<ChatTurn>,
    pub selected_docs: Vec<String>,
    pub syllabus_id: Option<String>,
    pub session_id: Option<String>,
}

impl ChatQuery {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

/// The only legal shapes of a server frame during one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Chunk { content: String },
    Done,
    Error { message: String },
}

impl StreamEvent {
    pub fn parse(frame: &str) -> Result<Self, DomainError> {
        serde_json::from_str(frame)
            .map_err(|e| DomainError::Protocol(format!("malformed frame: {}", e)))
    }
}

/// Progress notice embedded in chunk content as `[STATUS]stage|message|count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub stage: String,
    pub message: String,
    pub count: Option<u32>,
}

impl StatusUpdate {
    const PREFIX: &'static str = "[STATUS]";

    pub fn parse(content: &str) -> Option<Self> {
        let rest = content.trim_end().strip_prefix(Self::PREFIX)?;
        let mut parts = rest.splitn(3, '|');
        let stage = parts.next().unwrap_or_default().trim().to_string();
        let message = parts.next().unwrap_or_default().trim().to_string();
        let count = parts.next().and_then(|c| c.trim().parse().ok());
        Some(Self {
            stage,
            message,
            count,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.stage == "complete"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    /// Open with one query in flight.
    Awaiting,
    /// Terminal. The session cannot reconnect.
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Awaiting => "awaiting",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Saved conversation as listed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSessionSummary {
    pub session_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub message_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSessionDetail {
    pub session_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatTurn>,
}

/// Vector collection status of a course on the backend. Unknown fields are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStatus {
    #[serde(default)]
    pub exists: Option<bool>,
    #[serde(default)]
    pub document_count: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parsed body of the upload endpoint. Unknown fields are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub uploaded: usize,
    /// Names the backend could not ingest.
    #[serde(default)]
    pub failed: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
