//! Raw course content as exported from the learning-management API.
//!
//! Field names follow the LMS JSON. Ids arrive as numbers or strings and are
//! normalized to strings.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Num(i64),
    Str(String),
}

impl From<RawId> for String {
    fn from(id: RawId) -> Self {
        match id {
            RawId::Num(n) => n.to_string(),
            RawId::Str(s) => s,
        }
    }
}

fn id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    RawId::deserialize(d).map(String::from)
}

fn opt_id_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Option::<RawId>::deserialize(d).map(|o| o.map(String::from))
}

/// Everything collected for one course before filtering.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMaterials {
    #[serde(default)]
    pub modules: Vec<RawModule>,
    #[serde(default)]
    pub files: Vec<RawFile>,
    #[serde(default)]
    pub pages: Vec<RawPage>,
    #[serde(default)]
    pub assignments: Vec<RawAssignment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawModule {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub items: Vec<RawModuleItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawModuleItem {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub content_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFile {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "content-type", default)]
    pub content_type: Option<String>,
}

impl RawFile {
    pub fn name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.filename.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPage {
    #[serde(default, deserialize_with = "opt_id_string")]
    pub page_id: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAssignment {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_at: Option<String>,
    #[serde(default)]
    pub points_possible: Option<f64>,
    #[serde(default)]
    pub html_url: String,
}

/// A course export file: identity plus raw materials.
///
/// `course_name` stays an untyped JSON value; it is validated when the record
/// is stored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCourseExport {
    #[serde(deserialize_with = "id_string")]
    pub course_id: String,
    #[serde(default)]
    pub course_name: Value,
    #[serde(flatten)]
    pub materials: RawMaterials,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_and_string_ids() {
        let raw: RawMaterials = serde_json::from_value(json!({
            "modules": [{"id": 12, "name": "Week 1", "position": 1, "items": [
                {"id": "a1", "title": "Intro.pdf", "type": "File", "content_id": 99}
            ]}],
            "files": [{"id": "55", "display_name": "notes.pdf", "url": "u", "size": 10}]
        }))
        .unwrap();
        assert_eq!(raw.modules[0].id, "12");
        assert_eq!(raw.modules[0].items[0].content_id.as_deref(), Some("99"));
        assert_eq!(raw.files[0].id, "55");
        assert!(raw.pages.is_empty());
        assert!(raw.assignments.is_empty());
    }

    #[test]
    fn test_file_name_falls_back_to_filename() {
        let f: RawFile = serde_json::from_value(json!({
            "id": 1, "display_name": "", "filename": "slides.pptx", "url": "u"
        }))
        .unwrap();
        assert_eq!(f.name(), Some("slides.pptx"));
    }

    #[test]
    fn test_course_export_flattens_materials() {
        let e: RawCourseExport = serde_json::from_value(json!({
            "course_id": 7,
            "course_name": {"name": "Bio"},
            "files": [{"id": 1, "display_name": "a.pdf", "url": "u"}]
        }))
        .unwrap();
        assert_eq!(e.course_id, "7");
        assert_eq!(e.materials.files.len(), 1);
        assert!(e.course_name.is_object());
    }
}
