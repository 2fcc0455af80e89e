//! Backend document identifiers.
//!
//! The backend names an uploaded file `{course_id}_{file_name}` and may convert
//! office formats to PDF, so selections are matched with the extension removed.

use crate::domain::classifier::sanitize_name;
use crate::domain::entities::{CourseMaterialBundle, FileRef};
use std::collections::HashSet;

pub fn document_id(course_id: &str, file_name: &str) -> String {
    format!("{}_{}", course_id, file_name)
}

/// `"7_Deck.pptx"` and `"7_Deck.pdf"` both map to `"7_Deck"`.
pub fn matching_key(doc_id: &str) -> &str {
    let Some((_, file_name)) = doc_id.split_once('_') else {
        return doc_id;
    };
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => &doc_id[..doc_id.len() - file_name.len() + stem.len()],
        _ => doc_id,
    }
}

pub fn same_document(a: &str, b: &str) -> bool {
    matching_key(a) == matching_key(b)
}

/// Files sent to the backend: standalone files first, then module items.
/// A file listed in both places (same id) appears once.
pub fn uploadable_files(bundle: &CourseMaterialBundle) -> Vec<&FileRef> {
    let mut seen = HashSet::new();
    bundle
        .files
        .iter()
        .chain(bundle.modules.iter().flat_map(|m| m.items.iter()))
        .filter(|f| seen.insert(f.id.as_str()))
        .collect()
}

/// Name a file is uploaded under. Document ids are built from it.
pub fn upload_name(file: &FileRef) -> String {
    sanitize_name(&file.name)
}

/// Document ids of every uploaded file, in upload order.
pub fn document_ids(bundle: &CourseMaterialBundle, course_id: &str) -> Vec<String> {
    uploadable_files(bundle)
        .into_iter()
        .map(|f| document_id(course_id, &upload_name(f)))
        .collect()
}

/// First uploaded file whose name mentions "syllabus".
pub fn syllabus_document(bundle: &CourseMaterialBundle, course_id: &str) -> Option<String> {
    uploadable_files(bundle)
        .into_iter()
        .find(|f| f.name.to_lowercase().contains("syllabus"))
        .map(|f| document_id(course_id, &upload_name(f)))
}
