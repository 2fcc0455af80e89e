//! Material classifier. Filters raw course content into an upload-ready bundle.
//!
//! Pure: no I/O, no external state. Input order is preserved.

use crate::domain::entities::{AssignmentRef, CourseMaterialBundle, FileRef, Module, PageRef};
use crate::domain::raw::{RawAssignment, RawFile, RawMaterials, RawModule, RawPage};

/// Extensions the backend can ingest (lowercase, no dot).
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "ppt", "pptx", "xls", "xlsx", "txt", "md", "csv", "rtf", "png", "jpg",
    "jpeg", "gif", "webp",
];

/// Case-insensitive substrings that drop an item regardless of type.
pub const EXCLUDE_KEYWORDS: &[&str] = &["grade", "gradebook", "submission", "calendar", "export"];

const SIZE_UNITS: &[&str] = &["Bytes", "KB", "MB", "GB", "TB"];

/// Which categories to keep. All enabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyPreferences {
    pub include_modules: bool,
    pub include_files: bool,
    pub include_pages: bool,
    pub include_assignments: bool,
}

impl Default for ClassifyPreferences {
    fn default() -> Self {
        Self {
            include_modules: true,
            include_files: true,
            include_pages: true,
            include_assignments: true,
        }
    }
}

/// Counts per category of a bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialSummary {
    pub modules: usize,
    pub module_files: usize,
    pub files: usize,
    pub pages: usize,
    pub assignments: usize,
}

impl MaterialSummary {
    pub fn total(&self) -> usize {
        self.module_files + self.files + self.pages + self.assignments
    }
}

pub fn classify(raw: &RawMaterials, prefs: &ClassifyPreferences) -> CourseMaterialBundle {
    CourseMaterialBundle {
        modules: if prefs.include_modules {
            raw.modules.iter().filter_map(classify_module).collect()
        } else {
            Vec::new()
        },
        files: if prefs.include_files {
            raw.files.iter().filter_map(classify_file).collect()
        } else {
            Vec::new()
        },
        pages: if prefs.include_pages {
            raw.pages.iter().filter_map(classify_page).collect()
        } else {
            Vec::new()
        },
        assignments: if prefs.include_assignments {
            raw.assignments.iter().filter_map(classify_assignment).collect()
        } else {
            Vec::new()
        },
    }
}

/// Returns `None` when no item qualifies; empty modules are never emitted.
fn classify_module(module: &RawModule) -> Option<Module> {
    let items: Vec<FileRef> = module
        .items
        .iter()
        .filter(|item| item.item_type == "File")
        .filter_map(|item| {
            let title = item.title.as_deref().filter(|t| !t.trim().is_empty())?;
            if !is_allowed_file(title) {
                return None;
            }
            Some(FileRef {
                id: item.content_id.clone().unwrap_or_else(|| item.id.clone()),
                name: title.to_string(),
                url: item.url.clone().unwrap_or_default(),
                size: 0,
                mime_type: mime_for_name(title).to_string(),
            })
        })
        .collect();

    if items.is_empty() {
        return None;
    }
    Some(Module {
        id: module.id.clone(),
        name: module.name.clone(),
        position: module.position,
        items,
    })
}

fn classify_file(file: &RawFile) -> Option<FileRef> {
    let name = file.name().filter(|n| !n.trim().is_empty())?;
    if !is_allowed_file(name) {
        return None;
    }
    Some(FileRef {
        id: file.id.clone(),
        name: name.to_string(),
        url: file.url.clone(),
        size: file.size,
        mime_type: file
            .content_type
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| mime_for_name(name).to_string()),
    })
}

fn classify_page(page: &RawPage) -> Option<PageRef> {
    let title = page.title.as_deref().filter(|t| !t.trim().is_empty())?;
    if is_excluded(title) {
        return None;
    }
    Some(PageRef {
        id: page.page_id.clone().unwrap_or_else(|| page.url.clone()),
        title: title.to_string(),
        url: page.url.clone(),
        body: page.body.clone(),
        updated_at: page.updated_at.clone(),
    })
}

fn classify_assignment(assignment: &RawAssignment) -> Option<AssignmentRef> {
    let name = assignment.name.as_deref().filter(|n| !n.trim().is_empty())?;
    if is_excluded(name) {
        return None;
    }
    Some(AssignmentRef {
        id: assignment.id.clone(),
        name: name.to_string(),
        description: assignment.description.clone(),
        due_at: assignment.due_at.clone(),
        points_possible: assignment.points_possible,
        url: assignment.html_url.clone(),
    })
}

/// Allow-listed extension and no exclude keyword.
pub fn is_allowed_file(name: &str) -> bool {
    let allowed = extension_of(name)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);
    allowed && !is_excluded(name)
}

pub fn is_excluded(name: &str) -> bool {
    let lower = name.to_lowercase();
    EXCLUDE_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Lowercased final dot-separated segment, if the name has one.
pub fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "rtf" => "application/rtf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

fn mime_for_name(name: &str) -> &'static str {
    extension_of(name)
        .map(|ext| mime_for_extension(&ext))
        .unwrap_or("application/octet-stream")
}

pub fn summarize(bundle: &CourseMaterialBundle) -> MaterialSummary {
    MaterialSummary {
        modules: bundle.modules.len(),
        module_files: bundle.modules.iter().map(|m| m.items.len()).sum(),
        files: bundle.files.len(),
        pages: bundle.pages.len(),
        assignments: bundle.assignments.len(),
    }
}

/// Sum of standalone file sizes. Module items are not sized.
pub fn total_size(bundle: &CourseMaterialBundle) -> u64 {
    bundle.files.iter().map(|f| f.size).sum()
}

/// Human-readable size, base 1024, at most two decimals.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut exp = 0usize;
    let mut scaled = bytes;
    while scaled >= 1024 && exp < SIZE_UNITS.len() - 1 {
        scaled /= 1024;
        exp += 1;
    }
    let value = bytes as f64 / 1024f64.powi(exp as i32);
    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, SIZE_UNITS[exp])
}

/// Replaces every character outside `[A-Za-z0-9_.-]` with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
