//! Implements InputPort. Inquire-based interactive prompts.
//!
//! Main menu: import a course export, chat, saved chats, backend status,
//! stored courses, settings.

use crate::adapters::ui::progress::{SyncProgressBar, status_spinner};
use crate::domain::documents::{document_ids, syllabus_document};
use crate::domain::{
    ChatQuery, ChatSessionSummary, ChatTurn, ClassifyPreferences, DomainError, RawCourseExport,
    StatusUpdate, StoredCourseRecord,
};
use crate::ports::{BackendPort, InputPort, SettingsStore};
use crate::usecases::{
    ChatSession, MaterialService, SettingsController, SettingsView, StreamObserver, SyncProgress,
};
use async_trait::async_trait;
use indicatif::ProgressBar;
use inquire::error::InquireError;
use inquire::ui::{Color, RenderConfig, Styled};
use inquire::{Confirm, MultiSelect, Password, PasswordDisplayMode, Select, Text};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const MENU_IMPORT: &str = "Import course export";
const MENU_CHAT: &str = "Chat with a course";
const MENU_SAVED: &str = "Saved chats";
const MENU_STATUS: &str = "Backend status";
const MENU_COURSES: &str = "Stored courses";
const MENU_SETTINGS: &str = "Settings";
const MENU_EXIT: &str = "Exit";

const CATEGORY_MODULES: &str = "Module files";
const CATEGORY_FILES: &str = "Files";
const CATEGORY_PAGES: &str = "Pages";
const CATEGORY_ASSIGNMENTS: &str = "Assignments";

/// Applies the prompt theme globally.
pub fn apply_theme() {
    let config = RenderConfig::default()
        .with_prompt_prefix(Styled::new("?").with_fg(Color::LightYellow))
        .with_highlighted_option_prefix(Styled::new(">").with_fg(Color::LightBlue))
        .with_canceled_prompt_indicator(Styled::new("<back>").with_fg(Color::DarkGrey));
    inquire::set_global_render_config(config);
}

fn ui_err(e: InquireError) -> DomainError {
    DomainError::Ui(e.to_string())
}

/// Esc returns to the previous menu.
fn is_cancel(e: &InquireError) -> bool {
    matches!(e, InquireError::OperationCanceled)
}

/// Map prompt result: `Ok(None)` when the user pressed Esc.
fn optional<T>(result: Result<T, InquireError>) -> Result<Option<T>, DomainError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if is_cancel(&e) => Ok(None),
        Err(e) => Err(ui_err(e)),
    }
}

fn preferences_from_selection(selected: &[&str]) -> ClassifyPreferences {
    ClassifyPreferences {
        include_modules: selected.contains(&CATEGORY_MODULES),
        include_files: selected.contains(&CATEGORY_FILES),
        include_pages: selected.contains(&CATEGORY_PAGES),
        include_assignments: selected.contains(&CATEGORY_ASSIGNMENTS),
    }
}

fn course_label(record: &StoredCourseRecord) -> String {
    format!("{} ({})", record.course_name, record.course_id)
}

fn chat_label(chat: &ChatSessionSummary) -> String {
    let title = if chat.title.trim().is_empty() {
        "Untitled chat"
    } else {
        chat.title.trim()
    };
    match &chat.updated_at {
        Some(at) => format!("{} [{} messages, {}]", title, chat.message_count, at),
        None => format!("{} [{} messages]", title, chat.message_count),
    }
}

fn new_session_id() -> String {
    format!("chat-{}", chrono::Utc::now().timestamp_millis())
}

/// Streams answer text to stdout and backend notices to a spinner.
struct TerminalObserver {
    spinner: Option<ProgressBar>,
}

impl TerminalObserver {
    fn new() -> Self {
        Self { spinner: None }
    }

    fn clear_spinner(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}

impl StreamObserver for TerminalObserver {
    fn on_chunk(&mut self, content: &str) {
        self.clear_spinner();
        let mut out = std::io::stdout();
        let _ = out.write_all(content.as_bytes());
        let _ = out.flush();
    }

    fn on_status(&mut self, status: &StatusUpdate) {
        if status.is_complete() {
            self.clear_spinner();
            return;
        }
        let message = match status.count {
            Some(n) => format!("{} ({})", status.message, n),
            None => status.message.clone(),
        };
        if let Some(pb) = &self.spinner {
            pb.set_message(message);
        } else {
            self.spinner = Some(status_spinner(message));
        }
    }

    fn on_complete(&mut self) {
        self.clear_spinner();
        println!("\n");
    }

    fn on_error(&mut self, error: &DomainError) {
        self.clear_spinner();
        println!();
        eprintln!("Error: {}", error);
    }
}

/// Settings screen backed by inquire prompts.
struct TerminalSettingsView;

impl SettingsView for TerminalSettingsView {
    fn api_key_input(&mut self) -> Result<String, DomainError> {
        match optional(
            Password::new("API key:")
                .without_confirmation()
                .with_display_mode(PasswordDisplayMode::Masked)
                .prompt(),
        )? {
            Some(key) => Ok(key),
            None => Ok(String::new()),
        }
    }

    fn web_search_input(&mut self) -> Result<bool, DomainError> {
        Confirm::new("Enable web search?")
            .with_default(false)
            .prompt()
            .map_err(ui_err)
    }

    fn show_api_key(&mut self, masked: Option<&str>) {
        println!("API key: {}", masked.unwrap_or("(not set)"));
    }

    fn show_web_search(&mut self, enabled: bool) {
        println!("Web search: {}", if enabled { "on" } else { "off" });
    }

    fn show_status(&mut self, message: &str, is_error: bool) {
        if is_error {
            eprintln!("{}", message);
        } else {
            println!("{}", message);
        }
    }
}

/// TUI adapter. Inquire prompts.
pub struct TuiInputPort {
    materials: Arc<MaterialService>,
    backend: Arc<dyn BackendPort>,
    chat: Arc<ChatSession>,
    settings: Arc<dyn SettingsStore>,
    chat_history_limit: usize,
}

impl TuiInputPort {
    pub fn new(
        materials: Arc<MaterialService>,
        backend: Arc<dyn BackendPort>,
        chat: Arc<ChatSession>,
        settings: Arc<dyn SettingsStore>,
        chat_history_limit: usize,
    ) -> Self {
        Self {
            materials,
            backend,
            chat,
            settings,
            chat_history_limit,
        }
    }

    async fn import_export(&self) -> Result<(), DomainError> {
        let Some(path) = optional(Text::new("Path to course export (JSON):").prompt())? else {
            return Ok(());
        };
        let path = PathBuf::from(path.trim());
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| DomainError::Validation(format!("read {}: {}", path.display(), e)))?;
        let export: RawCourseExport = serde_json::from_str(&content)
            .map_err(|e| DomainError::Validation(format!("invalid course export: {}", e)))?;

        let categories = vec![
            CATEGORY_MODULES,
            CATEGORY_FILES,
            CATEGORY_PAGES,
            CATEGORY_ASSIGNMENTS,
        ];
        let Some(selected) = optional(
            MultiSelect::new("Include:", categories)
                .with_all_selected_by_default()
                .prompt(),
        )?
        else {
            return Ok(());
        };
        let prefs = preferences_from_selection(&selected);

        let mut bar = SyncProgressBar::new();
        let result = self
            .materials
            .sync_course(
                &export.course_id,
                &export.course_name,
                &export.materials,
                &prefs,
                &mut |event: SyncProgress| bar.update(event),
            )
            .await;
        bar.finish();
        let outcome = result?;

        println!(
            "Imported {} ({} skipped).",
            course_label(&outcome.record),
            outcome.skipped.len()
        );
        for (name, reason) in &outcome.skipped {
            println!("  skipped {}: {}", name, reason);
        }
        if let Some(receipt) = outcome.receipt {
            if let Some(message) = &receipt.message {
                println!("Backend: {}", message);
            }
            for name in &receipt.failed {
                println!("  backend rejected {}", name);
            }
        }
        Ok(())
    }

    /// `Ok(None)` when nothing is stored or the user backed out.
    async fn pick_course(&self) -> Result<Option<StoredCourseRecord>, DomainError> {
        let mut records = self.materials.stored_courses().await?;
        if records.is_empty() {
            println!("No courses stored yet. Import a course export first.");
            return Ok(None);
        }
        let labels: Vec<String> = records.iter().map(course_label).collect();
        let picked = optional(Select::new("Course:", labels).raw_prompt())?;
        Ok(picked.map(|choice| records.swap_remove(choice.index)))
    }

    async fn chat_menu(&self) -> Result<(), DomainError> {
        if let Some(record) = self.pick_course().await? {
            self.chat_loop(&record, new_session_id(), Vec::new()).await?;
        }
        Ok(())
    }

    async fn chat_loop(
        &self,
        record: &StoredCourseRecord,
        session_id: String,
        mut history: Vec<ChatTurn>,
    ) -> Result<(), DomainError> {
        if let Err(e) = self.chat.connect(&record.course_id).await {
            eprintln!("Could not connect: {}", e);
            return Ok(());
        }
        let selected_docs = document_ids(&record.materials, &record.course_id);
        let syllabus_id = syllabus_document(&record.materials, &record.course_id);
        println!(
            "Chatting about {}. Empty line or Esc to leave.\n",
            record.course_name
        );
        for turn in &history {
            println!("{}: {}\n", turn.role, turn.content);
        }

        loop {
            let Some(message) = optional(Text::new("You:").prompt())? else {
                break;
            };
            let message = message.trim();
            if message.is_empty() {
                break;
            }

            let query = ChatQuery {
                message: message.to_string(),
                history: history.clone(),
                selected_docs: selected_docs.clone(),
                syllabus_id: syllabus_id.clone(),
                session_id: Some(session_id.clone()),
            };
            let mut observer = TerminalObserver::new();
            match self.chat.send_query(&query, &mut observer).await {
                Ok(answer) => {
                    history.push(ChatTurn::user(message));
                    history.push(ChatTurn::assistant(answer));
                }
                Err(_) if !self.chat.is_ready() => {
                    eprintln!("Connection lost ({}).", self.chat.state());
                    break;
                }
                Err(_) => {}
            }
        }

        self.chat.disconnect().await;
        Ok(())
    }

    async fn saved_chats(&self) -> Result<(), DomainError> {
        let Some(record) = self.pick_course().await? else {
            return Ok(());
        };
        let mut chats = self
            .backend
            .list_chats(&record.course_id, self.chat_history_limit)
            .await?;
        if chats.is_empty() {
            println!("No saved chats for {}.", record.course_name);
            return Ok(());
        }
        let labels: Vec<String> = chats.iter().map(chat_label).collect();
        let Some(choice) = optional(Select::new("Chat:", labels).raw_prompt())? else {
            return Ok(());
        };
        let chat = chats.swap_remove(choice.index);

        let actions = vec!["Continue", "Rename", "Delete", "Back"];
        let Some(action) = optional(Select::new("Action:", actions).prompt())? else {
            return Ok(());
        };
        match action {
            "Continue" => {
                let detail = self
                    .backend
                    .get_chat(&record.course_id, &chat.session_id)
                    .await?;
                self.chat_loop(&record, detail.session_id, detail.messages)
                    .await?;
            }
            "Rename" => {
                let Some(title) =
                    optional(Text::new("New title:").with_initial_value(&chat.title).prompt())?
                else {
                    return Ok(());
                };
                let title = title.trim();
                if title.is_empty() {
                    println!("Title unchanged.");
                    return Ok(());
                }
                self.backend
                    .rename_chat(&record.course_id, &chat.session_id, title)
                    .await?;
                println!("Renamed.");
            }
            "Delete" => {
                let confirmed = Confirm::new("Delete this chat?")
                    .with_default(false)
                    .prompt()
                    .map_err(ui_err)?;
                if confirmed {
                    self.backend
                        .delete_chat(&record.course_id, &chat.session_id)
                        .await?;
                    println!("Deleted.");
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn backend_status(&self) -> Result<(), DomainError> {
        let spinner = status_spinner("checking backend");
        let healthy = self.backend.health_check().await;
        spinner.finish_and_clear();
        if !healthy {
            println!("Backend: unreachable");
            return Ok(());
        }
        println!("Backend: reachable");

        for record in self.materials.stored_courses().await? {
            match self.backend.collection_status(&record.course_id).await {
                Ok(status) => {
                    let docs = status
                        .document_count
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "?".into());
                    let indexed = match status.exists {
                        Some(true) => "indexed",
                        Some(false) => "not indexed",
                        None => "unknown",
                    };
                    println!("  {}: {}, {} documents", course_label(&record), indexed, docs);
                }
                Err(e) => println!("  {}: {}", course_label(&record), e),
            }
        }
        Ok(())
    }

    async fn stored_courses(&self) -> Result<(), DomainError> {
        let Some(record) = self.pick_course().await? else {
            return Ok(());
        };
        let summary = crate::domain::classifier::summarize(&record.materials);
        println!(
            "{}: {} modules, {} module files, {} files, {} pages, {} assignments (updated {})",
            course_label(&record),
            summary.modules,
            summary.module_files,
            summary.files,
            summary.pages,
            summary.assignments,
            record.last_updated.format("%Y-%m-%d %H:%M UTC"),
        );
        let remove = Confirm::new("Remove this course from local storage?")
            .with_default(false)
            .prompt()
            .map_err(ui_err)?;
        if remove {
            self.materials.forget_course(&record.course_id).await?;
            println!("Removed.");
        }
        Ok(())
    }

    async fn settings(&self) -> Result<(), DomainError> {
        let mut controller =
            SettingsController::new(Arc::clone(&self.settings), TerminalSettingsView);
        controller.load().await?;

        let actions = vec!["Set API key", "Clear API key", "Web search", "Back"];
        loop {
            let Some(action) = optional(Select::new("Settings:", actions.clone()).prompt())? else {
                return Ok(());
            };
            let result = match action {
                "Set API key" => controller.save_api_key().await,
                "Clear API key" => controller.clear_api_key().await,
                "Web search" => controller.save_web_search().await.map(|_| ()),
                _ => return Ok(()),
            };
            if let Err(e) = result {
                warn!(error = %e, "settings update failed");
            }
        }
    }
}

#[async_trait]
impl InputPort for TuiInputPort {
    async fn run(&self) -> Result<(), DomainError> {
        let menu = vec![
            MENU_IMPORT,
            MENU_CHAT,
            MENU_SAVED,
            MENU_STATUS,
            MENU_COURSES,
            MENU_SETTINGS,
            MENU_EXIT,
        ];
        loop {
            let choice = match Select::new("What would you like to do?", menu.clone()).prompt() {
                Ok(c) => c,
                Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                    break;
                }
                Err(e) => return Err(ui_err(e)),
            };
            let result = match choice {
                MENU_IMPORT => self.import_export().await,
                MENU_CHAT => self.chat_menu().await,
                MENU_SAVED => self.saved_chats().await,
                MENU_STATUS => self.backend_status().await,
                MENU_COURSES => self.stored_courses().await,
                MENU_SETTINGS => self.settings().await,
                _ => break,
            };
            if let Err(e) = result {
                warn!(action = choice, error = %e, "menu action failed");
                eprintln!("Error: {}", e);
            }
        }
        self.chat.shutdown().await;
        info!("bye");
        Ok(())
    }
}
