//! Settings controller. Binds a settings view to the key-value store.
//!
//! The view is injected, so the controller runs without a live UI.

use crate::domain::DomainError;
use crate::ports::SettingsStore;
use std::sync::Arc;
use tracing::info;

pub const API_KEY: &str = "api_key";
pub const WEB_SEARCH_ENABLED: &str = "web_search_enabled";

/// Input handles and output slots of a settings screen.
pub trait SettingsView: Send {
    /// Current contents of the API key input.
    fn api_key_input(&mut self) -> Result<String, DomainError>;

    /// Current state of the web-search toggle.
    fn web_search_input(&mut self) -> Result<bool, DomainError>;

    /// Shows the stored key (masked) or `None` when no key is set.
    fn show_api_key(&mut self, masked: Option<&str>);

    fn show_web_search(&mut self, enabled: bool);

    fn show_status(&mut self, message: &str, is_error: bool);
}

pub struct SettingsController<V: SettingsView> {
    store: Arc<dyn SettingsStore>,
    view: V,
}

impl<V: SettingsView> SettingsController<V> {
    pub fn new(store: Arc<dyn SettingsStore>, view: V) -> Self {
        Self { store, view }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Push stored values into the view.
    pub async fn load(&mut self) -> Result<(), DomainError> {
        let key = self.store.get_string(API_KEY).await?;
        let web_search = self.store.get_bool(WEB_SEARCH_ENABLED).await?.unwrap_or(false);
        let masked = key.as_deref().map(mask_api_key);
        self.view.show_api_key(masked.as_deref());
        self.view.show_web_search(web_search);
        Ok(())
    }

    /// Store the trimmed key from the input. Empty input is rejected.
    pub async fn save_api_key(&mut self) -> Result<(), DomainError> {
        let input = self.view.api_key_input()?;
        let key = input.trim();
        if key.is_empty() {
            self.view.show_status("Please enter an API key", true);
            return Err(DomainError::Validation("API key is empty".into()));
        }
        if let Err(e) = self.store.set_string(API_KEY, key).await {
            self.view.show_status(&format!("Failed to save API key: {}", e), true);
            return Err(e);
        }
        let masked = mask_api_key(key);
        self.view.show_api_key(Some(&masked));
        self.view.show_status("API key saved", false);
        info!("API key updated");
        Ok(())
    }

    pub async fn clear_api_key(&mut self) -> Result<(), DomainError> {
        self.store.delete(API_KEY).await?;
        self.view.show_api_key(None);
        self.view.show_status("API key removed", false);
        info!("API key cleared");
        Ok(())
    }

    pub async fn save_web_search(&mut self) -> Result<bool, DomainError> {
        let enabled = self.view.web_search_input()?;
        self.store.set_bool(WEB_SEARCH_ENABLED, enabled).await?;
        self.view.show_web_search(enabled);
        self.view.show_status(
            if enabled {
                "Web search enabled"
            } else {
                "Web search disabled"
            },
            false,
        );
        Ok(enabled)
    }
}

/// Keeps only the last four characters visible.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}
