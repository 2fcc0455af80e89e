//! Local persistence adapters: libsql material store and JSON settings.

pub mod settings_json;
pub mod sqlite_store;

pub use settings_json::JsonSettingsStore;
pub use sqlite_store::SqliteMaterialStore;
