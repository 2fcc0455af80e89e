//! Application use cases. Orchestrate domain logic via ports.

pub mod chat_session;
pub mod material_service;
pub mod settings_controller;

pub use chat_session::{ChatSession, SessionTimeouts, StreamObserver};
pub use material_service::{MaterialService, SyncOutcome, SyncProgress};
pub use settings_controller::{SettingsController, SettingsView};
