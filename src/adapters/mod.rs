//! Infrastructure adapters. Implement outbound ports.
//!
//! RAG backend (HTTP + WebSocket), local storage, terminal UI. Map errors to DomainError.

pub mod backend;
pub mod persistence;
pub mod ui;
