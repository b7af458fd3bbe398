#![deny(unsafe_code)]

/// Terminal chat shell.
pub mod app;
/// Chat domain: transcript, lifecycle state and the session controller.
pub mod chat;
/// Layered settings loading.
pub mod settings;
