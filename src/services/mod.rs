//! Asynchronous services: the backend connection, the syntax tree document
//! and the edit watcher that keeps it fresh.

pub mod change_watcher;
pub mod lsp;
pub mod tracing_setup;
pub mod virtual_document;
