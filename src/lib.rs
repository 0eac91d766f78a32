//! Editor bridge library - exposes all modules for embedding hosts and tests

pub mod app;
pub mod config;
pub mod config_io;
pub mod host;
pub mod model;
pub mod services;
pub mod view;

pub use app::Bridge;
pub use config::Config;
pub use host::{Host, ViewColumn, ViewId, ViewSnapshot};
