//! Shared types, error model, and configuration for docsmith.
//!
//! This crate is the foundation depended on by all other docsmith crates.
//! It provides:
//! - [`DocsmithError`] — the unified error type
//! - [`Table`] — the fixed-width text rendering shared by every tabular reader
//! - Configuration ([`AppConfig`], config loading, env overrides)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CompletionConfig, DatabaseConfig, WorkspaceConfig, config_dir, config_file_path,
    init_config, init_config_at, load_config, load_config_from, validate_api_key,
};
pub use error::{DocsmithError, Result};
pub use types::Table;
