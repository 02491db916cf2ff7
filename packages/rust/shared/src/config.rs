//! Application configuration for docsmith.
//!
//! User config lives at `~/.docsmith/docsmith.toml`.
//! Environment variables override config file values, which override defaults.
//! Secrets are never stored in the file, only the names of the env vars
//! that hold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DocsmithError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docsmith.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docsmith";

/// Env var overriding `completion.base_url`.
pub const BASE_URL_ENV: &str = "DEEPSEEK_BASE_URL";
/// Env var overriding `completion.model`.
pub const MODEL_ENV: &str = "DEEPSEEK_MODEL";
/// Env var overriding `database.host`.
pub const DB_HOST_ENV: &str = "DOCSMITH_DB_HOST";
/// Env var overriding `database.database`.
pub const DB_DATABASE_ENV: &str = "DOCSMITH_DB_DATABASE";

// ---------------------------------------------------------------------------
// Config structs (matching docsmith.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Working-directory layout.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Completion service settings.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Relational database settings.
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// `[workspace]` section. Paths are relative to the run root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_doc_dir")]
    pub doc_dir: String,

    #[serde(default = "default_template_dir")]
    pub template_dir: String,

    #[serde(default = "default_result_dir")]
    pub result_dir: String,

    /// Static domain/terminology text injected into every prompt.
    #[serde(default = "default_background_file")]
    pub background_file: String,

    /// Append-only log of per-run recaps.
    #[serde(default = "default_summary_file")]
    pub summary_file: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            doc_dir: default_doc_dir(),
            template_dir: default_template_dir(),
            result_dir: default_result_dir(),
            background_file: default_background_file(),
            summary_file: default_summary_file(),
        }
    }
}

fn default_doc_dir() -> String {
    "doc".into()
}
fn default_template_dir() -> String {
    "template".into()
}
fn default_result_dir() -> String {
    "result".into()
}
fn default_background_file() -> String {
    "background_knowledge.md".into()
}
fn default_summary_file() -> String {
    "context_summary.md".into()
}

/// `[completion]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the OpenAI-compatible API; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// System-role instruction used when processing documents.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_api_key_env() -> String {
    "DEEPSEEK_API_KEY".into()
}
fn default_base_url() -> String {
    "https://api.deepseek.com".into()
}
fn default_model() -> String {
    "deepseek-chat".into()
}
fn default_system_prompt() -> String {
    "你是一个专业的数据分析和整理专家,并且精通货物运输。".into()
}

/// `[database]` section.
///
/// When `host` is set the reader connects to that remote libSQL endpoint,
/// authenticating with the token from `password_env`. Otherwise the local
/// database file at `database` is opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Remote libSQL / sqld URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Name of the env var holding the remote auth token.
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// Local database file path.
    #[serde(default = "default_database")]
    pub database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: None,
            password_env: default_password_env(),
            database: default_database(),
        }
    }
}

fn default_password_env() -> String {
    "DOCSMITH_DB_PASSWORD".into()
}
fn default_database() -> String {
    "docsmith.db".into()
}

impl DatabaseConfig {
    /// Resolve the remote auth token from the environment, if any.
    pub fn password(&self) -> Option<String> {
        std::env::var(&self.password_env)
            .ok()
            .filter(|v| !v.is_empty())
    }
}

impl AppConfig {
    /// Apply environment overrides on top of file values.
    ///
    /// `lookup` is normally `std::env::var(..).ok()`; tests pass a map.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(base_url) = var(BASE_URL_ENV) {
            tracing::debug!(%base_url, "base URL overridden from environment");
            self.completion.base_url = base_url;
        }
        if let Some(model) = var(MODEL_ENV) {
            self.completion.model = model;
        }
        if let Some(host) = var(DB_HOST_ENV) {
            self.database.host = Some(host);
        }
        if let Some(database) = var(DB_DATABASE_ENV) {
            self.database.database = database;
        }
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.completion.base_url).map_err(|e| {
            DocsmithError::config(format!(
                "invalid completion.base_url '{}': {e}",
                self.completion.base_url
            ))
        })?;

        if self.completion.model.trim().is_empty() {
            return Err(DocsmithError::config("completion.model must not be empty"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docsmith/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocsmithError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docsmith/docsmith.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocsmithError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocsmithError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let path = config_file_path()?;
    init_config_at(&path)?;
    Ok(path)
}

/// Write a default config file at `path`, creating parent directories.
pub fn init_config_at(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| DocsmithError::io(dir, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| DocsmithError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| DocsmithError::io(path, e))?;
    tracing::info!(?path, "created default config file");
    Ok(())
}

/// Read the completion API key from the env var named in the config.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.completion.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(DocsmithError::config(format!(
            "completion API key not found. Set the {var_name} environment variable."
        ))),
    }
}
