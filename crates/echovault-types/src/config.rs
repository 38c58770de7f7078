//! Configuration loading for EchoVault.
//!
//! Layered precedence: built-in defaults -> `<home>/config.toml` ->
//! `ECHOVAULT_*` environment variables. The vault home itself resolves
//! ahead of that: `ECHOVAULT_HOME` env var -> `memory_home` persisted in
//! the global config (`~/.config/echovault/config.toml`) -> `~/.echovault`.

use std::fs;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use directories::BaseDirs;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::MemoryError;

/// Embedding / enrichment provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// No provider configured; the feature is off
    #[default]
    None,
    /// Local model server speaking the Ollama embeddings API
    Ollama,
    /// OpenAI-compatible embeddings endpoint
    Openai,
    /// Voyage AI embeddings endpoint
    Voyage,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::None => "none",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Openai => "openai",
            ProviderKind::Voyage => "voyage",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When to run the semantic half of hybrid search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SemanticMode {
    /// Use vectors when a working provider and compatible index exist
    #[default]
    Auto,
    /// Request vectors on every search (still degrades observably)
    Always,
    /// Lexical only
    Never,
}

impl SemanticMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticMode::Auto => "auto",
            SemanticMode::Always => "always",
            SemanticMode::Never => "never",
        }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default = "default_embedding_provider")]
    pub provider: ProviderKind,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Base URL for local model servers (ignored by cloud providers)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Never echoed in plain form by `config`
    #[serde(default)]
    pub api_key: Option<SecretString>,
}

fn default_embedding_provider() -> ProviderKind {
    ProviderKind::Ollama
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            base_url: default_base_url(),
            api_key: None,
        }
    }
}

impl EmbeddingSettings {
    /// Masked rendition of the api key for display.
    pub fn masked_api_key(&self) -> &'static str {
        match &self.api_key {
            Some(key) if !key.expose_secret().is_empty() => "********",
            _ => "(unset)",
        }
    }
}

/// Optional text-enrichment step, toggled independently of embeddings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EnrichmentSettings {
    #[serde(default)]
    pub provider: ProviderKind,

    #[serde(default)]
    pub model: Option<String>,
}

/// Context assembly settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ContextSettings {
    #[serde(default)]
    pub semantic: SemanticMode,

    /// Always include the most recent memories regardless of relevance
    #[serde(default = "default_topup_recent")]
    pub topup_recent: bool,

    /// Maximum pointers returned by `context`
    #[serde(default = "default_max_pointers")]
    pub max_pointers: usize,
}

fn default_topup_recent() -> bool {
    true
}

fn default_max_pointers() -> usize {
    10
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            semantic: SemanticMode::default(),
            topup_recent: default_topup_recent(),
            max_pointers: default_max_pointers(),
        }
    }
}

/// Where the effective vault home came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeSource {
    Env,
    Config,
    Default,
}

impl std::fmt::Display for HomeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HomeSource::Env => f.write_str("env"),
            HomeSource::Config => f.write_str("config"),
            HomeSource::Default => f.write_str("default"),
        }
    }
}

/// Effective application settings, with the resolved home attached.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Resolved vault home (holds `vault/` and `index.db`)
    pub home: PathBuf,
    /// How the home was chosen
    pub home_source: HomeSource,
    pub embedding: EmbeddingSettings,
    pub enrichment: EnrichmentSettings,
    pub context: ContextSettings,
}

/// The file-backed portion of [`Settings`].
#[derive(Debug, Clone, Deserialize, Default)]
struct FileSettings {
    #[serde(default)]
    embedding: EmbeddingSettings,
    #[serde(default)]
    enrichment: EnrichmentSettings,
    #[serde(default)]
    context: ContextSettings,
}

impl Settings {
    /// Resolve the home, then load `<home>/config.toml` (if present) and
    /// apply `ECHOVAULT_*` environment overrides.
    pub fn load() -> Result<Self, MemoryError> {
        let (home, home_source) = resolve_home();
        Self::load_from(&home, home_source)
    }

    /// Load against an explicit home (tests inject temporary roots here).
    pub fn load_from(home: &Path, home_source: HomeSource) -> Result<Self, MemoryError> {
        let config_path = home.join("config.toml");

        let builder = Config::builder()
            .add_source(File::from(config_path.as_path()).required(false))
            .add_source(
                Environment::with_prefix("ECHOVAULT")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder
            .build()
            .map_err(|e| MemoryError::Config(e.to_string()))?;

        let file_settings: FileSettings = config
            .try_deserialize()
            .map_err(|e| MemoryError::Config(e.to_string()))?;

        Ok(Self {
            home: home.to_path_buf(),
            home_source,
            embedding: file_settings.embedding,
            enrichment: file_settings.enrichment,
            context: file_settings.context,
        })
    }

    /// Directory of Markdown session files.
    pub fn vault_dir(&self) -> PathBuf {
        self.home.join("vault")
    }

    /// Path of the derived SQLite index.
    pub fn index_path(&self) -> PathBuf {
        self.home.join("index.db")
    }
}

/// Global (cross-home) config file, holding only the persisted home path.
fn global_config_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.config_dir().join("echovault").join("config.toml"))
}

#[derive(Debug, Deserialize, Default, serde::Serialize)]
struct GlobalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    memory_home: Option<String>,
}

fn read_global_config() -> GlobalConfig {
    let Some(path) = global_config_path() else {
        return GlobalConfig::default();
    };
    match fs::read_to_string(&path) {
        Ok(text) => toml::from_str(&text).unwrap_or_default(),
        Err(_) => GlobalConfig::default(),
    }
}

/// Return the persisted home from the global config, if set and non-empty.
pub fn persisted_home() -> Option<PathBuf> {
    let value = read_global_config().memory_home?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(normalize_path(Path::new(trimmed)))
}

/// Persist `path` as the vault home in the global config.
pub fn set_persisted_home(path: &Path) -> Result<PathBuf, MemoryError> {
    let normalized = normalize_path(path);
    let cfg_path = global_config_path()
        .ok_or_else(|| MemoryError::Config("cannot locate a user config directory".into()))?;
    if let Some(parent) = cfg_path.parent() {
        fs::create_dir_all(parent).map_err(|e| MemoryError::Storage(e.to_string()))?;
    }

    let mut global = read_global_config();
    global.memory_home = Some(normalized.to_string_lossy().to_string());
    let text = toml::to_string(&global).map_err(|e| MemoryError::Config(e.to_string()))?;
    fs::write(&cfg_path, text).map_err(|e| MemoryError::Storage(e.to_string()))?;
    Ok(normalized)
}

/// Clear the persisted home. Returns true when a setting was removed.
pub fn clear_persisted_home() -> Result<bool, MemoryError> {
    let Some(cfg_path) = global_config_path() else {
        return Ok(false);
    };
    let mut global = read_global_config();
    if global.memory_home.is_none() {
        return Ok(false);
    }
    global.memory_home = None;
    let text = toml::to_string(&global).map_err(|e| MemoryError::Config(e.to_string()))?;
    if text.trim().is_empty() {
        fs::remove_file(&cfg_path).map_err(|e| MemoryError::Storage(e.to_string()))?;
    } else {
        fs::write(&cfg_path, text).map_err(|e| MemoryError::Storage(e.to_string()))?;
    }
    Ok(true)
}

/// Resolve the vault home and report where it came from.
pub fn resolve_home() -> (PathBuf, HomeSource) {
    if let Ok(env_home) = std::env::var("ECHOVAULT_HOME") {
        if !env_home.trim().is_empty() {
            return (normalize_path(Path::new(env_home.trim())), HomeSource::Env);
        }
    }

    if let Some(persisted) = persisted_home() {
        return (persisted, HomeSource::Config);
    }

    let default_home = BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".echovault"))
        .unwrap_or_else(|| PathBuf::from(".echovault"));
    (default_home, HomeSource::Default)
}

/// Expand a leading `~` and absolutize relative paths.
fn normalize_path(path: &Path) -> PathBuf {
    let expanded = if let Ok(stripped) = path.strip_prefix("~") {
        BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(stripped))
            .unwrap_or_else(|| path.to_path_buf())
    } else {
        path.to_path_buf()
    };
    if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let home = TempDir::new().unwrap();
        let settings = Settings::load_from(home.path(), HomeSource::Default).unwrap();
        assert_eq!(settings.embedding.provider, ProviderKind::Ollama);
        assert_eq!(settings.embedding.model, "nomic-embed-text");
        assert_eq!(settings.context.semantic, SemanticMode::Auto);
        assert!(settings.context.topup_recent);
        assert_eq!(settings.context.max_pointers, 10);
        assert_eq!(settings.enrichment.provider, ProviderKind::None);
    }

    #[test]
    fn test_load_from_config_file() {
        let home = TempDir::new().unwrap();
        std::fs::write(
            home.path().join("config.toml"),
            r#"
[embedding]
provider = "none"

[context]
semantic = "never"
topup_recent = false
"#,
        )
        .unwrap();

        let settings = Settings::load_from(home.path(), HomeSource::Env).unwrap();
        assert_eq!(settings.embedding.provider, ProviderKind::None);
        assert_eq!(settings.context.semantic, SemanticMode::Never);
        assert!(!settings.context.topup_recent);
    }

    #[test]
    fn test_paths_derive_from_home() {
        let home = TempDir::new().unwrap();
        let settings = Settings::load_from(home.path(), HomeSource::Default).unwrap();
        assert_eq!(settings.vault_dir(), home.path().join("vault"));
        assert_eq!(settings.index_path(), home.path().join("index.db"));
    }

    #[test]
    fn test_masked_api_key() {
        let mut embedding = EmbeddingSettings::default();
        assert_eq!(embedding.masked_api_key(), "(unset)");
        embedding.api_key = Some(SecretString::from("sk-test-123".to_string()));
        assert_eq!(embedding.masked_api_key(), "********");
    }

    #[test]
    fn test_malformed_config_is_config_error() {
        let home = TempDir::new().unwrap();
        std::fs::write(
            home.path().join("config.toml"),
            "[embedding]\nprovider = \"not-a-provider\"\n",
        )
        .unwrap();

        let err = Settings::load_from(home.path(), HomeSource::Default).unwrap_err();
        assert!(matches!(err, MemoryError::Config(_)));
    }
}
