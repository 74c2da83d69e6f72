//! Persisted config (store location, models, chunking) in the app data directory.
//!
//! `DOCRAG_STORE_DIR`, `DOCRAG_OLLAMA_URL` and `DOCRAG_LLM_MODEL` override the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app_data;
use crate::chunks::{DEFAULT_MAX_TOKENS, DEFAULT_OVERLAP_TOKENS};
use crate::ollama::{DEFAULT_BASE_URL, DEFAULT_EMBED_MODEL};
use crate::synth::DEFAULT_CONTEXT_CHAR_BUDGET;

const CONFIG_FILENAME: &str = "config.toml";

pub const ENV_STORE_DIR: &str = "DOCRAG_STORE_DIR";
pub const ENV_OLLAMA_URL: &str = "DOCRAG_OLLAMA_URL";
pub const ENV_LLM_MODEL: &str = "DOCRAG_LLM_MODEL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Vector store directory. Defaults to `store/` in the app data directory.
    pub store_dir: Option<String>,
    pub ollama_url: String,
    pub embed_model: String,
    /// Completion model for answers. Unset means answers use the labelled fallback.
    pub llm_model: Option<String>,
    pub max_tokens: usize,
    /// Words carried over between consecutive chunks.
    pub overlap_tokens: usize,
    /// Max characters of retrieved context sent to the LLM.
    pub context_char_budget: usize,
    /// Tesseract language code for OCR.
    pub ocr_lang: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: None,
            ollama_url: DEFAULT_BASE_URL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            llm_model: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            overlap_tokens: DEFAULT_OVERLAP_TOKENS,
            context_char_budget: DEFAULT_CONTEXT_CHAR_BUDGET,
            ocr_lang: "eng".to_string(),
        }
    }
}

impl Config {
    /// Resolved vector store directory.
    pub fn store_dir(&self) -> Result<PathBuf, ConfigError> {
        match self.store_dir.as_deref().filter(|s| !s.is_empty()) {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => app_data::default_store_dir().ok_or(ConfigError::NoDataDir),
        }
    }

    /// Applies overrides from a variable lookup (the process environment in [load_config]).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v: &String| !v.trim().is_empty());
        if let Some(dir) = get(ENV_STORE_DIR) {
            self.store_dir = Some(dir);
        }
        if let Some(url) = get(ENV_OLLAMA_URL) {
            self.ollama_url = url;
        }
        if let Some(model) = get(ENV_LLM_MODEL) {
            self.llm_model = Some(model.trim().to_string());
        }
        self
    }
}

/// Load config from the app data directory plus environment overrides.
/// Returns default config if the file is missing or invalid.
pub fn load_config() -> Config {
    load_file_config().with_overrides(|key| std::env::var(key).ok())
}

fn load_file_config() -> Config {
    let Some(data_dir) = app_data::app_data_dir() else {
        return Config::default();
    };
    let path = data_dir.join(CONFIG_FILENAME);
    let Ok(s) = std::fs::read_to_string(&path) else {
        return Config::default();
    };
    toml::from_str(&s).unwrap_or_default()
}

/// Save config to the app data directory.
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    let data_dir = app_data::app_data_dir().ok_or(ConfigError::NoDataDir)?;
    let path = data_dir.join(CONFIG_FILENAME);
    let s = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    std::fs::write(&path, s).map_err(ConfigError::Write)
}

/// Set and persist the vector store directory, creating it if needed.
pub fn set_store_dir(path: &Path) -> Result<(), ConfigError> {
    std::fs::create_dir_all(path).map_err(ConfigError::Write)?;
    let path = path.canonicalize().map_err(ConfigError::Canonicalize)?;
    if !path.is_dir() {
        return Err(ConfigError::NotADirectory(path));
    }
    let mut config = load_file_config();
    config.store_dir = Some(path.to_string_lossy().into_owned());
    save_config(&config)
}

/// Set and persist the LLM model used for answer synthesis.
pub fn set_llm_model(model: &str) -> Result<(), ConfigError> {
    let mut config = load_file_config();
    config.llm_model = Some(model.trim().to_string()).filter(|m| !m.is_empty());
    save_config(&config)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("failed to resolve path: {0}")]
    Canonicalize(std::io::Error),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let config: Config = toml::from_str("llm_model = \"llama3.2\"\nmax_tokens = 200\n").unwrap();
        assert_eq!(config.llm_model.as_deref(), Some("llama3.2"));
        assert_eq!(config.max_tokens, 200);
        assert_eq!(config.overlap_tokens, DEFAULT_OVERLAP_TOKENS);
        assert_eq!(config.embed_model, DEFAULT_EMBED_MODEL);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config {
            store_dir: Some("/tmp/store".to_string()),
            ..Config::default()
        };
        let s = toml::to_string_pretty(&config).unwrap();
        assert_eq!(toml::from_str::<Config>(&s).unwrap(), config);
    }

    #[test]
    fn env_overrides_win_and_blank_is_ignored() {
        let config = Config::default().with_overrides(|key| match key {
            ENV_STORE_DIR => Some("/data/store".to_string()),
            ENV_LLM_MODEL => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.store_dir().unwrap(), PathBuf::from("/data/store"));
        assert_eq!(config.llm_model, None);
        assert_eq!(config.ollama_url, DEFAULT_BASE_URL);
    }
}
