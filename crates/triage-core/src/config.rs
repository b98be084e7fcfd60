//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `triage.toml` + `triage.<env>.toml` + `TRIAGE_*` env
//! vars (`__` separates sections, e.g. `TRIAGE_RETRIEVAL__TOP_K=8`). Every
//! field has a default, so an empty environment yields a usable [`Settings`].

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{Fusion, RetrievalMode};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("triage.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("triage.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("triage.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("triage.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("TRIAGE_").split("__"));

        tracing::debug!(env = %env_name, "configuration sources merged");
        Ok(Self { figment })
    }

    /// Build from an explicit figment, defaults underneath.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment) }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub retrieval: RetrievalSettings,
    pub store: StoreSettings,
    pub embedding: EmbeddingSettings,
    pub data: DataSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be greater than zero".into()));
        }
        if self.retrieval.rrf_k <= 0.0 || !self.retrieval.rrf_k.is_finite() {
            return Err(Error::InvalidConfig("retrieval.rrf_k must be a positive number".into()));
        }
        if self.retrieval.prefetch_limit < self.retrieval.top_k {
            return Err(Error::InvalidConfig(format!(
                "retrieval.prefetch_limit ({}) must be at least top_k ({})",
                self.retrieval.prefetch_limit, self.retrieval.top_k
            )));
        }
        if self.store.dense_dim == 0 {
            return Err(Error::InvalidConfig("store.dense_dim must be greater than zero".into()));
        }
        if self.llm.timeout_secs == 0 || self.store.timeout_secs == 0 {
            return Err(Error::InvalidConfig("timeouts must be at least one second".into()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(Error::InvalidConfig("llm.model must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Name of the env var holding the API key; the key itself never lives in config.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4.1-mini".to_string(),
            temperature: 0.3,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub fusion: Fusion,
    pub mode: RetrievalMode,
    /// RRF constant for the in-memory store. Qdrant fuses with its own.
    pub rrf_k: f32,
    /// Candidates fetched per signal before fusion (server-side backends).
    pub prefetch_limit: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            fusion: Fusion::RankSum,
            mode: RetrievalMode::Hybrid,
            rrf_k: 60.0,
            prefetch_limit: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Qdrant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub qdrant_url: String,
    pub collection: String,
    pub dense_dim: usize,
    pub timeout_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            qdrant_url: "http://localhost:6334".to_string(),
            collection: "feedbacks_and_bugs".to_string(),
            dense_dim: 1024,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: Option<String>,
    pub use_fake: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub feedback_file: String,
    pub bug_file: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            feedback_file: "ai_test_user_feedback.txt".to_string(),
            bug_file: "ai_test_bug_report.txt".to_string(),
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Config::from_figment(Figment::new()).settings().unwrap();
        assert_eq!(settings.retrieval.top_k, 5);
        assert_eq!(settings.retrieval.fusion, Fusion::RankSum);
        assert_eq!(settings.store.collection, "feedbacks_and_bugs");
        assert_eq!(settings.llm.model, "gpt-4.1-mini");
    }

    #[test]
    fn toml_overrides_merge_over_defaults() {
        let toml = r#"
            [retrieval]
            top_k = 8
            fusion = "rrf"

            [store]
            backend = "qdrant"
        "#;
        let config = Config::from_figment(Figment::from(Toml::string(toml)));
        let settings = config.settings().unwrap();
        assert_eq!(settings.retrieval.top_k, 8);
        assert_eq!(settings.retrieval.fusion, Fusion::ReciprocalRank);
        assert_eq!(settings.store.backend, StoreBackend::Qdrant);
        // untouched section keeps its defaults
        assert_eq!(settings.llm.timeout_secs, 60);
        assert_eq!(config.get::<usize>("retrieval.top_k").unwrap(), 8);
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let config = Config::from_figment(Figment::from(Toml::string("[retrieval]\ntop_k = 0")));
        assert!(matches!(config.settings(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn prefetch_below_top_k_is_rejected() {
        let toml = "[retrieval]\ntop_k = 10\nprefetch_limit = 4";
        let config = Config::from_figment(Figment::from(Toml::string(toml)));
        assert!(config.settings().is_err());
    }

    #[test]
    fn resolve_relative_against_base() {
        let base = Path::new("/srv/triage");
        assert_eq!(resolve_with_base(base, "data/a.txt"), PathBuf::from("/srv/triage/data/a.txt"));
        assert_eq!(resolve_with_base(base, "/abs/b.txt"), PathBuf::from("/abs/b.txt"));
    }
}
