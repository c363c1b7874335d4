//! Daemon and CLI configuration.
//!
//! `AtlasConfig` is read from TOML (`$XDG_CONFIG_HOME/skill-atlas/config.toml`
//! or an explicit `--config` path). Every field carries a serde default so a
//! partial file, or no file at all, still yields a usable configuration.
//! Environment variables are layered on top with [`AtlasConfig::apply_env`].

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or saving configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file: {path}")]
    #[diagnostic(
        code(atlas::config::read),
        help("Check that the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    #[diagnostic(
        code(atlas::config::parse),
        help("The config file must be valid TOML. Run `atlas config` to print a working example.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config file: {path}")]
    #[diagnostic(
        code(atlas::config::write),
        help("Check permissions on the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for {key}: \"{value}\"")]
    #[diagnostic(
        code(atlas::config::invalid_value),
        help("{expected}")
    )]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Complete configuration for the daemon and CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtlasConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pocketbase: PocketBaseConfig,
    #[serde(default)]
    pub tracks: TracksConfig,
    #[serde(default)]
    pub highlight: HighlightConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Mount point for every route, e.g. `/atlas`. Empty means the root.
    #[serde(default)]
    pub url_prefix: String,
    /// Shared secret required in `x-api-key` by `/api/agent/*`. Unset disables the check.
    #[serde(default)]
    pub agent_api_key: Option<String>,
}

fn default_bind() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            url_prefix: String::new(),
            agent_api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// JSON catalog replacing the bundled roadmap.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
}

fn default_max_hops() -> usize {
    10
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            catalog: None,
            max_hops: default_max_hops(),
        }
    }
}

/// Remote agent (AgentCore) and fallback chain settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Upper bound on a single strategy in the fallback chain, retries included.
    #[serde(default = "default_strategy_timeout")]
    pub strategy_timeout_secs: u64,
}

fn default_api_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_strategy_timeout() -> u64 {
    120
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            api_key: None,
            api_timeout_secs: default_api_timeout(),
            max_retries: default_max_retries(),
            strategy_timeout_secs: default_strategy_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ollama base URL. Unset runs the local agent on templates alone.
    #[serde(default)]
    pub ollama_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "llama3.2".into()
}

fn default_llm_timeout() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            ollama_url: None,
            model: default_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PocketBaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracksConfig {
    /// Salt prepended to the skill sequence before hashing.
    #[serde(default = "default_secret")]
    pub secret: String,
}

fn default_secret() -> String {
    "skill-atlas".into()
}

impl Default for TracksConfig {
    fn default() -> Self {
        Self {
            secret: default_secret(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightConfig {
    #[serde(default = "default_highlight_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_highlight_step")]
    pub step_ms: u64,
}

fn default_highlight_attempts() -> u32 {
    3
}

fn default_highlight_step() -> u64 {
    1000
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_highlight_attempts(),
            step_ms: default_highlight_step(),
        }
    }
}

impl AtlasConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Load from a TOML file, or return defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn parse(content: &str, origin: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: "<memory>".into(),
            message: e.to_string(),
        })
    }

    /// Overlay environment variables read through `lookup`.
    ///
    /// Empty values are ignored so `FOO=` in a `.env` file does not blank a
    /// configured setting.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("ATLAS_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = get("ATLAS_PORT") {
            self.server.port = parse_number("ATLAS_PORT", &v)?;
        }
        if let Some(v) = get("URL_PREFIX") {
            self.server.url_prefix = v;
        }
        if let Some(v) = get("AGENT_API_KEY") {
            self.server.agent_api_key = Some(v);
        }
        if let Some(v) = get("SKILL_CATALOG") {
            self.graph.catalog = Some(PathBuf::from(v));
        }
        if let Some(v) = get("AGENTCORE_URL") {
            self.agent.remote_url = Some(v);
        }
        if let Some(v) = get("AGENTCORE_API_KEY") {
            self.agent.api_key = Some(v);
        }
        if let Some(v) = get("API_TIMEOUT") {
            self.agent.api_timeout_secs = parse_number("API_TIMEOUT", &v)?;
        }
        if let Some(v) = get("MAX_RETRIES") {
            self.agent.max_retries = parse_number("MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("OLLAMA_URL") {
            self.llm.ollama_url = Some(v);
        }
        if let Some(v) = get("MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("POCKETBASE_URL") {
            self.pocketbase.url = Some(v);
        }
        if let Some(v) = get("POCKETBASE_EMAIL") {
            self.pocketbase.admin_email = Some(v);
        }
        if let Some(v) = get("POCKETBASE_PASSWORD") {
            self.pocketbase.admin_password = Some(v);
        }
        if let Some(v) = get("SECRET") {
            self.tracks.secret = v;
        }

        self.server.url_prefix = normalize_prefix(&self.server.url_prefix);
        Ok(())
    }

    /// Load the file (if present) and overlay the process environment.
    pub fn resolve(path: &Path) -> ConfigResult<Self> {
        let mut config = Self::load_or_default(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Socket address string for the daemon listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: "Expected a non-negative integer.".into(),
        })
}

/// Normalise a mount prefix to `/segment` form: leading slash, no trailing slash.
/// A bare `/` collapses to the empty prefix.
pub fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| {
            vars.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AtlasConfig::default();
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.agent.api_timeout_secs, 30);
        assert_eq!(cfg.agent.max_retries, 3);
        assert_eq!(cfg.graph.max_hops, 10);
        assert_eq!(cfg.highlight.max_attempts, 3);
        assert!(cfg.agent.remote_url.is_none());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg = AtlasConfig::parse("[server]\nport = 9100\n", "inline").unwrap();
        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.server.bind, "0.0.0.0");
        assert_eq!(cfg.llm.model, "llama3.2");
    }

    #[test]
    fn config_roundtrip_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        let mut cfg = AtlasConfig::default();
        cfg.agent.remote_url = Some("http://agent:8080".into());
        cfg.tracks.secret = "pepper".into();
        cfg.save(&path).unwrap();

        let loaded = AtlasConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = AtlasConfig::load_or_default(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, AtlasConfig::default());
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = AtlasConfig::default();
        cfg.apply_env(lookup(&[
            ("ATLAS_PORT", "9000"),
            ("AGENTCORE_URL", "http://agentcore:8080"),
            ("API_TIMEOUT", "5"),
            ("MAX_RETRIES", "1"),
            ("URL_PREFIX", "atlas/"),
            ("SECRET", "s3cret"),
            ("POCKETBASE_URL", ""),
        ]))
        .unwrap();

        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.agent.remote_url.as_deref(), Some("http://agentcore:8080"));
        assert_eq!(cfg.agent.api_timeout_secs, 5);
        assert_eq!(cfg.agent.max_retries, 1);
        assert_eq!(cfg.server.url_prefix, "/atlas");
        assert_eq!(cfg.tracks.secret, "s3cret");
        assert!(cfg.pocketbase.url.is_none());
    }

    #[test]
    fn bad_number_is_reported() {
        let mut cfg = AtlasConfig::default();
        let err = cfg
            .apply_env(lookup(&[("ATLAS_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "ATLAS_PORT"));
    }

    #[test]
    fn prefix_normalisation() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix("/atlas/"), "/atlas");
        assert_eq!(normalize_prefix("learn/app"), "/learn/app");
    }
}
