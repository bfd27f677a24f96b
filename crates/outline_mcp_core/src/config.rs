use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_USER_AGENT: &str = concat!("outline-mcp/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CONFIG_PATH: &str = ".outline-mcp/config.toml";

pub const ENV_BASE_URL: &str = "OUTLINE_BASE_URL";
pub const ENV_API_KEY: &str = "OUTLINE_API_KEY";
pub const ENV_USER_AGENT: &str = "OUTLINE_USER_AGENT";
pub const ENV_TIMEOUT_MS: &str = "OUTLINE_HTTP_TIMEOUT_MS";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct OutlineConfig {
    #[serde(default)]
    pub outline: OutlineSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct OutlineSection {
    pub base_url: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Everything the client needs, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl OutlineConfig {
    /// Resolve the base URL: env > config > DEFAULT_BASE_URL, trailing `/` trimmed.
    pub fn base_url_with(&self, lookup: &impl Fn(&str) -> Option<String>) -> String {
        let raw = non_blank_env(lookup, ENV_BASE_URL)
            .or_else(|| self.outline.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        normalize_base_url(&raw)
    }

    /// Resolve user agent: env > config > DEFAULT_USER_AGENT.
    pub fn user_agent_with(&self, lookup: &impl Fn(&str) -> Option<String>) -> String {
        non_blank_env(lookup, ENV_USER_AGENT)
            .or_else(|| self.outline.user_agent.clone())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    /// Resolve request timeout: env > config > DEFAULT_TIMEOUT_MS.
    pub fn timeout_with(&self, lookup: &impl Fn(&str) -> Option<String>) -> Duration {
        let millis = non_blank_env(lookup, ENV_TIMEOUT_MS)
            .and_then(|value| value.parse::<u64>().ok())
            .or(self.outline.timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        Duration::from_millis(millis)
    }
}

/// Load and parse the TOML config. Returns defaults if the file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<OutlineConfig> {
    if !config_path.exists() {
        return Ok(OutlineConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: OutlineConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

pub fn resolve_client_config(config: &OutlineConfig) -> Result<ClientConfig> {
    resolve_client_config_with(config, |key| env::var(key).ok())
}

/// Build the client configuration from a file config and a variable lookup.
/// The API key only ever comes from the lookup.
pub fn resolve_client_config_with(
    config: &OutlineConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ClientConfig> {
    let Some(api_key) = non_blank_env(&lookup, ENV_API_KEY) else {
        bail!("{ENV_API_KEY} environment variable is required");
    };
    Ok(ClientConfig {
        base_url: config.base_url_with(&lookup),
        api_key,
        user_agent: config.user_agent_with(&lookup),
        timeout: config.timeout_with(&lookup),
    })
}

pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn non_blank_env(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use tempfile::tempdir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn load_config_returns_default_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/config.toml")).expect("load config");
        assert_eq!(config, OutlineConfig::default());
    }

    #[test]
    fn load_config_parses_outline_section() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[outline]
base_url = "https://wiki.example.org/"
user_agent = "test-agent/1.0"
timeout_ms = 5000
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(
            config.outline.base_url.as_deref(),
            Some("https://wiki.example.org/")
        );
        assert_eq!(config.outline.user_agent.as_deref(), Some("test-agent/1.0"));
        assert_eq!(config.outline.timeout_ms, Some(5000));
    }

    #[test]
    fn load_config_tolerates_unrelated_sections() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[other]\nkey = \"value\"\n").expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert!(config.outline.base_url.is_none());
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[outline\nbase_url = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let error = resolve_client_config_with(&OutlineConfig::default(), lookup_from(&[]))
            .expect_err("must fail");
        assert!(error.to_string().contains("OUTLINE_API_KEY"));

        let blank = resolve_client_config_with(
            &OutlineConfig::default(),
            lookup_from(&[(ENV_API_KEY, "   ")]),
        );
        assert!(blank.is_err());
    }

    #[test]
    fn defaults_apply_when_nothing_is_configured() {
        let resolved = resolve_client_config_with(
            &OutlineConfig::default(),
            lookup_from(&[(ENV_API_KEY, "secret")]),
        )
        .expect("resolve");
        assert_eq!(resolved.base_url, DEFAULT_BASE_URL);
        assert_eq!(resolved.api_key, "secret");
        assert_eq!(resolved.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(resolved.timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
    }

    #[test]
    fn env_overrides_file_values() {
        let config = OutlineConfig {
            outline: OutlineSection {
                base_url: Some("https://file.example.org".to_string()),
                user_agent: Some("file-agent".to_string()),
                timeout_ms: Some(1000),
            },
        };

        let from_file =
            resolve_client_config_with(&config, lookup_from(&[(ENV_API_KEY, "k")])).expect("file");
        assert_eq!(from_file.base_url, "https://file.example.org");
        assert_eq!(from_file.user_agent, "file-agent");
        assert_eq!(from_file.timeout, Duration::from_millis(1000));

        let from_env = resolve_client_config_with(
            &config,
            lookup_from(&[
                (ENV_API_KEY, "k"),
                (ENV_BASE_URL, "https://env.example.org/"),
                (ENV_USER_AGENT, "env-agent"),
                (ENV_TIMEOUT_MS, "2500"),
            ]),
        )
        .expect("env");
        assert_eq!(from_env.base_url, "https://env.example.org");
        assert_eq!(from_env.user_agent, "env-agent");
        assert_eq!(from_env.timeout, Duration::from_millis(2500));
    }

    #[test]
    fn unparsable_timeout_falls_back() {
        let resolved = resolve_client_config_with(
            &OutlineConfig::default(),
            lookup_from(&[(ENV_API_KEY, "k"), (ENV_TIMEOUT_MS, "soon")]),
        )
        .expect("resolve");
        assert_eq!(resolved.timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
    }

    #[test]
    fn normalize_base_url_trims_trailing_slashes() {
        assert_eq!(
            normalize_base_url(" https://wiki.example.org// "),
            "https://wiki.example.org"
        );
    }
}
