//! Deployment configuration shared by the rule writer, thumbnail proxy and search client.
//!
//! Read once at startup from the deployment's `kurec.yml`, then overridden from
//! `KUREC_*` environment variables. Keys this crate does not use (tuners, log
//! flags, index settings) are ignored. Components receive the value explicitly.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Prefix used when none is configured
pub const DEFAULT_PREFIX: &str = "kurec";

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "KUREC_CONFIG_PATH";

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "kurec.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub url: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeilisearchConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub epg: MeilisearchIndexConfig,
}

impl Default for MeilisearchConfig {
    fn default() -> Self {
        Self {
            url: "http://meilisearch:7700".to_string(),
            api_key: None,
            epg: MeilisearchIndexConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeilisearchIndexConfig {
    /// Base name of the program index; the deployment prefix is prepended
    pub index_base_name: String,
}

impl Default for MeilisearchIndexConfig {
    fn default() -> Self {
        Self {
            index_base_name: "epg".to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KurecConfig {
    pub prefix: String,
    pub nats: NatsConfig,
    pub meilisearch: MeilisearchConfig,
}

impl Default for KurecConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            nats: NatsConfig::default(),
            meilisearch: MeilisearchConfig::default(),
        }
    }
}

impl KurecConfig {
    /// Loads from `KUREC_CONFIG_PATH` (or `./kurec.yml`) and applies env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Reads a YAML file; a missing or empty file gives the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overrides fields from `KUREC_PREFIX`, `KUREC_NATS_URL`,
    /// `KUREC_MEILISEARCH_URL` and `KUREC_MEILISEARCH_API_KEY`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(prefix) = lookup("KUREC_PREFIX") {
            self.prefix = prefix;
        }
        if let Some(url) = lookup("KUREC_NATS_URL") {
            self.nats.url = url;
        }
        if let Some(url) = lookup("KUREC_MEILISEARCH_URL") {
            self.meilisearch.url = url;
        }
        if let Some(key) = lookup("KUREC_MEILISEARCH_API_KEY") {
            self.meilisearch.api_key = Some(key).filter(|k| !k.is_empty());
        }
    }

    /// Configured prefix; blank counts as unset.
    pub fn prefix(&self) -> &str {
        let trimmed = self.prefix.trim();
        if trimmed.is_empty() {
            DEFAULT_PREFIX
        } else {
            trimmed
        }
    }

    /// Bucket holding the search-based recording rules.
    pub fn rule_bucket(&self) -> String {
        format!("{}-meilisearch-rules", self.prefix())
    }

    pub fn individual_rule_bucket(&self) -> String {
        format!("{}-individual-rules", self.prefix())
    }

    /// Bucket holding thumbnail images keyed by URL hash.
    pub fn ogp_bucket(&self) -> String {
        format!("{}-ogp", self.prefix())
    }

    pub fn epg_index(&self) -> String {
        format!("{}-{}", self.prefix(), self.meilisearch.epg.index_base_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = KurecConfig::default();
        assert_eq!(config.prefix(), "kurec");
        assert_eq!(config.rule_bucket(), "kurec-meilisearch-rules");
        assert_eq!(config.individual_rule_bucket(), "kurec-individual-rules");
        assert_eq!(config.ogp_bucket(), "kurec-ogp");
        assert_eq!(config.epg_index(), "kurec-epg");
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.meilisearch.url, "http://meilisearch:7700");
        assert!(config.meilisearch.api_key.is_none());
    }

    #[test]
    fn test_blank_prefix_falls_back() {
        let config = KurecConfig {
            prefix: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(config.rule_bucket(), "kurec-meilisearch-rules");
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "prefix: home\nnats:\n  url: nats://nats:4222").unwrap();

        let config = KurecConfig::from_file(file.path()).unwrap();
        assert_eq!(config.prefix(), "home");
        assert_eq!(config.rule_bucket(), "home-meilisearch-rules");
        assert_eq!(config.nats.url, "nats://nats:4222");
        assert_eq!(config.meilisearch, MeilisearchConfig::default());
    }

    #[test]
    fn test_deployment_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"prefix: home
color_log: true
json_log: false
tuners:
  mirakc: http://mirakc:40772
nats:
  url: nats://nats:4222
meilisearch:
  url: http://meilisearch:7700
  api_key: masterKey
  epg:
    index_base_name: programs
    primary_key: program_id
    filterable_attributes: ["ジャンル", "放送局"]
"#
        )
        .unwrap();

        let config = KurecConfig::from_file(file.path()).unwrap();
        assert_eq!(config.rule_bucket(), "home-meilisearch-rules");
        assert_eq!(config.ogp_bucket(), "home-ogp");
        assert_eq!(config.epg_index(), "home-programs");
        assert_eq!(config.meilisearch.api_key.as_deref(), Some("masterKey"));
        assert_eq!(config.nats.url, "nats://nats:4222");
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = KurecConfig::from_file(file.path()).unwrap();
        assert_eq!(config, KurecConfig::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = KurecConfig::from_file(&dir.path().join("absent.yml")).unwrap();
        assert_eq!(config, KurecConfig::default());
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "prefix: [unclosed").unwrap();
        let err = KurecConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("KUREC_PREFIX", "dev"),
            ("KUREC_MEILISEARCH_URL", "http://localhost:7700"),
            ("KUREC_MEILISEARCH_API_KEY", "secret"),
        ]
        .into_iter()
        .collect();

        let mut config = KurecConfig::default();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(config.ogp_bucket(), "dev-ogp");
        assert_eq!(config.epg_index(), "dev-epg");
        assert_eq!(config.meilisearch.url, "http://localhost:7700");
        assert_eq!(config.meilisearch.api_key.as_deref(), Some("secret"));
        assert_eq!(config.nats.url, "nats://localhost:4222");
    }
}
