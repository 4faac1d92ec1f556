//! Engine configuration
//!
//! Read once at process start. The same document shape is accepted as YAML,
//! TOML or JSON:
//!
//! ```yaml
//! fallback:
//!   id: fallback
//!   path: themes/fallback
//! hooks:
//!   timeout_ms: 2000
//! store:
//!   kind: directory
//!   path: /var/lib/mosaic/themes
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    error::{Result, ThemeError},
    types::FallbackTheme,
};

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Theme used whenever no registered theme is active
    pub fallback: FallbackTheme,
    pub hooks: HookSettings,
    pub store: StoreConfig,
}

/// Hook execution settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookSettings {
    /// Upper bound for a single hook call; unbounded when unset
    pub timeout_ms: Option<u64>,
}

impl HookSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Where theme records are persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Process-local, lost on restart
    #[default]
    Memory,
    /// One JSON document per theme under `path`
    Directory { path: PathBuf },
}

impl EngineConfig {
    /// Load configuration from a `.yaml`/`.yml`, `.toml` or `.json` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = DocumentFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        let config: Self = format.parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = DocumentFormat::Yaml.parse(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = DocumentFormat::Toml.parse(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.fallback.id.as_str().is_empty() {
            return Err(ThemeError::validation("fallback.id", "fallback theme id cannot be empty"));
        }
        if self.hooks.timeout_ms == Some(0) {
            return Err(ThemeError::validation(
                "hooks.timeout_ms",
                "hook timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Serialization format of a configuration or manifest document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DocumentFormat {
    Yaml,
    Toml,
    Json,
}

impl DocumentFormat {
    /// Pick the format from the file extension
    pub(crate) fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            _ => Err(ThemeError::validation(
                path.display().to_string(),
                "expected a .yaml, .yml, .toml or .json file",
            )),
        }
    }

    pub(crate) fn parse<T: DeserializeOwned>(self, content: &str) -> Result<T> {
        Ok(match self {
            Self::Yaml => serde_yaml::from_str(content)?,
            Self::Toml => toml::from_str(content)?,
            Self::Json => serde_json::from_str(content)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.fallback.name, "fallback");
        assert_eq!(config.hooks.timeout(), None);
        assert_eq!(config.store, StoreConfig::Memory);
    }

    #[test]
    fn test_yaml_config() {
        let config = EngineConfig::from_yaml_str(
            r#"
fallback:
  id: base
  path: themes/base
  components:
    - category: layout
      name: Page
      entry: page.html
hooks:
  timeout_ms: 250
store:
  kind: directory
  path: /tmp/themes
"#,
        )
        .unwrap();

        assert_eq!(config.fallback.id.as_str(), "base");
        assert_eq!(config.fallback.name, "fallback");
        assert_eq!(config.fallback.components.len(), 1);
        assert_eq!(config.hooks.timeout(), Some(Duration::from_millis(250)));
        assert_eq!(
            config.store,
            StoreConfig::Directory {
                path: PathBuf::from("/tmp/themes")
            }
        );
    }

    #[test]
    fn test_toml_config() {
        let config = EngineConfig::from_toml_str(
            r#"
[fallback]
id = "base"
name = "classic"
path = "themes/base"

[store]
kind = "memory"
"#,
        )
        .unwrap();

        assert_eq!(config.fallback.name, "classic");
        assert_eq!(config.store, StoreConfig::Memory);
        assert_eq!(config.hooks.timeout_ms, None);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = EngineConfig::from_yaml_str("hooks:\n  timeout_ms: 0\n").unwrap_err();
        assert!(matches!(err, ThemeError::Validation { ref path, .. } if path == "hooks.timeout_ms"));
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{"hooks": {{"timeout_ms": 10}}}}"#).unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.hooks.timeout_ms, Some(10));

        let other = dir.path().join("engine.ini");
        std::fs::write(&other, "").unwrap();
        assert!(matches!(
            EngineConfig::from_file(&other),
            Err(ThemeError::Validation { .. })
        ));
    }
}
