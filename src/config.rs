//! Run configuration
//!
//! Defaults are compiled in; a TOML file passed with `--config` overrides
//! them section by section, and command-line flags override the file:
//!
//! ```toml
//! [format]
//! field_delimiter = "|"
//! token_delimiter = ","
//!
//! [pipeline]
//! parallel = true
//!
//! [encode]
//! code_type = "one_hot"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::compose::FeatureFormat;
use crate::encode::CodeType;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Extraction pipeline settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Extract sentences on a worker pool, keeping input order
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Tag encoding settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    pub code_type: CodeType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub format: FeatureFormat,
    pub pipeline: PipelineConfig,
    pub encode: EncodeConfig,
}

impl Config {
    /// Load a config file, falling back to defaults for missing keys
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Delimiters must be distinct and must not collide with the space that
    /// separates ids and encoded tokens
    pub fn validate(&self) -> Result<(), ConfigError> {
        let FeatureFormat {
            field_delimiter,
            token_delimiter,
        } = self.format;

        if field_delimiter == token_delimiter {
            return Err(ConfigError::Invalid(format!(
                "field and token delimiters are both {field_delimiter:?}"
            )));
        }
        if field_delimiter.is_whitespace() || token_delimiter.is_whitespace() {
            return Err(ConfigError::Invalid(
                "delimiters cannot be whitespace".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.format.field_delimiter, '|');
        assert_eq!(config.format.token_delimiter, ',');
        assert!(config.pipeline.parallel);
        assert_eq!(config.encode.code_type, CodeType::Dense);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml(
            r#"
            [format]
            token_delimiter = ";"

            [encode]
            code_type = "one_hot"
            "#,
        )
        .unwrap();

        assert_eq!(config.format.field_delimiter, '|');
        assert_eq!(config.format.token_delimiter, ';');
        assert!(config.pipeline.parallel);
        assert_eq!(config.encode.code_type, CodeType::OneHot);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            Config::from_toml("[encode]\ncode_type = \"sparse\"\n"),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            Config::from_toml("[format]\nfield_delimiter = \",\"\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml("[format]\ntoken_delimiter = \" \"\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synfeat.toml");
        fs::write(&path, "[pipeline]\nparallel = false\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert!(!config.pipeline.parallel);

        assert!(matches!(
            Config::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
