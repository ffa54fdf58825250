//! docstruct configuration management.

use anyhow::{Context, Result};
use clap::ValueEnum;
use doc_structure::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable chapter listing and findings
    #[default]
    Summary,
    /// Structure and validation report as JSON
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocstructConfig {
    /// Output format used when --format is not given
    #[serde(default)]
    pub format: OutputFormat,

    /// Engine settings: the [parse], [scoring] and [validation] tables
    #[serde(flatten)]
    pub engine: EngineConfig,
}

impl DocstructConfig {
    /// Get the config file path: ~/.config/cli-programs/docstruct.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("cli-programs")
            .join("docstruct.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load an explicitly named config file, which must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: DocstructConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Save config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_structure::ErrorHandlingStrategy;

    #[test]
    fn test_default_config() {
        let config = DocstructConfig::default();
        assert_eq!(config.format, OutputFormat::Summary);
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_config_path() {
        let path = DocstructConfig::config_path();
        assert!(path.is_ok());
        let path = path.unwrap();
        assert!(path.ends_with("cli-programs/docstruct.toml"));
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
format = "json"

[parse]
chapter_header_levels = [2, 3]
error_handling_strategy = "strict"
words_per_minute = 180.0

[validation]
min_chapter_words = 50
"#;
        let config: DocstructConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.engine.parse.chapter_header_levels, vec![2, 3]);
        assert_eq!(
            config.engine.parse.error_handling_strategy,
            ErrorHandlingStrategy::Strict
        );
        assert_eq!(config.engine.parse.words_per_minute, 180.0);
        assert_eq!(config.engine.validation.min_chapter_words, 50);
    }

    #[test]
    fn test_parse_empty_config() {
        let config: DocstructConfig = toml::from_str("").unwrap();
        assert_eq!(config, DocstructConfig::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("docstruct.toml");

        let mut config = DocstructConfig::default();
        config.format = OutputFormat::Json;
        config.engine.parse.include_tables = true;
        config.save_to(&path).unwrap();

        let loaded = DocstructConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DocstructConfig::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
