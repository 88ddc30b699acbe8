//! Console configuration: classification codes, orchestration switches and
//! table defaults. Every member has a serde default, so an empty document is a
//! valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dsl::parser::{parse_source, SourceFormat};
use crate::error::{ConsoleError, ConsoleResult};
use crate::response::{ResponseValidator, DEFAULT_AUTH_ERROR_KEYS};
use crate::table::PaginationStyle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub table: TableConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Error keys that classify an envelope as an authentication failure.
    #[serde(default = "default_auth_error_keys")]
    pub auth_error_keys: Vec<String>,
    /// Run independent groups of a graph concurrently.
    #[serde(default = "default_true")]
    pub parallel_groups: bool,
    /// Stop the whole run after an authentication failure.
    #[serde(default = "default_true")]
    pub halt_on_auth: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            auth_error_keys: default_auth_error_keys(),
            parallel_groups: true,
            halt_on_auth: true,
        }
    }
}

impl OrchestratorConfig {
    pub fn validator(&self) -> ResponseValidator {
        ResponseValidator::new(self.auth_error_keys.iter().cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default)]
    pub pagination_style: PaginationStyle,
    /// Rendered for a cell whose column path is missing from the row.
    #[serde(default = "default_missing_sentinel")]
    pub missing_sentinel: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            pagination_style: PaginationStyle::default(),
            missing_sentinel: default_missing_sentinel(),
        }
    }
}

fn default_auth_error_keys() -> Vec<String> {
    DEFAULT_AUTH_ERROR_KEYS.iter().map(|k| k.to_string()).collect()
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> usize {
    10
}

fn default_missing_sentinel() -> String {
    "N/A".to_string()
}

impl ConsoleConfig {
    pub fn from_str(content: &str, format: SourceFormat) -> ConsoleResult<Self> {
        let config: ConsoleConfig = parse_source(content, format)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; the format follows the extension.
    pub fn load(path: impl AsRef<Path>) -> ConsoleResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content, SourceFormat::from_path(path))
    }

    pub fn validate(&self) -> ConsoleResult<()> {
        if self.table.default_page_size == 0 {
            return Err(ConsoleError::InvalidConfig(
                "table.default_page_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = ConsoleConfig::from_str("{}", SourceFormat::Json).unwrap();
        assert_eq!(config, ConsoleConfig::default());
        assert_eq!(config.table.missing_sentinel, "N/A");
        assert!(config.orchestrator.parallel_groups);
    }

    #[test]
    fn test_toml_config() {
        let config = ConsoleConfig::from_str(
            r#"
[orchestrator]
auth_error_keys = ["AUTH"]
parallel_groups = false

[table]
default_page_size = 25
pagination_style = "snake"
"#,
            SourceFormat::Toml,
        )
        .unwrap();
        assert_eq!(config.orchestrator.auth_error_keys, vec!["AUTH"]);
        assert!(!config.orchestrator.parallel_groups);
        assert!(config.orchestrator.halt_on_auth);
        assert_eq!(config.table.default_page_size, 25);
        assert_eq!(config.table.pagination_style, PaginationStyle::Snake);
        assert!(config.orchestrator.validator().is_auth_key("AUTH"));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let err = ConsoleConfig::from_str(r#"{"table": {"default_page_size": 0}}"#, SourceFormat::Json)
            .unwrap_err();
        assert!(matches!(err, ConsoleError::InvalidConfig(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConsoleConfig::load("/nonexistent/console.json").unwrap_err();
        assert!(matches!(err, ConsoleError::Io(_)));
    }
}
