//! Configuration types for the bqmcp server.
//!
//! Configuration is loaded from an optional YAML file (`bqmcp.yaml`) and then
//! overridden by command-line flags in the binary.
//!
//! ```yaml
//! project_id: my-project
//! location: US
//! credentials:
//!   key_file: ./key.json
//! mcp:
//!   transport: http
//!   port: 8000
//! ```

pub mod credentials;
pub mod mcp;

use crate::project::ProjectId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use credentials::{CredentialsConfig, DEFAULT_CREDENTIALS_ENV};
pub use mcp::{McpConfig, Transport};

/// Complete server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Google Cloud project the warehouse client runs against.
    #[serde(default)]
    pub project_id: Option<String>,

    /// Location/region queries are submitted to.
    #[serde(default = "default_location")]
    pub location: String,

    /// Credential sources.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Transport settings.
    #[serde(default)]
    pub mcp: McpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: default_location(),
            credentials: CredentialsConfig::default(),
            mcp: McpConfig::default(),
        }
    }
}

fn default_location() -> String {
    "US".to_string()
}

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("missing project id: pass --project-id or set GOOGLE_CLOUD_PROJECT")]
    MissingProjectId,

    #[error("invalid project ID format: {0:?}")]
    InvalidProjectId(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ServerConfig {
    /// Load configuration from a YAML file.
    ///
    /// A relative `credentials.key_file` is resolved against the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;

        if let Some(base_dir) = path.parent() {
            config.credentials.resolve_relative_to(base_dir);
        }

        Ok(config)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Check the merged configuration and return the validated project id.
    pub fn validate(&self) -> Result<ProjectId, ConfigError> {
        let project_id = self
            .project_id
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(ConfigError::MissingProjectId)?;

        if self.location.trim().is_empty() {
            return Err(ConfigError::Config("location must not be empty".to_string()));
        }

        ProjectId::parse(project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config = ServerConfig::from_yaml("{}").unwrap();
        assert_eq!(config.location, "US");
        assert!(config.project_id.is_none());
        assert!(!config.mcp.is_http());
        assert_eq!(config.credentials.json_env, DEFAULT_CREDENTIALS_ENV);
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
project_id: analytics-prod
location: EU
credentials:
  key_file: /keys/sa.json
mcp:
  transport: http
  host: 0.0.0.0
  port: 9000
"#;
        let config = ServerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.project_id.as_deref(), Some("analytics-prod"));
        assert_eq!(config.location, "EU");
        assert_eq!(
            config.credentials.key_file,
            Some(PathBuf::from("/keys/sa.json"))
        );
        assert_eq!(config.mcp.bind_address(), "0.0.0.0:9000");
    }

    #[test]
    fn test_from_file_resolves_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bqmcp.yaml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "project_id: p\ncredentials:\n  key_file: sa.json").unwrap();

        let config = ServerConfig::from_file(&path).unwrap();
        assert_eq!(config.credentials.key_file, Some(dir.path().join("sa.json")));
    }

    #[test]
    fn test_validate_requires_project_id() {
        let config = ServerConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingProjectId)
        ));
    }

    #[test]
    fn test_validate_rejects_uppercase_project_id() {
        let config = ServerConfig {
            project_id: Some("BadProject".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProjectId(_))
        ));
    }

    #[test]
    fn test_validate_ok() {
        let config = ServerConfig {
            project_id: Some("good-project".to_string()),
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap().as_str(), "good-project");
    }
}
