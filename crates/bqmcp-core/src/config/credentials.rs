//! Credential source configuration.
//!
//! Two explicit sources are supported, in order of precedence:
//! 1. `key_file` - path to a service account key file
//! 2. `json_env` - environment variable holding the key as JSON or base64-encoded JSON
//!
//! When neither yields anything, application default credentials are used.

use crate::credentials::RawCredentials;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable read for inline credentials unless overridden.
pub const DEFAULT_CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS_JSON";

/// Where the warehouse credentials come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Path to a service account key file. Highest precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,

    /// Environment variable containing inline JSON (or base64 JSON) credentials.
    #[serde(default = "default_json_env")]
    pub json_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            key_file: None,
            json_env: default_json_env(),
        }
    }
}

impl CredentialsConfig {
    /// Collect the raw credential material from the configured sources.
    ///
    /// The environment variable is only consulted when no key file is set.
    pub fn raw_credentials(&self) -> RawCredentials {
        if let Some(path) = &self.key_file {
            return RawCredentials {
                key_file: Some(path.clone()),
                inline_json: None,
            };
        }

        let inline_json = std::env::var(&self.json_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::new);

        RawCredentials {
            key_file: None,
            inline_json,
        }
    }

    /// Resolve a relative `key_file` against the directory of the config file.
    pub(crate) fn resolve_relative_to(&mut self, base_dir: &Path) {
        if let Some(key_file) = &self.key_file
            && key_file.is_relative()
        {
            self.key_file = Some(base_dir.join(key_file));
        }
    }
}

fn default_json_env() -> String {
    DEFAULT_CREDENTIALS_ENV.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_key_file_wins_over_env() {
        let config = CredentialsConfig {
            key_file: Some(PathBuf::from("/keys/sa.json")),
            json_env: "BQMCP_TEST_CREDS_KEY_FILE_WINS".to_string(),
        };
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("BQMCP_TEST_CREDS_KEY_FILE_WINS", "{}") };

        let raw = config.raw_credentials();
        assert_eq!(raw.key_file, Some(PathBuf::from("/keys/sa.json")));
        assert!(raw.inline_json.is_none());
    }

    #[test]
    fn test_inline_from_env() {
        let config = CredentialsConfig {
            key_file: None,
            json_env: "BQMCP_TEST_CREDS_INLINE".to_string(),
        };
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("BQMCP_TEST_CREDS_INLINE", "{\"type\":\"service_account\"}") };

        let raw = config.raw_credentials();
        assert!(raw.key_file.is_none());
        assert_eq!(
            raw.inline_json.unwrap().expose_secret(),
            "{\"type\":\"service_account\"}"
        );
    }

    #[test]
    fn test_neither_source_is_default_auth() {
        let config = CredentialsConfig {
            key_file: None,
            json_env: "BQMCP_TEST_CREDS_UNSET".to_string(),
        };
        let raw = config.raw_credentials();
        assert!(raw.key_file.is_none());
        assert!(raw.inline_json.is_none());
    }

    #[test]
    fn test_relative_key_file_resolution() {
        let mut config = CredentialsConfig {
            key_file: Some(PathBuf::from("keys/sa.json")),
            ..Default::default()
        };
        config.resolve_relative_to(Path::new("/etc/bqmcp"));
        assert_eq!(config.key_file, Some(PathBuf::from("/etc/bqmcp/keys/sa.json")));
    }
}
