//! Credential normalization.
//!
//! Raw credential material arrives in one of three forms:
//!
//! | Source | Handling |
//! |--------|----------|
//! | key file path | resolved to an absolute path, checked, parsed as JSON |
//! | inline JSON | parsed directly |
//! | base64 JSON | strict base64 decode, then parsed |
//!
//! Whatever the form, the result is a single [`Identity`] or a [`CredentialError`].
//! Nothing here talks to the network, and secret material is kept in
//! [`SecretString`] so it never reaches `Debug` output or logs.

use crate::project::ProjectId;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, error};

static PEM_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)-----BEGIN [A-Z0-9 ]+-----(.*?)-----END [A-Z0-9 ]+-----")
        .expect("PEM pattern is valid")
});

const SERVICE_ACCOUNT_TYPE: &str = "service_account";

/// Errors raised while normalizing credentials.
///
/// Messages name paths and reasons only, never credential content.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("key file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("key file path is not a file: {}", path.display())]
    NotAFile { path: PathBuf },

    #[error("permission denied accessing key file: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("failed to read key file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed credentials: {0}")]
    MalformedCredentials(String),
}

/// Raw, unvalidated credential material as collected from configuration.
#[derive(Debug, Default)]
pub struct RawCredentials {
    /// Path to a service account key file.
    pub key_file: Option<PathBuf>,
    /// Inline JSON or base64-encoded JSON.
    pub inline_json: Option<SecretString>,
}

/// Which kind of credentials an [`Identity`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    Default,
    KeyFilePath,
    InlineJson,
}

/// A validated service account key.
#[derive(Debug)]
pub struct ServiceAccountKey {
    /// `project_id` field of the key.
    pub project_id: String,
    /// `client_email` field of the key, if present.
    pub client_email: Option<String>,
    /// The full key document with `private_key` newlines normalized.
    document: SecretString,
}

impl ServiceAccountKey {
    /// The normalized JSON key document.
    pub fn document(&self) -> &SecretString {
        &self.document
    }
}

/// Normalized credential material.
#[derive(Debug)]
pub enum Credentials {
    /// Application default credentials.
    Default,
    /// Absolute path to a readable service account key file.
    KeyFile { path: PathBuf },
    /// Inline service account key.
    InlineJson(ServiceAccountKey),
}

/// The identity the warehouse client is built from.
///
/// Built once at startup and never mutated.
#[derive(Debug)]
pub struct Identity {
    project_id: ProjectId,
    credentials: Credentials,
}

impl Identity {
    /// An identity using application default credentials.
    pub fn default_auth(project_id: ProjectId) -> Self {
        Self {
            project_id,
            credentials: Credentials::Default,
        }
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn kind(&self) -> IdentityKind {
        match self.credentials {
            Credentials::Default => IdentityKind::Default,
            Credentials::KeyFile { .. } => IdentityKind::KeyFilePath,
            Credentials::InlineJson(_) => IdentityKind::InlineJson,
        }
    }
}

/// Turns [`RawCredentials`] into an [`Identity`].
pub struct CredentialNormalizer;

impl CredentialNormalizer {
    /// Normalize raw credential material.
    ///
    /// An explicit key file overrides inline JSON; with neither, the identity
    /// uses application default credentials. Malformed explicit credentials
    /// are always an error.
    pub fn normalize(
        project_id: ProjectId,
        raw: RawCredentials,
    ) -> Result<Identity, CredentialError> {
        let credentials = if let Some(path) = raw.key_file {
            let path = Self::check_key_file(&path)?;
            debug!(path = %path.display(), "Validated service account key file");
            Credentials::KeyFile { path }
        } else if let Some(inline) = raw.inline_json {
            let key = Self::parse_inline(inline.expose_secret())?;
            debug!(key_project = %key.project_id, "Validated inline service account credentials");
            Credentials::InlineJson(key)
        } else {
            Credentials::Default
        };

        Ok(Identity {
            project_id,
            credentials,
        })
    }

    /// Resolve a key file path and check it exists, is a file, is readable
    /// and holds a service account key.
    pub fn check_key_file(path: &Path) -> Result<PathBuf, CredentialError> {
        let absolute = std::path::absolute(path).map_err(|source| CredentialError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if !absolute.exists() {
            return Err(CredentialError::FileNotFound { path: absolute });
        }
        if !absolute.is_file() {
            return Err(CredentialError::NotAFile { path: absolute });
        }

        let resolved = fs::canonicalize(&absolute).map_err(|source| CredentialError::Io {
            path: absolute.clone(),
            source,
        })?;

        let content = fs::read_to_string(&resolved).map_err(|source| match source.kind() {
            io::ErrorKind::PermissionDenied => CredentialError::PermissionDenied {
                path: resolved.clone(),
            },
            _ => CredentialError::Io {
                path: resolved.clone(),
                source,
            },
        })?;

        let document: Value = serde_json::from_str(&content).map_err(|_| {
            error!(path = %resolved.display(), "Service account key file is not valid JSON");
            CredentialError::MalformedCredentials(
                "service account key file is not valid JSON".to_string(),
            )
        })?;

        Self::check_service_account_shape(&document).map_err(|_| {
            CredentialError::MalformedCredentials(
                "invalid service account key file format".to_string(),
            )
        })?;

        Ok(resolved)
    }

    /// Parse inline credentials: JSON first, then base64-encoded JSON.
    pub fn parse_inline(raw: &str) -> Result<ServiceAccountKey, CredentialError> {
        let document = Self::decode_inline(raw).ok_or_else(|| {
            error!("Inline credentials are neither JSON nor base64-encoded JSON");
            CredentialError::MalformedCredentials(
                "credentials are neither valid JSON nor base64-encoded JSON".to_string(),
            )
        })?;

        let mut object = match document {
            Value::Object(object) => object,
            _ => {
                return Err(CredentialError::MalformedCredentials(
                    "credentials must be a JSON object".to_string(),
                ));
            }
        };

        let project_id = Self::check_service_account_shape_map(&object)?;

        let private_key = object
            .get("private_key")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                error!("Inline credentials have no private_key");
                CredentialError::MalformedCredentials("missing private_key".to_string())
            })?;
        let private_key = normalize_private_key(private_key).ok_or_else(|| {
            error!("Inline credentials private_key is not PEM formatted");
            CredentialError::MalformedCredentials(
                "private_key is not a PEM formatted key".to_string(),
            )
        })?;
        object.insert("private_key".to_string(), Value::String(private_key));

        let client_email = object
            .get("client_email")
            .and_then(Value::as_str)
            .map(str::to_string);

        let document = serde_json::to_string(&Value::Object(object)).map_err(|e| {
            CredentialError::MalformedCredentials(format!("cannot re-encode credentials: {e}"))
        })?;

        Ok(ServiceAccountKey {
            project_id,
            client_email,
            document: SecretString::new(document),
        })
    }

    fn decode_inline(raw: &str) -> Option<Value> {
        if let Ok(value) = serde_json::from_str::<Value>(raw) {
            return Some(value);
        }

        let bytes = STANDARD.decode(raw.trim()).ok()?;
        let text = String::from_utf8(bytes).ok()?;
        serde_json::from_str(&text).ok()
    }

    fn check_service_account_shape(document: &Value) -> Result<String, CredentialError> {
        match document {
            Value::Object(object) => Self::check_service_account_shape_map(object),
            _ => Err(CredentialError::MalformedCredentials(
                "credentials must be a JSON object".to_string(),
            )),
        }
    }

    fn check_service_account_shape_map(
        object: &Map<String, Value>,
    ) -> Result<String, CredentialError> {
        let is_service_account =
            object.get("type").and_then(Value::as_str) == Some(SERVICE_ACCOUNT_TYPE);
        let project_id = object
            .get("project_id")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty());

        match (is_service_account, project_id) {
            (true, Some(project_id)) => Ok(project_id.to_string()),
            _ => Err(CredentialError::MalformedCredentials(
                "invalid service account credentials format".to_string(),
            )),
        }
    }
}

/// Replace escaped `\n` sequences with real line breaks and check the PEM
/// structure: a begin marker, an end marker, and at least one line break
/// between them.
fn normalize_private_key(key: &str) -> Option<String> {
    let normalized = key.replace("\\n", "\n");
    let captures = PEM_BLOCK.captures(&normalized)?;
    let body = captures.get(1)?.as_str();
    if !body.contains('\n') {
        return None;
    }
    Some(normalized)
}
