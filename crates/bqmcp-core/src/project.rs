//! Validated Google Cloud project ids.

use crate::config::ConfigError;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static PROJECT_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("project id pattern is valid"));

/// A project id that matches `^[a-z0-9-]+$`.
///
/// Construction goes through [`ProjectId::parse`], so holding a `ProjectId`
/// means the format check already passed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectId(String);

impl ProjectId {
    /// Validate and wrap a project id.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        if PROJECT_ID_PATTERN.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(ConfigError::InvalidProjectId(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_lowercase_digits_and_dashes() {
        let id = ProjectId::parse("my-project-42").unwrap();
        assert_eq!(id.as_str(), "my-project-42");
        assert_eq!(id.to_string(), "my-project-42");
    }

    #[test]
    fn test_rejects_uppercase() {
        let err = ProjectId::parse("My-Project").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProjectId(ref id) if id == "My-Project"));
    }

    #[test]
    fn test_rejects_empty_and_punctuation() {
        assert!(ProjectId::parse("").is_err());
        assert!(ProjectId::parse("proj.ds").is_err());
        assert!(ProjectId::parse("proj_1").is_err());
        assert!(ProjectId::parse("proj/1").is_err());
    }
}
