//! Read-only classification of SQL text.

use crate::error::GuardError;
use regex::Regex;
use std::sync::LazyLock;

/// Keywords that mark a statement as a write, DDL, privilege or transaction statement.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "CREATE", "DROP", "ALTER", "MERGE", "TRUNCATE", "GRANT",
    "REVOKE", "EXECUTE", "BEGIN", "COMMIT", "ROLLBACK",
];

/// Rejection reason reported for any denylist match.
pub const READ_ONLY_VIOLATION: &str = "Only READ operations are allowed";

static FORBIDDEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = FORBIDDEN_KEYWORDS.join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).expect("keyword pattern is valid")
});

/// Outcome of classifying a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Safe,
    Rejected(String),
}

impl Classification {
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Safe)
    }
}

/// Gatekeeper for user-supplied SQL.
#[derive(Debug, Clone, Default)]
pub struct SqlGuard;

impl SqlGuard {
    pub fn new() -> Self {
        Self
    }

    /// Classify a statement against the keyword denylist.
    ///
    /// Matching is case-insensitive and bound to whole words, so identifiers
    /// such as `updated_at` or `is_deleted` do not trigger a rejection.
    pub fn classify(&self, sql: &str) -> Classification {
        match FORBIDDEN_PATTERN.find(sql) {
            Some(m) => {
                tracing::debug!(keyword = %m.as_str(), "SQL rejected by read-only policy");
                Classification::Rejected(READ_ONLY_VIOLATION.to_string())
            }
            None => Classification::Safe,
        }
    }

    /// Like [`SqlGuard::classify`], as a `Result`.
    pub fn check_read_only(&self, sql: &str) -> Result<(), GuardError> {
        match self.classify(sql) {
            Classification::Safe => Ok(()),
            Classification::Rejected(reason) => Err(GuardError::Rejected { reason }),
        }
    }
}
