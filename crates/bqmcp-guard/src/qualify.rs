//! Qualification of `INFORMATION_SCHEMA` references.
//!
//! BigQuery resolves `dataset.INFORMATION_SCHEMA.<view>` against the job's
//! project, which is not necessarily the configured one. References found in a
//! `FROM` clause are rewritten to `` `project.dataset.INFORMATION_SCHEMA.<view>` ``.
//! A reference without a dataset prefix is ambiguous and rejected.
//!
//! Only the views listed in [`QUALIFIED_VIEWS`] are rewritten; references to
//! any other `INFORMATION_SCHEMA` view pass through unchanged.

use crate::classify::SqlGuard;
use crate::error::GuardError;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// `INFORMATION_SCHEMA` views that get qualified.
pub const QUALIFIED_VIEWS: &[&str] = &["TABLES"];

const INFORMATION_SCHEMA: &str = "INFORMATION_SCHEMA";

static FROM_INFORMATION_SCHEMA: LazyLock<Regex> = LazyLock::new(|| {
    let views = QUALIFIED_VIEWS.join("|");
    Regex::new(&format!(
        r"(?i)\bFROM\s+(?:(\w+)\.)?INFORMATION_SCHEMA\.({views})\b"
    ))
    .expect("INFORMATION_SCHEMA pattern is valid")
});

/// Case-insensitive check for an `INFORMATION_SCHEMA` mention anywhere in the text.
pub fn mentions_information_schema(sql: &str) -> bool {
    sql.to_ascii_uppercase().contains(INFORMATION_SCHEMA)
}

impl SqlGuard {
    /// Rewrite `FROM [dataset.]INFORMATION_SCHEMA.<view>` to a fully-qualified path.
    ///
    /// Statements that do not mention `INFORMATION_SCHEMA` are returned unchanged.
    pub fn qualify_information_schema(
        &self,
        sql: &str,
        project_id: &str,
    ) -> Result<String, GuardError> {
        if !mentions_information_schema(sql) {
            return Ok(sql.to_string());
        }

        if let Some(unqualified) = FROM_INFORMATION_SCHEMA
            .captures_iter(sql)
            .find(|caps| caps.get(1).is_none())
        {
            let view = unqualified[2].to_ascii_uppercase();
            tracing::debug!(view = %view, "INFORMATION_SCHEMA reference without dataset");
            return Err(GuardError::MissingDataset { view });
        }

        let rewritten = FROM_INFORMATION_SCHEMA.replace_all(sql, |caps: &Captures| {
            format!(
                "FROM `{}.{}.{}.{}`",
                project_id,
                &caps[1],
                INFORMATION_SCHEMA,
                caps[2].to_ascii_uppercase()
            )
        });

        Ok(rewritten.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn qualify(sql: &str) -> Result<String, GuardError> {
        SqlGuard::new().qualify_information_schema(sql, "proj")
    }

    #[test]
    fn test_dataset_prefix_is_qualified() {
        assert_eq!(
            qualify("SELECT * FROM ds.INFORMATION_SCHEMA.TABLES").unwrap(),
            "SELECT * FROM `proj.ds.INFORMATION_SCHEMA.TABLES`"
        );
    }

    #[test]
    fn test_missing_dataset_is_rejected() {
        assert_eq!(
            qualify("SELECT * FROM INFORMATION_SCHEMA.TABLES").unwrap_err(),
            GuardError::MissingDataset {
                view: "TABLES".to_string()
            }
        );
    }

    #[test]
    fn test_case_insensitive_match() {
        assert_eq!(
            qualify("select table_name from sales.information_schema.tables where x = 1").unwrap(),
            "select table_name FROM `proj.sales.INFORMATION_SCHEMA.TABLES` where x = 1"
        );
    }

    #[test]
    fn test_multiple_references() {
        let sql = "SELECT * FROM a.INFORMATION_SCHEMA.TABLES UNION ALL SELECT * FROM b.INFORMATION_SCHEMA.TABLES";
        assert_eq!(
            qualify(sql).unwrap(),
            "SELECT * FROM `proj.a.INFORMATION_SCHEMA.TABLES` UNION ALL SELECT * FROM `proj.b.INFORMATION_SCHEMA.TABLES`"
        );
    }

    #[test]
    fn test_one_unqualified_reference_rejects_statement() {
        let sql = "SELECT * FROM a.INFORMATION_SCHEMA.TABLES UNION ALL SELECT * FROM INFORMATION_SCHEMA.TABLES";
        assert!(matches!(
            qualify(sql),
            Err(GuardError::MissingDataset { .. })
        ));
    }

    #[test]
    fn test_other_views_pass_through() {
        let sql = "SELECT * FROM ds.INFORMATION_SCHEMA.COLUMNS";
        assert_eq!(qualify(sql).unwrap(), sql);

        let unqualified = "SELECT * FROM INFORMATION_SCHEMA.SCHEMATA";
        assert_eq!(qualify(unqualified).unwrap(), unqualified);
    }

    #[test]
    fn test_already_qualified_is_left_alone() {
        let sql = "SELECT * FROM `other.ds.INFORMATION_SCHEMA.TABLES`";
        assert_eq!(qualify(sql).unwrap(), sql);
    }

    #[test]
    fn test_no_mention_is_unchanged() {
        let sql = "SELECT * FROM ds.tables";
        assert_eq!(qualify(sql).unwrap(), sql);
    }

    #[test]
    fn test_mention_detection() {
        assert!(mentions_information_schema("select * from x.information_schema.tables"));
        assert!(!mentions_information_schema("select * from x.schema_info"));
    }
}
