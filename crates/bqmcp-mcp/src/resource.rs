//! Resource addresses for table schemas.
//!
//! A table or view schema is addressed as
//! `bigquery://<project>/<dataset>/<table>/schema`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

/// URI scheme of schema resources.
pub const RESOURCE_SCHEME: &str = "bigquery";

/// Trailing path segment of every schema resource.
pub const SCHEMA_SEGMENT: &str = "schema";

/// MIME type reported for schema resources.
pub const RESOURCE_MIME_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceUriError {
    #[error("Invalid resource URI: {uri}")]
    InvalidResourceUri { uri: String },
}

impl ResourceUriError {
    fn invalid(uri: &str) -> Self {
        Self::InvalidResourceUri {
            uri: uri.to_string(),
        }
    }
}

/// A decoded schema resource URI.
///
/// The project is informational; lookups always use the running identity's project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceAddress {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl ResourceAddress {
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }

    /// Canonical URI form.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse a schema resource URI.
    ///
    /// The scheme must be `bigquery`, the host names the project, and the path
    /// must hold exactly three non-empty segments ending in `schema`. Segments
    /// are taken verbatim from the text, so identifiers with spaces or non-ASCII
    /// characters come back exactly as [`encode`](Self::encode) wrote them.
    pub fn decode(uri: &str) -> Result<Self, ResourceUriError> {
        let parsed = Url::parse(uri).map_err(|_| ResourceUriError::invalid(uri))?;

        if parsed.scheme() != RESOURCE_SCHEME
            || parsed.query().is_some()
            || parsed.fragment().is_some()
            || !parsed.username().is_empty()
            || parsed.port().is_some()
        {
            return Err(ResourceUriError::invalid(uri));
        }

        // Url percent-encodes paths of non-special schemes; read the raw text instead.
        let (_, rest) = uri
            .split_once("://")
            .ok_or_else(|| ResourceUriError::invalid(uri))?;
        let (project_id, path) = rest.split_once('/').unwrap_or((rest, ""));
        if project_id.is_empty() {
            return Err(ResourceUriError::invalid(uri));
        }

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        match segments.as_slice() {
            [dataset, table, last]
                if !dataset.is_empty() && !table.is_empty() && *last == SCHEMA_SEGMENT =>
            {
                Ok(Self::new(project_id, *dataset, *table))
            }
            _ => Err(ResourceUriError::invalid(uri)),
        }
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}/{}/{}/{}",
            RESOURCE_SCHEME, self.project_id, self.dataset_id, self.table_id, SCHEMA_SEGMENT
        )
    }
}

impl FromStr for ResourceAddress {
    type Err = ResourceUriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_canonical_form() {
        let address = ResourceAddress::new("my-proj", "sales", "orders");
        assert_eq!(address.encode(), "bigquery://my-proj/sales/orders/schema");
    }

    #[test]
    fn test_round_trip() {
        for (project, dataset, table) in [
            ("p", "ds", "tbl"),
            ("my-project-1", "analytics_2024", "events_20240101"),
            ("x9", "Mixed_Case", "v_daily"),
            ("p", "ds", "my table"),
            ("p", "ventes", "ventes_été"),
        ] {
            let address = ResourceAddress::new(project, dataset, table);
            let decoded = ResourceAddress::decode(&address.encode()).unwrap();
            assert_eq!(decoded, address);
        }
    }

    #[test]
    fn test_two_segments_rejected() {
        assert_eq!(
            ResourceAddress::decode("bigquery://p/ds/tbl"),
            Err(ResourceUriError::InvalidResourceUri {
                uri: "bigquery://p/ds/tbl".to_string()
            })
        );
    }

    #[test]
    fn test_wrong_trailing_segment_rejected() {
        assert!(ResourceAddress::decode("bigquery://p/ds/tbl/data").is_err());
        assert!(ResourceAddress::decode("bigquery://p/ds/tbl/SCHEMA").is_err());
    }

    #[test]
    fn test_too_many_segments_rejected() {
        assert!(ResourceAddress::decode("bigquery://p/ds/tbl/extra/schema").is_err());
    }

    #[test]
    fn test_empty_segments_rejected() {
        assert!(ResourceAddress::decode("bigquery://p//tbl/schema").is_err());
        assert!(ResourceAddress::decode("bigquery://p/ds//schema").is_err());
    }

    #[test]
    fn test_trailing_separator_is_trimmed() {
        let decoded = ResourceAddress::decode("bigquery://p/ds/tbl/schema/").unwrap();
        assert_eq!(decoded, ResourceAddress::new("p", "ds", "tbl"));
    }

    #[test]
    fn test_other_scheme_rejected() {
        assert!(ResourceAddress::decode("https://p/ds/tbl/schema").is_err());
        assert!(ResourceAddress::decode("postgres://p/ds/tbl/schema").is_err());
    }

    #[test]
    fn test_missing_project_rejected() {
        assert!(ResourceAddress::decode("bigquery:///ds/tbl/schema").is_err());
        assert!(ResourceAddress::decode("not a uri").is_err());
    }

    #[test]
    fn test_segments_are_not_percent_encoded() {
        let decoded = ResourceAddress::decode("bigquery://p/données/my table/schema").unwrap();
        assert_eq!(decoded.dataset_id, "données");
        assert_eq!(decoded.table_id, "my table");
    }

    #[test]
    fn test_userinfo_and_port_rejected() {
        assert!(ResourceAddress::decode("bigquery://user@p/ds/tbl/schema").is_err());
        assert!(ResourceAddress::decode("bigquery://p:8080/ds/tbl/schema").is_err());
    }

    #[test]
    fn test_from_str() {
        let address: ResourceAddress = "bigquery://p/ds/tbl/schema".parse().unwrap();
        assert_eq!(address.table_id, "tbl");
    }
}
