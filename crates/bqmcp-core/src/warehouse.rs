//! The warehouse collaborator contract.
//!
//! The MCP dispatcher only ever talks to a [`Warehouse`]; the BigQuery client
//! lives in `bqmcp-adapter-bq`. Implementations must be safe to call from many
//! in-flight requests at once.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// One result row, keyed by column name.
pub type Row = Map<String, Value>;

/// Errors reported by a warehouse implementation.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// The warehouse rejected or failed the call (network, quota, SQL error...).
    #[error("{0}")]
    Upstream(String),

    /// The client could not be constructed.
    #[error("failed to initialize warehouse client: {0}")]
    Connect(String),

    /// The warehouse answered with something we could not interpret.
    #[error("unexpected warehouse response: {0}")]
    Decode(String),
}

/// A dataset reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    pub dataset_id: String,
}

impl DatasetRef {
    pub fn new(dataset_id: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
        }
    }
}

/// A table or view reference within the active project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub dataset_id: String,
    pub table_id: String,
}

impl TableRef {
    pub fn new(dataset_id: impl Into<String>, table_id: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dataset_id, self.table_id)
    }
}

/// Kind of a warehouse table object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableKind {
    Table,
    View,
    /// Anything else the warehouse reports (materialized views, snapshots, external tables).
    Other(String),
}

impl TableKind {
    /// Map the warehouse's table type string.
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "TABLE" => Self::Table,
            "VIEW" => Self::View,
            other => Self::Other(other.to_string()),
        }
    }

    /// Resource label: `view` for views, `table` for everything else.
    pub fn resource_label(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Table | Self::Other(_) => "table",
        }
    }
}

/// A column in a table schema. RECORD columns carry nested `fields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<SchemaField>,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            mode: None,
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_fields(mut self, fields: Vec<SchemaField>) -> Self {
        self.fields = fields;
        self
    }

    pub fn is_repeated(&self) -> bool {
        self.mode.as_deref() == Some("REPEATED")
    }
}

/// Metadata for one table or view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    pub kind: TableKind,
    pub fields: Vec<SchemaField>,
}

/// A query submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryJob {
    pub sql: String,
    pub location: String,
    pub maximum_bytes_billed: i64,
}

/// Read-only access to an analytical warehouse.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// List the datasets of the active project.
    async fn list_datasets(&self) -> Result<Vec<DatasetRef>, WarehouseError>;

    /// List the tables and views of a dataset.
    async fn list_tables(&self, dataset: &DatasetRef) -> Result<Vec<TableRef>, WarehouseError>;

    /// Fetch type and schema of a table or view.
    async fn get_table_metadata(&self, table: &TableRef) -> Result<TableMetadata, WarehouseError>;

    /// Run a query and wait for it to finish.
    async fn submit_query(&self, job: &QueryJob) -> Result<Vec<Row>, WarehouseError>;
}
