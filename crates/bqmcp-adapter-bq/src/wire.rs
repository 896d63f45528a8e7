//! REST response shapes read by the adapter.
//!
//! Client responses are re-read through these structs in their camelCase REST
//! form. Only the fields the adapter uses are declared.

use bqmcp_core::{SchemaField, WarehouseError};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Re-read a client model value through one of the structs below.
pub(crate) fn reread<S: Serialize, D: DeserializeOwned>(value: &S) -> Result<D, WarehouseError> {
    serde_json::to_value(value)
        .and_then(serde_json::from_value)
        .map_err(|e| WarehouseError::Decode(e.to_string()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DatasetPage {
    #[serde(default)]
    pub datasets: Option<Vec<DatasetEntry>>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DatasetEntry {
    pub dataset_reference: DatasetReference,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DatasetReference {
    pub dataset_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TablePage {
    #[serde(default)]
    pub tables: Option<Vec<TableEntry>>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TableEntry {
    pub table_reference: TableReference,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TableReference {
    pub dataset_id: String,
    pub table_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TableResource {
    #[serde(default, rename = "type")]
    pub table_type: Option<String>,
    #[serde(default)]
    pub schema: Option<WireSchema>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireSchema {
    #[serde(default)]
    pub fields: Option<Vec<WireField>>,
}

impl WireSchema {
    pub fn into_fields(self) -> Vec<SchemaField> {
        self.fields
            .unwrap_or_default()
            .into_iter()
            .map(WireField::into_schema_field)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<WireField>>,
}

impl WireField {
    fn into_schema_field(self) -> SchemaField {
        SchemaField {
            name: self.name,
            field_type: self.field_type.to_ascii_uppercase(),
            mode: self.mode,
            description: self.description,
            fields: self
                .fields
                .unwrap_or_default()
                .into_iter()
                .map(WireField::into_schema_field)
                .collect(),
        }
    }
}

/// Shared shape of `jobs.query` and `jobs.getQueryResults` responses.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryPage {
    #[serde(default)]
    pub job_complete: Option<bool>,
    #[serde(default)]
    pub job_reference: Option<JobReference>,
    #[serde(default)]
    pub schema: Option<WireSchema>,
    #[serde(default)]
    pub rows: Option<Vec<Value>>,
    #[serde(default)]
    pub page_token: Option<String>,
    #[serde(default)]
    pub errors: Option<Vec<ErrorProto>>,
}

impl QueryPage {
    pub fn is_complete(&self) -> bool {
        self.job_complete.unwrap_or(false)
    }

    /// Error that ended the job.
    ///
    /// `errors` may carry warnings while the job is still running; they only
    /// count once the job reports completion.
    pub fn terminal_error(&self) -> Option<String> {
        if self.is_complete() {
            self.error_message()
        } else {
            None
        }
    }

    /// First reported job error, if any.
    pub fn error_message(&self) -> Option<String> {
        self.errors
            .as_ref()?
            .iter()
            .find_map(|e| e.message.clone().or_else(|| e.reason.clone()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobReference {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorProto {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}
