//! # bqmcp-adapter-bq
//!
//! BigQuery implementation of [`bqmcp_core::Warehouse`] over the REST API.
//!
//! The client is built from a normalized [`Identity`]:
//!
//! | Credentials        | Client construction                          |
//! |--------------------|----------------------------------------------|
//! | default            | application default credentials              |
//! | key file           | service-account key file                     |
//! | inline JSON/base64 | service-account key parsed from the document |

mod rows;
mod wire;

use async_trait::async_trait;
use bqmcp_core::{
    Credentials, DatasetRef, Identity, ProjectId, QueryJob, Row, TableKind, TableMetadata,
    TableRef, Warehouse, WarehouseError,
};
use gcp_bigquery_client::Client;
use gcp_bigquery_client::client_builder::ClientBuilder;
use gcp_bigquery_client::model::get_query_results_parameters::GetQueryResultsParameters;
use gcp_bigquery_client::model::query_request::QueryRequest;
use gcp_bigquery_client::yup_oauth2::parse_service_account_key;
use gcp_bigquery_client::{dataset, table};
use secrecy::ExposeSecret;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use rows::decode_row;

use wire::{DatasetPage, QueryPage, TablePage, TableResource, reread};

/// Delay between `getQueryResults` polls while a job is running.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// [`Warehouse`] backed by a BigQuery project.
#[derive(Clone)]
pub struct BigQueryWarehouse {
    client: Client,
    project_id: ProjectId,
}

impl BigQueryWarehouse {
    /// Build a client for the identity's project and credentials.
    pub async fn from_identity(identity: &Identity) -> Result<Self, WarehouseError> {
        let builder = ClientBuilder::new();
        let client = match identity.credentials() {
            Credentials::Default => builder.build_from_application_default_credentials().await,
            Credentials::KeyFile { path } => {
                builder
                    .build_from_service_account_key_file(&path.to_string_lossy())
                    .await
            }
            Credentials::InlineJson(key) => {
                let sa_key = parse_service_account_key(key.document().expose_secret())
                    .map_err(|e| WarehouseError::Connect(e.to_string()))?;
                builder.build_from_service_account_key(sa_key, false).await
            }
        }
        .map_err(|e| WarehouseError::Connect(e.to_string()))?;

        info!(
            project_id = %identity.project_id(),
            credentials = ?identity.kind(),
            "BigQuery client ready"
        );

        Ok(Self {
            client,
            project_id: identity.project_id().clone(),
        })
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    async fn query_results_page(
        &self,
        job_id: &str,
        location: Option<String>,
        page_token: Option<String>,
    ) -> Result<QueryPage, WarehouseError> {
        let params = GetQueryResultsParameters {
            location,
            page_token,
            ..Default::default()
        };
        let response = self
            .client
            .job()
            .get_query_results(self.project_id.as_str(), job_id, params)
            .await
            .map_err(upstream)?;
        reread(&response)
    }
}

fn upstream(err: impl std::fmt::Display) -> WarehouseError {
    WarehouseError::Upstream(err.to_string())
}

fn job_failed(page: &QueryPage) -> Result<(), WarehouseError> {
    if let Some(message) = page.terminal_error() {
        return Err(WarehouseError::Upstream(message));
    }
    if let Some(message) = page.error_message() {
        warn!(message = %message, "Query job reported an error while running");
    }
    Ok(())
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn list_datasets(&self) -> Result<Vec<DatasetRef>, WarehouseError> {
        let mut datasets = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut options = dataset::ListOptions::default();
            if let Some(token) = page_token.take() {
                options = options.page_token(token);
            }

            let response = self
                .client
                .dataset()
                .list(self.project_id.as_str(), options)
                .await
                .map_err(upstream)?;
            let page: DatasetPage = reread(&response)?;

            datasets.extend(
                page.datasets
                    .unwrap_or_default()
                    .into_iter()
                    .map(|d| DatasetRef::new(d.dataset_reference.dataset_id)),
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(count = datasets.len(), "Listed datasets");
        Ok(datasets)
    }

    async fn list_tables(&self, dataset_ref: &DatasetRef) -> Result<Vec<TableRef>, WarehouseError> {
        let mut tables = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut options = table::ListOptions::default();
            if let Some(token) = page_token.take() {
                options = options.page_token(token);
            }

            let response = self
                .client
                .table()
                .list(self.project_id.as_str(), &dataset_ref.dataset_id, options)
                .await
                .map_err(upstream)?;
            let page: TablePage = reread(&response)?;

            tables.extend(page.tables.unwrap_or_default().into_iter().map(|t| {
                TableRef::new(t.table_reference.dataset_id, t.table_reference.table_id)
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(dataset = %dataset_ref.dataset_id, count = tables.len(), "Listed tables");
        Ok(tables)
    }

    async fn get_table_metadata(&self, table_ref: &TableRef) -> Result<TableMetadata, WarehouseError> {
        let response = self
            .client
            .table()
            .get(
                self.project_id.as_str(),
                &table_ref.dataset_id,
                &table_ref.table_id,
                None,
            )
            .await
            .map_err(upstream)?;
        let resource: TableResource = reread(&response)?;

        Ok(TableMetadata {
            kind: TableKind::from_type_name(resource.table_type.as_deref().unwrap_or("TABLE")),
            fields: resource.schema.unwrap_or_default().into_fields(),
        })
    }

    async fn submit_query(&self, job: &QueryJob) -> Result<Vec<Row>, WarehouseError> {
        let mut request = QueryRequest::new(job.sql.clone());
        request.location = Some(job.location.clone());
        request.maximum_bytes_billed = Some(job.maximum_bytes_billed.to_string());
        request.use_legacy_sql = false;

        let response = self
            .client
            .job()
            .query(self.project_id.as_str(), request)
            .await
            .map_err(upstream)?;
        let mut page: QueryPage = reread(&response)?;
        job_failed(&page)?;

        let reference = page.job_reference.take().unwrap_or_default();
        let location = reference.location.or_else(|| Some(job.location.clone()));

        if !page.is_complete() {
            let job_id = reference
                .job_id
                .clone()
                .ok_or_else(|| WarehouseError::Decode("incomplete job without job id".to_string()))?;

            debug!(job_id = %job_id, "Waiting for query job");
            while !page.is_complete() {
                tokio::time::sleep(POLL_INTERVAL).await;
                page = self
                    .query_results_page(&job_id, location.clone(), None)
                    .await?;
                job_failed(&page)?;
            }
        }

        let schema = page.schema.take().unwrap_or_default().into_fields();
        let mut rows = Vec::new();

        loop {
            for raw in page.rows.take().unwrap_or_default() {
                rows.push(decode_row(&schema, &raw)?);
            }

            let Some(token) = page.page_token.take().filter(|t| !t.is_empty()) else {
                break;
            };
            let job_id = reference
                .job_id
                .as_deref()
                .ok_or_else(|| WarehouseError::Decode("paged result without job id".to_string()))?;
            page = self
                .query_results_page(job_id, location.clone(), Some(token))
                .await?;
            job_failed(&page)?;
        }

        debug!(rows = rows.len(), "Query finished");
        Ok(rows)
    }
}
