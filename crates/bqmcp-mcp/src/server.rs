//! MCP server implementation.
//!
//! [`McpServer`] is the single dispatcher behind every transport. It holds no
//! per-request state; the warehouse handle and the active project are shared
//! read-only by all in-flight requests.

use crate::error::McpError;
use crate::http_transport::HttpServer;
use crate::protocol::*;
use crate::resource::{RESOURCE_MIME_TYPE, ResourceAddress};
use crate::tools::{QUERY_TOOL, QueryArguments, query_tool};
use bqmcp_core::config::{McpConfig, Transport};
use bqmcp_core::{ProjectId, QueryJob, SchemaField, TableRef, Warehouse};
use bqmcp_guard::{SqlGuard, mentions_information_schema};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Name announced in `serverInfo`.
pub const SERVER_NAME: &str = "mcp-server/bigquery";

/// Upper bound on warehouse calls in flight while building `resources/list`.
pub const LISTING_CONCURRENCY: usize = 16;

/// The supported methods, with their decoded parameters.
#[derive(Debug, Clone)]
pub enum McpMethod {
    Initialize,
    ResourcesList,
    ResourcesRead(ReadResourceParams),
    ToolsList,
    ToolsCall(CallToolParams),
}

impl McpMethod {
    /// Resolve a method name and decode its parameters.
    pub fn parse(method: &str, params: Option<Value>) -> Result<Self, McpError> {
        match method {
            "initialize" => Ok(Self::Initialize),
            "resources/list" => Ok(Self::ResourcesList),
            "resources/read" => decode_params(params, "uri").map(Self::ResourcesRead),
            "tools/list" => Ok(Self::ToolsList),
            "tools/call" => decode_params(params, "name").map(Self::ToolsCall),
            _ => Err(McpError::MethodNotFound {
                method: method.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::ResourcesList => "resources/list",
            Self::ResourcesRead(_) => "resources/read",
            Self::ToolsList => "tools/list",
            Self::ToolsCall(_) => "tools/call",
        }
    }
}

fn decode_params<T: serde::de::DeserializeOwned>(
    params: Option<Value>,
    required: &str,
) -> Result<T, McpError> {
    let params = params.ok_or_else(|| McpError::InvalidParams(format!("{required} is required")))?;
    serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))
}

/// The MCP server.
#[derive(Clone)]
pub struct McpServer {
    warehouse: Arc<dyn Warehouse>,
    project_id: ProjectId,
    location: String,
    guard: SqlGuard,
}

impl McpServer {
    /// Create a server for the given warehouse, project and job location.
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        project_id: ProjectId,
        location: impl Into<String>,
    ) -> Self {
        Self {
            warehouse,
            project_id,
            location: location.into(),
            guard: SqlGuard::new(),
        }
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    /// Start the transport selected in the configuration.
    pub async fn run(&self, config: &McpConfig) -> Result<(), McpError> {
        match config.transport {
            Transport::Stdio => self.run_stdio().await,
            Transport::Http => HttpServer::new(self.clone(), config.bind_address()).run().await,
        }
    }

    /// Serve newline-delimited JSON-RPC on stdin/stdout until EOF.
    pub async fn run_stdio(&self) -> Result<(), McpError> {
        info!(
            project_id = %self.project_id,
            location = %self.location,
            "Starting MCP server with stdio transport"
        );
        self.run_lines(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await?;
        info!("stdin closed, MCP server stopping");
        Ok(())
    }

    /// Serve newline-delimited JSON-RPC from `reader` to `writer` until EOF.
    ///
    /// Every line is dispatched on its own task and a single writer task owns
    /// `writer`, so responses may come out in any order. Notifications produce no
    /// output. Returns once every pending response has been written.
    pub async fn run_lines<R, W>(&self, reader: R, writer: W) -> Result<(), McpError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (response_tx, mut response_rx) = mpsc::channel::<JsonRpcResponse>(64);

        let writer = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(response) = response_rx.recv().await {
                let mut line = serde_json::to_vec(&response)?;
                line.push(b'\n');
                writer.write_all(&line).await?;
                writer.flush().await?;
            }
            Ok::<_, McpError>(())
        });

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let server = self.clone();
            let response_tx = response_tx.clone();
            tokio::spawn(async move {
                let response = match Self::decode_message(&line) {
                    Ok(request) if request.is_notification() => {
                        debug!(method = %request.method, "Notification received");
                        return;
                    }
                    Ok(request) => server.handle_request(request).await,
                    Err(response) => response,
                };
                if response_tx.send(response).await.is_err() {
                    warn!("Response writer closed, dropping response");
                }
            });
        }

        drop(response_tx);
        writer
            .await
            .map_err(|e| McpError::StartupFailed(format!("response writer failed: {e}")))?
    }

    /// Decode raw envelope text into a request.
    ///
    /// Text that is not JSON yields a `-32700` response with a null id; JSON that is
    /// not a valid request yields `-32600`, echoing the id when one can be read.
    pub fn decode_message(text: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
        let value: Value = serde_json::from_str(text).map_err(|e| {
            warn!(error = %e, "Unparseable JSON-RPC message");
            JsonRpcResponse::failure(None, McpError::Parse(e.to_string()).to_rpc_error())
        })?;

        let id = value.get("id").filter(|id| !id.is_null()).cloned();

        let request: JsonRpcRequest = serde_json::from_value(value).map_err(|e| {
            warn!(error = %e, "Invalid JSON-RPC request");
            JsonRpcResponse::failure(
                id.clone(),
                McpError::InvalidRequest(e.to_string()).to_rpc_error(),
            )
        })?;

        if request.jsonrpc != JSONRPC_VERSION {
            let err = McpError::InvalidRequest(format!(
                "unsupported jsonrpc version '{}'",
                request.jsonrpc
            ));
            return Err(JsonRpcResponse::failure(id, err.to_rpc_error()));
        }

        Ok(request)
    }

    /// Decode and dispatch raw envelope text.
    pub async fn handle_message(&self, text: &str) -> JsonRpcResponse {
        match Self::decode_message(text) {
            Ok(request) => self.handle_request(request).await,
            Err(response) => response,
        }
    }

    /// Handle a JSON-RPC request.
    ///
    /// Never fails: every error becomes an error envelope echoing the request id.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        debug!(method = %request.method, id = ?id, "Dispatching request");

        match self.dispatch(request).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => {
                if err.is_client_error() {
                    warn!(id = ?id, error = %err, "Request rejected");
                } else {
                    error!(id = ?id, error = %err, "Request failed");
                }
                JsonRpcResponse::failure(id, err.to_rpc_error())
            }
        }
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> Result<Value, McpError> {
        match McpMethod::parse(&request.method, request.params)? {
            McpMethod::Initialize => Ok(self.handle_initialize()),
            McpMethod::ResourcesList => self.handle_list_resources().await,
            McpMethod::ResourcesRead(params) => self.handle_read_resource(params).await,
            McpMethod::ToolsList => Ok(self.handle_list_tools()),
            McpMethod::ToolsCall(params) => self.handle_call_tool(params).await,
        }
    }

    fn handle_initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "resources": {
                    "subscribe": false,
                    "listChanged": false
                },
                "tools": {},
                "prompts": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    async fn handle_list_resources(&self) -> Result<Value, McpError> {
        let datasets = self.warehouse.list_datasets().await?;

        let tables: Vec<TableRef> = stream::iter(datasets.iter().cloned())
            .map(|dataset| async move { self.warehouse.list_tables(&dataset).await })
            .buffered(LISTING_CONCURRENCY)
            .try_collect::<Vec<_>>()
            .await?
            .into_iter()
            .flatten()
            .collect();

        let metadata = stream::iter(tables.iter().cloned())
            .map(|table| async move { self.warehouse.get_table_metadata(&table).await })
            .buffered(LISTING_CONCURRENCY)
            .try_collect::<Vec<_>>()
            .await?;

        let resources: Vec<ResourceDescriptor> = tables
            .iter()
            .zip(metadata)
            .map(|(table, meta)| ResourceDescriptor {
                uri: ResourceAddress::new(
                    self.project_id.as_str(),
                    &table.dataset_id,
                    &table.table_id,
                )
                .encode(),
                mime_type: RESOURCE_MIME_TYPE.to_string(),
                name: format!("\"{}\" {} schema", table, meta.kind.resource_label()),
            })
            .collect();

        debug!(
            datasets = datasets.len(),
            resources = resources.len(),
            "Listed resources"
        );
        Ok(json!({ "resources": resources }))
    }

    async fn handle_read_resource(&self, params: ReadResourceParams) -> Result<Value, McpError> {
        let address = ResourceAddress::decode(&params.uri)?;
        if address.project_id != self.project_id.as_str() {
            debug!(
                requested = %address.project_id,
                active = %self.project_id,
                "Resource project differs from active project"
            );
        }

        let table = TableRef::new(address.dataset_id, address.table_id);
        let metadata = self.warehouse.get_table_metadata(&table).await?;

        let columns: Vec<Value> = metadata.fields.iter().map(column_summary).collect();
        let contents = ResourceContents {
            uri: params.uri,
            mime_type: RESOURCE_MIME_TYPE.to_string(),
            text: serde_json::to_string_pretty(&columns)?,
        };

        Ok(json!({ "contents": [contents] }))
    }

    fn handle_list_tools(&self) -> Value {
        json!({ "tools": [query_tool()] })
    }

    async fn handle_call_tool(&self, params: CallToolParams) -> Result<Value, McpError> {
        if params.name != QUERY_TOOL {
            return Err(McpError::UnknownTool { name: params.name });
        }

        let arguments = QueryArguments::from_value(&params.arguments)?;

        self.guard.check_read_only(&arguments.sql)?;
        let sql = if mentions_information_schema(&arguments.sql) {
            self.guard
                .qualify_information_schema(&arguments.sql, self.project_id.as_str())?
        } else {
            arguments.sql
        };

        let job = QueryJob {
            sql,
            location: self.location.clone(),
            maximum_bytes_billed: arguments.maximum_bytes_billed,
        };
        let rows = self.warehouse.submit_query(&job).await?;
        info!(rows = rows.len(), "Query completed");

        let content = ToolContent::Text {
            text: serde_json::to_string_pretty(&rows)?,
        };
        Ok(json!({ "content": [content] }))
    }
}

fn column_summary(field: &SchemaField) -> Value {
    json!({
        "name": field.name,
        "type": field.field_type,
        "mode": field.mode.as_deref().unwrap_or("NULLABLE"),
        "description": field.description,
    })
}
