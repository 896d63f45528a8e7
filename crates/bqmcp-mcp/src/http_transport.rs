//! HTTP transport for MCP server.
//!
//! JSON-RPC over plain HTTP, batched HTTP, WebSocket and an SSE stream. Every
//! route hands envelopes to the shared [`McpServer`].

use crate::error::McpError;
use crate::protocol::JsonRpcResponse;
use crate::server::McpServer;
use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{
        IntoResponse, Response, Sse,
        sse::{Event, KeepAlive},
    },
    routing::{get, post},
};
use futures::future::join_all;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use std::convert::Infallible;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Body of `POST /mcp/batch`.
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub requests: Vec<Value>,
}

/// Create the HTTP router for MCP.
pub fn create_router(server: McpServer) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp_post))
        .route("/mcp/batch", post(handle_mcp_batch))
        .route("/mcp/ws", get(handle_mcp_ws))
        .route("/mcp/stream", get(handle_mcp_stream))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(server)
}

/// Handle POST requests to /mcp (one JSON-RPC envelope).
///
/// The body is taken as text so that malformed JSON still gets a `-32700` envelope.
async fn handle_mcp_post(State(server): State<McpServer>, body: String) -> Json<JsonRpcResponse> {
    Json(server.handle_message(&body).await)
}

/// Handle POST requests to /mcp/batch.
async fn handle_mcp_batch(
    State(server): State<McpServer>,
    Json(batch): Json<BatchRequest>,
) -> Response {
    if batch.requests.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": "requests must contain at least one item"})),
        )
            .into_response();
    }

    debug!(count = batch.requests.len(), "Handling batch");
    let responses = join_all(
        batch
            .requests
            .iter()
            .map(|request| dispatch_value(&server, request)),
    )
    .await;

    Json(responses).into_response()
}

async fn dispatch_value(server: &McpServer, value: &Value) -> JsonRpcResponse {
    match serde_json::to_string(value) {
        Ok(text) => server.handle_message(&text).await,
        Err(e) => JsonRpcResponse::failure(None, McpError::Serialization(e).to_rpc_error()),
    }
}

/// Handle GET requests to /mcp/ws (WebSocket upgrade).
async fn handle_mcp_ws(ws: WebSocketUpgrade, State(server): State<McpServer>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, server))
}

/// One text frame in, one text frame out, until the client closes.
async fn handle_socket(mut socket: WebSocket, server: McpServer) {
    info!("WebSocket client connected");

    while let Some(msg) = socket.recv().await {
        match msg {
            Ok(Message::Text(text)) => {
                let response = server.handle_message(text.as_str()).await;
                let json = match serde_json::to_string(&response) {
                    Ok(j) => j,
                    Err(e) => {
                        error!("Failed to serialize response: {}", e);
                        continue;
                    }
                };

                if let Err(e) = socket.send(Message::Text(json.into())).await {
                    error!("Failed to send response: {}", e);
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client closed connection");
                break;
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    info!("WebSocket client disconnected");
}

/// Handle GET requests to /mcp/stream (SSE).
async fn handle_mcp_stream() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let connected = stream::once(async {
        Ok::<_, Infallible>(
            Event::default()
                .event("connected")
                .data(json!({"message": "Stream connected"}).to_string()),
        )
    });

    Sse::new(connected.chain(stream::pending())).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

/// Handle health check requests.
async fn handle_health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "server": "mcp-bigquery",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// HTTP server for MCP transport.
pub struct HttpServer {
    server: McpServer,
    bind_address: String,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(server: McpServer, bind_address: impl Into<String>) -> Self {
        Self {
            server,
            bind_address: bind_address.into(),
        }
    }

    /// Run the HTTP server.
    pub async fn run(self) -> Result<(), McpError> {
        let app = create_router(self.server);

        let listener = tokio::net::TcpListener::bind(&self.bind_address)
            .await
            .map_err(|e| {
                McpError::StartupFailed(format!("Failed to bind to {}: {}", self.bind_address, e))
            })?;

        info!(address = %self.bind_address, "MCP HTTP server listening");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use bqmcp_core::{
        DatasetRef, ProjectId, QueryJob, Row, TableMetadata, TableRef, Warehouse, WarehouseError,
    };
    use futures::SinkExt;
    use std::sync::Arc;
    use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
    use tower::ServiceExt;

    struct EmptyWarehouse;

    #[async_trait]
    impl Warehouse for EmptyWarehouse {
        async fn list_datasets(&self) -> Result<Vec<DatasetRef>, WarehouseError> {
            Ok(Vec::new())
        }

        async fn list_tables(&self, _: &DatasetRef) -> Result<Vec<TableRef>, WarehouseError> {
            Ok(Vec::new())
        }

        async fn get_table_metadata(&self, table: &TableRef) -> Result<TableMetadata, WarehouseError> {
            Err(WarehouseError::Upstream(format!("Not found: Table {table}")))
        }

        async fn submit_query(&self, _: &QueryJob) -> Result<Vec<Row>, WarehouseError> {
            Ok(Vec::new())
        }
    }

    fn app() -> Router {
        let server = McpServer::new(
            Arc::new(EmptyWarehouse),
            ProjectId::parse("test-project").unwrap(),
            "US",
        );
        create_router(server)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: impl Into<String>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.into()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["server"], "mcp-bigquery");
    }

    #[tokio::test]
    async fn test_post_single_envelope() {
        let response = app()
            .oneshot(post_json(
                "/mcp",
                r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"]["tools"][0]["name"], "query");
    }

    #[tokio::test]
    async fn test_post_malformed_json_is_parse_error() {
        let response = app().oneshot(post_json("/mcp", "{oops")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32700);
        assert_eq!(body["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let body = json!({"requests": [
            {"jsonrpc": "2.0", "id": "a", "method": "initialize"},
            {"jsonrpc": "2.0", "id": "b", "method": "nope"},
            {"jsonrpc": "2.0", "id": "c", "method": "resources/list"}
        ]});
        let response = app()
            .oneshot(post_json("/mcp/batch", body.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let responses = body.as_array().unwrap();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["id"], "a");
        assert!(responses[0]["result"]["protocolVersion"].is_string());
        assert_eq!(responses[1]["error"]["code"], -32601);
        assert_eq!(responses[2]["result"]["resources"], json!([]));
    }

    #[tokio::test]
    async fn test_empty_batch_is_unprocessable() {
        let response = app()
            .oneshot(post_json("/mcp/batch", r#"{"requests":[]}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_websocket_answers_each_frame_until_close() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app()).await });

        let (mut ws, _) = connect_async(format!("ws://{addr}/mcp/ws")).await.unwrap();

        for (id, method) in [(1, "tools/list"), (2, "nope")] {
            let request = json!({"jsonrpc": "2.0", "id": id, "method": method});
            ws.send(WsMessage::Text(request.to_string().into()))
                .await
                .unwrap();

            let reply = ws.next().await.unwrap().unwrap();
            let body: Value = serde_json::from_str(reply.to_text().unwrap()).unwrap();
            assert_eq!(body["id"], id);
            if id == 1 {
                assert_eq!(body["result"]["tools"][0]["name"], "query");
            } else {
                assert_eq!(body["error"]["code"], -32601);
            }
        }

        ws.send(WsMessage::Close(None)).await.unwrap();
        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(Ok(msg)) = ws.next().await {
                assert!(!msg.is_text(), "no reply expected after close: {msg:?}");
            }
        })
        .await;
        assert!(drained.is_ok(), "server kept the socket open after close");
    }
}
