//! # bqmcp-mcp
//!
//! MCP (Model Context Protocol) gateway in front of a read-only warehouse.
//!
//! One dispatcher, [`McpServer`], routes the five supported methods; the
//! transports only frame envelopes and hand them over:
//!
//! - **stdio**: newline-delimited JSON-RPC
//! - **HTTP**: `POST /mcp`, `POST /mcp/batch`, `GET /mcp/ws` (WebSocket), `GET /mcp/stream` (SSE)
//!
//! ## Architecture
//!
//! ```text
//! AI Agent
//!       │
//!       │ JSON-RPC (stdio / HTTP / WebSocket)
//!       ▼
//! ┌──────────────────────┐
//! │  McpServer           │
//! │  1. Route method     │
//! │  2. Decode URI       │  ← resource
//! │  3. Check SQL        │  ← bqmcp-guard
//! │  4. Call warehouse   │  ← bqmcp-core::Warehouse
//! │  5. Shape envelope   │
//! └──────────┬───────────┘
//!            ▼
//!        BigQuery
//! ```
//!
//! ## Methods
//!
//! | Method | Params | Result |
//! |--------|--------|--------|
//! | `initialize` | ignored | protocol version, capabilities, server info |
//! | `resources/list` | none | one schema resource per table or view |
//! | `resources/read` | `uri` | column list of one table |
//! | `tools/list` | none | the `query` tool |
//! | `tools/call` | `name`, `arguments` | query rows as text content |

pub mod error;
pub mod http_transport;
pub mod protocol;
pub mod resource;
pub mod server;
pub mod tools;

pub use error::McpError;
pub use protocol::{
    CallToolParams, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ReadResourceParams,
    ToolAnnotations, ToolContent, ToolDefinition,
};
pub use resource::{ResourceAddress, ResourceUriError};
pub use server::{McpMethod, McpServer};
