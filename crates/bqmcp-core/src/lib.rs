//! # bqmcp-core
//!
//! Types shared by every bqmcp crate:
//!
//! - **Configuration**: `ServerConfig` loaded from `bqmcp.yaml` and merged with CLI flags
//! - **Project ids**: the validated `ProjectId` newtype
//! - **Credentials**: normalization of key files, inline JSON and base64 JSON into one `Identity`
//! - **Warehouse contract**: the `Warehouse` trait the MCP dispatcher talks to

pub mod config;
pub mod credentials;
pub mod project;
pub mod warehouse;

pub use config::{ConfigError, CredentialsConfig, McpConfig, ServerConfig, Transport};
pub use credentials::{
    CredentialError, CredentialNormalizer, Credentials, Identity, IdentityKind, RawCredentials,
    ServiceAccountKey,
};
pub use project::ProjectId;
pub use warehouse::{
    DatasetRef, QueryJob, Row, SchemaField, TableKind, TableMetadata, TableRef, Warehouse,
    WarehouseError,
};
