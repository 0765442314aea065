//! Error types for the MCP server.
//!
//! Maps Confluence gateway and codec failures to MCP-friendly error responses.

use serde::{Deserialize, Serialize};

/// MCP server errors.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum McpError {
    /// Malformed or invalid JSON-RPC request shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Unknown tool requested.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Missing required argument(s).
    #[error("missing required argument(s): {}", .0.join(", "))]
    MissingArgs(Vec<String>),

    /// Invalid argument value.
    #[error("invalid argument '{name}': {reason}")]
    InvalidArg {
        /// Argument name
        name: String,
        /// Reason why it's invalid
        reason: String,
    },

    /// Referenced page does not exist.
    #[error("page not found: {0}")]
    PageNotFound(String),

    /// Upstream rejected the configured credentials.
    #[error("authentication rejected by Confluence (status {status})")]
    AuthRejected {
        /// HTTP status returned by the upstream (401 or 403)
        status: u16,
    },

    /// Concurrent modification detected by the upstream version check.
    /// Retryable: refetch the page and reapply the field values.
    #[error("version conflict updating page {page_id}: page changed since version {fetched_version}")]
    VersionConflict {
        /// Page that was being updated
        page_id: String,
        /// Version the content was fetched at
        fetched_version: i64,
    },

    /// Any other upstream failure (non-2xx status, malformed response).
    #[error("confluence error [{status}]: {message}")]
    Upstream {
        /// HTTP status code, 0 if the failure happened before a response arrived
        status: u16,
        /// Upstream-provided detail
        message: String,
    },

    /// Upstream call exceeded the configured timeout.
    #[error("timeout talking to Confluence: {0}")]
    Timeout(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        McpError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        McpError::Protocol(format!("JSON error: {}", err))
    }
}

/// JSON-RPC error codes.
pub mod rpc_codes {
    /// Parse error - Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - The JSON sent is not a valid Request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found - The method does not exist / is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params - Invalid method parameter(s).
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error - Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;

    /// Referenced page does not exist upstream.
    pub const PAGE_NOT_FOUND: i32 = -32001;
    /// Upstream rejected the credentials.
    pub const AUTH_FAILURE: i32 = -32002;
    /// Concurrent modification detected by the upstream.
    pub const VERSION_CONFLICT: i32 = -32003;
    /// Any other upstream failure.
    pub const UPSTREAM_ERROR: i32 = -32004;
    /// Upstream call exceeded the bound.
    pub const TIMEOUT: i32 = -32005;
}

impl McpError {
    /// Convert to JSON-RPC error code.
    pub fn rpc_code(&self) -> i32 {
        match self {
            McpError::Protocol(_) => rpc_codes::INVALID_REQUEST,
            McpError::UnknownTool(_) => rpc_codes::METHOD_NOT_FOUND,
            McpError::MissingArgs(_) | McpError::InvalidArg { .. } => rpc_codes::INVALID_PARAMS,
            McpError::PageNotFound(_) => rpc_codes::PAGE_NOT_FOUND,
            McpError::AuthRejected { .. } => rpc_codes::AUTH_FAILURE,
            McpError::VersionConflict { .. } => rpc_codes::VERSION_CONFLICT,
            McpError::Upstream { .. } => rpc_codes::UPSTREAM_ERROR,
            McpError::Timeout(_) => rpc_codes::TIMEOUT,
            McpError::Io(_) | McpError::Internal(_) => rpc_codes::INTERNAL_ERROR,
        }
    }

    /// Stable machine-readable failure kind, surfaced in `error.data.kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            McpError::Protocol(_) => "InvalidRequest",
            McpError::UnknownTool(_) => "ToolNotFound",
            McpError::MissingArgs(_) | McpError::InvalidArg { .. } => "InvalidArguments",
            McpError::PageNotFound(_) => "NotFound",
            McpError::AuthRejected { .. } => "AuthFailure",
            McpError::VersionConflict { .. } => "VersionConflict",
            McpError::Upstream { .. } => "UpstreamError",
            McpError::Timeout(_) => "Timeout",
            McpError::Io(_) | McpError::Internal(_) => "InternalError",
        }
    }
}

/// Result type for MCP operations.
pub type Result<T> = std::result::Result<T, McpError>;
