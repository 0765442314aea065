//! # confluence-form-mcp
//!
//! MCP (Model Context Protocol) server for Confluence form automation.
//!
//! This crate provides an MCP server that lets AI agents discover and fill in
//! forms embedded in Confluence pages without knowing the Confluence REST API
//! or its storage-format markup. It implements the MCP protocol over
//! stdin/stdout using JSON-RPC 2.0.
//!
//! ## Features
//!
//! - **Form discovery**: `get_form_structure` extracts a semantic field list
//!   (name, current value, kind) from a page's storage markup
//! - **Form completion**: `complete_confluence_form` rewrites field values in
//!   place, preserving all surrounding markup byte-for-byte, and saves the
//!   page back under optimistic versioning
//! - **Structural markup codec**: balanced-delimiter aware scanning of macro
//!   parameters, form-input attributes, and named rich-text blocks
//!
//! ## Usage
//!
//! The server is typically run as an executable and configured in AI tools
//! like Claude Desktop:
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "confluence-forms": {
//!       "command": "/path/to/confluence-form-mcp",
//!       "env": {
//!         "CONFLUENCE_BASE_URL": "https://your-domain.atlassian.net/wiki",
//!         "CONFLUENCE_USERNAME": "bot@example.com",
//!         "CONFLUENCE_API_TOKEN": "..."
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! ## Library Usage
//!
//! For testing or embedding, the dispatcher and codec are available as a
//! library. The Confluence side sits behind the [`ConfluenceApi`] trait, so
//! tests can drive the full registry against an in-memory fake:
//!
//! ```no_run
//! use std::time::Duration;
//! use confluence_form_mcp::{ConfluenceGateway, Credentials, McpServer, McpSession};
//!
//! let credentials = Credentials {
//!     base_url: "https://your-domain.atlassian.net/wiki".to_string(),
//!     username: "bot@example.com".to_string(),
//!     api_token: "token".to_string(),
//! };
//! let gateway = ConfluenceGateway::new(&credentials, Duration::from_secs(30))
//!     .expect("Failed to build gateway");
//! let session = McpSession::new(gateway);
//! let mut server = McpServer::new(session);
//!
//! // Run the server (reads from stdin, writes to stdout)
//! // server.run().await.expect("Server error");
//! ```

#![warn(missing_docs)]

mod convert;
mod error;
mod gateway;
mod markup;
mod server;
mod session;
mod tools;

pub use error::{McpError, Result};
pub use gateway::{ConfluenceApi, ConfluenceGateway, Credentials, PageContent};
pub use markup::{apply_field_values, extract_fields, FieldKind, FieldUpdate, FormField};
pub use server::{JsonRpcRequest, JsonRpcResponse, McpServer};
pub use session::McpSession;
pub use tools::{ToolDef, ToolRegistry};
