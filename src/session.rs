//! MCP session management.
//!
//! Holds the per-process context tool handlers execute against.

use crate::gateway::ConfluenceApi;

/// MCP session state.
///
/// Wraps the Confluence API handle constructed once at startup. The session
/// is never mutated after construction: each tool call performs its own
/// fetch-transform-write cycle, so nothing is carried between invocations
/// beyond this read-only handle.
pub struct McpSession<A> {
    /// Confluence API handle (real gateway or a test fake)
    api: A,
}

impl<A: ConfluenceApi> McpSession<A> {
    /// Create a new MCP session around a Confluence API handle.
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Get the Confluence API handle.
    pub fn api(&self) -> &A {
        &self.api
    }
}
