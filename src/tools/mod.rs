//! Tool registry and definitions.
//!
//! Provides the infrastructure for registering and dispatching MCP tools.

pub mod form;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::{McpError, Result};
use crate::gateway::ConfluenceApi;
use crate::session::McpSession;

/// A tool definition for the MCP tools/list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    /// Tool name (e.g., "complete_confluence_form")
    pub name: String,
    /// Tool description
    pub description: String,
    /// JSON Schema for the input parameters
    #[serde(rename = "inputSchema")]
    pub input_schema: JsonValue,
}

impl ToolDef {
    /// Create a new tool definition.
    pub fn new(name: &str, description: &str, input_schema: JsonValue) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

/// Registry of all available tools.
pub struct ToolRegistry {
    tools: Vec<ToolDef>,
}

impl ToolRegistry {
    /// Create a new registry with all tools registered.
    pub fn new() -> Self {
        let mut tools = Vec::new();
        tools.extend(form::tools());
        Self { tools }
    }

    /// Get all tool definitions.
    pub fn tools(&self) -> &[ToolDef] {
        &self.tools
    }

    /// Look up a tool definition by name.
    pub fn resolve(&self, name: &str) -> Result<&ToolDef> {
        self.tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| McpError::UnknownTool(name.to_string()))
    }

    /// Dispatch a tool call to the appropriate handler.
    ///
    /// The descriptor's required-argument list is checked first; a handler is
    /// never invoked with incomplete arguments, and the failure names every
    /// missing argument.
    pub async fn dispatch<A: ConfluenceApi>(
        &self,
        session: &McpSession<A>,
        name: &str,
        args: Map<String, JsonValue>,
    ) -> Result<JsonValue> {
        let def = self.resolve(name)?;
        check_required_args(def, &args)?;
        form::dispatch(session, name, args).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn check_required_args(def: &ToolDef, args: &Map<String, JsonValue>) -> Result<()> {
    let required = def.input_schema.get("required").and_then(|r| r.as_array());
    let missing: Vec<String> = required
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str())
        .filter(|name| !args.contains_key(*name))
        .map(|name| name.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(McpError::MissingArgs(missing))
    }
}

/// Helper macro for creating JSON Schema for tool input parameters.
#[macro_export]
macro_rules! schema {
    // Object with only required properties
    (object {
        required: { $($req_name:literal : $req_type:tt),* $(,)? }
    }) => {{
        let mut required = Vec::new();
        $(required.push($req_name);)*

        let mut props = serde_json::Map::new();
        $(props.insert($req_name.to_string(), schema!(@type $req_type));)*

        serde_json::json!({
            "type": "object",
            "properties": props,
            "required": required
        })
    }};

    // Empty object (no parameters)
    (object {}) => {{
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }};

    // Type mappings
    (@type string) => { serde_json::json!({"type": "string"}) };
    (@type object) => { serde_json::json!({"type": "object", "additionalProperties": true}) };
}
