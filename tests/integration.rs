//! Integration tests for the MCP server.

use std::cell::RefCell;
use std::collections::HashMap;

use confluence_form_mcp::{
    extract_fields, ConfluenceApi, JsonRpcRequest, McpError, McpServer, McpSession, PageContent,
    Result as McpResult, ToolRegistry,
};
use serde_json::{json, Map, Value as JsonValue};

const FORM_MARKUP: &str = concat!(
    r#"<h1>AI Intake</h1>"#,
    r#"<p><input name="requestor" value="Test User" /></p>"#,
    r#"<ac:structured-macro ac:name="details" ac:schema-version="1">"#,
    r#"<ac:parameter ac:name="status">draft</ac:parameter>"#,
    r#"<ac:parameter ac:name="priority">Low</ac:parameter>"#,
    r#"</ac:structured-macro>"#,
    r#"<ac:structured-macro ac:name="field" ac:schema-version="1">"#,
    r#"<ac:parameter ac:name="name">description</ac:parameter>"#,
    r#"<ac:rich-text-body>Pending notes</ac:rich-text-body>"#,
    r#"</ac:structured-macro>"#,
);

/// In-memory Confluence standing where the real gateway stands.
struct FakeConfluence {
    pages: RefCell<HashMap<String, PageContent>>,
    /// Error to return from the next fetch, if set.
    fail_next_fetch: RefCell<Option<McpError>>,
    /// Simulate a concurrent writer landing between fetch and update.
    race_next_update: RefCell<bool>,
    /// Markup submitted by the most recent update attempt, successful or not.
    last_submitted_markup: RefCell<Option<String>>,
}

impl FakeConfluence {
    fn new() -> Self {
        Self {
            pages: RefCell::new(HashMap::new()),
            fail_next_fetch: RefCell::new(None),
            race_next_update: RefCell::new(false),
            last_submitted_markup: RefCell::new(None),
        }
    }

    fn insert_page(&self, page_id: &str, title: &str, version: i64, markup: &str) {
        self.pages.borrow_mut().insert(
            page_id.to_string(),
            PageContent {
                page_id: page_id.to_string(),
                title: title.to_string(),
                version,
                body_markup: markup.to_string(),
            },
        );
    }

    fn stored(&self, page_id: &str) -> PageContent {
        self.pages.borrow()[page_id].clone()
    }
}

impl ConfluenceApi for FakeConfluence {
    async fn fetch_page(&self, page_id: &str) -> McpResult<PageContent> {
        if let Some(err) = self.fail_next_fetch.borrow_mut().take() {
            return Err(err);
        }
        self.pages
            .borrow()
            .get(page_id)
            .cloned()
            .ok_or_else(|| McpError::PageNotFound(page_id.to_string()))
    }

    async fn update_page(
        &self,
        page_id: &str,
        title: &str,
        body_markup: &str,
        fetched_version: i64,
    ) -> McpResult<PageContent> {
        *self.last_submitted_markup.borrow_mut() = Some(body_markup.to_string());

        let mut pages = self.pages.borrow_mut();
        let page = pages
            .get_mut(page_id)
            .ok_or_else(|| McpError::PageNotFound(page_id.to_string()))?;

        if *self.race_next_update.borrow() || page.version != fetched_version {
            return Err(McpError::VersionConflict {
                page_id: page_id.to_string(),
                fetched_version,
            });
        }

        page.title = title.to_string();
        page.body_markup = body_markup.to_string();
        page.version += 1;
        Ok(page.clone())
    }
}

/// Create a test session with the standard form page loaded.
fn test_session() -> McpSession<FakeConfluence> {
    let api = FakeConfluence::new();
    api.insert_page("123", "AI Intake Form", 4, FORM_MARKUP);
    McpSession::new(api)
}

/// Helper to dispatch a tool call.
async fn call_tool(
    session: &McpSession<FakeConfluence>,
    registry: &ToolRegistry,
    name: &str,
    args: JsonValue,
) -> JsonValue {
    let args_map: Map<String, JsonValue> = match args {
        JsonValue::Object(m) => m,
        _ => Map::new(),
    };
    registry
        .dispatch(session, name, args_map)
        .await
        .unwrap_or_else(|e| panic!("Tool {} failed: {}", name, e))
}

/// Helper to dispatch a tool call and expect an error.
async fn call_tool_err(
    session: &McpSession<FakeConfluence>,
    registry: &ToolRegistry,
    name: &str,
    args: JsonValue,
) -> McpError {
    let args_map: Map<String, JsonValue> = match args {
        JsonValue::Object(m) => m,
        _ => Map::new(),
    };
    registry
        .dispatch(session, name, args_map)
        .await
        .expect_err(&format!("Expected tool {} to fail", name))
}

fn request(method: &str, params: JsonValue) -> JsonRpcRequest {
    JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(json!(1)),
        method: method.to_string(),
        params: Some(params),
    }
}

// =============================================================================
// Tool Registry
// =============================================================================

#[tokio::test]
async fn test_tools_list_names() {
    let registry = ToolRegistry::new();
    let mut names: Vec<&str> = registry.tools().iter().map(|t| t.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, ["complete_confluence_form", "get_form_structure"]);
}

#[tokio::test]
async fn test_unknown_tool() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let err = call_tool_err(&session, &registry, "delete_page", json!({})).await;
    assert_eq!(err.kind(), "ToolNotFound");
}

#[tokio::test]
async fn test_missing_required_arguments_named() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let err = call_tool_err(
        &session,
        &registry,
        "complete_confluence_form",
        json!({"page_id": "1"}),
    )
    .await;
    assert_eq!(err.kind(), "InvalidArguments");
    assert!(err.to_string().contains("form_data"));

    // Both names are reported when both are absent.
    let err = call_tool_err(&session, &registry, "complete_confluence_form", json!({})).await;
    let message = err.to_string();
    assert!(message.contains("page_id") && message.contains("form_data"));
}

// =============================================================================
// get_form_structure
// =============================================================================

#[tokio::test]
async fn test_get_form_structure() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let result = call_tool(
        &session,
        &registry,
        "get_form_structure",
        json!({"page_id": "123"}),
    )
    .await;

    assert_eq!(result["page_id"], "123");
    assert_eq!(result["page_title"], "AI Intake Form");
    assert_eq!(result["version"], 4);

    let fields = result["form_fields"].as_array().expect("field array");
    let names: Vec<&str> = fields
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["requestor", "status", "priority", "description"]);
    assert_eq!(fields[0]["kind"], "text");
    assert_eq!(fields[1]["kind"], "macro-parameter");
    assert_eq!(fields[3]["kind"], "structured-block");
    assert_eq!(fields[1]["current_value"], "draft");

    assert!(result["raw_content_preview"].as_str().unwrap().len() <= 500);
}

#[tokio::test]
async fn test_get_form_structure_page_not_found() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let err = call_tool_err(
        &session,
        &registry,
        "get_form_structure",
        json!({"page_id": "999"}),
    )
    .await;
    assert_eq!(err.kind(), "NotFound");
}

// =============================================================================
// complete_confluence_form
// =============================================================================

#[tokio::test]
async fn test_complete_form_updates_targeted_field_only() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let result = call_tool(
        &session,
        &registry,
        "complete_confluence_form",
        json!({"page_id": "123", "form_data": {"status": "approved"}}),
    )
    .await;

    assert_eq!(result["success"], true);
    assert_eq!(result["version"], 5);
    assert_eq!(result["updated_fields"], json!(["status"]));
    assert_eq!(result["unmatched_fields"], json!([]));

    let stored = session.api().stored("123");
    let fields = extract_fields(&stored.body_markup);
    let value = |name: &str| {
        fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.current_value.clone())
            .unwrap()
    };
    assert_eq!(value("status"), "approved");
    assert_eq!(value("requestor"), "Test User");
    assert_eq!(value("priority"), "Low");
    assert_eq!(value("description"), "Pending notes");
}

#[tokio::test]
async fn test_complete_form_coerces_scalar_values() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let result = call_tool(
        &session,
        &registry,
        "complete_confluence_form",
        json!({"page_id": "123", "form_data": {"priority": 2}}),
    )
    .await;
    assert_eq!(result["updated_fields"], json!(["priority"]));

    let stored = session.api().stored("123");
    let fields = extract_fields(&stored.body_markup);
    let priority = fields.iter().find(|f| f.name == "priority").unwrap();
    assert_eq!(priority.current_value, "2");
}

#[tokio::test]
async fn test_complete_form_reports_unmatched_names() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let result = call_tool(
        &session,
        &registry,
        "complete_confluence_form",
        json!({"page_id": "123", "form_data": {"status": "approved", "ghost": "x"}}),
    )
    .await;

    assert_eq!(result["success"], true);
    assert_eq!(result["updated_fields"], json!(["status"]));
    assert_eq!(result["unmatched_fields"], json!(["ghost"]));
}

#[tokio::test]
async fn test_complete_form_rejects_empty_form_data() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let err = call_tool_err(
        &session,
        &registry,
        "complete_confluence_form",
        json!({"page_id": "123", "form_data": {}}),
    )
    .await;
    assert_eq!(err.kind(), "InvalidArguments");
}

#[tokio::test]
async fn test_version_conflict_is_distinct_and_writes_nothing() {
    let session = test_session();
    let registry = ToolRegistry::new();
    *session.api().race_next_update.borrow_mut() = true;

    let err = call_tool_err(
        &session,
        &registry,
        "complete_confluence_form",
        json!({"page_id": "123", "form_data": {"status": "approved"}}),
    )
    .await;
    assert_eq!(err.kind(), "VersionConflict");

    // The page is untouched and the markup submitted to the gateway is the
    // full transform of the fetched content, not a partial write.
    let stored = session.api().stored("123");
    assert_eq!(stored.body_markup, FORM_MARKUP);
    assert_eq!(stored.version, 4);

    let submitted = session
        .api()
        .last_submitted_markup
        .borrow()
        .clone()
        .expect("update attempted");
    let values = [("status".to_string(), "approved".to_string())]
        .into_iter()
        .collect();
    let expected = confluence_form_mcp::apply_field_values(FORM_MARKUP, &values);
    assert_eq!(submitted, expected.markup);
}

#[tokio::test]
async fn test_gateway_failures_keep_their_kind() {
    let session = test_session();
    let registry = ToolRegistry::new();

    *session.api().fail_next_fetch.borrow_mut() = Some(McpError::AuthRejected { status: 401 });
    let err = call_tool_err(
        &session,
        &registry,
        "get_form_structure",
        json!({"page_id": "123"}),
    )
    .await;
    assert_eq!(err.kind(), "AuthFailure");

    *session.api().fail_next_fetch.borrow_mut() =
        Some(McpError::Timeout("deadline elapsed".to_string()));
    let err = call_tool_err(
        &session,
        &registry,
        "get_form_structure",
        json!({"page_id": "123"}),
    )
    .await;
    assert_eq!(err.kind(), "Timeout");
}

// =============================================================================
// Protocol Dispatcher
// =============================================================================

#[tokio::test]
async fn test_initialize() {
    let mut server = McpServer::new(test_session());

    let response = server.handle_request(request("initialize", json!({}))).await;
    let result = response.result.expect("initialize result");
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"]["name"], "confluence-form-mcp");
    assert!(result["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn test_tools_list_over_protocol() {
    let mut server = McpServer::new(test_session());

    let response = server.handle_request(request("tools/list", json!({}))).await;
    let result = response.result.expect("tools/list result");
    let mut names: Vec<&str> = result["tools"]
        .as_array()
        .expect("tools array")
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    names.sort_unstable();
    assert_eq!(names, ["complete_confluence_form", "get_form_structure"]);
}

#[tokio::test]
async fn test_tools_call_wraps_result_in_content() {
    let mut server = McpServer::new(test_session());

    let response = server
        .handle_request(request(
            "tools/call",
            json!({"name": "get_form_structure", "arguments": {"page_id": "123"}}),
        ))
        .await;
    let result = response.result.expect("tools/call result");
    let text = result["content"][0]["text"].as_str().expect("content text");
    let payload: JsonValue = serde_json::from_str(text).expect("payload is JSON");
    assert_eq!(payload["page_id"], "123");
}

#[tokio::test]
async fn test_tools_call_error_carries_stable_kind() {
    let mut server = McpServer::new(test_session());

    let response = server
        .handle_request(request(
            "tools/call",
            json!({"name": "complete_confluence_form", "arguments": {"page_id": "1"}}),
        ))
        .await;
    let error = response.error.expect("error object");
    assert_eq!(error.data.expect("error data")["kind"], "InvalidArguments");
}

#[tokio::test]
async fn test_dispatcher_totality() {
    let mut server = McpServer::new(test_session());

    // Every syntactically valid request yields exactly one response with
    // either a result or an error, never a panic.
    let cases = vec![
        request("no/such/method", json!({})),
        request("tools/call", json!({})),
        request("tools/call", json!({"arguments": {}})),
        request("tools/call", json!({"name": "get_form_structure", "arguments": "nope"})),
        JsonRpcRequest {
            jsonrpc: "1.0".to_string(),
            id: Some(json!(7)),
            method: "tools/list".to_string(),
            params: None,
        },
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: "initialized".to_string(),
            params: None,
        },
        request("ping", json!({})),
    ];

    for case in cases {
        let response = server.handle_request(case).await;
        assert!(response.result.is_some() ^ response.error.is_some());
    }
}

#[tokio::test]
async fn test_unknown_method_kind() {
    let mut server = McpServer::new(test_session());

    let response = server.handle_request(request("resources/list", json!({}))).await;
    let error = response.error.expect("error object");
    assert_eq!(error.code, -32601);
    assert_eq!(error.data.expect("error data")["kind"], "MethodNotFound");
}
