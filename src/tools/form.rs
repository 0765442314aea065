//! Confluence form tools.
//!
//! Tools: complete_confluence_form, get_form_structure

use serde_json::{Map, Value as JsonValue};

use crate::convert::{get_object_arg, get_string_arg, to_field_values};
use crate::error::{McpError, Result};
use crate::gateway::ConfluenceApi;
use crate::markup::{apply_field_values, extract_fields};
use crate::schema;
use crate::session::McpSession;
use crate::tools::ToolDef;

/// Bound on the raw markup preview returned by get_form_structure.
const CONTENT_PREVIEW_CHARS: usize = 500;

/// Get all form tool definitions.
pub fn tools() -> Vec<ToolDef> {
    vec![
        ToolDef::new(
            "complete_confluence_form",
            "Complete a Confluence form for AI intake process. Fetches the form page, \
             writes the given field values into it, and saves it back at the fetched \
             version. Requires form page ID and form data.",
            schema!(object {
                required: { "page_id": string, "form_data": object }
            }),
        ),
        ToolDef::new(
            "get_form_structure",
            "Get the structure of a Confluence form to understand available fields. \
             Returns each field's name, current value, and kind.",
            schema!(object {
                required: { "page_id": string }
            }),
        ),
    ]
}

/// Dispatch a form tool call.
pub async fn dispatch<A: ConfluenceApi>(
    session: &McpSession<A>,
    name: &str,
    args: Map<String, JsonValue>,
) -> Result<JsonValue> {
    match name {
        "get_form_structure" => {
            let page_id = get_string_arg(&args, "page_id")?;

            let page = session.api().fetch_page(&page_id).await?;
            let fields = extract_fields(&page.body_markup);
            tracing::debug!(%page_id, field_count = fields.len(), "extracted form fields");

            let preview: String = page
                .body_markup
                .chars()
                .take(CONTENT_PREVIEW_CHARS)
                .collect();
            Ok(serde_json::json!({
                "page_id": page.page_id,
                "page_title": page.title,
                "version": page.version,
                "form_fields": fields,
                "raw_content_preview": preview,
            }))
        }

        "complete_confluence_form" => {
            let page_id = get_string_arg(&args, "page_id")?;
            let form_data = get_object_arg(&args, "form_data")?;
            if form_data.is_empty() {
                return Err(McpError::InvalidArg {
                    name: "form_data".to_string(),
                    reason: "must contain at least one field".to_string(),
                });
            }
            let values = to_field_values("form_data", form_data)?;

            let page = session.api().fetch_page(&page_id).await?;
            let update = apply_field_values(&page.body_markup, &values);
            if !update.unmatched.is_empty() {
                tracing::warn!(
                    %page_id,
                    unmatched = ?update.unmatched,
                    "form data names not present in page"
                );
            }

            let written = session
                .api()
                .update_page(&page.page_id, &page.title, &update.markup, page.version)
                .await?;

            Ok(serde_json::json!({
                "success": true,
                "page_id": written.page_id,
                "page_title": written.title,
                "version": written.version,
                "updated_fields": update.updated,
                "unmatched_fields": update.unmatched,
                "message": "Form completed successfully",
            }))
        }

        _ => Err(McpError::UnknownTool(name.to_string())),
    }
}
