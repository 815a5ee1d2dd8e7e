//! JSON renderer.

use crate::config::OutputFormat;
use crate::document::ExportDocument;
use crate::error::RenderError;

/// Render the export document as pretty-printed JSON with a trailing newline.
///
/// # Errors
///
/// Returns a `RenderError` if serialization fails.
pub fn render_json(document: &ExportDocument) -> Result<String, Vec<RenderError>> {
    let mut json = serde_json::to_string_pretty(&document.to_value()).map_err(|e| {
        vec![RenderError::new(
            OutputFormat::Json,
            None,
            None,
            format!("serialization failed: {e}"),
        )]
    })?;
    json.push('\n');
    Ok(json)
}
