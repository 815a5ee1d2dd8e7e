//! Format renderers.
//!
//! Each sub-module turns an [`ExportDocument`] into one artifact:
//! - `json`: pretty-printed JSON document
//! - `yaml`: YAML document, keyed by the schema `key` when declared
//! - `markdown`: human-readable table
//!
//! Renderers are pure and independent of each other. [`render_all`] runs
//! every requested renderer and keeps every result, so one renderer failing
//! never hides another one's errors.

pub mod json;
pub mod markdown;
pub mod yaml;

use std::path::Path;
use std::thread;

use crate::artifact::{Artifact, artifact_path};
use crate::config::OutputFormat;
use crate::document::ExportDocument;
use crate::error::RenderError;
use crate::schema::Schema;

/// Outcome of one renderer.
pub type RenderResult = Result<Artifact, Vec<RenderError>>;

/// Render one format.
///
/// # Errors
///
/// Returns every renderer-specific failure found for this format.
pub fn render(
    format: OutputFormat,
    document: &ExportDocument,
    schema: &Schema,
    out_dir: &Path,
) -> RenderResult {
    let content = match format {
        OutputFormat::Json => json::render_json(document)?,
        OutputFormat::Yaml => yaml::render_yaml(document, schema.key())?,
        OutputFormat::Markdown => markdown::render_markdown(document),
    };
    Ok(Artifact {
        format,
        path: artifact_path(out_dir, &document.build_id, format),
        content,
    })
}

/// Render every requested format, returning one result per format in
/// request order.
///
/// With `parallel`, each format renders on its own scoped thread; results
/// are still joined in request order so the outcome is identical to the
/// sequential run.
#[must_use]
pub fn render_all(
    formats: &[OutputFormat],
    document: &ExportDocument,
    schema: &Schema,
    out_dir: &Path,
    parallel: bool,
) -> Vec<RenderResult> {
    if !parallel || formats.len() < 2 {
        return formats
            .iter()
            .map(|&format| render(format, document, schema, out_dir))
            .collect();
    }

    thread::scope(|scope| {
        let handles: Vec<_> = formats
            .iter()
            .map(|&format| {
                (
                    format,
                    scope.spawn(move || render(format, document, schema, out_dir)),
                )
            })
            .collect();
        handles
            .into_iter()
            .map(|(format, handle)| {
                handle.join().unwrap_or_else(|_| {
                    Err(vec![RenderError::new(format, None, None, "renderer panicked")])
                })
            })
            .collect()
    })
}
