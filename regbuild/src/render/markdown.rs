//! Markdown renderer: one table, one row per exported record.

use std::fmt::Write as _;

use serde_json::Value;

use crate::document::ExportDocument;

/// Render the export document as a Markdown table.
///
/// Cell text escapes `|` and turns line breaks into `<br>` so every record
/// stays on one table row.
#[must_use]
pub fn render_markdown(document: &ExportDocument) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", document.build_id);
    out.push('\n');
    let _ = writeln!(out, "Records: {}", document.record_count());

    if document.fields.is_empty() {
        return out;
    }

    out.push('\n');
    let header: Vec<String> = document.fields.iter().map(|f| escape(f)).collect();
    let _ = writeln!(out, "| {} |", header.join(" | "));
    let _ = writeln!(out, "|{}", "---|".repeat(document.fields.len()));

    for row in &document.rows {
        let cells: Vec<String> = document
            .fields
            .iter()
            .map(|field| row.values.get(field).map_or_else(String::new, cell_text))
            .collect();
        let _ = writeln!(out, "| {} |", cells.join(" | "));
    }
    out
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => escape(s),
        Value::Array(items) => items.iter().map(cell_text).collect::<Vec<_>>().join(", "),
        other => escape(&other.to_string()),
    }
}

fn escape(text: &str) -> String {
    text.replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace(['\n', '\r'], "<br>")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::registry::parse_registry;
    use crate::schema::{Schema, SchemaSyntax};

    fn document(schema: &str, registry: &str) -> ExportDocument {
        let schema = Schema::parse(schema, SchemaSyntax::Yaml, "schema.yaml").unwrap();
        let records = parse_registry(registry, b',', "registry.csv").unwrap();
        ExportDocument::project("sources", &schema, &records)
    }

    #[test]
    fn test_render_markdown_table() {
        let out = render_markdown(&document(
            "fields:\n  - name: id\n    type: integer\n  - name: name\n",
            "id,name\n1,Alpha\n2,Beta\n",
        ));
        assert_eq!(
            out,
            "# sources\n\nRecords: 2\n\n| id | name |\n|---|---|\n| 1 | Alpha |\n| 2 | Beta |\n"
        );
    }

    #[test]
    fn test_cells_are_escaped() {
        let out = render_markdown(&document(
            "fields:\n  - name: note\n",
            "note\n\"a|b\"\n\"line one\nline two\"\n",
        ));
        assert!(out.contains("| a\\|b |"), "got: {out}");
        assert!(out.contains("| line one<br>line two |"), "got: {out}");
    }

    #[test]
    fn test_lists_and_empty_cells() {
        let out = render_markdown(&document(
            "fields:\n  - name: tags\n    type: list\n  - name: note\n",
            "tags,note\n\"x, y\",\n",
        ));
        assert!(out.contains("| x, y |  |"), "got: {out}");
    }

    #[test]
    fn test_no_records_still_renders_header() {
        let out = render_markdown(&document("fields:\n  - name: id\n", "id\n"));
        assert!(out.ends_with("| id |\n|---|\n"), "got: {out}");
        assert!(out.contains("Records: 0"));
    }
}
