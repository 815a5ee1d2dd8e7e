//! YAML renderer.
//!
//! When the schema declares a `key` field, `records` is a mapping from each
//! record's key to the record; otherwise it is a list, like the JSON layout.
//! Keys are compared the way a YAML reader resolves them, so `007` and `7`
//! count as the same key.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::config::OutputFormat;
use crate::document::ExportDocument;
use crate::error::RenderError;

/// Plain scalars a YAML reader resolves to a number.
static NUMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(concat!(
        r"^[-+]?(?:0x[0-9a-fA-F_]+|0o[0-7_]+",
        r"|[0-9][0-9_]*(?:\.[0-9_]*)?(?:[eE][-+]?[0-9]+)?",
        r"|\.[0-9_]+(?:[eE][-+]?[0-9]+)?)$",
    )) {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid number regex: {err}"),
    }
});

/// Render the export document as YAML.
///
/// # Errors
///
/// With a `key`, returns one `RenderError` for every record whose key is
/// empty or reads back the same as an earlier record's key.
pub fn render_yaml(
    document: &ExportDocument,
    key: Option<&str>,
) -> Result<String, Vec<RenderError>> {
    let records = match key {
        Some(key) => keyed_records(document, key)?,
        None => Value::Array(
            document
                .rows
                .iter()
                .map(|row| Value::Object(row.values.clone()))
                .collect(),
        ),
    };

    serde_saphyr::to_string(&document.to_value_with(records)).map_err(|e| {
        vec![RenderError::new(
            OutputFormat::Yaml,
            None,
            None,
            format!("serialization failed: {e}"),
        )]
    })
}

fn keyed_records(document: &ExportDocument, key: &str) -> Result<Value, Vec<RenderError>> {
    let mut records = Map::new();
    let mut first_use: HashMap<String, (usize, String)> = HashMap::new();
    let mut errors = Vec::new();

    for row in &document.rows {
        let name = match row.values.get(key) {
            None | Some(Value::Null) => {
                errors.push(RenderError::new(
                    OutputFormat::Yaml,
                    Some(row.record),
                    Some(key),
                    "key is empty",
                ));
                continue;
            }
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        let resolved = resolved_key(&name);
        if let Some((first, first_name)) = first_use.get(&resolved) {
            let reason = if *first_name == name {
                format!("duplicate key '{name}' (first used by record {first})")
            } else {
                format!(
                    "key '{name}' reads back the same as key '{first_name}' \
                     (first used by record {first})"
                )
            };
            errors.push(RenderError::new(
                OutputFormat::Yaml,
                Some(row.record),
                Some(key),
                reason,
            ));
            continue;
        }
        first_use.insert(resolved, (row.record, name.clone()));
        records.insert(name, Value::Object(row.values.clone()));
    }

    if errors.is_empty() {
        Ok(Value::Object(records))
    } else {
        Err(errors)
    }
}

/// The value a YAML 1.1 or 1.2 reader gives the plain scalar `text`, as a
/// comparable string.
fn resolved_key(text: &str) -> String {
    let lower = text.to_ascii_lowercase();
    match lower.as_str() {
        "" | "~" | "null" => return "null".to_owned(),
        "true" | "yes" | "on" | "y" => return "bool:true".to_owned(),
        "false" | "no" | "off" | "n" => return "bool:false".to_owned(),
        ".inf" | "+.inf" => return "num:inf".to_owned(),
        "-.inf" => return "num:-inf".to_owned(),
        ".nan" => return "num:nan".to_owned(),
        _ => {}
    }
    if !NUMBER_PATTERN.is_match(text) {
        return format!("str:{text}");
    }

    let digits: String = lower.chars().filter(|c| *c != '_').collect();
    let (negative, unsigned) = match digits.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, digits.strip_prefix('+').unwrap_or(&digits)),
    };
    let integer = if let Some(hex) = unsigned.strip_prefix("0x") {
        i128::from_str_radix(hex, 16).ok()
    } else if let Some(octal) = unsigned.strip_prefix("0o") {
        i128::from_str_radix(octal, 8).ok()
    } else {
        unsigned.parse::<i128>().ok()
    };
    if let Some(value) = integer {
        return format!("num:{}", if negative { -value } else { value });
    }
    match digits.parse::<f64>() {
        Ok(value) => format!("num:{value}"),
        Err(_) => format!("str:{text}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::registry::parse_registry;
    use crate::schema::{Schema, SchemaSyntax};
    use serde_json::json;

    fn document(registry: &str) -> ExportDocument {
        let schema = Schema::parse(
            "fields:\n  - name: code\n  - name: n\n    type: integer\n",
            SchemaSyntax::Yaml,
            "schema.yaml",
        )
        .unwrap();
        let records = parse_registry(registry, b',', "registry.csv").unwrap();
        ExportDocument::project("registry", &schema, &records)
    }

    fn parse(yaml: &str) -> Value {
        serde_saphyr::from_str(yaml).unwrap()
    }

    #[test]
    fn test_render_yaml_list_layout() {
        let out = render_yaml(&document("code,n\nA,1\nB,2\n"), None).unwrap();
        assert_eq!(
            parse(&out),
            json!({
                "build_id": "registry",
                "record_count": 2,
                "records": [{"code": "A", "n": 1}, {"code": "B", "n": 2}]
            })
        );
    }

    #[test]
    fn test_render_yaml_keyed_layout() {
        let out = render_yaml(&document("code,n\nA,1\nB,2\n"), Some("code")).unwrap();
        assert_eq!(
            parse(&out)["records"],
            json!({"A": {"code": "A", "n": 1}, "B": {"code": "B", "n": 2}})
        );
    }

    #[test]
    fn test_integer_key_is_used_as_text() {
        let out = render_yaml(&document("code,n\nA,1\nB,2\n"), Some("n")).unwrap();
        let records = parse(&out)["records"].clone();
        assert_eq!(records.as_object().map(Map::len), Some(2));
        assert!(out.contains("code: B"), "got: {out}");
    }

    #[test]
    fn test_every_duplicate_key_is_reported() {
        let doc = document("code,n\nA,1\nA,2\nB,3\nA,4\n");
        let errors = render_yaml(&doc, Some("code")).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].record, Some(1));
        assert_eq!(errors[1].record, Some(3));
        assert_eq!(errors[0].field.as_deref(), Some("code"));
        assert!(
            errors[0].reason.contains("first used by record 0"),
            "got: {}",
            errors[0].reason
        );
    }

    #[test]
    fn test_keys_that_read_back_equal_are_reported() {
        let doc = document("code,n\n007,1\n7,2\n1.0,3\n1,4\nyes,5\nOn,6\nseven,7\n");
        let errors = render_yaml(&doc, Some("code")).unwrap_err();
        let records: Vec<_> = errors.iter().map(|e| e.record).collect();
        assert_eq!(records, vec![Some(1), Some(3), Some(5)]);
        assert!(
            errors[0].reason.contains("'7' reads back the same as key '007'"),
            "got: {}",
            errors[0].reason
        );
        assert!(errors[0].reason.contains("record 0"), "got: {}", errors[0].reason);
    }

    #[test]
    fn test_resolved_key() {
        assert_eq!(resolved_key("007"), resolved_key("7"));
        assert_eq!(resolved_key("+7"), resolved_key("7"));
        assert_eq!(resolved_key("0x1F"), resolved_key("31"));
        assert_eq!(resolved_key("1_000"), resolved_key("1000"));
        assert_eq!(resolved_key("1.0"), resolved_key("1"));
        assert_eq!(resolved_key("1e2"), resolved_key("100"));
        assert_eq!(resolved_key("NULL"), resolved_key("~"));
        assert_eq!(resolved_key("Off"), resolved_key("false"));
        assert_ne!(resolved_key("BA_CITY"), resolved_key("ba_city"));
        assert_ne!(resolved_key("7a"), resolved_key("7"));
        assert_eq!(resolved_key("7a"), "str:7a");
    }

    #[test]
    fn test_empty_key_is_reported() {
        let errors = render_yaml(&document("code,n\n,1\nB,2\n"), Some("code")).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].record, Some(0));
        assert!(errors[0].reason.contains("empty"));
    }

    #[test]
    fn test_render_yaml_is_deterministic() {
        let doc = document("code,n\nA,1\nB,2\n");
        assert_eq!(
            render_yaml(&doc, Some("code")).unwrap(),
            render_yaml(&doc, Some("code")).unwrap()
        );
    }
}
