//! Export projection.
//!
//! Turns a validated [`RecordSet`] into the typed, ordered document every
//! renderer consumes. Typing follows the schema: declared fields take their
//! declared type, undeclared columns pass through with their inferred scalar.

use serde_json::{Map, Number, Value};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::registry::{Cell, Record, RecordSet, Scalar};
use crate::schema::{CompiledField, FieldType, Schema};

/// One exported record.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    /// 0-based index of the source record.
    pub record: usize,
    /// Typed values in [`ExportDocument::fields`] order.
    pub values: Map<String, Value>,
}

/// The projection shared by all renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDocument {
    pub build_id: String,
    /// Header fields in source order, followed by declared fields the source lacks.
    pub fields: Vec<String>,
    pub rows: Vec<ExportRow>,
    /// Tag id to the first original text seen for it; filled by
    /// [`ExportDocument::normalize_tags`].
    pub tag_display: Map<String, Value>,
}

impl ExportDocument {
    /// Project validated records for export.
    ///
    /// Records whose `include_when` field is not `true` are left out.
    #[must_use]
    pub fn project(build_id: &str, schema: &Schema, records: &RecordSet) -> Self {
        let mut fields = records.headers.clone();
        for field in schema.fields() {
            if !fields.iter().any(|f| f == field.name()) {
                fields.push(field.name().to_owned());
            }
        }

        let rows = records
            .iter()
            .filter(|record| is_included(schema, record))
            .map(|record| ExportRow {
                record: record.index,
                values: fields
                    .iter()
                    .map(|name| {
                        let value = typed_value(schema.field(name), record.get(name));
                        (name.clone(), value)
                    })
                    .collect(),
            })
            .collect();

        Self {
            build_id: build_id.to_owned(),
            fields,
            rows,
            tag_display: Map::new(),
        }
    }

    /// Replace every item of every `list` field with its ASCII tag id.
    ///
    /// Items whose id is empty are dropped and repeated ids within one cell
    /// keep their first position.
    pub fn normalize_tags(&mut self, schema: &Schema) {
        let list_fields: Vec<&str> = schema
            .fields()
            .iter()
            .filter(|f| f.field_type() == FieldType::List)
            .map(CompiledField::name)
            .collect();

        for row in &mut self.rows {
            for name in &list_fields {
                if let Some(Value::Array(items)) = row.values.get_mut(*name) {
                    *items = tag_ids(items, &mut self.tag_display);
                }
            }
        }
        tracing::debug!(tags = self.tag_display.len(), "tags normalized");
    }

    #[must_use]
    pub fn record_count(&self) -> usize {
        self.rows.len()
    }

    /// The document as one JSON value: `{build_id, record_count, records}`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        self.to_value_with(Value::Array(
            self.rows
                .iter()
                .map(|row| Value::Object(row.values.clone()))
                .collect(),
        ))
    }

    /// Same envelope as [`ExportDocument::to_value`] with a caller-built
    /// `records` member. `tag_display` is added when tags were normalized.
    #[must_use]
    pub fn to_value_with(&self, records: Value) -> Value {
        let mut root = Map::new();
        root.insert("build_id".to_owned(), Value::String(self.build_id.clone()));
        root.insert("record_count".to_owned(), Value::from(self.record_count()));
        root.insert("records".to_owned(), records);
        if !self.tag_display.is_empty() {
            root.insert("tag_display".to_owned(), Value::Object(self.tag_display.clone()));
        }
        Value::Object(root)
    }
}

fn tag_ids(items: &[Value], display: &mut Map<String, Value>) -> Vec<Value> {
    let mut ids: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        let Value::String(text) = item else {
            continue;
        };
        let id = tag_id(text);
        if id.is_empty() {
            continue;
        }
        display
            .entry(id.clone())
            .or_insert_with(|| Value::String(text.clone()));
        let id = Value::String(id);
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Stable ASCII id for a tag: lowercase, diacritics dropped, every other run
/// of non-alphanumerics collapsed to `_`.
#[must_use]
pub fn tag_id(text: &str) -> String {
    let folded: String = text
        .trim()
        .to_lowercase()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect();
    let mut id = String::with_capacity(folded.len());
    for c in folded.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            id.push(c);
        } else if !id.is_empty() && !id.ends_with('_') {
            id.push('_');
        }
    }
    id.trim_end_matches('_').to_owned()
}

fn is_included(schema: &Schema, record: &Record) -> bool {
    schema.include_when().is_none_or(|flag| {
        record
            .get(flag)
            .and_then(Cell::as_bool)
            .unwrap_or(false)
    })
}

fn typed_value(field: Option<&CompiledField>, cell: Option<&Cell>) -> Value {
    let Some(cell) = cell.filter(|c| !c.is_empty()) else {
        return Value::Null;
    };
    let Some(field) = field else {
        return scalar_value(&cell.scalar);
    };

    let typed = match field.field_type() {
        FieldType::Integer => cell.as_integer().map(Value::from),
        FieldType::Number => cell
            .as_integer()
            .filter(|_| matches!(cell.scalar, Scalar::Integer(_)))
            .map(Value::from)
            .or_else(|| cell.as_number().and_then(Number::from_f64).map(Value::Number)),
        FieldType::Boolean => cell.as_bool().map(Value::Bool),
        FieldType::List => Some(Value::Array(
            field
                .split_list(&cell.text)
                .into_iter()
                .map(|item| Value::String(item.to_owned()))
                .collect(),
        )),
        FieldType::String | FieldType::Time | FieldType::Url => None,
    };
    typed.unwrap_or_else(|| Value::String(cell.text.clone()))
}

fn scalar_value(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::Empty => Value::Null,
        Scalar::Bool(b) => Value::Bool(*b),
        Scalar::Integer(i) => Value::from(*i),
        Scalar::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Scalar::Text(s) => Value::String(s.clone()),
    }
}
