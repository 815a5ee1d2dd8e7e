//! Registry schema documents.
//!
//! A schema names the fields a registry must provide, their types and their
//! constraints. It is written as JSON or YAML and compiled once per build:
//! patterns are compiled and cross-field references are resolved up front,
//! so validation itself cannot fail.

use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::LoadError;
use crate::registry::{Cell, Record};

/// Maximum schema document size in bytes.
const MAX_SCHEMA_SIZE: u64 = 1_048_576;

/// Declared type of a registry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Any non-empty text.
    #[default]
    String,
    /// Whole number; `6.0` is accepted and normalized to `6`.
    Integer,
    /// Finite number.
    Number,
    /// `true`/`false`/`yes`/`no`/`1`/`0`.
    Boolean,
    /// `HH:MM` on a 24-hour clock.
    Time,
    /// `http://` or `https://` URL.
    Url,
    /// Separator-delimited list of text items.
    List,
}

impl FieldType {
    /// Lowercase name as written in schema documents.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Time => "time",
            Self::Url => "url",
            Self::List => "list",
        }
    }

    const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Number)
    }
}

/// `{field, in: [...]}`: holds when the field's text is one of the values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueCondition {
    pub field: String,
    #[serde(rename = "in", deserialize_with = "scalar_list")]
    pub values: Vec<String>,
}

impl ValueCondition {
    #[must_use]
    pub fn holds(&self, record: &Record) -> bool {
        let text = record.text(&self.field);
        self.values.iter().any(|v| v == text)
    }
}

impl fmt::Display for ValueCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.values.as_slice() {
            [single] => write!(f, "'{}' is {single}", self.field),
            values => write!(f, "'{}' is one of [{}]", self.field, values.join(", ")),
        }
    }
}

/// Per-record condition used by `required_when` and `endpoint_when`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    /// Boolean field that must be `true`.
    Flag(String),
    Values(ValueCondition),
}

impl Condition {
    #[must_use]
    pub fn holds(&self, record: &Record) -> bool {
        match self {
            Self::Flag(flag) => record.get(flag).and_then(Cell::as_bool).unwrap_or(false),
            Self::Values(condition) => condition.holds(record),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(flag) => write!(f, "'{flag}' is true"),
            Self::Values(condition) => fmt::Display::fmt(condition, f),
        }
    }
}

/// Schema-level cross-field check; a record where `when` holds but `expect`
/// does not gets a warning.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectRule {
    pub when: ValueCondition,
    pub expect: ValueCondition,
    #[serde(default)]
    pub message: Option<String>,
}

impl ExpectRule {
    /// The configured message, or one built from the conditions and the
    /// `expect` field's actual text.
    #[must_use]
    pub fn message_for(&self, actual: &str) -> String {
        self.message.clone().unwrap_or_else(|| {
            format!(
                "{} but '{}' is '{actual}' (expected {})",
                self.when,
                self.expect.field,
                self.expect.values.join(" or ")
            )
        })
    }
}

/// One field declaration, as written in the schema document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Makes this field required for records where the condition holds.
    #[serde(default)]
    pub required_when: Option<Condition>,
    /// Texts that count as empty for the required checks.
    #[serde(default, deserialize_with = "scalar_strings")]
    pub blank_values: Option<Vec<String>>,
    /// Allowed values; applies to every item of a `list` field.
    #[serde(rename = "enum", default, deserialize_with = "scalar_strings")]
    pub allowed: Option<Vec<String>>,
    /// Regex the raw text must match; applies to every item of a `list` field.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Inclusive lower bound for numeric fields.
    #[serde(default)]
    pub min: Option<f64>,
    /// Inclusive upper bound for numeric fields.
    #[serde(default)]
    pub max: Option<f64>,
    /// Item separator for `list` fields (default `,`).
    #[serde(default)]
    pub separator: Option<String>,
    /// Values outside this list are reported as warnings.
    #[serde(default, deserialize_with = "scalar_strings")]
    pub known_values: Option<Vec<String>>,
    /// On `url` fields: warn when the URL looks like a landing page for
    /// records where the condition holds.
    #[serde(default)]
    pub endpoint_when: Option<Condition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaDocument {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    include_when: Option<String>,
    fields: Vec<FieldSpec>,
    #[serde(default)]
    warnings: Vec<ExpectRule>,
}

/// Accept value lists written as YAML/JSON scalars of any type.
fn scalar_strings<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    values.map(to_strings).transpose()
}

fn scalar_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    to_strings(Vec::deserialize(deserializer)?)
}

fn to_strings<E: serde::de::Error>(values: Vec<Value>) -> Result<Vec<String>, E> {
    values
        .into_iter()
        .map(|v| match v {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(E::custom(format!("values must be scalars, got {other}"))),
        })
        .collect()
}

/// A field declaration with its pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledField {
    spec: FieldSpec,
    pattern: Option<Regex>,
}

impl CompiledField {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        self.spec.field_type
    }

    #[must_use]
    pub const fn spec(&self) -> &FieldSpec {
        &self.spec
    }

    #[must_use]
    pub const fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }

    /// Whether the cell counts as empty for the required checks.
    #[must_use]
    pub fn is_blank(&self, cell: Option<&Cell>) -> bool {
        cell.is_none_or(|cell| {
            cell.is_empty()
                || self
                    .spec
                    .blank_values
                    .as_ref()
                    .is_some_and(|blank| blank.iter().any(|b| *b == cell.text))
        })
    }

    /// Split a `list` cell into trimmed, non-empty items.
    #[must_use]
    pub fn split_list<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let separator = self.spec.separator.as_deref().unwrap_or(",");
        text.split(separator)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .collect()
    }
}

/// Syntax of a schema document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaSyntax {
    Json,
    Yaml,
}

impl SchemaSyntax {
    /// Syntax for a schema path, by extension.
    #[must_use]
    pub fn for_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Some(Self::Json),
            Some("yaml" | "yml") => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// A compiled registry schema.
#[derive(Debug, Clone)]
pub struct Schema {
    key: Option<String>,
    include_when: Option<String>,
    fields: Vec<CompiledField>,
    warnings: Vec<ExpectRule>,
}

impl Schema {
    /// Load and compile a schema document from disk.
    ///
    /// # Errors
    ///
    /// Returns `SourceUnreadable` if the file cannot be read or parsed, or if
    /// the document is inconsistent (see [`Schema::parse`]).
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let origin = path.display().to_string();
        let syntax = SchemaSyntax::for_path(path).ok_or_else(|| {
            LoadError::unreadable(
                &origin,
                "unsupported schema format (expected .json, .yaml or .yml)",
            )
        })?;
        let content = crate::registry::read_source_bounded(path, MAX_SCHEMA_SIZE)?;
        Self::parse(&content, syntax, &origin)
    }

    /// Parse and compile a schema document held in memory.
    ///
    /// # Errors
    ///
    /// Returns `SourceUnreadable` if the document does not parse, declares no
    /// fields, declares a field twice, references an undeclared field from a
    /// key or condition, uses a non-boolean field as a flag, has an invalid
    /// regex, or has unusable bounds.
    pub fn parse(content: &str, syntax: SchemaSyntax, origin: &str) -> Result<Self, LoadError> {
        let document: SchemaDocument = match syntax {
            SchemaSyntax::Json => serde_json::from_str(content)
                .map_err(|e| LoadError::unreadable(origin, format!("invalid schema JSON: {e}")))?,
            SchemaSyntax::Yaml => serde_saphyr::from_str(content)
                .map_err(|e| LoadError::unreadable(origin, format!("invalid schema YAML: {e}")))?,
        };
        Self::compile(document, origin)
    }

    fn compile(document: SchemaDocument, origin: &str) -> Result<Self, LoadError> {
        let invalid = |reason: String| LoadError::unreadable(origin, reason);

        if document.fields.is_empty() {
            return Err(invalid("schema declares no fields".to_owned()));
        }

        let mut fields: Vec<CompiledField> = Vec::with_capacity(document.fields.len());
        for spec in document.fields {
            let name = spec.name.trim();
            if name.is_empty() {
                return Err(invalid("schema field with an empty name".to_owned()));
            }
            if fields.iter().any(|f| f.name() == name) {
                return Err(invalid(format!("field '{name}' is declared twice")));
            }
            if (spec.min.is_some() || spec.max.is_some()) && !spec.field_type.is_numeric() {
                return Err(invalid(format!(
                    "field '{name}': min/max require an integer or number type, not {}",
                    spec.field_type.name()
                )));
            }
            if let Some(bound) = [spec.min, spec.max]
                .into_iter()
                .flatten()
                .find(|b| !b.is_finite())
            {
                return Err(invalid(format!("field '{name}': bound {bound} is not finite")));
            }
            if let (Some(min), Some(max)) = (spec.min, spec.max)
                && min > max
            {
                return Err(invalid(format!(
                    "field '{name}': min {min} is greater than max {max}"
                )));
            }
            if spec.separator.is_some() && spec.field_type != FieldType::List {
                return Err(invalid(format!(
                    "field '{name}': separator requires the list type"
                )));
            }
            if spec.endpoint_when.is_some() && spec.field_type != FieldType::Url {
                return Err(invalid(format!(
                    "field '{name}': endpoint_when requires the url type"
                )));
            }
            if spec.separator.as_deref() == Some("") {
                return Err(invalid(format!("field '{name}': separator is empty")));
            }
            let pattern = spec
                .pattern
                .as_deref()
                .map(Regex::new)
                .transpose()
                .map_err(|e| invalid(format!("field '{name}': invalid pattern: {e}")))?;

            let spec = FieldSpec {
                name: name.to_owned(),
                ..spec
            };
            fields.push(CompiledField { spec, pattern });
        }

        let schema = Self {
            key: document.key,
            include_when: document.include_when,
            fields,
            warnings: document.warnings,
        };

        if let Some(key) = &schema.key
            && schema.field(key).is_none()
        {
            return Err(invalid(format!("key '{key}' is not a declared field")));
        }
        if let Some(flag) = &schema.include_when {
            schema.require_boolean(flag, "include_when", origin)?;
        }
        for field in &schema.fields {
            if let Some(condition) = &field.spec.required_when {
                let context = format!("field '{}': required_when", field.name());
                schema.check_condition(condition, &context, origin)?;
            }
            if let Some(condition) = &field.spec.endpoint_when {
                let context = format!("field '{}': endpoint_when", field.name());
                schema.check_condition(condition, &context, origin)?;
            }
        }
        for rule in &schema.warnings {
            schema.check_values(&rule.when, "warnings: when", origin)?;
            schema.check_values(&rule.expect, "warnings: expect", origin)?;
        }

        tracing::debug!(origin, fields = schema.fields.len(), "schema compiled");
        Ok(schema)
    }

    fn check_condition(
        &self,
        condition: &Condition,
        context: &str,
        origin: &str,
    ) -> Result<(), LoadError> {
        match condition {
            Condition::Flag(flag) => self.require_boolean(flag, context, origin),
            Condition::Values(values) => self.check_values(values, context, origin),
        }
    }

    fn check_values(
        &self,
        condition: &ValueCondition,
        context: &str,
        origin: &str,
    ) -> Result<(), LoadError> {
        let field = &condition.field;
        if self.field(field).is_none() {
            return Err(LoadError::unreadable(
                origin,
                format!("{context} '{field}' is not a declared field"),
            ));
        }
        if condition.values.is_empty() {
            return Err(LoadError::unreadable(
                origin,
                format!("{context} '{field}' lists no values"),
            ));
        }
        Ok(())
    }

    fn require_boolean(&self, flag: &str, context: &str, origin: &str) -> Result<(), LoadError> {
        match self.field(flag) {
            None => Err(LoadError::unreadable(
                origin,
                format!("{context} '{flag}' is not a declared field"),
            )),
            Some(f) if f.field_type() != FieldType::Boolean => Err(LoadError::unreadable(
                origin,
                format!(
                    "{context} '{flag}' must be a boolean field, not {}",
                    f.field_type().name()
                ),
            )),
            Some(_) => Ok(()),
        }
    }

    /// Field declarations in schema order.
    #[must_use]
    pub fn fields(&self) -> &[CompiledField] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&CompiledField> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Field whose values key the records in keyed output layouts.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Boolean field that decides whether a record is exported.
    #[must_use]
    pub fn include_when(&self) -> Option<&str> {
        self.include_when.as_deref()
    }

    /// Schema-level cross-field warning rules.
    #[must_use]
    pub fn warnings(&self) -> &[ExpectRule] {
        &self.warnings
    }
}
