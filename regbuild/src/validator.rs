//! Record validation against a compiled [`Schema`].
//!
//! Validation is a pure function of the schema and the record set. Every
//! record is checked and every violation is kept; the caller decides what a
//! failed record means for the build. Findings that should not fail a build
//! are kept apart as [`Warning`]s.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{Violation, ViolationKind};
use crate::registry::{Cell, Record, RecordSet};
use crate::schema::{CompiledField, FieldType, Schema};

/// `HH:MM` on a 24-hour clock.
static TIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(r"^(?:[01]\d|2[0-3]):[0-5]\d$") {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid time regex: {err}"),
    }
});

/// Suffixes of URLs that serve data rather than a page.
const MACHINE_EXTENSIONS: [&str; 7] = [".xml", ".json", ".zip", ".csv", ".cap", ".atom", ".rss"];

/// A finding that does not fail the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct Warning {
    /// 0-based index of the record in the registry.
    pub record: usize,
    /// 1-based source line of the record.
    pub line: u64,
    pub field: String,
    /// Name of the rule (`unknown`, `endpoint`, `expect`).
    pub rule: String,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "record {} (line {}) | {}: {}",
            self.record, self.line, self.field, self.message
        )
    }
}

/// Outcome of validating one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// 0-based record index.
    pub record: usize,
    /// 1-based source line.
    pub line: u64,
    /// Violations in schema field order, then key uniqueness; empty when the
    /// record is valid.
    pub violations: Vec<Violation>,
    pub warnings: Vec<Warning>,
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Validate every record, in record order.
///
/// On top of the per-record rules, a schema `key` must be unique across the
/// whole registry: each later record reusing a key is an `InvalidValue`.
#[must_use]
pub fn validate_records(schema: &Schema, records: &RecordSet) -> Vec<ValidationResult> {
    let mut results: Vec<ValidationResult> = records
        .iter()
        .map(|record| validate_record(schema, record))
        .collect();
    if let Some(key) = schema.key() {
        check_unique_keys(key, records, &mut results);
    }
    results
}

/// Validate a single record against the per-record rules.
#[must_use]
pub fn validate_record(schema: &Schema, record: &Record) -> ValidationResult {
    let mut violations = Vec::new();
    let mut warnings = Vec::new();
    for field in schema.fields() {
        check_field(field, record, &mut violations);
        warn_field(field, record, &mut warnings);
    }
    for rule in schema.warnings() {
        if rule.when.holds(record) && !rule.expect.holds(record) {
            warnings.push(Warning {
                record: record.index,
                line: record.line,
                field: rule.expect.field.clone(),
                rule: "expect".to_owned(),
                message: rule.message_for(record.text(&rule.expect.field)),
            });
        }
    }
    ValidationResult {
        record: record.index,
        line: record.line,
        violations,
        warnings,
    }
}

fn check_unique_keys(key: &str, records: &RecordSet, results: &mut [ValidationResult]) {
    let mut first_use: HashMap<&str, usize> = HashMap::new();
    for (record, result) in records.iter().zip(results.iter_mut()) {
        let text = record.text(key);
        if text.is_empty() {
            continue;
        }
        match first_use.entry(text) {
            Entry::Vacant(entry) => {
                entry.insert(record.index);
            }
            Entry::Occupied(entry) => result.violations.push(Violation {
                record: record.index,
                line: record.line,
                field: key.to_owned(),
                kind: ViolationKind::InvalidValue,
                rule: "unique".to_owned(),
                actual: text.to_owned(),
                message: format!("duplicate key '{text}' (first used by record {})", entry.get()),
            }),
        }
    }
}

/// Whether a field is required for this particular record.
fn is_required(field: &CompiledField, record: &Record) -> bool {
    field.spec().required
        || field
            .spec()
            .required_when
            .as_ref()
            .is_some_and(|condition| condition.holds(record))
}

fn check_field(field: &CompiledField, record: &Record, out: &mut Vec<Violation>) {
    let name = field.name();
    let violation = |kind: ViolationKind, rule: &str, actual: &str, message: String| Violation {
        record: record.index,
        line: record.line,
        field: name.to_owned(),
        kind,
        rule: rule.to_owned(),
        actual: actual.to_owned(),
        message,
    };

    let cell = record.get(name);
    if field.is_blank(cell) && is_required(field, record) {
        let message = match &field.spec().required_when {
            Some(condition) if !field.spec().required => {
                format!("field is required when {condition}")
            }
            _ => "required field is empty".to_owned(),
        };
        let actual = cell.map_or("", |c| c.text.as_str());
        out.push(violation(ViolationKind::MissingField, "required", actual, message));
        return;
    }
    let Some(cell) = cell.filter(|c| !c.is_empty()) else {
        return;
    };
    let text = cell.text.as_str();

    let type_ok = match field.field_type() {
        FieldType::String | FieldType::List => true,
        FieldType::Integer => cell.as_integer().is_some(),
        FieldType::Number => cell.as_number().is_some(),
        FieldType::Boolean => cell.as_bool().is_some(),
        FieldType::Time => TIME_PATTERN.is_match(text),
        FieldType::Url => text.starts_with("http://") || text.starts_with("https://"),
    };
    if !type_ok {
        out.push(violation(
            ViolationKind::TypeMismatch,
            "type",
            text,
            format!("expected {}, got '{text}'", type_description(field.field_type())),
        ));
        return;
    }

    let items = items(field, cell);

    if let Some(allowed) = &field.spec().allowed {
        for &item in &items {
            if !allowed.iter().any(|a| a == item) {
                out.push(violation(
                    ViolationKind::InvalidValue,
                    "enum",
                    item,
                    format!("invalid value '{item}'. Allowed: {allowed:?}"),
                ));
            }
        }
    }

    if let Some(pattern) = field.pattern() {
        for &item in &items {
            if !pattern.is_match(item) {
                out.push(violation(
                    ViolationKind::InvalidValue,
                    "pattern",
                    item,
                    format!("'{item}' does not match pattern {}", pattern.as_str()),
                ));
            }
        }
    }

    if let Some(value) = cell.as_number() {
        if let Some(min) = field.spec().min
            && value < min
        {
            out.push(violation(
                ViolationKind::InvalidValue,
                "min",
                text,
                format!("{text} is below the minimum {min}"),
            ));
        }
        if let Some(max) = field.spec().max
            && value > max
        {
            out.push(violation(
                ViolationKind::InvalidValue,
                "max",
                text,
                format!("{text} is above the maximum {max}"),
            ));
        }
    }
}

fn warn_field(field: &CompiledField, record: &Record, out: &mut Vec<Warning>) {
    let Some(cell) = record.get(field.name()).filter(|c| !c.is_empty()) else {
        return;
    };
    let warning = |rule: &str, message: String| Warning {
        record: record.index,
        line: record.line,
        field: field.name().to_owned(),
        rule: rule.to_owned(),
        message,
    };

    if let Some(known) = &field.spec().known_values {
        for item in items(field, cell) {
            if !known.iter().any(|k| k == item) {
                out.push(warning(
                    "unknown",
                    format!("unknown or disabled value '{item}'"),
                ));
            }
        }
    }

    if let Some(condition) = &field.spec().endpoint_when
        && condition.holds(record)
        && looks_like_landing_page(&cell.text)
    {
        out.push(warning(
            "endpoint",
            format!(
                "'{}' looks like a landing page, not a machine endpoint \
                 (when {condition})",
                cell.text
            ),
        ));
    }
}

/// Values the item-wise rules apply to: list items, or the whole text.
fn items<'a>(field: &CompiledField, cell: &'a Cell) -> Vec<&'a str> {
    if field.field_type() == FieldType::List {
        field.split_list(&cell.text)
    } else {
        vec![cell.text.as_str()]
    }
}

/// Whether a URL looks like a human-facing page rather than a data endpoint.
#[must_use]
pub fn looks_like_landing_page(url: &str) -> bool {
    let url = url.trim().to_ascii_lowercase();
    if url.is_empty() || MACHINE_EXTENSIONS.iter().any(|ext| url.ends_with(ext)) {
        return false;
    }
    url.contains("data.slovensko.sk/datasety")
        || url.ends_with(".html")
        || url.contains("/index")
        || !["api", "download", "export"].iter().any(|word| url.contains(word))
}

const fn type_description(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String => "text",
        FieldType::Integer => "an integer",
        FieldType::Number => "a number",
        FieldType::Boolean => "a boolean (true/false/yes/no/1/0)",
        FieldType::Time => "a time in HH:MM format",
        FieldType::Url => "an http(s) URL",
        FieldType::List => "a list",
    }
}
