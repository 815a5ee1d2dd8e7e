//! Error types for the registry build.
//!
//! Every failure a build can report is a [`BuildError`]. The variants wrap
//! one error type per phase so callers can still match on the detail, while
//! [`BuildError::phase`] and [`BuildError::kind`] give the flat taxonomy used
//! in reports.

use std::fmt;
use std::path::PathBuf;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::config::OutputFormat;

/// Pipeline phase an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Load,
    Validate,
    Render,
    Write,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Validate => "validate",
            Self::Render => "render",
            Self::Write => "write",
        })
    }
}

/// Flat error taxonomy shared by every phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An input (registry, schema, contract or invocation parameter) cannot be used.
    SourceUnreadable,
    /// The registry header row names no fields.
    EmptySchema,
    /// A required field is empty or absent.
    MissingField,
    /// A value does not parse as the declared field type.
    TypeMismatch,
    /// A value violates an enumeration, pattern or range constraint.
    InvalidValue,
    /// A renderer could not represent the export document.
    RenderFailure,
    /// The export document does not satisfy the contract JSON Schema.
    ContractViolation,
    /// An artifact could not be committed to the output directory.
    WriteFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A fatal problem with one of the build inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum LoadError {
    /// Missing, corrupt, oversized or structurally unsupported input.
    #[error("{origin}: {reason}")]
    SourceUnreadable {
        /// Path (or parameter name) of the offending input.
        origin: String,
        /// Human-readable description of the failure.
        reason: String,
    },
    /// The registry header row has no named column.
    #[error("{origin}: header row names no fields")]
    EmptySchema {
        /// Path of the registry source.
        origin: String,
    },
}

impl LoadError {
    /// `SourceUnreadable` for `origin`.
    #[must_use]
    pub fn unreadable(origin: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::SourceUnreadable {
            origin: origin.to_string(),
            reason: reason.into(),
        }
    }

    /// Taxonomy entry for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceUnreadable { .. } => ErrorKind::SourceUnreadable,
            Self::EmptySchema { .. } => ErrorKind::EmptySchema,
        }
    }
}

/// Per-record rule classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViolationKind {
    MissingField,
    TypeMismatch,
    InvalidValue,
}

impl From<ViolationKind> for ErrorKind {
    fn from(kind: ViolationKind) -> Self {
        match kind {
            ViolationKind::MissingField => Self::MissingField,
            ViolationKind::TypeMismatch => Self::TypeMismatch,
            ViolationKind::InvalidValue => Self::InvalidValue,
        }
    }
}

/// A single field-level rule violation in one registry record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record {record} (line {line}) | {field}: {message}")]
#[non_exhaustive]
pub struct Violation {
    /// 0-based index of the record in the registry.
    pub record: usize,
    /// 1-based source line of the record.
    pub line: u64,
    /// Field the rule applies to.
    pub field: String,
    /// Rule class.
    pub kind: ViolationKind,
    /// Name of the violated rule (`required`, `type`, `enum`, `pattern`, `min`,
    /// `max`, `unique`).
    pub rule: String,
    /// Raw cell text (empty for missing fields).
    pub actual: String,
    /// Human-readable description.
    pub message: String,
}

/// A renderer-specific failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub struct RenderError {
    /// Format whose renderer failed.
    pub format: OutputFormat,
    /// 0-based registry record index, when the failure is tied to a record.
    pub record: Option<usize>,
    /// Field involved, when known.
    pub field: Option<String>,
    /// Human-readable description.
    pub reason: String,
}

impl RenderError {
    #[must_use]
    pub fn new(
        format: OutputFormat,
        record: Option<usize>,
        field: Option<&str>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            format,
            record,
            field: field.map(str::to_owned),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} renderer", self.format)?;
        if let Some(record) = self.record {
            write!(f, " | record {record}")?;
        }
        if let Some(field) = &self.field {
            write!(f, " | {field}")?;
        }
        write!(f, ": {}", self.reason)
    }
}

/// The export document does not satisfy the contract schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("contract: {path}: {message}")]
#[non_exhaustive]
pub struct ContractViolation {
    /// JSON pointer to the offending value; `/` for the document itself.
    pub path: String,
    /// Message reported by the JSON Schema validator.
    pub message: String,
}

/// An artifact could not be committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {reason}", .path.display())]
#[non_exhaustive]
pub struct WriteError {
    /// Path being written.
    pub path: PathBuf,
    /// Human-readable description.
    pub reason: String,
}

/// Any error collected during a build, in report order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BuildError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Validation(#[from] Violation),
    #[error(transparent)]
    Contract(#[from] ContractViolation),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

impl BuildError {
    /// Phase that raised the error.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self {
            Self::Load(_) => Phase::Load,
            Self::Validation(_) | Self::Contract(_) => Phase::Validate,
            Self::Render(_) => Phase::Render,
            Self::Write(_) => Phase::Write,
        }
    }

    /// Taxonomy entry for the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Load(e) => e.kind(),
            Self::Validation(v) => v.kind.into(),
            Self::Contract(_) => ErrorKind::ContractViolation,
            Self::Render(_) => ErrorKind::RenderFailure,
            Self::Write(_) => ErrorKind::WriteFailure,
        }
    }

    /// Registry record the error points at, if any.
    #[must_use]
    pub const fn record(&self) -> Option<usize> {
        match self {
            Self::Validation(v) => Some(v.record),
            Self::Render(r) => r.record,
            _ => None,
        }
    }

    /// Field the error points at, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation(v) => Some(&v.field),
            Self::Render(r) => r.field.as_deref(),
            _ => None,
        }
    }

    /// Format the error for human-readable output.
    ///
    /// `[{phase}] {kind}: {detail}`
    #[must_use]
    pub fn format_human_readable(&self) -> String {
        format!("[{}] {}: {self}", self.phase(), self.kind())
    }
}

impl Serialize for BuildError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BuildError", 5)?;
        state.serialize_field("phase", &self.phase())?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("record", &self.record())?;
        state.serialize_field("field", &self.field())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}
