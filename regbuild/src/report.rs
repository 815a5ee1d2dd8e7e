//! Build report types.

use std::path::PathBuf;

use serde::Serialize;

use crate::build::BuildPhase;
use crate::config::OutputFormat;
use crate::error::{BuildError, Phase};
use crate::validator::Warning;

/// Result of one build.
///
/// `ok` is true only when every requested artifact was written. On failure
/// `artifacts` is always empty and `errors` holds everything collected, in
/// phase order. `warnings` never affect `ok`.
#[derive(Debug, Clone, Serialize)]
#[non_exhaustive]
pub struct BuildReport {
    pub build_id: String,
    /// Terminal phase: `done` or `failed`.
    pub phase: BuildPhase,
    pub ok: bool,
    /// Formats requested, empty if the selector could not be parsed.
    pub formats: Vec<OutputFormat>,
    /// Records read from the registry.
    pub records_loaded: usize,
    /// Records with at least one violation.
    pub records_invalid: usize,
    /// Records in the export document (after `include_when`).
    pub records_exported: usize,
    /// Paths written, in requested-format order.
    pub artifacts: Vec<PathBuf>,
    pub errors: Vec<BuildError>,
    /// Non-fatal findings, in record order.
    pub warnings: Vec<Warning>,
}

impl BuildReport {
    /// Process exit status for this outcome: `0` on success, `2` on failure.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        if self.ok { 0 } else { 2 }
    }

    /// Number of errors collected.
    #[must_use]
    pub fn errors_count(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn warnings_count(&self) -> usize {
        self.warnings.len()
    }

    /// Errors raised in one phase, in report order.
    pub fn errors_in(&self, phase: Phase) -> impl Iterator<Item = &BuildError> {
        self.errors.iter().filter(move |e| e.phase() == phase)
    }
}
