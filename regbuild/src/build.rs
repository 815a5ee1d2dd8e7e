//! Build orchestration.
//!
//! A build moves through `Idle → Loading → Validating → Rendering → Done`.
//! Any phase can end in `Failed`; a failed build has written nothing. Errors
//! are accumulated within a phase and the build only stops at a phase
//! boundary, so one run reports everything wrong with its inputs at that
//! stage.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::artifact::commit_artifacts;
use crate::config::{BuildConfig, OutputFormat, check_build_id};
use crate::contract::Contract;
use crate::document::ExportDocument;
use crate::error::{BuildError, LoadError};
use crate::registry::load_registry;
use crate::render::render_all;
use crate::report::BuildReport;
use crate::schema::Schema;
use crate::validator::{Warning, validate_records};

/// Lifecycle state of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildPhase {
    Idle,
    Loading,
    Validating,
    Rendering,
    Done,
    Failed,
}

impl BuildPhase {
    /// `Done` and `Failed` end a build.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Validating => "validating",
            Self::Rendering => "rendering",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// Mutable state of one running build.
struct Build<'a> {
    config: &'a BuildConfig,
    phase: BuildPhase,
    formats: Vec<OutputFormat>,
    records_loaded: usize,
    records_invalid: usize,
    records_exported: usize,
    errors: Vec<BuildError>,
    warnings: Vec<Warning>,
}

impl<'a> Build<'a> {
    const fn new(config: &'a BuildConfig) -> Self {
        Self {
            config,
            phase: BuildPhase::Idle,
            formats: Vec::new(),
            records_loaded: 0,
            records_invalid: 0,
            records_exported: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn advance(&mut self, next: BuildPhase) {
        tracing::debug!(
            build_id = %self.config.build_id,
            from = %self.phase,
            to = %next,
            "build phase"
        );
        self.phase = next;
    }

    fn failed(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Keep the value, or record the error and keep going.
    fn collect<T, E: Into<BuildError>>(&mut self, result: Result<T, E>) -> Option<T> {
        result.map_err(|e| self.errors.push(e.into())).ok()
    }

    fn extend<E: Into<BuildError>>(&mut self, errors: impl IntoIterator<Item = E>) {
        self.errors.extend(errors.into_iter().map(Into::into));
    }

    fn fail(mut self) -> BuildReport {
        tracing::warn!(
            build_id = %self.config.build_id,
            phase = %self.phase,
            errors = self.errors.len(),
            "build failed"
        );
        self.advance(BuildPhase::Failed);
        self.into_report(Vec::new())
    }

    fn finish(mut self, artifacts: Vec<PathBuf>) -> BuildReport {
        tracing::info!(
            build_id = %self.config.build_id,
            records = self.records_exported,
            artifacts = artifacts.len(),
            warnings = self.warnings.len(),
            "build complete"
        );
        self.advance(BuildPhase::Done);
        self.into_report(artifacts)
    }

    fn into_report(self, artifacts: Vec<PathBuf>) -> BuildReport {
        BuildReport {
            build_id: self.config.build_id.clone(),
            phase: self.phase,
            ok: self.phase == BuildPhase::Done,
            formats: self.formats,
            records_loaded: self.records_loaded,
            records_invalid: self.records_invalid,
            records_exported: self.records_exported,
            artifacts,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

/// Run one build to completion.
///
/// The returned report carries the outcome; this function itself never
/// fails. Nothing is written to `config.out_dir` unless every phase
/// succeeded.
#[must_use]
pub fn run_build(config: &BuildConfig) -> BuildReport {
    let mut build = Build::new(config);

    // Invocation parameters are checked before any input is touched.
    let formats = build.collect(
        OutputFormat::parse_selector(&config.format_selector)
            .map_err(|reason| LoadError::unreadable("format selector", reason)),
    );
    build.collect(
        check_build_id(&config.build_id)
            .map_err(|reason| LoadError::unreadable("build id", reason)),
    );
    let Some(formats) = formats.filter(|_| !build.failed()) else {
        return build.fail();
    };
    build.formats = formats;

    build.advance(BuildPhase::Loading);
    let schema = build.collect(Schema::load(&config.schema));
    let records = build.collect(load_registry(&config.input, config.max_source_size));
    let contract = match config.contract.as_deref() {
        Some(path) => build.collect(Contract::load(path)).map(Some),
        None => Some(None),
    };
    let (Some(schema), Some(records), Some(contract)) = (schema, records, contract) else {
        return build.fail();
    };
    build.records_loaded = records.len();

    build.advance(BuildPhase::Validating);
    for result in validate_records(&schema, &records) {
        if !result.is_valid() {
            build.records_invalid += 1;
            build.extend(result.violations);
        }
        build.warnings.extend(result.warnings);
    }
    if !build.warnings.is_empty() {
        tracing::info!(warnings = build.warnings.len(), "validation warnings");
    }
    if build.failed() {
        return build.fail();
    }

    let mut document = ExportDocument::project(&config.build_id, &schema, &records);
    if config.normalize_tags {
        document.normalize_tags(&schema);
    }
    build.records_exported = document.record_count();
    if let Some(contract) = &contract
        && let Err(violations) = contract.check(&document.to_value())
    {
        build.extend(violations);
        return build.fail();
    }

    build.advance(BuildPhase::Rendering);
    let results = render_all(
        &build.formats,
        &document,
        &schema,
        &config.out_dir,
        config.parallel_render,
    );
    let mut artifacts = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(artifact) => {
                tracing::debug!(
                    format = %artifact.format,
                    bytes = artifact.content.len(),
                    "rendered"
                );
                artifacts.push(artifact);
            }
            Err(errors) => build.extend(errors),
        }
    }
    if build.failed() {
        return build.fail();
    }

    match commit_artifacts(&config.out_dir, &artifacts) {
        Ok(paths) => build.finish(paths),
        Err(errors) => {
            build.extend(errors);
            build.fail()
        }
    }
}
