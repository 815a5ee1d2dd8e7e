//! Shared output formatting for build reports.
//!
//! Provides JSON and plain-text formatters for `BuildReport`. Colour is left
//! to the CLI layer.

use std::io::Write;

use crate::config::OutputFormat;
use crate::error::Phase;
use crate::report::BuildReport;

/// Format a `BuildReport` as JSON to a writer.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json(report: &BuildReport, writer: &mut dyn Write) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    writeln!(writer, "{json}")?;
    Ok(())
}

/// Format a `BuildReport` as human-readable plain text to a writer.
///
/// Errors are grouped by phase, each group in report order, followed by the
/// warnings.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human(report: &BuildReport, writer: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(writer)?;
    writeln!(writer, "{}", "=".repeat(80))?;
    writeln!(writer, "  REGISTRY BUILD: {}", report.build_id)?;
    writeln!(writer, "{}", "=".repeat(80))?;
    writeln!(writer)?;
    let formats: Vec<&str> = report
        .formats
        .iter()
        .copied()
        .map(OutputFormat::name)
        .collect();
    writeln!(writer, "  Formats:          {}", formats.join(", "))?;
    writeln!(writer, "  Records loaded:   {}", report.records_loaded)?;
    writeln!(writer, "  Records invalid:  {}", report.records_invalid)?;
    writeln!(writer, "  Records exported: {}", report.records_exported)?;
    writeln!(writer, "  Errors found:     {}", report.errors_count())?;
    writeln!(writer, "  Warnings:         {}", report.warnings_count())?;
    writeln!(writer)?;

    for (phase, title) in [
        (Phase::Load, "LOAD ERRORS"),
        (Phase::Validate, "VALIDATION ERRORS"),
        (Phase::Render, "RENDER ERRORS"),
        (Phase::Write, "WRITE ERRORS"),
    ] {
        let mut errors = report.errors_in(phase).peekable();
        if errors.peek().is_none() {
            continue;
        }
        writeln!(writer, "{}", "-".repeat(80))?;
        writeln!(writer, "  {title}")?;
        writeln!(writer, "{}", "-".repeat(80))?;
        for error in errors {
            writeln!(writer, "{}", error.format_human_readable())?;
        }
        writeln!(writer)?;
    }

    if !report.warnings.is_empty() {
        writeln!(writer, "{}", "-".repeat(80))?;
        writeln!(writer, "  WARNINGS")?;
        writeln!(writer, "{}", "-".repeat(80))?;
        for warning in &report.warnings {
            writeln!(writer, "[warn] {}: {warning}", warning.rule)?;
        }
        writeln!(writer)?;
    }

    writeln!(writer, "{}", "=".repeat(80))?;
    if report.ok {
        writeln!(
            writer,
            "\u{2713} Wrote {} artifact(s) from {} record(s)",
            report.artifacts.len(),
            report.records_exported
        )?;
    } else {
        writeln!(
            writer,
            "\u{2717} Build failed with {} error(s); no artifacts were written",
            report.errors_count()
        )?;
    }
    writeln!(writer, "{}", "=".repeat(80))?;

    Ok(())
}
