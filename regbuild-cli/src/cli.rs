//! Argument parsing and the build command.

// The CLI reports on stdout (written artifacts) and stderr (build report).
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::fs::File;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use colored::Colorize;
use regbuild::{BuildConfig, BuildReport, output, run_build};

use crate::logging;

/// Style of the build report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Human,
    Json,
}

/// Build registry artifacts from a tabular registry and a schema.
#[derive(Debug, Parser)]
#[command(name = "regbuild", version, about)]
pub struct Cli {
    /// Registry source (.csv or .tsv)
    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,

    /// Schema document (.json, .yaml or .yml)
    #[arg(long, value_name = "PATH")]
    pub schema: PathBuf,

    /// Directory that receives the artifacts
    #[arg(long, value_name = "DIR", default_value = "build")]
    pub outdir: PathBuf,

    /// Output formats: json, yaml, markdown, both, all, or a comma list
    #[arg(long, value_name = "SEL", default_value = "both")]
    pub format: String,

    /// Artifact file stem
    #[arg(long, value_name = "ID", default_value = "registry")]
    pub build_id: String,

    /// JSON Schema the exported document must satisfy
    #[arg(long, value_name = "PATH")]
    pub contract: Option<PathBuf>,

    /// Render formats concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Export list items as stable ASCII tag ids plus a display-name map
    #[arg(long)]
    pub normalize_tags: bool,

    /// Style of the report printed on stderr
    #[arg(long, value_enum, default_value_t = ReportFormat::Human)]
    pub report_format: ReportFormat,

    /// Also write the report to this file
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// The build configuration these arguments describe.
    #[must_use]
    pub fn to_config(&self) -> BuildConfig {
        let mut config = BuildConfig::new(&self.input, &self.schema, &self.outdir);
        config.format_selector.clone_from(&self.format);
        config.build_id.clone_from(&self.build_id);
        config.contract.clone_from(&self.contract);
        config.parallel_render = self.parallel;
        config.normalize_tags = self.normalize_tags;
        config
    }
}

/// Parse the process arguments and run the build.
///
/// Returns the exit status: `0` success, `2` build failure, `1` usage error.
///
/// # Errors
///
/// Returns an error if the report cannot be written.
pub fn run() -> anyhow::Result<i32> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = i32::from(err.use_stderr());
            err.print()?;
            return Ok(code);
        }
    };
    logging::init(cli.verbose);
    execute(&cli)
}

/// Run the build described by `cli` and report the outcome.
///
/// # Errors
///
/// Returns an error if the report cannot be written.
pub fn execute(cli: &Cli) -> anyhow::Result<i32> {
    let report = run_build(&cli.to_config());

    let mut stderr = std::io::stderr().lock();
    write_report(&report, cli.report_format, &mut stderr)?;

    if let Some(path) = &cli.report {
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create report file {}", path.display()))?;
        write_report(&report, cli.report_format, &mut file)
            .with_context(|| format!("Failed to write report file {}", path.display()))?;
    }

    if !std::io::stderr().is_terminal() {
        colored::control::set_override(false);
    }
    if report.ok {
        for path in &report.artifacts {
            println!("Wrote {}", path.display());
        }
        let summary = if report.warnings.is_empty() {
            format!("build '{}' succeeded", report.build_id)
        } else {
            format!(
                "build '{}' succeeded ({} warnings)",
                report.build_id,
                report.warnings_count()
            )
        };
        writeln!(stderr, "{}", summary.as_str().green().bold())?;
    } else {
        let summary = format!(
            "build '{}' failed ({} errors)",
            report.build_id,
            report.errors_count()
        );
        writeln!(stderr, "{}", summary.as_str().red().bold())?;
    }

    Ok(report.exit_code())
}

fn write_report(
    report: &BuildReport,
    format: ReportFormat,
    writer: &mut dyn Write,
) -> anyhow::Result<()> {
    match format {
        ReportFormat::Human => output::write_human(report, writer),
        ReportFormat::Json => output::write_json(report, writer),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use regbuild::OutputFormat;

    #[test]
    fn test_defaults() {
        let cli =
            Cli::try_parse_from(["regbuild", "--input", "r.csv", "--schema", "s.yaml"]).unwrap();
        assert_eq!(cli.outdir, PathBuf::from("build"));
        assert_eq!(cli.format, "both");
        assert_eq!(cli.report_format, ReportFormat::Human);
        assert_eq!(cli.verbose, 0);

        let config = cli.to_config();
        assert_eq!(config.input, PathBuf::from("r.csv"));
        assert_eq!(config.build_id, "registry");
        assert!(!config.parallel_render);
        assert!(!config.normalize_tags);
        assert_eq!(
            OutputFormat::parse_selector(&config.format_selector).unwrap(),
            vec![OutputFormat::Json, OutputFormat::Yaml]
        );
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::try_parse_from([
            "regbuild",
            "--input",
            "r.tsv",
            "--schema",
            "s.json",
            "--outdir",
            "dist",
            "--format",
            "md,json",
            "--build-id",
            "sources",
            "--contract",
            "c.json",
            "--parallel",
            "--normalize-tags",
            "--report-format",
            "json",
            "--report",
            "report.json",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.report_format, ReportFormat::Json);
        assert_eq!(cli.report, Some(PathBuf::from("report.json")));
        assert_eq!(cli.verbose, 2);

        let config = cli.to_config();
        assert_eq!(config.out_dir, PathBuf::from("dist"));
        assert_eq!(config.format_selector, "md,json");
        assert_eq!(config.build_id, "sources");
        assert_eq!(config.contract, Some(PathBuf::from("c.json")));
        assert!(config.parallel_render);
        assert!(config.normalize_tags);
    }

    #[test]
    fn test_input_is_required() {
        assert!(Cli::try_parse_from(["regbuild", "--schema", "s.yaml"]).is_err());
    }
}
