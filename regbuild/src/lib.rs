//! # regbuild
//!
//! Registry build pipeline: loads a tabular source registry, validates every
//! record against a schema, and renders the result into one or more build
//! artifacts.
//!
//! A build is all-or-nothing. Every error found in a phase is collected and
//! reported; if there is any, nothing is written.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use regbuild::{BuildConfig, run_build};
//!
//! let mut config = BuildConfig::new("registry.csv", "schema.yaml", "build");
//! config.format_selector = "all".to_owned();
//!
//! let report = run_build(&config);
//! println!("Records exported: {}", report.records_exported);
//! for error in &report.errors {
//!     println!("{}", error.format_human_readable());
//! }
//! for warning in &report.warnings {
//!     println!("warning: {warning}");
//! }
//! std::process::exit(report.exit_code());
//! ```

pub mod artifact;
mod build;
mod config;
pub mod contract;
pub mod document;
mod error;
pub mod output;
pub mod registry;
pub mod render;
mod report;
pub mod schema;
pub mod validator;

pub use build::{BuildPhase, run_build};
pub use config::{BuildConfig, OutputFormat, check_build_id};
pub use error::{
    BuildError, ContractViolation, ErrorKind, LoadError, Phase, RenderError, Violation,
    ViolationKind, WriteError,
};
pub use report::BuildReport;
pub use validator::Warning;
