//! Configuration types for a registry build.
//!
//! A build is driven entirely by an explicit [`BuildConfig`] handed to
//! [`run_build`](crate::run_build). Nothing is read from ambient process
//! state, so two builds with equal configs and equal inputs are equivalent.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Format of a single build artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum OutputFormat {
    /// Pretty-printed JSON document.
    Json,
    /// YAML document, keyed by the schema `key` field when one is declared.
    Yaml,
    /// Human-readable Markdown table.
    Markdown,
}

impl OutputFormat {
    /// Every supported format, in canonical order.
    pub const ALL: [Self; 3] = [Self::Json, Self::Yaml, Self::Markdown];

    /// File extension used for artifacts of this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Markdown => "md",
        }
    }

    /// Lowercase display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Markdown => "markdown",
        }
    }

    /// Parse a format selector into the list of requested formats.
    ///
    /// Accepts a single format (`json`, `yaml`/`yml`, `markdown`/`md`), the
    /// groups `both` (json + yaml) and `all`, or a comma-separated list of
    /// any of those. Duplicates are dropped, first occurrence wins.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the selector is empty or
    /// names an unknown format.
    pub fn parse_selector(selector: &str) -> Result<Vec<Self>, String> {
        let mut formats = Vec::new();
        for token in selector.split(',').map(str::trim) {
            let group: &[Self] = match token.to_ascii_lowercase().as_str() {
                "json" => &[Self::Json],
                "yaml" | "yml" => &[Self::Yaml],
                "markdown" | "md" => &[Self::Markdown],
                "both" => &[Self::Json, Self::Yaml],
                "all" => &Self::ALL,
                "" => continue,
                _ => {
                    return Err(format!(
                        "unknown output format '{token}' \
                         (expected json, yaml, markdown, both or all)"
                    ));
                }
            };
            for format in group {
                if !formats.contains(format) {
                    formats.push(*format);
                }
            }
        }
        if formats.is_empty() {
            return Err("no output format requested".to_owned());
        }
        Ok(formats)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Check that a build identifier is usable as an artifact file stem.
///
/// # Errors
///
/// Returns a description of the problem if the identifier is empty, starts
/// with `.`, or contains anything other than ASCII letters, digits, `_`,
/// `-` and `.`.
pub fn check_build_id(build_id: &str) -> Result<(), String> {
    if build_id.is_empty() {
        return Err("build id is empty".to_owned());
    }
    if build_id.starts_with('.') {
        return Err(format!("build id '{build_id}' must not start with '.'"));
    }
    if let Some(bad) = build_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(format!(
            "build id '{build_id}' contains unsupported character {bad:?}"
        ));
    }
    Ok(())
}

/// Everything one build invocation needs.
///
/// `input`, `schema` and `out_dir` have no meaningful default; use
/// [`BuildConfig::new`] and adjust the remaining fields as needed.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct BuildConfig {
    /// Registry source (`.csv` or `.tsv`).
    pub input: PathBuf,
    /// Schema document (`.json`, `.yaml` or `.yml`).
    pub schema: PathBuf,
    /// Directory that receives the artifacts.
    pub out_dir: PathBuf,
    /// Raw format selector, parsed at the start of the build
    /// (see [`OutputFormat::parse_selector`]).
    pub format_selector: String,
    /// Artifact file stem (default: `registry`).
    pub build_id: String,
    /// Optional JSON Schema the export document must satisfy.
    pub contract: Option<PathBuf>,
    /// Render the requested formats on scoped threads.
    pub parallel_render: bool,
    /// Export `list` items as ASCII tag ids with a `tag_display` map.
    pub normalize_tags: bool,
    /// Maximum registry source size in bytes (default: 10 MB).
    pub max_source_size: u64,
}

impl BuildConfig {
    /// Config for the given inputs with every other option at its default.
    #[must_use]
    pub fn new(
        input: impl Into<PathBuf>,
        schema: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input: input.into(),
            schema: schema.into(),
            out_dir: out_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            schema: PathBuf::new(),
            out_dir: PathBuf::from("build"),
            format_selector: "both".to_owned(),
            build_id: "registry".to_owned(),
            contract: None,
            parallel_render: false,
            normalize_tags: false,
            max_source_size: 10_485_760,
        }
    }
}
