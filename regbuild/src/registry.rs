//! Registry loader.
//!
//! Reads a delimited spreadsheet export (`.csv` or `.tsv`) into a
//! [`RecordSet`]. The field set is whatever the header row names; nothing
//! about the registry layout is hard-coded here.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::error::LoadError;

/// Scalar value inferred from a trimmed cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Empty,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Infer the scalar for a trimmed cell text.
    #[must_use]
    pub fn infer(text: &str) -> Self {
        if text.is_empty() {
            return Self::Empty;
        }
        if text.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if text.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if let Ok(i) = text.parse::<i64>() {
            return Self::Integer(i);
        }
        // "inf" and "NaN" parse as f64 but are not numbers in a registry.
        match text.parse::<f64>() {
            Ok(f) if f.is_finite() => Self::Float(f),
            _ => Self::Text(text.to_owned()),
        }
    }
}

/// One registry cell: the trimmed source text and its inferred scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub text: String,
    pub scalar: Scalar,
}

impl Cell {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let scalar = Scalar::infer(&text);
        Self { text, scalar }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Boolean reading: `true`/`false`/`yes`/`no`/`1`/`0`, case-insensitive.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self.text.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }

    /// Integer reading. Floats with a zero fraction (`6.0`) count as integers.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_integer(&self) -> Option<i64> {
        match self.scalar {
            Scalar::Integer(i) => Some(i),
            Scalar::Float(f) if f.fract() == 0.0 && (-9.0e18..=9.0e18).contains(&f) => {
                Some(f as i64)
            }
            _ => None,
        }
    }

    /// Finite numeric reading.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self.scalar {
            Scalar::Integer(_) | Scalar::Float(_) => {
                self.text.parse::<f64>().ok().filter(|f| f.is_finite())
            }
            _ => None,
        }
    }
}

/// One registry row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 0-based position among the non-blank data rows.
    pub index: usize,
    /// 1-based line in the source file.
    pub line: u64,
    cells: BTreeMap<String, Cell>,
}

impl Record {
    #[must_use]
    pub fn new(index: usize, line: u64, cells: BTreeMap<String, Cell>) -> Self {
        Self { index, line, cells }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Cell> {
        self.cells.get(field)
    }

    /// Trimmed text of a field; empty when the field is absent.
    #[must_use]
    pub fn text(&self, field: &str) -> &str {
        self.cells.get(field).map_or("", |c| c.text.as_str())
    }

    /// `true` when the field is absent or its cell is blank.
    #[must_use]
    pub fn is_blank(&self, field: &str) -> bool {
        self.cells.get(field).is_none_or(Cell::is_empty)
    }
}

/// Ordered registry contents.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSet {
    /// Field names in header order.
    pub headers: Vec<String>,
    /// Records in source order.
    pub records: Vec<Record>,
}

impl RecordSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }
}

/// Field delimiter for a registry path, by extension.
#[must_use]
pub fn delimiter_for(path: &Path) -> Option<u8> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("csv") => Some(b','),
        Some("tsv") => Some(b'\t'),
        _ => None,
    }
}

/// Load a registry source from disk.
///
/// # Errors
///
/// - `SourceUnreadable` if the file is missing, oversized, not UTF-8, has an
///   unsupported extension, or is structurally broken.
/// - `EmptySchema` if the header row names no fields.
pub fn load_registry(path: &Path, max_size: u64) -> Result<RecordSet, LoadError> {
    let origin = path.display().to_string();
    let delimiter = delimiter_for(path).ok_or_else(|| {
        LoadError::unreadable(&origin, "unsupported registry format (expected .csv or .tsv)")
    })?;
    let content = read_source_bounded(path, max_size)?;
    parse_registry(&content, delimiter, &origin)
}

/// Parse registry content that is already in memory.
///
/// # Errors
///
/// Same as [`load_registry`], minus the file-level failures.
pub fn parse_registry(content: &str, delimiter: u8, origin: &str) -> Result<RecordSet, LoadError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());
    let mut rows = reader.records();

    let header_row = match rows.next() {
        None => {
            return Err(LoadError::EmptySchema {
                origin: origin.to_owned(),
            });
        }
        Some(Err(e)) => {
            return Err(LoadError::unreadable(origin, format!("malformed header row: {e}")));
        }
        Some(Ok(row)) => row,
    };
    let headers = discover_headers(&header_row, origin)?;

    let mut records = Vec::new();
    for row in rows {
        let row = row.map_err(|e| LoadError::unreadable(origin, format!("malformed row: {e}")))?;
        let line = row.position().map_or(0, csv::Position::line);

        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        if let Some(column) = row
            .iter()
            .skip(headers.len())
            .position(|cell| !cell.trim().is_empty())
        {
            return Err(LoadError::unreadable(
                origin,
                format!(
                    "line {line}: column {} has a value but no header",
                    headers.len() + column + 1
                ),
            ));
        }

        let cells = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), Cell::new(row.get(i).unwrap_or("").trim())))
            .collect();
        records.push(Record::new(records.len(), line, cells));
    }

    tracing::debug!(
        origin,
        fields = headers.len(),
        records = records.len(),
        "registry loaded"
    );
    Ok(RecordSet { headers, records })
}

/// Turn the header row into field names, dropping trailing blank columns.
fn discover_headers(row: &csv::StringRecord, origin: &str) -> Result<Vec<String>, LoadError> {
    let names: Vec<&str> = row.iter().map(str::trim).collect();
    let Some(last) = names.iter().rposition(|n| !n.is_empty()) else {
        return Err(LoadError::EmptySchema {
            origin: origin.to_owned(),
        });
    };

    let mut headers: Vec<String> = Vec::with_capacity(last + 1);
    for (i, name) in names[..=last].iter().enumerate() {
        if name.is_empty() {
            return Err(LoadError::unreadable(
                origin,
                format!("column {} has an empty header", i + 1),
            ));
        }
        if headers.iter().any(|h| h == name) {
            return Err(LoadError::unreadable(
                origin,
                format!("duplicate header '{name}'"),
            ));
        }
        headers.push((*name).to_owned());
    }
    Ok(headers)
}

/// Read a source file with a bounded read, enforcing `max_size`.
///
/// The size check and the read are the same operation, so a file that grows
/// between a metadata call and the read cannot slip past the limit.
pub(crate) fn read_source_bounded(path: &Path, max_size: u64) -> Result<String, LoadError> {
    let origin = path.display().to_string();
    let file = std::fs::File::open(path)
        .map_err(|e| LoadError::unreadable(&origin, format!("failed to open file: {e}")))?;

    let mut buffer = Vec::new();
    file.take(max_size.saturating_add(1))
        .read_to_end(&mut buffer)
        .map_err(|e| LoadError::unreadable(&origin, format!("failed to read file: {e}")))?;

    if buffer.len() as u64 > max_size {
        return Err(LoadError::unreadable(
            &origin,
            format!("file exceeds maximum size of {max_size} bytes"),
        ));
    }

    String::from_utf8(buffer)
        .map_err(|_| LoadError::unreadable(&origin, "file is not valid UTF-8"))
}
