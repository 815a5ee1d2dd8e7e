//! Contract check: validates the export document against a JSON Schema
//! before anything is rendered.
//!
//! The registry schema checks cells one record at a time; the contract is the
//! downstream consumer's view of the whole exported document.

use std::path::Path;

use jsonschema::Validator;
use serde_json::Value;

use crate::error::{ContractViolation, LoadError};
use crate::registry::read_source_bounded;

/// Maximum contract document size in bytes.
const MAX_CONTRACT_SIZE: u64 = 1_048_576;

/// A compiled contract schema.
pub struct Contract {
    validator: Validator,
}

impl std::fmt::Debug for Contract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Contract").finish_non_exhaustive()
    }
}

impl Contract {
    /// Load and compile a contract JSON Schema from disk.
    ///
    /// # Errors
    ///
    /// Returns `SourceUnreadable` if the file cannot be read, is not JSON, or
    /// is not a valid JSON Schema.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let origin = path.display().to_string();
        let content = read_source_bounded(path, MAX_CONTRACT_SIZE)?;
        let schema: Value = serde_json::from_str(&content)
            .map_err(|e| LoadError::unreadable(&origin, format!("invalid contract JSON: {e}")))?;
        Self::compile(&schema, &origin)
    }

    /// Compile an in-memory contract schema.
    ///
    /// # Errors
    ///
    /// Returns `SourceUnreadable` if `schema` is not a valid JSON Schema.
    pub fn compile(schema: &Value, origin: &str) -> Result<Self, LoadError> {
        let validator = jsonschema::validator_for(schema).map_err(|e| {
            LoadError::unreadable(origin, format!("contract is not a valid JSON Schema: {e}"))
        })?;
        Ok(Self { validator })
    }

    /// Check a document, collecting every violation.
    ///
    /// # Errors
    ///
    /// Returns all violations, ordered by the path of the offending value.
    pub fn check(&self, document: &Value) -> Result<(), Vec<ContractViolation>> {
        let mut violations: Vec<ContractViolation> = self
            .validator
            .iter_errors(document)
            .map(|error| {
                let path = error.instance_path().to_string();
                ContractViolation {
                    path: if path.is_empty() { "/".to_owned() } else { path },
                    message: error.to_string(),
                }
            })
            .collect();
        violations.sort_by(|a, b| a.path.cmp(&b.path));
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contract() -> Contract {
        Contract::compile(
            &json!({
                "type": "object",
                "required": ["records"],
                "properties": {
                    "records": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["id"],
                            "properties": {"id": {"type": "integer"}}
                        }
                    }
                }
            }),
            "contract.json",
        )
        .unwrap()
    }

    #[test]
    fn test_conforming_document() {
        let doc = json!({"records": [{"id": 1}, {"id": 2}]});
        assert!(contract().check(&doc).is_ok());
    }

    #[test]
    fn test_every_violation_is_collected() {
        let doc = json!({"records": [{"id": "a"}, {}, {"id": 3}]});
        let violations = contract().check(&doc).unwrap_err();
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].path, "/records/0/id");
        assert_eq!(violations[1].path, "/records/1");
        assert!(
            violations[0].to_string().starts_with("contract: /records/0/id: "),
            "got: {}",
            violations[0]
        );
    }

    #[test]
    fn test_document_level_violation_points_at_root() {
        let violations = contract().check(&json!({"rows": []})).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "/");
    }

    #[test]
    fn test_invalid_contract_schema() {
        let err = Contract::compile(&json!({"type": 12}), "contract.json").unwrap_err();
        assert!(err.to_string().contains("not a valid JSON Schema"), "got: {err}");
    }

    #[test]
    fn test_load_rejects_non_json() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("contract.json");
        std::fs::write(&path, "type: object\n").unwrap();
        let err = Contract::load(&path).unwrap_err();
        assert!(err.to_string().contains("invalid contract JSON"), "got: {err}");
    }
}
