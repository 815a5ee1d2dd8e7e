//! Artifacts and their all-or-nothing commit to the output directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::OutputFormat;
use crate::error::WriteError;

/// One rendered output file, not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub format: OutputFormat,
    /// Final destination.
    pub path: PathBuf,
    pub content: String,
}

/// Destination of the artifact for `format` in `out_dir`.
#[must_use]
pub fn artifact_path(out_dir: &Path, build_id: &str, format: OutputFormat) -> PathBuf {
    out_dir.join(format!("{build_id}.{}", format.extension()))
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{suffix}"))
}

fn staging_path(path: &Path) -> PathBuf {
    sibling_path(path, "tmp")
}

fn backup_path(path: &Path) -> PathBuf {
    sibling_path(path, "bak")
}

/// Write every artifact, or none of them.
///
/// Each artifact is first staged next to its destination as a hidden temp
/// file. Existing destination files are then moved aside as hidden backups
/// and the staged files renamed into place. If any step fails, the files
/// already moved in are removed and the backups restored, so the output
/// directory ends up as it was before the commit. Backups are deleted only
/// once every artifact is in place.
///
/// # Errors
///
/// Returns the write failure that stopped the commit.
pub fn commit_artifacts(
    out_dir: &Path,
    artifacts: &[Artifact],
) -> Result<Vec<PathBuf>, Vec<WriteError>> {
    fs::create_dir_all(out_dir).map_err(|e| {
        vec![WriteError {
            path: out_dir.to_path_buf(),
            reason: format!("failed to create output directory: {e}"),
        }]
    })?;

    let mut staged: Vec<(PathBuf, &Artifact)> = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let tmp = staging_path(&artifact.path);
        if let Err(e) = fs::write(&tmp, artifact.content.as_bytes()) {
            // A partially written temp file may exist even on error.
            let _ = fs::remove_file(&tmp);
            discard(&staged);
            return Err(vec![WriteError {
                path: artifact.path.clone(),
                reason: format!("failed to stage artifact: {e}"),
            }]);
        }
        staged.push((tmp, artifact));
    }

    let mut backups: Vec<(PathBuf, PathBuf)> = Vec::new();
    for (_, artifact) in &staged {
        if !artifact.path.is_file() {
            continue;
        }
        let backup = backup_path(&artifact.path);
        if let Err(e) = fs::rename(&artifact.path, &backup) {
            restore(&backups);
            discard(&staged);
            return Err(vec![WriteError {
                path: artifact.path.clone(),
                reason: format!("failed to back up existing artifact: {e}"),
            }]);
        }
        backups.push((backup, artifact.path.clone()));
    }

    let mut written: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for (index, (tmp, artifact)) in staged.iter().enumerate() {
        if let Err(e) = fs::rename(tmp, &artifact.path) {
            remove_written(&written);
            restore(&backups);
            discard(&staged[index..]);
            return Err(vec![WriteError {
                path: artifact.path.clone(),
                reason: format!("failed to move artifact into place: {e}"),
            }]);
        }
        tracing::debug!(path = %artifact.path.display(), "artifact written");
        written.push(artifact.path.clone());
    }

    for (backup, _) in &backups {
        if let Err(e) = fs::remove_file(backup) {
            tracing::warn!(path = %backup.display(), "failed to remove backup: {e}");
        }
    }
    Ok(written)
}

fn discard(staged: &[(PathBuf, &Artifact)]) {
    for (tmp, _) in staged {
        if let Err(e) = fs::remove_file(tmp) {
            tracing::warn!(path = %tmp.display(), "failed to remove staged artifact: {e}");
        }
    }
}

fn remove_written(written: &[PathBuf]) {
    for path in written {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!(path = %path.display(), "failed to roll back artifact: {e}");
        }
    }
}

fn restore(backups: &[(PathBuf, PathBuf)]) {
    for (backup, original) in backups {
        if let Err(e) = fs::rename(backup, original) {
            tracing::error!(path = %original.display(), "failed to restore backup: {e}");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact(dir: &Path, format: OutputFormat, content: &str) -> Artifact {
        Artifact {
            format,
            path: artifact_path(dir, "registry", format),
            content: content.to_owned(),
        }
    }

    #[test]
    fn test_artifact_path() {
        assert_eq!(
            artifact_path(Path::new("build"), "registry", OutputFormat::Markdown),
            PathBuf::from("build/registry.md")
        );
    }

    #[test]
    fn test_commit_writes_all_and_leaves_no_staging_files() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("nested/out");
        let artifacts = vec![
            artifact(&out, OutputFormat::Json, "{}\n"),
            artifact(&out, OutputFormat::Yaml, "records: []\n"),
        ];
        let written = commit_artifacts(&out, &artifacts).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(fs::read_to_string(out.join("registry.json")).unwrap(), "{}\n");
        let names: Vec<_> = fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert!(names.iter().all(|n| !n.ends_with(".tmp")), "got: {names:?}");
    }

    #[test]
    fn test_staging_failure_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().to_path_buf();
        let good = artifact(&out, OutputFormat::Json, "{}\n");
        let bad = Artifact {
            format: OutputFormat::Yaml,
            path: out.join("missing-dir/registry.yaml"),
            content: "x\n".to_owned(),
        };
        let errors = commit_artifacts(&out, &[good, bad]).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].reason.contains("stage"), "got: {}", errors[0].reason);
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_move_restores_previous_artifacts() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().to_path_buf();
        fs::write(out.join("registry.json"), "old\n").unwrap();
        fs::create_dir(out.join("registry.yaml")).unwrap();

        let artifacts = vec![
            artifact(&out, OutputFormat::Json, "new\n"),
            artifact(&out, OutputFormat::Yaml, "records: []\n"),
        ];
        let errors = commit_artifacts(&out, &artifacts).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, out.join("registry.yaml"));
        assert!(errors[0].reason.contains("move"), "got: {}", errors[0].reason);

        assert_eq!(fs::read_to_string(out.join("registry.json")).unwrap(), "old\n");
        assert!(out.join("registry.yaml").is_dir());
        let mut names: Vec<_> = fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["registry.json", "registry.yaml"]);
    }

    #[test]
    fn test_failed_move_without_previous_artifacts_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().to_path_buf();
        fs::create_dir(out.join("registry.yaml")).unwrap();

        let artifacts = vec![
            artifact(&out, OutputFormat::Json, "{}\n"),
            artifact(&out, OutputFormat::Yaml, "records: []\n"),
        ];
        assert!(commit_artifacts(&out, &artifacts).is_err());
        assert!(!out.join("registry.json").exists());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 1);
    }

    #[test]
    fn test_successful_commit_removes_backups() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().to_path_buf();
        fs::write(out.join("registry.json"), "old\n").unwrap();

        let artifacts = [artifact(&out, OutputFormat::Json, "new\n")];
        let written = commit_artifacts(&out, &artifacts).unwrap();
        assert_eq!(written, vec![out.join("registry.json")]);
        assert_eq!(fs::read_to_string(out.join("registry.json")).unwrap(), "new\n");
        assert_eq!(fs::read_dir(&out).unwrap().count(), 1);
    }
}
