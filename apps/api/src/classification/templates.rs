//! Template Store: resolves a role's `TemplateRef` to a file and reads it.
//!
//! `AppState` carries an `Arc<dyn TemplateStore>`; the filesystem store is the
//! only production backend.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::classification::catalog::TemplateRef;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template not found: {0}")]
    Missing(PathBuf),

    #[error("template is not valid UTF-8: {0}")]
    NotUtf8(PathBuf),

    #[error("failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub trait TemplateStore: Send + Sync {
    /// Resolves a template reference to a concrete file path.
    fn resolve(&self, template: &TemplateRef) -> Result<PathBuf, TemplateError>;

    /// Reads a resolved template as UTF-8 text.
    fn read(&self, path: &Path) -> Result<String, TemplateError>;
}

/// Templates on the local filesystem, relative paths resolved against `root`.
#[derive(Debug, Clone)]
pub struct FsTemplateStore {
    root: PathBuf,
}

impl FsTemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn first_with_suffix(&self, dir: &Path, suffix: &str) -> Result<PathBuf, TemplateError> {
        let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => TemplateError::Missing(dir.to_path_buf()),
            _ => TemplateError::Io {
                path: dir.to_path_buf(),
                source: e,
            },
        })?;

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.ends_with(suffix))
            })
            .collect();
        candidates.sort();

        candidates
            .into_iter()
            .next()
            .ok_or_else(|| TemplateError::Missing(dir.join(format!("*{suffix}"))))
    }
}

impl TemplateStore for FsTemplateStore {
    fn resolve(&self, template: &TemplateRef) -> Result<PathBuf, TemplateError> {
        let resolved = match template {
            TemplateRef::Directory { path, suffix } => {
                self.first_with_suffix(&self.root.join(path), suffix)?
            }
            TemplateRef::File { path } => {
                let file = self.root.join(path);
                if !file.is_file() {
                    return Err(TemplateError::Missing(file));
                }
                file
            }
        };
        debug!("Resolved template {:?} -> {}", template, resolved.display());
        Ok(resolved)
    }

    fn read(&self, path: &Path) -> Result<String, TemplateError> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => TemplateError::Missing(path.to_path_buf()),
            _ => TemplateError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        String::from_utf8(bytes).map_err(|_| TemplateError::NotUtf8(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_directory_ref_picks_first_matching_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let role_dir = dir.path().join("fullstack");
        fs::create_dir(&role_dir).unwrap();
        fs::write(role_dir.join("notes.md"), "ignore me").unwrap();
        fs::write(role_dir.join("b_resume.tex"), "b").unwrap();
        fs::write(role_dir.join("a_resume.tex"), "a").unwrap();

        let store = FsTemplateStore::new(dir.path());
        let path = store
            .resolve(&TemplateRef::Directory {
                path: PathBuf::from("fullstack"),
                suffix: ".tex".to_string(),
            })
            .unwrap();
        assert_eq!(path, role_dir.join("a_resume.tex"));
        assert_eq!(store.read(&path).unwrap(), "a");
    }

    #[test]
    fn test_directory_without_matching_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("backend")).unwrap();

        let store = FsTemplateStore::new(dir.path());
        let err = store
            .resolve(&TemplateRef::Directory {
                path: PathBuf::from("backend"),
                suffix: ".tex".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, TemplateError::Missing(_)));
    }

    #[test]
    fn test_missing_directory_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsTemplateStore::new(dir.path());
        let err = store
            .resolve(&TemplateRef::Directory {
                path: PathBuf::from("nope"),
                suffix: ".tex".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, TemplateError::Missing(_)));
    }

    #[test]
    fn test_file_ref_resolves_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("general.tex"), "tex").unwrap();
        let store = FsTemplateStore::new(dir.path());

        let found = store
            .resolve(&TemplateRef::File {
                path: PathBuf::from("general.tex"),
            })
            .unwrap();
        assert_eq!(found, dir.path().join("general.tex"));

        let err = store
            .resolve(&TemplateRef::File {
                path: PathBuf::from("absent.tex"),
            })
            .unwrap_err();
        assert!(matches!(err, TemplateError::Missing(p) if p.ends_with("absent.tex")));
    }

    #[test]
    fn test_read_rejects_non_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tex");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let store = FsTemplateStore::new(dir.path());
        assert!(matches!(store.read(&path), Err(TemplateError::NotUtf8(_))));
    }
}
