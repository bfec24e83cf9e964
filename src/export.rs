//! Hand-off of assembled documents to a save/download collaborator.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::assembler::ExportArtifact;
use crate::config;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No export directory available on this system")]
    NoExportDir,

    #[error("Cannot create export directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot write document {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Receives a finished document. Implementations decide where it goes.
pub trait ExportSink: Send + Sync {
    fn save(&self, artifact: &ExportArtifact) -> Result<PathBuf, ExportError>;
}

/// Writes documents into a directory. An existing file is never
/// overwritten: `name.pdf`, `name (1).pdf`, `name (2).pdf`, ...
#[derive(Debug, Clone)]
pub struct DirectoryExportSink {
    dir: PathBuf,
}

impl DirectoryExportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Sink rooted at the user's documents directory.
    pub fn user_default() -> Result<Self, ExportError> {
        config::default_export_dir()
            .map(Self::new)
            .ok_or(ExportError::NoExportDir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn free_path(&self, filename: &str) -> PathBuf {
        let candidate = self.dir.join(filename);
        if !candidate.exists() {
            return candidate;
        }

        let (stem, ext) = match filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (filename, None),
        };
        (1u32..)
            .map(|n| match ext {
                Some(ext) => self.dir.join(format!("{stem} ({n}).{ext}")),
                None => self.dir.join(format!("{stem} ({n})")),
            })
            .find(|p| !p.exists())
            .unwrap_or(candidate)
    }
}

impl ExportSink for DirectoryExportSink {
    fn save(&self, artifact: &ExportArtifact) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| ExportError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.free_path(&artifact.filename);
        std::fs::write(&path, artifact.bytes()).map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;

        tracing::info!(
            path = %path.display(),
            bytes = artifact.bytes().len(),
            "Document exported"
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::tests::complete_record;
    use crate::assembler::DocumentAssembler;

    fn artifact() -> ExportArtifact {
        DocumentAssembler::default().assemble(&complete_record()).unwrap()
    }

    #[test]
    fn writes_into_created_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = DirectoryExportSink::new(tmp.path().join("exports"));
        let artifact = artifact();

        let path = sink.save(&artifact).unwrap();

        assert!(path.exists());
        assert_eq!(path.file_name().unwrap(), "registro-visita-medica.pdf");
        assert_eq!(std::fs::read(&path).unwrap(), artifact.bytes());
    }

    #[test]
    fn never_overwrites_previous_export() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = DirectoryExportSink::new(tmp.path());
        let artifact = artifact();

        let first = sink.save(&artifact).unwrap();
        let second = sink.save(&artifact).unwrap();
        let third = sink.save(&artifact).unwrap();

        assert_ne!(first, second);
        assert_eq!(second.file_name().unwrap(), "registro-visita-medica (1).pdf");
        assert_eq!(third.file_name().unwrap(), "registro-visita-medica (2).pdf");
    }

    #[test]
    fn unwritable_target_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        // A directory cannot be created beneath a regular file.
        let sink = DirectoryExportSink::new(blocker.join("exports"));
        assert!(matches!(sink.save(&artifact()), Err(ExportError::CreateDir { .. })));
    }
}
