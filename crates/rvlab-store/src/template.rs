use crate::store::Workspace;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyFailure {
    pub file: String,
    pub reason: String,
}

/// Result of seeding one workspace. `success` is true when at least one file
/// was copied, or when there was nothing to copy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub success: bool,
    pub message: String,
    pub copied: Vec<String>,
    pub failed: Vec<CopyFailure>,
    pub skipped: Vec<String>,
}

impl CopyReport {
    fn empty(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Self::default()
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Self::default()
        }
    }
}

/// Copies the auxiliary build files (Makefile, linker script, startup code)
/// from a template directory into a new workspace. Only the top level of the
/// template is copied; subdirectories are skipped.
#[derive(Clone, Debug)]
pub struct TemplateProvisioner {
    source: PathBuf,
}

impl TemplateProvisioner {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn provision(&self, workspace: &Workspace) -> CopyReport {
        if !self.source.exists() {
            tracing::info!(
                "template directory {} does not exist, creating it",
                self.source.display()
            );
            if let Err(err) = fs::create_dir_all(&self.source) {
                return CopyReport::failure(format!(
                    "Failed to copy files: cannot create {}: {err}",
                    self.source.display()
                ));
            }
            return CopyReport::empty("Source directory created, but no files to copy");
        }

        let (mut entries, unreadable) = match fs::read_dir(&self.source) {
            Ok(iter) => split_entries(iter, &self.source),
            Err(err) => return CopyReport::failure(format!("Failed to copy files: {err}")),
        };
        if entries.is_empty() && unreadable.is_empty() {
            return CopyReport::empty("No files found in source directory");
        }
        entries.sort_by_key(|entry| entry.file_name());

        let mut report = CopyReport {
            failed: unreadable,
            ..CopyReport::default()
        };
        for entry in entries {
            let file = entry.file_name().to_string_lossy().into_owned();
            let source_path = entry.path();
            // Follow symlinks so a linked Makefile still counts as a file.
            match fs::metadata(&source_path) {
                Ok(meta) if meta.is_file() => {}
                Ok(_) => {
                    report.skipped.push(file);
                    continue;
                }
                Err(err) => {
                    tracing::warn!("cannot stat template file {file}: {err}");
                    report.failed.push(CopyFailure {
                        file,
                        reason: err.to_string(),
                    });
                    continue;
                }
            }
            match fs::copy(&source_path, workspace.path().join(&file)) {
                Ok(_) => report.copied.push(file),
                Err(err) => {
                    tracing::warn!(
                        "failed to copy template file {file} into {}: {err}",
                        workspace.name()
                    );
                    report.failed.push(CopyFailure {
                        file,
                        reason: err.to_string(),
                    });
                }
            }
        }
        report.success = !report.copied.is_empty();
        report.message = format!("Copied {} files to the new folder", report.copied.len());
        report
    }
}

/// Separates readable directory entries from the ones the OS failed to
/// return; the latter become copy failures named after the template dir.
fn split_entries<T>(
    iter: impl IntoIterator<Item = io::Result<T>>,
    dir: &Path,
) -> (Vec<T>, Vec<CopyFailure>) {
    let mut entries = Vec::new();
    let mut failed = Vec::new();
    for entry in iter {
        match entry {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                tracing::warn!("cannot read entry in {}: {err}", dir.display());
                failed.push(CopyFailure {
                    file: dir.display().to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }
    (entries, failed)
}
