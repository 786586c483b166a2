use crate::config::BuildConfig;
use rvlab_store::Workspace;
use std::fs;
use std::path::PathBuf;

/// Written in place of an empty submission so the toolchain always finds a
/// source file.
pub const EMPTY_PROGRAM: &str = "// Empty C program";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceWriteReport {
    pub success: bool,
    pub message: String,
    pub path: PathBuf,
}

/// Writes the program verbatim, replacing any previous source file.
pub fn write_source(
    config: &BuildConfig,
    workspace: &Workspace,
    program: Option<&str>,
) -> SourceWriteReport {
    let path = workspace.path().join(&config.source_file_name);
    let text = match program {
        Some(code) if !code.is_empty() => code,
        _ => EMPTY_PROGRAM,
    };
    match fs::write(&path, text) {
        Ok(()) => SourceWriteReport {
            success: true,
            message: "Program file created successfully".into(),
            path,
        },
        Err(err) => {
            tracing::error!("failed to write {}: {err}", path.display());
            SourceWriteReport {
                success: false,
                message: format!("Failed to create program file: {err}"),
                path,
            }
        }
    }
}
