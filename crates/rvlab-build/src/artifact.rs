use crate::error::BuildError;
use rvlab_store::Workspace;
use std::fs;
use std::path::{Path, PathBuf};

/// A binary found in a workspace; its bytes are not read yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactLocation {
    pub file_name: String,
    pub path: PathBuf,
}

impl ArtifactLocation {
    pub fn read(self) -> Result<Artifact, BuildError> {
        let bytes = fs::read(&self.path).map_err(|source| BuildError::ArtifactRead {
            path: self.path.clone(),
            source,
        })?;
        Ok(Artifact {
            file_name: self.file_name,
            path: self.path,
            bytes,
        })
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifact")
            .field("file_name", &self.file_name)
            .field("path", &self.path)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Finds the produced binary by extension. With several candidates the
/// lexicographically first name wins. `Ok(None)` means nothing was built.
pub fn locate(
    workspace: &Workspace,
    extension: &str,
) -> Result<Option<ArtifactLocation>, BuildError> {
    find_artifact(workspace.path(), extension)
}

fn find_artifact(dir: &Path, extension: &str) -> Result<Option<ArtifactLocation>, BuildError> {
    let suffix = format!(".{extension}");
    let io = |source| BuildError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir).map_err(io)? {
        let entry = entry.map_err(io)?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if !name.ends_with(&suffix) || name.len() == suffix.len() {
            continue;
        }
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(true) {
            continue;
        }
        candidates.push(name);
    }
    candidates.sort();
    Ok(candidates.into_iter().next().map(|file_name| ArtifactLocation {
        path: dir.join(&file_name),
        file_name,
    }))
}
