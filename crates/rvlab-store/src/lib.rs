//! Filesystem-backed build workspaces: the store, the bounded admission pool,
//! and the template provisioner that seeds new workspaces.

mod name;
mod pool;
mod store;
mod template;

pub use name::{NAME_PREFIX, generate_name, parse_stamp};
pub use pool::{Admission, WorkspacePool};
pub use store::{SortOrder, Workspace, WorkspaceStore};
pub use template::{CopyFailure, CopyReport, TemplateProvisioner};

use std::{io, path::PathBuf};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid workspace name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("workspace '{0}' does not exist")]
    NotFound(String),
}

pub(crate) fn io_error(path: impl Into<PathBuf>, err: io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source: err,
    }
}
