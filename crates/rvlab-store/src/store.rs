use crate::name::parse_stamp;
use crate::{StoreError, StoreResult, io_error};
use chrono::{DateTime, Utc};
use std::{
    cmp::Ordering,
    fmt, fs,
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

/// One build directory directly under the store root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workspace {
    name: String,
    path: PathBuf,
    created_at: DateTime<Utc>,
}

impl Workspace {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn cmp_age(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.name.cmp(&other.name))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    OldestFirst,
    NewestFirst,
}

/// Directory holding every workspace. Externally supplied names are resolved
/// through [`WorkspaceStore::resolve`] and can never address anything outside
/// the root.
#[derive(Clone)]
pub struct WorkspaceStore {
    root: PathBuf,
}

impl fmt::Debug for WorkspaceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceStore")
            .field("root", &self.root)
            .finish()
    }
}

impl WorkspaceStore {
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|e| io_error(root, e))?;
        let root = root.canonicalize().map_err(|e| io_error(root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists workspace directories. Plain files in the root are ignored, as are
    /// entries that vanish between the directory read and the stat.
    pub fn list(&self, order: SortOrder) -> StoreResult<Vec<Workspace>> {
        let entries = fs::read_dir(&self.root).map_err(|e| io_error(&self.root, e))?;
        let mut workspaces = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&self.root, e))?;
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let path = entry.path();
            match creation_time(&name, &path) {
                Ok(created_at) => workspaces.push(Workspace {
                    name,
                    path,
                    created_at,
                }),
                Err(err) => tracing::debug!("skipping {}: {err}", path.display()),
            }
        }
        workspaces.sort_by(Workspace::cmp_age);
        if order == SortOrder::NewestFirst {
            workspaces.reverse();
        }
        Ok(workspaces)
    }

    /// Maps a workspace name to its path without touching the filesystem
    /// beyond a symlink check on an existing entry.
    pub fn resolve(&self, name: &str) -> StoreResult<PathBuf> {
        validate_name(name)?;
        let path = self.root.join(name);
        match path.canonicalize() {
            Ok(real) if real.parent() != Some(self.root.as_path()) => {
                Err(StoreError::InvalidName {
                    name: name.to_string(),
                    reason: "resolves outside the workspace root",
                })
            }
            Ok(_) => Ok(path),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(path),
            Err(err) => Err(io_error(path, err)),
        }
    }

    pub fn get(&self, name: &str) -> StoreResult<Workspace> {
        let path = self.resolve(name)?;
        if !path.is_dir() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        let created_at = creation_time(name, &path)?;
        Ok(Workspace {
            name: name.to_string(),
            path,
            created_at,
        })
    }

    /// Creates a fresh directory; fails if the name is already taken.
    pub(crate) fn create(&self, name: &str) -> StoreResult<Workspace> {
        let path = self.resolve(name)?;
        fs::create_dir(&path).map_err(|e| io_error(&path, e))?;
        let created_at = creation_time(name, &path)?;
        Ok(Workspace {
            name: name.to_string(),
            path,
            created_at,
        })
    }

    pub fn remove(&self, workspace: &Workspace) -> StoreResult<()> {
        let path = self.resolve(&workspace.name)?;
        match fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(path, err)),
        }
    }
}

fn validate_name(name: &str) -> StoreResult<()> {
    let invalid = |reason| {
        Err(StoreError::InvalidName {
            name: name.to_string(),
            reason,
        })
    };
    if name.is_empty() {
        return invalid("empty name");
    }
    if name.contains(['/', '\\', '\0']) {
        return invalid("contains a path separator");
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == name => Ok(()),
        _ => invalid("not a single directory name"),
    }
}

/// The stamp embedded in a generated name wins; anything else falls back to
/// filesystem birth time, then modification time.
fn creation_time(name: &str, path: &Path) -> StoreResult<DateTime<Utc>> {
    if let Some(at) = parse_stamp(name)
        .and_then(|ms| i64::try_from(ms).ok())
        .and_then(DateTime::from_timestamp_millis)
    {
        return Ok(at);
    }
    let meta = fs::metadata(path).map_err(|e| io_error(path, e))?;
    let time = meta
        .created()
        .or_else(|_| meta.modified())
        .map_err(|e| io_error(path, e))?;
    Ok(DateTime::<Utc>::from(time))
}
