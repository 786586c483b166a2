use crate::name::generate_name;
use crate::store::{SortOrder, Workspace, WorkspaceStore};
use crate::{StoreError, StoreResult};
use std::io::ErrorKind;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

const CREATE_ATTEMPTS: usize = 4;

/// Outcome of one admission.
#[derive(Clone, Debug)]
pub struct Admission {
    pub workspace: Workspace,
    /// Workspace removed to make room, if the eviction succeeded.
    pub evicted: Option<Workspace>,
    /// Live workspaces after the new one was created.
    pub live: usize,
}

/// Keeps the store at or below `max` workspaces.
///
/// Count, eviction and creation run under one lock, so concurrent admissions
/// through the same pool cannot overshoot the bound. The lock also carries the
/// last issued stamp so names stay strictly time-ordered.
#[derive(Debug)]
pub struct WorkspacePool {
    store: WorkspaceStore,
    max: usize,
    last_stamp: Mutex<u64>,
}

impl WorkspacePool {
    pub fn new(store: WorkspaceStore, max: usize) -> Self {
        Self {
            store,
            max: max.max(1),
            last_stamp: Mutex::new(0),
        }
    }

    pub fn store(&self) -> &WorkspaceStore {
        &self.store
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn list(&self, order: SortOrder) -> StoreResult<Vec<Workspace>> {
        self.store.list(order)
    }

    pub fn admit(&self) -> StoreResult<Admission> {
        let mut last_stamp = self
            .last_stamp
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let current = self.store.list(SortOrder::OldestFirst)?;
        let mut live = current.len();
        let mut evicted = None;
        if live >= self.max {
            if let Some(oldest) = current.into_iter().next() {
                match self.store.remove(&oldest) {
                    Ok(()) => {
                        tracing::info!("evicted oldest workspace {}", oldest.name());
                        live -= 1;
                        evicted = Some(oldest);
                    }
                    Err(err) => {
                        tracing::error!("failed to evict workspace {}: {err}", oldest.name());
                    }
                }
            }
        }

        let stamp = now_millis().max(*last_stamp + 1);
        *last_stamp = stamp;

        let mut attempt = 0;
        let workspace = loop {
            attempt += 1;
            match self.store.create(&generate_name(stamp)) {
                Ok(workspace) => break workspace,
                Err(StoreError::Io { source, .. })
                    if source.kind() == ErrorKind::AlreadyExists && attempt < CREATE_ATTEMPTS =>
                {
                    continue;
                }
                Err(err) => return Err(err),
            }
        };
        tracing::debug!("admitted workspace {}", workspace.name());

        Ok(Admission {
            workspace,
            evicted,
            live: live + 1,
        })
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
