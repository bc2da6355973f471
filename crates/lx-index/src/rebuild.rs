//! Atomic snapshot publication.
//!
//! A rebuild runs to completion off the hot path and is published by
//! swapping the shared `Arc`. In-flight requests keep the `Arc` they
//! already loaded and never observe a half-built index. Concurrent
//! rebuilds are serialized through a rebuild-in-progress flag.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use lx_core::{LxError, LxResult};

use crate::snapshot::VaultSnapshot;

pub struct SnapshotHandle {
    current: RwLock<Arc<VaultSnapshot>>,
    rebuilding: AtomicBool,
}

impl SnapshotHandle {
    pub fn new(snapshot: VaultSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            rebuilding: AtomicBool::new(false),
        }
    }

    pub fn empty() -> Self {
        Self::new(VaultSnapshot::default())
    }

    /// The current snapshot. Cheap; clones the `Arc` only.
    pub fn load(&self) -> Arc<VaultSnapshot> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Rebuild from the vault directory and publish. Returns
    /// `LxError::RebuildInProgress` if another rebuild holds the flag;
    /// callers should retry.
    pub fn rebuild_from_dir(&self, root: &Path) -> LxResult<()> {
        self.rebuild_with(|| VaultSnapshot::load_dir(root))
    }

    /// Rebuild from an arbitrary builder, used by tests and callers that
    /// already hold parsed notes.
    pub fn rebuild_with<F>(&self, build: F) -> LxResult<()>
    where
        F: FnOnce() -> LxResult<VaultSnapshot>,
    {
        if self
            .rebuilding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(LxError::RebuildInProgress);
        }

        let result = build();
        let outcome = match result {
            Ok(snapshot) => {
                let notes = snapshot.notes.len();
                let mut guard = self
                    .current
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                *guard = Arc::new(snapshot);
                debug!(notes, "published new vault snapshot");
                Ok(())
            }
            Err(e) => Err(e),
        };
        self.rebuilding.store(false, Ordering::Release);
        outcome
    }
}
