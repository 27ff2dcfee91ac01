//! Per-test lock backed by a marker object in the store.
//!
//! Not a general mutual-exclusion primitive: it is correct only if the
//! backend never lets two concurrent create-if-absent writes both succeed
//! (see the `ObjectStore` contract). `try_lock` never blocks or queues; a
//! `false` means "skip this round", not an error.

use crate::store::ObjectStore;
use crate::tier::PathScheme;
use anyhow::Context;
use std::fs;
use std::path::Path;

/// Acquires the round-rotation lock for `test`, tagging the marker with the
/// device serial. Returns `false` when some session already holds it.
pub fn try_lock<S: ObjectStore>(
    store: &S,
    paths: &PathScheme,
    test: &str,
    serial: &str,
    scratch: &Path,
) -> anyhow::Result<bool> {
    let lock_dir = paths.lock_dir(test);
    let held = store
        .count_files(&lock_dir)
        .with_context(|| format!("failed to probe lock {}", lock_dir))?;
    if held > 0 {
        log::debug!("{} already locked", test);
        return Ok(false);
    }

    fs::create_dir_all(scratch)
        .with_context(|| format!("failed to create {}", scratch.display()))?;
    let marker = scratch.join(serial);
    fs::write(&marker, b"").context("failed to create lock marker")?;
    store
        .upload_file(&marker, &paths.lock_file(test, serial))
        .with_context(|| format!("failed to write lock for {}", test))?;
    log::debug!("locked {} as {}", test, serial);
    Ok(true)
}

/// Drops the lock for `test` regardless of owner. Idempotent; unlocking an
/// unlocked test is a no-op.
pub fn unlock<S: ObjectStore>(store: &S, paths: &PathScheme, test: &str) -> anyhow::Result<()> {
    let lock_dir = paths.lock_dir(test);
    let markers = store
        .list_with_prefix(&lock_dir, true)
        .with_context(|| format!("failed to list lock {}", lock_dir))?;
    for marker in markers {
        store
            .delete_file(&marker)
            .with_context(|| format!("failed to delete lock marker {}", marker))?;
    }
    Ok(())
}
