//! Object store interface the engine coordinates through.
//!
//! The store is the only coordination medium between sessions; there is no
//! database, lock server, or message queue behind it. Listings are
//! best-effort and eventually consistent. Required backend precondition the
//! engine cannot verify itself: [`ObjectStore::move_file`] must be atomic
//! with respect to other concurrent `move_file`/`file_exists` calls on the
//! same destination (conditional-write or generation-match semantics). The
//! same property backs the create-if-absent lock markers.

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait ObjectStore: Send + Sync {
    /// Lists object paths under `prefix`. With `strict` set, only objects
    /// directly or transitively under `prefix + "/"` are returned; otherwise
    /// any path with the raw string prefix matches (which deliberately
    /// catches sibling dirs such as `t_seed_1` next to `t_seed`).
    fn list_with_prefix(&self, prefix: &str, strict: bool) -> StoreResult<Vec<String>>;

    /// Atomically relocates `src` to `dst`. Returns `Ok(false)` without
    /// moving anything when `src` is gone or, with `overwrite` unset, when
    /// `dst` already exists; both mean some other claimant won.
    fn move_file(&self, src: &str, dst: &str, overwrite: bool) -> StoreResult<bool>;

    fn copy_file(&self, src: &str, dst: &str) -> StoreResult<()>;

    /// Deleting an absent object is not an error.
    fn delete_file(&self, path: &str) -> StoreResult<()>;

    fn file_exists(&self, path: &str) -> StoreResult<bool>;

    /// Number of objects whose path starts with `prefix` (raw match).
    fn count_files(&self, prefix: &str) -> StoreResult<usize>;

    fn upload_file(&self, local: &Path, remote: &str) -> StoreResult<()>;

    /// Uploads every file under `local` (recursively), keyed by its path
    /// relative to `local` under `remote`.
    fn upload_dir(&self, local: &Path, remote: &str) -> StoreResult<()>;

    fn download_file(&self, remote: &str, local: &Path) -> StoreResult<()>;

    /// Makes sure `local` exists and is writable as a download target.
    fn prepare_download_destination(&self, local: &Path) -> StoreResult<()>;
}
