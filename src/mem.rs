//! In-memory reference backend.
//!
//! Holds object contents in a single map behind one mutex, which gives the
//! move/exists atomicity the engine requires from any real backend. Used by
//! the contract tests and by the engine tests as a stand-in store.

use crate::store::{ObjectStore, StoreError, StoreResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object directly, bypassing the upload path.
    pub fn put(&self, path: &str, content: &[u8]) {
        let mut objects = self.objects.lock().unwrap();
        objects.insert(path.to_string(), content.to_vec());
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        let objects = self.objects.lock().unwrap();
        objects.get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        let objects = self.objects.lock().unwrap();
        objects.contains_key(path)
    }

    pub fn paths(&self) -> Vec<String> {
        let objects = self.objects.lock().unwrap();
        objects.keys().cloned().collect()
    }
}

impl ObjectStore for MemStore {
    fn list_with_prefix(&self, prefix: &str, strict: bool) -> StoreResult<Vec<String>> {
        let objects = self.objects.lock().unwrap();
        let dir = format!("{}/", prefix.trim_end_matches('/'));
        let matches = objects
            .keys()
            .filter(|k| {
                if strict {
                    k.starts_with(&dir)
                } else {
                    k.starts_with(prefix)
                }
            })
            .cloned()
            .collect();
        Ok(matches)
    }

    fn move_file(&self, src: &str, dst: &str, overwrite: bool) -> StoreResult<bool> {
        // one lock for the whole check-and-swap, this is the atomicity the
        // claim path leans on
        let mut objects = self.objects.lock().unwrap();
        if !overwrite && objects.contains_key(dst) {
            return Ok(false);
        }
        match objects.remove(src) {
            Some(content) => {
                objects.insert(dst.to_string(), content);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn copy_file(&self, src: &str, dst: &str) -> StoreResult<()> {
        let mut objects = self.objects.lock().unwrap();
        let content = objects
            .get(src)
            .cloned()
            .ok_or_else(|| StoreError::Backend(format!("no such object: {}", src)))?;
        objects.insert(dst.to_string(), content);
        Ok(())
    }

    fn delete_file(&self, path: &str) -> StoreResult<()> {
        let mut objects = self.objects.lock().unwrap();
        objects.remove(path);
        Ok(())
    }

    fn file_exists(&self, path: &str) -> StoreResult<bool> {
        let objects = self.objects.lock().unwrap();
        Ok(objects.contains_key(path))
    }

    fn count_files(&self, prefix: &str) -> StoreResult<usize> {
        let objects = self.objects.lock().unwrap();
        Ok(objects.keys().filter(|k| k.starts_with(prefix)).count())
    }

    fn upload_file(&self, local: &Path, remote: &str) -> StoreResult<()> {
        let content = fs::read(local)?;
        let mut objects = self.objects.lock().unwrap();
        objects.insert(remote.to_string(), content);
        Ok(())
    }

    fn upload_dir(&self, local: &Path, remote: &str) -> StoreResult<()> {
        let base = remote.trim_end_matches('/');
        let mut stack = vec![local.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                let rel = path
                    .strip_prefix(local)
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
                let content = fs::read(&path)?;
                let mut objects = self.objects.lock().unwrap();
                objects.insert(format!("{}/{}", base, rel.display()), content);
            }
        }
        Ok(())
    }

    fn download_file(&self, remote: &str, local: &Path) -> StoreResult<()> {
        let content = self
            .get(remote)
            .ok_or_else(|| StoreError::Backend(format!("no such object: {}", remote)))?;
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(local, content)?;
        Ok(())
    }

    fn prepare_download_destination(&self, local: &Path) -> StoreResult<()> {
        fs::create_dir_all(local)?;
        Ok(())
    }
}
