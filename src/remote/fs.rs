//! Object store backed by a local directory tree.
//!
//! Buckets are subdirectories of the root and keys are `/`-separated paths
//! below them. Useful for mirrors on shared storage and for tests.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::ObjectStore;
use crate::error::DalError;

#[derive(Clone, Debug)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        key.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.join(bucket), |path, segment| path.join(segment))
    }
}

impl ObjectStore for FsObjectStore {
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, DalError> {
        let bucket_root = self.root.join(bucket);
        if !bucket_root.is_dir() {
            return Err(DalError::Transfer {
                bucket: bucket.to_string(),
                key: prefix.to_string(),
                message: format!("bucket directory {} does not exist", bucket_root.display()),
            });
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&bucket_root).sort_by_file_name() {
            let entry = entry.map_err(|source| DalError::Transfer {
                bucket: bucket.to_string(),
                key: prefix.to_string(),
                message: source.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&bucket_root) else {
                continue;
            };
            let key = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64, DalError> {
        let source = self.object_path(bucket, key);
        std::fs::copy(&source, dest).map_err(|e| DalError::Transfer {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: e.to_string(),
        })
    }
}
