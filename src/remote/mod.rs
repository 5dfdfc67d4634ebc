//! Remote object store synchronisation.
//!
//! This module owns remote-specific concerns: enumerating objects under a
//! prefix and mirroring them into a local directory. Store clients implement
//! [`ObjectStore`]; [`RemoteSync`] drives them.

pub mod fs;
#[cfg(feature = "remote")]
pub mod http;

use std::path::{Component, Path, PathBuf};

use crate::error::DalError;

pub use self::fs::FsObjectStore;
#[cfg(feature = "remote")]
pub use self::http::HttpObjectStore;

/// A client able to enumerate and fetch objects from a bucket.
pub trait ObjectStore {
    /// List every object key under `prefix`, in a stable order.
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, DalError>;

    /// Fetch one object into `dest`, returning the number of bytes written.
    ///
    /// The parent directory of `dest` already exists.
    fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64, DalError>;
}

/// Whether a download ran or was skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    /// The target already had content and `force` was not set.
    Skipped,
    /// Every listed object was attempted.
    Attempted,
}

/// Result of fetching one object.
#[derive(Clone, Debug)]
pub struct ObjectOutcome {
    pub key: String,
    pub local_path: PathBuf,
    /// Bytes written, or the failure message.
    pub result: Result<u64, String>,
}

impl ObjectOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-object report of a directory download.
#[derive(Clone, Debug)]
pub struct SyncReport {
    pub bucket: String,
    pub prefix: String,
    pub directory: PathBuf,
    pub status: SyncStatus,
    pub outcomes: Vec<ObjectOutcome>,
}

impl SyncReport {
    fn skipped(bucket: &str, prefix: &str, directory: &Path) -> Self {
        Self {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            directory: directory.to_path_buf(),
            status: SyncStatus::Skipped,
            outcomes: Vec::new(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.status == SyncStatus::Skipped
    }

    /// True when nothing failed (a skipped download is complete).
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(ObjectOutcome::is_ok)
    }

    pub fn fetched(&self) -> impl Iterator<Item = &ObjectOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_ok())
    }

    /// Keys that failed, for a targeted retry.
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|outcome| !outcome.is_ok())
            .map(|outcome| outcome.key.as_str())
            .collect()
    }

    pub fn bytes_fetched(&self) -> u64 {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok())
            .sum()
    }

    /// Turn an incomplete report into an error listing the failed keys.
    pub fn into_result(self) -> Result<SyncReport, DalError> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(DalError::IncompleteTransfer {
                failed: self.failed().into_iter().map(str::to_string).collect(),
                bucket: self.bucket,
            })
        }
    }
}

/// Mirrors a remote prefix into a local directory.
pub struct RemoteSync<'s> {
    store: &'s dyn ObjectStore,
}

impl<'s> RemoteSync<'s> {
    pub fn new(store: &'s dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Download every object under `remote_folder` into `local_directory`.
    ///
    /// Without `force`, a local directory that already has content is left
    /// alone and the store is not contacted. With `force`, the directory is
    /// cleared once the listing has succeeded. A failing object does not stop
    /// the others; check the report, or call [`SyncReport::into_result`].
    ///
    /// `remote_folder` is matched as a directory: `criteo` covers
    /// `criteo/day_0.csv` but not `criteo_extra/day_0.csv`. A key equal to
    /// `remote_folder` is a single object and lands under its file name.
    ///
    /// # Errors
    /// Returns an error if the listing fails (the local directory is left
    /// untouched) or the local directory cannot be prepared.
    pub fn download_directory(
        &self,
        bucket: &str,
        remote_folder: &str,
        local_directory: &Path,
        force: bool,
    ) -> Result<SyncReport, DalError> {
        if !force && has_content(local_directory)? {
            tracing::info!(
                directory = %local_directory.display(),
                "local directory already populated, skipping download"
            );
            return Ok(SyncReport::skipped(bucket, remote_folder, local_directory));
        }

        let keys = self.store.list(bucket, remote_folder)?;
        tracing::debug!(bucket, prefix = remote_folder, objects = keys.len(), "listed objects");

        if force && local_directory.exists() {
            std::fs::remove_dir_all(local_directory)?;
        }
        std::fs::create_dir_all(local_directory)?;

        let mut outcomes = Vec::with_capacity(keys.len());
        for key in keys {
            if key.ends_with('/') {
                continue;
            }
            if !is_under_prefix(remote_folder, &key) {
                tracing::debug!(bucket, key = %key, "ignoring object outside the prefix");
                continue;
            }
            outcomes.push(self.fetch_one(bucket, remote_folder, key, local_directory));
        }

        let report = SyncReport {
            bucket: bucket.to_string(),
            prefix: remote_folder.to_string(),
            directory: local_directory.to_path_buf(),
            status: SyncStatus::Attempted,
            outcomes,
        };

        tracing::info!(
            bucket,
            prefix = remote_folder,
            fetched = report.fetched().count(),
            failed = report.failed().len(),
            bytes = report.bytes_fetched(),
            "download finished"
        );
        Ok(report)
    }

    fn fetch_one(
        &self,
        bucket: &str,
        prefix: &str,
        key: String,
        local_directory: &Path,
    ) -> ObjectOutcome {
        let Some(relative) = relative_object_path(prefix, &key) else {
            tracing::warn!(bucket, key = %key, "object key escapes the target directory");
            return ObjectOutcome {
                local_path: local_directory.to_path_buf(),
                result: Err("object key escapes the target directory".to_string()),
                key,
            };
        };

        let local_path = local_directory.join(relative);
        let result = local_path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .map_err(DalError::from)
            .and_then(|()| self.store.fetch(bucket, &key, &local_path))
            .map_err(|e| e.to_string());

        if let Err(message) = &result {
            tracing::warn!(bucket, key = %key, error = %message, "object fetch failed");
        }

        ObjectOutcome {
            key,
            local_path,
            result,
        }
    }
}

fn has_content(directory: &Path) -> Result<bool, DalError> {
    match std::fs::read_dir(directory) {
        Ok(mut entries) => Ok(entries.next().is_some()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DalError::Io(e)),
    }
}

/// The part of `key` after `prefix`, if `key` is `prefix` itself or lies
/// under it as a directory.
fn strip_folder<'k>(prefix: &str, key: &'k str) -> Option<&'k str> {
    let trimmed = prefix.trim_end_matches('/');
    key.strip_prefix(trimmed)
        .filter(|rest| trimmed.is_empty() || rest.is_empty() || rest.starts_with('/'))
}

fn is_under_prefix(prefix: &str, key: &str) -> bool {
    strip_folder(prefix, key).is_some()
}

/// Path of `key` relative to `prefix`, or `None` if the key is outside the
/// prefix or would leave the target.
fn relative_object_path(prefix: &str, key: &str) -> Option<PathBuf> {
    let rest = strip_folder(prefix, key)?.trim_start_matches('/');

    if rest.is_empty() {
        let name = Path::new(key).file_name()?;
        return Some(PathBuf::from(name));
    }

    let relative = PathBuf::from(rest);
    relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
        .then_some(relative)
}

/// Fuzz-only entrypoint for mapping object keys to local paths.
#[cfg(feature = "fuzzing")]
pub fn fuzz_relative_object_path(prefix: &str, key: &str) -> Option<PathBuf> {
    relative_object_path(prefix, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    /// In-memory store that records every call.
    #[derive(Default)]
    struct MemoryStore {
        objects: BTreeMap<String, Vec<u8>>,
        failing: Vec<String>,
        calls: RefCell<Vec<String>>,
    }

    impl ObjectStore for MemoryStore {
        fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, DalError> {
            self.calls.borrow_mut().push(format!("list {bucket}/{prefix}"));
            Ok(self
                .objects
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect())
        }

        fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64, DalError> {
            self.calls.borrow_mut().push(format!("fetch {bucket}/{key}"));
            if self.failing.iter().any(|failing| failing == key) {
                return Err(DalError::Transfer {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    message: "connection reset".to_string(),
                });
            }
            let bytes = &self.objects[key];
            std::fs::write(dest, bytes)?;
            Ok(bytes.len() as u64)
        }
    }

    fn store() -> MemoryStore {
        let mut objects = BTreeMap::new();
        objects.insert("criteo/day_0.csv".to_string(), b"a,b\n1,2\n".to_vec());
        objects.insert("criteo/sub/day_1.csv".to_string(), b"a,b\n3,4\n".to_vec());
        objects.insert("criteo/sub/".to_string(), Vec::new());
        objects.insert("other/x.csv".to_string(), b"x\n".to_vec());
        MemoryStore {
            objects,
            ..Default::default()
        }
    }

    #[test]
    fn downloads_all_objects_under_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("raw");
        let store = store();

        let report = RemoteSync::new(&store)
            .download_directory("bucket", "criteo", &target, false)
            .unwrap();

        assert_eq!(report.status, SyncStatus::Attempted);
        assert!(report.is_complete());
        assert_eq!(report.fetched().count(), 2);
        assert_eq!(
            std::fs::read_to_string(target.join("sub/day_1.csv")).unwrap(),
            "a,b\n3,4\n"
        );
        assert!(!target.join("x.csv").exists());
    }

    #[test]
    fn populated_directory_is_skipped_without_contacting_store() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.txt"), "local").unwrap();
        let store = store();

        let report = RemoteSync::new(&store)
            .download_directory("bucket", "criteo", dir.path(), false)
            .unwrap();

        assert!(report.is_skipped());
        assert!(store.calls.borrow().is_empty());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("keep.txt")).unwrap(),
            "local"
        );
    }

    #[test]
    fn force_replaces_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("raw");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("stale.csv"), "old").unwrap();
        let store = store();

        let report = RemoteSync::new(&store)
            .download_directory("bucket", "criteo/", &target, true)
            .unwrap();

        assert!(report.is_complete());
        assert!(!target.join("stale.csv").exists());
        assert!(target.join("day_0.csv").is_file());
    }

    #[test]
    fn failures_are_reported_per_object() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store();
        store.failing.push("criteo/day_0.csv".to_string());

        let report = RemoteSync::new(&store)
            .download_directory("bucket", "criteo", dir.path(), true)
            .unwrap();

        assert_eq!(report.failed(), vec!["criteo/day_0.csv"]);
        assert_eq!(report.fetched().count(), 1);
        assert!(dir.path().join("sub/day_1.csv").is_file());

        match report.into_result().unwrap_err() {
            DalError::IncompleteTransfer { bucket, failed } => {
                assert_eq!(bucket, "bucket");
                assert_eq!(failed, vec!["criteo/day_0.csv"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn relative_paths_stay_inside_target() {
        assert_eq!(
            relative_object_path("data/raw", "data/raw/a/b.csv"),
            Some(PathBuf::from("a/b.csv"))
        );
        assert_eq!(
            relative_object_path("", "a.csv"),
            Some(PathBuf::from("a.csv"))
        );
        assert_eq!(
            relative_object_path("data", "data/../../etc/passwd"),
            None
        );
        assert_eq!(
            relative_object_path("data/file.csv", "data/file.csv"),
            Some(PathBuf::from("file.csv"))
        );
        assert_eq!(relative_object_path("data", "data_extra/x.csv"), None);
    }

    #[test]
    fn single_object_key_lands_under_its_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = store();

        let report = RemoteSync::new(&store)
            .download_directory("bucket", "criteo/day_0.csv", dir.path(), false)
            .unwrap();

        assert_eq!(report.fetched().count(), 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("day_0.csv")).unwrap(),
            "a,b\n1,2\n"
        );
        assert!(!dir.path().join("criteo").exists());
    }

    #[test]
    fn sibling_prefixes_are_not_mirrored() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store();
        store
            .objects
            .insert("criteo_extra/x.csv".to_string(), b"x\n".to_vec());

        let report = RemoteSync::new(&store)
            .download_directory("bucket", "criteo", dir.path(), false)
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.outcomes.len(), 2);
        assert!(!dir.path().join("criteo_extra").exists());
    }

    #[test]
    fn failed_listing_keeps_local_content_when_forced() {
        struct BrokenStore;

        impl ObjectStore for BrokenStore {
            fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, DalError> {
                Err(DalError::Transfer {
                    bucket: bucket.to_string(),
                    key: prefix.to_string(),
                    message: "no such bucket".to_string(),
                })
            }

            fn fetch(&self, _: &str, _: &str, _: &Path) -> Result<u64, DalError> {
                unreachable!("nothing is listed")
            }
        }

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("train.csv"), "a\n1\n").unwrap();

        let err = RemoteSync::new(&BrokenStore)
            .download_directory("missing", "criteo", dir.path(), true)
            .unwrap_err();

        assert!(matches!(err, DalError::Transfer { .. }));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("train.csv")).unwrap(),
            "a\n1\n"
        );
    }
}
