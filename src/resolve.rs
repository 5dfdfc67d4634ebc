//! Mapping from dataset descriptors to physical paths.
//!
//! Layout: `{home}/{source}/{stage}/{name}.{ext}` for files and
//! `{home}/{source}/{stage}` for directories. Paths are recomputed on every
//! call; nothing is cached.

use std::path::PathBuf;

use crate::descriptor::{DatasetDescriptor, Vocabulary};

/// Resolve the file path a descriptor refers to.
pub fn resolve_file_path(descriptor: &DatasetDescriptor) -> PathBuf {
    let file_name = format!(
        "{}.{}",
        descriptor.name(),
        descriptor.format().extension()
    );
    let path = resolve_directory_path(descriptor).join(file_name);
    tracing::debug!(path = %path.display(), "resolved file path");
    path
}

/// Resolve the directory holding every dataset of a source and stage.
pub fn resolve_directory_path(descriptor: &DatasetDescriptor) -> PathBuf {
    descriptor
        .home()
        .join(descriptor.source().as_str())
        .join(descriptor.stage().as_str())
}
