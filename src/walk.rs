// Local file enumeration: turns user-chosen paths into (local path,
// object name) pairs. Single files map to their file name; a directory
// maps every regular file below it to its `/`-joined path relative to
// the root.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Result, TransferError};

pub const TRACING_TARGET: &str = "tcstore_cli::walk";

/// A local file and the object name it will be stored under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadEntry {
    pub path: PathBuf,
    pub object_name: String,
}

/// Maps each path to its bare file name. Paths without a file name
/// (e.g. `/` or `..`) are skipped.
pub fn file_entries(paths: &[PathBuf]) -> Vec<UploadEntry> {
    paths
        .iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().into_owned();
            Some(UploadEntry {
                path: path.clone(),
                object_name: name,
            })
        })
        .collect()
}

/// Every file under `root`, sorted by object name. Symlinks are followed.
///
/// An entry the walk cannot read (broken link, unreadable directory, link
/// loop) is still returned under its own name, so the upload task for it
/// fails and the batch reports the failure.
pub fn directory_entries(root: &Path) -> Result<Vec<UploadEntry>> {
    let meta = std::fs::metadata(root).map_err(|e| TransferError::io(root, e))?;
    if !meta.is_dir() {
        return Err(TransferError::io(
            root,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let Some(relative) = e.path().and_then(|p| p.strip_prefix(root).ok()) else {
                    return Err(TransferError::io(root, e.into()));
                };
                tracing::warn!(target: TRACING_TARGET, error = %e, "Unreadable entry, upload will fail");
                entries.push(UploadEntry {
                    path: root.join(relative),
                    object_name: object_name_for(relative),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        entries.push(UploadEntry {
            path: entry.path().to_path_buf(),
            object_name: object_name_for(relative),
        });
    }
    entries.sort_by(|a, b| a.object_name.cmp(&b.object_name));

    tracing::debug!(
        target: TRACING_TARGET,
        root = %root.display(),
        count = entries.len(),
        "Directory walked"
    );
    Ok(entries)
}

/// [`directory_entries`] on the blocking pool.
pub async fn walk_directory(root: PathBuf) -> Result<Vec<UploadEntry>> {
    let walk_root = root.clone();
    tokio::task::spawn_blocking(move || directory_entries(&walk_root))
        .await
        .map_err(|e| TransferError::io(root, std::io::Error::new(std::io::ErrorKind::Other, e)))?
}

/// Joins path components with `/` regardless of the host separator.
pub fn object_name_for(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
