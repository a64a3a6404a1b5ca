//! Extraction of the output archive into a directory tree.

use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

use crate::error::{RepackError, Result};

/// Unpacks `artifact` into `destination`.
///
/// Any previous tree at `destination` is replaced, so the result always
/// mirrors the current artifact and re-running is idempotent. When
/// `include_empty_dirs` is false, only parent directories of actual files
/// are created: relocation moves classes out of their original package
/// directories and minimization removes entries outright, and neither
/// should leave empty husks in the tree.
pub fn extract(artifact: &Path, destination: &Path, include_empty_dirs: bool) -> Result<()> {
    let file = File::open(artifact)?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| RepackError::Io(std::io::Error::other(e)))?;

    if destination.exists() {
        std::fs::remove_dir_all(destination)?;
    }
    std::fs::create_dir_all(destination)?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| RepackError::Io(std::io::Error::other(e)))?;
        let Some(relative) = sanitize(entry.name()) else {
            debug!("skipping unsafe entry name '{}'", entry.name());
            continue;
        };
        let target = destination.join(&relative);

        if entry.is_dir() {
            if include_empty_dirs {
                std::fs::create_dir_all(&target)?;
            }
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        std::fs::write(&target, bytes)?;
    }

    Ok(())
}

/// Rejects absolute paths and parent traversals in entry names.
fn sanitize(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}
