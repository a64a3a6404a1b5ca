//! Jar reading and deterministic jar writing.

use indexmap::IndexMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::config::InputRole;
use crate::error::{RepackError, Result};
use crate::resolve::ResolvedInput;

/// One entry of the merged output, keyed externally by its final path.
/// Directory entries keep a trailing `/` in their key and have no bytes.
#[derive(Debug, Clone)]
pub struct JarEntry {
    pub bytes: Vec<u8>,
    /// Display name of the contributing input, for conflict reports.
    pub origin: Arc<str>,
    pub role: InputRole,
}

/// Reads every entry of an input archive in stored order.
pub fn read_entries(input: &ResolvedInput) -> Result<Vec<(String, JarEntry)>> {
    let file = File::open(&input.path)
        .map_err(|e| RepackError::resolution(&input.display, e))?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| RepackError::resolution(&input.display, e))?;

    let origin: Arc<str> = Arc::from(input.display.as_str());
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| RepackError::resolution(&input.display, e))?;
        let name = entry.name().to_string();
        let mut bytes = Vec::new();
        if !entry.is_dir() {
            entry
                .read_to_end(&mut bytes)
                .map_err(|e| RepackError::resolution(&input.display, e))?;
        }
        entries.push((
            name,
            JarEntry {
                bytes,
                origin: Arc::clone(&origin),
                role: input.role,
            },
        ));
    }
    Ok(entries)
}

/// Writes the merged entry set as a jar.
///
/// Output is byte-deterministic: the caller passes entries already sorted
/// by path, and timestamps, compression and permissions are fixed here.
/// The archive is staged in a named temp file next to the destination and
/// persisted atomically, so a failed build leaves nothing behind.
pub fn write_jar(dest: &Path, entries: &IndexMap<String, JarEntry>) -> Result<()> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let staging = tempfile::NamedTempFile::new_in(parent)?;
    let mut writer = ZipWriter::new(staging);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    for (path, entry) in entries {
        if path.ends_with('/') {
            writer
                .add_directory(path.trim_end_matches('/'), options)
                .map_err(zip_write_error)?;
        } else {
            writer
                .start_file(path.as_str(), options)
                .map_err(zip_write_error)?;
            writer.write_all(&entry.bytes)?;
        }
    }

    let staging = writer.finish().map_err(zip_write_error)?;
    staging
        .persist(dest)
        .map_err(|e| RepackError::Io(e.error))?;
    Ok(())
}

fn zip_write_error(e: zip::result::ZipError) -> RepackError {
    RepackError::Io(std::io::Error::other(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputRole;

    fn entry(bytes: &[u8]) -> JarEntry {
        JarEntry {
            bytes: bytes.to_vec(),
            origin: Arc::from("test.jar"),
            role: InputRole::Shaded,
        }
    }

    #[test]
    fn writes_are_byte_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let mut entries = IndexMap::new();
        entries.insert("a/b/X.class".to_string(), entry(b"xxxx"));
        entries.insert("a/b/Y.class".to_string(), entry(b"yyyy"));
        entries.insert("META-INF/MANIFEST.MF".to_string(), entry(b"Manifest-Version: 1.0\n"));
        entries.sort_keys();

        let first = dir.path().join("first.jar");
        let second = dir.path().join("second.jar");
        write_jar(&first, &entries).unwrap();
        write_jar(&second, &entries).unwrap();

        assert_eq!(
            std::fs::read(&first).unwrap(),
            std::fs::read(&second).unwrap()
        );
    }

    #[test]
    fn round_trips_entries() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("out.jar");
        let mut entries = IndexMap::new();
        entries.insert("a/b/X.class".to_string(), entry(b"content"));
        entries.insert("a/".to_string(), entry(b""));
        entries.sort_keys();
        write_jar(&jar, &entries).unwrap();

        let mut archive = ZipArchive::new(File::open(&jar).unwrap()).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a/".to_string(), "a/b/X.class".to_string()]);
    }
}
