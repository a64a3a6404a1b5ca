//! Input artifact resolution.
//!
//! Inputs are declared either as filesystem paths or as Maven-style
//! `group:artifact:version` coordinates. Coordinates are located in the
//! local Gradle cache (`~/.gradle/caches/modules-2/files-2.1`, laid out as
//! `{group}/{artifact}/{version}/{hash}/{file}`) and in the local Maven
//! repository (`~/.m2/repository`).

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::{ExclusionRule, InputRole, InputSpec};
use crate::error::{RepackError, Result};

/// An input archive located on disk, with provenance when known.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    /// The input as declared, used in logs and conflict reports.
    pub display: String,
    pub path: PathBuf,
    pub role: InputRole,
    /// `(group, artifact)` when the input came from a coordinate or from a
    /// recognizable cache layout. Exclusion rules match against this.
    pub provenance: Option<(String, String)>,
}

impl ResolvedInput {
    fn excluded_by(&self, rules: &[ExclusionRule]) -> bool {
        let Some((group, name)) = &self.provenance else {
            return false;
        };
        rules.iter().any(|r| &r.group == group && &r.name == name)
    }
}

/// Resolves every declared input and applies exclusion rules.
pub fn resolve_inputs(
    specs: &[InputSpec],
    exclusions: &[ExclusionRule],
) -> Result<Vec<ResolvedInput>> {
    let mut resolved = Vec::with_capacity(specs.len());
    for spec in specs {
        let input = resolve_one(spec)?;
        if input.excluded_by(exclusions) {
            info!("excluding {} by rule", input.display);
            continue;
        }
        debug!("resolved {} -> {}", input.display, input.path.display());
        resolved.push(input);
    }
    Ok(resolved)
}

fn resolve_one(spec: &InputSpec) -> Result<ResolvedInput> {
    let path = Path::new(&spec.artifact);
    if path.exists() {
        verify_archive(&spec.artifact, path)?;
        return Ok(ResolvedInput {
            display: spec.artifact.clone(),
            path: path.to_path_buf(),
            role: spec.role,
            provenance: gradle_cache_provenance(path),
        });
    }

    if let Some((group, artifact, version)) = parse_coordinate(&spec.artifact) {
        let Some(located) = locate_coordinate(&group, &artifact, &version) else {
            return Err(RepackError::resolution(
                &spec.artifact,
                "not found in the local Gradle or Maven cache",
            ));
        };
        verify_archive(&spec.artifact, &located)?;
        return Ok(ResolvedInput {
            display: spec.artifact.clone(),
            path: located,
            role: spec.role,
            provenance: Some((group, artifact)),
        });
    }

    Err(RepackError::resolution(&spec.artifact, "no such file"))
}

/// Checks the zip magic so a bad input fails before the merge starts.
fn verify_archive(display: &str, path: &Path) -> Result<()> {
    let mut file =
        File::open(path).map_err(|e| RepackError::resolution(display, e))?;
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)
        .map_err(|e| RepackError::resolution(display, e))?;
    match magic {
        // PK\x03\x04, PK\x05\x06 (empty), PK\x07\x08 (spanned)
        [0x50, 0x4B, 0x03, 0x04] | [0x50, 0x4B, 0x05, 0x06] | [0x50, 0x4B, 0x07, 0x08] => Ok(()),
        _ => Err(RepackError::resolution(display, "not a zip archive")),
    }
}

fn parse_coordinate(artifact: &str) -> Option<(String, String, String)> {
    let mut parts = artifact.split(':');
    let group = parts.next()?;
    let name = parts.next()?;
    let version = parts.next()?;
    if parts.next().is_some() || group.is_empty() || name.is_empty() || version.is_empty() {
        return None;
    }
    Some((group.to_string(), name.to_string(), version.to_string()))
}

fn locate_coordinate(group: &str, artifact: &str, version: &str) -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    let jar_name = format!("{artifact}-{version}.jar");

    // Gradle cache keeps the jar under a content-hash directory.
    let gradle_dir = home
        .join(".gradle/caches/modules-2/files-2.1")
        .join(group)
        .join(artifact)
        .join(version);
    if gradle_dir.is_dir() {
        let hit = WalkDir::new(&gradle_dir)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
            .find(|e| e.file_name().to_str() == Some(jar_name.as_str()));
        if let Some(entry) = hit {
            return Some(entry.into_path());
        }
    }

    let maven_path = home
        .join(".m2/repository")
        .join(group.replace('.', "/"))
        .join(artifact)
        .join(version)
        .join(&jar_name);
    if maven_path.is_file() {
        return Some(maven_path);
    }

    None
}

/// Recovers `(group, artifact)` from a Gradle cache path so exclusion rules
/// also apply to inputs declared as raw paths. Anchoring on the `files-2.1`
/// component also covers caches relocated via GRADLE_USER_HOME.
fn gradle_cache_provenance(path: &Path) -> Option<(String, String)> {
    let components: Vec<_> = path.components().collect();
    let anchor = components
        .iter()
        .position(|c| c.as_os_str() == "files-2.1")?;

    // Expected below the anchor: group/artifact/version/hash/file.jar
    if components.len() == anchor + 6 {
        let group = components[anchor + 1].as_os_str().to_string_lossy().to_string();
        let artifact = components[anchor + 2]
            .as_os_str()
            .to_string_lossy()
            .to_string();
        return Some((group, artifact));
    }
    None
}
