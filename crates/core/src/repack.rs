//! The repackaging pipeline: resolve, merge, relocate, minimize, emit.

use indexmap::IndexMap;
use indexmap::map::Entry as MapEntry;
use std::path::PathBuf;
use tracing::{debug, info};
use xxhash_rust::xxh3::xxh3_64;

use crate::archive::{self, JarEntry};
use crate::config::{BuildConfig, DuplicatePolicy};
use crate::error::{RepackError, Result};
use crate::extract;
use crate::minimize;
use crate::relocate::Relocator;
use crate::resolve;

const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

#[derive(Debug)]
pub struct BuildSummary {
    pub output: PathBuf,
    pub entries: usize,
    pub minimized_away: usize,
    pub extracted_to: Option<PathBuf>,
}

/// Owns one build invocation. Construction validates the configuration, so
/// a `Repackager` in hand means the rule set is coherent.
pub struct Repackager {
    config: BuildConfig,
}

impl Repackager {
    pub fn new(config: BuildConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn build(&self) -> Result<BuildSummary> {
        let inputs = resolve::resolve_inputs(&self.config.inputs, &self.config.exclusions)?;
        if inputs.is_empty() {
            return Err(RepackError::Config(
                "exclusion rules removed every input".into(),
            ));
        }

        let relocator = Relocator::new(&self.config.relocations);
        let mut entries = self.merge(&inputs, &relocator)?;

        for (path, entry) in entries.iter_mut() {
            if path.ends_with(".class") {
                entry.bytes = relocator.relocate_class(path, &entry.bytes);
            }
        }

        let mut minimized_away = 0;
        if self.config.minimize {
            let report = minimize::minimize(&mut entries, &self.config.roots);
            minimized_away = report.dropped.len();
            info!(
                "minimization dropped {} entries ({} kept unparsed)",
                report.dropped.len(),
                report.kept_unparsed
            );
        }

        entries.sort_keys();
        archive::write_jar(&self.config.output, &entries)?;
        info!(
            "wrote {} with {} entries",
            self.config.output.display(),
            entries.len()
        );

        let mut extracted_to = None;
        if let Some(spec) = &self.config.extract {
            extract::extract(
                &self.config.output,
                &spec.destination,
                spec.include_empty_dirs,
            )?;
            info!("extracted into {}", spec.destination.display());
            extracted_to = Some(spec.destination.clone());
        }

        Ok(BuildSummary {
            output: self.config.output.clone(),
            entries: entries.len(),
            minimized_away,
            extracted_to,
        })
    }

    /// Merges all inputs, keyed by final (post-relocation) path.
    ///
    /// Jar signing metadata is stripped (the merged jar cannot carry the
    /// inputs' signatures) and only the first manifest is kept, mirroring
    /// what the shadow-jar toolchain does. Everything else that collides
    /// with different bytes is a conflict under the default policy.
    fn merge(
        &self,
        inputs: &[resolve::ResolvedInput],
        relocator: &Relocator,
    ) -> Result<IndexMap<String, JarEntry>> {
        let mut merged: IndexMap<String, JarEntry> = IndexMap::new();

        for input in inputs {
            for (path, entry) in archive::read_entries(input)? {
                if is_signature_metadata(&path) {
                    debug!("stripping signature entry '{path}' from {}", input.display);
                    continue;
                }
                let final_path = if path.ends_with('/') {
                    path
                } else {
                    relocator.relocate_path(&path)
                };

                match merged.entry(final_path) {
                    MapEntry::Vacant(slot) => {
                        slot.insert(entry);
                    }
                    MapEntry::Occupied(mut slot) => {
                        if slot.key().ends_with('/') || slot.key() == MANIFEST_PATH {
                            continue;
                        }
                        // Hash first to skip the byte compare in the common
                        // differing case; equal hashes still require equal
                        // bytes before the copies are treated as one.
                        if xxh3_64(&slot.get().bytes) == xxh3_64(&entry.bytes)
                            && slot.get().bytes == entry.bytes
                        {
                            continue;
                        }
                        match self.config.duplicates {
                            DuplicatePolicy::Fail => {
                                return Err(RepackError::Conflict {
                                    path: slot.key().clone(),
                                    first: slot.get().origin.to_string(),
                                    second: entry.origin.to_string(),
                                });
                            }
                            DuplicatePolicy::LastWins => {
                                debug!(
                                    "'{}' from {} replaces the copy from {}",
                                    slot.key(),
                                    entry.origin,
                                    slot.get().origin
                                );
                                slot.insert(entry);
                            }
                        }
                    }
                }
            }
        }

        Ok(merged)
    }
}

fn is_signature_metadata(path: &str) -> bool {
    let Some(rest) = path.strip_prefix("META-INF/") else {
        return false;
    };
    if rest.contains('/') {
        return false;
    }
    rest.ends_with(".SF")
        || rest.ends_with(".DSA")
        || rest.ends_with(".RSA")
        || rest.starts_with("SIG-")
}
