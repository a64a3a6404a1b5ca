//! Invocation configuration: inputs, rules, and the output location.
//!
//! A configuration is an ordered set of immutable value records. All rule
//! validation happens here, eagerly, before any archive is opened.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RepackError, Result};

/// Role of an input archive in the merged output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputRole {
    /// Never minimized away; its classes seed the reachability root set.
    Primary,
    /// Bundled third-party code, eligible for minimization.
    #[default]
    Shaded,
}

/// One input archive, declared as a filesystem path or as a
/// `group:artifact:version` coordinate resolved against the local
/// Gradle/Maven caches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSpec {
    pub artifact: String,
    #[serde(default)]
    pub role: InputRole,
}

impl InputSpec {
    pub fn shaded(artifact: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            role: InputRole::Shaded,
        }
    }

    pub fn primary(artifact: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            role: InputRole::Primary,
        }
    }
}

/// A package-prefix rename, in dotted form (`com.github.benmanes.caffeine`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationRule {
    pub from: String,
    pub to: String,
}

impl RelocationRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Drops a resolved input entirely, matched by `(group, name)` provenance.
/// Used for annotation-only dependencies that are not needed at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRule {
    pub group: String,
    pub name: String,
}

impl ExclusionRule {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }
}

/// What to do when two inputs contribute different bytes at the same
/// final path. Fail-fast is the default; `last-wins` must be opted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    #[default]
    Fail,
    LastWins,
}

/// Optional extraction of the output archive into a directory tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractSpec {
    pub destination: PathBuf,
    #[serde(default = "default_true")]
    pub include_empty_dirs: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    pub inputs: Vec<InputSpec>,
    #[serde(default)]
    pub exclusions: Vec<ExclusionRule>,
    #[serde(default)]
    pub relocations: Vec<RelocationRule>,
    #[serde(default)]
    pub minimize: bool,
    /// Extra reachability roots (dotted class names) beyond the classes of
    /// `primary` inputs.
    #[serde(default)]
    pub roots: Vec<String>,
    #[serde(default)]
    pub duplicates: DuplicatePolicy,
    pub output: PathBuf,
    #[serde(default)]
    pub extract: Option<ExtractSpec>,
}

impl BuildConfig {
    /// Loads a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RepackError::Config(format!("cannot read '{}': {e}", path.display()))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            RepackError::Config(format!("cannot parse '{}': {e}", path.display()))
        })
    }

    /// Validates the whole rule set before any I/O happens.
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(RepackError::Config("no inputs declared".into()));
        }

        for rule in &self.relocations {
            validate_prefix(&rule.from, "from")?;
            validate_prefix(&rule.to, "to")?;
            if is_segment_prefix(&rule.from, &rule.to) || is_segment_prefix(&rule.to, &rule.from) {
                return Err(RepackError::Config(format!(
                    "relocation '{}' -> '{}': prefixes must not nest",
                    rule.from, rule.to
                )));
            }
        }

        for (i, a) in self.relocations.iter().enumerate() {
            for b in self.relocations.iter().skip(i + 1) {
                if is_segment_prefix(&a.from, &b.from) || is_segment_prefix(&b.from, &a.from) {
                    return Err(RepackError::Config(format!(
                        "relocations '{}' and '{}' overlap: ambiguous rewrite",
                        a.from, b.from
                    )));
                }
            }
            // A source prefix nesting with another rule's target would
            // rewrite already-relocated names on a later pass.
            for (j, b) in self.relocations.iter().enumerate() {
                if i == j {
                    continue;
                }
                if is_segment_prefix(&a.from, &b.to) || is_segment_prefix(&b.to, &a.from) {
                    return Err(RepackError::Config(format!(
                        "relocation source '{}' overlaps target '{}': ambiguous rewrite",
                        a.from, b.to
                    )));
                }
            }
        }

        if self.minimize
            && self.roots.is_empty()
            && !self.inputs.iter().any(|i| i.role == InputRole::Primary)
        {
            return Err(RepackError::Config(
                "minimize requires a root set: declare a primary input or explicit roots".into(),
            ));
        }

        Ok(())
    }
}

fn validate_prefix(prefix: &str, side: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(RepackError::Config(format!(
            "relocation '{side}' prefix is empty"
        )));
    }
    if prefix.contains('/') || prefix.starts_with('.') || prefix.ends_with('.') {
        return Err(RepackError::Config(format!(
            "relocation '{side}' prefix '{prefix}' must be a dotted package prefix"
        )));
    }
    Ok(())
}

/// `a.b` is a segment prefix of `a.b` and `a.b.c`, but not of `a.bc`.
fn is_segment_prefix(prefix: &str, s: &str) -> bool {
    match s.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(relocations: Vec<RelocationRule>) -> BuildConfig {
        BuildConfig {
            inputs: vec![InputSpec::shaded("lib.jar")],
            exclusions: vec![],
            relocations,
            minimize: false,
            roots: vec![],
            duplicates: DuplicatePolicy::default(),
            output: PathBuf::from("out.jar"),
            extract: None,
        }
    }

    #[test]
    fn accepts_disjoint_rules() {
        let config = base_config(vec![
            RelocationRule::new("com.github.benmanes.caffeine", "shaded.caffeine"),
            RelocationRule::new("com.blogspot.mydailyjava.weaklockfree", "shaded.weaklockfree"),
        ]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_nested_from_and_to() {
        let config = base_config(vec![RelocationRule::new("a.b", "a.b.shaded")]);
        assert!(matches!(config.validate(), Err(RepackError::Config(_))));
    }

    #[test]
    fn rejects_overlapping_sources() {
        let config = base_config(vec![
            RelocationRule::new("a.b", "x.y"),
            RelocationRule::new("a.b.c", "p.q"),
        ]);
        assert!(matches!(config.validate(), Err(RepackError::Config(_))));
    }

    #[test]
    fn rejects_source_nesting_with_another_target() {
        // The second rule's source sits inside the first rule's target, so
        // symbols rewritten by the first rule would be rewritten again.
        let config = base_config(vec![
            RelocationRule::new("p.q", "a.b.z"),
            RelocationRule::new("a.b", "x.y"),
        ]);
        assert!(matches!(config.validate(), Err(RepackError::Config(_))));

        // Same hazard in the other direction: one rule's target is a
        // segment prefix of another rule's source.
        let config = base_config(vec![
            RelocationRule::new("a.b.c", "x.y"),
            RelocationRule::new("p.q", "a.b"),
        ]);
        assert!(matches!(config.validate(), Err(RepackError::Config(_))));
    }

    #[test]
    fn allows_target_containing_source_as_inner_segments() {
        // The canonical shading shape: relocate under a new top-level
        // prefix while keeping the original path below it.
        let config = base_config(vec![RelocationRule::new("a.b", "shaded.a.b")]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn segment_prefix_requires_boundary() {
        assert!(is_segment_prefix("a.b", "a.b.c"));
        assert!(is_segment_prefix("a.b", "a.b"));
        assert!(!is_segment_prefix("a.b", "a.bc"));
    }

    #[test]
    fn minimize_without_roots_is_rejected() {
        let mut config = base_config(vec![]);
        config.minimize = true;
        assert!(matches!(config.validate(), Err(RepackError::Config(_))));
        config.roots = vec!["a.b.X".into()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_json_config() {
        let json = r#"{
            "inputs": [
                {"artifact": "com.github.ben-manes.caffeine:caffeine:3.1.8"},
                {"artifact": "app/classes.jar", "role": "primary"}
            ],
            "exclusions": [{"group": "org.checkerframework", "name": "checker-qual"}],
            "relocations": [{"from": "com.github.benmanes.caffeine", "to": "shaded.caffeine"}],
            "minimize": true,
            "output": "build/shaded.jar",
            "extract": {"destination": "build/extracted", "include_empty_dirs": false}
        }"#;
        let config: BuildConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.inputs.len(), 2);
        assert_eq!(config.inputs[1].role, InputRole::Primary);
        assert_eq!(config.duplicates, DuplicatePolicy::Fail);
        assert!(!config.extract.as_ref().unwrap().include_empty_dirs);
        assert!(config.validate().is_ok());
    }
}
