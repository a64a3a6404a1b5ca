//! rejar-core — dependency relocation and repackaging for JVM archives.
//!
//! The pipeline merges a set of input jars into one output jar, rewriting
//! package prefixes both in entry paths and inside classfile constant
//! pools, optionally dropping classes that are unreachable from the
//! primary code, and optionally extracting the result as a directory tree.

pub mod archive;
pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod minimize;
pub mod relocate;
pub mod repack;
pub mod resolve;

pub use config::{
    BuildConfig, DuplicatePolicy, ExclusionRule, ExtractSpec, InputRole, InputSpec,
    RelocationRule,
};
pub use error::{RepackError, Result};
pub use repack::{BuildSummary, Repackager};
