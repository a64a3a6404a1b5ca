//! Path-prefix relocation and classfile reference rewriting.
//!
//! Path rewriting moves entries into their new package directories.
//! Reference rewriting runs over classfile constant pools: every UTF-8
//! constant is rewritten for both the slashed (internal) and dotted form
//! of each source prefix, which covers class references, field/method
//! descriptors, generic signatures, and string constants used with
//! `Class.forName`. Directory entries are intentionally left alone; the
//! extraction side drops the empty husks they become.

use ristretto_classfile::{ClassFile, Constant, ConstantPool};
use std::io::Cursor;
use tracing::warn;

use crate::config::RelocationRule;

struct CompiledRule {
    from_path: String,
    to_path: String,
    from_dot: String,
    to_dot: String,
}

pub struct Relocator {
    rules: Vec<CompiledRule>,
}

impl Relocator {
    pub fn new(rules: &[RelocationRule]) -> Self {
        let rules = rules
            .iter()
            .map(|rule| CompiledRule {
                from_path: rule.from.replace('.', "/"),
                to_path: rule.to.replace('.', "/"),
                from_dot: rule.from.clone(),
                to_dot: rule.to.clone(),
            })
            .collect();
        Self { rules }
    }

    /// Rewrites an entry path. At most one rule can match because
    /// overlapping source prefixes are rejected at configuration time.
    /// Multi-release variants are rewritten below their
    /// `META-INF/versions/<N>/` prefix so they move with the base class.
    pub fn relocate_path(&self, path: &str) -> String {
        if let Some((versions, rest)) = split_multi_release(path) {
            return format!("{versions}{}", self.relocate_base(rest));
        }
        self.relocate_base(path)
    }

    fn relocate_base(&self, path: &str) -> String {
        for rule in &self.rules {
            if let Some(rest) = strip_segment_prefix(path, &rule.from_path) {
                return format!("{}/{}", rule.to_path, rest);
            }
        }
        path.to_string()
    }

    /// Rewrites references inside a classfile. A classfile that cannot be
    /// parsed is returned unmodified with a warning; its path is still
    /// relocated by the caller.
    pub fn relocate_class(&self, path: &str, bytes: &[u8]) -> Vec<u8> {
        if self.rules.is_empty() {
            return bytes.to_vec();
        }
        match self.rewrite_class(bytes) {
            Ok(rewritten) => rewritten,
            Err(e) => {
                warn!("keeping '{path}' with unrewritten references: {e}");
                bytes.to_vec()
            }
        }
    }

    fn rewrite_class(
        &self,
        bytes: &[u8],
    ) -> std::result::Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        let mut class = ClassFile::from_bytes(&mut Cursor::new(bytes.to_vec()))?;

        // The pool is rebuilt in place: adding constants in the original
        // order preserves every index, including the double slots of longs
        // and doubles, so nothing else in the classfile needs touching.
        let mut pool = ConstantPool::default();
        for constant in class.constant_pool.iter() {
            let rewritten = match constant {
                Constant::Utf8(value) => Constant::Utf8(self.rewrite_symbol(value)),
                other => other.clone(),
            };
            pool.add(rewritten);
        }
        class.constant_pool = pool;

        let mut out = Vec::with_capacity(bytes.len());
        class.to_bytes(&mut out)?;
        Ok(out)
    }

    fn rewrite_symbol(&self, value: &str) -> String {
        let mut value = value.to_string();
        for rule in &self.rules {
            if value.contains(&rule.from_path) {
                value = replace_occurrences(&value, &rule.from_path, &rule.to_path, &rule.to_dot);
            }
            // For a single-segment prefix both forms are the same string
            // and the first pass already handled it.
            if rule.from_dot != rule.from_path && value.contains(&rule.from_dot) {
                value = replace_occurrences(&value, &rule.from_dot, &rule.to_dot, &rule.to_dot);
            }
        }
        value
    }
}

fn strip_segment_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    rest.strip_prefix('/')
}

/// Splits `META-INF/versions/<N>/a/b/X.class` into the versioned prefix
/// (trailing slash included) and the class path below it.
fn split_multi_release(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix("META-INF/versions/")?;
    let slash = rest.find('/')?;
    let version = &rest[..slash];
    if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let prefix_len = path.len() - rest.len() + slash + 1;
    Some((&path[..prefix_len], &rest[slash + 1..]))
}

/// Replaces occurrences of `from` that sit on name boundaries, picking the
/// dotted target form when the occurrence continues with a `.` separator.
///
/// The trailing check keeps a rule for `a/b` away from `a/bc`. The leading
/// check keeps a second application away from already-relocated names when
/// the target embeds the source (`a.b` -> `shaded.a.b`), while still
/// matching after descriptor markers like `(L` or `[L`.
fn replace_occurrences(haystack: &str, from: &str, to_slash: &str, to_dot: &str) -> String {
    let mut out = String::with_capacity(haystack.len());
    let mut rest = haystack;
    let mut consumed = 0;
    while let Some(pos) = rest.find(from) {
        let tail = &rest[pos + from.len()..];
        let next = tail.chars().next();
        let ends_on_boundary = !next.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        let starts_on_boundary = starts_token(haystack, consumed + pos);
        out.push_str(&rest[..pos]);
        if ends_on_boundary && starts_on_boundary {
            out.push_str(if next == Some('.') { to_dot } else { to_slash });
        } else {
            out.push_str(from);
        }
        consumed += pos + from.len();
        rest = tail;
    }
    out.push_str(rest);
    out
}

/// Whether the occurrence at byte offset `pos` begins a class-name token.
fn starts_token(haystack: &str, pos: usize) -> bool {
    if pos == 0 {
        return true;
    }
    let bytes = haystack.as_bytes();
    match bytes[pos - 1] {
        // Continuation of a longer package or class name.
        b'/' | b'.' | b'$' => false,
        // Object-type marker in a descriptor or generic signature, valid
        // only where a type may start.
        b'L' => {
            pos == 1
                || matches!(
                    bytes[pos - 2],
                    b'(' | b')' | b'[' | b';' | b':' | b'<' | b'>' | b'+' | b'-'
                )
        }
        c if c.is_ascii_alphanumeric() || c == b'_' => false,
        _ => true,
    }
}
