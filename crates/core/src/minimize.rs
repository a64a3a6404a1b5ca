//! Reachability-based minimization.
//!
//! A conservative mark-and-sweep over the class-reference graph of the
//! merged entry set. Classes from `primary` inputs (plus explicitly
//! configured roots) seed the walk; unreached `.class` entries from
//! `shaded` inputs are dropped. Everything doubtful is kept: resources are
//! never candidates, and a classfile whose references cannot be read is
//! retained and warned about.

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use ristretto_classfile::{ClassFile, Constant};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use tracing::{debug, warn};

use crate::archive::JarEntry;
use crate::config::InputRole;

#[derive(Debug, Default)]
pub struct MinimizeReport {
    pub dropped: Vec<String>,
    pub kept_unparsed: usize,
}

/// Removes unreachable shaded classes from `entries` in place.
///
/// `extra_roots` are dotted class names from the configuration; entries are
/// keyed by final (post-relocation) path, so roots must name the relocated
/// classes.
pub fn minimize(
    entries: &mut IndexMap<String, JarEntry>,
    extra_roots: &[String],
) -> MinimizeReport {
    let mut report = MinimizeReport::default();

    // One graph node per .class entry, indexed by internal class name.
    let mut graph: DiGraph<(), ()> = DiGraph::new();
    let mut nodes: HashMap<String, NodeIndex> = HashMap::new();
    for path in entries.keys() {
        if let Some(name) = class_name(path) {
            let node = graph.add_node(());
            nodes.insert(name.to_string(), node);
        }
    }

    let mut roots: Vec<NodeIndex> = Vec::new();
    let mut unparsed: HashSet<NodeIndex> = HashSet::new();
    for (path, entry) in entries.iter() {
        let Some(name) = class_name(path) else {
            continue;
        };
        let node = nodes[name];
        if entry.role == InputRole::Primary {
            roots.push(node);
        }

        match class_references(&entry.bytes) {
            Ok(refs) => {
                for referenced in refs {
                    if let Some(&target) = nodes.get(referenced.as_str()) {
                        graph.update_edge(node, target, ());
                    }
                }
            }
            Err(e) => {
                warn!("cannot resolve references of '{path}', keeping it: {e}");
                // Constant pools store names as plain UTF-8, so a raw byte
                // scan still recovers references from a classfile that does
                // not parse structurally.
                for (name, &target) in &nodes {
                    if target != node
                        && !name.is_empty()
                        && entry.bytes.windows(name.len()).any(|w| w == name.as_bytes())
                    {
                        graph.update_edge(node, target, ());
                    }
                }
                unparsed.insert(node);
                report.kept_unparsed += 1;
            }
        }
    }

    for root in extra_roots {
        let internal = root.replace('.', "/");
        match nodes.get(internal.as_str()) {
            Some(&node) => roots.push(node),
            None => warn!("minimization root '{root}' is not in the output"),
        }
    }
    // An unparseable class is kept, so whatever it references must survive
    // too. Treating it as a root is the conservative reading.
    roots.extend(unparsed.iter().copied());

    let mut reached: HashSet<NodeIndex> = HashSet::new();
    let mut dfs = Dfs::empty(&graph);
    for root in roots {
        dfs.move_to(root);
        while let Some(node) = dfs.next(&graph) {
            reached.insert(node);
        }
    }

    entries.retain(|path, entry| {
        let Some(name) = class_name(path) else {
            return true;
        };
        if entry.role == InputRole::Primary {
            return true;
        }
        if reached.contains(&nodes[name]) {
            return true;
        }
        debug!("minimized away '{path}'");
        report.dropped.push(path.clone());
        false
    });

    report
}

fn class_name(path: &str) -> Option<&str> {
    // Multi-release variants under META-INF/versions are treated as
    // resources and kept alongside whatever base class survives.
    if path.starts_with("META-INF/") {
        return None;
    }
    path.strip_suffix(".class")
}

/// Internal names referenced by a classfile: every `Class` constant plus
/// `L…;` tokens inside descriptor-shaped UTF-8 constants. Over-approximating
/// is fine here; missing a reference is what must never happen.
fn class_references(
    bytes: &[u8],
) -> std::result::Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
    let class = ClassFile::from_bytes(&mut Cursor::new(bytes.to_vec()))?;
    let mut refs = Vec::new();
    for constant in class.constant_pool.iter() {
        match constant {
            Constant::Class(name_index) => {
                if let Ok(name) = class.constant_pool.try_get_utf8(*name_index) {
                    push_type_name(name, &mut refs);
                }
            }
            Constant::Utf8(value) if value.contains(';') => {
                descriptor_references(value, &mut refs);
            }
            _ => {}
        }
    }
    Ok(refs)
}

/// A `Class` constant holds either an internal name or an array descriptor.
fn push_type_name(name: &str, refs: &mut Vec<String>) {
    let element = name.trim_start_matches('[');
    if let Some(object) = element.strip_prefix('L').and_then(|s| s.strip_suffix(';')) {
        refs.push(object.to_string());
    } else if !element.is_empty() && element.len() > 1 {
        refs.push(element.to_string());
    }
}

fn descriptor_references(descriptor: &str, refs: &mut Vec<String>) {
    let mut rest = descriptor;
    while let Some(start) = rest.find('L') {
        let tail = &rest[start + 1..];
        let Some(end) = tail.find(';') else {
            return;
        };
        let name = &tail[..end];
        // Generic signatures use `<` inside the name; take the raw part.
        let name = name.split('<').next().unwrap_or(name);
        if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '$' | '_')) {
            refs.push(name.to_string());
        }
        rest = &tail[end + 1..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ristretto_classfile::{ClassAccessFlags, ConstantPool};
    use std::sync::Arc;

    fn entry(bytes: Vec<u8>, role: InputRole) -> JarEntry {
        JarEntry {
            bytes,
            origin: Arc::from("test.jar"),
            role,
        }
    }

    fn simple_class(name: &str) -> Vec<u8> {
        let mut pool = ConstantPool::default();
        let this_class = pool.add_class(name).unwrap();
        let super_class = pool.add_class("java/lang/Object").unwrap();
        let class = ClassFile {
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            constant_pool: pool,
            this_class,
            super_class,
            ..Default::default()
        };
        let mut bytes = Vec::new();
        class.to_bytes(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn unparseable_class_keeps_the_classes_it_mentions() {
        // Magic plus a bad version, then the dependency's internal name as
        // raw bytes, the way it would sit in a constant pool.
        let mut broken = vec![0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00];
        broken.extend_from_slice(b"a/b/Dep");

        let mut entries: IndexMap<String, JarEntry> = IndexMap::new();
        entries.insert("a/b/Bad.class".into(), entry(broken, InputRole::Shaded));
        entries.insert(
            "a/b/Dep.class".into(),
            entry(simple_class("a/b/Dep"), InputRole::Shaded),
        );
        entries.insert(
            "a/b/Stray.class".into(),
            entry(simple_class("a/b/Stray"), InputRole::Shaded),
        );

        let report = minimize(&mut entries, &[]);

        assert!(entries.contains_key("a/b/Bad.class"));
        assert!(entries.contains_key("a/b/Dep.class"));
        assert!(!entries.contains_key("a/b/Stray.class"));
        assert_eq!(report.kept_unparsed, 1);
        assert_eq!(report.dropped, vec!["a/b/Stray.class".to_string()]);
    }

    #[test]
    fn extracts_object_and_array_class_names() {
        let mut refs = Vec::new();
        push_type_name("a/b/X", &mut refs);
        push_type_name("[[La/b/Y;", &mut refs);
        push_type_name("[I", &mut refs);
        assert_eq!(refs, vec!["a/b/X".to_string(), "a/b/Y".to_string()]);
    }

    #[test]
    fn extracts_descriptor_references() {
        let mut refs = Vec::new();
        descriptor_references("(La/b/X;I[La/b/Y;)La/b/Z;", &mut refs);
        assert_eq!(
            refs,
            vec!["a/b/X".to_string(), "a/b/Y".to_string(), "a/b/Z".to_string()]
        );
    }

    #[test]
    fn ignores_non_descriptor_text() {
        let mut refs = Vec::new();
        descriptor_references("Licence; see NOTICE", &mut refs);
        assert!(refs.is_empty() || refs.iter().all(|r| !r.contains(' ')));
    }
}
