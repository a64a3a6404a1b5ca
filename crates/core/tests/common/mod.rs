use ristretto_classfile::{ClassAccessFlags, ClassFile, ConstantPool};
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::ZipArchive;

/// Authors a minimal classfile named `name` whose constant pool references
/// each of `refs` as a class constant.
pub fn class_bytes(name: &str, refs: &[&str]) -> Vec<u8> {
    let mut pool = ConstantPool::default();
    let this_class = pool.add_class(name).unwrap();
    let super_class = pool.add_class("java/lang/Object").unwrap();
    for referenced in refs {
        pool.add_class(referenced).unwrap();
    }
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

pub fn write_test_jar(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, bytes) in entries {
        if name.ends_with('/') {
            zip.add_directory(name.trim_end_matches('/'), options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
    }
    zip.finish().unwrap();
}

pub fn jar_names(path: &Path) -> Vec<String> {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    names
}

pub fn jar_entry(path: &Path, name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).unwrap();
    bytes
}

pub fn parse_class(bytes: &[u8]) -> ClassFile {
    ClassFile::from_bytes(&mut Cursor::new(bytes.to_vec())).unwrap()
}
