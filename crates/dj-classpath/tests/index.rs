use std::io::Write;
use std::rc::Rc;

use dj_classpath::{ClassFile, ClasspathEntry, ClasspathIndex};
use dj_types::members::resolve_method;
use dj_types::{ClassLibrary, ClassLoader, Library, Origin, Type};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// Assembles a small class file by hand:
///
/// ```java
/// package demo;
/// public class Point {
///     public int x;
///     public Point(int x) {}
///     public double distance(Point other) {}
///     static {}
///     static synthetic void access$000() {}
/// }
/// ```
fn point_class() -> Vec<u8> {
    let mut pool: Vec<Vec<u8>> = Vec::new();
    let utf8 = |s: &str| {
        let mut e = vec![1u8];
        e.extend((s.len() as u16).to_be_bytes());
        e.extend(s.as_bytes());
        e
    };
    let class = |index: u16| {
        let mut e = vec![7u8];
        e.extend(index.to_be_bytes());
        e
    };
    pool.push(utf8("demo/Point")); // 1
    pool.push(class(1)); // 2
    pool.push(utf8("java/lang/Object")); // 3
    pool.push(class(3)); // 4
    pool.push(utf8("x")); // 5
    pool.push(utf8("I")); // 6
    pool.push(utf8("<init>")); // 7
    pool.push(utf8("(I)V")); // 8
    pool.push(utf8("distance")); // 9
    pool.push(utf8("(Ldemo/Point;)D")); // 10
    pool.push(utf8("<clinit>")); // 11
    pool.push(utf8("()V")); // 12
    pool.push(utf8("Code")); // 13
    let mut long = vec![5u8];
    long.extend(42u64.to_be_bytes());
    pool.push(long); // 14 and 15
    pool.push(utf8("access$000")); // 16

    let mut out = Vec::new();
    out.extend(0xCAFE_BABEu32.to_be_bytes());
    out.extend(0u16.to_be_bytes());
    out.extend(52u16.to_be_bytes());
    out.extend(17u16.to_be_bytes());
    for entry in &pool {
        out.extend(entry);
    }
    let u2 = |out: &mut Vec<u8>, v: u16| out.extend(v.to_be_bytes());

    u2(&mut out, 0x0021); // public super
    u2(&mut out, 2);
    u2(&mut out, 4);
    u2(&mut out, 0); // interfaces

    u2(&mut out, 1); // fields
    for v in [0x0001, 5, 6, 0] {
        u2(&mut out, v);
    }

    u2(&mut out, 4); // methods
    for (flags, name, desc) in [(0x0001, 7, 8), (0x0001, 9, 10), (0x0008, 11, 12)] {
        for v in [flags, name, desc, 0] {
            u2(&mut out, v);
        }
    }
    for v in [0x1008, 16, 12, 1, 13] {
        u2(&mut out, v);
    }
    out.extend(2u32.to_be_bytes());
    out.extend([0u8, 0u8]);

    u2(&mut out, 0); // class attributes
    out
}

#[test]
fn parses_header_and_members() {
    let cf = ClassFile::parse(&point_class()).unwrap();
    assert_eq!(cf.this_class, "demo/Point");
    assert_eq!(cf.super_class.as_deref(), Some("java/lang/Object"));
    assert_eq!(cf.fields.len(), 1);
    assert_eq!(cf.methods.len(), 4);
    assert_eq!(cf.methods[1].descriptor, "(Ldemo/Point;)D");
}

#[test]
fn rejects_bad_magic_and_truncation() {
    let mut bytes = point_class();
    bytes[0] = 0;
    assert!(ClassFile::parse(&bytes).is_err());
    let bytes = point_class();
    assert!(ClassFile::parse(&bytes[..bytes.len() - 3]).is_err());
}

#[test]
fn class_dir_entries_become_class_defs() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("classes/demo");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("Point.class"), point_class()).unwrap();
    std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

    let index = ClasspathIndex::build(&[ClasspathEntry::ClassDir(tmp.path().join("classes"))])
        .unwrap();
    assert_eq!(index.len(), 1);
    assert!(index.has_package("demo"));

    let def = index.load_class("demo.Point").unwrap();
    assert_eq!(def.origin, Origin::Classpath);
    assert_eq!(def.super_class, Some(Type::object()));
    assert_eq!(def.field("x").unwrap().ty, Type::INT);
    assert_eq!(def.constructors.len(), 1);
    // `<clinit>` and synthetic accessors are not members.
    let names: Vec<&str> = def.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["distance"]);
}

#[test]
fn jar_entries_are_indexed_and_resolvable() {
    let tmp = TempDir::new().unwrap();
    let jar_path = tmp.path().join("dep.jar");
    {
        let file = std::fs::File::create(&jar_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();
        zip.start_file("META-INF/MANIFEST.MF", options).unwrap();
        zip.write_all(b"Manifest-Version: 1.0\n").unwrap();
        zip.start_file("demo/Point.class", options).unwrap();
        zip.write_all(&point_class()).unwrap();
        zip.finish().unwrap();
    }

    let entries = ClasspathEntry::parse_list(jar_path.to_str().unwrap());
    assert_eq!(entries, vec![ClasspathEntry::Jar(jar_path.clone())]);
    let index = ClasspathIndex::build(&entries).unwrap();

    let mut library = ClassLibrary::jdk();
    library.push_loader(Box::new(index));
    let library: Rc<dyn Library> = Rc::new(library);
    assert!(library.class_exists("demo.Point"));

    let point = Type::class("demo.Point", Vec::new());
    let m = resolve_method(library.as_ref(), &point, "distance", &[point.clone()], true).unwrap();
    assert_eq!(m.return_ty, Type::DOUBLE);
    assert_eq!(m.origin, Origin::Classpath);
}
