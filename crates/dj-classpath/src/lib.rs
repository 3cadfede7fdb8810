//! Class-file reader and classpath index.
//!
//! The index reads class directories and jar archives up front and hands out
//! [`ClassDef`] descriptors on demand through the [`ClassLoader`] trait. Generic signatures
//! are not read, so classpath classes are seen with erased types.

#![forbid(unsafe_code)]

mod classfile;
mod constant_pool;
mod descriptor;
mod error;
mod reader;

use std::collections::{BTreeSet, HashMap};
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};

use dj_core::Modifiers;
use dj_types::{ClassDef, ClassKind, ClassLoader, FieldDef, MethodDef, Origin, Type};

pub use crate::classfile::{ClassFile, ClassMember};
pub use crate::descriptor::{internal_to_binary, parse_field_descriptor, parse_method_descriptor};
pub use crate::error::{ClassFileError, ClasspathError};

const ACC_SYNTHETIC: u16 = 0x1000;
const ACC_BRIDGE: u16 = 0x0040;
const ACC_INTERFACE: u16 = 0x0200;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClasspathEntry {
    ClassDir(PathBuf),
    Jar(PathBuf),
}

impl ClasspathEntry {
    /// Classifies a path by extension: `.jar` and `.zip` are archives, anything else a
    /// class directory.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match path.extension().and_then(OsStr::to_str) {
            Some(ext) if ext.eq_ignore_ascii_case("jar") || ext.eq_ignore_ascii_case("zip") => {
                ClasspathEntry::Jar(path)
            }
            _ => ClasspathEntry::ClassDir(path),
        }
    }

    /// Splits a platform classpath string (`a.jar:classes`) into entries.
    pub fn parse_list(classpath: &str) -> Vec<Self> {
        std::env::split_paths(classpath)
            .filter(|p| !p.as_os_str().is_empty())
            .map(Self::from_path)
            .collect()
    }

    pub fn path(&self) -> &Path {
        match self {
            ClasspathEntry::ClassDir(p) | ClasspathEntry::Jar(p) => p,
        }
    }
}

/// Everything the loader keeps about one class file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassStub {
    pub binary_name: String,
    pub access_flags: u16,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<ClassMember>,
    pub methods: Vec<ClassMember>,
}

impl ClassStub {
    fn from_classfile(cf: ClassFile) -> Self {
        Self {
            binary_name: internal_to_binary(&cf.this_class),
            access_flags: cf.access_flags,
            super_class: cf.super_class.map(|s| internal_to_binary(&s)),
            interfaces: cf
                .interfaces
                .iter()
                .map(|i| internal_to_binary(i))
                .collect(),
            fields: cf.fields,
            methods: cf.methods,
        }
    }

    /// Converts the stub into a checker descriptor. Members with malformed descriptors are
    /// dropped.
    pub fn to_class_def(&self) -> ClassDef {
        let kind = if self.access_flags & ACC_INTERFACE != 0 {
            ClassKind::Interface
        } else {
            ClassKind::Class
        };
        let mut def = ClassDef::new(self.binary_name.clone(), kind, Origin::Classpath);
        def.modifiers = Modifiers(self.access_flags);
        def.super_class = self
            .super_class
            .as_ref()
            .filter(|_| kind == ClassKind::Class)
            .map(|s| Type::class(s.clone(), Vec::new()));
        def.interfaces = self
            .interfaces
            .iter()
            .map(|i| Type::class(i.clone(), Vec::new()))
            .collect();
        def.outer = self
            .binary_name
            .rsplit_once('$')
            .map(|(outer, _)| outer.to_string());

        for field in &self.fields {
            if field.access_flags & ACC_SYNTHETIC != 0 {
                continue;
            }
            match parse_field_descriptor(&field.descriptor) {
                Ok(ty) => def.fields.push(FieldDef {
                    name: field.name.clone(),
                    ty,
                    modifiers: Modifiers(field.access_flags),
                    decl: None,
                }),
                Err(err) => {
                    tracing::debug!(target: "dj.classpath", class = %self.binary_name, field = %field.name, %err, "skipping field");
                }
            }
        }

        for method in &self.methods {
            if method.access_flags & (ACC_SYNTHETIC | ACC_BRIDGE) != 0 || method.name == "<clinit>" {
                continue;
            }
            let (params, return_ty) = match parse_method_descriptor(&method.descriptor) {
                Ok(parsed) => parsed,
                Err(err) => {
                    tracing::debug!(target: "dj.classpath", class = %self.binary_name, method = %method.name, %err, "skipping method");
                    continue;
                }
            };
            let method_def = MethodDef {
                name: method.name.clone(),
                type_params: Vec::new(),
                params,
                return_ty,
                modifiers: Modifiers(method.access_flags),
                decl: None,
            };
            if method.name == "<init>" {
                def.constructors.push(method_def);
            } else {
                def.methods.push(method_def);
            }
        }
        def
    }
}

#[derive(Clone, Debug, Default)]
pub struct ClasspathIndex {
    stubs: HashMap<String, ClassStub>,
    packages: BTreeSet<String>,
}

impl ClasspathIndex {
    /// Reads every entry. Earlier entries win when two define the same class.
    pub fn build(entries: &[ClasspathEntry]) -> Result<Self, ClasspathError> {
        let mut stubs = HashMap::new();
        for entry in entries {
            let found = match entry {
                ClasspathEntry::ClassDir(dir) => index_class_dir(dir)?,
                ClasspathEntry::Jar(path) => index_jar(path)?,
            };
            tracing::debug!(target: "dj.classpath", entry = %entry.path().display(), classes = found.len(), "indexed classpath entry");
            for stub in found {
                stubs.entry(stub.binary_name.clone()).or_insert(stub);
            }
        }
        let packages = stubs
            .keys()
            .filter_map(|name| name.rsplit_once('.').map(|(pkg, _)| pkg.to_string()))
            .collect();
        Ok(Self { stubs, packages })
    }

    pub fn len(&self) -> usize {
        self.stubs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }

    pub fn lookup_binary(&self, binary_name: &str) -> Option<&ClassStub> {
        self.stubs.get(binary_name)
    }

    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.packages.iter().map(String::as_str)
    }
}

impl ClassLoader for ClasspathIndex {
    fn load_class(&self, name: &str) -> Option<ClassDef> {
        self.stubs.get(name).map(ClassStub::to_class_def)
    }

    fn has_package(&self, package: &str) -> bool {
        self.packages.contains(package)
    }
}

fn is_ignored_class(internal_name: &str) -> bool {
    internal_name == "module-info"
        || internal_name == "package-info"
        || internal_name.ends_with("/package-info")
}

fn parse_class(bytes: &[u8], origin: &Path) -> Result<Option<ClassStub>, ClasspathError> {
    let cf = ClassFile::parse(bytes).map_err(|source| ClasspathError::ClassFile {
        path: origin.display().to_string(),
        source,
    })?;
    if is_ignored_class(&cf.this_class) {
        return Ok(None);
    }
    Ok(Some(ClassStub::from_classfile(cf)))
}

fn index_class_dir(dir: &Path) -> Result<Vec<ClassStub>, ClasspathError> {
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() || entry.path().extension() != Some(OsStr::new("class"))
        {
            continue;
        }
        let bytes = std::fs::read(entry.path())?;
        out.extend(parse_class(&bytes, entry.path())?);
    }
    Ok(out)
}

fn index_jar(path: &Path) -> Result<Vec<ClassStub>, ClasspathError> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut out = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if !file.is_file() {
            continue;
        }
        let name = file.name().to_owned();
        // Versioned entries of multi-release jars are ignored; base classes are enough.
        if !name.ends_with(".class") || name.starts_with("META-INF/") {
            continue;
        }
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)?;
        out.extend(parse_class(&bytes, &path.join(&name))?);
    }
    Ok(out)
}
