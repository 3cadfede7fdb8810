use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::class::ClassDef;
use crate::jdk::JdkLoader;

/// A source of class descriptors.
pub trait Library {
    fn lookup_class(&self, name: &str) -> Option<Rc<ClassDef>>;

    fn type_exists(&self, name: &str) -> bool {
        self.lookup_class(name).is_some()
    }

    /// True for classes only; interfaces answer `false`.
    fn class_exists(&self, name: &str) -> bool {
        self.lookup_class(name).is_some_and(|c| !c.is_interface())
    }

    fn package_exists(&self, package: &str) -> bool;
}

/// Produces class descriptors on demand for [`ClassLibrary`].
pub trait ClassLoader {
    fn load_class(&self, name: &str) -> Option<ClassDef>;

    fn has_package(&self, package: &str) -> bool;
}

/// Loader-backed library that caches every descriptor it hands out.
pub struct ClassLibrary {
    loaders: Vec<Box<dyn ClassLoader>>,
    cache: RefCell<HashMap<String, Option<Rc<ClassDef>>>>,
}

impl ClassLibrary {
    pub fn new(loaders: Vec<Box<dyn ClassLoader>>) -> Self {
        Self {
            loaders,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// A library holding only the built-in JDK signatures.
    pub fn jdk() -> Self {
        Self::new(vec![Box::new(JdkLoader::new())])
    }

    pub fn push_loader(&mut self, loader: Box<dyn ClassLoader>) {
        self.loaders.push(loader);
        self.cache.borrow_mut().retain(|_, found| found.is_some());
    }
}

impl fmt::Debug for ClassLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassLibrary")
            .field("loaders", &self.loaders.len())
            .field("cached", &self.cache.borrow().len())
            .finish()
    }
}

impl Library for ClassLibrary {
    fn lookup_class(&self, name: &str) -> Option<Rc<ClassDef>> {
        if let Some(found) = self.cache.borrow().get(name) {
            return found.clone();
        }
        let loaded = self
            .loaders
            .iter()
            .find_map(|loader| loader.load_class(name))
            .map(Rc::new);
        if loaded.is_some() {
            tracing::trace!(target: "dj.types", class = name, "loaded class");
        }
        self.cache
            .borrow_mut()
            .insert(name.to_string(), loaded.clone());
        loaded
    }

    fn package_exists(&self, package: &str) -> bool {
        self.loaders.iter().any(|l| l.has_package(package))
    }
}

/// Ordered list of libraries; the first one that knows a name wins.
#[derive(Clone, Default)]
pub struct LibraryContext {
    libraries: Vec<Rc<dyn Library>>,
}

impl LibraryContext {
    pub fn new(libraries: Vec<Rc<dyn Library>>) -> Self {
        Self { libraries }
    }

    pub fn push(&mut self, library: Rc<dyn Library>) {
        self.libraries.push(library);
    }

    /// Inserts a library ahead of the existing ones so its classes shadow theirs.
    pub fn push_front(&mut self, library: Rc<dyn Library>) {
        self.libraries.insert(0, library);
    }
}

impl fmt::Debug for LibraryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryContext")
            .field("libraries", &self.libraries.len())
            .finish()
    }
}

impl Library for LibraryContext {
    fn lookup_class(&self, name: &str) -> Option<Rc<ClassDef>> {
        self.libraries.iter().find_map(|l| l.lookup_class(name))
    }

    fn package_exists(&self, package: &str) -> bool {
        self.libraries.iter().any(|l| l.package_exists(package))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassKind, Origin};

    struct Fixed(Vec<ClassDef>);

    impl ClassLoader for Fixed {
        fn load_class(&self, name: &str) -> Option<ClassDef> {
            self.0.iter().find(|c| c.name == name).cloned()
        }

        fn has_package(&self, package: &str) -> bool {
            self.0.iter().any(|c| c.package() == package)
        }
    }

    #[test]
    fn first_library_shadows_later_ones() {
        let shadow = ClassLibrary::new(vec![Box::new(Fixed(vec![ClassDef::new(
            "java.lang.String",
            ClassKind::Interface,
            Origin::Tree,
        )]))]);
        let ctx = LibraryContext::new(vec![Rc::new(shadow), Rc::new(ClassLibrary::jdk())]);
        let string = ctx.lookup_class("java.lang.String").unwrap();
        assert_eq!(string.origin, Origin::Tree);
        assert!(ctx.type_exists("java.lang.String"));
        assert!(!ctx.class_exists("java.lang.String"));
        assert!(ctx.class_exists("java.lang.Object"));
        assert!(ctx.package_exists("java.util"));
        assert!(!ctx.package_exists("com.example"));
    }

    #[test]
    fn class_library_caches_descriptors() {
        let lib = ClassLibrary::jdk();
        let a = lib.lookup_class("java.lang.Object").unwrap();
        let b = lib.lookup_class("java.lang.Object").unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert!(lib.lookup_class("java.lang.Nope").is_none());
    }
}
