use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use dj_syntax::ast::TypeDecl;
use dj_types::{package_of, ClassDef, Library};

/// Classes declared in source (files or interactive entries).
///
/// Descriptors are registered with only a header first and replaced once their signatures
/// are complete, so classes of one batch can refer to each other in any order.
#[derive(Default)]
pub struct TreeLibrary {
    classes: RefCell<HashMap<String, Rc<ClassDef>>>,
    decls: RefCell<HashMap<String, Rc<TypeDecl>>>,
    packages: RefCell<BTreeSet<String>>,
}

impl TreeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the descriptor for `def.name`.
    pub fn define(&self, def: ClassDef, decl: Option<Rc<TypeDecl>>) {
        let name = def.name.clone();
        let package = package_of(&name).to_string();
        tracing::trace!(target: "dj.check", class = %name, "define tree class");
        if let Some(decl) = decl {
            self.decls.borrow_mut().insert(name.clone(), decl);
        }
        self.classes.borrow_mut().insert(name, Rc::new(def));
        self.packages.borrow_mut().insert(package);
    }

    /// Replaces the descriptor of an already defined class, keeping its declaration.
    pub fn update(&self, def: ClassDef) {
        self.classes.borrow_mut().insert(def.name.clone(), Rc::new(def));
    }

    pub fn remove(&self, name: &str) {
        self.classes.borrow_mut().remove(name);
        self.decls.borrow_mut().remove(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.borrow().contains_key(name)
    }

    pub fn decl(&self, name: &str) -> Option<Rc<TypeDecl>> {
        self.decls.borrow().get(name).cloned()
    }

    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Library for TreeLibrary {
    fn lookup_class(&self, name: &str) -> Option<Rc<ClassDef>> {
        self.classes.borrow().get(name).cloned()
    }

    fn package_exists(&self, package: &str) -> bool {
        self.packages
            .borrow()
            .iter()
            .any(|p| p == package || p.starts_with(&format!("{package}.")))
    }
}

impl fmt::Debug for TreeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeLibrary")
            .field("classes", &self.class_names())
            .finish()
    }
}
