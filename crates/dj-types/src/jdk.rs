//! Signatures of the JDK classes the interpreter implements natively.
//!
//! The table lives in `jdk.sigs`, one declaration per line, and is parsed once when a
//! [`JdkLoader`] is created.

use std::collections::{HashMap, HashSet};

use dj_core::{Modifiers, PrimitiveType};
use thiserror::Error;

use crate::class::{ClassDef, ClassKind, FieldDef, MethodDef, Origin, TypeParamDef};
use crate::library::ClassLoader;
use crate::ty::{names, package_of, simple_name, Type, WildcardBound};

const TABLE: &str = include_str!("jdk.sigs");

#[derive(Debug, Error)]
#[error("{message} at column {column}")]
struct SigError {
    message: String,
    column: usize,
}

/// Serves the built-in JDK classes.
#[derive(Debug, Clone)]
pub struct JdkLoader {
    classes: HashMap<String, ClassDef>,
    packages: HashSet<String>,
}

impl Default for JdkLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl JdkLoader {
    pub fn new() -> Self {
        let simple: HashMap<&str, &str> = TABLE
            .lines()
            .filter(|line| is_header(line))
            .filter_map(header_name)
            .map(|name| (simple_name(name), name))
            .collect();

        let mut classes = HashMap::new();
        let mut current: Option<ClassDef> = None;
        for (index, line) in TABLE.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let result = if is_header(line) {
                if let Some(done) = current.take() {
                    classes.insert(done.name.clone(), done);
                }
                parse_header(trimmed, &simple).map(|class| current = Some(class))
            } else {
                match current.as_mut() {
                    Some(class) => parse_member(class, trimmed, &simple),
                    None => Err(SigError {
                        message: "member outside of a class".into(),
                        column: 0,
                    }),
                }
            };
            if let Err(err) = result {
                tracing::error!(target: "dj.types", line = index + 1, %err, "invalid built-in signature");
            }
        }
        if let Some(done) = current.take() {
            classes.insert(done.name.clone(), done);
        }

        let packages = classes
            .keys()
            .map(|name| package_of(name).to_string())
            .collect();
        Self { classes, packages }
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }
}

impl ClassLoader for JdkLoader {
    fn load_class(&self, name: &str) -> Option<ClassDef> {
        self.classes.get(name).cloned()
    }

    fn has_package(&self, package: &str) -> bool {
        self.packages.contains(package)
    }
}

fn is_header(line: &str) -> bool {
    !line.starts_with(char::is_whitespace) && !line.trim().is_empty() && !line.starts_with('#')
}

fn header_name(line: &str) -> Option<&str> {
    let mut words = line.split_whitespace();
    words.find(|w| *w == "class" || *w == "interface")?;
    let name = words.next()?;
    Some(name.split('<').next().unwrap_or(name))
}

struct Scope<'a> {
    simple: &'a HashMap<&'a str, &'a str>,
    vars: Vec<TypeParamDef>,
}

impl Scope<'_> {
    fn resolve(&self, name: &str) -> Type {
        if let Some(tp) = self.vars.iter().rev().find(|tp| tp.name == name) {
            return tp.as_type_var();
        }
        if let Some(p) = PrimitiveType::from_keyword(name) {
            return Type::Primitive(p);
        }
        if name == "void" {
            return Type::Void;
        }
        let binary = match self.simple.get(name) {
            Some(binary) => (*binary).to_string(),
            None if name.contains('.') => name.to_string(),
            None => format!("java.lang.{name}"),
        };
        Type::class(binary, Vec::new())
    }
}

/// Cursor over one signature line.
struct Sig<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Sig<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.pos >= self.text.len()
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<(), SigError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{token}`")))
        }
    }

    fn error(&self, message: String) -> SigError {
        SigError {
            message,
            column: self.pos + 1,
        }
    }

    fn peek_word(&mut self) -> &'a str {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.' || c == '$'))
            .unwrap_or(rest.len());
        // `...` is punctuation, not part of a name.
        let word = &rest[..len];
        word.find("..").map_or(word, |i| &word[..i])
    }

    fn word(&mut self) -> Result<&'a str, SigError> {
        let word = self.peek_word();
        if word.is_empty() {
            return Err(self.error("expected a name".into()));
        }
        self.pos += word.len();
        Ok(word)
    }

    fn ty(&mut self, scope: &Scope<'_>) -> Result<Type, SigError> {
        if self.eat("?") {
            let bound = match self.peek_word() {
                "extends" => {
                    self.word()?;
                    WildcardBound::Extends(Box::new(self.ty(scope)?))
                }
                "super" => {
                    self.word()?;
                    WildcardBound::Super(Box::new(self.ty(scope)?))
                }
                _ => WildcardBound::Unbounded,
            };
            return Ok(Type::Wildcard(bound));
        }
        let mut ty = scope.resolve(self.word()?);
        if self.eat("<") {
            let mut args = vec![self.ty(scope)?];
            while self.eat(",") {
                args.push(self.ty(scope)?);
            }
            self.expect(">")?;
            if let Type::Class(class) = &mut ty {
                class.args = args;
            }
        }
        while self.eat("[") {
            self.expect("]")?;
            ty = Type::array(ty);
        }
        Ok(ty)
    }

    fn type_list(&mut self, scope: &Scope<'_>) -> Result<Vec<Type>, SigError> {
        let mut list = vec![self.ty(scope)?];
        while self.eat(",") {
            list.push(self.ty(scope)?);
        }
        Ok(list)
    }

    /// Parses `T, U extends Bound>` after the opening `<`, adding each name to `scope`.
    fn type_params(&mut self, scope: &mut Scope<'_>) -> Result<Vec<TypeParamDef>, SigError> {
        let mut params = Vec::new();
        loop {
            let name = self.word()?.to_string();
            scope.vars.push(TypeParamDef {
                name: name.clone(),
                bounds: Vec::new(),
            });
            let mut bounds = Vec::new();
            if self.peek_word() == "extends" {
                self.word()?;
                bounds.push(self.ty(scope)?);
                while self.eat("&") {
                    bounds.push(self.ty(scope)?);
                }
            }
            if let Some(last) = scope.vars.last_mut() {
                last.bounds = bounds.clone();
            }
            params.push(TypeParamDef { name, bounds });
            if !self.eat(",") {
                break;
            }
        }
        self.expect(">")?;
        Ok(params)
    }

    fn modifiers(&mut self) -> Modifiers {
        let mut modifiers = Modifiers::NONE;
        while let Some(m) = Modifiers::from_keyword(self.peek_word()) {
            self.pos += self.peek_word().len();
            modifiers.insert(m);
        }
        modifiers
    }
}

fn parse_header(line: &str, simple: &HashMap<&str, &str>) -> Result<ClassDef, SigError> {
    let mut sig = Sig::new(line);
    let mut modifiers = sig.modifiers().union(Modifiers::PUBLIC);
    let kind = match sig.word()? {
        "class" => ClassKind::Class,
        "interface" => {
            modifiers = modifiers.union(Modifiers::INTERFACE).union(Modifiers::ABSTRACT);
            ClassKind::Interface
        }
        other => return Err(sig.error(format!("unexpected `{other}`"))),
    };
    let mut class = ClassDef::new(sig.word()?, kind, Origin::Native);
    class.modifiers = modifiers;

    let mut scope = Scope {
        simple,
        vars: Vec::new(),
    };
    if sig.eat("<") {
        class.type_params = sig.type_params(&mut scope)?;
    }
    while !sig.at_end() {
        let clause = sig.word()?;
        let types = sig.type_list(&scope)?;
        match (clause, kind) {
            ("extends", ClassKind::Interface) | ("implements", ClassKind::Class) => {
                class.interfaces.extend(types)
            }
            ("extends", ClassKind::Class) => class.super_class = types.into_iter().next(),
            _ => return Err(sig.error(format!("unexpected `{clause}`"))),
        }
    }
    if kind == ClassKind::Class && class.super_class.is_none() && class.name != names::OBJECT {
        class.super_class = Some(Type::object());
    }
    Ok(class)
}

fn parse_member(
    class: &mut ClassDef,
    line: &str,
    simple: &HashMap<&str, &str>,
) -> Result<(), SigError> {
    let mut sig = Sig::new(line);
    let mut scope = Scope {
        simple,
        vars: class.type_params.clone(),
    };
    let mut modifiers = sig.modifiers();
    if !modifiers.is_protected() {
        modifiers.insert(Modifiers::PUBLIC);
    }
    let is_ctor = sig.eat("<init>");
    let type_params = if !is_ctor && sig.eat("<") {
        sig.type_params(&mut scope)?
    } else {
        Vec::new()
    };

    let (return_ty, name) = if is_ctor {
        (Type::Void, "<init>".to_string())
    } else {
        let ty = sig.ty(&scope)?;
        (ty, sig.word()?.to_string())
    };

    if !sig.eat("(") {
        if class.is_interface() {
            modifiers = modifiers.union(Modifiers::STATIC).union(Modifiers::FINAL);
        }
        class.fields.push(FieldDef {
            name,
            ty: return_ty,
            modifiers,
            decl: None,
        });
        return Ok(());
    }

    let mut params = Vec::new();
    if !sig.eat(")") {
        loop {
            let mut ty = sig.ty(&scope)?;
            if sig.eat("...") {
                ty = Type::array(ty);
                modifiers.insert(Modifiers::VARARGS);
            }
            params.push(ty);
            if !sig.eat(",") {
                break;
            }
        }
        sig.expect(")")?;
    }
    if class.is_interface()
        && !modifiers.is_static()
        && !modifiers.contains(Modifiers::DEFAULT)
    {
        modifiers.insert(Modifiers::ABSTRACT);
    }

    let method = MethodDef {
        name,
        type_params,
        params,
        return_ty,
        modifiers,
        decl: None,
    };
    if is_ctor {
        class.constructors.push(method);
    } else {
        class.methods.push(method);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn table_parses_without_errors() {
        let loader = JdkLoader::new();
        let string = loader.load_class(names::STRING).unwrap();
        assert!(string.modifiers.is_final());
        assert_eq!(string.super_class, Some(Type::object()));
        assert!(string
            .interfaces
            .contains(&Type::class(names::COMPARABLE, vec![Type::string()])));

        let format = string.methods_named("format").next().unwrap();
        assert!(format.is_var_args());
        assert!(format.modifiers.is_static());
        assert_eq!(
            format.params,
            vec![Type::string(), Type::array(Type::object())]
        );

        assert!(loader.has_package("java.util"));
        assert!(loader.class_names().count() > 40);
    }

    #[test]
    fn interface_members_are_abstract_unless_default() {
        let loader = JdkLoader::new();
        let iterator = loader.load_class(names::ITERATOR).unwrap();
        assert!(iterator.is_interface());
        assert_eq!(iterator.super_class, None);
        let next = iterator.methods_named("next").next().unwrap();
        assert!(next.modifiers.is_abstract());
        assert_eq!(next.return_ty, Type::type_var("E", Type::object()));
        let remove = iterator.methods_named("remove").next().unwrap();
        assert!(!remove.modifiers.is_abstract());
    }

    #[test]
    fn generic_supertypes_and_wildcards() {
        let loader = JdkLoader::new();
        let list = loader.load_class("java.util.ArrayList").unwrap();
        assert_eq!(
            list.interfaces[0],
            Type::class("java.util.List", vec![Type::type_var("E", Type::object())])
        );
        let ctor = &list.constructors[2];
        assert_eq!(
            ctor.params[0],
            Type::class(
                "java.util.Collection",
                vec![Type::Wildcard(WildcardBound::Extends(Box::new(
                    Type::type_var("E", Type::object())
                )))]
            )
        );

        let objects = loader.load_class("java.util.Objects").unwrap();
        let require = objects.methods_named("requireNonNull").next().unwrap();
        assert_eq!(require.type_params.len(), 1);
        assert_eq!(require.return_ty, Type::type_var("T", Type::object()));
    }

    #[test]
    fn fields_are_read_with_modifiers() {
        let loader = JdkLoader::new();
        let integer = loader.load_class("java.lang.Integer").unwrap();
        let max = integer.field("MAX_VALUE").unwrap();
        assert_eq!(max.ty, Type::INT);
        assert!(max.modifiers.is_static() && max.modifiers.is_final());
        let throwable = loader.load_class(names::THROWABLE).unwrap();
        assert_eq!(throwable.constructors.len(), 4);
    }
}
