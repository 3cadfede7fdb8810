use std::rc::Rc;

use dj_core::Options;
use dj_syntax::ast::CompilationUnit;
use dj_types::LibraryContext;

use crate::checker::Checker;
use crate::context::Imports;
use crate::error::CompositeError;

/// Checks a batch of compilation units as one program.
///
/// Phase 0 registers every class header of every unit, so a class may mention one declared
/// later in the batch or in another unit. Signatures and bodies are checked afterwards; all
/// errors of the batch are reported together.
#[derive(Debug)]
pub struct CompilationUnitChecker {
    checker: Checker,
}

impl CompilationUnitChecker {
    pub fn new(base: LibraryContext, options: Options) -> Self {
        Self {
            checker: Checker::new(base, options),
        }
    }

    pub fn check(&mut self, units: &[CompilationUnit]) -> Result<(), CompositeError> {
        let root = self.checker.root_context();
        let mut pending = Vec::new();
        let mut declared = Default::default();
        for unit in units {
            let package = unit.package.as_ref().map_or("", |p| p.name.as_str());
            let unit_ctx = root
                .set_package(package)
                .with_imports(Imports::from_decls(&unit.imports));
            for decl in &unit.types {
                self.checker
                    .declare_header(&unit_ctx, &Rc::new(decl.clone()), None, &mut declared, &mut pending);
            }
        }
        let count = pending.len();
        let accepted = self.checker.check_pending(pending);
        tracing::info!(target: "dj.check", classes = count, accepted = accepted.len(), "checked compilation units");
        let errors = self.checker.take_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CompositeError::new(errors))
        }
    }

    pub fn checker(&self) -> &Checker {
        &self.checker
    }

    pub fn into_checker(self) -> Checker {
        self.checker
    }
}
