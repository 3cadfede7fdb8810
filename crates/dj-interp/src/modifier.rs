//! Assignable locations.
//!
//! The target of an assignment or increment is turned into a [`Modifier`] before the
//! right-hand side runs. [`Evaluator::prepare`] reads the current value (needed by compound
//! operators) and [`Evaluator::modify`] checks the new value against the location and stores
//! it. Array targets keep their array and index on the evaluator's pending-write stack, so a
//! nested array assignment inside the right-hand side cannot disturb them.

use dj_check::{ErrorKind, Resolution};
use dj_syntax::ast::{Expr, ExprKind};
use dj_types::{FieldRef, Type};

use crate::error::{Flow, Interrupt};
use crate::eval::{Evaluator, Site};
use crate::value::{NativeState, ObjectRef, Value};

#[derive(Debug)]
pub(crate) enum Modifier {
    Variable { name: String },
    /// A `final` local; it accepts a single assignment while it has no value.
    FinalVariable { name: String },
    /// The element on top of the pending-write stack.
    Array,
    StaticField { field: FieldRef },
    InstanceField { object: ObjectRef, field: FieldRef },
}

/// Array and index of an array element assignment in progress.
#[derive(Debug)]
pub(crate) struct PendingWrite {
    pub array: Value,
    pub index: Value,
}

impl Evaluator<'_> {
    /// Evaluates the sub-expressions of an assignment target, left to right.
    pub(crate) fn modifier_for(&mut self, target: &Expr) -> Flow<Modifier> {
        let site = Site::of(target);
        let table = self.table;
        match (&target.kind, table.resolution(target.id)) {
            (ExprKind::Name(_), Some(Resolution::Local(name))) => {
                let is_final = self
                    .rt
                    .context
                    .binding(name)
                    .is_some_and(|binding| binding.is_final);
                let name = name.clone();
                Ok(if is_final {
                    Modifier::FinalVariable { name }
                } else {
                    Modifier::Variable { name }
                })
            }
            (ExprKind::Name(_), Some(Resolution::Field(field))) => {
                let field = field.clone();
                if field.is_static() {
                    Ok(Modifier::StaticField { field })
                } else {
                    let object = self.this_object(site)?;
                    Ok(Modifier::InstanceField { object, field })
                }
            }
            (ExprKind::FieldAccess { receiver, .. }, Some(Resolution::Field(field))) => {
                let field = field.clone();
                if field.is_static() {
                    if self.is_value_expr(receiver) {
                        self.eval_expr(receiver)?;
                    }
                    return Ok(Modifier::StaticField { field });
                }
                let object = match self.eval_receiver(receiver)? {
                    Value::Ref(object) => object,
                    _ => {
                        let message = format!("Cannot assign field \"{}\"", field.name);
                        return Err(self.null_pointer(message));
                    }
                };
                Ok(Modifier::InstanceField { object, field })
            }
            (ExprKind::ArrayAccess { array, index }, _) => {
                let array = self.eval_expr(array)?;
                let index = self.eval_expr(index)?;
                let index = self.unbox(&index);
                self.rt.pending.push(PendingWrite { array, index });
                Ok(Modifier::Array)
            }
            _ => Err(self.fail(ErrorKind::VariableExpected, "not an assignable location", site)),
        }
    }

    /// Current value of the location.
    pub(crate) fn prepare(&mut self, modifier: &Modifier, target: &Expr) -> Flow<Value> {
        let site = Site::of(target);
        match modifier {
            Modifier::Variable { name } | Modifier::FinalVariable { name } => {
                match self.rt.context.get(name) {
                    Some(value) => Ok(value.clone()),
                    None => Err(self.fail(
                        ErrorKind::UndefinedName,
                        format!("variable {name} might not have been initialized"),
                        site,
                    )),
                }
            }
            Modifier::Array => {
                let Some(write) = self.rt.pending.last() else {
                    return Err(self.fail(ErrorKind::VariableExpected, "no pending array write", site));
                };
                let (array, index) = (write.array.clone(), write.index.clone());
                self.array_load(&array, &index)
            }
            Modifier::StaticField { field } => {
                let field = field.clone();
                self.static_get(&field, site)
            }
            Modifier::InstanceField { object, field } => Ok(self.instance_get(object, field)),
        }
    }

    /// Stores `value`, which already has the location's static type.
    pub(crate) fn modify(&mut self, modifier: Modifier, value: Value, target: &Expr) -> Flow<()> {
        let site = Site::of(target);
        match modifier {
            Modifier::Variable { name } => self.store_variable(&name, value, site),
            Modifier::FinalVariable { name } => {
                let assigned = self
                    .rt
                    .context
                    .binding(&name)
                    .is_some_and(|binding| binding.value.is_some());
                if assigned {
                    return Err(self.fail(
                        ErrorKind::CannotModify,
                        format!("cannot assign a value to final variable {name}"),
                        site,
                    ));
                }
                self.store_variable(&name, value, site)
            }
            Modifier::Array => {
                let Some(write) = self.rt.pending.pop() else {
                    return Err(self.fail(ErrorKind::VariableExpected, "no pending array write", site));
                };
                self.array_store(&write.array, &write.index, value)
            }
            Modifier::StaticField { field } => self.static_set(&field, value, site),
            Modifier::InstanceField { object, field } => {
                object.set_field(&field.owner, &field.name, value);
                Ok(())
            }
        }
    }

    fn store_variable(&mut self, name: &str, value: Value, site: Site) -> Flow<()> {
        let declared = self.rt.context.binding(name).map(|binding| binding.ty.clone());
        let Some(declared) = declared else {
            return Err(self.fail(
                ErrorKind::UndefinedName,
                format!("cannot find symbol: variable {name}"),
                site,
            ));
        };
        if declared.is_reference() && !value.is_null() && !self.instance_of(&value, &declared) {
            return Err(self.fail(
                ErrorKind::AssignmentTypes,
                format!(
                    "incompatible types: {} cannot be converted to {declared}",
                    value.runtime_type()
                ),
                site,
            ));
        }
        self.rt.context.set(name, value);
        Ok(())
    }

    pub(crate) fn array_load(&mut self, array: &Value, index: &Value) -> Flow<Value> {
        let Value::Ref(obj) = array else {
            return Err(self.null_pointer("Cannot load from array because it is null"));
        };
        let index = index.as_int().unwrap_or(-1);
        let found = match &*obj.state() {
            NativeState::Array { items, .. } => usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i).cloned())
                .ok_or(items.len()),
            _ => Err(0),
        };
        found.map_err(|len| self.out_of_bounds(index, len))
    }

    pub(crate) fn array_store(&mut self, array: &Value, index: &Value, value: Value) -> Flow<()> {
        let Value::Ref(obj) = array else {
            return Err(self.null_pointer("Cannot store to array because it is null"));
        };
        let index = index.as_int().unwrap_or(-1);
        let (len, elem) = match &*obj.state() {
            NativeState::Array { items, elem } => (items.len(), elem.clone()),
            _ => (0, Type::Unknown),
        };
        let Some(slot) = usize::try_from(index).ok().filter(|i| *i < len) else {
            return Err(self.out_of_bounds(index, len));
        };
        if elem.is_reference() && !value.is_null() && !self.instance_of(&value, &elem) {
            let class = value.as_object().map_or_else(String::new, |o| o.class_name().to_string());
            return Err(self.throw_new("java.lang.ArrayStoreException", Some(class)));
        }
        if let NativeState::Array { items, .. } = &mut *obj.state_mut() {
            items[slot] = value;
        }
        Ok(())
    }

    fn out_of_bounds(&mut self, index: i32, len: usize) -> Interrupt {
        self.throw_new(
            "java.lang.ArrayIndexOutOfBoundsException",
            Some(format!("Index {index} out of bounds for length {len}")),
        )
    }
}
