use dj_check::{ErrorKind, Resolution};
use dj_syntax::ast::{BinaryOp, Expr, ExprKind, Literal, UnaryOp};
use dj_types::{simple_name, FieldRef, Type};

use crate::error::Flow;
use crate::eval::{Evaluator, Site};
use crate::format::{format_double, format_float};
use crate::ops::{self, convert_primitive, primitive_eq, OpError};
use crate::value::{char_from_unit, Value};

impl Evaluator<'_> {
    pub(crate) fn eval_expr(&mut self, expr: &Expr) -> Flow<Value> {
        let site = Site::of(expr);
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(self.literal(lit)),
            ExprKind::Name(name) => self.eval_name(expr, name),
            ExprKind::FieldAccess { receiver, name, .. } => self.eval_field_access(expr, receiver, name),
            ExprKind::ArrayAccess { array, index } => {
                let array = self.eval_expr(array)?;
                let index = self.eval_expr(index)?;
                let index = self.unbox(&index);
                self.array_load(&array, &index)
            }
            ExprKind::MethodCall { receiver, args, .. } => self.eval_call(expr, receiver.as_deref(), args),
            ExprKind::This | ExprKind::Super => Ok(Value::Ref(self.this_object(site)?)),
            ExprKind::New { args, .. } => self.eval_new(expr, args),
            ExprKind::NewArray { dims, init, .. } => {
                let ty = self.static_type(expr.id);
                match init {
                    Some(init) => self.eval_initializer(init, &ty),
                    None => self.eval_new_array(&ty, dims),
                }
            }
            ExprKind::ArrayInit(_) => {
                let ty = self.static_type(expr.id);
                self.eval_initializer(expr, &ty)
            }
            ExprKind::Unary { op, operand } => self.eval_unary(expr, *op, operand),
            ExprKind::Binary { op, lhs, rhs } => self.eval_binary(expr, *op, lhs, rhs),
            ExprKind::Assign { op, target, value } => {
                let mark = self.rt.pending.len();
                let result = self.eval_assign(expr, *op, target, value);
                if result.is_err() {
                    self.rt.pending.truncate(mark);
                }
                result
            }
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                let branch = if self.eval_bool(cond)? { then_expr } else { else_expr };
                let value = self.eval_expr(branch)?;
                let ty = self.static_type(expr.id);
                Ok(self.coerce(value, &ty))
            }
            ExprKind::Cast { expr: inner, .. } => {
                let value = self.eval_expr(inner)?;
                let ty = self.static_type(expr.id);
                self.cast(value, &ty, site)
            }
            ExprKind::InstanceOf { expr: inner, .. } => {
                let value = self.eval_expr(inner)?;
                let ty = match self.table.resolution(expr.id) {
                    Some(Resolution::Type(ty)) => ty.clone(),
                    _ => Type::Unknown,
                };
                Ok(Value::Boolean(self.instance_of(&value, &ty)))
            }
        }
    }

    /// Evaluates an initializer of a variable, field or array element of type `ty`; a bare
    /// `{..}` builds an array of that type.
    pub(crate) fn eval_initializer(&mut self, expr: &Expr, ty: &Type) -> Flow<Value> {
        if let ExprKind::ArrayInit(elems) = &expr.kind {
            let elem = ty.element_type().cloned().unwrap_or_else(Type::object);
            let mut items = Vec::with_capacity(elems.len());
            for item in elems {
                items.push(self.eval_initializer(item, &elem)?);
            }
            return Ok(self.new_array(elem.erasure(), items));
        }
        let value = self.eval_expr(expr)?;
        Ok(self.coerce(value, ty))
    }

    pub(crate) fn eval_bool(&mut self, expr: &Expr) -> Flow<bool> {
        let value = self.eval_expr(expr)?;
        match self.unbox(&value) {
            Value::Boolean(b) => Ok(b),
            Value::Null => Err(self.null_pointer("Cannot unbox a null Boolean")),
            other => Err(self.fail(
                ErrorKind::ConditionType,
                format!("{} cannot be converted to boolean", other.runtime_type()),
                Site::of(expr),
            )),
        }
    }

    /// Whether evaluating `expr` yields a value rather than naming a type or package.
    pub(crate) fn is_value_expr(&self, expr: &Expr) -> bool {
        match expr.kind {
            ExprKind::Name(_) | ExprKind::FieldAccess { .. } => !matches!(
                self.table.resolution(expr.id),
                Some(Resolution::Type(_) | Resolution::Package(_))
            ),
            _ => true,
        }
    }

    /// A member access receiver; `super` denotes the current object.
    pub(crate) fn eval_receiver(&mut self, receiver: &Expr) -> Flow<Value> {
        match receiver.kind {
            ExprKind::This | ExprKind::Super => Ok(Value::Ref(self.this_object(Site::of(receiver))?)),
            _ => self.eval_expr(receiver),
        }
    }

    fn literal(&mut self, lit: &Literal) -> Value {
        match lit {
            Literal::Int(v) => Value::Int(*v),
            Literal::Long(v) => Value::Long(*v),
            Literal::Float(v) => Value::Float(*v),
            Literal::Double(v) => Value::Double(*v),
            Literal::Char(v) => Value::Char(*v),
            Literal::String(s) => self.intern(s),
            Literal::Boolean(b) => Value::Boolean(*b),
            Literal::Null => Value::Null,
        }
    }

    fn eval_name(&mut self, expr: &Expr, name: &str) -> Flow<Value> {
        let site = Site::of(expr);
        let table = self.table;
        match table.resolution(expr.id) {
            Some(Resolution::Local(local)) => match self.rt.context.get(local) {
                Some(value) => Ok(value.clone()),
                None => Err(self.fail(
                    ErrorKind::UndefinedName,
                    format!("variable {name} might not have been initialized"),
                    site,
                )),
            },
            Some(Resolution::Field(field)) => {
                if field.is_static() {
                    return self.static_get(field, site);
                }
                let this = self.this_object(site)?;
                Ok(self.instance_get(&this, field))
            }
            _ => Err(self.fail(ErrorKind::UndefinedName, format!("{name} is not a value"), site)),
        }
    }

    fn eval_field_access(&mut self, expr: &Expr, receiver: &Expr, name: &str) -> Flow<Value> {
        let site = Site::of(expr);
        let table = self.table;
        match table.resolution(expr.id) {
            Some(Resolution::Field(field)) => self.read_field(field, receiver, site),
            Some(Resolution::ArrayLength) => match self.eval_expr(receiver)? {
                Value::Ref(obj) => Ok(Value::Int(obj.array_len().map_or(0, |n| n as i32))),
                _ => Err(self.null_pointer("Cannot read the array length because it is null")),
            },
            _ => Err(self.fail(ErrorKind::UndefinedName, format!("{name} is not a value"), site)),
        }
    }

    fn read_field(&mut self, field: &FieldRef, receiver: &Expr, site: Site) -> Flow<Value> {
        if field.is_static() {
            if self.is_value_expr(receiver) {
                self.eval_expr(receiver)?;
            }
            return self.static_get(field, site);
        }
        match self.eval_receiver(receiver)? {
            Value::Ref(obj) => Ok(self.instance_get(&obj, field)),
            _ => Err(self.null_pointer(format!(
                "Cannot read field \"{}\" of {}",
                field.name,
                simple_name(&field.owner)
            ))),
        }
    }

    fn eval_new_array(&mut self, ty: &Type, dims: &[Expr]) -> Flow<Value> {
        let mut lengths = Vec::with_capacity(dims.len());
        for dim in dims {
            let value = self.eval_expr(dim)?;
            let len = self.unbox(&value).as_int().unwrap_or(0);
            match usize::try_from(len) {
                Ok(len) => lengths.push(len),
                Err(_) => {
                    return Err(self.throw_new("java.lang.NegativeArraySizeException", Some(len.to_string())));
                }
            }
        }
        Ok(self.make_array(ty, &lengths))
    }

    /// Allocates `ty` with the given leading dimensions; deeper levels stay `null`.
    fn make_array(&mut self, ty: &Type, lengths: &[usize]) -> Value {
        let elem = ty.element_type().cloned().unwrap_or_else(Type::object).erasure();
        let Some((&len, rest)) = lengths.split_first() else {
            return Value::Null;
        };
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            let item = if rest.is_empty() {
                Value::default_for(&elem)
            } else {
                self.make_array(&elem, rest)
            };
            items.push(item);
        }
        self.new_array(elem, items)
    }

    fn eval_unary(&mut self, expr: &Expr, op: UnaryOp, operand: &Expr) -> Flow<Value> {
        if op.is_increment() {
            let mark = self.rt.pending.len();
            let result = self.increment(op, operand);
            if result.is_err() {
                self.rt.pending.truncate(mark);
            }
            return result;
        }
        let value = self.eval_expr(operand)?;
        let value = self.unbox(&value);
        if value.is_null() {
            return Err(self.null_pointer("Cannot unbox a null value"));
        }
        ops::unary(op, &value).map_err(|_| {
            self.fail(
                ErrorKind::OperandTypes,
                format!("bad operand type {} for unary operator", value.runtime_type()),
                Site::of(expr),
            )
        })
    }

    fn increment(&mut self, op: UnaryOp, operand: &Expr) -> Flow<Value> {
        let ty = self.static_type(operand.id);
        let modifier = self.modifier_for(operand)?;
        let old = self.prepare(&modifier, operand)?;
        let raw = self.unbox(&old);
        if raw.is_null() {
            return Err(self.null_pointer("Cannot unbox a null value"));
        }
        let delta = if matches!(op, UnaryOp::PreInc | UnaryOp::PostInc) { 1 } else { -1 };
        let stepped = ops::step(&raw, delta).map_err(|_| {
            self.fail(ErrorKind::NumericExpected, "bad operand for increment", Site::of(operand))
        })?;
        let new = self.coerce(stepped, &ty);
        self.modify(modifier, new.clone(), operand)?;
        Ok(if matches!(op, UnaryOp::PostInc | UnaryOp::PostDec) { old } else { new })
    }

    fn eval_binary(&mut self, expr: &Expr, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Flow<Value> {
        match op {
            BinaryOp::And => Ok(Value::Boolean(self.eval_bool(lhs)? && self.eval_bool(rhs)?)),
            BinaryOp::Or => Ok(Value::Boolean(self.eval_bool(lhs)? || self.eval_bool(rhs)?)),
            BinaryOp::Add if self.static_type(expr.id).is_string() => {
                let a = self.eval_expr(lhs)?;
                let b = self.eval_expr(rhs)?;
                let mut text = self.to_java_string(&a)?;
                text.push_str(&self.to_java_string(&b)?);
                Ok(self.new_string(text))
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                let a = self.eval_expr(lhs)?;
                let b = self.eval_expr(rhs)?;
                let references = matches!(a, Value::Ref(_) | Value::Null) && matches!(b, Value::Ref(_) | Value::Null);
                let equal = if references {
                    a.same(&b)
                } else {
                    let (x, y) = (self.unbox(&a), self.unbox(&b));
                    if x.is_null() || y.is_null() {
                        return Err(self.null_pointer("Cannot unbox a null value"));
                    }
                    primitive_eq(&x, &y).unwrap_or(false)
                };
                Ok(Value::Boolean(equal == (op == BinaryOp::Eq)))
            }
            _ => {
                let a = self.eval_expr(lhs)?;
                let b = self.eval_expr(rhs)?;
                self.apply_binary(op, &a, &b, Site::of(expr))
            }
        }
    }

    /// Numeric, bitwise or comparison operator on (possibly boxed) operands.
    pub(crate) fn apply_binary(&mut self, op: BinaryOp, a: &Value, b: &Value, site: Site) -> Flow<Value> {
        let (a, b) = (self.unbox(a), self.unbox(b));
        if a.is_null() || b.is_null() {
            return Err(self.null_pointer("Cannot unbox a null value"));
        }
        match ops::binary(op, &a, &b) {
            Ok(value) => Ok(value),
            Err(OpError::DivideByZero) => {
                Err(self.throw_new("java.lang.ArithmeticException", Some("/ by zero".to_string())))
            }
            Err(OpError::BadOperands) => Err(self.fail(
                ErrorKind::OperandTypes,
                format!(
                    "bad operand types for {}: {} and {}",
                    op.symbol(),
                    a.runtime_type(),
                    b.runtime_type()
                ),
                site,
            )),
        }
    }

    fn eval_assign(&mut self, expr: &Expr, op: Option<BinaryOp>, target: &Expr, value: &Expr) -> Flow<Value> {
        let ty = self.static_type(target.id);
        let modifier = self.modifier_for(target)?;
        let new = match op {
            None => self.eval_initializer(value, &ty)?,
            Some(op) => {
                let old = self.prepare(&modifier, target)?;
                let rhs = self.eval_expr(value)?;
                let result = if op == BinaryOp::Add && ty.is_string() {
                    let mut text = self.to_java_string(&old)?;
                    text.push_str(&self.to_java_string(&rhs)?);
                    self.new_string(text)
                } else {
                    self.apply_binary(op, &old, &rhs, Site::of(expr))?
                };
                self.coerce(result, &ty)
            }
        };
        self.modify(modifier, new.clone(), target)?;
        Ok(new)
    }

    /// Cast conversion, throwing `ClassCastException` for incompatible references.
    pub(crate) fn cast(&mut self, value: Value, ty: &Type, site: Site) -> Flow<Value> {
        match ty {
            Type::Primitive(p) => {
                let raw = self.unbox(&value);
                if raw.is_null() {
                    return Err(self.null_pointer("Cannot unbox a null value"));
                }
                convert_primitive(&raw, *p).ok_or_else(|| {
                    self.fail(
                        ErrorKind::CastTypes,
                        format!("{} cannot be converted to {ty}", raw.runtime_type()),
                        site,
                    )
                })
            }
            Type::Unknown | Type::Void => Ok(value),
            _ => match &value {
                Value::Null => Ok(Value::Null),
                Value::Ref(obj) => {
                    if self.instance_of(&value, ty) {
                        Ok(value)
                    } else {
                        let message = format!(
                            "class {} cannot be cast to class {}",
                            obj.runtime_type(),
                            ty.erasure()
                        );
                        Err(self.throw_new("java.lang.ClassCastException", Some(message)))
                    }
                }
                _ => Ok(self.coerce(value, ty)),
            },
        }
    }

    /// `String.valueOf`: primitives print like Java, objects through their `toString()`.
    pub(crate) fn to_java_string(&mut self, value: &Value) -> Flow<String> {
        Ok(match value {
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Char(c) => char_from_unit(*c).to_string(),
            Value::Byte(v) => v.to_string(),
            Value::Short(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Float(v) => format_float(*v),
            Value::Double(v) => format_double(*v),
            Value::Ref(obj) => {
                if let Some(s) = obj.string_value() {
                    return Ok(s);
                }
                let result = self.call_method(obj, dj_types::names::OBJECT, "toString", Vec::new())?;
                result.as_string().unwrap_or_else(|| "null".to_string())
            }
        })
    }
}
