//! `java.util`: `ArrayList`, its iterator, `Arrays` and `Objects`.

use std::rc::Rc;

use dj_types::{names, Type};

use super::{compare_doubles, Args};
use crate::error::Flow;
use crate::eval::Evaluator;
use crate::value::{NativeState, ObjectRef, Value};

const INDEX_OUT_OF_BOUNDS: &str = "java.lang.IndexOutOfBoundsException";

fn list_items(obj: &ObjectRef) -> Vec<Value> {
    match &*obj.state() {
        NativeState::List(items) => items.clone(),
        _ => Vec::new(),
    }
}

fn edit_list<R>(obj: &ObjectRef, edit: impl FnOnce(&mut Vec<Value>) -> R) -> Option<R> {
    match &mut *obj.state_mut() {
        NativeState::List(items) => Some(edit(items)),
        _ => None,
    }
}

impl Evaluator<'_> {
    pub(super) fn new_list_state(&mut self, params: &str, args: &Args) -> Flow<NativeState> {
        match params {
            "(int)" => {
                let capacity = args.int(0);
                if capacity < 0 {
                    return Err(self.throw_new(
                        "java.lang.IllegalArgumentException",
                        Some(format!("Illegal Capacity: {capacity}")),
                    ));
                }
                Ok(NativeState::List(Vec::with_capacity(capacity as usize)))
            }
            "(Collection)" => match self.collection_items(&args.value(0)) {
                Some(items) => Ok(NativeState::List(items)),
                None => Err(self.null_pointer("Cannot copy a null collection")),
            },
            _ => Ok(NativeState::List(Vec::new())),
        }
    }

    /// Position of the first element equal to `target`.
    fn position(&mut self, items: &[Value], target: &Value) -> Flow<Option<usize>> {
        for (i, item) in items.iter().enumerate() {
            let equal = match target {
                Value::Null => item.is_null(),
                _ => self.java_equals(target, item)?,
            };
            if equal {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    fn checked_index(&mut self, index: i32, len: usize) -> Flow<usize> {
        match usize::try_from(index).ok().filter(|i| *i < len) {
            Some(i) => Ok(i),
            None => Err(self.index_out_of_bounds(INDEX_OUT_OF_BOUNDS, i64::from(index), len)),
        }
    }

    pub(super) fn list_method(&mut self, obj: &ObjectRef, sig: &str, args: &Args) -> Flow<Option<Value>> {
        let items = list_items(obj);
        let value = match sig {
            "size()" => Value::Int(items.len() as i32),
            "isEmpty()" => Value::Boolean(items.is_empty()),
            "contains(Object)" => Value::Boolean(self.position(&items, &args.value(0))?.is_some()),
            "indexOf(Object)" => Value::Int(self.position(&items, &args.value(0))?.map_or(-1, |i| i as i32)),
            "add(Object)" => {
                edit_list(obj, |list| list.push(args.value(0)));
                Value::Boolean(true)
            }
            "add(int,Object)" => {
                let index = args.int(0);
                let Some(at) = usize::try_from(index).ok().filter(|at| *at <= items.len()) else {
                    return Err(self.throw_new(
                        INDEX_OUT_OF_BOUNDS,
                        Some(format!("Index: {index}, Size: {}", items.len())),
                    ));
                };
                edit_list(obj, |list| list.insert(at, args.value(1)));
                Value::Null
            }
            "addAll(Collection)" => {
                let Some(added) = self.collection_items(&args.value(0)) else {
                    return Err(self.null_pointer("Cannot add a null collection"));
                };
                let changed = !added.is_empty();
                edit_list(obj, |list| list.extend(added));
                Value::Boolean(changed)
            }
            "get(int)" => {
                let at = self.checked_index(args.int(0), items.len())?;
                items[at].clone()
            }
            "set(int,Object)" => {
                let at = self.checked_index(args.int(0), items.len())?;
                edit_list(obj, |list| std::mem::replace(&mut list[at], args.value(1))).unwrap_or(Value::Null)
            }
            "remove(int)" => {
                let at = self.checked_index(args.int(0), items.len())?;
                edit_list(obj, |list| list.remove(at)).unwrap_or(Value::Null)
            }
            "remove(Object)" => match self.position(&items, &args.value(0))? {
                Some(at) => {
                    edit_list(obj, |list| list.remove(at));
                    Value::Boolean(true)
                }
                None => Value::Boolean(false),
            },
            "clear()" => {
                edit_list(obj, Vec::clear);
                Value::Null
            }
            "toArray()" => self.new_array(Type::object(), items),
            "iterator()" => Value::Ref(self.alloc(
                names::ITERATOR,
                NativeState::Iter {
                    list: Rc::clone(obj),
                    cursor: 0,
                },
            )),
            "equals(Object)" => {
                let other = args.value(0);
                let equal = match other.as_object() {
                    Some(other) if Rc::ptr_eq(obj, other) => true,
                    Some(other) if matches!(&*other.state(), NativeState::List(_)) => {
                        let theirs = list_items(other);
                        let mut same = items.len() == theirs.len();
                        for (a, b) in items.iter().zip(&theirs) {
                            if !same {
                                break;
                            }
                            same = self.java_equals(a, b)?;
                        }
                        same
                    }
                    _ => false,
                };
                Value::Boolean(equal)
            }
            "hashCode()" => {
                let mut hash = 1i32;
                for item in &items {
                    hash = hash.wrapping_mul(31).wrapping_add(self.java_hash(item)?);
                }
                Value::Int(hash)
            }
            "toString()" => {
                let mut parts = Vec::with_capacity(items.len());
                for item in &items {
                    let text = match item {
                        Value::Ref(inner) if Rc::ptr_eq(inner, obj) => "(this Collection)".to_string(),
                        other => self.to_java_string(other)?,
                    };
                    parts.push(text);
                }
                self.new_string(format!("[{}]", parts.join(", ")))
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    pub(super) fn iterator_method(&mut self, obj: &ObjectRef, sig: &str) -> Flow<Option<Value>> {
        let (list, cursor) = match &*obj.state() {
            NativeState::Iter { list, cursor } => (Rc::clone(list), *cursor),
            _ => return Ok(None),
        };
        let items = list_items(&list);
        let advance = |to: usize| {
            if let NativeState::Iter { cursor, .. } = &mut *obj.state_mut() {
                *cursor = to;
            }
        };
        let value = match sig {
            "hasNext()" => Value::Boolean(cursor < items.len()),
            "next()" => match items.get(cursor) {
                Some(item) => {
                    advance(cursor + 1);
                    item.clone()
                }
                None => return Err(self.throw_new("java.util.NoSuchElementException", None)),
            },
            "remove()" => {
                if cursor == 0 {
                    return Err(self.throw_new("java.lang.IllegalStateException", None));
                }
                edit_list(&list, |list| list.remove(cursor - 1));
                advance(cursor - 1);
                Value::Null
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    pub(super) fn arrays_static(&mut self, sig: &str, args: &Args) -> Flow<Option<Value>> {
        let array = args.value(0);
        let value = match sig.split_once('(').map_or(sig, |(name, _)| name) {
            "toString" => match self.collection_items(&array) {
                Some(items) => {
                    let mut parts = Vec::with_capacity(items.len());
                    for item in &items {
                        parts.push(self.to_java_string(item)?);
                    }
                    self.new_string(format!("[{}]", parts.join(", ")))
                }
                None => self.intern("null"),
            },
            "sort" | "fill" => {
                let Some(obj) = array.as_object() else {
                    return Err(self.null_pointer("Cannot read the array length because \"a\" is null"));
                };
                let fill = args.value(1);
                if let NativeState::Array { items, .. } = &mut *obj.state_mut() {
                    if sig.starts_with("fill") {
                        items.iter_mut().for_each(|item| *item = fill.clone());
                    } else if sig == "sort(double[])" {
                        items.sort_by(|a, b| compare_doubles(a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0)));
                    } else {
                        items.sort_by_key(Value::as_i64);
                    }
                }
                Value::Null
            }
            "equals" => {
                let equal = match (self.collection_items(&array), self.collection_items(&args.value(1))) {
                    (None, None) => true,
                    (Some(a), Some(b)) => a.len() == b.len() && a.iter().zip(&b).all(|(x, y)| x.same(y)),
                    _ => false,
                };
                Value::Boolean(equal)
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    pub(super) fn objects_static(&mut self, sig: &str, args: &Args) -> Flow<Option<Value>> {
        let first = args.value(0);
        let value = match sig {
            "equals(Object,Object)" => {
                let second = args.value(1);
                Value::Boolean(first.same(&second) || (!first.is_null() && self.java_equals(&first, &second)?))
            }
            "hashCode(Object)" => Value::Int(self.java_hash(&first)?),
            "toString(Object)" => {
                let text = self.to_java_string(&first)?;
                self.new_string(text)
            }
            "isNull(Object)" => Value::Boolean(first.is_null()),
            "requireNonNull(Object)" => {
                if first.is_null() {
                    return Err(self.throw_new("java.lang.NullPointerException", None));
                }
                first
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }
}
