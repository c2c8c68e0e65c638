#![forbid(unsafe_code)]

//! Builtin array methods.
//!
//! Every method is a per-thread singleton [`Function`], so reading `push`
//! from two different arrays yields the same function identity. Bodies
//! operate on a raw array receiver and never hold a borrow of it while user
//! callbacks or comparators run.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::function::Function;
use crate::object::Object;
use crate::value::{self, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayMethod {
    Pop,
    Push,
    Reverse,
    Shift,
    Sort,
    Splice,
    Unshift,
    Join,
    Slice,
    IndexOf,
    Includes,
    Map,
    Filter,
    ForEach,
    Find,
    Some,
    Every,
}

impl ArrayMethod {
    pub const ALL: [ArrayMethod; 17] = [
        Self::Pop,
        Self::Push,
        Self::Reverse,
        Self::Shift,
        Self::Sort,
        Self::Splice,
        Self::Unshift,
        Self::Join,
        Self::Slice,
        Self::IndexOf,
        Self::Includes,
        Self::Map,
        Self::Filter,
        Self::ForEach,
        Self::Find,
        Self::Some,
        Self::Every,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pop => "pop",
            Self::Push => "push",
            Self::Reverse => "reverse",
            Self::Shift => "shift",
            Self::Sort => "sort",
            Self::Splice => "splice",
            Self::Unshift => "unshift",
            Self::Join => "join",
            Self::Slice => "slice",
            Self::IndexOf => "indexOf",
            Self::Includes => "includes",
            Self::Map => "map",
            Self::Filter => "filter",
            Self::ForEach => "forEach",
            Self::Find => "find",
            Self::Some => "some",
            Self::Every => "every",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.name() == name)
    }

    /// Whether the method changes the receiver's elements or length.
    #[must_use]
    pub const fn is_mutating(self) -> bool {
        matches!(
            self,
            Self::Pop
                | Self::Push
                | Self::Reverse
                | Self::Shift
                | Self::Sort
                | Self::Splice
                | Self::Unshift
        )
    }
}

thread_local! {
    static METHODS: Vec<Function> = ArrayMethod::ALL.into_iter().map(Function::builtin).collect();
}

/// The shared function object implementing `method`.
pub(crate) fn array_method(method: ArrayMethod) -> Function {
    METHODS.with(|methods| methods[method as usize].clone())
}

/// Run `method` with `this` as the receiver.
pub(crate) fn invoke(method: ArrayMethod, this: &Value, args: &[Value]) -> Result<Value> {
    let array = receiver(method, this)?;
    match method {
        ArrayMethod::Pop => Ok(array
            .with_elements_mut(Vec::pop)
            .flatten()
            .unwrap_or_default()),
        ArrayMethod::Push => {
            let len = array.with_elements_mut(|elements| {
                elements.extend_from_slice(args);
                elements.len()
            });
            Ok(Value::from(len.unwrap_or_default()))
        }
        ArrayMethod::Reverse => {
            array.with_elements_mut(|elements| elements.reverse());
            Ok(this.clone())
        }
        ArrayMethod::Shift => Ok(array
            .with_elements_mut(|elements| {
                (!elements.is_empty()).then(|| elements.remove(0))
            })
            .flatten()
            .unwrap_or_default()),
        ArrayMethod::Unshift => {
            let len = array.with_elements_mut(|elements| {
                elements.splice(0..0, args.iter().cloned());
                elements.len()
            });
            Ok(Value::from(len.unwrap_or_default()))
        }
        ArrayMethod::Splice => Ok(splice(&array, args)),
        ArrayMethod::Sort => {
            sort(&array, args.first())?;
            Ok(this.clone())
        }
        ArrayMethod::Join => {
            let separator = match args.first() {
                None | Some(Value::Undefined) => ",".to_owned(),
                Some(separator) => separator.to_display_string(),
            };
            Ok(Value::from(value::join_elements(&array, &separator)))
        }
        ArrayMethod::Slice => {
            let elements = array.elements().unwrap_or_default();
            let len = elements.len();
            let start = relative_index(args.first(), len, 0);
            let end = relative_index(args.get(1), len, len);
            let sliced = elements.get(start..end.max(start)).unwrap_or_default();
            Ok(Value::array(sliced.iter().cloned()))
        }
        ArrayMethod::IndexOf => {
            let needle = args.first().cloned().unwrap_or_default();
            let elements = array.elements().unwrap_or_default();
            let from = relative_index(args.get(1), elements.len(), 0);
            let found = elements
                .iter()
                .enumerate()
                .skip(from)
                .find(|(_, element)| element.strict_eq(&needle));
            Ok(found.map_or(Value::from(-1), |(index, _)| Value::from(index)))
        }
        ArrayMethod::Includes => {
            let needle = args.first().cloned().unwrap_or_default();
            let elements = array.elements().unwrap_or_default();
            Ok(Value::from(
                elements.iter().any(|element| element.same_value_zero(&needle)),
            ))
        }
        ArrayMethod::Map => {
            let mut mapped = Vec::new();
            for_each_element(&array, args, |_, result| {
                mapped.push(result);
                Ok(true)
            })?;
            Ok(Value::array(mapped))
        }
        ArrayMethod::Filter => {
            let mut kept = Vec::new();
            for_each_element(&array, args, |element, result| {
                if result.is_truthy() {
                    kept.push(element);
                }
                Ok(true)
            })?;
            Ok(Value::array(kept))
        }
        ArrayMethod::ForEach => {
            for_each_element(&array, args, |_, _| Ok(true))?;
            Ok(Value::Undefined)
        }
        ArrayMethod::Find => {
            let mut found = Value::Undefined;
            for_each_element(&array, args, |element, result| {
                if result.is_truthy() {
                    found = element;
                    return Ok(false);
                }
                Ok(true)
            })?;
            Ok(found)
        }
        ArrayMethod::Some => {
            let mut any = false;
            for_each_element(&array, args, |_, result| {
                any = result.is_truthy();
                Ok(!any)
            })?;
            Ok(Value::from(any))
        }
        ArrayMethod::Every => {
            let mut all = true;
            for_each_element(&array, args, |_, result| {
                all = result.is_truthy();
                Ok(all)
            })?;
            Ok(Value::from(all))
        }
    }
}

fn receiver(method: ArrayMethod, this: &Value) -> Result<Object> {
    let object = match this {
        Value::Object(object) => Some(object.clone()),
        Value::Observable(observable) => observable.raw().as_object().cloned(),
        _ => None,
    };
    object
        .filter(Object::is_array)
        .ok_or(Error::NotAnArray {
            method: method.name(),
        })
}

/// Call `args[0]` as `callback(element, index)` for each element present
/// when iteration started; `visit` gets the element and the callback result
/// and returns whether to continue.
fn for_each_element(
    array: &Object,
    args: &[Value],
    mut visit: impl FnMut(Value, Value) -> Result<bool>,
) -> Result<()> {
    let callback = args.first().cloned().unwrap_or_default();
    if !callback.is_callable() {
        return Err(Error::not_callable(callback.type_name()));
    }
    let this_arg = args.get(1).cloned().unwrap_or_default();
    let len = array.array_len().unwrap_or_default();
    for index in 0..len {
        let element = array.get_index(index);
        let result = callback.call(&this_arg, &[element.clone(), Value::from(index)])?;
        if !visit(element, result)? {
            break;
        }
    }
    Ok(())
}

fn to_integer(value: &Value) -> f64 {
    let n = value.to_number();
    if n.is_nan() { 0.0 } else { n.trunc() }
}

/// Resolve a possibly negative relative index against `len`, clamped to
/// `0..=len`.
fn relative_index(value: Option<&Value>, len: usize, default: usize) -> usize {
    let Some(value) = value.filter(|value| !value.is_undefined()) else {
        return default;
    };
    let n = to_integer(value);
    let len_f = len as f64;
    if n < 0.0 {
        (len_f + n).max(0.0) as usize
    } else {
        n.min(len_f) as usize
    }
}

fn splice(array: &Object, args: &[Value]) -> Value {
    let len = array.array_len().unwrap_or_default();
    let start = relative_index(args.first(), len, 0);
    let delete_count = match args.len() {
        0 => 0,
        1 => len - start,
        _ => to_integer(&args[1]).clamp(0.0, (len - start) as f64) as usize,
    };
    let items = args.get(2..).unwrap_or_default();
    let removed = array
        .with_elements_mut(|elements| {
            elements
                .splice(start..start + delete_count, items.iter().cloned())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    Value::array(removed)
}

fn sort(array: &Object, comparator: Option<&Value>) -> Result<()> {
    let comparator = match comparator {
        None | Some(Value::Undefined) => None,
        Some(f) if f.is_callable() => Some(f.clone()),
        Some(other) => return Err(Error::not_callable(other.type_name())),
    };
    let elements = array.elements().unwrap_or_default();
    let (mut defined, undefined): (Vec<Value>, Vec<Value>) =
        elements.into_iter().partition(|element| !element.is_undefined());

    let mut compare = |a: &Value, b: &Value| -> Result<Ordering> {
        match &comparator {
            Some(f) => {
                let n = f.call(&Value::Undefined, &[a.clone(), b.clone()])?.to_number();
                Ok(n.partial_cmp(&0.0).unwrap_or(Ordering::Equal))
            }
            None => Ok(a.to_display_string().cmp(&b.to_display_string())),
        }
    };
    defined = merge_sort(defined, &mut compare)?;
    defined.extend(undefined);

    array.with_elements_mut(|elements| *elements = defined);
    Ok(())
}

/// Stable top-down merge sort with a fallible comparator.
fn merge_sort(
    mut items: Vec<Value>,
    compare: &mut impl FnMut(&Value, &Value) -> Result<Ordering>,
) -> Result<Vec<Value>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, compare)?;
    let right = merge_sort(right, compare)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_right = match (left.peek(), right.peek()) {
            (Some(a), Some(b)) => compare(b, a)? == Ordering::Less,
            _ => break,
        };
        let next = if take_right { right.next() } else { left.next() };
        merged.extend(next);
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}
