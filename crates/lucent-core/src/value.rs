#![forbid(unsafe_code)]

//! Dynamic values.
//!
//! [`Value`] is the currency of every operation in this crate: property
//! reads return it, writes take it, functions receive and return it.
//! `Object`, `Function`, and `Observable` variants have reference identity;
//! the rest are plain data.
//!
//! The transparent operations ([`Value::get`], [`Value::set`], ...) have the
//! same shape whether the receiver is a raw object or an observable wrapper;
//! wrappers route them through their handler set.
//!
//! # Equality
//!
//! `PartialEq` is [`Value::strict_eq`]: primitives by value (`NaN` differs
//! from itself), everything else by identity.

use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::function::Function;
use crate::key::PropertyKey;
use crate::object::Object;
use crate::observable::{Observable, Target};

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(Object),
    Function(Function),
    Observable(Observable),
}

impl Value {
    /// A new array holding `values`.
    #[must_use]
    pub fn array<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::Object(Object::array(values))
    }

    /// A new plain object holding `entries`.
    #[must_use]
    pub fn object<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<PropertyKey>,
        V: Into<Value>,
    {
        Self::Object(Object::from_entries(entries))
    }

    /// `typeof`-style name, with `null` distinguished.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(_) => "object",
            Self::Function(_) => "function",
            Self::Observable(observable) => match observable.target() {
                Target::Object(_) => "object",
                Target::Function(_) => "function",
            },
        }
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// `undefined` or `null`.
    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Raw object, raw function, or observable.
    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Function(_) | Self::Observable(_))
    }

    #[must_use]
    pub fn is_callable(&self) -> bool {
        match self {
            Self::Function(_) => true,
            Self::Observable(observable) => matches!(observable.target(), Target::Function(_)),
            _ => false,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(function) => Some(function),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_observable(&self) -> Option<&Observable> {
        match self {
            Self::Observable(observable) => Some(observable),
            _ => None,
        }
    }

    /// Strict equality.
    #[must_use]
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Observable(a), Self::Observable(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Strict equality, except that `NaN` equals `NaN`.
    #[must_use]
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_eq(other),
        }
    }

    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Object(_) | Self::Function(_) | Self::Observable(_) => true,
        }
    }

    /// Numeric conversion; objects convert to `NaN`.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Self::Undefined | Self::Object(_) | Self::Function(_) | Self::Observable(_) => {
                f64::NAN
            }
        }
    }

    /// String conversion as used by `join` and the default sort order.
    ///
    /// Arrays join their elements with `,` (`undefined` and `null` elements
    /// print empty); an array already being printed prints empty.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        let mut out = String::new();
        self.write_display(&mut out, &mut Vec::new());
        out
    }

    fn write_display(&self, out: &mut String, seen: &mut Vec<usize>) {
        match self {
            Self::Undefined => out.push_str("undefined"),
            Self::Null => out.push_str("null"),
            Self::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Self::Number(n) => out.push_str(&format_number(*n)),
            Self::String(s) => out.push_str(s),
            Self::Object(object) => write_object(object, out, seen),
            Self::Function(function) => write_function(function, out),
            Self::Observable(observable) => match observable.target() {
                Target::Object(object) => write_object(object, out, seen),
                Target::Function(function) => write_function(function, out),
            },
        }
    }

    /// Read `key`.
    pub fn get(&self, key: impl Into<PropertyKey>) -> Result<Value> {
        let key = key.into();
        match self {
            Self::Object(object) => Ok(object.get(&key)),
            Self::Observable(observable) => observable.get(&key),
            Self::Function(function) => Ok(function.get_property(&key)),
            Self::String(s) => Ok(string_property(s, &key)),
            Self::Undefined | Self::Null => {
                Err(Error::not_an_object("read", &key, self.type_name()))
            }
            Self::Bool(_) | Self::Number(_) => Ok(Value::Undefined),
        }
    }

    /// Write `key`. Writes to primitives are ignored and return `false`.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Result<bool> {
        let key = key.into();
        match self {
            Self::Object(object) => object.set(&key, value.into()),
            Self::Observable(observable) => observable.set(&key, value.into()),
            Self::Undefined | Self::Null => {
                Err(Error::not_an_object("set", &key, self.type_name()))
            }
            _ => Ok(false),
        }
    }

    /// Whether `key` exists (the `in` operator).
    pub fn has(&self, key: impl Into<PropertyKey>) -> Result<bool> {
        let key = key.into();
        match self {
            Self::Object(object) => Ok(object.has(&key)),
            Self::Observable(observable) => observable.has(&key),
            Self::Function(function) => Ok(!function.get_property(&key).is_undefined()),
            _ => Err(Error::not_an_object("check", &key, self.type_name())),
        }
    }

    /// Own property keys in enumeration order.
    pub fn own_keys(&self) -> Result<Vec<PropertyKey>> {
        match self {
            Self::Object(object) => Ok(object.own_keys()),
            Self::Observable(observable) => observable.own_keys(),
            Self::Function(_) => Ok(vec![PropertyKey::from("name")]),
            Self::Undefined | Self::Null => Err(Error::not_an_object(
                "list",
                "keys",
                self.type_name(),
            )),
            Self::Bool(_) | Self::Number(_) | Self::String(_) => Ok(Vec::new()),
        }
    }

    /// Delete `key`.
    pub fn delete(&self, key: impl Into<PropertyKey>) -> Result<bool> {
        let key = key.into();
        match self {
            Self::Object(object) => Ok(object.delete(&key)),
            Self::Observable(observable) => observable.delete(&key),
            Self::Undefined | Self::Null => {
                Err(Error::not_an_object("delete", &key, self.type_name()))
            }
            _ => Ok(true),
        }
    }

    /// Call this value with an explicit receiver.
    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value> {
        match self {
            Self::Function(function) => function.call(this, args),
            Self::Observable(observable) if self.is_callable() => observable.apply(this, args),
            _ => Err(Error::not_callable(self.type_name())),
        }
    }

    /// Read method `name` and call it with this value as the receiver.
    pub fn invoke(&self, name: impl Into<PropertyKey>, args: &[Value]) -> Result<Value> {
        let key = name.into();
        let method = self.get(key.clone())?;
        if !method.is_callable() {
            return Err(Error::not_callable(key.to_string()));
        }
        method.call(self, args)
    }
}

fn write_object(object: &Object, out: &mut String, seen: &mut Vec<usize>) {
    let Some(elements) = object.elements() else {
        out.push_str("[object Object]");
        return;
    };
    let addr = object.addr();
    if seen.contains(&addr) {
        return;
    }
    seen.push(addr);
    write_joined(&elements, ",", out, seen);
    seen.pop();
}

fn write_joined(elements: &[Value], separator: &str, out: &mut String, seen: &mut Vec<usize>) {
    for (i, element) in elements.iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        if !element.is_nullish() {
            element.write_display(out, seen);
        }
    }
}

/// Join the elements of `array` with `separator`, as `Array.prototype.join`.
pub(crate) fn join_elements(array: &Object, separator: &str) -> String {
    let elements = array.elements().unwrap_or_default();
    let mut out = String::new();
    let mut seen = vec![array.addr()];
    write_joined(&elements, separator, &mut out, &mut seen);
    out
}

fn write_function(function: &Function, out: &mut String) {
    out.push_str("function ");
    out.push_str(function.name());
    out.push_str("() { [native code] }");
}

fn string_property(s: &str, key: &PropertyKey) -> Value {
    match key {
        PropertyKey::Index(index) => s
            .chars()
            .nth(*index as usize)
            .map_or(Value::Undefined, |c| Value::from(c.to_string())),
        key if key.is_length() => Value::from(s.chars().count()),
        _ => Value::Undefined,
    }
}

/// Format a number the way `String(n)` does.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".into();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.into();
    }
    if n == 0.0 {
        return "0".into();
    }
    if n.abs() >= 1e21 {
        let formatted = format!("{n:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => formatted,
        };
    }
    if n.fract() == 0.0 {
        return format!("{n:.0}");
    }
    format!("{n}")
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Object(object) => write!(f, "{object:?}"),
            Self::Function(function) => write!(f, "{function:?}"),
            Self::Observable(observable) => write!(f, "{observable:?}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Self::String(s)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Self::Object(object)
    }
}

impl From<Function> for Value {
    fn from(function: Function) -> Self {
        Self::Function(function)
    }
}

impl From<Observable> for Value {
    fn from(observable: Observable) -> Self {
        Self::Observable(observable)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Undefined, Into::into)
    }
}
