#![forbid(unsafe_code)]

//! Observable wrappers and the factory that creates them.
//!
//! An [`Observable`] is the tracked stand-in for a raw [`Object`] or
//! [`Function`]. Every operation on it is routed through the
//! [`ProxyHandler`] chosen for its target when it was created.
//!
//! # Invariants
//!
//! 1. [`observable`] returns the live wrapper already recorded for a target
//!    rather than creating a second one.
//! 2. A wrapper owns its target strongly. The store lets go of both once
//!    nothing outside it reaches either.
//! 3. Wrapping a wrapper returns it unchanged.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{Error, Result};
use crate::function::{Function, FunctionCell};
use crate::handlers::{self, ProxyHandler};
use crate::key::PropertyKey;
use crate::object::{ClassTag, Object, ObjectCell};
use crate::store;
use crate::value::Value;

/// What a wrapper wraps.
#[derive(Clone, Debug)]
pub enum Target {
    Object(Object),
    Function(Function),
}

impl Target {
    /// Class tag used to select the handler set.
    #[must_use]
    pub fn class(&self) -> ClassTag {
        match self {
            Self::Object(object) => object.class().clone(),
            Self::Function(_) => ClassTag::function(),
        }
    }

    /// The target as a raw value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Object(object) => Value::Object(object.clone()),
            Self::Function(function) => Value::Function(function.clone()),
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            Self::Function(_) => None,
        }
    }

    /// Element count when the target is an array.
    #[must_use]
    pub fn array_len(&self) -> Option<usize> {
        self.as_object().and_then(Object::array_len)
    }

    /// Raw read.
    #[must_use]
    pub fn get(&self, key: &PropertyKey) -> Value {
        match self {
            Self::Object(object) => object.get(key),
            Self::Function(function) => function.get_property(key),
        }
    }

    /// Raw write. Function properties are read-only.
    pub fn set(&self, key: &PropertyKey, value: Value) -> Result<bool> {
        match self {
            Self::Object(object) => object.set(key, value),
            Self::Function(_) => Ok(false),
        }
    }

    #[must_use]
    pub fn has(&self, key: &PropertyKey) -> bool {
        match self {
            Self::Object(object) => object.has(key),
            Self::Function(function) => !function.get_property(key).is_undefined(),
        }
    }

    #[must_use]
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        match self {
            Self::Object(object) => object.own_keys(),
            Self::Function(_) => vec![PropertyKey::from("name")],
        }
    }

    pub fn delete(&self, key: &PropertyKey) -> bool {
        match self {
            Self::Object(object) => object.delete(key),
            Self::Function(_) => false,
        }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Target) -> bool {
        self.addr() == other.addr()
    }

    pub(crate) fn addr(&self) -> usize {
        match self {
            Self::Object(object) => object.addr(),
            Self::Function(function) => function.addr(),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakTarget {
        match self {
            Self::Object(object) => WeakTarget::Object(object.downgrade()),
            Self::Function(function) => WeakTarget::Function(function.downgrade()),
        }
    }
}

impl From<Object> for Target {
    fn from(object: Object) -> Self {
        Self::Object(object)
    }
}

impl From<Function> for Target {
    fn from(function: Function) -> Self {
        Self::Function(function)
    }
}

impl TryFrom<Value> for Target {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(object) => Ok(Self::Object(object)),
            Value::Function(function) => Ok(Self::Function(function)),
            Value::Observable(observable) => Ok(observable.target().clone()),
            other => Err(Error::not_an_object("wrap", "value", other.type_name())),
        }
    }
}

pub(crate) enum WeakTarget {
    Object(Weak<ObjectCell>),
    Function(Weak<FunctionCell>),
}

impl WeakTarget {
    pub(crate) fn strong_count(&self) -> usize {
        match self {
            Self::Object(weak) => weak.strong_count(),
            Self::Function(weak) => weak.strong_count(),
        }
    }
}

pub(crate) struct ObservableCell {
    target: Target,
    handler: Rc<dyn ProxyHandler>,
}

/// A tracked wrapper around a raw object or function.
///
/// Cloning yields another handle to the same wrapper.
#[derive(Clone)]
pub struct Observable(Rc<ObservableCell>);

impl Observable {
    pub(crate) fn new(target: Target, handler: Rc<dyn ProxyHandler>) -> Self {
        Self(Rc::new(ObservableCell { target, handler }))
    }

    #[must_use]
    pub fn target(&self) -> &Target {
        &self.0.target
    }

    /// The wrapped raw value.
    #[must_use]
    pub fn raw(&self) -> Value {
        self.0.target.to_value()
    }

    #[must_use]
    pub fn handler(&self) -> &Rc<dyn ProxyHandler> {
        &self.0.handler
    }

    pub fn get(&self, key: &PropertyKey) -> Result<Value> {
        self.0.handler.get(&self.0.target, key)
    }

    pub fn set(&self, key: &PropertyKey, value: Value) -> Result<bool> {
        self.0.handler.set(&self.0.target, key, value)
    }

    pub fn has(&self, key: &PropertyKey) -> Result<bool> {
        self.0.handler.has(&self.0.target, key)
    }

    pub fn own_keys(&self) -> Result<Vec<PropertyKey>> {
        self.0.handler.own_keys(&self.0.target)
    }

    pub fn delete(&self, key: &PropertyKey) -> Result<bool> {
        self.0.handler.delete_property(&self.0.target, key)
    }

    /// Call a wrapped function with `this` as the receiver.
    pub fn apply(&self, this: &Value, args: &[Value]) -> Result<Value> {
        match &self.0.target {
            Target::Function(function) => self.0.handler.apply(function, this, args),
            Target::Object(_) => Err(Error::not_callable("object")),
        }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Observable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn downgrade(&self) -> WeakObservable {
        WeakObservable(Rc::downgrade(&self.0))
    }

    pub(crate) fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("target", &self.0.target)
            .field("handler", &self.0.handler.name())
            .finish()
    }
}

pub(crate) struct WeakObservable(Weak<ObservableCell>);

impl WeakObservable {
    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub(crate) fn points_to(&self, observable: &Observable) -> bool {
        self.is_alive() && std::ptr::eq(self.0.as_ptr(), Rc::as_ptr(&observable.0))
    }
}

/// Wrap `target`, reusing its existing wrapper.
#[must_use]
pub fn observable(target: impl Into<Target>) -> Observable {
    let target = target.into();
    if let Some(existing) = store::get_wrapper(&target) {
        return existing;
    }
    let handler = handlers::handlers_for(&target);
    let wrapper = Observable::new(target.clone(), handler);
    store::set_wrapper(&target, &wrapper);
    wrapper
}

/// Wrap any value: objects and functions become observables, observables
/// and primitives are returned unchanged.
#[must_use]
pub fn wrap(value: &Value) -> Value {
    match value {
        Value::Object(object) => Value::Observable(observable(object.clone())),
        Value::Function(function) => Value::Observable(observable(function.clone())),
        other => other.clone(),
    }
}

/// Whether `value` is a registered wrapper.
#[must_use]
pub fn is_observable(value: &Value) -> bool {
    store::is_wrapped(value)
}

/// The raw value behind a wrapper, or the value itself.
#[must_use]
pub fn raw(value: &Value) -> Value {
    store::unwrap(value)
}
