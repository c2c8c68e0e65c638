#![forbid(unsafe_code)]

//! Operation handlers and the handler selector.
//!
//! A [`ProxyHandler`] intercepts each category of operation performed on an
//! [`Observable`](crate::Observable): read, existence check, key listing,
//! write, delete, and call. Every method has a default that performs the
//! general-purpose tracked behavior of [`BaseHandler`], so a specialized
//! handler overrides only the operations it treats differently.
//!
//! Handlers are selected per target by class tag. The registry is consulted
//! once, when a wrapper is created; registering a handler does not affect
//! wrappers that already exist.

mod base;

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

use crate::error::Result;
use crate::function::Function;
use crate::key::PropertyKey;
use crate::object::ClassTag;
use crate::observable::Target;
use crate::value::Value;

pub use base::BaseHandler;

/// Interception callbacks for one class of targets.
pub trait ProxyHandler {
    /// Name used in debug output.
    fn name(&self) -> &str {
        "base"
    }

    fn get(&self, target: &Target, key: &PropertyKey) -> Result<Value> {
        base::get(target, key)
    }

    fn has(&self, target: &Target, key: &PropertyKey) -> Result<bool> {
        base::has(target, key)
    }

    fn own_keys(&self, target: &Target) -> Result<Vec<PropertyKey>> {
        base::own_keys(target)
    }

    fn set(&self, target: &Target, key: &PropertyKey, value: Value) -> Result<bool> {
        base::set(target, key, value)
    }

    fn delete_property(&self, target: &Target, key: &PropertyKey) -> Result<bool> {
        base::delete_property(target, key)
    }

    /// Call `function` with receiver `this`, which may be a wrapper.
    fn apply(&self, function: &Function, this: &Value, args: &[Value]) -> Result<Value> {
        base::apply(function, this, args)
    }
}

thread_local! {
    static BASE: Rc<dyn ProxyHandler> = Rc::new(BaseHandler);
    static REGISTRY: RefCell<AHashMap<ClassTag, Rc<dyn ProxyHandler>>> =
        RefCell::new(AHashMap::new());
}

/// The general-purpose handler set.
#[must_use]
pub fn base_handler() -> Rc<dyn ProxyHandler> {
    BASE.with(Rc::clone)
}

/// Use `handler` for targets tagged `class` wrapped from now on.
///
/// Returns the handler previously registered for `class`.
pub fn register_handler(
    class: impl Into<ClassTag>,
    handler: Rc<dyn ProxyHandler>,
) -> Option<Rc<dyn ProxyHandler>> {
    let class = class.into();
    tracing::debug!(message = "handler.register", class = %class, handler = handler.name());
    REGISTRY.with(|registry| registry.borrow_mut().insert(class, handler))
}

pub fn unregister_handler(class: &ClassTag) -> Option<Rc<dyn ProxyHandler>> {
    REGISTRY.with(|registry| registry.borrow_mut().remove(class))
}

/// The handler set governing `target`: its class's registered handler, else
/// [`BaseHandler`].
#[must_use]
pub fn handlers_for(target: &Target) -> Rc<dyn ProxyHandler> {
    let class = target.class();
    REGISTRY
        .with(|registry| registry.borrow().get(&class).cloned())
        .unwrap_or_else(base_handler)
}
