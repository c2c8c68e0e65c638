#![forbid(unsafe_code)]

//! Callable values.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::builtins::{self, ArrayMethod};
use crate::error::Result;
use crate::key::PropertyKey;
use crate::value::Value;

/// Native body of a [`Function`]: `(this, args) -> result`.
pub type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value>;

pub(crate) struct FunctionCell {
    name: Rc<str>,
    body: Box<NativeFn>,
    builtin: Option<ArrayMethod>,
}

/// A reference-counted callable with identity.
///
/// Cloning yields another handle to the same function.
#[derive(Clone)]
pub struct Function(Rc<FunctionCell>);

impl Function {
    /// Create a function from a native closure.
    ///
    /// `this` is the receiver the function was invoked on; it is the wrapper,
    /// not the raw object, when invoked through an observable.
    #[must_use]
    pub fn new(
        name: &str,
        body: impl Fn(&Value, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        Self(Rc::new(FunctionCell {
            name: Rc::from(name),
            body: Box::new(body),
            builtin: None,
        }))
    }

    pub(crate) fn builtin(method: ArrayMethod) -> Self {
        Self(Rc::new(FunctionCell {
            name: Rc::from(method.name()),
            body: Box::new(move |this, args| builtins::invoke(method, this, args)),
            builtin: Some(method),
        }))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The array method this function implements, if it is a builtin.
    #[must_use]
    pub fn builtin_method(&self) -> Option<ArrayMethod> {
        self.0.builtin
    }

    /// Call the body directly, without any interception.
    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value> {
        (self.0.body)(this, args)
    }

    /// Own properties of a function: only `name`.
    #[must_use]
    pub fn get_property(&self, key: &PropertyKey) -> Value {
        match key.as_name() {
            Some("name") => Value::from(self.name()),
            _ => Value::Undefined,
        }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<FunctionCell> {
        Rc::downgrade(&self.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name())
            .field("builtin", &self.0.builtin.is_some())
            .finish()
    }
}
