#![forbid(unsafe_code)]

//! Core: transparent observable wrappers over plain objects and arrays.
//!
//! [`observable`] wraps a raw [`Object`] (or [`Function`]) in an
//! [`Observable`] that behaves like the raw value for every read, write,
//! existence check, key listing, delete, and call, while recording which
//! reaction depends on which property and notifying it when that property
//! changes.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use lucent_core::{Value, wrap};
//! use lucent_reactive::autorun;
//!
//! let state = wrap(&Value::object([("count", 1)]));
//! let seen = Rc::new(Cell::new(0.0));
//!
//! let (s, out) = (state.clone(), Rc::clone(&seen));
//! let _watch = autorun(move || {
//!     out.set(s.get("count").map(|v| v.to_number()).unwrap_or_default());
//! });
//!
//! state.set("count", 5).unwrap();
//! assert_eq!(seen.get(), 5.0);
//! ```

pub mod builtins;
pub mod config;
pub mod error;
pub mod function;
pub mod handlers;
pub mod key;
pub mod object;
pub mod observable;
pub mod store;
pub mod value;

pub use builtins::ArrayMethod;
pub use config::{ReactivityConfig, configure};
pub use error::{Error, Result};
pub use function::Function;
pub use handlers::{BaseHandler, ProxyHandler, handlers_for, register_handler, unregister_handler};
pub use key::{PropertyKey, Symbol};
pub use object::{ClassTag, Object};
pub use observable::{Observable, Target, is_observable, observable, raw, wrap};
pub use store::{StoreStats, TokenKey};
pub use value::Value;
