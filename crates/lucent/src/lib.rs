#![forbid(unsafe_code)]

//! Lucent public facade crate.
//!
//! Transparent observable objects and arrays, plus the reactions that
//! follow them.

pub use lucent_core as core;
pub use lucent_reactive as reactive;

pub mod prelude {
    pub use lucent_core::{
        Error, Function, Object, Observable, PropertyKey, ReactivityConfig, Result, Symbol, Value,
        configure, is_observable, observable, raw, wrap,
    };
    pub use lucent_reactive::{
        Atom, BatchScope, Disposer, action, autorun, batch, reaction, run_in_action, untracked,
    };
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::prelude::*;

    #[test]
    fn prelude_covers_a_round_trip() {
        let todos = wrap(&Value::array(["write"]));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let (t, s) = (todos.clone(), Rc::clone(&seen));
        let _watch = autorun(move || {
            let len = t.get("length").map(|v| v.to_number()).unwrap_or_default();
            s.borrow_mut().push(len);
        });

        todos.invoke("push", &[Value::from("test")]).expect("push");
        assert_eq!(*seen.borrow(), vec![1.0, 2.0]);
        assert!(is_observable(&todos));
    }
}
