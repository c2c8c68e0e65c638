#![forbid(unsafe_code)]

//! Thread-local tracking context.
//!
//! The context is a stack of frames. A frame either carries the derivation
//! currently being tracked or is empty, which suppresses tracking for
//! everything that runs inside it (see [`untracked`]).

use std::cell::RefCell;
use std::rc::Rc;

use crate::reaction::ReactionInner;

thread_local! {
    static STACK: RefCell<Vec<Option<Rc<ReactionInner>>>> = const { RefCell::new(Vec::new()) };
}

/// Guard for one pushed frame. Pops it on drop, also during unwinding.
pub(crate) struct Frame {
    _private: (),
}

impl Drop for Frame {
    fn drop(&mut self) {
        STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

pub(crate) fn enter(derivation: Option<Rc<ReactionInner>>) -> Frame {
    STACK.with(|stack| stack.borrow_mut().push(derivation));
    Frame { _private: () }
}

/// Derivation on top of the stack, if tracking is active.
pub(crate) fn current() -> Option<Rc<ReactionInner>> {
    STACK.with(|stack| stack.borrow().last().cloned().flatten())
}

/// Whether an observation reported right now would be recorded.
#[must_use]
pub fn is_tracking() -> bool {
    STACK.with(|stack| matches!(stack.borrow().last(), Some(Some(_))))
}

/// Run `f` without recording any observation it reports.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _frame = enter(None);
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_tracking_at_top_level() {
        assert!(!is_tracking());
        assert!(current().is_none());
    }

    #[test]
    fn untracked_pushes_and_pops() {
        let depth_before = STACK.with(|s| s.borrow().len());
        let inside = untracked(|| STACK.with(|s| s.borrow().len()));
        assert_eq!(inside, depth_before + 1);
        assert_eq!(STACK.with(|s| s.borrow().len()), depth_before);
    }

    #[test]
    fn untracked_returns_value() {
        assert_eq!(untracked(|| 7 * 6), 42);
    }
}
