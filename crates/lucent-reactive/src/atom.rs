#![forbid(unsafe_code)]

//! Tracking tokens.
//!
//! An [`Atom`] stands for "something a derivation may depend on". It owns no
//! value; whoever owns the value calls [`Atom::report_observed`] on reads and
//! [`Atom::report_changed`] on mutations.
//!
//! # Invariants
//!
//! 1. An atom never keeps a derivation alive: observers are `Weak`.
//! 2. A derivation appears at most once in an atom's observer list.
//! 3. `report_changed()` on an atom without live observers is a no-op.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::batch::{self, BatchScope};
use crate::context;
use crate::reaction::ReactionInner;

static NEXT_ATOM_ID: AtomicU64 = AtomicU64::new(1);

struct AtomInner {
    id: u64,
    label: String,
    observers: RefCell<Vec<Weak<ReactionInner>>>,
}

/// A tracking token.
///
/// Cloning an `Atom` creates a new handle to the **same** token.
#[derive(Clone)]
pub struct Atom {
    inner: Rc<AtomInner>,
}

impl Atom {
    /// Create a token with a human-readable debug label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(AtomInner {
                id: NEXT_ATOM_ID.fetch_add(1, Ordering::Relaxed),
                label: label.into(),
                observers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Process-unique id of this token.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Debug label given at construction.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Register the derivation currently being tracked, if any, as an
    /// observer of this atom.
    ///
    /// Returns whether such a derivation existed.
    pub fn report_observed(&self) -> bool {
        match context::current() {
            Some(derivation) => {
                derivation.track(self);
                true
            }
            None => false,
        }
    }

    /// Schedule every live observer.
    ///
    /// Outside of a batch the observers run before this returns. Inside a
    /// batch they run once, when the outermost scope exits.
    pub fn report_changed(&self) {
        let observers = self.live_observers();
        if observers.is_empty() {
            return;
        }
        let _scope = BatchScope::new();
        for observer in observers {
            batch::schedule(observer);
        }
    }

    /// Whether at least one live derivation observes this atom.
    #[must_use]
    pub fn is_being_observed(&self) -> bool {
        self.inner
            .observers
            .borrow()
            .iter()
            .any(|weak| weak.upgrade().is_some_and(|r| !r.is_disposed()))
    }

    /// Number of live observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.live_observers().len()
    }

    /// Whether both handles refer to the same token.
    #[must_use]
    pub fn ptr_eq(&self, other: &Atom) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn add_observer(&self, derivation: &Rc<ReactionInner>) {
        let mut observers = self.inner.observers.borrow_mut();
        let target = Rc::as_ptr(derivation);
        if !observers.iter().any(|weak| weak.as_ptr() == target) {
            observers.push(Rc::downgrade(derivation));
        }
    }

    pub(crate) fn remove_observer(&self, derivation: &ReactionInner) {
        let target: *const ReactionInner = derivation;
        self.inner
            .observers
            .borrow_mut()
            .retain(|weak| weak.as_ptr() != target && weak.strong_count() > 0);
    }

    /// Upgrade observers, pruning dead and disposed ones.
    fn live_observers(&self) -> Vec<Rc<ReactionInner>> {
        let mut observers = self.inner.observers.borrow_mut();
        let mut live = Vec::with_capacity(observers.len());
        observers.retain(|weak| match weak.upgrade() {
            Some(strong) if !strong.is_disposed() => {
                live.push(strong);
                true
            }
            _ => false,
        });
        live
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("observers", &self.inner.observers.borrow().len())
            .finish()
    }
}
