#![forbid(unsafe_code)]

//! Derivations that re-run when their observed atoms change.
//!
//! # Design
//!
//! A reaction wraps a body closure in shared, reference-counted storage.
//! Every run first detaches the reaction from the atoms it observed last
//! time, then pushes it onto the tracking context so that each
//! [`Atom::report_observed`] made by the body re-attaches it. Dependencies
//! are therefore always exactly the atoms observed during the latest run.
//!
//! # Invariants
//!
//! 1. The body of a live reaction runs at most once per flush wave.
//! 2. A disposed reaction never runs again and observes nothing.
//! 3. `reaction()` effects run untracked and only when the tracked value
//!    differs from the previous one.
//!
//! # Failure Modes
//!
//! - **Body panics**: the tracking frame is popped during unwinding; the
//!   reaction keeps the dependencies it collected before the panic.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::atom::Atom;
use crate::batch;
use crate::context::{self, untracked};

static NEXT_REACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Shared interior of a reaction.
pub(crate) struct ReactionInner {
    id: u64,
    name: String,
    body: RefCell<Box<dyn FnMut()>>,
    /// Atoms observed during the latest run.
    deps: RefCell<Vec<Atom>>,
    scheduled: Cell<bool>,
    disposed: Cell<bool>,
    runs: Cell<u64>,
}

impl ReactionInner {
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    pub(crate) fn is_scheduled(&self) -> bool {
        self.scheduled.get()
    }

    pub(crate) fn set_scheduled(&self, scheduled: bool) {
        self.scheduled.set(scheduled);
    }

    /// Record `atom` as a dependency of the current run.
    pub(crate) fn track(self: &Rc<Self>, atom: &Atom) {
        {
            let mut deps = self.deps.borrow_mut();
            if deps.iter().any(|dep| dep.ptr_eq(atom)) {
                return;
            }
            deps.push(atom.clone());
        }
        atom.add_observer(self);
    }

    pub(crate) fn run(self: &Rc<Self>) {
        if self.disposed.get() {
            return;
        }
        self.clear_dependencies();
        let _frame = context::enter(Some(Rc::clone(self)));
        match self.body.try_borrow_mut() {
            Ok(mut body) => {
                (*body)();
                self.runs.set(self.runs.get() + 1);
            }
            Err(_) => {
                tracing::warn!(message = "reactive.reentrant_run", reaction = %self.name);
            }
        }
    }

    fn clear_dependencies(&self) {
        let previous = std::mem::take(&mut *self.deps.borrow_mut());
        for atom in &previous {
            atom.remove_observer(self);
        }
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.clear_dependencies();
    }
}

/// RAII guard for a running derivation.
///
/// Dropping the guard (or calling [`dispose()`](Disposer::dispose)) detaches
/// the derivation from everything it observes.
#[must_use = "the reaction is disposed as soon as the guard is dropped"]
pub struct Disposer {
    inner: Rc<ReactionInner>,
}

impl Disposer {
    /// Detach the derivation now.
    pub fn dispose(self) {
        drop(self);
    }

    /// Debug name, e.g. `Autorun@3`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of completed runs.
    #[must_use]
    pub fn run_count(&self) -> u64 {
        self.inner.runs.get()
    }

    /// Number of atoms observed during the latest run.
    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("runs", &self.inner.runs.get())
            .field("deps", &self.inner.deps.borrow().len())
            .finish()
    }
}

fn spawn(kind: &str, body: Box<dyn FnMut()>) -> Disposer {
    let id = NEXT_REACTION_ID.fetch_add(1, Ordering::Relaxed);
    let inner = Rc::new(ReactionInner {
        id,
        name: format!("{kind}@{id}"),
        body: RefCell::new(body),
        deps: RefCell::new(Vec::new()),
        scheduled: Cell::new(false),
        disposed: Cell::new(false),
        runs: Cell::new(0),
    });
    batch::schedule(Rc::clone(&inner));
    batch::flush();
    Disposer { inner }
}

/// Run `body` now and again whenever an atom it observed changes.
///
/// Inside a batch the first run is deferred to the end of the batch.
pub fn autorun(body: impl FnMut() + 'static) -> Disposer {
    spawn("Autorun", Box::new(body))
}

/// Track `expr` and call `effect` with its new value whenever it changes.
///
/// `effect` is not called for the initial value, nor when a re-run yields a
/// value equal to the previous one.
pub fn reaction<T, E, F>(mut expr: E, mut effect: F) -> Disposer
where
    T: PartialEq + 'static,
    E: FnMut() -> T + 'static,
    F: FnMut(&T) + 'static,
{
    let mut previous: Option<T> = None;
    spawn(
        "Reaction",
        Box::new(move || {
            let next = expr();
            if previous.as_ref().is_some_and(|prev| *prev != next) {
                untracked(|| effect(&next));
            }
            previous = Some(next);
        }),
    )
}

/// Holds disposers for a logical scope and releases them together.
///
/// # Invariants
///
/// 1. Disposers are released in reverse registration order on drop.
/// 2. `clear()` releases everything immediately; the scope is reusable.
#[derive(Default)]
pub struct ReactionScope {
    disposers: Vec<Disposer>,
}

impl ReactionScope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `disposer` alive for the lifetime of this scope.
    pub fn hold(&mut self, disposer: Disposer) -> &mut Self {
        self.disposers.push(disposer);
        self
    }

    /// Start an autorun owned by this scope.
    pub fn autorun(&mut self, body: impl FnMut() + 'static) -> &mut Self {
        self.hold(autorun(body))
    }

    /// Number of held disposers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.disposers.len()
    }

    /// Whether the scope holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.disposers.is_empty()
    }

    /// Release every held disposer now.
    pub fn clear(&mut self) {
        while let Some(disposer) = self.disposers.pop() {
            drop(disposer);
        }
    }
}

impl Drop for ReactionScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for ReactionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionScope")
            .field("disposers", &self.disposers.len())
            .finish()
    }
}
