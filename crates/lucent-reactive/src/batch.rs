#![forbid(unsafe_code)]

//! Deferred reaction delivery.
//!
//! A [`BatchScope`] bumps a thread-local depth counter. Atoms changed while
//! the depth is non-zero only *schedule* their observers; the scheduled
//! reactions run when the outermost scope is dropped. Nested scopes flatten:
//! only the outermost exit flushes.
//!
//! # Failure Modes
//!
//! - **Reaction cycle**: a reaction that keeps invalidating itself (or a
//!   ring of reactions that invalidate each other) is cut off after
//!   [`MAX_REACTION_ITERATIONS`] waves. The remaining queue is dropped and a
//!   `reactive.cycle_limit` error event is emitted.
//! - **Reaction panics**: the flushing flag is reset during unwinding; the
//!   reactions still queued stay queued and run on the next flush.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::context::untracked;
use crate::reaction::ReactionInner;

/// Upper bound on scheduling waves within one flush.
pub const MAX_REACTION_ITERATIONS: usize = 100;

struct BatchState {
    depth: Cell<u32>,
    flushing: Cell<bool>,
    pending: RefCell<Vec<Rc<ReactionInner>>>,
}

thread_local! {
    static STATE: BatchState = const {
        BatchState {
            depth: Cell::new(0),
            flushing: Cell::new(false),
            pending: RefCell::new(Vec::new()),
        }
    };
}

/// RAII guard that defers reaction delivery until it is dropped.
///
/// ```
/// use lucent_reactive::{Atom, BatchScope, autorun};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let atom = Atom::new("count");
/// let runs = Rc::new(Cell::new(0));
/// let (a, r) = (atom.clone(), Rc::clone(&runs));
/// let _d = autorun(move || {
///     a.report_observed();
///     r.set(r.get() + 1);
/// });
///
/// {
///     let _scope = BatchScope::new();
///     atom.report_changed();
///     atom.report_changed();
///     assert_eq!(runs.get(), 1);
/// }
/// assert_eq!(runs.get(), 2);
/// ```
#[must_use = "the batch ends as soon as the scope is dropped"]
pub struct BatchScope {
    _private: (),
}

impl BatchScope {
    /// Open a batch.
    pub fn new() -> Self {
        STATE.with(|state| state.depth.set(state.depth.get() + 1));
        Self { _private: () }
    }
}

impl Default for BatchScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        let outermost = STATE.with(|state| {
            let depth = state.depth.get().saturating_sub(1);
            state.depth.set(depth);
            depth == 0
        });
        if outermost {
            flush();
        }
    }
}

impl std::fmt::Debug for BatchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScope")
            .field("depth", &STATE.with(|state| state.depth.get()))
            .finish()
    }
}

/// Whether a batch is currently open on this thread.
#[must_use]
pub fn is_batching() -> bool {
    STATE.with(|state| state.depth.get() > 0)
}

/// Run `f` inside a batch.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    let _scope = BatchScope::new();
    f()
}

/// Run `f` as an action: batched and untracked.
///
/// Reads inside an action never subscribe the surrounding derivation, and
/// any number of changes inside it deliver at most one run per reaction.
pub fn run_in_action<R>(f: impl FnOnce() -> R) -> R {
    let _scope = BatchScope::new();
    untracked(f)
}

/// Wrap `f` so that every call runs as an action.
pub fn action<R>(f: impl Fn() -> R) -> impl Fn() -> R {
    move || run_in_action(&f)
}

pub(crate) fn schedule(reaction: Rc<ReactionInner>) {
    if reaction.is_disposed() || reaction.is_scheduled() {
        return;
    }
    reaction.set_scheduled(true);
    STATE.with(|state| state.pending.borrow_mut().push(reaction));
}

/// Resets the flushing flag, also during unwinding.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        STATE.with(|state| state.flushing.set(false));
    }
}

/// Run scheduled reactions until the queue settles.
pub(crate) fn flush() {
    let idle = STATE.with(|state| state.depth.get() == 0 && !state.flushing.get());
    if !idle {
        return;
    }
    STATE.with(|state| state.flushing.set(true));
    let _guard = FlushGuard;

    let mut waves = 0usize;
    loop {
        let wave = STATE.with(|state| std::mem::take(&mut *state.pending.borrow_mut()));
        if wave.is_empty() {
            break;
        }
        waves += 1;
        if waves > MAX_REACTION_ITERATIONS {
            tracing::error!(
                message = "reactive.cycle_limit",
                waves = MAX_REACTION_ITERATIONS,
                dropped = wave.len(),
            );
            for reaction in wave {
                reaction.set_scheduled(false);
            }
            break;
        }
        tracing::trace!(message = "reactive.flush", wave = waves, reactions = wave.len());
        for reaction in wave {
            reaction.set_scheduled(false);
            reaction.run();
        }
    }
}
