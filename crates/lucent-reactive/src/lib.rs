#![forbid(unsafe_code)]

//! Dependency tracking for Lucent.
//!
//! This crate provides the change-tracking primitive that observable
//! wrappers report into:
//!
//! - [`Atom`]: A tracking token. Reading code calls
//!   [`report_observed()`](Atom::report_observed), mutating code calls
//!   [`report_changed()`](Atom::report_changed).
//! - [`autorun`] / [`reaction`]: Derivations that re-run when any atom they
//!   observed during their last run changes. Both return a [`Disposer`], an
//!   RAII guard that detaches the derivation on drop.
//! - [`BatchScope`], [`batch`], [`run_in_action`], [`action`]: Defer reaction
//!   delivery until the outermost scope exits.
//! - [`untracked`]: Run code without registering observations.
//!
//! # Architecture
//!
//! Everything is single-threaded. The tracking context is a thread-local
//! stack of running derivations; an atom that reports an observation
//! attaches itself to the top of that stack. Atoms hold their observers as
//! `Weak` references which are pruned lazily during notification.
//!
//! # Invariants
//!
//! 1. `report_observed()` returns `true` iff it was called while a derivation
//!    is being tracked (and not inside [`untracked`]).
//! 2. A derivation scheduled several times inside one batch runs once, when
//!    the outermost scope exits.
//! 3. Reactions run in the order they were first scheduled within a wave.
//! 4. Dropping a [`Disposer`] detaches the derivation from every atom before
//!    the next notification cycle.

pub mod atom;
pub mod batch;
pub mod context;
pub mod reaction;

pub use atom::Atom;
pub use batch::{BatchScope, MAX_REACTION_ITERATIONS, action, batch, is_batching, run_in_action};
pub use context::{is_tracking, untracked};
pub use reaction::{Disposer, ReactionScope, autorun, reaction};
