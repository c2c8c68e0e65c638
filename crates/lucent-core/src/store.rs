#![forbid(unsafe_code)]

//! Tracking-state store.
//!
//! Side table associating every raw target with its wrapper and with the
//! tracking tokens of its properties, plus the inverse wrapper→raw relation
//! and a small pool of idle tokens.
//!
//! # Design
//!
//! The store is thread-local and lives behind a `RefCell`. Every function
//! here takes one short borrow and never calls out (no token notification,
//! no user code) while holding it, so handlers can re-enter the store
//! freely, including from reactions triggered by a notification.
//!
//! Entries are keyed by target address and keep a `Weak` back-reference to
//! their owner. A `Weak` keeps the allocation reserved, so an address can
//! not be reused while its entry exists.
//!
//! An entry holds its wrapper strongly, so a wrapper keeps its identity for
//! as long as anything else can reach its target. An entry is dead once its
//! owner has died, or once the owner is held only by its own wrapper and the
//! wrapper only by the entry. Dead entries are treated as absent and
//! removed by the next sweep.
//!
//! # Invariants
//!
//! 1. A target has at most one wrapper; `unwrap(wrapper)` is the target and
//!    `get_wrapper(target)` is the wrapper.
//! 2. The store never keeps a target alive, and keeps a wrapper alive only
//!    while its target is reachable from outside the store.
//! 3. A token is never both stored for a `(target, key)` and pooled.
//! 4. Pooled tokens had no observers when pooled.
//!
//! # Failure Modes
//!
//! - A sweep runs when the entry count reaches a threshold that doubles
//!   after each sweep, so dead entries linger until then. Lookups ignore
//!   them.
//! - A target reachable only through a reference cycle that passes through
//!   its own wrapper is never collected.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use lucent_reactive::Atom;
use serde::Serialize;
use smallvec::SmallVec;

use crate::config;
use crate::key::PropertyKey;
use crate::observable::{Observable, Target, WeakObservable, WeakTarget};
use crate::value::Value;

/// Key of a tracking token within one target.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum TokenKey {
    /// Structural changes: key insertion/removal, length, reordering.
    All,
    Prop(PropertyKey),
}

impl TokenKey {
    #[must_use]
    pub fn length() -> Self {
        Self::Prop(PropertyKey::length())
    }
}

impl From<PropertyKey> for TokenKey {
    fn from(key: PropertyKey) -> Self {
        Self::Prop(key)
    }
}

impl fmt::Debug for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("<all>"),
            Self::Prop(key) => write!(f, "{key:?}"),
        }
    }
}

/// Tokens fired by one change; rarely more than two.
pub type TokenList = SmallVec<[Atom; 2]>;

/// Store diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Entries whose owner is still alive.
    pub entries: usize,
    /// Entries with a live wrapper.
    pub wrappers: usize,
    /// Tokens stored across all live entries.
    pub stored_tokens: usize,
    pub pooled_tokens: usize,
    pub tokens_minted: u64,
    pub tokens_reused: u64,
    pub sweeps: u64,
}

struct Entry {
    owner: WeakTarget,
    wrapper: Option<Observable>,
    tokens: AHashMap<TokenKey, Atom>,
}

impl Entry {
    fn new(owner: WeakTarget) -> Self {
        Self {
            owner,
            wrapper: None,
            tokens: AHashMap::new(),
        }
    }

    fn is_live(&self) -> bool {
        match &self.wrapper {
            None => self.owner.strong_count() > 0,
            Some(wrapper) => wrapper.strong_count() > 1 || self.owner.strong_count() > 1,
        }
    }
}

#[derive(Default)]
struct TrackingStore {
    entries: AHashMap<usize, Entry>,
    /// Wrapper address → wrapper.
    wrappers: AHashMap<usize, WeakObservable>,
    pool: Vec<Atom>,
    next_sweep: Option<usize>,
    tokens_minted: u64,
    tokens_reused: u64,
    sweeps: u64,
}

impl TrackingStore {
    fn entry(&self, target: &Target) -> Option<&Entry> {
        self.entries
            .get(&target.addr())
            .filter(|entry| entry.is_live())
    }

    fn entry_mut(&mut self, target: &Target) -> &mut Entry {
        let entry = self
            .entries
            .entry(target.addr())
            .or_insert_with(|| Entry::new(target.downgrade()));
        if entry.owner.strong_count() == 0 {
            *entry = Entry::new(target.downgrade());
        }
        entry
    }

    fn sweep_due(&mut self) -> bool {
        let threshold = *self
            .next_sweep
            .get_or_insert_with(|| config::with_config(|c| c.sweep_threshold));
        self.entries.len() >= threshold
    }

    /// Detach dead entries. The caller drops them after releasing the
    /// borrow.
    fn collect(&mut self) -> Vec<Entry> {
        let dead: Vec<usize> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_live())
            .map(|(addr, _)| *addr)
            .collect();
        let mut garbage = Vec::with_capacity(dead.len());
        for addr in dead {
            if let Some(entry) = self.entries.remove(&addr) {
                if let Some(wrapper) = &entry.wrapper {
                    self.wrappers.remove(&wrapper.addr());
                }
                garbage.push(entry);
            }
        }
        self.wrappers.retain(|_, wrapper| wrapper.is_alive());
        garbage
    }

    fn finish_sweep(&mut self, removed: usize) {
        let floor = config::with_config(|c| c.sweep_threshold);
        self.next_sweep = Some((self.entries.len() * 2).max(floor));
        self.sweeps += 1;
        tracing::debug!(
            message = "store.sweep",
            removed,
            live = self.entries.len(),
            next_sweep = ?self.next_sweep,
        );
    }
}

thread_local! {
    static STORE: RefCell<TrackingStore> = RefCell::new(TrackingStore::default());
}

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(0);

fn with_store<R>(f: impl FnOnce(&mut TrackingStore) -> R) -> R {
    STORE.with(|store| f(&mut store.borrow_mut()))
}

/// Whether any state (wrapper or tokens) exists for `target`.
#[must_use]
pub fn has_state(target: &Target) -> bool {
    with_store(|store| store.entry(target).is_some())
}

/// Record `wrapper` as the wrapper of `target`.
///
/// A different wrapper already recorded for `target` is replaced.
pub fn set_wrapper(target: &Target, wrapper: &Observable) {
    maybe_sweep();
    let replaced = with_store(|store| {
        let entry = store.entry_mut(target);
        let replaced = entry
            .wrapper
            .replace(wrapper.clone())
            .filter(|previous| !previous.ptr_eq(wrapper));
        if let Some(previous) = &replaced {
            store.wrappers.remove(&previous.addr());
        }
        store.wrappers.insert(wrapper.addr(), wrapper.downgrade());
        replaced
    });
    if let Some(previous) = replaced {
        tracing::debug!(
            message = "store.wrapper_replaced",
            class = %target.class(),
            previous = ?previous,
        );
    }
}

/// The wrapper of `target`, if any.
#[must_use]
pub fn get_wrapper(target: &Target) -> Option<Observable> {
    with_store(|store| store.entry(target).and_then(|entry| entry.wrapper.clone()))
}

/// Whether `value` is a wrapper registered in this store.
#[must_use]
pub fn is_wrapped(value: &Value) -> bool {
    let Value::Observable(observable) = value else {
        return false;
    };
    with_store(|store| {
        store
            .wrappers
            .get(&observable.addr())
            .is_some_and(|wrapper| wrapper.points_to(observable))
    })
}

/// The raw value behind `value` if it is a wrapper, else `value` itself.
#[must_use]
pub fn unwrap(value: &Value) -> Value {
    match value {
        Value::Observable(observable) => observable.raw(),
        other => other.clone(),
    }
}

/// Associate `token` with `(target, key)`.
pub fn set_token(target: &Target, key: TokenKey, token: Atom) {
    maybe_sweep();
    with_store(|store| {
        store.entry_mut(target).tokens.insert(key, token);
    });
}

#[must_use]
pub fn get_token(target: &Target, key: &TokenKey) -> Option<Atom> {
    with_store(|store| {
        store
            .entry(target)
            .and_then(|entry| entry.tokens.get(key).cloned())
    })
}

/// Tokens to fire when `key` of `target` changes: `All` first (unless `key`
/// is `All`), then the exact key.
#[must_use]
pub fn tokens_to_notify_on_change(target: &Target, key: &TokenKey) -> TokenList {
    with_store(|store| {
        let mut tokens = TokenList::new();
        let Some(entry) = store.entry(target) else {
            return tokens;
        };
        if *key != TokenKey::All {
            tokens.extend(entry.tokens.get(&TokenKey::All).cloned());
        }
        tokens.extend(entry.tokens.get(key).cloned());
        tokens
    })
}

/// Offer an idle token for reuse.
///
/// Tokens that currently have observers, and tokens beyond the configured
/// pool capacity, are dropped instead.
pub fn pool_return(token: Atom) {
    if token.is_being_observed() {
        return;
    }
    let capacity = config::with_config(|c| c.token_pool_capacity);
    with_store(|store| {
        if store.pool.len() < capacity {
            store.pool.push(token);
        }
    });
}

/// Take the most recently pooled token.
#[must_use]
pub fn pool_take() -> Option<Atom> {
    with_store(|store| {
        let token = store.pool.pop();
        if token.is_some() {
            store.tokens_reused += 1;
        }
        token
    })
}

/// Create a fresh token labelled `"{prefix}@{id}"`.
#[must_use]
pub fn mint_token() -> Atom {
    let id = NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed);
    let label = config::with_config(|c| format!("{}@{id}", c.label_prefix));
    with_store(|store| store.tokens_minted += 1);
    Atom::new(label)
}

/// The stored token for `(target, key)`, else a pooled one, else a new one.
///
/// The flag is `true` when the token came from the store.
#[must_use]
pub fn get_or_create_token(target: &Target, key: &TokenKey) -> (Atom, bool) {
    match get_token(target, key) {
        Some(token) => (token, true),
        None => (pool_take().unwrap_or_else(mint_token), false),
    }
}

fn maybe_sweep() {
    if with_store(TrackingStore::sweep_due) {
        sweep();
    }
}

/// Remove dead entries. Returns how many were removed.
///
/// Repeats until nothing more dies, since releasing one entry's wrapper can
/// release the last outside reference to a nested target.
pub fn sweep() -> usize {
    let mut removed = 0;
    loop {
        let garbage = with_store(TrackingStore::collect);
        if garbage.is_empty() {
            break;
        }
        removed += garbage.len();
        drop(garbage);
    }
    with_store(|store| store.finish_sweep(removed));
    removed
}

#[must_use]
pub fn stats() -> StoreStats {
    with_store(|store| {
        let live = store.entries.values().filter(|entry| entry.is_live());
        let (entries, wrappers, stored_tokens) =
            live.fold((0, 0, 0), |(entries, wrappers, tokens), entry| {
                (
                    entries + 1,
                    wrappers + usize::from(entry.wrapper.is_some()),
                    tokens + entry.tokens.len(),
                )
            });
        StoreStats {
            entries,
            wrappers,
            stored_tokens,
            pooled_tokens: store.pool.len(),
            tokens_minted: store.tokens_minted,
            tokens_reused: store.tokens_reused,
            sweeps: store.sweeps,
        }
    })
}

/// Drop all state of the current thread.
pub fn reset() {
    let old = with_store(std::mem::take);
    drop(old);
}
