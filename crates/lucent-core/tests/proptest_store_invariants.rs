#![forbid(unsafe_code)]

//! Property-based invariants of wrapping and notification.
//!
//! 1. Wrapping is idempotent and `raw` inverts it.
//! 2. Writing the value a key already holds fires nothing.
//! 3. Writing a different value fires the key's observers exactly once.
//! 4. Any mutating builtin call fires a structural observer exactly once,
//!    whatever the array length.
//! 5. Untracked reads never grow the store.

use std::cell::Cell;
use std::rc::Rc;

use lucent_core::store;
use lucent_core::{Object, Value, raw, wrap};
use lucent_reactive::autorun;
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,6}".prop_map(String::from),
        (0u32..16).prop_map(|i| i.to_string()),
    ]
}

fn mutation_strategy() -> impl Strategy<Value = (&'static str, Vec<i32>)> {
    prop_oneof![
        Just(("pop", vec![])),
        Just(("shift", vec![])),
        Just(("reverse", vec![])),
        Just(("sort", vec![])),
        proptest::collection::vec(any::<i32>(), 1..4).prop_map(|v| ("push", v)),
        proptest::collection::vec(any::<i32>(), 1..4).prop_map(|v| ("unshift", v)),
        (0i32..8, 0i32..4).prop_map(|(start, count)| ("splice", vec![start, count])),
    ]
}

fn counter() -> Rc<Cell<u32>> {
    Rc::new(Cell::new(0))
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Idempotent wrapping
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn wrap_is_idempotent(entries in proptest::collection::vec((key_strategy(), any::<i32>()), 0..8)) {
        let object = Value::object(entries);
        let wrapped = wrap(&object);
        prop_assert_eq!(wrap(&wrapped), wrapped.clone());
        prop_assert_eq!(wrap(&raw(&wrapped)), wrapped.clone());
        prop_assert_eq!(raw(&wrapped), object);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2–3. Equal writes are silent, different writes notify once
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn equal_write_fires_nothing(key in key_strategy(), value in any::<i32>()) {
        let proxy = wrap(&Value::object([(key.clone(), value)]));
        let runs = counter();
        let (p, r, k) = (proxy.clone(), Rc::clone(&runs), key.clone());
        let _d = autorun(move || {
            let _ = p.get(k.as_str());
            let _ = p.own_keys();
            r.set(r.get() + 1);
        });

        proxy.set(key.as_str(), value).expect("write");
        prop_assert_eq!(runs.get(), 1);
    }

    #[test]
    fn different_write_fires_once(key in key_strategy(), before in any::<i32>(), after in any::<i32>()) {
        prop_assume!(before != after);
        let proxy = wrap(&Value::object([(key.clone(), before)]));
        let runs = counter();
        let (p, r, k) = (proxy.clone(), Rc::clone(&runs), key.clone());
        let _d = autorun(move || {
            let _ = p.get(k.as_str());
            let _ = p.own_keys();
            r.set(r.get() + 1);
        });

        proxy.set(key.as_str(), after).expect("write");
        prop_assert_eq!(runs.get(), 2);
        prop_assert_eq!(proxy.get(key.as_str()).expect("read"), Value::from(after));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Sequence mutation coalescing
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn mutating_builtin_fires_structure_once(
        elements in proptest::collection::vec(any::<i32>(), 0..64),
        (method, args) in mutation_strategy(),
    ) {
        let proxy = wrap(&Value::Object(Object::array(elements)));
        let runs = counter();
        let (p, r) = (proxy.clone(), Rc::clone(&runs));
        let _d = autorun(move || {
            let _ = p.own_keys();
            let _ = p.get("length");
            r.set(r.get() + 1);
        });

        let args: Vec<Value> = args.into_iter().map(Value::from).collect();
        proxy.invoke(method, &args).expect("mutation");
        prop_assert_eq!(runs.get(), 2);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Untracked reads do not accumulate state
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn untracked_reads_keep_store_bounded(keys in proptest::collection::vec(key_strategy(), 1..64)) {
        store::reset();
        let proxy = wrap(&Value::object([("seed", 1)]));
        for key in &keys {
            let _ = proxy.get(key.as_str());
            let _ = proxy.has(key.as_str());
        }
        let stats = store::stats();
        prop_assert_eq!(stats.stored_tokens, 0);
        prop_assert!(stats.tokens_minted <= 1);
        prop_assert!(stats.pooled_tokens <= 1);
    }
}
