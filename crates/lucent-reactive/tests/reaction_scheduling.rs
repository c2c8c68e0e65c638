#![forbid(unsafe_code)]

//! Scheduling invariants for atoms, reactions, and batches.
//!
//! 1. Any number of changes inside one batch deliver one run per reaction.
//! 2. Reactions run in first-scheduled order.
//! 3. A reaction observing several changed atoms runs once per batch.
//! 4. Changes outside a batch deliver synchronously.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lucent_reactive::{Atom, autorun, batch, reaction, run_in_action};
use proptest::prelude::*;

fn counter() -> Rc<Cell<u32>> {
    Rc::new(Cell::new(0))
}

#[test]
fn synchronous_delivery_outside_batch() {
    let atom = Atom::new("sync");
    let runs = counter();
    let (a, r) = (atom.clone(), Rc::clone(&runs));
    let _d = autorun(move || {
        a.report_observed();
        r.set(r.get() + 1);
    });

    for expected in 2..6 {
        atom.report_changed();
        assert_eq!(runs.get(), expected);
    }
}

#[test]
fn reactions_run_in_scheduling_order() {
    let first = Atom::new("first");
    let second = Atom::new("second");
    let log = Rc::new(RefCell::new(Vec::new()));

    let (a, l) = (second.clone(), Rc::clone(&log));
    let _d2 = autorun(move || {
        a.report_observed();
        l.borrow_mut().push("second");
    });
    let (a, l) = (first.clone(), Rc::clone(&log));
    let _d1 = autorun(move || {
        a.report_observed();
        l.borrow_mut().push("first");
    });
    log.borrow_mut().clear();

    batch(|| {
        first.report_changed();
        second.report_changed();
    });
    assert_eq!(*log.borrow(), vec!["first", "second"]);
}

#[test]
fn one_run_for_many_atoms_in_one_batch() {
    let atoms: Vec<Atom> = (0..5).map(|i| Atom::new(format!("atom{i}"))).collect();
    let runs = counter();
    let (watched, r) = (atoms.clone(), Rc::clone(&runs));
    let _d = autorun(move || {
        for atom in &watched {
            atom.report_observed();
        }
        r.set(r.get() + 1);
    });

    run_in_action(|| {
        for atom in &atoms {
            atom.report_changed();
        }
    });
    assert_eq!(runs.get(), 2);
}

#[test]
fn reaction_sees_final_value_of_batch() {
    let atom = Atom::new("value");
    let value = Rc::new(Cell::new(0));
    let seen = Rc::new(RefCell::new(Vec::new()));

    let (a, v, s) = (atom.clone(), Rc::clone(&value), Rc::clone(&seen));
    let _d = reaction(
        move || {
            a.report_observed();
            v.get()
        },
        move |val| s.borrow_mut().push(*val),
    );

    batch(|| {
        for i in 1..=10 {
            value.set(i);
            atom.report_changed();
        }
    });
    assert_eq!(*seen.borrow(), vec![10]);
}

#[test]
fn writes_from_a_reaction_reach_other_reactions() {
    let source = Atom::new("source");
    let derived = Atom::new("derived");
    let derived_runs = counter();

    let (s, d) = (source.clone(), derived.clone());
    let _forward = autorun(move || {
        s.report_observed();
        d.report_changed();
    });
    let (d, r) = (derived.clone(), Rc::clone(&derived_runs));
    let _sink = autorun(move || {
        d.report_observed();
        r.set(r.get() + 1);
    });
    assert_eq!(derived_runs.get(), 1);

    source.report_changed();
    assert_eq!(derived_runs.get(), 2);
}

proptest! {
    #[test]
    fn batched_changes_coalesce(changes in 1usize..64, observers in 1usize..6) {
        let atom = Atom::new("coalesce");
        let runs: Vec<Rc<Cell<u32>>> = (0..observers).map(|_| counter()).collect();
        let _disposers: Vec<_> = runs
            .iter()
            .map(|r| {
                let (a, r) = (atom.clone(), Rc::clone(r));
                autorun(move || {
                    a.report_observed();
                    r.set(r.get() + 1);
                })
            })
            .collect();

        batch(|| {
            for _ in 0..changes {
                atom.report_changed();
            }
        });

        for r in &runs {
            prop_assert_eq!(r.get(), 2);
        }
    }

    #[test]
    fn unbatched_changes_deliver_each_time(changes in 1u32..32) {
        let atom = Atom::new("each");
        let runs = counter();
        let (a, r) = (atom.clone(), Rc::clone(&runs));
        let _d = autorun(move || {
            a.report_observed();
            r.set(r.get() + 1);
        });
        for _ in 0..changes {
            atom.report_changed();
        }
        prop_assert_eq!(runs.get(), changes + 1);
    }
}
