#![forbid(unsafe_code)]

//! Tracked plain objects: reads, writes, deletes, existence checks, key
//! listing, actions, and lazy wrapping of nested objects.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lucent_core::{Error, Function, Object, PropertyKey, Symbol, Value, is_observable, raw, wrap};
use lucent_reactive::{action, autorun, reaction};

type Calls<T> = Rc<RefCell<Vec<T>>>;

fn calls<T>() -> Calls<T> {
    Rc::new(RefCell::new(Vec::new()))
}

fn runs() -> Rc<Cell<u32>> {
    Rc::new(Cell::new(0))
}

fn fixture() -> Value {
    wrap(&Value::object([("test", 7)]))
}

fn read(value: &Value, key: &str) -> Value {
    value.get(key).expect("read")
}

#[test]
fn prop_set_reruns_reaction_and_autorun() {
    let proxy = fixture();
    let seen = calls::<Value>();
    let autoruns = runs();

    let (p, s) = (proxy.clone(), Rc::clone(&seen));
    let _r = reaction(move || read(&p, "test"), move |v| s.borrow_mut().push(v.clone()));
    let (p, a) = (proxy.clone(), Rc::clone(&autoruns));
    let _a = autorun(move || {
        read(&p, "test");
        a.set(a.get() + 1);
    });

    assert!(seen.borrow().is_empty());
    assert_eq!(autoruns.get(), 1);

    proxy.set("test", 10).expect("write");

    assert_eq!(*seen.borrow(), vec![Value::from(10)]);
    assert_eq!(autoruns.get(), 2);
}

#[test]
fn several_writes_in_one_action_notify_once() {
    let proxy = wrap(&Value::object([("test", 7), ("test2", 10)]));
    let seen = calls::<f64>();
    let autoruns = runs();

    let p = proxy.clone();
    let do_action = action(move || {
        p.set("test", 10).expect("write");
        p.set("test2", 20).expect("write");
    });

    let (p, s) = (proxy.clone(), Rc::clone(&seen));
    let _r = reaction(
        move || read(&p, "test").to_number() + read(&p, "test2").to_number(),
        move |v| s.borrow_mut().push(*v),
    );
    let (p, a) = (proxy.clone(), Rc::clone(&autoruns));
    let _a = autorun(move || {
        read(&p, "test");
        a.set(a.get() + 1);
    });

    do_action();

    assert_eq!(*seen.borrow(), vec![30.0]);
    assert_eq!(autoruns.get(), 2);
}

#[test]
fn new_prop_set_notifies_its_observers_only() {
    let proxy = fixture();
    let seen = calls::<Value>();
    let autoruns = runs();

    let (p, s) = (proxy.clone(), Rc::clone(&seen));
    let _r = reaction(move || read(&p, "test2"), move |v| s.borrow_mut().push(v.clone()));
    let (p, a) = (proxy.clone(), Rc::clone(&autoruns));
    let _a = autorun(move || {
        read(&p, "test2");
        a.set(a.get() + 1);
    });

    proxy.set("test", 10).expect("write");
    assert!(seen.borrow().is_empty());
    assert_eq!(autoruns.get(), 1);

    proxy.set("test2", 20).expect("write");
    assert_eq!(*seen.borrow(), vec![Value::from(20)]);
    assert_eq!(autoruns.get(), 2);
}

#[test]
fn unobserved_new_prop_does_not_notify() {
    let proxy = fixture();
    let autoruns = runs();
    let (p, a) = (proxy.clone(), Rc::clone(&autoruns));
    let _a = autorun(move || {
        read(&p, "test");
        a.set(a.get() + 1);
    });

    proxy.set("test2", 10).expect("write");
    assert_eq!(autoruns.get(), 1);
}

#[test]
fn same_value_write_is_silent() {
    let proxy = wrap(&Value::object([("a", 1)]));
    let seen = calls::<Value>();
    let autoruns = runs();

    let (p, a) = (proxy.clone(), Rc::clone(&autoruns));
    let _a = autorun(move || {
        read(&p, "a");
        a.set(a.get() + 1);
    });
    let (p, s) = (proxy.clone(), Rc::clone(&seen));
    let _r = reaction(move || read(&p, "a"), move |v| s.borrow_mut().push(v.clone()));

    proxy.set("a", 1).expect("write");
    assert_eq!(autoruns.get(), 1);

    proxy.set("a", 2).expect("write");
    assert_eq!(autoruns.get(), 2);
    assert_eq!(*seen.borrow(), vec![Value::from(2)]);

    assert!(proxy.delete("a").expect("delete"));
    assert_eq!(autoruns.get(), 3);
    assert_eq!(*seen.borrow(), vec![Value::from(2), Value::Undefined]);
}

#[test]
fn delete_notifies_even_for_undefined_value() {
    let proxy = wrap(&Value::object([("a", Value::Undefined)]));
    let autoruns = runs();
    let (p, a) = (proxy.clone(), Rc::clone(&autoruns));
    let _a = autorun(move || {
        read(&p, "a");
        a.set(a.get() + 1);
    });

    proxy.delete("a").expect("delete");
    assert_eq!(autoruns.get(), 2);
}

#[test]
fn has_is_tracked() {
    let proxy = fixture();
    let seen = calls::<bool>();
    let autoruns = runs();

    let (p, s) = (proxy.clone(), Rc::clone(&seen));
    let _r = reaction(
        move || p.has("test").expect("has"),
        move |v| s.borrow_mut().push(*v),
    );
    let (p, a) = (proxy.clone(), Rc::clone(&autoruns));
    let _a = autorun(move || {
        p.has("test").expect("has");
        a.set(a.get() + 1);
    });

    proxy.set("test", 10).expect("write");
    assert!(seen.borrow().is_empty());
    assert_eq!(autoruns.get(), 2);

    proxy.delete("test").expect("delete");
    assert_eq!(*seen.borrow(), vec![false]);
    assert_eq!(autoruns.get(), 3);
}

#[test]
fn own_keys_is_tracked() {
    let proxy = fixture();
    let seen = calls::<Vec<PropertyKey>>();
    let autoruns = runs();

    let (p, s) = (proxy.clone(), Rc::clone(&seen));
    let _r = reaction(
        move || p.own_keys().expect("keys"),
        move |keys| s.borrow_mut().push(keys.clone()),
    );
    let (p, a) = (proxy.clone(), Rc::clone(&autoruns));
    let _a = autorun(move || {
        p.own_keys().expect("keys");
        a.set(a.get() + 1);
    });

    proxy.set("test2", 100).expect("write");

    assert_eq!(
        *seen.borrow(),
        vec![vec![PropertyKey::from("test"), PropertyKey::from("test2")]]
    );
    assert_eq!(autoruns.get(), 2);
}

#[test]
fn key_listing_observer_reruns_once_per_write() {
    let proxy = fixture();
    let autoruns = runs();
    let (p, a) = (proxy.clone(), Rc::clone(&autoruns));
    let _a = autorun(move || {
        p.own_keys().expect("keys");
        read(&p, "test");
        a.set(a.get() + 1);
    });

    proxy.set("test", 8).expect("write");
    assert_eq!(autoruns.get(), 2);
}

#[test]
fn nested_objects_are_wrapped_lazily() {
    let seen = calls::<Value>();
    let proxy = wrap(&Value::object([
        ("test", Value::from(7)),
        ("test2", Value::object([("prop", 7)])),
    ]));

    assert!(is_observable(&proxy));
    assert!(!is_observable(&read(&proxy, "test2")));

    let (p, s) = (proxy.clone(), Rc::clone(&seen));
    let _r = reaction(
        move || read(&read(&p, "test2"), "prop"),
        move |v| s.borrow_mut().push(v.clone()),
    );

    assert!(is_observable(&read(&proxy, "test2")));
    assert_eq!(read(&proxy, "test2"), read(&proxy, "test2"));

    read(&proxy, "test2").set("prop", 8).expect("write");
    assert_eq!(*seen.borrow(), vec![Value::from(8)]);
}

#[test]
fn untracked_read_of_unwrapped_nested_object_is_raw() {
    let inner = Object::from_entries([("x", 1)]);
    let proxy = wrap(&Value::object([("inner", inner.clone())]));
    assert_eq!(read(&proxy, "inner"), Value::Object(inner));
}

#[test]
fn writes_store_raw_values() {
    let child = wrap(&Value::object([("x", 1)]));
    let parent_raw = Object::new();
    let parent = wrap(&Value::Object(parent_raw.clone()));

    parent.set("child", child.clone()).expect("write");
    assert_eq!(
        parent_raw.get(&PropertyKey::from("child")),
        raw(&child)
    );
    assert_eq!(read(&parent, "child"), child);
}

#[test]
fn methods_run_as_actions() {
    let proxy = wrap(&Value::object([("a", 1), ("b", 2)]));
    proxy
        .set(
            "bump",
            Function::new("bump", |this, _| {
                this.set("a", this.get("a")?.to_number() + 1.0)?;
                this.set("b", this.get("b")?.to_number() + 1.0)?;
                Ok(Value::Undefined)
            }),
        )
        .expect("write");

    let autoruns = runs();
    let (p, a) = (proxy.clone(), Rc::clone(&autoruns));
    let _a = autorun(move || {
        read(&p, "a");
        read(&p, "b");
        a.set(a.get() + 1);
    });

    proxy.invoke("bump", &[]).expect("invoke");
    assert_eq!(autoruns.get(), 2);
    assert_eq!(read(&proxy, "a"), Value::from(2));
    assert_eq!(read(&proxy, "b"), Value::from(3));
}

#[test]
fn method_errors_propagate() {
    let proxy = wrap(&Value::object([("a", 1)]));
    proxy
        .set("fail", Function::new("fail", |_, _| Err(Error::thrown("boom"))))
        .expect("write");
    assert_eq!(proxy.invoke("fail", &[]), Err(Error::thrown("boom")));
}

#[test]
fn reading_a_method_is_not_tracked() {
    let proxy = wrap(&Value::object([("a", 1)]));
    proxy
        .set("f", Function::new("f", |_, _| Ok(Value::Null)))
        .expect("write");

    let autoruns = runs();
    let (p, a) = (proxy.clone(), Rc::clone(&autoruns));
    let _a = autorun(move || {
        let f = read(&p, "f");
        assert!(is_observable(&f));
        a.set(a.get() + 1);
    });

    proxy
        .set("f", Function::new("g", |_, _| Ok(Value::Null)))
        .expect("write");
    assert_eq!(autoruns.get(), 1);
}

#[test]
fn symbol_keys_pass_through_untracked() {
    let tag = Symbol::new("tag");
    let raw_object = Object::new();
    raw_object
        .set(&PropertyKey::from(tag.clone()), Value::from("meta"))
        .expect("write");
    let proxy = wrap(&Value::Object(raw_object));

    let autoruns = runs();
    let (p, a, t) = (proxy.clone(), Rc::clone(&autoruns), tag.clone());
    let _a = autorun(move || {
        assert_eq!(p.get(t.clone()).expect("read"), Value::from("meta"));
        a.set(a.get() + 1);
    });

    proxy.set(tag, "other").expect("write");
    assert_eq!(autoruns.get(), 1);
}

#[test]
fn property_named_all_is_an_ordinary_key() {
    let proxy = wrap(&Value::object([("all", 1), ("other", 1)]));
    let autoruns = runs();
    let (p, a) = (proxy.clone(), Rc::clone(&autoruns));
    let _a = autorun(move || {
        read(&p, "all");
        a.set(a.get() + 1);
    });

    proxy.set("other", 2).expect("write");
    assert_eq!(autoruns.get(), 1);
    proxy.set("all", 2).expect("write");
    assert_eq!(autoruns.get(), 2);
}

#[test]
fn wrapping_is_idempotent() {
    let object = Value::object([("a", 1)]);
    let first = wrap(&object);
    assert_eq!(wrap(&object), first);
    assert_eq!(wrap(&first), first);
    assert_eq!(raw(&first), object);
    assert_eq!(wrap(&raw(&first)), first);
}

#[test]
fn nullish_property_access_fails() {
    let proxy = wrap(&Value::object([("a", Value::Null)]));
    let missing = read(&proxy, "missing");
    assert!(matches!(
        missing.get("x"),
        Err(Error::NotAnObject { operation: "read", .. })
    ));
}
