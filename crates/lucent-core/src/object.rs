#![forbid(unsafe_code)]

//! Raw objects: plain records and arrays.
//!
//! An [`Object`] is a reference-counted, interior-mutable bag of properties
//! with reference identity. Cloning an `Object` yields another handle to the
//! **same** object. The operations here are the untracked, raw ones; tracked
//! access goes through an [`Observable`](crate::Observable).
//!
//! # Shapes
//!
//! - **Record**: named, indexed, and symbol properties.
//! - **Array**: a dense element vector addressed by [`PropertyKey::Index`],
//!   a `length` pseudo-property, optional extra properties, and the builtin
//!   methods of [`ArrayMethod`] reachable by name.
//!
//! # Invariants
//!
//! 1. `own_keys()` lists integer keys ascending (array elements for arrays),
//!    then `length` for arrays, then names in insertion order, then symbols.
//! 2. Writing an index past the end of an array extends it with `undefined`.
//! 3. Deleting an array index leaves `undefined` in place; `length` cannot
//!    be deleted.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;

use crate::builtins::{self, ArrayMethod};
use crate::error::{Error, Result};
use crate::key::PropertyKey;
use crate::value::Value;

/// Largest number of slots a single write may append to an array.
pub const MAX_ARRAY_GROWTH: usize = 1 << 24;

/// Runtime type tag of an object, used to select its handler set.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ClassTag(Rc<str>);

impl ClassTag {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(Rc::from(name))
    }

    #[must_use]
    pub fn object() -> Self {
        Self::new("Object")
    }

    #[must_use]
    pub fn array() -> Self {
        Self::new("Array")
    }

    #[must_use]
    pub fn function() -> Self {
        Self::new("Function")
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClassTag {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Debug for ClassTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for ClassTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Insertion-ordered property storage with O(1) lookup.
#[derive(Default)]
struct PropertyMap {
    slots: Vec<(PropertyKey, Value)>,
    index: AHashMap<PropertyKey, usize>,
}

impl PropertyMap {
    fn get(&self, key: &PropertyKey) -> Option<&Value> {
        self.index.get(key).map(|&pos| &self.slots[pos].1)
    }

    fn contains(&self, key: &PropertyKey) -> bool {
        self.index.contains_key(key)
    }

    fn insert(&mut self, key: PropertyKey, value: Value) {
        match self.index.get(&key) {
            Some(&pos) => self.slots[pos].1 = value,
            None => {
                self.index.insert(key.clone(), self.slots.len());
                self.slots.push((key, value));
            }
        }
    }

    fn remove(&mut self, key: &PropertyKey) -> Option<Value> {
        let pos = self.index.remove(key)?;
        let (_, value) = self.slots.remove(pos);
        for (shifted, _) in &self.slots[pos..] {
            if let Some(slot) = self.index.get_mut(shifted) {
                *slot -= 1;
            }
        }
        Some(value)
    }

    fn keys(&self) -> impl Iterator<Item = &PropertyKey> {
        self.slots.iter().map(|(key, _)| key)
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

struct ObjectData {
    /// `Some` for arrays.
    elements: Option<Vec<Value>>,
    props: PropertyMap,
}

pub(crate) struct ObjectCell {
    class: ClassTag,
    data: RefCell<ObjectData>,
}

/// A raw object or array.
#[derive(Clone)]
pub struct Object(Rc<ObjectCell>);

impl Object {
    /// Create an empty plain object.
    #[must_use]
    pub fn new() -> Self {
        Self::with_class(ClassTag::object())
    }

    /// Create an empty record carrying a custom class tag.
    #[must_use]
    pub fn with_class(class: impl Into<ClassTag>) -> Self {
        Self(Rc::new(ObjectCell {
            class: class.into(),
            data: RefCell::new(ObjectData {
                elements: None,
                props: PropertyMap::default(),
            }),
        }))
    }

    /// Create an array holding `values`.
    #[must_use]
    pub fn array<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self(Rc::new(ObjectCell {
            class: ClassTag::array(),
            data: RefCell::new(ObjectData {
                elements: Some(values.into_iter().map(Into::into).collect()),
                props: PropertyMap::default(),
            }),
        }))
    }

    /// Create a plain object from key/value pairs.
    #[must_use]
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<PropertyKey>,
        V: Into<Value>,
    {
        let object = Self::new();
        {
            let mut data = object.0.data.borrow_mut();
            for (key, value) in entries {
                data.props.insert(key.into(), value.into());
            }
        }
        object
    }

    #[must_use]
    pub fn class(&self) -> &ClassTag {
        &self.0.class
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        self.0.data.borrow().elements.is_some()
    }

    /// Element count of an array, `None` for records.
    #[must_use]
    pub fn array_len(&self) -> Option<usize> {
        self.0.data.borrow().elements.as_ref().map(Vec::len)
    }

    /// Snapshot of an array's elements, `None` for records.
    #[must_use]
    pub fn elements(&self) -> Option<Vec<Value>> {
        self.0.data.borrow().elements.clone()
    }

    /// Read a property, falling back to builtin array methods by name.
    #[must_use]
    pub fn get(&self, key: &PropertyKey) -> Value {
        let data = self.0.data.borrow();
        let Some(elements) = &data.elements else {
            return data.props.get(key).cloned().unwrap_or_default();
        };
        match key {
            PropertyKey::Index(index) => {
                return elements.get(*index as usize).cloned().unwrap_or_default();
            }
            key if key.is_length() => return Value::Number(elements.len() as f64),
            _ => {}
        }
        if let Some(value) = data.props.get(key) {
            return value.clone();
        }
        drop(data);
        match key.as_name().and_then(ArrayMethod::from_name) {
            Some(method) => Value::Function(builtins::array_method(method)),
            None => Value::Undefined,
        }
    }

    /// Element `index` of an array, `undefined` when out of range.
    pub(crate) fn get_index(&self, index: usize) -> Value {
        self.0
            .data
            .borrow()
            .elements
            .as_ref()
            .and_then(|elements| elements.get(index).cloned())
            .unwrap_or_default()
    }

    /// Write a property. Always succeeds on a well-formed key and value.
    pub fn set(&self, key: &PropertyKey, value: Value) -> Result<bool> {
        let mut data = self.0.data.borrow_mut();
        if let Some(elements) = data.elements.as_mut() {
            match key {
                PropertyKey::Index(index) => {
                    let index = *index as usize;
                    if index >= elements.len() {
                        grow(elements, index + 1, &value)?;
                    }
                    elements[index] = value;
                    return Ok(true);
                }
                key if key.is_length() => {
                    let len = array_length(&value)?;
                    if len > elements.len() {
                        grow(elements, len, &value)?;
                    } else {
                        elements.truncate(len);
                    }
                    return Ok(true);
                }
                _ => {}
            }
        }
        data.props.insert(key.clone(), value);
        Ok(true)
    }

    /// Whether the property exists, including builtin array methods.
    #[must_use]
    pub fn has(&self, key: &PropertyKey) -> bool {
        let data = self.0.data.borrow();
        if let Some(elements) = &data.elements {
            match key {
                PropertyKey::Index(index) => return (*index as usize) < elements.len(),
                key if key.is_length() => return true,
                _ => {}
            }
            if key.as_name().and_then(ArrayMethod::from_name).is_some() {
                return true;
            }
        }
        data.props.contains(key)
    }

    /// Own property keys in enumeration order.
    #[must_use]
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let data = self.0.data.borrow();
        let element_count = data.elements.as_ref().map_or(0, Vec::len);
        let mut keys = Vec::with_capacity(element_count + data.props.len() + 1);
        keys.extend((0..element_count).map(PropertyKey::from));

        let mut indices: Vec<u32> = data.props.keys().filter_map(PropertyKey::as_index).collect();
        indices.sort_unstable();
        keys.extend(indices.into_iter().map(PropertyKey::Index));

        if data.elements.is_some() {
            keys.push(PropertyKey::length());
        }
        keys.extend(
            data.props
                .keys()
                .filter(|key| matches!(key, PropertyKey::Name(_)))
                .cloned(),
        );
        keys.extend(data.props.keys().filter(|key| key.is_symbol()).cloned());
        keys
    }

    /// Remove a property. Returns `false` only for an array's `length`.
    pub fn delete(&self, key: &PropertyKey) -> bool {
        let mut data = self.0.data.borrow_mut();
        if let Some(elements) = data.elements.as_mut() {
            match key {
                PropertyKey::Index(index) => {
                    if let Some(slot) = elements.get_mut(*index as usize) {
                        *slot = Value::Undefined;
                    }
                    return true;
                }
                key if key.is_length() => return false,
                _ => {}
            }
        }
        data.props.remove(key);
        true
    }

    /// Run `f` against an array's element vector.
    ///
    /// `f` must not touch this object through any other path.
    pub(crate) fn with_elements_mut<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> Option<R> {
        self.0.data.borrow_mut().elements.as_mut().map(f)
    }

    /// Whether both handles refer to the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<ObjectCell> {
        Rc::downgrade(&self.0)
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.data.borrow();
        let mut s = f.debug_struct("Object");
        s.field("class", &self.0.class);
        match &data.elements {
            Some(elements) => s.field("len", &elements.len()),
            None => s.field("keys", &data.props.len()),
        };
        s.finish()
    }
}

fn grow(elements: &mut Vec<Value>, new_len: usize, value: &Value) -> Result<()> {
    if new_len - elements.len() > MAX_ARRAY_GROWTH {
        return Err(Error::InvalidArrayLength {
            value: value.to_display_string(),
        });
    }
    elements.resize(new_len, Value::Undefined);
    Ok(())
}

fn array_length(value: &Value) -> Result<usize> {
    match value {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= f64::from(u32::MAX) => {
            Ok(*n as usize)
        }
        other => Err(Error::InvalidArrayLength {
            value: other.to_display_string(),
        }),
    }
}
